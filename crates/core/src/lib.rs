//! Pure domain types for the script hub.
//!
//! Holds the error taxonomy, command validation rules, the status model,
//! and the [`store::CommandStore`] seam through which the execution engine
//! and the request layer reach persistence. No database or HTTP code lives
//! here.

pub mod command;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;
