//! Request handlers.
//!
//! Handlers extract input, call the store or [`crate::service::CommandService`],
//! and map errors through [`crate::error::AppError`].

pub mod commands;
