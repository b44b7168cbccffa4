//! ScriptHub HTTP server library.
//!
//! Exposes config, state, error handling, the command service, and routes so
//! integration tests and the binary entrypoint share one router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod service;
pub mod state;
