//! Engine error types.

/// Errors surfaced synchronously by the engine to its callers.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The job queue is closed; no further jobs are accepted.
    #[error("Engine is shut down and no longer accepts jobs")]
    Shutdown,

    /// The engine was started with an unusable configuration.
    #[error("Invalid engine configuration: {0}")]
    Config(String),
}

/// Failure to deliver a cancellation signal to a live process.
#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    /// The process exited before the signal could be delivered.
    #[error("Process already exited")]
    AlreadyExited,

    /// The OS rejected the signal.
    #[error("Failed to signal process: {0}")]
    Signal(#[from] std::io::Error),
}
