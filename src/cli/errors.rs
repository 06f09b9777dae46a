use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("No bands requested; pass at least one with --bands")]
    NoBands,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stacking error: {0}")]
    Stack(#[from] eostack::Error),
}
