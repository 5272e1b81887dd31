//! Crate-wide error kinds.
//!
//! Mirrors the four error kinds in the error-handling design: configuration
//! errors are fatal at startup, transport errors are retried and surface as
//! `None` to callers, data errors are converted into defaulted rows by the
//! worker, and logic errors are logged without failing the job.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqesError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("logic error: {0}")]
    Logic(String),
}

pub type Result<T> = std::result::Result<T, SqesError>;
