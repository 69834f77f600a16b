//! The module contains the errors the pipeline can throw.
//!
//! The errors are:
//!
//! - [`Execution`] thrown when the accounting tool cannot be spawned or exits
//!   with a failure status.
//! - [`Format`] thrown when a register line does not match the expected shape.
//! - [`Persistence`] thrown by the relational and time-series sinks.
//! - [`Timeout`] thrown when a deadline elapses before an operation returns.
//!
//!  [`Execution`]: EngineError::Execution
//!  [`Format`]: EngineError::Format
//!  [`Persistence`]: EngineError::Persistence
//!  [`Timeout`]: EngineError::Timeout
use std::time::Duration;

use sea_orm::DbErr;
use thiserror::Error;

/// Pipeline errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to run `{command}`: {reason}")]
    Execution { command: String, reason: String },
    #[error("invalid register line {line_no} ({line:?}): {reason}")]
    Format {
        line_no: usize,
        line: String,
        reason: String,
    },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("{operation} did not complete within {after:?}")]
    Timeout { operation: String, after: Duration },
}

/// Sink side failures.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("time-series request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("time-series store answered {status}: {message}")]
    Store { status: u16, message: String },
    #[error("unexpected time-series response: {0}")]
    Response(String),
}

impl EngineError {
    pub(crate) fn execution(command: impl Into<String>, reason: impl ToString) -> Self {
        Self::Execution {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn format(line_no: usize, line: &str, reason: impl ToString) -> Self {
        Self::Format {
            line_no,
            line: line.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }
}

impl From<DbErr> for EngineError {
    fn from(value: DbErr) -> Self {
        Self::Persistence(PersistenceError::Database(value))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(value: reqwest::Error) -> Self {
        Self::Persistence(PersistenceError::Http(value))
    }
}

/// Await `future`, failing with [`EngineError::Timeout`] once `deadline` elapses.
///
/// `None` waits forever.
pub(crate) async fn with_deadline<T, F>(
    operation: &str,
    deadline: Option<Duration>,
    future: F,
) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match deadline {
        Some(after) => tokio::time::timeout(after, future)
            .await
            .map_err(|_| EngineError::timeout(operation, after))?,
        None => future.await,
    }
}
