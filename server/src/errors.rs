//! Errors surfaced while dispatching a request, mapped to wire status
//! codes per the validation table in spec.md §4.8.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("bad body: {0}")]
    BadBody(String),
    #[error("wrong state: {0}")]
    WrongState(String),
    #[error("missing precondition: {0}")]
    MissingPrecondition(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("operation timed out")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn status_code(&self) -> i32 {
        match self {
            DispatchError::BadBody(_) => 400,
            DispatchError::WrongState(_) => 405,
            DispatchError::MissingPrecondition(_) => 424,
            DispatchError::Io(_) => 500,
            DispatchError::Timeout => 408,
            DispatchError::Internal(_) => 500,
        }
    }
}
