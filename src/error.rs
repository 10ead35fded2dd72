use thiserror::Error;

use crate::session::SessionId;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("backend not connected yet")]
    BackendUnavailable,

    #[error("a response is already streaming for session {0}")]
    StreamInFlight(SessionId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;
