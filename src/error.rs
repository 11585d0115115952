use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Couldn't locate the binary: {0}")]
    BinaryNotFound(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cache has been stopped")]
    Stopped,

    #[error("The provided job does not actually indicate a range or group of tasks")]
    InvalidTaskRange,

    #[error("Could not locate the requested resource: {0}")]
    ResourceNotFound(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::DeError> for GridError {
    fn from(err: quick_xml::DeError) -> Self {
        GridError::Parse(err.to_string())
    }
}

impl From<std::num::ParseIntError> for GridError {
    fn from(err: std::num::ParseIntError) -> Self {
        GridError::Parse(err.to_string())
    }
}

impl From<std::num::ParseFloatError> for GridError {
    fn from(err: std::num::ParseFloatError) -> Self {
        GridError::Parse(err.to_string())
    }
}

impl From<chrono::ParseError> for GridError {
    fn from(err: chrono::ParseError) -> Self {
        GridError::Parse(err.to_string())
    }
}
