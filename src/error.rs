// src/error.rs
use thiserror::Error;

/// Hard failures. Everything else degrades into a `warning` on the result.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Input bytes are not valid UTF-8
    #[error("input is not valid UTF-8 text (first bad byte at {valid_up_to})")]
    NotText { valid_up_to: usize },

    /// Event text is not JSON at all
    #[error("event is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(err: std::str::Utf8Error) -> Self {
        DecodeError::NotText {
            valid_up_to: err.valid_up_to(),
        }
    }
}
