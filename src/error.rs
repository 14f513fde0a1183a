use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a call against the Ollama HTTP API.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("API Request Error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API Response Error: Status {status} - {body}")]
    Status { status: StatusCode, body: String },
    #[error("JSON Error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Response is missing field `{0}`")]
    MissingField(&'static str),
    #[error("Stream Read Error: {0}")]
    Stream(String),
}

/// Errors that end the terminal session.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("Channel Receive Error")]
    ChannelReceive,
}
