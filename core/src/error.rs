//! Error types for the webservice client.
//!
//! # Design
//! `Authentication` gets a dedicated variant because a 401 is recoverable by
//! supplying another key, while every other non-success status lands in
//! `Service` together with whatever error detail the server put in the body.
//! Transport failures are boxed unchanged so callers can downcast to the
//! concrete transport error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// One `<error>` entry of an error-shaped response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The server answered 401: the API key was rejected.
    #[error("{message}")]
    Authentication { status: u16, message: String },

    /// The server answered with any other non-success status.
    #[error("{message}")]
    Service {
        message: String,
        status: Option<u16>,
        remote: Vec<RemoteError>,
    },

    /// The response body is empty or not well-formed XML.
    #[error("{0}")]
    Parse(String),

    /// A mapping cannot be turned into a single-rooted document.
    #[error("{0}")]
    Structure(String),

    #[error("Unsupported parameters: {}", .0.join(", "))]
    UnsupportedOptions(Vec<String>),

    /// `add` was called without content or files.
    #[error("Undefined data.")]
    MissingContent,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// HTTP status that caused the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authentication { status, .. } => Some(*status),
            Error::Service { status, .. } => *status,
            _ => None,
        }
    }

    /// Error entries reported by the server.
    pub fn remote_errors(&self) -> &[RemoteError] {
        match self {
            Error::Service { remote, .. } => remote,
            _ => &[],
        }
    }
}
