//! Error kinds surfaced by the probing loop.
//!
//! Only a few of these ever reach the pass driver: store failures abort a
//! pass (read) or a channel (write). Transport, parse and endpoint errors
//! are absorbed by the prober's fallback chain and only logged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration (fatal at startup)
    #[error("configuration error: {0}")]
    Config(String),

    /// The configured database type has no driver in this build
    #[error("unsupported database type: {0}")]
    UnsupportedDatabase(String),

    #[error("store read failed: {0}")]
    StoreRead(String),

    #[error("store write failed: {0}")]
    StoreWrite(String),

    /// Connection refused, DNS failure, timeout, TLS error...
    #[error("transport error: {0}")]
    Transport(String),

    /// A gateway answered with a body we could not decode
    #[error("parse error: {0}")]
    Parse(String),

    /// A gateway answered with a non-success status
    #[error("endpoint returned HTTP {status}: {body}")]
    UnsupportedEndpoint { status: u16, body: String },
}

impl Error {
    pub(crate) fn read(e: impl std::fmt::Display) -> Self {
        Self::StoreRead(e.to_string())
    }

    pub(crate) fn write(e: impl std::fmt::Display) -> Self {
        Self::StoreWrite(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
