//! Error types for mail-reader

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connect server using proxy error, status code {status}")]
    ProxyConnect { status: u16 },

    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),

    #[error("Invalid reader type: {0}")]
    InvalidReaderType(String),

    #[error("Mail server not implemented: {0}")]
    ServerNotImplemented(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Select failed: {0}")]
    Select(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Store failed: {0}")]
    Store(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Message parsing error: {0}")]
    Parse(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn connect(addr: &str, reason: impl ToString) -> Self {
        Self::Connect {
            addr: addr.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
