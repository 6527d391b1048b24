//! Errors surfaced by the reference client's connection and TLS setup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid server name: {0}")]
    InvalidServerName(String),
    #[error("no usable certificate in '{0}'")]
    InvalidCertificate(String),
    #[error(transparent)]
    Tls(#[from] tokio_rustls::rustls::Error),
    #[error("connection closed")]
    Closed,
}
