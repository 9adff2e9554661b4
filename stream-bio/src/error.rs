use std::io;

use openssl::error::ErrorStack;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The transport failed underneath the TLS session.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("tls error: {0}")]
    Ssl(#[from] ErrorStack),
    /// The transport timed out or would block. Call again to continue.
    #[error("tls operation would block")]
    WouldBlock,
    /// The peer sent close_notify.
    #[error("tls session closed")]
    Closed,
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::Ssl(e) => io::Error::other(e),
            Error::WouldBlock => io::ErrorKind::WouldBlock.into(),
            Error::Closed => io::ErrorKind::UnexpectedEof.into(),
        }
    }
}
