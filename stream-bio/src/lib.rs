//! Runs OpenSSL over any byte transport.
//!
//! OpenSSL talks to the network through a BIO. This crate registers a custom
//! BIO method whose callbacks forward to a [`Transport`], translating its
//! results into the BIO convention: a non-positive count plus a sticky retry
//! flag for conditions worth retrying, a bare non-positive count otherwise.
//! The BIO and its [`StreamContext`](bio::StreamContext) point at each other;
//! whichever is torn down first clears both references.

pub mod bio;
pub mod config;
pub use config::StreamConfig;
pub mod error;
pub use error::{Error, Result};
mod stream;
pub use stream::TlsStream;
pub mod transport;
pub use transport::{Transport, TransportResult};
