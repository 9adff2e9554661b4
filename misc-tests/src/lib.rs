//! End-to-end tests running real TLS handshakes through `stream-bio`.

#[cfg(test)]
pub mod utils;

#[cfg(test)]
mod handshake;
