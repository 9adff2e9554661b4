use std::io::{self, IoSlice};
use std::net::TcpStream;
use std::time::Duration;

/// Outcome of a single transport operation.
#[derive(Debug)]
pub enum TransportResult<T> {
    /// The operation completed. For reads `Ok(0)` means end of stream.
    Ok(T),
    /// Interrupted, would block, or the deadline passed before any progress.
    /// The caller may try again later.
    WouldBlock,
    /// Any other error. Not retried.
    Err(io::Error),
}

impl<T> TransportResult<T> {
    pub fn is_would_block(&self) -> bool {
        matches!(self, TransportResult::WouldBlock)
    }
}

impl<T> From<io::Result<T>> for TransportResult<T> {
    fn from(res: io::Result<T>) -> Self {
        match res {
            Ok(v) => TransportResult::Ok(v),
            Err(e) if is_transient(&e) => TransportResult::WouldBlock,
            Err(e) => TransportResult::Err(e),
        }
    }
}

#[cfg(unix)]
const EINPROGRESS: i32 = libc::EINPROGRESS;
#[cfg(windows)]
const EINPROGRESS: i32 = 10036; // WSAEINPROGRESS

/// Whether an io error denotes a condition worth retrying.
pub fn is_transient(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut => true,
        // std has no stable kind for a pending connect
        _ => e.raw_os_error() == Some(EINPROGRESS),
    }
}

/// A byte stream that the TLS BIO reads ciphertext from and writes it to.
///
/// Every call blocks for at most `timeout`. `None` means no limit and
/// `Some(Duration::ZERO)` asks for a non-blocking attempt.
pub trait Transport {
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> TransportResult<usize>;

    fn write_vectored(
        &mut self,
        bufs: &[IoSlice<'_>],
        timeout: Option<Duration>,
    ) -> TransportResult<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> TransportResult<usize> {
        (**self).read(buf, timeout)
    }

    fn write_vectored(
        &mut self,
        bufs: &[IoSlice<'_>],
        timeout: Option<Duration>,
    ) -> TransportResult<usize> {
        (**self).write_vectored(bufs, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> TransportResult<usize> {
        (**self).read(buf, timeout)
    }

    fn write_vectored(
        &mut self,
        bufs: &[IoSlice<'_>],
        timeout: Option<Duration>,
    ) -> TransportResult<usize> {
        (**self).write_vectored(bufs, timeout)
    }
}

// Raw socket transport. The socket options are applied on every call since
// the timeout belongs to the stream context and may change between calls.
impl Transport for TcpStream {
    fn read(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> TransportResult<usize> {
        if let Err(e) = apply_timeout(self, timeout, TcpStream::set_read_timeout) {
            return TransportResult::Err(e);
        }
        io::Read::read(self, buf).into()
    }

    fn write_vectored(
        &mut self,
        bufs: &[IoSlice<'_>],
        timeout: Option<Duration>,
    ) -> TransportResult<usize> {
        if let Err(e) = apply_timeout(self, timeout, TcpStream::set_write_timeout) {
            return TransportResult::Err(e);
        }
        io::Write::write_vectored(self, bufs).into()
    }
}

fn apply_timeout(
    s: &TcpStream,
    timeout: Option<Duration>,
    set: fn(&TcpStream, Option<Duration>) -> io::Result<()>,
) -> io::Result<()> {
    match timeout {
        // std rejects a zero socket timeout, poll instead.
        Some(d) if d.is_zero() => s.set_nonblocking(true),
        _ => {
            s.set_nonblocking(false)?;
            set(s, timeout)
        }
    }
}
