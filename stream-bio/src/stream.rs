use std::ffi::c_int;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use foreign_types_shared::ForeignType;
use openssl::error::ErrorStack;
use openssl::ssl::Ssl;

use crate::bio::{BioMethod, StreamBio, StreamContext};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// A TLS session running over any [`Transport`] through a custom BIO.
///
/// Each call blocks at most for the configured timeout. When it runs out the
/// call returns [`Error::WouldBlock`] and must be repeated with the same
/// arguments; nothing is retried internally.
pub struct TlsStream<S> {
    // Drop order matters: the ssl frees the BIO, whose destroy callback
    // unbinds the context, and the method must outlive the BIO.
    ssl: Ssl,
    context: Box<StreamContext<S>>,
    _method: Arc<BioMethod>,
}

// Safety: the BIO and the context are only reached through this stream, and
// &mut self is required for every operation that touches them.
unsafe impl<S: Send> Send for TlsStream<S> {}

impl<S: Transport> TlsStream<S> {
    /// Wraps `stream` in a BIO of our own method and hands it to `ssl`.
    ///
    /// The method is registered once per transport type and shared by all
    /// streams over it.
    pub fn new(ssl: Ssl, stream: S, config: &StreamConfig) -> Result<Self>
    where
        S: 'static,
    {
        let method = BioMethod::shared::<StreamBio<S>>()?;
        let bio = unsafe { openssl_sys::BIO_new(method.as_ptr()) };
        if bio.is_null() {
            return Err(ErrorStack::get().into());
        }
        let mut context = Box::new(StreamContext::new(stream, config.timeout()));
        unsafe {
            context.bind(bio);
            // ssl takes ownership of the bio, used for both directions
            openssl_sys::SSL_set_bio(ssl.as_ptr(), bio, bio);
        }
        Ok(TlsStream {
            ssl,
            context,
            _method: method,
        })
    }

    /// Client handshake.
    pub fn connect(&mut self) -> Result<()> {
        let ret = unsafe { openssl_sys::SSL_connect(self.ssl.as_ptr()) };
        if ret > 0 { Ok(()) } else { Err(self.error(ret)) }
    }

    /// Server handshake.
    pub fn accept(&mut self) -> Result<()> {
        let ret = unsafe { openssl_sys::SSL_accept(self.ssl.as_ptr()) };
        if ret > 0 { Ok(()) } else { Err(self.error(ret)) }
    }

    /// Sends close_notify. Does not wait for the peer's.
    pub fn shutdown(&mut self) -> Result<()> {
        let ret = unsafe { openssl_sys::SSL_shutdown(self.ssl.as_ptr()) };
        if ret >= 0 { Ok(()) } else { Err(self.error(ret)) }
    }

    fn error(&mut self, ret: c_int) -> Error {
        let code = unsafe { openssl_sys::SSL_get_error(self.ssl.as_ptr(), ret) };
        match code {
            openssl_sys::SSL_ERROR_WANT_READ | openssl_sys::SSL_ERROR_WANT_WRITE => {
                Error::WouldBlock
            }
            openssl_sys::SSL_ERROR_ZERO_RETURN => Error::Closed,
            openssl_sys::SSL_ERROR_SYSCALL => match self.context.take_error() {
                Some(e) => Error::Io(e),
                None => {
                    let stack = ErrorStack::get();
                    if stack.errors().is_empty() {
                        Error::Io(io::ErrorKind::UnexpectedEof.into())
                    } else {
                        Error::Ssl(stack)
                    }
                }
            },
            _ => match self.context.take_error() {
                Some(e) => Error::Io(e),
                None => Error::Ssl(ErrorStack::get()),
            },
        }
    }
}

impl<S> TlsStream<S> {
    pub fn ssl(&self) -> &Ssl {
        &self.ssl
    }

    pub fn get_ref(&self) -> &S {
        self.context.stream()
    }

    pub fn get_mut(&mut self) -> &mut S {
        self.context.stream_mut()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.context.timeout()
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.context.set_timeout(timeout);
    }
}

impl<S: Transport> io::Read for TlsStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let len = c_int::try_from(buf.len()).unwrap_or(c_int::MAX);
        let ret =
            unsafe { openssl_sys::SSL_read(self.ssl.as_ptr(), buf.as_mut_ptr() as *mut _, len) };
        if ret > 0 {
            return Ok(ret as usize);
        }
        match self.error(ret) {
            Error::Closed => Ok(0),
            e => Err(e.into()),
        }
    }
}

impl<S: Transport> io::Write for TlsStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let len = c_int::try_from(buf.len()).unwrap_or(c_int::MAX);
        let ret =
            unsafe { openssl_sys::SSL_write(self.ssl.as_ptr(), buf.as_ptr() as *const _, len) };
        if ret > 0 {
            Ok(ret as usize)
        } else {
            Err(self.error(ret).into())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // every record is handed to the transport as it is produced
        Ok(())
    }
}
