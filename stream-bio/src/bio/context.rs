use std::ffi::c_void;
use std::io;
use std::time::Duration;

use openssl_sys::BIO;

use crate::bio::ffi::BioHandle;

/// State a custom BIO forwards to: the base transport, the per-operation
/// timeout, and the back-reference to the BIO it is bound to.
///
/// Binding is mutual. While bound, the BIO's data pointer is this context and
/// `bio` is that BIO. Whichever side is torn down first clears both.
pub struct StreamContext<S> {
    stream: S,
    timeout: Option<Duration>,
    bio: *mut BIO,
    error: Option<io::Error>,
}

impl<S> StreamContext<S> {
    pub fn new(stream: S, timeout: Option<Duration>) -> Self {
        StreamContext {
            stream,
            timeout,
            bio: std::ptr::null_mut(),
            error: None,
        }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn is_bound(&self) -> bool {
        !self.bio.is_null()
    }

    pub fn bio(&self) -> *mut BIO {
        self.bio
    }

    /// The fatal transport error recorded by the last read or write.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }

    pub(crate) fn set_error(&mut self, e: io::Error) {
        self.error = Some(e);
    }

    /// Binds `bio` and this context to each other.
    ///
    /// # Safety
    ///
    /// - `bio` must be a live, unbound BIO created from a [`StreamBio<S>`]
    ///   method with the same `S`.
    /// - The context must not move while bound. Keep it boxed.
    ///
    /// [`StreamBio<S>`]: crate::bio::StreamBio
    pub unsafe fn bind(&mut self, bio: *mut BIO) {
        assert!(!self.is_bound(), "context already bound");
        let mut h = unsafe { BioHandle::from_ptr(bio) };
        assert!(h.data().is_null(), "bio already bound");
        h.set_data(self as *mut Self as *mut c_void);
        self.bio = bio;
        tracing::debug!(?bio, "bound stream context");
    }

    /// Drops the context half of the binding. Called from the BIO's destroy
    /// callback after it cleared its own half.
    pub(crate) fn release(&mut self) {
        self.bio = std::ptr::null_mut();
    }
}

impl<S> Drop for StreamContext<S> {
    fn drop(&mut self) {
        if self.bio.is_null() {
            return;
        }
        // Context goes first: leave the BIO unbound and uninitialized so
        // OpenSSL rejects further I/O on it without reaching the adapter.
        let mut h = unsafe { BioHandle::from_ptr(self.bio) };
        h.set_data(std::ptr::null_mut());
        h.set_init(false);
        h.clear_retry();
        tracing::debug!(bio = ?self.bio, "unbound stream context on drop");
        self.bio = std::ptr::null_mut();
    }
}
