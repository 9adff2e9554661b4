use std::ffi::{CStr, c_int, c_long, c_void};
use std::io::IoSlice;
use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::bio::context::StreamContext;
use crate::bio::ffi::{BIO_CTRL_FLUSH, BioHandle, Retry};
use crate::bio::method::BioMethods;
use crate::transport::{Transport, TransportResult};

/// BIO callbacks forwarding to the [`Transport`] of a bound
/// [`StreamContext<S>`].
pub struct StreamBio<S>(PhantomData<fn() -> S>);

/// Resolves the bound context through the BIO's back-reference.
///
/// # Safety
/// The data pointer must be null or a `StreamContext<S>` bound through
/// [`StreamContext::bind`]. Binding guarantees it is cleared before the
/// context goes away.
unsafe fn context<'a, S>(bio: &BioHandle) -> Option<&'a mut StreamContext<S>> {
    let data = bio.data() as *mut StreamContext<S>;
    unsafe { data.as_mut() }
}

/// Maps a transport outcome onto the BIO return convention.
fn complete<S>(
    bio: &mut BioHandle,
    ctx: &mut StreamContext<S>,
    res: TransportResult<usize>,
    retry: Retry,
) -> c_int {
    bio.clear_retry();
    match res {
        TransportResult::Ok(n) => c_int::try_from(n).unwrap_or(c_int::MAX),
        TransportResult::WouldBlock => {
            trace!(?retry, "requesting a retry");
            bio.set_retry(retry);
            -1
        }
        TransportResult::Err(e) => {
            debug!(error = %e, "transport failed");
            ctx.set_error(e);
            -1
        }
    }
}

impl<S: Transport> BioMethods for StreamBio<S> {
    const NAME: &'static CStr = c"stream-bio";

    fn create(bio: &mut BioHandle) -> c_int {
        bio.set_init(true);
        bio.set_data(std::ptr::null_mut());
        bio.clear_retry();
        1
    }

    fn destroy(bio: &mut BioHandle) -> c_int {
        let Some(ctx) = (unsafe { context::<S>(bio) }) else {
            debug!("destroy on an unbound bio");
            return -1;
        };
        bio.set_data(std::ptr::null_mut());
        bio.set_init(false);
        bio.clear_retry();
        ctx.release();
        1
    }

    fn read(bio: &mut BioHandle, buf: &mut [u8]) -> c_int {
        let Some(ctx) = (unsafe { context::<S>(bio) }) else {
            return -1;
        };
        ctx.clear_error();
        let timeout = ctx.timeout();
        let res = ctx.stream_mut().read(buf, timeout);
        complete(bio, ctx, res, Retry::Read)
    }

    fn write(bio: &mut BioHandle, buf: &[u8]) -> c_int {
        let Some(ctx) = (unsafe { context::<S>(bio) }) else {
            return -1;
        };
        ctx.clear_error();
        let timeout = ctx.timeout();
        trace!(len = buf.len(), "transport write expected");
        let res = ctx
            .stream_mut()
            .write_vectored(&[IoSlice::new(buf)], timeout);
        let ret = complete(bio, ctx, res, Retry::Write);
        if ret > 0 && (ret as usize) < buf.len() {
            trace!(written = ret, len = buf.len(), "short write");
        }
        ret
    }

    fn ctrl(_bio: &mut BioHandle, cmd: c_int, _num: c_long, _ptr: *mut c_void) -> c_long {
        match cmd {
            // nothing buffered here
            BIO_CTRL_FLUSH => 1,
            _ => 0,
        }
    }

    fn gets(_bio: &mut BioHandle, _buf: &mut [u8]) -> c_int {
        -1
    }

    fn puts(bio: &mut BioHandle, s: &CStr) -> c_int {
        Self::write(bio, s.to_bytes())
    }
}
