use std::any::TypeId;
use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_int, c_long, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use openssl::error::ErrorStack;
use openssl_sys::{BIO, BIO_METHOD};

use crate::bio::ffi::{
    BIO_TYPE_SOURCE_SINK, BIO_get_new_index, BIO_meth_free, BIO_meth_new, BIO_meth_set_create,
    BIO_meth_set_ctrl, BIO_meth_set_destroy, BIO_meth_set_gets, BIO_meth_set_puts,
    BIO_meth_set_read, BIO_meth_set_write, BioHandle,
};

/// The callback table OpenSSL drives a custom BIO through.
///
/// Counts follow the BIO convention: a positive value is a byte count, a
/// non-positive one is end of stream or failure, and the retry flags on the
/// handle tell the two apart.
pub trait BioMethods {
    /// Name reported by `BIO_method_name`.
    const NAME: &'static CStr;

    fn create(bio: &mut BioHandle) -> c_int;

    fn destroy(bio: &mut BioHandle) -> c_int;

    fn read(bio: &mut BioHandle, buf: &mut [u8]) -> c_int;

    fn write(bio: &mut BioHandle, buf: &[u8]) -> c_int;

    fn ctrl(bio: &mut BioHandle, cmd: c_int, num: c_long, ptr: *mut c_void) -> c_long;

    fn gets(bio: &mut BioHandle, buf: &mut [u8]) -> c_int;

    fn puts(bio: &mut BioHandle, s: &CStr) -> c_int;
}

/// An owned `BIO_METHOD` wired to the callbacks of `M`.
///
/// Must outlive every BIO created from it.
pub struct BioMethod(*mut BIO_METHOD);

// Safety: the method table is not mutated after construction.
unsafe impl Send for BioMethod {}
unsafe impl Sync for BioMethod {}

fn cvt(r: c_int) -> Result<c_int, ErrorStack> {
    if r <= 0 { Err(ErrorStack::get()) } else { Ok(r) }
}

impl BioMethod {
    pub fn new<M: BioMethods>() -> Result<Self, ErrorStack> {
        openssl_sys::init();
        unsafe {
            let index = cvt(BIO_get_new_index())?;
            let ptr = BIO_meth_new(index | BIO_TYPE_SOURCE_SINK, M::NAME.as_ptr());
            if ptr.is_null() {
                return Err(ErrorStack::get());
            }
            let method = BioMethod(ptr);
            cvt(BIO_meth_set_create(ptr, create::<M>))?;
            cvt(BIO_meth_set_destroy(ptr, destroy::<M>))?;
            cvt(BIO_meth_set_read(ptr, bread::<M>))?;
            cvt(BIO_meth_set_write(ptr, bwrite::<M>))?;
            cvt(BIO_meth_set_ctrl(ptr, ctrl::<M>))?;
            cvt(BIO_meth_set_gets(ptr, bgets::<M>))?;
            cvt(BIO_meth_set_puts(ptr, bputs::<M>))?;
            Ok(method)
        }
    }

    /// The method for `M`, registered on first use and shared by every BIO
    /// of that type afterwards.
    ///
    /// Custom BIO type indices are a small process-wide pool, so a method is
    /// never freed once registered here.
    pub fn shared<M: BioMethods + 'static>() -> Result<Arc<Self>, ErrorStack> {
        static METHODS: OnceLock<Mutex<HashMap<TypeId, Arc<BioMethod>>>> = OnceLock::new();

        let mut methods = METHODS
            .get_or_init(Default::default)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(method) = methods.get(&TypeId::of::<M>()) {
            return Ok(Arc::clone(method));
        }
        let method = Arc::new(BioMethod::new::<M>()?);
        tracing::debug!(name = ?M::NAME, "registered bio method");
        methods.insert(TypeId::of::<M>(), Arc::clone(&method));
        Ok(method)
    }

    pub fn as_ptr(&self) -> *const BIO_METHOD {
        self.0
    }
}

impl Drop for BioMethod {
    fn drop(&mut self) {
        unsafe { BIO_meth_free(self.0) };
    }
}

// A panic must not unwind into OpenSSL. Report it as a hard failure.
fn guard<R>(fallback: R, f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(_) => {
            tracing::error!("panic in bio callback");
            fallback
        }
    }
}

unsafe fn buf_mut<'a>(buf: *mut c_char, len: c_int) -> &'a mut [u8] {
    let len = usize::try_from(len).unwrap_or(0);
    if buf.is_null() || len == 0 {
        return &mut [];
    }
    unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, len) }
}

unsafe fn buf_ref<'a>(buf: *const c_char, len: c_int) -> &'a [u8] {
    let len = usize::try_from(len).unwrap_or(0);
    if buf.is_null() || len == 0 {
        return &[];
    }
    unsafe { std::slice::from_raw_parts(buf as *const u8, len) }
}

// OpenSSL never passes a null BIO, but a panic here would abort.
unsafe fn handle(bio: *mut BIO) -> Option<BioHandle> {
    if bio.is_null() {
        None
    } else {
        Some(unsafe { BioHandle::from_ptr(bio) })
    }
}

unsafe extern "C" fn create<M: BioMethods>(bio: *mut BIO) -> c_int {
    let Some(mut h) = (unsafe { handle(bio) }) else {
        return 0;
    };
    guard(0, || M::create(&mut h))
}

unsafe extern "C" fn destroy<M: BioMethods>(bio: *mut BIO) -> c_int {
    let Some(mut h) = (unsafe { handle(bio) }) else {
        return 0;
    };
    guard(-1, || M::destroy(&mut h))
}

unsafe extern "C" fn bread<M: BioMethods>(bio: *mut BIO, buf: *mut c_char, len: c_int) -> c_int {
    let Some(mut h) = (unsafe { handle(bio) }) else {
        return -1;
    };
    let buf = unsafe { buf_mut(buf, len) };
    guard(-1, || M::read(&mut h, buf))
}

unsafe extern "C" fn bwrite<M: BioMethods>(
    bio: *mut BIO,
    buf: *const c_char,
    len: c_int,
) -> c_int {
    let Some(mut h) = (unsafe { handle(bio) }) else {
        return -1;
    };
    let buf = unsafe { buf_ref(buf, len) };
    guard(-1, || M::write(&mut h, buf))
}

unsafe extern "C" fn ctrl<M: BioMethods>(
    bio: *mut BIO,
    cmd: c_int,
    num: c_long,
    ptr: *mut c_void,
) -> c_long {
    let Some(mut h) = (unsafe { handle(bio) }) else {
        return 0;
    };
    guard(0, || M::ctrl(&mut h, cmd, num, ptr))
}

unsafe extern "C" fn bgets<M: BioMethods>(bio: *mut BIO, buf: *mut c_char, len: c_int) -> c_int {
    let Some(mut h) = (unsafe { handle(bio) }) else {
        return -1;
    };
    let buf = unsafe { buf_mut(buf, len) };
    guard(-1, || M::gets(&mut h, buf))
}

unsafe extern "C" fn bputs<M: BioMethods>(bio: *mut BIO, s: *const c_char) -> c_int {
    if s.is_null() {
        return -1;
    }
    let Some(mut h) = (unsafe { handle(bio) }) else {
        return -1;
    };
    let s = unsafe { CStr::from_ptr(s) };
    guard(-1, || M::puts(&mut h, s))
}
