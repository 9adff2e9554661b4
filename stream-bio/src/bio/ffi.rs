use std::ffi::{c_char, c_int, c_long, c_void};

use openssl_sys::{BIO, BIO_METHOD, BIO_ctrl};

// BIO control constants
pub const BIO_CTRL_FLUSH: c_int = 11;

pub const BIO_TYPE_DESCRIPTOR: c_int = 0x0100;
pub const BIO_TYPE_FILTER: c_int = 0x0200;
pub const BIO_TYPE_SOURCE_SINK: c_int = 0x0400;

// Retry state bits, see bio.h
pub const BIO_FLAGS_READ: c_int = 0x01;
pub const BIO_FLAGS_WRITE: c_int = 0x02;
pub const BIO_FLAGS_IO_SPECIAL: c_int = 0x04;
pub const BIO_FLAGS_RWS: c_int = BIO_FLAGS_READ | BIO_FLAGS_WRITE | BIO_FLAGS_IO_SPECIAL;
pub const BIO_FLAGS_SHOULD_RETRY: c_int = 0x08;

pub type BioCreate = unsafe extern "C" fn(*mut BIO) -> c_int;
pub type BioDestroy = unsafe extern "C" fn(*mut BIO) -> c_int;
pub type BioRead = unsafe extern "C" fn(*mut BIO, *mut c_char, c_int) -> c_int;
pub type BioWrite = unsafe extern "C" fn(*mut BIO, *const c_char, c_int) -> c_int;
pub type BioCtrl = unsafe extern "C" fn(*mut BIO, c_int, c_long, *mut c_void) -> c_long;
pub type BioGets = unsafe extern "C" fn(*mut BIO, *mut c_char, c_int) -> c_int;
pub type BioPuts = unsafe extern "C" fn(*mut BIO, *const c_char) -> c_int;

unsafe extern "C" {
    pub unsafe fn BIO_free(b: *mut BIO) -> c_int;
    pub unsafe fn BIO_get_init(b: *mut BIO) -> c_int;
    pub unsafe fn BIO_set_flags(b: *mut BIO, flags: c_int);
    pub unsafe fn BIO_clear_flags(b: *mut BIO, flags: c_int);
    pub unsafe fn BIO_test_flags(b: *const BIO, flags: c_int) -> c_int;
    pub unsafe fn BIO_puts(b: *mut BIO, buf: *const c_char) -> c_int;
    pub unsafe fn BIO_gets(b: *mut BIO, buf: *mut c_char, size: c_int) -> c_int;
    pub unsafe fn BIO_method_type(b: *const BIO) -> c_int;

    // custom methods
    pub unsafe fn BIO_get_new_index() -> c_int;
    pub unsafe fn BIO_meth_new(type_: c_int, name: *const c_char) -> *mut BIO_METHOD;
    pub unsafe fn BIO_meth_free(biom: *mut BIO_METHOD);
    pub unsafe fn BIO_meth_set_create(biom: *mut BIO_METHOD, create: BioCreate) -> c_int;
    pub unsafe fn BIO_meth_set_destroy(biom: *mut BIO_METHOD, destroy: BioDestroy) -> c_int;
    pub unsafe fn BIO_meth_set_read(biom: *mut BIO_METHOD, read: BioRead) -> c_int;
    pub unsafe fn BIO_meth_set_write(biom: *mut BIO_METHOD, write: BioWrite) -> c_int;
    pub unsafe fn BIO_meth_set_ctrl(biom: *mut BIO_METHOD, ctrl: BioCtrl) -> c_int;
    pub unsafe fn BIO_meth_set_gets(biom: *mut BIO_METHOD, gets: BioGets) -> c_int;
    pub unsafe fn BIO_meth_set_puts(biom: *mut BIO_METHOD, puts: BioPuts) -> c_int;
}

/// # Safety
// # define BIO_flush(b)            (int)BIO_ctrl(b,BIO_CTRL_FLUSH,0,NULL)
#[allow(non_snake_case)]
#[inline]
pub unsafe fn BIO_flush(b: *mut BIO) -> c_long {
    unsafe { BIO_ctrl(b, BIO_CTRL_FLUSH, 0, std::ptr::null_mut()) }
}

/// Retry state a read or write left on a BIO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retry {
    #[default]
    None,
    Read,
    Write,
}

/// View of a BIO passed into a method callback.
///
/// The pointer is not owned; OpenSSL frees the BIO.
#[derive(Debug)]
pub struct BioHandle {
    bio: *mut BIO,
}

impl BioHandle {
    /// # Safety
    /// `bio` must point to a live BIO for as long as the handle is used.
    pub unsafe fn from_ptr(bio: *mut BIO) -> Self {
        assert!(!bio.is_null());
        BioHandle { bio }
    }

    pub fn as_ptr(&self) -> *mut BIO {
        self.bio
    }

    pub fn is_init(&self) -> bool {
        unsafe { BIO_get_init(self.bio) != 0 }
    }

    pub fn set_init(&mut self, init: bool) {
        unsafe { openssl_sys::BIO_set_init(self.bio, init as c_int) }
    }

    /// The back-reference slot. Null when the BIO is unbound.
    pub fn data(&self) -> *mut c_void {
        unsafe { openssl_sys::BIO_get_data(self.bio) }
    }

    pub fn set_data(&mut self, data: *mut c_void) {
        unsafe { openssl_sys::BIO_set_data(self.bio, data) }
    }

    pub fn retry(&self) -> Retry {
        let flags = unsafe { BIO_test_flags(self.bio, BIO_FLAGS_RWS | BIO_FLAGS_SHOULD_RETRY) };
        if flags & BIO_FLAGS_SHOULD_RETRY == 0 {
            Retry::None
        } else if flags & BIO_FLAGS_READ != 0 {
            Retry::Read
        } else if flags & BIO_FLAGS_WRITE != 0 {
            Retry::Write
        } else {
            Retry::None
        }
    }

    pub fn clear_retry(&mut self) {
        unsafe { BIO_clear_flags(self.bio, BIO_FLAGS_RWS | BIO_FLAGS_SHOULD_RETRY) }
    }

    pub fn set_retry(&mut self, retry: Retry) {
        let flags = match retry {
            Retry::None => return self.clear_retry(),
            Retry::Read => BIO_FLAGS_READ,
            Retry::Write => BIO_FLAGS_WRITE,
        };
        unsafe { BIO_set_flags(self.bio, flags | BIO_FLAGS_SHOULD_RETRY) }
    }
}
