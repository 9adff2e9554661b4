pub mod ffi;
mod method;
pub use method::{BioMethod, BioMethods};
mod context;
pub use context::StreamContext;
mod adapter;
pub use adapter::StreamBio;

pub use ffi::{BioHandle, Retry};
