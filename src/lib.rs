//! encshim - Marshaling shim around an external two-phase encrypt routine

pub mod error;
pub mod ffi;
pub mod file_ops;
pub mod gateway;
pub mod iv;
pub mod transform;

pub use error::{EncshimError, ErrorCategory, ErrorKind, Result};
pub use gateway::{Gateway, IV_LEN};
pub use transform::{LibraryTransform, Status, Transform};
