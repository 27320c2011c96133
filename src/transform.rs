//! The boundary to the external encrypt routine
//!
//! The routine itself lives outside this crate. Its calling convention is:
//!
//! ```text
//! status = encrypt(input, input_len, iv, iv_len, output | NULL, &mut output_len)
//! ```
//!
//! - Called with a null `output` it only writes the required length into
//!   `output_len` (the sizing phase).
//! - Called with `output` pointing at `output_len` bytes it performs the
//!   transform and writes the produced length back (the fill phase).
//! - Zero means success; any other value is an error status.

use crate::error::{EncshimError, ErrorCategory, ErrorKind, Result};
use libloading::{Library, Symbol};
use std::ffi::c_int;
use std::num::NonZeroI32;
use std::path::{Path, PathBuf};
use std::ptr;

/// Default exported name of the external routine.
pub const DEFAULT_SYMBOL: &str = "encrypt";

/// Raw signature of the external routine.
pub type EncryptFn = unsafe extern "C" fn(
    input: *const u8,
    input_size: usize,
    iv: *const u8,
    iv_size: usize,
    output: *mut u8,
    output_size: *mut usize,
) -> c_int;

/// Non-zero status returned by the external routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(NonZeroI32);

impl Status {
    /// Returns `None` for the success status (zero).
    pub fn from_raw(code: c_int) -> Option<Self> {
        NonZeroI32::new(code).map(Self)
    }

    pub fn code(self) -> i32 {
        self.0.get()
    }
}

/// Something that honors the two-phase calling convention.
pub trait Transform {
    /// Run one call of the external routine.
    ///
    /// With `output` absent this is the sizing phase and the returned length
    /// is the number of bytes the fill phase needs. With `output` present the
    /// returned length is the number of bytes actually written.
    fn transform(
        &self,
        input: &[u8],
        iv: &[u8],
        output: Option<&mut [u8]>,
    ) -> std::result::Result<usize, Status>;
}

impl<T: Transform + ?Sized> Transform for &T {
    fn transform(
        &self,
        input: &[u8],
        iv: &[u8],
        output: Option<&mut [u8]>,
    ) -> std::result::Result<usize, Status> {
        (**self).transform(input, iv, output)
    }
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn transform(
        &self,
        input: &[u8],
        iv: &[u8],
        output: Option<&mut [u8]>,
    ) -> std::result::Result<usize, Status> {
        (**self).transform(input, iv, output)
    }
}

/// Call a raw routine with slices.
///
/// # Safety
///
/// `encrypt` must follow the calling convention above: it may read at most
/// `input.len()` and `iv.len()` bytes, and it may write at most `output_len`
/// bytes into `output`.
unsafe fn call_raw(
    encrypt: EncryptFn,
    input: &[u8],
    iv: &[u8],
    output: Option<&mut [u8]>,
) -> std::result::Result<usize, Status> {
    let (output_ptr, mut output_len) = match output {
        Some(buffer) => (buffer.as_mut_ptr(), buffer.len()),
        None => (ptr::null_mut(), 0),
    };

    let code = unsafe {
        encrypt(
            input.as_ptr(),
            input.len(),
            iv.as_ptr(),
            iv.len(),
            output_ptr,
            &mut output_len,
        )
    };

    match Status::from_raw(code) {
        None => Ok(output_len),
        Some(status) => Err(status),
    }
}

/// The external routine resolved from a shared library at runtime.
pub struct LibraryTransform {
    path: PathBuf,
    encrypt: EncryptFn,
    // Keeps `encrypt` mapped.
    _library: Library,
}

impl LibraryTransform {
    /// Load `path` and resolve [`DEFAULT_SYMBOL`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_symbol(path, DEFAULT_SYMBOL)
    }

    /// Load `path` and resolve `symbol`.
    pub fn open_symbol(path: impl AsRef<Path>, symbol: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Safety: loading runs the library's initializers. The library is
        // trusted by whoever configured its path.
        let library = unsafe { Library::new(&path) }.map_err(|e| {
            EncshimError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Library,
                format!("failed to load library {}", path.display()),
                e,
            )
        })?;

        // Safety: the symbol is assumed to have the `EncryptFn` signature.
        let encrypt = unsafe {
            let resolved: Symbol<EncryptFn> = library.get(symbol.as_bytes()).map_err(|e| {
                EncshimError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Library,
                    format!("symbol `{}` not found in {}", symbol, path.display()),
                    e,
                )
            })?;
            *resolved
        };

        tracing::debug!(path = %path.display(), symbol, "loaded external encrypt routine");

        Ok(Self {
            path,
            encrypt,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transform for LibraryTransform {
    fn transform(
        &self,
        input: &[u8],
        iv: &[u8],
        output: Option<&mut [u8]>,
    ) -> std::result::Result<usize, Status> {
        // Safety: `encrypt` was resolved from a library that is still loaded.
        unsafe { call_raw(self.encrypt, input, iv, output) }
    }
}

#[cfg(feature = "linked")]
mod linked {
    use super::{Status, Transform, call_raw};
    use std::ffi::c_int;

    unsafe extern "C" {
        #[link_name = "encrypt"]
        fn external_encrypt(
            input: *const u8,
            input_size: usize,
            iv: *const u8,
            iv_size: usize,
            output: *mut u8,
            output_size: *mut usize,
        ) -> c_int;
    }

    /// The external routine linked at build time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct LinkedTransform;

    impl Transform for LinkedTransform {
        fn transform(
            &self,
            input: &[u8],
            iv: &[u8],
            output: Option<&mut [u8]>,
        ) -> Result<usize, Status> {
            unsafe { call_raw(external_encrypt, input, iv, output) }
        }
    }
}

#[cfg(feature = "linked")]
pub use linked::LinkedTransform;

#[cfg(test)]
pub(crate) mod testing {
    //! Stand-in for the external routine with the legacy sizing rule.

    use super::{Status, Transform};
    use crate::IV_LEN;

    /// Output is the IV followed by the input, zero padded to the next
    /// multiple of 256 bytes.
    pub struct LegacyDouble;

    pub fn legacy_len(input_len: usize) -> usize {
        input_len + (256 - input_len % 256) + IV_LEN
    }

    impl Transform for LegacyDouble {
        fn transform(
            &self,
            input: &[u8],
            iv: &[u8],
            output: Option<&mut [u8]>,
        ) -> Result<usize, Status> {
            if iv.len() != IV_LEN {
                return Err(Status::from_raw(1).unwrap());
            }
            let needed = legacy_len(input.len());
            let Some(output) = output else {
                return Ok(needed);
            };
            if output.len() < needed {
                return Err(Status::from_raw(2).unwrap());
            }
            output[..IV_LEN].copy_from_slice(iv);
            output[IV_LEN..IV_LEN + input.len()].copy_from_slice(input);
            output[IV_LEN + input.len()..needed].fill(0);
            Ok(needed)
        }
    }
}
