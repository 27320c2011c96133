//! C ABI for hosts embedding the shim
//!
//! The host passes two borrowed byte ranges and a completion callback. The
//! callback is a plain function pointer, so it can never be absent. It
//! receives either an error (and a null result) or a success marker and a
//! [`RustSlice`] the host owns until it calls [`encshim_rust_slice_free`].

use crate::error::{EncshimError, ErrorKind};
use crate::gateway::{Gateway, TRANSFORM_MSG, VALIDATION_MSG};
use crate::transform::Transform;
use std::ffi::c_void;

const INPUT_MSG: &str = "arg 1 (input) is empty or not a Buffer";
const IV_MSG: &str = "arg 2 (init vector) is empty or not a Buffer";
const INTERNAL_MSG: &str = "encrypt returned an inconsistent output length";

/// Borrowed bytes owned by the host. A null `ptr` means the argument is absent.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct CSlice {
    pub ptr: *const u8,
    pub len: usize,
}

impl CSlice {
    pub const fn new(value: &'static [u8]) -> Self {
        Self {
            ptr: value.as_ptr(),
            len: value.len(),
        }
    }

    pub const fn none() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
        }
    }

    /// # Safety
    ///
    /// A non-null `ptr` must point at `len` readable bytes that stay valid
    /// for `'a`.
    pub unsafe fn as_option<'a>(self) -> Option<&'a [u8]> {
        if self.ptr.is_null() {
            None
        } else {
            Some(unsafe { std::slice::from_raw_parts(self.ptr, self.len) })
        }
    }
}

/// Bytes allocated by Rust and handed to the host.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct RustSlice {
    pub ptr: *mut u8,
    pub len: usize,
    pub cap: usize,
}

impl RustSlice {
    pub const fn none() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

impl From<Vec<u8>> for RustSlice {
    fn from(mut value: Vec<u8>) -> Self {
        let slice = RustSlice {
            ptr: value.as_mut_ptr(),
            len: value.len(),
            cap: value.capacity(),
        };
        std::mem::forget(value);
        slice
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn encshim_rust_slice_null() -> RustSlice {
    RustSlice::none()
}

/// Release bytes previously delivered through a completion callback.
///
/// Freeing a null slice is a no-op, so double frees through the same
/// `RustSlice` are harmless.
#[unsafe(no_mangle)]
pub extern "C" fn encshim_rust_slice_free(slice: &mut RustSlice) {
    if !slice.ptr.is_null() && slice.cap > 0 {
        drop(unsafe { Vec::from_raw_parts(slice.ptr, slice.len, slice.cap) });
    }
    *slice = RustSlice::none();
}

/// Error passed to the completion callback. `kind == 0` means success.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct Error {
    pub kind: u32,
    pub status: i32,
    pub msg: CSlice,
}

impl Error {
    pub const fn none() -> Self {
        Self {
            kind: 0,
            status: 0,
            msg: CSlice::none(),
        }
    }

    pub const fn new(kind: u32, status: i32, msg: &'static str) -> Self {
        Self {
            kind,
            status,
            msg: CSlice::new(msg.as_bytes()),
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == 0
    }
}

impl From<&EncshimError> for Error {
    fn from(err: &EncshimError) -> Self {
        let kind = err.kind.unwrap_or(ErrorKind::InternalInvariant);
        let status = err.status.unwrap_or_default();
        let msg = match kind {
            ErrorKind::InputArgument => INPUT_MSG,
            ErrorKind::IvArgument => IV_MSG,
            ErrorKind::Validation => VALIDATION_MSG,
            ErrorKind::Transform => TRANSFORM_MSG,
            _ => INTERNAL_MSG,
        };
        Self::new(kind.code(), status, msg)
    }
}

/// Completion callback: `(user_data, error, result)`.
pub type Completion = extern "C" fn(user_data: *mut c_void, error: Error, result: RustSlice);

/// Validate host arguments, run `gateway`, and call `on_done` exactly once.
///
/// # Safety
///
/// Non-null `input` and `iv` must satisfy [`CSlice::as_option`].
pub unsafe fn dispatch<T: Transform>(
    gateway: &Gateway<T>,
    input: CSlice,
    iv: CSlice,
    on_done: Completion,
    user_data: *mut c_void,
) {
    let Some(input) = (unsafe { input.as_option() }) else {
        on_done(
            user_data,
            Error::new(ErrorKind::InputArgument.code(), 0, INPUT_MSG),
            RustSlice::none(),
        );
        return;
    };

    let Some(iv) = (unsafe { iv.as_option() }) else {
        on_done(
            user_data,
            Error::new(ErrorKind::IvArgument.code(), 0, IV_MSG),
            RustSlice::none(),
        );
        return;
    };

    gateway.invoke(input, iv, |result| match result {
        Ok(output) => on_done(user_data, Error::none(), output.into()),
        Err(err) => on_done(user_data, Error::from(&err), RustSlice::none()),
    });
}

/// Encrypt with the routine linked into this library.
///
/// # Safety
///
/// Non-null `input` and `iv` must point at `len` readable bytes for the
/// duration of the call.
#[cfg(feature = "linked")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encshim_encrypt(
    input: CSlice,
    iv: CSlice,
    on_done: Completion,
    user_data: *mut c_void,
) {
    let gateway = Gateway::new(crate::transform::LinkedTransform);
    unsafe { dispatch(&gateway, input, iv, on_done, user_data) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IV_LEN;
    use crate::error::ErrorCategory;
    use crate::transform::Status;
    use crate::transform::testing::{LegacyDouble, legacy_len};
    use std::cell::Cell;

    #[derive(Default)]
    struct Outcome {
        calls: usize,
        kind: u32,
        status: i32,
        msg: Vec<u8>,
        result: Option<Vec<u8>>,
    }

    extern "C" fn record(user_data: *mut c_void, error: Error, mut result: RustSlice) {
        let outcome = unsafe { &mut *user_data.cast::<Outcome>() };
        outcome.calls += 1;
        outcome.kind = error.kind;
        outcome.status = error.status;
        outcome.msg = unsafe { error.msg.as_option() }.unwrap_or_default().to_vec();
        if !result.is_null() {
            let bytes = unsafe { std::slice::from_raw_parts(result.ptr, result.len) }.to_vec();
            outcome.result = Some(bytes);
        }
        encshim_rust_slice_free(&mut result);
    }

    fn run<T: Transform>(gateway: &Gateway<T>, input: CSlice, iv: CSlice) -> Outcome {
        let mut outcome = Outcome::default();
        let user_data = std::ptr::from_mut(&mut outcome).cast::<c_void>();
        unsafe { dispatch(gateway, input, iv, record, user_data) };
        outcome
    }

    fn slice(bytes: &[u8]) -> CSlice {
        CSlice {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
        }
    }

    struct Counting<'a>(&'a Cell<usize>);

    impl Transform for Counting<'_> {
        fn transform(
            &self,
            _input: &[u8],
            _iv: &[u8],
            _output: Option<&mut [u8]>,
        ) -> Result<usize, Status> {
            self.0.set(self.0.get() + 1);
            Ok(0)
        }
    }

    #[test]
    fn test_null_input_reports_argument_error() {
        let calls = Cell::new(0);
        let gateway = Gateway::new(Counting(&calls));
        let outcome = run(&gateway, CSlice::none(), slice(&[0; IV_LEN]));

        assert_eq!(outcome.calls, 1);
        assert_eq!(outcome.kind, ErrorKind::InputArgument.code());
        assert_eq!(outcome.msg, INPUT_MSG.as_bytes());
        assert!(outcome.result.is_none());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_null_iv_reports_argument_error() {
        let calls = Cell::new(0);
        let gateway = Gateway::new(Counting(&calls));
        let outcome = run(&gateway, slice(b"data"), CSlice::none());

        assert_eq!(outcome.calls, 1);
        assert_eq!(outcome.kind, ErrorKind::IvArgument.code());
        assert_eq!(outcome.msg, IV_MSG.as_bytes());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_zero_length_input_is_not_absent() {
        let gateway = Gateway::new(LegacyDouble);
        let outcome = run(&gateway, slice(&[]), slice(&[3; IV_LEN]));

        assert_eq!(outcome.kind, 0);
        assert_eq!(outcome.result.unwrap().len(), legacy_len(0));
    }

    #[test]
    fn test_success_transfers_output() {
        let gateway = Gateway::new(LegacyDouble);
        let iv = [9u8; IV_LEN];
        let outcome = run(&gateway, slice(b"payload"), slice(&iv));

        assert_eq!(outcome.calls, 1);
        assert_eq!(outcome.kind, 0);
        assert!(outcome.msg.is_empty());
        let result = outcome.result.unwrap();
        assert_eq!(result.len(), legacy_len(7));
        assert_eq!(&result[..IV_LEN], &iv);
    }

    #[test]
    fn test_validation_error_message() {
        let gateway = Gateway::new(LegacyDouble);
        let outcome = run(&gateway, slice(b"payload"), slice(&[0; 12]));

        assert_eq!(outcome.kind, ErrorKind::Validation.code());
        assert_eq!(outcome.status, 1);
        assert_eq!(outcome.msg, VALIDATION_MSG.as_bytes());
        assert!(outcome.result.is_none());
    }

    #[test]
    fn test_error_conversion_keeps_status() {
        let err = EncshimError::with_status(
            ErrorCategory::Internal,
            ErrorKind::Transform,
            -22,
            TRANSFORM_MSG,
        );
        let error = Error::from(&err);
        assert_eq!(error.kind, ErrorKind::Transform.code());
        assert_eq!(error.status, -22);
        assert!(!error.is_none());
    }

    #[test]
    fn test_free_resets_slice() {
        let mut slice = RustSlice::from(vec![1u8, 2, 3]);
        encshim_rust_slice_free(&mut slice);
        assert!(slice.is_null());
        encshim_rust_slice_free(&mut slice);
        assert!(encshim_rust_slice_null().is_null());
    }
}
