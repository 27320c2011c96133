//! Two-phase encrypt gateway
//!
//! Marshals caller bytes into call-local buffers, asks the external routine
//! how large the output must be, allocates exactly that, and runs the
//! transform. Every outcome is a single [`Result`].

use crate::error::{EncshimError, ErrorCategory, ErrorKind, Result};
use crate::transform::Transform;
use zeroize::Zeroizing;

/// IV length the legacy external routine requires.
pub const IV_LEN: usize = 32;

pub(crate) const VALIDATION_MSG: &str = "encrypt validation failed (iv length must be 32)";
pub(crate) const TRANSFORM_MSG: &str = "encrypt call did not return 0";

/// Entry point for encrypting with a given external routine.
pub struct Gateway<T> {
    transform: T,
}

impl<T: Transform> Gateway<T> {
    pub fn new(transform: T) -> Self {
        Self { transform }
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Encrypt `input` under `iv` and return the output bytes.
    ///
    /// Neither slice is retained or written to. Statuses from the sizing
    /// phase are reported as [`ErrorKind::Validation`], statuses from the
    /// fill phase as [`ErrorKind::Transform`]; both keep the raw code in
    /// [`EncshimError::status`].
    pub fn encrypt(&self, input: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        let input = owned_copy(input);
        let iv = owned_copy(iv);
        let (input, iv) = (&input[..input.len() - 1], &iv[..iv.len() - 1]);

        let required = self.required_len_of(input, iv)?;

        let mut output = vec![0u8; required];
        let written = self
            .transform
            .transform(input, iv, Some(&mut output))
            .map_err(|status| {
                tracing::warn!(status = status.code(), "encrypt fill phase failed");
                EncshimError::with_status(
                    ErrorCategory::Internal,
                    ErrorKind::Transform,
                    status.code(),
                    TRANSFORM_MSG,
                )
            })?;

        if written > required {
            return Err(EncshimError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                format!(
                    "encrypt reported {} bytes written into a {} byte buffer",
                    written, required
                ),
            ));
        }
        output.truncate(written);

        tracing::debug!(
            input_len = input.len(),
            output_len = output.len(),
            "encrypt fill phase complete"
        );
        Ok(output)
    }

    /// Encrypt and deliver the outcome to `on_done`.
    ///
    /// `on_done` runs exactly once, on the calling thread, before this
    /// method returns.
    pub fn invoke<F>(&self, input: &[u8], iv: &[u8], on_done: F)
    where
        F: FnOnce(Result<Vec<u8>>),
    {
        on_done(self.encrypt(input, iv));
    }

    /// Run only the sizing phase.
    pub fn required_len(&self, input: &[u8], iv: &[u8]) -> Result<usize> {
        let input = owned_copy(input);
        let iv = owned_copy(iv);
        self.required_len_of(&input[..input.len() - 1], &iv[..iv.len() - 1])
    }

    fn required_len_of(&self, input: &[u8], iv: &[u8]) -> Result<usize> {
        let required = self.transform.transform(input, iv, None).map_err(|status| {
            tracing::warn!(
                status = status.code(),
                iv_len = iv.len(),
                "encrypt sizing phase rejected parameters"
            );
            EncshimError::with_status(
                ErrorCategory::User,
                ErrorKind::Validation,
                status.code(),
                VALIDATION_MSG,
            )
        })?;

        tracing::debug!(input_len = input.len(), required, "encrypt sizing phase complete");
        Ok(required)
    }
}

/// Call-local copy with one trailing NUL past the logical end.
fn owned_copy(bytes: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut copy = Zeroizing::new(Vec::with_capacity(bytes.len() + 1));
    copy.extend_from_slice(bytes);
    copy.push(0);
    copy
}
