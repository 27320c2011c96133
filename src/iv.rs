//! Initialization vector sources

use crate::error::{EncshimError, ErrorCategory, ErrorKind, Result};
use crate::gateway::IV_LEN;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fs;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Trait for obtaining an initialization vector
pub trait IvSource {
    /// Produce the IV bytes.
    ///
    /// No length check is applied here; the external routine is the
    /// authority on acceptable IV lengths.
    fn read_iv(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// A fixed IV given as hex
pub struct HexIv {
    hex: String,
}

impl HexIv {
    pub fn new(hex: impl Into<String>) -> Self {
        Self { hex: hex.into() }
    }
}

impl IvSource for HexIv {
    fn read_iv(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let bytes = hex::decode(self.hex.trim()).map_err(|e| {
            EncshimError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::IvUnavailable,
                format!("invalid hex initialization vector: {}", e),
                e,
            )
        })?;
        Ok(Zeroizing::new(bytes))
    }
}

/// Whole contents of a file
pub struct FileIv {
    path: PathBuf,
}

impl FileIv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IvSource for FileIv {
    fn read_iv(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let bytes = fs::read(&self.path).map_err(|e| {
            EncshimError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::IvUnavailable,
                format!("failed to read initialization vector from {}", self.path.display()),
                e,
            )
        })?;
        Ok(Zeroizing::new(bytes))
    }
}

/// Fresh random bytes from the OS on every read
pub struct RandomIv;

impl IvSource for RandomIv {
    fn read_iv(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut iv = Zeroizing::new(vec![0u8; IV_LEN]);
        OsRng.try_fill_bytes(&mut iv).map_err(|e| {
            EncshimError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::IvUnavailable,
                "OS random number generator failed",
                e,
            )
        })?;
        Ok(iv)
    }
}

/// The leading [`IV_LEN`] bytes of an existing ciphertext
///
/// Output of the legacy routine starts with the IV it was produced under,
/// so a known-good ciphertext carries everything needed to reproduce it.
pub struct CiphertextPrefixIv {
    path: PathBuf,
}

impl CiphertextPrefixIv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IvSource for CiphertextPrefixIv {
    fn read_iv(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut iv = FileIv::new(self.path.clone()).read_iv()?;
        if iv.len() < IV_LEN {
            return Err(EncshimError::with_kind(
                ErrorCategory::User,
                ErrorKind::IvUnavailable,
                format!(
                    "{} is {} bytes; too short to carry a {} byte initialization vector",
                    self.path.display(),
                    iv.len(),
                    IV_LEN
                ),
            ));
        }
        iv.truncate(IV_LEN);
        Ok(iv)
    }
}
