//! File encryption and verification operations
//!
//! High-level operations on top of [`Gateway`] used by the command-line tool.

use crate::error::{EncshimError, ErrorCategory, ErrorKind, Result};
use crate::gateway::Gateway;
use crate::iv::{CiphertextPrefixIv, IvSource};
use crate::transform::Transform;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use zeroize::Zeroizing;

/// Outcome of [`verify_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub plaintext_len: usize,
    pub expected_len: usize,
    pub output_len: usize,
    pub matches: bool,
}

/// Encrypt a file
///
/// Reads plaintext from `input_path`, encrypts it under the IV from
/// `iv_source`, and writes the output bytes to `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_file<T: Transform>(
    input_path: &Path,
    output_path: &Path,
    iv_source: &mut dyn IvSource,
    gateway: &Gateway<T>,
) -> Result<usize> {
    let plaintext = read_secret(input_path)?;
    let iv = iv_source.read_iv()?;
    let output = gateway
        .encrypt(&plaintext, &iv)
        .map_err(|e| e.with_context(format!("failed to encrypt {}", input_path.display())))?;
    write_file_secure(output_path, &output)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    tracing::info!(
        input = %input_path.display(),
        output = %output_path.display(),
        bytes = output.len(),
        "encrypted file"
    );
    Ok(output.len())
}

/// Check that encrypting `plain_path` reproduces `expected_path` exactly
///
/// The IV is taken from the start of the expected ciphertext.
pub fn verify_file<T: Transform>(
    plain_path: &Path,
    expected_path: &Path,
    gateway: &Gateway<T>,
) -> Result<Verification> {
    let plaintext = read_secret(plain_path)?;
    let expected = fs::read(expected_path).map_err(|e| read_error(expected_path, e))?;
    let iv = CiphertextPrefixIv::new(expected_path).read_iv()?;

    tracing::debug!(iv = %hex::encode(&*iv), "verifying with initialization vector");

    let output = gateway
        .encrypt(&plaintext, &iv)
        .map_err(|e| e.with_context(format!("failed to encrypt {}", plain_path.display())))?;

    Ok(Verification {
        plaintext_len: plaintext.len(),
        expected_len: expected.len(),
        output_len: output.len(),
        matches: output == expected,
    })
}

/// Report how many bytes encrypting `input_path` would produce
pub fn required_len<T: Transform>(
    input_path: &Path,
    iv_source: &mut dyn IvSource,
    gateway: &Gateway<T>,
) -> Result<usize> {
    let plaintext = read_secret(input_path)?;
    let iv = iv_source.read_iv()?;
    gateway.required_len(&plaintext, &iv)
}

fn read_secret(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    fs::read(path)
        .map(Zeroizing::new)
        .map_err(|e| read_error(path, e))
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                EncshimError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            EncshimError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            EncshimError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> EncshimError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    EncshimError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
