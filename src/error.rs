use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to the caller.
    ///
    /// This includes non-zero statuses from the external routine that are
    /// not documented as parameter validation.
    Internal,

    /// The caller provided arguments the shim or the external routine
    /// rejects.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input buffer was absent at the host boundary.
    InputArgument,
    /// The initialization vector was absent at the host boundary.
    IvArgument,
    /// The sizing phase rejected the parameters (wrong IV length).
    Validation,
    /// The fill phase returned a non-zero status.
    Transform,
    /// The external routine reported something impossible, such as writing
    /// more bytes than it was given room for.
    InternalInvariant,
    /// The shared library holding the external routine could not be loaded
    /// or does not export the routine.
    Library,
    /// An initialization vector could not be obtained from its source.
    IvUnavailable,
    /// Interaction with the filesystem or stdout failed.
    Io,
}

impl ErrorKind {
    /// Stable numeric code used at the C ABI. Zero is reserved for success.
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::InputArgument => 1,
            ErrorKind::IvArgument => 2,
            ErrorKind::Validation => 3,
            ErrorKind::Transform => 4,
            ErrorKind::InternalInvariant => 5,
            ErrorKind::Library => 6,
            ErrorKind::IvUnavailable => 7,
            ErrorKind::Io => 8,
        }
    }
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct EncshimError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag. Any code consuming errors MUST
    /// handle the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    /// Status code returned by the external routine, when it caused the failure.
    pub status: Option<i32>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl EncshimError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            status: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            status: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error carrying the status code the external routine returned.
    pub fn with_status(
        category: ErrorCategory,
        kind: ErrorKind,
        status: i32,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            status: Some(status),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            status: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        let status = self.status;
        Self {
            category,
            kind,
            status,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, EncshimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_kind_and_status() {
        let err = EncshimError::with_status(
            ErrorCategory::Internal,
            ErrorKind::Transform,
            -7,
            "encrypt call did not return 0",
        )
        .with_context("failed to encrypt plain.bin");

        assert_eq!(err.kind, Some(ErrorKind::Transform));
        assert_eq!(err.status, Some(-7));
        assert_eq!(err.message(), "failed to encrypt plain.bin");
        assert_eq!(
            err.source_error().unwrap().to_string(),
            "encrypt call did not return 0"
        );
    }

    #[test]
    fn test_kind_codes_are_distinct_and_nonzero() {
        let kinds = [
            ErrorKind::InputArgument,
            ErrorKind::IvArgument,
            ErrorKind::Validation,
            ErrorKind::Transform,
            ErrorKind::InternalInvariant,
            ErrorKind::Library,
            ErrorKind::IvUnavailable,
            ErrorKind::Io,
        ];
        let mut codes: Vec<u32> = kinds.iter().map(|k| k.code()).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }
}
