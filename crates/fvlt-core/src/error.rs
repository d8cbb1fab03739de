use std::io::ErrorKind;

use thiserror::Error;

pub type FvltResult<T> = Result<T, FvltError>;

#[derive(Debug, Error)]
pub enum FvltError {
    /// Bad magic, unsupported version/algorithm, or a header that ends early.
    #[error("invalid container format: {0}")]
    Format(String),

    /// Checksum mismatch, oversized name field, or an undecodable name.
    #[error("container header corrupted: {0}")]
    HeaderCorruption(String),

    /// AEAD tag did not verify. Wrong password and tampering look identical here.
    #[error("authentication failed: wrong password or corrupted data")]
    Authentication,

    #[error("size mismatch: header records {expected} bytes, recovered {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("input too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FvltError {
    /// Process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            FvltError::Io(e) if e.kind() == ErrorKind::NotFound => 2,
            FvltError::Io(e) if e.kind() == ErrorKind::PermissionDenied => 3,
            FvltError::Authentication => 4,
            FvltError::Format(_) | FvltError::HeaderCorruption(_) | FvltError::SizeMismatch { .. } => 5,
            FvltError::TooLarge { .. } => 6,
            FvltError::InvalidInput(_) => 7,
            _ => 1,
        }
    }

    /// Remediation hints shown by the CLI below the error message.
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            FvltError::Io(e) if e.kind() == ErrorKind::NotFound => &[
                "Verify the file path is correct",
                "Use an absolute path if the relative path does not resolve",
            ],
            FvltError::Io(e) if e.kind() == ErrorKind::AlreadyExists => &[
                "Use --force to overwrite the existing file",
                "Choose a different output filename",
            ],
            FvltError::Io(e) if e.kind() == ErrorKind::PermissionDenied => {
                &["Check the permissions of the file and its directory"]
            }
            FvltError::Authentication => &[
                "Make sure you are using the correct password",
                "Check that the file has not been modified or truncated",
                "Run `fvlt verify` to check the container structure",
            ],
            FvltError::Format(_) => &[
                "Verify the file was produced by fvlt",
                "Make sure you are using the correct file",
            ],
            FvltError::HeaderCorruption(_) | FvltError::SizeMismatch { .. } => &[
                "The container is damaged; restore it from a backup if possible",
            ],
            FvltError::TooLarge { .. } => &["Raise files.max_file_size in the configuration"],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let not_found = FvltError::Io(std::io::Error::new(ErrorKind::NotFound, "gone"));
        assert_eq!(not_found.exit_code(), 2);

        let denied = FvltError::Io(std::io::Error::new(ErrorKind::PermissionDenied, "no"));
        assert_eq!(denied.exit_code(), 3);

        assert_eq!(FvltError::Authentication.exit_code(), 4);
        assert_eq!(FvltError::Format("bad magic".into()).exit_code(), 5);
        assert_eq!(FvltError::HeaderCorruption("checksum".into()).exit_code(), 5);
        assert_eq!(
            FvltError::SizeMismatch { expected: 1, actual: 2 }.exit_code(),
            5
        );
        assert_eq!(FvltError::TooLarge { size: 2, limit: 1 }.exit_code(), 6);
        assert_eq!(FvltError::InvalidInput("empty".into()).exit_code(), 7);
        assert_eq!(FvltError::Config("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_authentication_message_is_generic() {
        let msg = FvltError::Authentication.to_string();
        assert!(msg.contains("wrong password or corrupted data"));
    }

    #[test]
    fn test_suggestions_present_for_user_errors() {
        assert!(!FvltError::Authentication.suggestions().is_empty());
        assert!(!FvltError::Format("x".into()).suggestions().is_empty());
        assert!(FvltError::Config("x".into()).suggestions().is_empty());
    }
}
