use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of verifying one container. Produced fresh per call.
///
/// The four check flags are set in order and the first failing check stops
/// the run, so a `false` flag implies every later flag is `false` too.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Path that was verified
    pub path: PathBuf,
    /// All structural checks (and the decryption dry run, for deep checks) passed
    pub is_valid: bool,
    /// The path exists and is a regular file
    pub file_accessible: bool,
    /// The file starts with the container magic
    pub format_valid: bool,
    /// The header parses and passes validation
    pub header_valid: bool,
    /// The file length is exactly header + `original_size` ciphertext bytes + 16-byte tag
    pub size_consistent: bool,
    /// Deep checks only: the payload authenticated and matched the recorded size
    pub content_verified: bool,
    /// Size of the container on disk
    pub file_size: u64,
    pub original_name: Option<String>,
    pub original_size: Option<u64>,
    pub algorithm: Option<String>,
    pub format_version: Option<u32>,
    /// Reason for the first failed check
    pub error: Option<String>,
    /// Wall time spent verifying
    pub elapsed: Duration,
}

impl VerificationResult {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Aggregate counts over a batch of verification results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub accessible: usize,
    pub format_ok: usize,
    pub header_ok: usize,
    pub size_ok: usize,
}

impl VerificationSummary {
    pub fn from_results(results: &[VerificationResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };

        for r in results {
            if r.is_valid {
                summary.valid += 1;
            } else {
                summary.invalid += 1;
            }
            summary.accessible += usize::from(r.file_accessible);
            summary.format_ok += usize::from(r.format_valid);
            summary.header_ok += usize::from(r.header_valid);
            summary.size_ok += usize::from(r.size_consistent);
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let valid = VerificationResult {
            is_valid: true,
            file_accessible: true,
            format_valid: true,
            header_valid: true,
            size_consistent: true,
            ..VerificationResult::new("a.enc")
        };
        let not_container = VerificationResult {
            file_accessible: true,
            ..VerificationResult::new("b.txt")
        };
        let missing = VerificationResult::new("c.enc");

        let summary = VerificationSummary::from_results(&[valid, not_container, missing]);

        assert_eq!(
            summary,
            VerificationSummary {
                total: 3,
                valid: 1,
                invalid: 2,
                accessible: 2,
                format_ok: 1,
                header_ok: 1,
                size_ok: 1,
            }
        );
    }

    #[test]
    fn test_summary_empty() {
        assert_eq!(
            VerificationSummary::from_results(&[]),
            VerificationSummary::default()
        );
    }
}
