//! Verification engine
//!
//! Structural checks run in a fixed order and stop at the first failure:
//! accessible → magic → header → size. None of them need the password.
//! [`verify_deep`] adds a full decryption dry run on top.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::time::Instant;

use fvlt_core::{VerificationResult, VerificationSummary};
use fvlt_crypto::TAG_SIZE;
use rayon::prelude::*;
use secrecy::SecretString;
use tracing::debug;

use crate::decrypt::open_from_reader;
use crate::header::{has_magic, ContainerHeader, MAGIC};
use crate::options::ContainerOptions;

/// Password-free structural verification of one container.
pub fn verify_file(path: &Path) -> VerificationResult {
    let started = Instant::now();
    let mut result = VerificationResult::new(path);
    run_checks(path, &mut result);
    result.elapsed = started.elapsed();
    debug!(path = %path.display(), valid = result.is_valid, "verified");
    result
}

fn run_checks(path: &Path, result: &mut VerificationResult) {
    let meta = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        Ok(_) => {
            result.error = Some("not a regular file".into());
            return;
        }
        Err(e) => {
            result.error = Some(format!("file not accessible: {e}"));
            return;
        }
    };
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            result.error = Some(format!("file not accessible: {e}"));
            return;
        }
    };
    result.file_accessible = true;
    result.file_size = meta.len();

    let mut magic = [0u8; MAGIC.len()];
    if file.read_exact(&mut magic).is_err() || !has_magic(&magic) {
        result.error = Some("not a FileVault container (magic mismatch)".into());
        return;
    }
    result.format_valid = true;

    let header = match file
        .rewind()
        .map_err(Into::into)
        .and_then(|()| ContainerHeader::read_from(&mut BufReader::new(&mut file)))
        .and_then(|h| h.validate(true).map(|()| h))
    {
        Ok(h) => h,
        Err(e) => {
            result.error = Some(e.to_string());
            return;
        }
    };
    result.header_valid = true;
    result.original_name = Some(header.original_name.clone());
    result.original_size = Some(header.original_size);
    result.algorithm = header.algorithm_name().map(str::to_owned);
    result.format_version = Some(header.version);

    // Exact length: header ‖ ciphertext (original_size bytes) ‖ tag
    let Some(expected) = expected_container_size(&header) else {
        result.error = Some(format!(
            "recorded original size {} overflows the container length",
            header.original_size
        ));
        return;
    };
    if result.file_size != expected {
        result.error = Some(format!(
            "file size {} does not match the {expected} bytes the header implies",
            result.file_size
        ));
        return;
    }
    result.size_consistent = true;
    result.is_valid = true;
}

/// Total on-disk length a container with `header` must have, or `None` if
/// the recorded original size cannot fit in a `u64` length.
pub fn expected_container_size(header: &ContainerHeader) -> Option<u64> {
    ((header.size() + TAG_SIZE) as u64).checked_add(header.original_size)
}

/// Structural verification followed by a decryption dry run. Nothing is
/// written to disk; the recovered plaintext is dropped (and zeroized).
pub fn verify_deep(
    path: &Path,
    password: &SecretString,
    options: &ContainerOptions,
) -> VerificationResult {
    let started = Instant::now();
    let mut result = verify_file(path);
    if !result.is_valid {
        return result;
    }

    let outcome = File::open(path)
        .map_err(Into::into)
        .and_then(|f| open_from_reader(&mut BufReader::new(f), password, options));
    match outcome {
        Ok(_) => result.content_verified = true,
        Err(e) => {
            result.is_valid = false;
            result.error = Some(e.to_string());
        }
    }
    result.elapsed = started.elapsed();
    result
}

/// Verify each path in turn. One failure never stops the batch.
pub fn batch_verify<P: AsRef<Path>>(paths: &[P]) -> Vec<VerificationResult> {
    paths.iter().map(|p| verify_file(p.as_ref())).collect()
}

/// [`batch_verify`] across the rayon pool; results keep input order.
pub fn par_batch_verify<P: AsRef<Path> + Sync>(paths: &[P]) -> Vec<VerificationResult> {
    paths.par_iter().map(|p| verify_file(p.as_ref())).collect()
}

pub fn summarize(results: &[VerificationResult]) -> VerificationSummary {
    VerificationSummary::from_results(results)
}
