//! fvlt-container: the FileVault container format and the pipelines over it
//!
//! ```text
//! ┌────────────────────────────┬──────────────────────┬──────────┐
//! │ header (120 + name bytes)  │ ciphertext (n bytes) │ tag [16] │
//! └────────────────────────────┴──────────────────────┴──────────┘
//! ```
//!
//! Public surface:
//!   - [`encrypt_file`] / [`decrypt_file`]: whole-file pipelines with atomic output
//!   - [`seal_to_writer`] / [`open_from_reader`]: the same pipelines over any stream
//!   - [`verify_file`] / [`verify_deep`] / [`batch_verify`]: password-free structural checks

pub mod decrypt;
pub mod encrypt;
pub mod header;
pub mod options;
pub mod output;
pub mod verify;

pub use decrypt::{decrypt_file, decrypt_file_with_progress, open_from_reader, DecryptReport, Opened};
pub use encrypt::{encrypt_file, encrypt_file_with_progress, seal_to_writer, EncryptReport};
pub use header::{Algorithm, ContainerHeader, BASE_HEADER_SIZE, MAGIC, MAX_NAME_LEN};
pub use options::ContainerOptions;
pub use output::{default_decrypted_path, default_encrypted_path};
pub use verify::{
    batch_verify, expected_container_size, par_batch_verify, summarize, verify_deep, verify_file,
};

use std::path::Path;

use fvlt_core::{FvltError, FvltResult};

/// Progress callback type (step_done, steps_total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

pub(crate) fn report(progress: Option<&ProgressFn>, done: u64, total: u64, msg: &str) {
    if let Some(cb) = progress {
        cb(done, total, msg);
    }
}

/// The input must be a regular file no larger than `limit` bytes.
pub(crate) fn check_input_file(path: &Path, limit: u64) -> FvltResult<u64> {
    let meta = std::fs::metadata(path)?;
    if !meta.is_file() {
        return Err(FvltError::InvalidInput(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    if meta.len() > limit {
        return Err(FvltError::TooLarge {
            size: meta.len(),
            limit,
        });
    }
    Ok(meta.len())
}
