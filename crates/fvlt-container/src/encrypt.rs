//! Encryption pipeline
//!
//! ```text
//! GenerateParams → DeriveKey → BuildHeader → WriteHeader
//!   → Encrypt → WriteCiphertext → WriteTag → Done
//! ```
//! Plaintext and key buffers zeroize on drop, on every exit path.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fvlt_core::{FvltError, FvltResult};
use fvlt_crypto::{derive_key, generate_nonce, seal_in_place, KdfParams, TAG_SIZE};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::header::ContainerHeader;
use crate::options::ContainerOptions;
use crate::output::AtomicOutput;
use crate::{check_input_file, report, ProgressFn};

const STEPS: u64 = 4;

/// Result of encrypting a single file
#[derive(Debug, Clone)]
pub struct EncryptReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub original_size: u64,
    /// Header + ciphertext + tag
    pub container_size: u64,
    pub elapsed: Duration,
}

/// Encrypt `plaintext` into a complete container written to `writer`.
///
/// `name` is recorded in the header as the original filename.
pub fn seal_to_writer<W: Write>(
    plaintext: &[u8],
    name: &str,
    password: &SecretString,
    options: &ContainerOptions,
    writer: &mut W,
) -> FvltResult<ContainerHeader> {
    let mut buffer = Zeroizing::new(plaintext.to_vec());
    seal_buffer(&mut buffer, name, password, options, writer, None)
}

/// Encrypts `buffer` in place; on return it holds ciphertext, not plaintext.
fn seal_buffer<W: Write>(
    buffer: &mut [u8],
    name: &str,
    password: &SecretString,
    options: &ContainerOptions,
    writer: &mut W,
    progress: Option<&ProgressFn>,
) -> FvltResult<ContainerHeader> {
    if password.expose_secret().is_empty() {
        return Err(FvltError::InvalidInput("password must not be empty".into()));
    }

    let params = KdfParams::generate(options.kdf_iterations)?;
    let nonce = generate_nonce();
    debug!(iterations = params.iterations, "generated salt and nonce");

    let key = derive_key(password, &params.salt, params.iterations)?;
    report(progress, 1, STEPS, "key derived");

    let header = ContainerHeader::new(params.salt, nonce, buffer.len() as u64, name)?;
    header.write_to(writer)?;
    debug!(name_len = name.len(), header_bytes = header.size(), "wrote header");

    let tag = seal_in_place(&key, &nonce, buffer)?;
    drop(key);
    report(progress, 2, STEPS, "encrypted");

    writer.write_all(buffer)?;
    writer.write_all(&tag)?;
    writer.flush()?;
    debug!(bytes = buffer.len(), tag_bytes = TAG_SIZE, "wrote ciphertext and tag");
    report(progress, 3, STEPS, "written");

    Ok(header)
}

/// Encrypt the file at `input` into a container at `output`.
pub fn encrypt_file(
    input: &Path,
    output: &Path,
    password: &SecretString,
    options: &ContainerOptions,
) -> FvltResult<EncryptReport> {
    encrypt_file_with_progress(input, output, password, options, None)
}

pub fn encrypt_file_with_progress(
    input: &Path,
    output: &Path,
    password: &SecretString,
    options: &ContainerOptions,
    progress: Option<&ProgressFn>,
) -> FvltResult<EncryptReport> {
    let started = Instant::now();
    if input == output {
        return Err(FvltError::InvalidInput(
            "input and output must be different files".into(),
        ));
    }
    check_input_file(input, options.max_file_size)?;

    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut buffer = Zeroizing::new(std::fs::read(input)?);
    let original_size = buffer.len() as u64;

    let mut out = AtomicOutput::create(output, options.overwrite)?;
    let header = seal_buffer(&mut buffer, &name, password, options, out.file(), progress)?;
    out.commit()?;
    report(progress, STEPS, STEPS, "done");

    let report = EncryptReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        original_size,
        container_size: (header.size() + TAG_SIZE) as u64 + original_size,
        elapsed: started.elapsed(),
    };
    info!(
        input = %input.display(),
        output = %output.display(),
        bytes = original_size,
        "encrypted"
    );
    Ok(report)
}
