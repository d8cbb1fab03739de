//! Decryption pipeline
//!
//! ```text
//! ReadHeader → ValidateHeader → ComputeOffsets → ReadCiphertextAndTag
//!   → DeriveKey → Decrypt → VerifySizeMatch → WriteOutput → Done
//! ```
//! Structural problems are reported before the key derivation runs.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fvlt_core::{FvltError, FvltResult};
use fvlt_crypto::{derive_key, open_in_place, TAG_SIZE};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::header::ContainerHeader;
use crate::options::ContainerOptions;
use crate::output::AtomicOutput;
use crate::{check_input_file, report, ProgressFn};

const STEPS: u64 = 4;

/// Result of decrypting a single container
#[derive(Debug, Clone)]
pub struct DecryptReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Filename recorded in the header at encryption time
    pub original_name: String,
    pub plaintext_size: u64,
    pub elapsed: Duration,
}

/// A decrypted container held in memory
pub struct Opened {
    pub header: ContainerHeader,
    pub plaintext: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for Opened {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opened")
            .field("header", &self.header)
            .field("plaintext", &format_args!("[{} bytes]", self.plaintext.len()))
            .finish()
    }
}

/// Read, authenticate and decrypt a whole container from `reader`.
pub fn open_from_reader<R: Read>(
    reader: &mut R,
    password: &SecretString,
    options: &ContainerOptions,
) -> FvltResult<Opened> {
    open_inner(reader, password, options, None)
}

fn open_inner<R: Read>(
    reader: &mut R,
    password: &SecretString,
    options: &ContainerOptions,
    progress: Option<&ProgressFn>,
) -> FvltResult<Opened> {
    if password.expose_secret().is_empty() {
        return Err(FvltError::InvalidInput("password must not be empty".into()));
    }

    let header = ContainerHeader::read_from(reader)?;
    if let Err(e) = header.validate(options.verify_header_checksum) {
        warn!(error = %e, "rejected container header");
        return Err(e);
    }
    debug!(
        version = header.version,
        original_size = header.original_size,
        name_len = header.original_name.len(),
        "header valid"
    );

    // Everything after the header is payload ‖ tag. Reading one byte past
    // the ceiling is enough to tell an oversized payload apart.
    let limit = options.max_file_size.saturating_add(TAG_SIZE as u64 + 1);
    let mut body = Zeroizing::new(Vec::new());
    reader.by_ref().take(limit).read_to_end(&mut body)?;

    if body.len() < TAG_SIZE {
        return Err(FvltError::SizeMismatch {
            expected: header.original_size,
            actual: 0,
        });
    }
    let payload_len = body.len() - TAG_SIZE;
    if payload_len as u64 > options.max_file_size {
        return Err(FvltError::TooLarge {
            size: payload_len as u64,
            limit: options.max_file_size,
        });
    }
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&body[payload_len..]);
    body.truncate(payload_len);
    report(progress, 1, STEPS, "read");

    let key = derive_key(password, &header.salt, options.kdf_iterations)?;
    report(progress, 2, STEPS, "key derived");

    open_in_place(&key, &header.nonce(), &mut body, &tag)?;
    drop(key);

    if body.len() as u64 != header.original_size {
        return Err(FvltError::SizeMismatch {
            expected: header.original_size,
            actual: body.len() as u64,
        });
    }
    report(progress, 3, STEPS, "decrypted");

    Ok(Opened {
        header,
        plaintext: body,
    })
}

/// Decrypt the container at `input` into `output`.
pub fn decrypt_file(
    input: &Path,
    output: &Path,
    password: &SecretString,
    options: &ContainerOptions,
) -> FvltResult<DecryptReport> {
    decrypt_file_with_progress(input, output, password, options, None)
}

pub fn decrypt_file_with_progress(
    input: &Path,
    output: &Path,
    password: &SecretString,
    options: &ContainerOptions,
    progress: Option<&ProgressFn>,
) -> FvltResult<DecryptReport> {
    let started = Instant::now();
    if input == output {
        return Err(FvltError::InvalidInput(
            "input and output must be different files".into(),
        ));
    }
    check_input_file(input, u64::MAX)?;

    let mut reader = std::io::BufReader::new(std::fs::File::open(input)?);
    let opened = open_inner(&mut reader, password, options, progress)?;

    let mut out = AtomicOutput::create(output, options.overwrite)?;
    std::io::Write::write_all(out.file(), &opened.plaintext)?;
    out.commit()?;
    report(progress, STEPS, STEPS, "done");

    info!(
        input = %input.display(),
        output = %output.display(),
        bytes = opened.plaintext.len(),
        "decrypted"
    );
    Ok(DecryptReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        original_name: opened.header.original_name.clone(),
        plaintext_size: opened.plaintext.len() as u64,
        elapsed: started.elapsed(),
    })
}
