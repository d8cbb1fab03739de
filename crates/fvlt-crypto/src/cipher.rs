//! AES-256-GCM with a detached authentication tag
//!
//! Ciphertext length always equals plaintext length (GCM has no padding);
//! the 16-byte tag is carried separately so the container can place it
//! after the payload.
//!
//! Decryption verifies the tag before any keystream is applied, so a
//! failed open never exposes partial plaintext.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use fvlt_core::{FvltError, FvltResult};
use zeroize::Zeroizing;

use crate::kdf::DerivedKey;
use crate::random::generate_nonce;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Output of [`encrypt`]: the nonce it chose plus ciphertext and detached tag.
#[derive(Debug, Clone)]
pub struct SealedPayload {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

/// Encrypt `plaintext` under a fresh random nonce.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> FvltResult<SealedPayload> {
    let nonce = generate_nonce();
    let mut ciphertext = plaintext.to_vec();
    let tag = seal_in_place(key, &nonce, &mut ciphertext)?;
    Ok(SealedPayload {
        nonce,
        ciphertext,
        tag,
    })
}

/// Decrypt and authenticate. Fails with [`FvltError::Authentication`] without
/// returning any plaintext if the tag does not verify.
pub fn decrypt(
    key: &DerivedKey,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
) -> FvltResult<Zeroizing<Vec<u8>>> {
    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    open_in_place(key, nonce, &mut buffer, tag)?;
    Ok(buffer)
}

/// Encrypt `buffer` in place with the given nonce and return the tag.
///
/// The caller is responsible for never reusing `nonce` with the same key.
pub fn seal_in_place(
    key: &DerivedKey,
    nonce: &[u8; NONCE_SIZE],
    buffer: &mut [u8],
) -> FvltResult<[u8; TAG_SIZE]> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), b"", buffer)
        .map_err(|_| FvltError::InvalidInput("payload exceeds the AES-GCM length limit".into()))?;

    let mut out = [0u8; TAG_SIZE];
    out.copy_from_slice(&tag);
    Ok(out)
}

/// Decrypt `buffer` in place. On failure the buffer still holds ciphertext.
pub fn open_in_place(
    key: &DerivedKey,
    nonce: &[u8; NONCE_SIZE],
    buffer: &mut [u8],
    tag: &[u8; TAG_SIZE],
) -> FvltResult<()> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt_in_place_detached(Nonce::from_slice(nonce), b"", buffer, Tag::from_slice(tag))
        .map_err(|_| FvltError::Authentication)
}
