//! Key derivation: PBKDF2-HMAC-SHA256 password → AES-256 key

use fvlt_core::config::{DEFAULT_KDF_ITERATIONS, MAX_KDF_ITERATIONS, MIN_KDF_ITERATIONS};
use fvlt_core::{FvltError, FvltResult};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::random::generate_salt;
use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit key derived from a password.
///
/// Zeroized on drop to prevent secrets lingering in memory.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    pub salt: [u8; SALT_SIZE],
    pub iterations: u32,
    pub key_length: usize,
}

impl KdfParams {
    /// Fresh parameters with a random salt.
    pub fn generate(iterations: u32) -> FvltResult<Self> {
        Self::new(generate_salt(), iterations)
    }

    pub fn new(salt: [u8; SALT_SIZE], iterations: u32) -> FvltResult<Self> {
        let params = Self {
            salt,
            iterations,
            key_length: KEY_SIZE,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> FvltResult<()> {
        validate_iterations(self.iterations)?;
        if self.key_length != KEY_SIZE {
            return Err(FvltError::InvalidInput(format!(
                "key length must be {KEY_SIZE} bytes, got {}",
                self.key_length
            )));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: [0u8; SALT_SIZE],
            iterations: DEFAULT_KDF_ITERATIONS,
            key_length: KEY_SIZE,
        }
    }
}

fn validate_iterations(iterations: u32) -> FvltResult<()> {
    if !(MIN_KDF_ITERATIONS..=MAX_KDF_ITERATIONS).contains(&iterations) {
        return Err(FvltError::InvalidInput(format!(
            "KDF iterations must be within {MIN_KDF_ITERATIONS}..={MAX_KDF_ITERATIONS}, got {iterations}"
        )));
    }
    Ok(())
}

/// Derive a 256-bit key from a password and salt using PBKDF2-HMAC-SHA256.
///
/// Deterministic for identical inputs. Nothing is cached between calls.
pub fn derive_key(password: &SecretString, salt: &[u8], iterations: u32) -> FvltResult<DerivedKey> {
    validate_iterations(iterations)?;
    if salt.is_empty() {
        return Err(FvltError::InvalidInput("KDF salt must not be empty".into()));
    }

    // Derived straight into the zeroize-on-drop buffer
    let mut key = DerivedKey::from_bytes([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        iterations,
        &mut key.bytes,
    );

    tracing::trace!(iterations, salt_len = salt.len(), "derived key");
    Ok(key)
}

/// Derive a key from a full parameter set.
pub fn derive_key_with_params(password: &SecretString, params: &KdfParams) -> FvltResult<DerivedKey> {
    params.validate()?;
    derive_key(password, &params.salt, params.iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    const FAST_ITERATIONS: u32 = MIN_KDF_ITERATIONS;

    #[test]
    fn test_kdf_deterministic() {
        let password = SecretString::from("test-password-123");
        let salt = [1u8; SALT_SIZE];

        let key1 = derive_key(&password, &salt, FAST_ITERATIONS).unwrap();
        let key2 = derive_key(&password, &salt, FAST_ITERATIONS).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes(), "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_passwords() {
        let salt = [1u8; SALT_SIZE];

        let key1 = derive_key(&SecretString::from("password-a"), &salt, FAST_ITERATIONS).unwrap();
        let key2 = derive_key(&SecretString::from("password-b"), &salt, FAST_ITERATIONS).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different passwords must produce different keys"
        );
    }

    #[test]
    fn test_kdf_different_salts() {
        let password = SecretString::from("same-password");

        let key1 = derive_key(&password, &[1u8; SALT_SIZE], FAST_ITERATIONS).unwrap();
        let key2 = derive_key(&password, &[2u8; SALT_SIZE], FAST_ITERATIONS).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different salts must produce different keys"
        );
    }

    #[test]
    fn test_kdf_different_iterations() {
        let password = SecretString::from("same-password");
        let salt = [7u8; SALT_SIZE];

        let key1 = derive_key(&password, &salt, 1000).unwrap();
        let key2 = derive_key(&password, &salt, 1001).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_pbkdf2_sha256_known_answer() {
        // PBKDF2-HMAC-SHA256, P = "password", S = "salt", c = 4096, dkLen = 32
        let expected =
            hex::decode("c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a").unwrap();
        let key = derive_key(&SecretString::from("password"), b"salt", 4096).unwrap();
        assert_eq!(key.as_bytes().as_slice(), expected.as_slice());
    }

    #[test]
    fn test_iteration_bounds() {
        let password = SecretString::from("pw");
        let salt = [0u8; SALT_SIZE];

        assert!(matches!(
            derive_key(&password, &salt, MIN_KDF_ITERATIONS - 1),
            Err(FvltError::InvalidInput(_))
        ));
        assert!(matches!(
            derive_key(&password, &salt, MAX_KDF_ITERATIONS + 1),
            Err(FvltError::InvalidInput(_))
        ));
        assert!(matches!(
            derive_key(&password, &[], MIN_KDF_ITERATIONS),
            Err(FvltError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_params_generate_fresh_salts() {
        let p1 = KdfParams::generate(FAST_ITERATIONS).unwrap();
        let p2 = KdfParams::generate(FAST_ITERATIONS).unwrap();
        assert_ne!(p1.salt, p2.salt);
        assert_eq!(p1.key_length, KEY_SIZE);
    }

    #[test]
    fn test_params_reject_wrong_key_length() {
        let params = KdfParams {
            key_length: 16,
            ..KdfParams::default()
        };
        assert!(derive_key_with_params(&SecretString::from("pw"), &params).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = DerivedKey::from_bytes([0xAB; KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("171"));
    }
}
