//! fvlt-crypto: password-based authenticated encryption for FileVault containers
//!
//! Pipeline per file:
//! ```text
//! password ──PBKDF2-HMAC-SHA256(salt[32], iterations)──▶ key[32]
//! plaintext ──AES-256-GCM(key, nonce[12], no AAD)──▶ ciphertext ‖ tag[16]
//! ```
//!
//! Every file gets its own random salt and nonce, so a derived key is never
//! used for more than one encryption.

pub mod cipher;
pub mod kdf;
pub mod password;
pub mod random;

pub use cipher::{decrypt, encrypt, open_in_place, seal_in_place, SealedPayload};
pub use kdf::{derive_key, derive_key_with_params, DerivedKey, KdfParams};
pub use password::{check_strength, PasswordPolicy, PasswordStrength};
pub use random::{generate_nonce, generate_salt};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of a GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the per-file KDF salt
pub const SALT_SIZE: usize = 32;
