use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FvltError, FvltResult};

/// Lower bound on PBKDF2 iterations accepted anywhere in the stack.
pub const MIN_KDF_ITERATIONS: u32 = 1_000;

/// Upper bound on PBKDF2 iterations; rejects pathological configurations.
pub const MAX_KDF_ITERATIONS: u32 = 10_000_000;

/// Iteration count used when nothing else is configured.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const MIN_MAX_FILE_SIZE: u64 = 1024;

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FvltConfig {
    pub crypto: CryptoConfig,
    pub files: FilesConfig,
    pub password: PasswordConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iterations (default: 100000). Not stored in the
    /// container, so decryption must use the same value.
    pub kdf_iterations: u32,
    /// Recompute and compare the header checksum before decrypting (default: true)
    pub verify_header_checksum: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Largest input accepted, in bytes (default: 10 GiB). Inputs are held in memory.
    pub max_file_size: u64,
    /// Extension appended to encrypted outputs (default: ".enc")
    pub encrypted_extension: String,
    /// Replace existing output files (default: false)
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Minimum password length enforced by the CLI (default: 8)
    pub min_length: usize,
    /// Require upper, lower, digit and symbol characters (default: false)
    pub require_strong: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            verify_header_checksum: true,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024 * 1024,
            encrypted_extension: ".enc".into(),
            overwrite: false,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_strong: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl FvltConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> FvltResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: FvltConfig = toml::from_str(&content)
            .map_err(|e| FvltError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values outside the supported ranges.
    pub fn validate(&self) -> FvltResult<()> {
        let iterations = self.crypto.kdf_iterations;
        if !(MIN_KDF_ITERATIONS..=MAX_KDF_ITERATIONS).contains(&iterations) {
            return Err(FvltError::Config(format!(
                "crypto.kdf_iterations must be within {MIN_KDF_ITERATIONS}..={MAX_KDF_ITERATIONS}, got {iterations}"
            )));
        }

        let min_len = self.password.min_length;
        if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&min_len) {
            return Err(FvltError::Config(format!(
                "password.min_length must be within {MIN_PASSWORD_LENGTH}..={MAX_PASSWORD_LENGTH}, got {min_len}"
            )));
        }

        if self.files.max_file_size < MIN_MAX_FILE_SIZE {
            return Err(FvltError::Config(format!(
                "files.max_file_size must be at least {MIN_MAX_FILE_SIZE} bytes"
            )));
        }

        if !self.files.encrypted_extension.starts_with('.') || self.files.encrypted_extension.len() < 2 {
            return Err(FvltError::Config(format!(
                "files.encrypted_extension must look like \".enc\", got {:?}",
                self.files.encrypted_extension
            )));
        }

        match self.log.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(FvltError::Config(format!(
                "log.format must be \"json\" or \"text\", got {other:?}"
            ))),
        }
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[crypto]
kdf_iterations = 200000
verify_header_checksum = false

[files]
max_file_size = 1048576
encrypted_extension = ".fvlt"
overwrite = true

[password]
min_length = 12
require_strong = true

[log]
level = "debug"
format = "json"
"#;
        let config: FvltConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();

        assert_eq!(config.crypto.kdf_iterations, 200000);
        assert!(!config.crypto.verify_header_checksum);
        assert_eq!(config.files.max_file_size, 1048576);
        assert_eq!(config.files.encrypted_extension, ".fvlt");
        assert!(config.files.overwrite);
        assert_eq!(config.password.min_length, 12);
        assert!(config.password.require_strong);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: FvltConfig = toml::from_str("").unwrap();
        config.validate().unwrap();

        assert_eq!(config.crypto.kdf_iterations, DEFAULT_KDF_ITERATIONS);
        assert!(config.crypto.verify_header_checksum);
        assert_eq!(config.files.max_file_size, 10 * 1024 * 1024 * 1024);
        assert_eq!(config.files.encrypted_extension, ".enc");
        assert!(!config.files.overwrite);
        assert_eq!(config.password.min_length, 8);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[crypto]
kdf_iterations = 5000
"#;
        let config: FvltConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.crypto.kdf_iterations, 5000);
        // Defaults
        assert!(config.crypto.verify_header_checksum);
        assert_eq!(config.files.encrypted_extension, ".enc");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = FvltConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: FvltConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.crypto.kdf_iterations, parsed.crypto.kdf_iterations);
        assert_eq!(config.files.max_file_size, parsed.files.max_file_size);
        assert_eq!(config.log.level, parsed.log.level);
    }

    #[test]
    fn test_validate_rejects_iteration_extremes() {
        let mut config = FvltConfig::default();
        config.crypto.kdf_iterations = 999;
        assert!(matches!(config.validate(), Err(FvltError::Config(_))));

        config.crypto.kdf_iterations = MAX_KDF_ITERATIONS + 1;
        assert!(matches!(config.validate(), Err(FvltError::Config(_))));

        config.crypto.kdf_iterations = MAX_KDF_ITERATIONS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = FvltConfig::default();
        config.password.min_length = 4;
        assert!(config.validate().is_err());

        let mut config = FvltConfig::default();
        config.files.max_file_size = 10;
        assert!(config.validate().is_err());

        let mut config = FvltConfig::default();
        config.files.encrypted_extension = "enc".into();
        assert!(config.validate().is_err());

        let mut config = FvltConfig::default();
        config.log.format = "yaml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = FvltConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.crypto.kdf_iterations, DEFAULT_KDF_ITERATIONS);
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[crypto]\nkdf_iterations = 10\n").unwrap();
        assert!(matches!(FvltConfig::load(&path), Err(FvltError::Config(_))));

        std::fs::write(&path, "this is = = not toml").unwrap();
        assert!(matches!(FvltConfig::load(&path), Err(FvltError::Config(_))));
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(
            expand_tilde(Path::new("/etc/fvlt/config.toml")),
            PathBuf::from("/etc/fvlt/config.toml")
        );
    }
}
