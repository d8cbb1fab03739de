use fvlt_core::FvltConfig;

/// Per-call pipeline settings. Built from [`FvltConfig`] and passed
/// explicitly; nothing in the pipelines reads process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOptions {
    /// PBKDF2 iterations. Not recorded in the header, so decryption must
    /// use the value encryption used.
    pub kdf_iterations: u32,
    /// Compare the stored header checksum before decrypting
    pub verify_header_checksum: bool,
    /// Largest plaintext accepted (the whole payload is held in memory)
    pub max_file_size: u64,
    /// Replace an existing output file
    pub overwrite: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self::from(&FvltConfig::default())
    }
}

impl From<&FvltConfig> for ContainerOptions {
    fn from(config: &FvltConfig) -> Self {
        Self {
            kdf_iterations: config.crypto.kdf_iterations,
            verify_header_checksum: config.crypto.verify_header_checksum,
            max_file_size: config.files.max_file_size,
            overwrite: config.files.overwrite,
        }
    }
}

impl ContainerOptions {
    pub fn with_iterations(mut self, kdf_iterations: u32) -> Self {
        self.kdf_iterations = kdf_iterations;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvlt_core::config::DEFAULT_KDF_ITERATIONS;

    #[test]
    fn test_defaults_follow_config() {
        let options = ContainerOptions::default();
        assert_eq!(options.kdf_iterations, DEFAULT_KDF_ITERATIONS);
        assert!(options.verify_header_checksum);
        assert!(!options.overwrite);
    }

    #[test]
    fn test_from_config() {
        let mut config = FvltConfig::default();
        config.crypto.kdf_iterations = 5000;
        config.files.overwrite = true;
        config.files.max_file_size = 4096;

        let options = ContainerOptions::from(&config);
        assert_eq!(options.kdf_iterations, 5000);
        assert!(options.overwrite);
        assert_eq!(options.max_file_size, 4096);
    }
}
