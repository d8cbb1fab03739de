//! Container header codec
//!
//! Layout (all integers little-endian):
//! ```text
//! magic[4] version u32 algorithm u32 salt[32] iv[16] original_size u64
//! name_len u32 name[name_len] reserved[32] checksum[16]
//! ```
//! The checksum is the first 16 bytes of SHA-256 over every preceding byte.
//! Parsing and validation are separate steps: [`ContainerHeader::read_from`]
//! only decodes, [`ContainerHeader::validate`] decides acceptability.

use std::io::{self, Read, Write};
use std::path::Path;

use fvlt_core::{FvltError, FvltResult};
use fvlt_crypto::{NONCE_SIZE, SALT_SIZE};
use sha2::{Digest, Sha256};

pub const MAGIC: [u8; 4] = *b"FVLT";
pub const FORMAT_VERSION: u32 = 1;
pub const IV_SIZE: usize = 16;
pub const RESERVED_SIZE: usize = 32;
pub const CHECKSUM_SIZE: usize = 16;

/// Longest original filename a header may carry.
pub const MAX_NAME_LEN: usize = 4096;

/// Header size with an empty filename.
pub const BASE_HEADER_SIZE: usize =
    4 + 4 + 4 + SALT_SIZE + IV_SIZE + 8 + 4 + RESERVED_SIZE + CHECKSUM_SIZE;

/// AEAD schemes a container may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Algorithm {
    Aes256Gcm = 1,
}

impl Algorithm {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Algorithm::Aes256Gcm),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Aes256Gcm => "AES-256-GCM",
        }
    }
}

/// Decoded container header. Lives for a single encrypt or decrypt call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub algorithm: u32,
    pub salt: [u8; SALT_SIZE],
    /// First 12 bytes are the GCM nonce, the rest stay zero.
    pub iv: [u8; IV_SIZE],
    pub original_size: u64,
    pub original_name: String,
    pub reserved: [u8; RESERVED_SIZE],
    pub checksum: [u8; CHECKSUM_SIZE],
}

impl ContainerHeader {
    /// Build a current-version header and seal it with its checksum.
    pub fn new(
        salt: [u8; SALT_SIZE],
        nonce: [u8; NONCE_SIZE],
        original_size: u64,
        original_name: &str,
    ) -> FvltResult<Self> {
        if original_name.len() > MAX_NAME_LEN {
            return Err(FvltError::InvalidInput(format!(
                "file name is {} bytes, limit is {MAX_NAME_LEN}",
                original_name.len()
            )));
        }

        let mut iv = [0u8; IV_SIZE];
        iv[..NONCE_SIZE].copy_from_slice(&nonce);

        let mut header = Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            algorithm: Algorithm::Aes256Gcm.id(),
            salt,
            iv,
            original_size,
            original_name: original_name.to_owned(),
            reserved: [0u8; RESERVED_SIZE],
            checksum: [0u8; CHECKSUM_SIZE],
        };
        header.checksum = header.compute_checksum();
        Ok(header)
    }

    /// Serialized length of this header.
    pub fn size(&self) -> usize {
        BASE_HEADER_SIZE + self.original_name.len()
    }

    pub fn nonce(&self) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&self.iv[..NONCE_SIZE]);
        nonce
    }

    pub fn algorithm_name(&self) -> Option<&'static str> {
        Algorithm::from_id(self.algorithm).map(Algorithm::name)
    }

    /// Every field before the checksum, in wire order.
    fn checksummed_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        buf.extend_from_slice(&self.magic);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.algorithm.to_le_bytes());
        buf.extend_from_slice(&self.salt);
        buf.extend_from_slice(&self.iv);
        buf.extend_from_slice(&self.original_size.to_le_bytes());
        buf.extend_from_slice(&(self.original_name.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.original_name.as_bytes());
        buf.extend_from_slice(&self.reserved);
        buf
    }

    pub fn compute_checksum(&self) -> [u8; CHECKSUM_SIZE] {
        let digest = Sha256::digest(self.checksummed_bytes());
        let mut checksum = [0u8; CHECKSUM_SIZE];
        checksum.copy_from_slice(&digest[..CHECKSUM_SIZE]);
        checksum
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.checksummed_bytes();
        buf.extend_from_slice(&self.checksum);
        buf
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> FvltResult<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Decode a header without judging it.
    ///
    /// A stream that ends early is a format error; a name field over
    /// [`MAX_NAME_LEN`] or not valid UTF-8 is header corruption.
    pub fn read_from<R: Read>(reader: &mut R) -> FvltResult<Self> {
        let magic: [u8; 4] = read_array(reader, "magic")?;
        let version = u32::from_le_bytes(read_array(reader, "version")?);
        let algorithm = u32::from_le_bytes(read_array(reader, "algorithm")?);
        let salt: [u8; SALT_SIZE] = read_array(reader, "salt")?;
        let iv: [u8; IV_SIZE] = read_array(reader, "iv")?;
        let original_size = u64::from_le_bytes(read_array(reader, "original size")?);

        let name_len = u32::from_le_bytes(read_array(reader, "name length")?) as usize;
        if name_len > MAX_NAME_LEN {
            return Err(FvltError::HeaderCorruption(format!(
                "name length {name_len} exceeds {MAX_NAME_LEN}"
            )));
        }
        let mut name = vec![0u8; name_len];
        read_field(reader, &mut name, "name")?;
        let original_name = String::from_utf8(name)
            .map_err(|_| FvltError::HeaderCorruption("file name is not valid UTF-8".into()))?;

        let reserved: [u8; RESERVED_SIZE] = read_array(reader, "reserved")?;
        let checksum: [u8; CHECKSUM_SIZE] = read_array(reader, "checksum")?;

        Ok(Self {
            magic,
            version,
            algorithm,
            salt,
            iv,
            original_size,
            original_name,
            reserved,
            checksum,
        })
    }

    /// Read just the header of the container at `path`.
    pub fn read_from_path(path: &Path) -> FvltResult<Self> {
        let mut reader = io::BufReader::new(std::fs::File::open(path)?);
        Self::read_from(&mut reader)
    }

    /// Check magic, version, algorithm, nonce padding and (optionally) the
    /// checksum.
    /// Reports the first violation only.
    pub fn validate(&self, verify_checksum: bool) -> FvltResult<()> {
        if self.magic != MAGIC {
            return Err(FvltError::Format(format!(
                "bad magic {:02x?}, expected {MAGIC:02x?}",
                self.magic
            )));
        }
        if self.version != FORMAT_VERSION {
            return Err(FvltError::Format(format!(
                "unsupported format version {}",
                self.version
            )));
        }
        if Algorithm::from_id(self.algorithm).is_none() {
            return Err(FvltError::Format(format!(
                "unsupported algorithm id {}",
                self.algorithm
            )));
        }
        if self.iv[NONCE_SIZE..].iter().any(|&b| b != 0) {
            return Err(FvltError::Format("non-zero padding after the nonce".into()));
        }
        if verify_checksum && self.compute_checksum() != self.checksum {
            return Err(FvltError::HeaderCorruption("header checksum mismatch".into()));
        }
        Ok(())
    }
}

/// True if `bytes` starts with the container magic.
pub fn has_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC)
}

fn read_field<R: Read>(reader: &mut R, buf: &mut [u8], field: &str) -> FvltResult<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            FvltError::Format(format!("header truncated while reading {field}"))
        }
        _ => FvltError::Io(e),
    })
}

fn read_array<R: Read, const N: usize>(reader: &mut R, field: &str) -> FvltResult<[u8; N]> {
    let mut buf = [0u8; N];
    read_field(reader, &mut buf, field)?;
    Ok(buf)
}
