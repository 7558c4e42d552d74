// ==============================================================================
// validator.rs - Upload Validation
// ==============================================================================
// Description: Boundary checks on uploaded variant-call files (size, gzip magic, hash)
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-19
// Version: 2.0.0
// Security: Size ceiling, magic number verification, SHA-256 provenance
// ==============================================================================

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::MAX_UPLOAD_BYTES;
use crate::parsers::vcf::is_compressed_hint;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Upload too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Upload is empty")]
    Empty,

    #[error("Magic number mismatch: '{0}' is named as gzip but is not gzip-compressed")]
    MagicMismatch(String),
}

/// Facts recorded about an accepted upload
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedUpload {
    pub original_name: String,
    pub size: u64,
    pub compressed: bool,
    pub hash_sha256: String,
    pub validated_at: chrono::DateTime<chrono::Utc>,
}

pub struct UploadValidator {
    max_upload_bytes: u64,
}

impl UploadValidator {
    pub fn new() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }

    /// Validate an in-memory upload
    pub fn validate_bytes(&self, bytes: &[u8], filename_hint: &str) -> Result<ValidatedUpload, UploadError> {
        info!("Validating upload: {} ({} bytes)", filename_hint, bytes.len());

        let size = bytes.len() as u64;
        self.check_size(size)?;

        let compressed = is_compressed_hint(filename_hint);
        if compressed && !bytes.starts_with(&GZIP_MAGIC) {
            return Err(UploadError::MagicMismatch(filename_hint.to_string()));
        }

        let hash = format!("{:x}", Sha256::digest(bytes));
        debug!("SHA-256: {}", hash);

        Ok(ValidatedUpload {
            original_name: filename_hint.to_string(),
            size,
            compressed,
            hash_sha256: hash,
            validated_at: chrono::Utc::now(),
        })
    }

    /// Validate an upload already on disk
    pub fn validate_file(&self, path: &Path) -> Result<ValidatedUpload, UploadError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        info!("Validating file: {}", name);

        let size = std::fs::metadata(path)?.len();
        self.check_size(size)?;

        let compressed = is_compressed_hint(&name);
        let hash = digest_stream(File::open(path)?, &name, compressed)?;

        Ok(ValidatedUpload {
            original_name: name,
            size,
            compressed,
            hash_sha256: hash,
            validated_at: chrono::Utc::now(),
        })
    }

    fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size == 0 {
            return Err(UploadError::Empty);
        }
        if size > self.max_upload_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }
        debug!("Size check passed: {} bytes", size);
        Ok(())
    }
}

/// SHA-256 of a stream, checking the gzip magic first when `compressed`
fn digest_stream<R: Read>(mut reader: R, name: &str, compressed: bool) -> Result<String, UploadError> {
    let mut hasher = Sha256::new();

    if compressed {
        // A short read may split the magic bytes
        let mut magic = [0u8; 2];
        match reader.read_exact(&mut magic) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(UploadError::MagicMismatch(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        if magic != GZIP_MAGIC {
            return Err(UploadError::MagicMismatch(name.to_string()));
        }
        hasher.update(magic);
    }

    let mut buffer = vec![0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new()
    }
}
