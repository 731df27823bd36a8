//! Content fingerprints for change detection.
//!
//! # Responsibility
//! - Hash raw source files without loading them whole.
//! - Hash in-memory text (UTF-8 encoding) such as rendered ledger bodies.
//!
//! # Invariants
//! - Pure functions: identical input always yields the identical digest.
//! - Fingerprints detect change only; they carry no security meaning.

use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const READ_CHUNK_BYTES: usize = 1024 * 1024;

/// 256-bit SHA-256 digest, displayed as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64-char lowercase hex digest.
    pub fn from_hex(value: &str) -> Option<Self> {
        if value.len() != 64 || value.bytes().any(|b| b.is_ascii_uppercase()) {
            return None;
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(value, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    /// Whether `recorded` (as found in a document) names this digest.
    pub fn matches(&self, recorded: &str) -> bool {
        Self::from_hex(recorded.trim()).is_some_and(|other| other == *self)
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Fingerprints an in-memory byte slice.
pub fn fingerprint_bytes(content: &[u8]) -> Fingerprint {
    finish(Sha256::new_with_prefix(content))
}

/// Fingerprints the UTF-8 encoding of `text`.
pub fn fingerprint_text(text: &str) -> Fingerprint {
    fingerprint_bytes(text.as_bytes())
}

/// Streams `reader` through the hasher in fixed-size chunks.
pub fn fingerprint_reader(mut reader: impl Read) -> std::io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buf[..read]);
    }
    Ok(finish(hasher))
}

fn finish(hasher: Sha256) -> Fingerprint {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    Fingerprint(bytes)
}

/// Fingerprints a file's raw bytes.
pub fn fingerprint_file(path: &Path) -> std::io::Result<Fingerprint> {
    fingerprint_reader(File::open(path)?)
}
