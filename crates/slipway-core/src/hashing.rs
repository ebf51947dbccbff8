//! File and manifest hashing (SHA-256, lowercase hex).
//!
//! Every digest in a manifest, including the manifest's own protective hash,
//! goes through this module so the hex encoding stays consistent.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Hash algorithm named by a manifest's `hash.algorithm` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
}

impl HashAlgorithm {
    /// Wire name as it appears in the manifest.
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    /// Parse a wire name. Returns None for unsupported algorithms so the
    /// caller can raise its own verification error naming the field.
    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(HashAlgorithm::Sha256),
            _ => None,
        }
    }

    /// Digest length in hex characters.
    pub fn hex_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 64,
        }
    }

    /// Fresh incremental hasher state.
    pub fn hasher(self) -> Sha256 {
        match self {
            HashAlgorithm::Sha256 => Sha256::new(),
        }
    }

    /// Compute the digest of a file as lowercase hex. Reads in chunks to keep
    /// memory use bounded; suitable for large files.
    pub fn hash_file(self, path: &Path) -> Result<String> {
        let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut hasher = self.hasher();
        let mut buf = [0u8; BUF_SIZE];
        loop {
            let n = f
                .read(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

/// True if `s` is a plausible digest for `algorithm`: right length, all
/// lowercase hex.
pub fn is_valid_digest(algorithm: HashAlgorithm, s: &str) -> bool {
    s.len() == algorithm.hex_len()
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn hash_file_empty() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = HashAlgorithm::Sha256.hash_file(f.path()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hash_file_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let digest = HashAlgorithm::Sha256.hash_file(f.path()).unwrap();
        assert_eq!(
            digest,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn wire_names_round_trip() {
        assert_eq!(HashAlgorithm::from_str("sha256"), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::Sha256.as_str(), "sha256");
        assert!(HashAlgorithm::from_str("md5").is_none());
    }

    #[test]
    fn digest_validation() {
        let ok = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert!(is_valid_digest(HashAlgorithm::Sha256, ok));
        assert!(!is_valid_digest(HashAlgorithm::Sha256, &ok[..63]));
        assert!(!is_valid_digest(HashAlgorithm::Sha256, &ok.to_uppercase()));
        assert!(!is_valid_digest(
            HashAlgorithm::Sha256,
            "zzb0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        ));
    }
}
