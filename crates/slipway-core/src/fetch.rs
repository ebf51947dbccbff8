//! HTTP GET plumbing for manifests and assets.
//!
//! Whole-file transfers only; 200 is the only status treated as success.
//! Asset downloads stream into the destination file while feeding the same
//! bytes to a running digest, so the downloaded content is hashed in a single
//! pass with no re-read.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use sha2::Digest;
use url::Url;

use crate::error::TransportError;
use crate::hashing::HashAlgorithm;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const SMALL_TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);
const ASSET_TRANSFER_TIMEOUT: Duration = Duration::from_secs(3600);

/// Result of a hashed download: bytes written and the digest of exactly those
/// bytes, lowercase hex.
#[derive(Debug)]
pub struct HashedDownload {
    pub bytes: u64,
    pub digest: String,
}

/// Resolve `relative` against `base`, keeping the base's full path. Plain
/// `Url::join` would drop the last path segment of a base without a trailing
/// slash.
pub fn join_url(base: &Url, relative: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(relative)
}

fn new_easy(url: &Url, timeout: Duration) -> Result<curl::easy::Easy, TransportError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url.as_str())?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.timeout(timeout)?;
    Ok(easy)
}

fn ensure_http_ok(easy: &mut curl::easy::Easy) -> Result<(), TransportError> {
    let code = easy.response_code()?;
    if code != 200 {
        return Err(TransportError::Status(code));
    }
    Ok(())
}

/// Fetch a small resource (the manifest) fully into memory.
pub fn http_get_bytes(url: &Url) -> Result<Vec<u8>, TransportError> {
    let mut easy = new_easy(url, SMALL_TRANSFER_TIMEOUT)?;
    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    ensure_http_ok(&mut easy)?;
    Ok(body)
}

/// Stream a GET into `dest` while hashing the received bytes.
///
/// The file is created (truncated) first. On a non-200 status the error body
/// may have been written to `dest`; the caller owns deleting the partial
/// file, which it must do for transport failures anyway.
pub fn http_get_hashed(
    url: &Url,
    dest: &Path,
    algorithm: HashAlgorithm,
) -> Result<HashedDownload, TransportError> {
    let mut file = File::create(dest)?;
    let mut hasher = algorithm.hasher();
    let mut bytes: u64 = 0;
    let mut easy = new_easy(url, ASSET_TRANSFER_TIMEOUT)?;
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            hasher.update(data);
            bytes += data.len() as u64;
            match file.write_all(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    tracing::warn!("download write to {} failed: {e}", dest.display());
                    Ok(0) // abort transfer
                }
            }
        })?;
        transfer.perform()?;
    }
    ensure_http_ok(&mut easy)?;
    file.flush()?;
    Ok(HashedDownload {
        bytes,
        digest: hex::encode(hasher.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_keeps_base_path_without_trailing_slash() {
        let base = Url::parse("http://host/app/v1").unwrap();
        let joined = join_url(&base, "lib/core.jar").unwrap();
        assert_eq!(joined.as_str(), "http://host/app/v1/lib/core.jar");
    }

    #[test]
    fn join_keeps_base_path_with_trailing_slash() {
        let base = Url::parse("http://host/app/v1/").unwrap();
        let joined = join_url(&base, "app.bin").unwrap();
        assert_eq!(joined.as_str(), "http://host/app/v1/app.bin");
    }

    #[test]
    fn join_handles_bare_host() {
        let base = Url::parse("http://host").unwrap();
        let joined = join_url(&base, "slipway.manifest").unwrap();
        assert_eq!(joined.as_str(), "http://host/slipway.manifest");
    }
}
