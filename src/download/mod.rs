//! Checksum-verified checkpoint downloader.
//!
//! Catalog URLs embed the expected SHA-256 digest of their payload, so a
//! previously verified local copy is returned without touching the network
//! and a corrupted copy is never used silently.

use crate::config::DownloadConfig;
use crate::error::{ConvertError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CHUNK_SIZE: usize = 8192;

/// A remote artifact ready to be streamed to disk.
pub struct RemoteArtifact {
    /// Server-declared content length, when the server sends one.
    pub total_len: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

/// Transport seam so the cache and verification logic can be exercised
/// without a network.
pub trait RemoteSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<RemoteArtifact>;
}

/// Blocking HTTP transport.
pub struct HttpSource {
    timeout: Option<Duration>,
}

impl HttpSource {
    /// `timeout: None` blocks indefinitely on a stalled transfer.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl RemoteSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<RemoteArtifact> {
        let mut request = ureq::get(url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request.call()?;
        let total_len = response
            .header("Content-Length")
            .and_then(|value| value.parse().ok());
        Ok(RemoteArtifact {
            total_len,
            reader: Box::new(response.into_reader()),
        })
    }
}

pub struct Downloader {
    source: Box<dyn RemoteSource>,
}

impl Downloader {
    pub fn new(config: &DownloadConfig) -> Self {
        Self::with_source(Box::new(HttpSource::new(config.timeout())))
    }

    pub fn with_source(source: Box<dyn RemoteSource>) -> Self {
        Self { source }
    }

    /// Fetch `url` into `cache_root`, returning the local path.
    ///
    /// A cached file whose digest matches the one embedded in the URL is
    /// returned as-is. A mismatching cached file is re-downloaded over. A
    /// freshly written file that still mismatches is a fatal integrity
    /// failure; retrying is the caller's decision.
    pub fn acquire(&self, url: &str, cache_root: &Path) -> Result<PathBuf> {
        let expected = expected_sha256(url)?;
        let filename = remote_filename(url)?;
        std::fs::create_dir_all(cache_root)?;
        let target = cache_root.join(filename);

        if target.exists() && !target.is_file() {
            return Err(ConvertError::PathConflict { path: target });
        }

        if target.is_file() {
            if file_sha256(&target)? == expected {
                tracing::debug!(path = %target.display(), "checkpoint already cached");
                return Ok(target);
            }
            tracing::warn!(
                path = %target.display(),
                "cached checkpoint exists but the SHA-256 checksum does not match; re-downloading",
            );
        }

        tracing::info!(url, path = %target.display(), "downloading checkpoint");
        let artifact = self.source.fetch(url)?;
        stream_to_file(artifact, &target)?;

        let actual = file_sha256(&target)?;
        if actual != expected {
            return Err(ConvertError::Integrity {
                path: target,
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(target)
    }
}

/// The expected SHA-256 digest embedded in a catalog URL as its
/// second-to-last path segment.
pub fn expected_sha256(url: &str) -> Result<&str> {
    let mut segments = url.trim_end_matches('/').rsplit('/');
    let _filename = segments.next();
    match segments.next() {
        Some(digest) if digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit()) => {
            Ok(digest)
        }
        _ => Err(ConvertError::MalformedUrl {
            url: url.to_string(),
        }),
    }
}

fn remote_filename(url: &str) -> Result<&str> {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ConvertError::MalformedUrl {
            url: url.to_string(),
        })
}

/// Chunked SHA-256 of a file on disk.
pub fn file_sha256(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn stream_to_file(artifact: RemoteArtifact, target: &Path) -> Result<()> {
    let progress = match artifact.total_len {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{bytes}/{total_bytes} [{wide_bar}] {bytes_per_sec} {eta}")
                    .unwrap(),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };

    let mut output = File::create(target)?;
    let mut reader = artifact.reader;
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        output.write_all(&buffer[..bytes_read])?;
        progress.inc(bytes_read as u64);
    }
    output.flush()?;
    progress.finish_and_clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeSource {
        payload: Vec<u8>,
        fetches: Arc<AtomicUsize>,
    }

    impl RemoteSource for FakeSource {
        fn fetch(&self, _url: &str) -> Result<RemoteArtifact> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(RemoteArtifact {
                total_len: Some(self.payload.len() as u64),
                reader: Box::new(Cursor::new(self.payload.clone())),
            })
        }
    }

    fn downloader_for(payload: &[u8]) -> (Downloader, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = FakeSource {
            payload: payload.to_vec(),
            fetches: Arc::clone(&fetches),
        };
        (Downloader::with_source(Box::new(source)), fetches)
    }

    fn digest_of(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }

    fn url_for(payload: &[u8]) -> String {
        format!(
            "https://example.com/clip/models/{}/model.pt",
            digest_of(payload)
        )
    }

    #[test]
    fn test_expected_sha256_extraction() {
        let digest = "afeb0e10f9e5a86da6080e35cf09123aca3b358a0c3e3b6c78a7b63bc04b6762";
        let url = format!("https://openaipublic.azureedge.net/clip/models/{digest}/RN50.pt");
        assert_eq!(expected_sha256(&url).unwrap(), digest);
    }

    #[test]
    fn test_expected_sha256_rejects_urls_without_digest() {
        assert!(expected_sha256("https://example.com/RN50.pt").is_err());
        assert!(expected_sha256("https://example.com/nothex/RN50.pt").is_err());
    }

    #[test]
    fn test_verified_cache_hit_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"checkpoint bytes";
        let url = url_for(payload);
        std::fs::write(dir.path().join("model.pt"), payload).unwrap();

        let (downloader, fetches) = downloader_for(payload);
        let first = downloader.acquire(&url, dir.path()).unwrap();
        let second = downloader.acquire(&url, dir.path()).unwrap();

        assert_eq!(first, dir.path().join("model.pt"));
        assert_eq!(first, second);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stale_cache_is_redownloaded() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"fresh checkpoint";
        let url = url_for(payload);
        std::fs::write(dir.path().join("model.pt"), b"stale bytes").unwrap();

        let (downloader, fetches) = downloader_for(payload);
        let path = downloader.acquire(&url, dir.path()).unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(path).unwrap(), payload);
    }

    #[test]
    fn test_corrupted_download_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let url = url_for(b"what the server should have sent");

        let (downloader, fetches) = downloader_for(b"what it actually sent");
        let err = downloader.acquire(&url, dir.path()).unwrap_err();

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(matches!(err, ConvertError::Integrity { .. }));
    }

    #[test]
    fn test_occupied_target_path_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"payload";
        let url = url_for(payload);
        std::fs::create_dir(dir.path().join("model.pt")).unwrap();

        let (downloader, fetches) = downloader_for(payload);
        let err = downloader.acquire(&url, dir.path()).unwrap_err();

        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert!(matches!(err, ConvertError::PathConflict { .. }));
    }

    #[test]
    fn test_cache_root_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"payload";
        let url = url_for(payload);
        let root = dir.path().join("nested").join("cache");

        let (downloader, _) = downloader_for(payload);
        let path = downloader.acquire(&url, &root).unwrap();
        assert!(path.starts_with(&root));
        assert_eq!(std::fs::read(path).unwrap(), payload);
    }
}
