//! On-disk image cache shared by every conversion of a batch.
//!
//! Files are named by the SHA-256 of their source URL
//! (`images/<16 hex chars>.<ext>`), written once through a temp file and
//! rename, and never rewritten. Concurrent requests for the same URL share
//! one download.

use crate::error::PipelineError;
use crate::fetch::PageFetcher;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

/// Hex characters of the URL hash used as file stem.
const STEM_LEN: usize = 16;

/// A cached image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub path: PathBuf,
    /// Pixel dimensions when the format could be decoded.
    pub dimensions: Option<(u32, u32)>,
}

type Slot = Arc<OnceCell<Result<CachedImage, PipelineError>>>;

pub struct ImageCache {
    dir: PathBuf,
    fetcher: Arc<dyn PageFetcher>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch (or decode) `url` into the cache, at most once per URL.
    pub async fn get(&self, url: &str) -> Result<CachedImage, PipelineError> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(url.to_string()).or_default().clone()
        };
        slot.get_or_init(|| self.load(url)).await.clone()
    }

    /// Forget every in-memory slot; files on disk stay. Returns how many
    /// URLs had been requested.
    pub async fn close(&self) -> usize {
        let mut slots = self.slots.lock().await;
        let seen = slots.len();
        slots.clear();
        debug!(dir = %self.dir.display(), urls = seen, "image cache closed");
        seen
    }

    async fn load(&self, url: &str) -> Result<CachedImage, PipelineError> {
        let (bytes, mime) = if url.starts_with("data:") {
            decode_data_uri(url)?
        } else {
            let fetched = self.fetcher.fetch_bytes(url).await?;
            (fetched.bytes, fetched.content_type)
        };

        let ext = extension(mime.as_deref(), &bytes, url);
        let path = self.dir.join(format!("{}.{ext}", file_stem(url)));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(url, path = %path.display(), "image cache hit");
        } else {
            write_once(&self.dir, &path, &bytes).await?;
            debug!(url, path = %path.display(), bytes = bytes.len(), "image cached");
        }

        Ok(CachedImage {
            path,
            dimensions: dimensions(&bytes),
        })
    }
}

/// Cache file stem for `url`.
pub fn file_stem(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut stem = hex::encode(digest);
    stem.truncate(STEM_LEN);
    stem
}

fn cache_err(reason: String) -> PipelineError {
    PipelineError::Extraction {
        field: "image".to_string(),
        reason,
    }
}

async fn write_once(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| cache_err(format!("create {}: {e}", dir.display())))?;
    let tmp = path.with_extension(format!("tmp{}", std::process::id()));
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| cache_err(format!("write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| cache_err(format!("rename to {}: {e}", path.display())))
}

/// Bytes and media type of a `data:` URI.
pub fn decode_data_uri(uri: &str) -> Result<(Vec<u8>, Option<String>), PipelineError> {
    let rest = uri.strip_prefix("data:").unwrap_or(uri);
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| cache_err("data URI without payload".to_string()))?;
    let mut parts = header.split(';');
    let mime = parts
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_ascii_lowercase);
    let is_base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| cache_err(format!("data URI: {e}")))?
    } else {
        payload.as_bytes().to_vec()
    };
    Ok((bytes, mime))
}

fn extension(mime: Option<&str>, bytes: &[u8], url: &str) -> String {
    let from_mime = match mime {
        Some("image/png") => Some("png"),
        Some("image/jpeg") | Some("image/jpg") => Some("jpg"),
        Some("image/gif") => Some("gif"),
        Some("image/webp") => Some("webp"),
        Some("image/svg+xml") => Some("svg"),
        Some("image/bmp") => Some("bmp"),
        _ => None,
    };
    if let Some(ext) = from_mime {
        return ext.to_string();
    }
    if let Ok(format) = image::guess_format(bytes) {
        if let Some(ext) = format.extensions_str().first() {
            return (*ext).to_string();
        }
    }
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .and_then(|name| {
            name.rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
        })
        .filter(|ext| (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "img".to_string())
}

fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Fetched;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    struct CountingFetcher {
        calls: AtomicUsize,
        body: Vec<u8>,
    }

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch_bytes(&self, _url: &str) -> Result<Fetched, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(Fetched {
                bytes: self.body.clone(),
                content_type: None,
            })
        }
    }

    #[test]
    fn stem_is_stable_hex_prefix() {
        let a = file_stem("https://img.atcoder.jp/abc300/fig1.png");
        assert_eq!(a.len(), STEM_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, file_stem("https://img.atcoder.jp/abc300/fig1.png"));
        assert_ne!(a, file_stem("https://img.atcoder.jp/abc300/fig2.png"));
    }

    #[test]
    fn data_uri_base64() {
        let (bytes, mime) = decode_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(mime.as_deref(), Some("image/png"));
        assert!(decode_data_uri("data:image/png;base64").is_err());
    }

    #[test]
    fn extension_falls_back_to_sniffing_then_url() {
        assert_eq!(extension(Some("image/jpeg"), b"", "x"), "jpg");
        assert_eq!(extension(None, &png(1, 1), "https://a/b"), "png");
        assert_eq!(extension(None, b"<svg/>", "https://a/b/figure.SVG"), "svg");
        assert_eq!(extension(None, b"", "https://a/b/figure"), "img");
    }

    #[tokio::test]
    async fn data_uri_cached_with_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            body: Vec::new(),
        });
        let cache = ImageCache::new(dir.path().join("images"), fetcher.clone());
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png(40, 30))
        );
        let cached = cache.get(&uri).await.unwrap();
        assert!(cached.path.exists());
        assert_eq!(cached.path.extension().unwrap(), "png");
        assert_eq!(cached.dimensions, Some((40, 30)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            body: png(64, 64),
        });
        let cache = ImageCache::new(dir.path(), fetcher.clone());
        let url = "https://codeforces.com/predownloaded/fig.png";
        let (a, b) = tokio::join!(cache.get(url), cache.get(url));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_forgets_slots_but_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            body: png(50, 50),
        });
        let cache = ImageCache::new(dir.path(), fetcher.clone());
        let url = "https://img.atcoder.jp/abc300/fig.png";

        let first = tokio_test::block_on(cache.get(url)).unwrap();
        assert_eq!(tokio_test::block_on(cache.close()), 1);
        assert!(first.path.exists());

        tokio_test::block_on(cache.get(url)).unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
