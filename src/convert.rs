//! Conversion entry points.
//!
//! [`convert`] runs one URL through the fallback controller with the default
//! collaborators (HTTP fetch, platform scrapers, headless browser, lopdf
//! writer) and returns the PDF in memory. [`convert_to_file`] and
//! [`convert_many`] also persist it under `output_dir`. Use
//! [`crate::stream::convert_stream`] to receive batch results as they finish.
//!
//! Only URL validation, runtime setup and output writes are fatal; a URL
//! whose every generation state failed still yields an error-document PDF.

use crate::cache::ImageCache;
use crate::config::ConversionConfig;
use crate::error::Cp2PdfError;
use crate::fallback::{Collaborators, FallbackController};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::output::ConversionOutput;
use crate::render::{ChromeRenderer, LopdfWriter};
use crate::sources::{ScrapingProvider, SourceRegistry};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Default collaborators plus the image cache they share.
pub(crate) struct Defaults {
    pub collab: Collaborators,
    pub cache: Arc<ImageCache>,
}

impl Defaults {
    pub fn new(config: &ConversionConfig) -> Result<Self, Cp2PdfError> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(
            HttpFetcher::from_config(config).map_err(|e| Cp2PdfError::Internal(e.to_string()))?,
        );
        let cache = Arc::new(ImageCache::new(config.image_dir(), Arc::clone(&fetcher)));
        let extractor = ScrapingProvider::from_config(
            config,
            Arc::clone(&fetcher),
            Arc::new(SourceRegistry::with_defaults()),
            Arc::clone(&cache),
        );
        let browser = Arc::new(ChromeRenderer::from_config(config, fetcher));
        Ok(Self {
            collab: Collaborators {
                extractor: Arc::new(extractor),
                capture: browser.clone(),
                html: browser,
                writer: Arc::new(LopdfWriter::new(config.page_size)),
            },
            cache,
        })
    }
}

/// Convert one problem or editorial URL to PDF.
///
/// # Errors
/// Returns `Err` only for an invalid URL or when the default collaborators
/// cannot be set up. Fallbacks and error documents are reported in the
/// returned [`ConversionOutput`].
///
/// # Example
/// ```rust,no_run
/// use cp2pdf::{convert, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::default();
/// let output = convert("https://atcoder.jp/contests/abc300/tasks/abc300_a", &config).await?;
/// std::fs::write("abc300_a.pdf", &output.pdf)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert(url: impl AsRef<str>, config: &ConversionConfig) -> Result<ConversionOutput, Cp2PdfError> {
    let url = url.as_ref();
    validate_url(url)?;
    let defaults = Defaults::new(config)?;
    let output = convert_with(url, config, &defaults.collab).await;
    defaults.cache.close().await;
    output
}

/// Convert with caller-supplied collaborators (tests, alternative renderers).
pub async fn convert_with(
    url: impl AsRef<str>,
    config: &ConversionConfig,
    collab: &Collaborators,
) -> Result<ConversionOutput, Cp2PdfError> {
    let url = url.as_ref();
    validate_url(url)?;
    Ok(FallbackController::new(collab, config).run(url).await)
}

/// Convert one URL and write `<output_dir>/<output_filename(url)>`.
///
/// The returned output has `output_path` set.
pub async fn convert_to_file(
    url: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Cp2PdfError> {
    let url = url.as_ref();
    validate_url(url)?;
    let defaults = Defaults::new(config)?;
    let result = convert_to_file_with(url, config, &defaults.collab).await;
    defaults.cache.close().await;
    result
}

/// [`convert_to_file`] with caller-supplied collaborators.
pub async fn convert_to_file_with(
    url: impl AsRef<str>,
    config: &ConversionConfig,
    collab: &Collaborators,
) -> Result<ConversionOutput, Cp2PdfError> {
    let mut output = convert_with(url, config, collab).await?;
    write_output(&mut output, config).await?;
    Ok(output)
}

/// Convert every URL, at most `config.concurrency` at a time, writing each
/// PDF under `output_dir`.
///
/// Results come back in input order. Each URL gets its own `Result`, so
/// one malformed URL or unwritable file does not abort the batch.
pub async fn convert_many<I, S>(urls: I, config: &ConversionConfig) -> Result<Vec<Result<ConversionOutput, Cp2PdfError>>, Cp2PdfError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let defaults = Defaults::new(config)?;
    let results = convert_many_with(urls, config, &defaults.collab).await;
    let cached = defaults.cache.close().await;
    debug!(images = cached, "batch image cache released");
    Ok(results)
}

/// [`convert_many`] with caller-supplied collaborators.
pub async fn convert_many_with<I, S>(
    urls: I,
    config: &ConversionConfig,
    collab: &Collaborators,
) -> Vec<Result<ConversionOutput, Cp2PdfError>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let urls: Vec<String> = urls.into_iter().map(|u| u.as_ref().to_string()).collect();
    let total = urls.len();
    info!(urls = total, concurrency = config.concurrency, "batch started");
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut indexed: Vec<(usize, Result<ConversionOutput, Cp2PdfError>)> =
        stream::iter(urls.iter().enumerate().map(|(idx, url)| async move {
            (idx, convert_to_file_with(url, config, collab).await)
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    indexed.sort_by_key(|(idx, _)| *idx);

    let done = indexed
        .iter()
        .filter(|(_, r)| r.as_ref().is_ok_and(|o| o.is_done()))
        .count();
    info!(urls = total, done, "batch finished");
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, done);
    }
    indexed.into_iter().map(|(_, r)| r).collect()
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(url: impl AsRef<str>, config: &ConversionConfig) -> Result<ConversionOutput, Cp2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Cp2PdfError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(url, config))
}

/// Deterministic PDF file name for `url`: host and path with `.` and `/`
/// replaced by `_`, any other unsafe character likewise.
///
/// ```
/// assert_eq!(
///     cp2pdf::output_filename("https://atcoder.jp/contests/abc300/tasks/abc300_a"),
///     "atcoder_jp_contests_abc300_tasks_abc300_a.pdf"
/// );
/// ```
pub fn output_filename(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "document.pdf".to_string();
    };
    let host = parsed.host_str().unwrap_or_default();
    let raw = format!("{host}/{}", parsed.path());
    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' };
        if c == '_' && name.ends_with('_') {
            continue;
        }
        name.push(c);
    }
    let name = name.trim_matches('_');
    if name.is_empty() {
        "document.pdf".to_string()
    } else {
        format!("{name}.pdf")
    }
}

/// Reject anything but an absolute http(s) URL with a host.
pub fn validate_url(url: &str) -> Result<Url, Cp2PdfError> {
    let invalid = |reason: String| Cp2PdfError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(parsed)
}

// ── Output files ─────────────────────────────────────────────────────────

/// Write the PDF (and optional JSON sidecar) atomically; sets `output_path`.
pub(crate) async fn write_output(output: &mut ConversionOutput, config: &ConversionConfig) -> Result<(), Cp2PdfError> {
    let path = config.output_dir.join(output_filename(&output.url));
    write_atomic(&path, &output.pdf).await?;
    output.output_path = Some(path.clone());

    if config.write_json {
        let json_path = path.with_extension("json");
        let json = serde_json::to_vec_pretty(&output)
            .map_err(|e| Cp2PdfError::Internal(format!("serialize output: {e}")))?;
        write_atomic(&json_path, &json).await?;
    }
    info!(url = %output.url, path = %path.display(), bytes = output.pdf.len(), "PDF written");
    Ok(())
}

/// Temp file plus rename, so readers never see a partial file.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Cp2PdfError> {
    let fail = |source: std::io::Error| Cp2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let tmp: PathBuf = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("out")
    ));
    tokio::fs::write(&tmp, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp, path).await.map_err(fail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_follow_host_and_path() {
        assert_eq!(
            output_filename("https://codeforces.com/problemset/problem/4/A"),
            "codeforces_com_problemset_problem_4_A.pdf"
        );
        assert_eq!(output_filename("https://www.spoj.com/problems/TEST/"), "www_spoj_com_problems_TEST.pdf");
        assert_eq!(output_filename("https://atcoder.jp/"), "atcoder_jp.pdf");
        assert_eq!(output_filename("not a url"), "document.pdf");
    }

    #[test]
    fn query_does_not_change_filename() {
        assert_eq!(
            output_filename("https://codeforces.com/contest/1/problem/A?locale=en"),
            output_filename("https://codeforces.com/contest/1/problem/A")
        );
    }

    #[test]
    fn url_validation() {
        assert!(validate_url("https://atcoder.jp/contests/abc300/tasks/abc300_a").is_ok());
        assert!(matches!(validate_url("ftp://example.com/x"), Err(Cp2PdfError::InvalidUrl { .. })));
        assert!(matches!(validate_url("atcoder.jp/contests"), Err(Cp2PdfError::InvalidUrl { .. })));
        assert!(matches!(validate_url("file:///etc/passwd"), Err(Cp2PdfError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("x.pdf");
        write_atomic(&path, b"%PDF-1.4").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
        assert!(!path.with_extension("pdf.tmp").exists());
    }
}
