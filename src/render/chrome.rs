//! Headless Chrome/Chromium as page-capture and HTML-to-PDF collaborator.
//!
//! The browser is driven through its command line (`--print-to-pdf`), one
//! short-lived process per document. The child is killed when the future is
//! dropped, so the controller's timeout really stops it.
//!
//! Setting `CP2PDF_RENDER_DISABLE=1` makes the browser unavailable, which
//! the fallback controller treats like a missing binary.

use crate::config::ConversionConfig;
use crate::error::PipelineError;
use crate::fallback::{CaptureOptions, HtmlRenderer, PageCapture};
use crate::fetch::PageFetcher;
use crate::render::html;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

const RENDERER: &str = "chrome";
const DISABLE_ENV: &str = "CP2PDF_RENDER_DISABLE";
const CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Page capture and HTML rendering through a headless browser.
pub struct ChromeRenderer {
    binary: Option<PathBuf>,
    fetcher: Arc<dyn PageFetcher>,
}

impl std::fmt::Debug for ChromeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeRenderer")
            .field("binary", &self.binary)
            .finish_non_exhaustive()
    }
}

impl ChromeRenderer {
    /// Use `explicit` if given, otherwise search `PATH`.
    pub fn new(explicit: Option<&Path>, fetcher: Arc<dyn PageFetcher>) -> Self {
        let binary = find_browser(explicit);
        match &binary {
            Some(path) => info!("Headless browser: {}", path.display()),
            None => info!("No headless browser available; exact capture disabled"),
        }
        Self { binary, fetcher }
    }

    pub fn from_config(config: &ConversionConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self::new(config.chrome_path.as_deref(), fetcher)
    }

    pub fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    fn binary(&self) -> Result<&Path, PipelineError> {
        self.binary
            .as_deref()
            .ok_or_else(|| PipelineError::unavailable(RENDERER))
    }

    /// Print `target` (a URL or `file://` path) and return the PDF bytes.
    async fn print_to_pdf(&self, target: &str, workdir: &TempDir) -> Result<Vec<u8>, PipelineError> {
        let binary = self.binary()?;
        let out = workdir.path().join("page.pdf");
        debug!(target, binary = %binary.display(), "printing to PDF");

        let output = Command::new(binary)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--hide-scrollbars")
            .arg("--allow-file-access-from-files")
            .arg("--run-all-compositor-stages-before-draw")
            .arg("--virtual-time-budget=5000")
            .arg("--no-pdf-header-footer")
            .arg(format!("--user-data-dir={}", workdir.path().join("profile").display()))
            .arg(format!("--print-to-pdf={}", out.display()))
            .arg(target)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| render_err(format!("failed to launch {}: {e}", binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().last().unwrap_or_default();
            return Err(render_err(format!("browser exited with {}: {last}", output.status)));
        }

        let bytes = tokio::fs::read(&out)
            .await
            .map_err(|e| render_err(format!("no PDF written: {e}")))?;
        if !bytes.starts_with(b"%PDF") {
            return Err(render_err("browser output is not a PDF"));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl PageCapture for ChromeRenderer {
    async fn capture(&self, url: &str, opts: &CaptureOptions) -> Result<Vec<u8>, PipelineError> {
        self.binary()?;
        let workdir = workdir()?;
        if !opts.suppress_chrome {
            return self.print_to_pdf(url, &workdir).await;
        }

        let page = self.fetcher.fetch_text(url).await?;
        let styled = html::inject_capture_styles(&page, url, opts.page_size);
        let file = write_page(&workdir, &styled).await?;
        self.print_to_pdf(&file_url(&file), &workdir).await
    }
}

#[async_trait]
impl HtmlRenderer for ChromeRenderer {
    async fn render(&self, markup: &str, css: &str) -> Result<Vec<u8>, PipelineError> {
        self.binary()?;
        let workdir = workdir()?;
        let file = write_page(&workdir, &html::with_stylesheet(markup, css)).await?;
        self.print_to_pdf(&file_url(&file), &workdir).await
    }
}

fn render_err(reason: impl Into<String>) -> PipelineError {
    PipelineError::Render {
        renderer: RENDERER.to_string(),
        reason: reason.into(),
    }
}

fn workdir() -> Result<TempDir, PipelineError> {
    TempDir::new().map_err(|e| render_err(format!("temp dir: {e}")))
}

async fn write_page(dir: &TempDir, markup: &str) -> Result<PathBuf, PipelineError> {
    let path = dir.path().join("page.html");
    tokio::fs::write(&path, markup)
        .await
        .map_err(|e| render_err(format!("temp page: {e}")))?;
    Ok(path)
}

fn file_url(path: &Path) -> String {
    url::Url::from_file_path(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("file://{}", path.display()))
}

/// Locate a browser binary, honouring the disable switch.
pub fn find_browser(explicit: Option<&Path>) -> Option<PathBuf> {
    if std::env::var(DISABLE_ENV).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
        return None;
    }
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }
    let dirs = std::env::var_os("PATH")?;
    std::env::split_paths(&dirs)
        .flat_map(|dir| CANDIDATES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}
