//! Streaming batch API: emit each URL's output as soon as it finishes.
//!
//! Unlike [`crate::convert::convert_many`], which returns after every URL is
//! done, [`convert_stream`] yields items via a `Stream` in completion order
//! (not input order). Outputs are kept in memory; nothing is written to
//! `output_dir` unless the caller does it.

use crate::config::ConversionConfig;
use crate::convert::{convert_with, Defaults};
use crate::error::Cp2PdfError;
use crate::fallback::Collaborators;
use crate::output::ConversionOutput;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-URL results.
pub type OutputStream = Pin<Box<dyn Stream<Item = Result<ConversionOutput, Cp2PdfError>> + Send>>;

/// Convert `urls` concurrently (up to `config.concurrency` in flight) with
/// the default collaborators, streaming outputs as they complete.
///
/// # Example
/// ```rust,no_run
/// use cp2pdf::{convert_stream, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let urls = vec![
///     "https://codeforces.com/problemset/problem/4/A".to_string(),
///     "https://www.spoj.com/problems/TEST/".to_string(),
/// ];
/// let mut outputs = convert_stream(urls, &ConversionConfig::default())?;
/// while let Some(result) = outputs.next().await {
///     match result {
///         Ok(o) => println!("{}: {} ({} bytes)", o.url, o.status, o.pdf.len()),
///         Err(e) => eprintln!("error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn convert_stream(urls: Vec<String>, config: &ConversionConfig) -> Result<OutputStream, Cp2PdfError> {
    let defaults = Defaults::new(config)?;
    Ok(convert_stream_with(urls, config, defaults.collab))
}

/// [`convert_stream`] with caller-supplied collaborators.
pub fn convert_stream_with(urls: Vec<String>, config: &ConversionConfig, collab: Collaborators) -> OutputStream {
    info!(urls = urls.len(), "streaming conversion started");
    let concurrency = config.concurrency;
    let config = Arc::new(config.clone());
    let collab = Arc::new(collab);

    let s = stream::iter(urls.into_iter().map(move |url| {
        let config = Arc::clone(&config);
        let collab = Arc::clone(&collab);
        async move { convert_with(&url, &config, &collab).await }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}
