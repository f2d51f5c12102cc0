//! Progress-callback trait for per-URL conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as each problem page moves through the fallback chain.
//!
//! # Example
//!
//! ```rust
//! use cp2pdf::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     fallbacks: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_transition(&self, url: &str, from: &str, to: &str, reason: &str) {
//!         self.fallbacks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{url}: {from} → {to} ({reason})");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { fallbacks: AtomicUsize::new(0) });
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion entry points as documents are processed.
///
/// Implementations must be `Send + Sync`: batch conversions run several
/// documents concurrently, so every method may be called from different
/// tasks at once. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before a batch starts.
    fn on_batch_start(&self, total_urls: usize) {
        let _ = total_urls;
    }

    /// Called when one URL enters the fallback controller.
    fn on_document_start(&self, url: &str) {
        let _ = url;
    }

    /// Called for every fallback transition (state names as logged).
    fn on_transition(&self, url: &str, from: &str, to: &str, reason: &str) {
        let _ = (url, from, to, reason);
    }

    /// Called when a URL reaches a terminal state.
    ///
    /// # Arguments
    /// * `url`         — the source URL
    /// * `status`      — `"done"` or `"error_document"`
    /// * `pdf_len`     — size of the produced PDF in bytes
    fn on_document_complete(&self, url: &str, status: &str, pdf_len: usize) {
        let _ = (url, status, pdf_len);
    }

    /// Called once after every URL of a batch has a PDF.
    ///
    /// # Arguments
    /// * `total_urls` — URLs attempted
    /// * `done_count` — URLs that ended in `Done` rather than an error document
    fn on_batch_complete(&self, total_urls: usize, done_count: usize) {
        let _ = (total_urls, done_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        started: AtomicUsize,
        transitions: Mutex<Vec<(String, String)>>,
        done: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_document_start(&self, _url: &str) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_transition(&self, _url: &str, from: &str, to: &str, _reason: &str) {
            self.transitions
                .lock()
                .unwrap()
                .push((from.to_string(), to.to_string()));
        }

        fn on_batch_complete(&self, _total: usize, done_count: usize) {
            self.done.store(done_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start("https://atcoder.jp/x");
        cb.on_transition("https://atcoder.jp/x", "TryExact", "TryStructuredHTML", "timeout");
        cb.on_document_complete("https://atcoder.jp/x", "done", 1024);
        cb.on_batch_complete(2, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_document_start("a");
        tracker.on_document_start("b");
        tracker.on_transition("a", "TryExact", "TryStructuredHTML", "no browser");
        tracker.on_batch_complete(2, 1);

        assert_eq!(tracker.started.load(Ordering::SeqCst), 2);
        assert_eq!(
            tracker.transitions.lock().unwrap().as_slice(),
            &[("TryExact".to_string(), "TryStructuredHTML".to_string())]
        );
        assert_eq!(tracker.done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_document_start("u");
        cb.on_document_complete("u", "error_document", 900);
    }
}
