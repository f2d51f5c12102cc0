//! Plain HTTP fetching for problem pages and their images.
//!
//! Every request carries the configured user agent and is bounded by the
//! fetch timeout. Non-2xx responses are failures that keep their status
//! code so callers can tell "gone" from "unreachable".

use crate::config::ConversionConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Largest response body accepted, for pages and images alike.
const MAX_BODY_BYTES: u64 = 32 * 1024 * 1024;

/// A fetched resource.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    /// `Content-Type` header without parameters, lowercased.
    pub content_type: Option<String>,
}

/// Raw page and image fetch.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> Result<Fetched, PipelineError>;

    /// Fetch a page as text (lossy UTF-8).
    async fn fetch_text(&self, url: &str) -> Result<String, PipelineError> {
        let fetched = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&fetched.bytes).into_owned())
    }
}

/// [`PageFetcher`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .build()
            .map_err(|e| PipelineError::Fetch {
                url: String::new(),
                reason: format!("HTTP client: {e}"),
                status: None,
            })?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ConversionConfig) -> Result<Self, PipelineError> {
        Self::new(&config.user_agent, config.fetch_timeout_secs)
    }

    fn error(&self, url: &str, e: reqwest::Error) -> PipelineError {
        if e.is_timeout() {
            PipelineError::Timeout {
                stage: format!("fetch {url}"),
                secs: self.timeout_secs,
            }
        } else {
            PipelineError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Fetched, PipelineError> {
        debug!(url, "fetching");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
                status: Some(status.as_u16()),
            });
        }
        if response.content_length().is_some_and(|n| n > MAX_BODY_BYTES) {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                reason: format!("response larger than {MAX_BODY_BYTES} bytes"),
                status: Some(status.as_u16()),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase()
            });
        let bytes = response.bytes().await.map_err(|e| self.error(url, e))?;
        debug!(url, bytes = bytes.len(), "fetched");
        Ok(Fetched {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{addr}/problems/TEST/")
    }

    #[tokio::test]
    async fn ok_response_returns_body_and_type() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: 11\r\nConnection: close\r\n\r\n<p>Echo</p>",
        )
        .await;
        let fetcher = HttpFetcher::new("cp2pdf-test", 5).unwrap();
        let fetched = fetcher.fetch_bytes(&url).await.unwrap();
        assert_eq!(fetched.bytes, b"<p>Echo</p>");
        assert_eq!(fetched.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn not_found_keeps_status() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let fetcher = HttpFetcher::new("cp2pdf-test", 5).unwrap();
        match fetcher.fetch_text(&url).await.unwrap_err() {
            PipelineError::Fetch { status, .. } => assert_eq!(status, Some(404)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_url_is_fetch_error() {
        let fetcher = HttpFetcher::new("cp2pdf-test", 5).unwrap();
        let err = fetcher.fetch_text("not a url").await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { status: None, .. }));
    }
}
