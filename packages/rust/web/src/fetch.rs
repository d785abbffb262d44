//! HTTP client for article pages and thumbnail images.
//!
//! Every request is bounded by a timeout and can be abandoned through a
//! [`CancellationToken`]. Response bodies are read inside the call, so the
//! connection is released on every exit path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use linkshelf_shared::{FetchConfig, LinkshelfError, PageFetcher, Result, ThumbnailFetcher};

// ---------------------------------------------------------------------------
// HttpClient
// ---------------------------------------------------------------------------

/// Shared HTTP client used for page fetches and thumbnail downloads.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: FetchConfig,
}

impl HttpClient {
    /// Build a client from the runtime fetch configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.timeout)
            .build()
            .map_err(|e| LinkshelfError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// GET `url` and read the whole body, enforcing the size cap.
    async fn read_page(&self, url: &Url) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| LinkshelfError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LinkshelfError::Network(format!("{url}: HTTP {status}")));
        }

        let max = self.config.max_page_bytes;
        if let Some(len) = response.content_length() {
            if len > max {
                return Err(LinkshelfError::Network(format!(
                    "{url}: response too large ({len} bytes, max {max})"
                )));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| LinkshelfError::Network(format!("{url}: body read failed: {e}")))?
        {
            if (body.len() + chunk.len()) as u64 > max {
                return Err(LinkshelfError::Network(format!(
                    "{url}: response exceeds {max} bytes"
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(%url, bytes = body.len(), "page fetched");
        Ok(body)
    }

    /// Stream `url` into `partial`, then move it to `dest`. The file is held to
    /// the same size cap as pages.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        partial: &Path,
        timeout: Duration,
    ) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| LinkshelfError::Thumbnail(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LinkshelfError::Thumbnail(format!("{url}: HTTP {status}")));
        }

        let max = self.config.max_page_bytes;
        if let Some(len) = response.content_length() {
            if len > max {
                return Err(LinkshelfError::Thumbnail(format!(
                    "{url}: file too large ({len} bytes, max {max})"
                )));
            }
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_error(parent, e))?;
        }

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| write_error(partial, e))?;

        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| LinkshelfError::Thumbnail(format!("{url}: body read failed: {e}")))?
        {
            if (written + chunk.len()) as u64 > max {
                return Err(LinkshelfError::Thumbnail(format!(
                    "{url}: file exceeds {max} bytes"
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| write_error(partial, e))?;
            written += chunk.len();
        }
        file.flush().await.map_err(|e| write_error(partial, e))?;
        drop(file);

        tokio::fs::rename(partial, dest)
            .await
            .map_err(|e| write_error(dest, e))?;

        debug!(url, dest = %dest.display(), bytes = written, "file downloaded");
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch_page(&self, url: &Url, cancel: &CancellationToken) -> Result<Vec<u8>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(LinkshelfError::Network(format!("{url}: request cancelled")))
            }
            result = self.read_page(url) => result,
        }
    }
}

#[async_trait]
impl ThumbnailFetcher for HttpClient {
    #[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
    async fn fetch_file(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let partial = partial_path(dest);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(LinkshelfError::Thumbnail(format!("{url}: download cancelled")))
            }
            outcome = tokio::time::timeout(timeout, self.download(url, dest, &partial, timeout)) => {
                outcome.unwrap_or_else(|_| {
                    Err(LinkshelfError::Thumbnail(format!(
                        "{url}: timed out after {}s",
                        timeout.as_secs()
                    )))
                })
            }
        };

        if result.is_err() {
            // A missing partial file is expected when the request itself failed
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }
}

/// Sibling path the download is staged in.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn write_error(path: &Path, e: std::io::Error) -> LinkshelfError {
    LinkshelfError::Thumbnail(format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(FetchConfig::default()).expect("build client")
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("linkshelf-fetch-test-{}", Uuid::now_v7()))
    }

    #[test]
    fn partial_path_is_a_sibling() {
        let dest = Path::new("/data/thumb/12");
        assert_eq!(partial_path(dest), PathBuf::from("/data/thumb/12.part"));
    }

    #[tokio::test]
    async fn fetch_page_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/article", server.uri())).unwrap();
        let body = client()
            .fetch_page(&url, &CancellationToken::new())
            .await
            .expect("fetch");
        assert_eq!(body, b"<html>hi</html>");
    }

    #[tokio::test]
    async fn fetch_page_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = client()
            .fetch_page(&url, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LinkshelfError::Network(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn fetch_page_enforces_size_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&server)
            .await;

        let config = FetchConfig {
            max_page_bytes: 1024,
            ..FetchConfig::default()
        };
        let url = Url::parse(&server.uri()).unwrap();
        let err = HttpClient::new(config)
            .unwrap()
            .fetch_page(&url, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too large") || err.to_string().contains("exceeds"));
    }

    #[tokio::test]
    async fn fetch_page_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let config = FetchConfig {
            timeout: Duration::from_millis(200),
            ..FetchConfig::default()
        };
        let url = Url::parse(&server.uri()).unwrap();
        let err = HttpClient::new(config)
            .unwrap()
            .fetch_page(&url, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LinkshelfError::Network(_)));
    }

    #[tokio::test]
    async fn fetch_page_honours_cancellation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let url = Url::parse(&server.uri()).unwrap();
        let err = client().fetch_page(&url, &cancel).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn fetch_file_writes_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let dest = dir.join("thumb").join("7");
        client()
            .fetch_file(
                &format!("{}/img.png", server.uri()),
                &dest,
                Duration::from_secs(60),
                &CancellationToken::new(),
            )
            .await
            .expect("download");

        assert_eq!(std::fs::read(&dest).unwrap(), vec![0x89, b'P', b'N', b'G']);
        assert!(!partial_path(&dest).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let dest = dir.join("thumb").join("8");
        let err = client()
            .fetch_file(
                &format!("{}/img.png", server.uri()),
                &dest,
                Duration::from_secs(60),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LinkshelfError::Thumbnail(_)));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn oversized_download_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&server)
            .await;

        let config = FetchConfig {
            max_page_bytes: 1024,
            ..FetchConfig::default()
        };
        let dir = temp_dir();
        let dest = dir.join("thumb").join("10");
        let err = HttpClient::new(config)
            .unwrap()
            .fetch_file(
                &server.uri(),
                &dest,
                Duration::from_secs(60),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LinkshelfError::Thumbnail(_)));
        assert!(err.to_string().contains("too large") || err.to_string().contains("exceeds"));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn slow_download_hits_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1, 2, 3])
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let dir = temp_dir();
        let dest = dir.join("9");
        let err = client()
            .fetch_file(
                &server.uri(),
                &dest,
                Duration::from_millis(200),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LinkshelfError::Thumbnail(_)));
        assert!(!dest.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
