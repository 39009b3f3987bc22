//! `reqwest`-backed transport
//!
//! Resumed downloads send `Range: bytes=<offset>-`. A `206 Partial Content`
//! reply continues from the requested offset; a plain `200 OK` means the
//! server ignored the range and the caller must restart the file from zero.

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::app::client::config::ClientConfig;
use crate::app::client::{TransferResponse, Transport};
use crate::errors::{DownloadError, DownloadResult};

/// HTTP transport with a shared connection pool
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> DownloadResult<Self> {
        Ok(Self {
            client: config.build_http_client()?,
        })
    }

    /// Wrap an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch a small text document such as the manifest
    pub async fn get_text(&self, url: &Url) -> DownloadResult<String> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::ServerError {
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        debug!("Fetched {} bytes from {}", text.len(), url);
        Ok(text)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, offset: u64) -> DownloadResult<TransferResponse> {
        let mut request = self.client.get(url.clone());
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }

        let response = request.send().await?;
        let status = response.status();

        let start_offset = match status {
            StatusCode::PARTIAL_CONTENT => {
                let start = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_content_range_start)
                    .unwrap_or(offset);
                if start != offset {
                    return Err(DownloadError::MisalignedRange {
                        requested: offset,
                        served: start,
                    });
                }
                start
            }
            StatusCode::OK => {
                if offset > 0 {
                    info!("Server ignored range request for {}, restarting from zero", url);
                }
                0
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(DownloadError::RangeNotSatisfiable { offset });
            }
            other => {
                return Err(DownloadError::ServerError {
                    status: other.as_u16(),
                });
            }
        };

        let body_len = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        debug!(
            "GET {} -> {} (start {}, body {:?})",
            url, status, start_offset, body_len
        );

        Ok(TransferResponse {
            start_offset,
            total_len: body_len.map(|len| start_offset + len),
            body: Box::pin(response.bytes_stream().map_err(DownloadError::Http)),
        })
    }
}

/// Start byte of a `Content-Range: bytes <start>-<end>/<total>` header
fn parse_content_range_start(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range_start() {
        assert_eq!(parse_content_range_start("bytes 100-199/200"), Some(100));
        assert_eq!(parse_content_range_start("bytes 0-0/1"), Some(0));
        assert_eq!(parse_content_range_start("items 1-2/3"), None);
        assert_eq!(parse_content_range_start("bytes */200"), None);
    }

    #[test]
    fn test_transport_creation() {
        assert!(HttpTransport::new(ClientConfig::default()).is_ok());
    }
}
