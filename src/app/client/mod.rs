//! Network transport for content downloads
//!
//! The synchronizer never talks to `reqwest` directly. It asks a
//! [`Transport`] for a byte stream starting at a given offset, which keeps the
//! resume logic testable against an in-memory fake.
//!
//! # Examples
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use signage_fetcher::app::client::{ClientConfig, HttpTransport, Transport};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(ClientConfig::default())?;
//! let url = Url::parse("https://cdn.example.com/clip.mp4")?;
//!
//! // Resume after the first kilobyte
//! let mut response = transport.fetch(&url, 1024).await?;
//! while let Some(chunk) = response.body.next().await {
//!     let chunk = chunk?;
//!     println!("{} bytes", chunk.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use url::Url;

use crate::errors::DownloadResult;

pub use config::ClientConfig;
pub use http::HttpTransport;

/// Body stream of a transfer
pub type ByteStream = BoxStream<'static, DownloadResult<Bytes>>;

/// Response to a (possibly ranged) GET
pub struct TransferResponse {
    /// File offset of the first body byte
    ///
    /// Equal to the requested offset when the server honoured the range, and
    /// zero when it sent the whole file instead.
    pub start_offset: u64,
    /// Full file length, when the server announced it
    pub total_len: Option<u64>,
    pub body: ByteStream,
}

impl std::fmt::Debug for TransferResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferResponse")
            .field("start_offset", &self.start_offset)
            .field("total_len", &self.total_len)
            .finish_non_exhaustive()
    }
}

/// Source of content bytes
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`, asking for bytes from `offset` onward when `offset > 0`
    async fn fetch(&self, url: &Url, offset: u64) -> DownloadResult<TransferResponse>;
}
