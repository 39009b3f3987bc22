//! One resumable transfer attempt
//!
//! Before touching the network the temporary file left by an earlier attempt
//! is inspected:
//!
//! | temp file                 | action                               |
//! |---------------------------|--------------------------------------|
//! | absent                    | full request                         |
//! | shorter than expected     | range request from its length        |
//! | expected size, good hash  | done, no request at all              |
//! | expected size, bad hash   | discard, full request                |
//! | longer than expected      | discard, full request                |
//!
//! Body chunks are appended to the temp file as they arrive. When the server
//! answers a range request with the whole file the temp file is truncated
//! first; a reply starting anywhere else is unusable and the temp file is
//! discarded.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, trace, warn};

use crate::app::cache::{FileCheck, HashVerifier};
use crate::app::client::Transport;
use crate::app::manifest::FileRef;
use crate::constants::logging::PROGRESS_LOG_EVERY;
use crate::errors::{CacheError, DownloadError, DownloadResult};

/// What an earlier attempt left behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempFileState {
    Absent,
    Partial { len: u64 },
    Oversized { len: u64 },
    Complete,
    Corrupt,
}

/// Classify the temp file against the expected size and digest
pub async fn inspect_temp_file(
    temp: &Path,
    file: &FileRef,
    verifier: &HashVerifier,
) -> DownloadResult<TempFileState> {
    let len = match tokio::fs::metadata(temp).await {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TempFileState::Absent),
        Err(e) => return Err(CacheError::io("stat", temp, e).into()),
    };

    if len > file.size {
        return Ok(TempFileState::Oversized { len });
    }
    if len < file.size {
        return Ok(TempFileState::Partial { len });
    }

    match verifier.check(temp, &file.hash).await? {
        FileCheck::Verified => Ok(TempFileState::Complete),
        FileCheck::Mismatch { .. } => Ok(TempFileState::Corrupt),
        FileCheck::Missing => Ok(TempFileState::Absent),
    }
}

/// Remove a temp file, tolerating its absence
pub async fn discard_temp_file(temp: &Path) -> DownloadResult<()> {
    match tokio::fs::remove_file(temp).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io("remove", temp, e).into()),
    }
}

/// Result of a successful attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferOutcome {
    /// Offset the body started at; zero for a fresh download
    pub resumed_from: u64,
    /// Bytes received over the network in this attempt
    pub bytes_received: u64,
    /// Whether a request was made at all
    pub used_network: bool,
}

/// Inputs for a single attempt
pub struct TransferRequest<'a> {
    pub content_id: &'a str,
    pub file: &'a FileRef,
    pub temp: &'a Path,
    pub read_timeout: Duration,
}

/// Bring the temp file to the expected, verified content
///
/// `on_progress` receives the number of bytes on disk after every chunk.
pub async fn run_transfer<F>(
    request: TransferRequest<'_>,
    transport: &dyn Transport,
    verifier: &HashVerifier,
    mut on_progress: F,
) -> DownloadResult<TransferOutcome>
where
    F: FnMut(u64),
{
    let TransferRequest {
        content_id,
        file,
        temp,
        read_timeout,
    } = request;

    let offset = match inspect_temp_file(temp, file, verifier).await? {
        TempFileState::Absent => 0,
        TempFileState::Partial { len } => len,
        TempFileState::Complete => {
            info!("Temp file for {} is already complete", content_id);
            on_progress(file.size);
            return Ok(TransferOutcome::default());
        }
        TempFileState::Corrupt => {
            warn!("Temp file for {} has the wrong hash, discarding", content_id);
            discard_temp_file(temp).await?;
            0
        }
        TempFileState::Oversized { len } => {
            warn!(
                "Temp file for {} has {} bytes, more than the expected {}; discarding",
                content_id, len, file.size
            );
            discard_temp_file(temp).await?;
            0
        }
    };

    if offset > 0 {
        info!("Resuming {} at byte {} of {}", content_id, offset, file.size);
    } else {
        debug!("Downloading {} from {}", content_id, file.url);
    }

    let response = tokio::time::timeout(read_timeout, transport.fetch(&file.url, offset))
        .await
        .map_err(|_| DownloadError::Timeout {
            seconds: read_timeout.as_secs(),
        })??;

    let start = response.start_offset;
    if start != 0 && start != offset {
        return Err(DownloadError::MisalignedRange {
            requested: offset,
            served: start,
        });
    }
    let mut body = response.body;
    let mut out = if start == 0 {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(temp)
            .await?
    } else {
        OpenOptions::new().append(true).open(temp).await?
    };

    let mut written = start;
    let mut chunks: u64 = 0;
    loop {
        let next = tokio::time::timeout(read_timeout, body.next())
            .await
            .map_err(|_| DownloadError::Timeout {
                seconds: read_timeout.as_secs(),
            })?;
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;

        let len = chunk.len() as u64;
        if written + len > file.size {
            out.flush().await?;
            return Err(DownloadError::OversizedTempFile {
                size: written + len,
                expected: file.size,
            });
        }

        out.write_all(&chunk).await?;
        written += len;
        chunks += 1;
        if chunks % PROGRESS_LOG_EVERY == 0 {
            trace!("{}: {} of {} bytes", content_id, written, file.size);
        }
        on_progress(written);
    }
    out.flush().await?;
    drop(out);

    if written < file.size {
        return Err(DownloadError::IncompleteDownload {
            received: written,
            expected: file.size,
        });
    }

    verifier.invalidate(temp);
    let actual = verifier.digest(temp).await?;
    if actual != file.hash {
        return Err(DownloadError::HashMismatch {
            expected: file.hash.to_hex(),
            actual: actual.to_hex(),
        });
    }

    debug!("Verified {} ({} bytes)", content_id, written);
    Ok(TransferOutcome {
        resumed_from: start,
        bytes_received: written - start,
        used_network: true,
    })
}
