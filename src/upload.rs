//! File attachment uploads.
//!
//! Uploading a file is a two-step exchange with the host application: the
//! runtime asks it for a presigned URL per file (the host owns whatever
//! storage backend is behind it), then `PUT`s the bytes directly to that
//! URL and reports progress as it goes.

use crate::error::{AgentError, ErrorSource, ErrorType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Granularity at which upload progress is reported, in bytes per chunk.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// A file selected for upload, before a presigned URL has been obtained.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// What the host's presigned-URL exchange returns for one file.
#[derive(Debug, Clone, Deserialize)]
pub struct PresignedUpload {
    pub upload_url: String,
    pub file_reference: FileReference,
}

/// The reference the reducer attaches to a `file` part once upload
/// completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReference {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub url: String,
}

/// Per-file upload progress, `bytes_sent` out of `total_bytes`.
#[derive(Debug, Clone, Copy)]
pub struct UploadProgress {
    pub file_name_index: usize,
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

/// Host hook that exchanges pending uploads for presigned URLs. Mirrors a
/// client-tool handler: arbitrary async work, one call per batch.
pub type UploadUrlRequester = Arc<
    dyn Fn(Vec<PendingUpload>) -> Pin<Box<dyn Future<Output = Result<Vec<PresignedUpload>>> + Send>>
        + Send
        + Sync,
>;

/// Host hook invoked as each file's upload progresses.
pub type ProgressHandler = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Requests presigned URLs for `files`, then `PUT`s each file's bytes to its
/// URL in turn, reporting progress through `on_progress`.
///
/// A failure uploading one file aborts the remaining ones; the caller
/// decides whether to retry via its own host logic, matching the mediator's
/// stance of surfacing failures per-unit rather than masking them.
pub async fn upload_files(
    http_client: &reqwest::Client,
    files: Vec<PendingUpload>,
    requester: &UploadUrlRequester,
    on_progress: Option<&ProgressHandler>,
) -> Result<Vec<FileReference>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    log::debug!("requesting presigned upload urls for {} file(s)", files.len());
    let presigned = requester(files.clone()).await?;
    if presigned.len() != files.len() {
        return Err(Error::from(AgentError::new(
            ErrorType::ValidationError,
            format!(
                "expected {} presigned upload(s), got {}",
                files.len(),
                presigned.len()
            ),
            ErrorSource::Client,
        )));
    }

    let mut references = Vec::with_capacity(files.len());

    for (index, (file, upload)) in files.into_iter().zip(presigned.into_iter()).enumerate() {
        let total_bytes = file.bytes.len() as u64;
        if let Some(on_progress) = on_progress {
            on_progress(UploadProgress {
                file_name_index: index,
                bytes_sent: 0,
                total_bytes,
            });
        }

        let progress_handler = on_progress.cloned();
        let mut sent: u64 = 0;
        let chunks: Vec<Vec<u8>> = if file.bytes.is_empty() {
            vec![Vec::new()]
        } else {
            file.bytes
                .chunks(UPLOAD_CHUNK_BYTES)
                .map(|chunk| chunk.to_vec())
                .collect()
        };
        let body_stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            if let Some(handler) = &progress_handler {
                handler(UploadProgress {
                    file_name_index: index,
                    bytes_sent: sent,
                    total_bytes,
                });
            }
            Ok::<Vec<u8>, std::io::Error>(chunk)
        }));

        let response = http_client
            .put(&upload.upload_url)
            .header("Content-Type", file.mime_type.clone())
            .body(reqwest::Body::wrap_stream(body_stream))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(AgentError::from_http_status(
                status,
                format!("upload of '{}' failed", file.file_name),
            )
            .into());
        }

        references.push(upload.file_reference);
    }

    Ok(references)
}
