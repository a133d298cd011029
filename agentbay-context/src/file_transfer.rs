//! File transfer through presigned URLs.
//!
//! Upload: acquire a PUT URL, stream the local file to it, then sync the
//! owning session so the bytes land in the durable context. Download:
//! acquire a GET URL and stream the body to disk. Download does not sync
//! first; a caller that just wrote data must call `sync()` itself.
//!
//! Presigned URLs are credentials and are only logged through
//! [`redact_url`].

use crate::config::PollOptions;
use crate::error::{ContextError, ContextResult};
use crate::registry::ContextService;
use crate::session::Session;
use crate::sync_coordinator::SyncScope;
use crate::types::{SyncMode, redact_url};
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Invoked with the cumulative byte count after each chunk.
pub type ProgressCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadResult {
    pub bytes_sent: u64,
    pub request_id_upload_url: String,
    pub request_id_sync: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadResult {
    pub bytes_received: u64,
    pub request_id_download_url: String,
    /// Set only by [`FileTransfer::download_after_sync`].
    pub request_id_sync: Option<String>,
}

/// Moves files between the local filesystem and a session's contexts.
pub struct FileTransfer {
    session: Session,
    contexts: ContextService,
    http: Client,
    sync_options: PollOptions,
}

impl FileTransfer {
    pub fn new(session: Session) -> ContextResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            contexts: ContextService::new(session.transport()),
            session,
            http,
            sync_options: PollOptions::default(),
        })
    }

    /// Poll budget for the sync that follows an upload.
    pub fn with_sync_options(mut self, options: PollOptions) -> Self {
        self.sync_options = options;
        self
    }

    /// Uploads `local_path` to `remote_path` inside the context, then syncs.
    ///
    /// Re-uploading to the same remote path overwrites it.
    pub async fn upload(
        &self,
        local_path: impl AsRef<Path>,
        context_id: &str,
        remote_path: &str,
        progress: Option<ProgressCallback>,
    ) -> ContextResult<UploadResult> {
        let local_path = local_path.as_ref();
        let file = tokio::fs::File::open(local_path).await?;
        let size = file.metadata().await?.len();

        let url = self
            .contexts
            .get_file_upload_url(context_id, remote_path)
            .await?;
        debug!(
            context_id,
            remote_path,
            request_id = %url.request_id,
            url = %redact_url(&url.url),
            "acquired upload URL"
        );

        let sent = Arc::new(AtomicU64::new(0));
        let counter = sent.clone();
        let body = ReaderStream::new(file).inspect_ok(move |chunk| {
            let total = counter.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            if let Some(cb) = &progress {
                cb(total);
            }
        });

        let resp = self
            .http
            .put(&url.url)
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ContextError::TransferFailed {
                status: status.as_u16(),
                message: format!("upload to {} rejected: {message}", redact_url(&url.url)),
            });
        }
        let bytes_sent = sent.load(Ordering::Relaxed);

        let synced = self
            .session
            .context()
            .sync(&SyncScope::all().context(context_id), self.sync_options)
            .await?;

        info!(
            context_id,
            remote_path,
            bytes_sent,
            request_id = %synced.request_id,
            "uploaded {}",
            local_path.display()
        );
        Ok(UploadResult {
            bytes_sent,
            request_id_upload_url: url.request_id,
            request_id_sync: synced.request_id,
        })
    }

    /// Downloads `remote_path` from the context into `local_path`,
    /// creating parent directories. An existing file is replaced only when
    /// the whole body has arrived.
    pub async fn download(
        &self,
        context_id: &str,
        remote_path: &str,
        local_path: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> ContextResult<DownloadResult> {
        let local_path = local_path.as_ref();
        let url = self
            .contexts
            .get_file_download_url(context_id, remote_path)
            .await?;
        debug!(
            context_id,
            remote_path,
            request_id = %url.request_id,
            url = %redact_url(&url.url),
            "acquired download URL"
        );

        let resp = self
            .http
            .get(&url.url)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ContextError::TransferFailed {
                status: status.as_u16(),
                message: format!("download from {} rejected: {message}", redact_url(&url.url)),
            });
        }

        let parent = match local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        };
        tokio::fs::create_dir_all(parent).await?;

        // The body lands in a sibling temp file; `local_path` is only
        // replaced once every chunk is on disk. Dropping `staging` on an
        // error removes the partial file.
        let staging = tempfile::NamedTempFile::new_in(parent)?;
        let mut file = tokio::fs::File::from_std(staging.reopen()?);

        let mut received = 0u64;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport_error)?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            if let Some(cb) = &progress {
                cb(received);
            }
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        staging.persist(local_path).map_err(|e| e.error)?;

        info!(
            context_id,
            remote_path,
            bytes_received = received,
            request_id = %url.request_id,
            "downloaded to {}",
            local_path.display()
        );
        Ok(DownloadResult {
            bytes_received: received,
            request_id_download_url: url.request_id,
            request_id_sync: None,
        })
    }

    /// Uploads pending session changes for the context, then downloads.
    /// For callers that wrote `remote_path` from inside the session.
    pub async fn download_after_sync(
        &self,
        context_id: &str,
        remote_path: &str,
        local_path: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> ContextResult<DownloadResult> {
        let scope = SyncScope::all().context(context_id).mode(SyncMode::Upload);
        let synced = self.session.context().sync(&scope, self.sync_options).await?;
        let mut result = self
            .download(context_id, remote_path, local_path, progress)
            .await?;
        result.request_id_sync = Some(synced.request_id);
        Ok(result)
    }
}

/// reqwest errors embed the request URL, which for a presigned URL is the
/// credential.
fn transport_error(err: reqwest::Error) -> ContextError {
    ContextError::Http(err.without_url())
}
