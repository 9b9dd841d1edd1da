//! Chunked package upload against the upload domain.
//!
//! `set_metadata` negotiates the chunk size and the list of chunks the
//! service still needs. Every listed chunk is sent exactly once; a failed
//! chunk aborts the upload. `finished` then asks the service to assemble
//! the package.

use std::path::Path;
use std::sync::Arc;

use appcenter_transfer::{
    ChunkReader, ProgressTracker, UploadProgress, UploadSession, UploadTarget, content_type_for,
    validate_chunk_list,
};
use futures_util::{StreamExt, stream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{DistributionApi, PackageMetadata};
use crate::error::DistributeError;
use crate::types::{DistributeEvent, emit};

/// Reads the facts `set_metadata` needs from the package on disk.
pub async fn package_metadata(path: &Path) -> Result<PackageMetadata, DistributeError> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| {
        DistributeError::Input(format!("package {} not readable: {e}", path.display()))
    })?;
    if !meta.is_file() {
        return Err(DistributeError::Input(format!(
            "package {} is not a file",
            path.display()
        )));
    }
    if meta.len() == 0 {
        return Err(DistributeError::Input(format!(
            "package {} is empty",
            path.display()
        )));
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DistributeError::Input(format!("no file name in {}", path.display())))?;

    Ok(PackageMetadata {
        file_name,
        file_size: meta.len(),
        content_type: content_type_for(path).to_string(),
    })
}

/// Uploads one package.
pub struct PackageUploader<'a> {
    api: &'a dyn DistributionApi,
    cancel: CancellationToken,
    concurrency: usize,
}

impl<'a> PackageUploader<'a> {
    pub fn new(api: &'a dyn DistributionApi, cancel: CancellationToken, concurrency: usize) -> Self {
        Self {
            api,
            cancel,
            concurrency: concurrency.max(1),
        }
    }

    /// Sends `set_metadata` and every requested chunk.
    ///
    /// Returns the session with all chunks recorded; call [`finish`](Self::finish) next.
    pub async fn upload(
        &self,
        target: &UploadTarget,
        path: &Path,
        events: &mpsc::Sender<DistributeEvent>,
    ) -> Result<UploadSession, DistributeError> {
        let package = package_metadata(path).await?;
        debug!(
            file = %package.file_name,
            size = package.file_size,
            content_type = %package.content_type,
            "setting package metadata"
        );

        let metadata = self.api.set_metadata(target, &package).await?;
        if metadata.error {
            let reason = metadata
                .message
                .or(metadata.error_code)
                .unwrap_or_else(|| "set_metadata reported an error".into());
            return Err(DistributeError::UploadRejected(reason));
        }
        if metadata.chunk_size == 0 {
            return Err(DistributeError::UploadRejected(
                "service negotiated a zero chunk size".into(),
            ));
        }
        if metadata.resume_restart {
            info!(upload_id = %target.upload_id, "service restarted the upload from scratch");
        }

        let reader = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            let chunk_size = metadata.chunk_size;
            move || ChunkReader::open(&path, chunk_size)
        })
        .await
        .map_err(|e| DistributeError::UploadRejected(format!("task join error: {e}")))??;
        let reader = Arc::new(reader);
        validate_chunk_list(&metadata.chunk_list, reader.chunk_count())?;

        let session = UploadSession::new(target.clone(), &metadata, reader.file_size());
        info!(
            chunk_size = metadata.chunk_size,
            chunks = metadata.chunk_list.len(),
            total_chunks = reader.chunk_count(),
            concurrency = self.concurrency,
            "uploading package"
        );

        session.start();
        if let Err(e) = self.send_chunks(&session, &reader, events).await {
            session.fail(&e.to_string());
            return Err(e);
        }

        if !session.all_chunks_done() {
            let missing = session.pending_chunks();
            session.fail("chunks missing");
            return Err(DistributeError::UploadRejected(format!(
                "chunks not uploaded: {missing:?}"
            )));
        }
        Ok(session)
    }

    async fn send_chunks(
        &self,
        session: &UploadSession,
        reader: &Arc<ChunkReader>,
        events: &mpsc::Sender<DistributeEvent>,
    ) -> Result<(), DistributeError> {
        let target = session.target();
        let tracker = ProgressTracker::new(session);

        let mut uploads = stream::iter(session.pending_chunks())
            .map(|index| self.send_chunk(target, Arc::clone(reader), index))
            .buffer_unordered(self.concurrency);

        while let Some(result) = uploads.next().await {
            let (index, bytes) = result?;
            let progress = tracker.chunk_done(index, bytes);
            debug!(
                index,
                completed = progress.completed_chunks,
                total = progress.total_chunks,
                "chunk uploaded"
            );
            emit(events, progress_event(&progress));
        }
        Ok(())
    }

    async fn send_chunk(
        &self,
        target: &UploadTarget,
        reader: Arc<ChunkReader>,
        index: u32,
    ) -> Result<(u32, u64), DistributeError> {
        if self.cancel.is_cancelled() {
            return Err(DistributeError::Cancelled);
        }

        let chunk = tokio::task::spawn_blocking(move || reader.read_chunk(index))
            .await
            .map_err(|e| DistributeError::UploadRejected(format!("task join error: {e}")))??;
        let bytes = chunk.data.len() as u64;

        let resp = self.api.upload_chunk(target, chunk).await?;
        if resp.error {
            warn!(index, message = ?resp.message, "chunk rejected");
            return Err(DistributeError::UploadRejected(format!(
                "chunk {index} rejected: {}",
                resp.message.unwrap_or_default()
            )));
        }
        Ok((index, bytes))
    }

    /// Asks the service to assemble the uploaded chunks.
    pub async fn finish(&self, session: &UploadSession) -> Result<UploadProgress, DistributeError> {
        let resp = self.api.finish_upload(session.target()).await?;
        if !resp.is_done() {
            let reason = resp
                .message
                .unwrap_or_else(|| format!("upload state {:?}", resp.state));
            session.fail(&reason);
            return Err(DistributeError::UploadRejected(reason));
        }
        session.finish();
        let progress = session.progress();
        info!(
            upload_id = %progress.upload_id,
            bytes = progress.uploaded_bytes,
            elapsed_ms = progress.elapsed.map(|d| d.as_millis() as u64),
            "package upload finished"
        );
        Ok(progress)
    }
}

fn progress_event(progress: &UploadProgress) -> DistributeEvent {
    DistributeEvent::Progress {
        completed_chunks: progress.completed_chunks,
        total_chunks: progress.total_chunks,
        fraction: progress.fraction(),
        remaining_bytes: progress.remaining_bytes(),
        bytes_per_second: progress.bytes_per_second,
        eta: progress.eta,
    }
}
