use std::collections::BTreeSet;
use std::sync::RwLock;
use std::time::Instant;

use appcenter_protocol::messages::{BeginReleaseUploadResponse, SetMetadataResponse};

use crate::progress::UploadProgress;

/// A chunk of package data read for upload.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 1-based chunk index.
    pub index: u32,
    /// Byte offset within the file.
    pub offset: u64,
    pub data: Vec<u8>,
}

/// Addressing for the upload-domain endpoints of one release upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Control-plane upload id (`uploads/releases/{id}`).
    pub upload_id: String,
    pub package_asset_id: String,
    pub upload_domain: String,
    /// Already URL-encoded; appended to query strings verbatim.
    pub url_encoded_token: String,
}

impl From<&BeginReleaseUploadResponse> for UploadTarget {
    fn from(resp: &BeginReleaseUploadResponse) -> Self {
        Self {
            upload_id: resp.id.clone(),
            package_asset_id: resp.package_asset_id.clone(),
            upload_domain: resp.upload_domain.trim_end_matches('/').to_string(),
            url_encoded_token: resp.url_encoded_token.clone(),
        }
    }
}

/// Lifecycle of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Uploading,
    Finished,
    Failed,
}

/// In-memory state of one package upload (thread-safe).
///
/// Created from the `set_metadata` reply and discarded once the release
/// is committed; nothing is persisted.
#[derive(Debug)]
pub struct UploadSession {
    target: UploadTarget,
    chunk_size: u64,
    chunk_list: Vec<u32>,
    file_size: u64,
    inner: RwLock<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    status: SessionStatus,
    completed: BTreeSet<u32>,
    uploaded_bytes: u64,
    started_at: Option<Instant>,
    error: String,
}

impl UploadSession {
    /// Creates a pending session for the chunks requested by the service.
    pub fn new(target: UploadTarget, metadata: &SetMetadataResponse, file_size: u64) -> Self {
        Self {
            target,
            chunk_size: metadata.chunk_size,
            chunk_list: metadata.chunk_list.clone(),
            file_size,
            inner: RwLock::new(SessionInner {
                status: SessionStatus::Pending,
                completed: BTreeSet::new(),
                uploaded_bytes: 0,
                started_at: None,
                error: String::new(),
            }),
        }
    }

    /// Marks the session as uploading.
    pub fn start(&self) {
        let mut s = self.inner.write().unwrap();
        s.status = SessionStatus::Uploading;
        s.started_at = Some(Instant::now());
    }

    /// Records a finished chunk. Returns `false` if it was already recorded.
    pub fn mark_chunk_done(&self, index: u32, bytes: u64) -> bool {
        let mut s = self.inner.write().unwrap();
        if !s.completed.insert(index) {
            return false;
        }
        s.uploaded_bytes += bytes;
        true
    }

    /// Chunks from the service's list that have not completed, in list order.
    pub fn pending_chunks(&self) -> Vec<u32> {
        let s = self.inner.read().unwrap();
        self.chunk_list
            .iter()
            .copied()
            .filter(|i| !s.completed.contains(i))
            .collect()
    }

    /// `true` once every requested chunk is recorded.
    pub fn all_chunks_done(&self) -> bool {
        let s = self.inner.read().unwrap();
        self.chunk_list.iter().all(|i| s.completed.contains(i))
    }

    pub fn finish(&self) {
        self.inner.write().unwrap().status = SessionStatus::Finished;
    }

    pub fn fail(&self, err: &str) {
        let mut s = self.inner.write().unwrap();
        s.status = SessionStatus::Failed;
        s.error = err.to_string();
    }

    /// Snapshot of the current progress.
    pub fn progress(&self) -> UploadProgress {
        let s = self.inner.read().unwrap();
        UploadProgress {
            upload_id: self.target.upload_id.clone(),
            status: s.status,
            total_chunks: self.chunk_list.len() as u32,
            completed_chunks: s.completed.len() as u32,
            total_bytes: self.requested_bytes(),
            uploaded_bytes: s.uploaded_bytes,
            elapsed: s.started_at.map(|t| t.elapsed()),
            bytes_per_second: 0.0,
            eta: None,
            error: s.error.clone(),
        }
    }

    /// Bytes covered by the requested chunk list.
    fn requested_bytes(&self) -> u64 {
        self.chunk_list
            .iter()
            .filter_map(|&i| {
                crate::ChunkRange::for_index(i, self.chunk_size, self.file_size)
                    .ok()
                    .map(|r| r.len)
            })
            .sum()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.read().unwrap().status
    }

    pub fn target(&self) -> &UploadTarget {
        &self.target
    }
}
