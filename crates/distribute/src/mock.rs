//! Recording [`DistributionApi`] used by the stage tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use appcenter_api::Error as ApiError;
use appcenter_protocol::UploadStatus;
use appcenter_protocol::messages::{
    BeginReleaseUploadRequest, BeginReleaseUploadResponse, ChunkUploadResponse,
    FinishUploadResponse, ReleasePublish, ReleaseUpdate, SetMetadataResponse, StoreDestination,
    SymbolUploadBegin, SymbolUploadBeginResponse, UploadStatusResponse,
};
use appcenter_transfer::{Chunk, UploadTarget};
use bytes::Bytes;

use crate::api::{ApiFuture, DistributionApi, PackageMetadata};
use crate::error::DistributeError;

/// One observed API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BeginUpload(BeginReleaseUploadRequest),
    SetMetadata(PackageMetadata),
    UploadChunk { index: u32, len: usize },
    FinishUpload,
    PatchStatus(UploadStatus),
    GetStatus,
    Publish(ReleasePublish),
    Store(StoreDestination),
    UpdateRelease(ReleaseUpdate),
    BeginSymbols(SymbolUploadBegin),
    SymbolBlob { url: String, len: usize },
    CommitSymbols(String),
}

pub fn api_error(status: u16) -> DistributeError {
    DistributeError::Api(ApiError::Api {
        status,
        body: format!("mock status {status}"),
    })
}

fn status(upload_status: UploadStatus, release_id: Option<u64>) -> UploadStatusResponse {
    UploadStatusResponse {
        id: "upload-1".into(),
        upload_status,
        release_distinct_id: release_id,
        release_url: None,
        error_details: None,
    }
}

/// Scriptable mock; every field is a knob for one test scenario.
pub struct MockApi {
    pub calls: Mutex<Vec<Call>>,
    pub begin_status: Option<u16>,
    pub metadata: SetMetadataResponse,
    pub fail_chunk: Option<u32>,
    pub reject_chunk: Option<u32>,
    pub finish: FinishUploadResponse,
    pub polls: Mutex<VecDeque<UploadStatusResponse>>,
    pub commit: UploadStatusResponse,
    pub publish_status: Option<u16>,
    pub symbols_status: Option<u16>,
    pub symbol_blob_status: Option<u16>,
    pub symbol_commit_status: Option<u16>,
    pub symbol_expiration: Option<chrono::DateTime<chrono::Utc>>,
}

impl MockApi {
    /// Service that accepts a 4-byte-chunked upload of `chunks` chunks.
    pub fn new(chunks: u32) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            begin_status: None,
            metadata: SetMetadataResponse {
                chunk_size: 4,
                chunk_list: (1..=chunks).collect(),
                ..Default::default()
            },
            fail_chunk: None,
            reject_chunk: None,
            finish: FinishUploadResponse {
                error: false,
                state: "Done".into(),
                message: None,
            },
            polls: Mutex::new(VecDeque::new()),
            commit: status(UploadStatus::Committed, Some(1)),
            publish_status: None,
            symbols_status: None,
            symbol_blob_status: None,
            symbol_commit_status: None,
            symbol_expiration: None,
        }
    }

    /// Queues status replies; once empty, polls answer `readyToBePublished`.
    pub fn with_polls(self, statuses: Vec<UploadStatus>) -> Self {
        *self.polls.lock().unwrap() = statuses.into_iter().map(|s| status(s, None)).collect();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Chunk indices in upload order.
    pub fn uploaded_chunks(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::UploadChunk { index, .. } => Some(index),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl DistributionApi for MockApi {
    fn begin_release_upload<'a>(
        &'a self,
        req: &'a BeginReleaseUploadRequest,
    ) -> ApiFuture<'a, BeginReleaseUploadResponse> {
        self.record(Call::BeginUpload(req.clone()));
        let result = match self.begin_status {
            Some(code) => Err(api_error(code)),
            None => Ok(BeginReleaseUploadResponse {
                id: "upload-1".into(),
                upload_url: None,
                package_asset_id: "asset-1".into(),
                upload_domain: "https://upload.mock".into(),
                url_encoded_token: "tok%3D".into(),
            }),
        };
        Box::pin(async move { result })
    }

    fn set_metadata<'a>(
        &'a self,
        _target: &'a UploadTarget,
        package: &'a PackageMetadata,
    ) -> ApiFuture<'a, SetMetadataResponse> {
        self.record(Call::SetMetadata(package.clone()));
        let result = Ok(self.metadata.clone());
        Box::pin(async move { result })
    }

    fn upload_chunk<'a>(
        &'a self,
        _target: &'a UploadTarget,
        chunk: Chunk,
    ) -> ApiFuture<'a, ChunkUploadResponse> {
        self.record(Call::UploadChunk {
            index: chunk.index,
            len: chunk.data.len(),
        });
        let result = if self.fail_chunk == Some(chunk.index) {
            Err(api_error(500))
        } else {
            Ok(ChunkUploadResponse {
                error: self.reject_chunk == Some(chunk.index),
                message: None,
            })
        };
        Box::pin(async move { result })
    }

    fn finish_upload<'a>(&'a self, _target: &'a UploadTarget) -> ApiFuture<'a, FinishUploadResponse> {
        self.record(Call::FinishUpload);
        let result = Ok(self.finish.clone());
        Box::pin(async move { result })
    }

    fn patch_upload_status<'a>(
        &'a self,
        _upload_id: &'a str,
        upload_status: UploadStatus,
    ) -> ApiFuture<'a, UploadStatusResponse> {
        self.record(Call::PatchStatus(upload_status.clone()));
        let result = match upload_status {
            UploadStatus::Committed => Ok(self.commit.clone()),
            other => Ok(status(other, None)),
        };
        Box::pin(async move { result })
    }

    fn get_upload_status<'a>(&'a self, _upload_id: &'a str) -> ApiFuture<'a, UploadStatusResponse> {
        self.record(Call::GetStatus);
        let next = self.polls.lock().unwrap().pop_front();
        let result = Ok(next.unwrap_or_else(|| status(UploadStatus::ReadyToBePublished, Some(1))));
        Box::pin(async move { result })
    }

    fn publish_release<'a>(&'a self, _release_id: u64, body: &'a ReleasePublish) -> ApiFuture<'a, ()> {
        self.record(Call::Publish(body.clone()));
        let result = match self.publish_status {
            Some(code) => Err(api_error(code)),
            None => Ok(()),
        };
        Box::pin(async move { result })
    }

    fn distribute_to_store<'a>(
        &'a self,
        _release_id: u64,
        body: &'a StoreDestination,
    ) -> ApiFuture<'a, ()> {
        self.record(Call::Store(body.clone()));
        Box::pin(async move { Ok(()) })
    }

    fn update_release<'a>(&'a self, _release_id: u64, body: &'a ReleaseUpdate) -> ApiFuture<'a, ()> {
        self.record(Call::UpdateRelease(body.clone()));
        Box::pin(async move { Ok(()) })
    }

    fn begin_symbol_upload<'a>(
        &'a self,
        body: &'a SymbolUploadBegin,
    ) -> ApiFuture<'a, SymbolUploadBeginResponse> {
        self.record(Call::BeginSymbols(body.clone()));
        let result = match self.symbols_status {
            Some(code) => Err(api_error(code)),
            None => Ok(SymbolUploadBeginResponse {
                symbol_upload_id: "sym-1".into(),
                upload_url: "https://blob.mock/sym-1?sig=x".into(),
                expiration_date: self.symbol_expiration,
            }),
        };
        Box::pin(async move { result })
    }

    fn upload_symbol_blob<'a>(&'a self, upload_url: &'a str, data: Bytes) -> ApiFuture<'a, ()> {
        self.record(Call::SymbolBlob {
            url: upload_url.to_string(),
            len: data.len(),
        });
        let result = match self.symbol_blob_status {
            Some(code) => Err(api_error(code)),
            None => Ok(()),
        };
        Box::pin(async move { result })
    }

    fn commit_symbol_upload<'a>(&'a self, symbol_upload_id: &'a str) -> ApiFuture<'a, ()> {
        self.record(Call::CommitSymbols(symbol_upload_id.to_string()));
        let result = match self.symbol_commit_status {
            Some(code) => Err(api_error(code)),
            None => Ok(()),
        };
        Box::pin(async move { result })
    }
}
