//! `DistributionApi` trait and its App Center implementation.
//!
//! The pipeline only talks to the service through this trait, which keeps
//! the stage logic testable with recording mocks.

use std::future::Future;
use std::pin::Pin;

use appcenter_api::{Client, RetryPolicy};
use appcenter_protocol::UploadStatus;
use appcenter_protocol::messages::{
    BeginReleaseUploadRequest, BeginReleaseUploadResponse, ChunkUploadResponse,
    FinishUploadResponse, ReleasePublish, ReleaseUpdate, SetMetadataResponse, StoreDestination,
    SymbolUploadBegin, SymbolUploadBeginResponse, SymbolUploadCommit, UploadStatusPatch,
    UploadStatusResponse,
};
use appcenter_transfer::{Chunk, UploadTarget};
use bytes::Bytes;
use serde::de::IgnoredAny;

use crate::error::DistributeError;
use crate::types::{AppSlug, encode_component as encode};

/// Boxed future returned by [`DistributionApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DistributeError>> + Send + 'a>>;

/// Package facts reported to `set_metadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
}

/// Control-plane and upload-domain operations used by the pipeline.
pub trait DistributionApi: Send + Sync {
    /// `POST uploads/releases`.
    fn begin_release_upload<'a>(
        &'a self,
        req: &'a BeginReleaseUploadRequest,
    ) -> ApiFuture<'a, BeginReleaseUploadResponse>;

    /// `POST {upload_domain}/upload/set_metadata/{package_asset_id}`.
    fn set_metadata<'a>(
        &'a self,
        target: &'a UploadTarget,
        package: &'a PackageMetadata,
    ) -> ApiFuture<'a, SetMetadataResponse>;

    /// `POST {upload_domain}/upload/upload_chunk/{package_asset_id}?chunk={index}`.
    fn upload_chunk<'a>(
        &'a self,
        target: &'a UploadTarget,
        chunk: Chunk,
    ) -> ApiFuture<'a, ChunkUploadResponse>;

    /// `POST {upload_domain}/upload/finished/{package_asset_id}`.
    fn finish_upload<'a>(&'a self, target: &'a UploadTarget) -> ApiFuture<'a, FinishUploadResponse>;

    /// `PATCH uploads/releases/{id}`.
    fn patch_upload_status<'a>(
        &'a self,
        upload_id: &'a str,
        status: UploadStatus,
    ) -> ApiFuture<'a, UploadStatusResponse>;

    /// `GET uploads/releases/{id}`.
    fn get_upload_status<'a>(&'a self, upload_id: &'a str) -> ApiFuture<'a, UploadStatusResponse>;

    /// `PATCH releases/{id}`.
    fn publish_release<'a>(&'a self, release_id: u64, body: &'a ReleasePublish) -> ApiFuture<'a, ()>;

    /// `POST releases/{id}/stores`.
    fn distribute_to_store<'a>(
        &'a self,
        release_id: u64,
        body: &'a StoreDestination,
    ) -> ApiFuture<'a, ()>;

    /// `PUT releases/{id}`.
    fn update_release<'a>(&'a self, release_id: u64, body: &'a ReleaseUpdate) -> ApiFuture<'a, ()>;

    /// `POST symbol_uploads`.
    fn begin_symbol_upload<'a>(
        &'a self,
        body: &'a SymbolUploadBegin,
    ) -> ApiFuture<'a, SymbolUploadBeginResponse>;

    /// Block-blob `PUT` of the symbols archive to the pre-signed URL.
    fn upload_symbol_blob<'a>(&'a self, upload_url: &'a str, data: Bytes) -> ApiFuture<'a, ()>;

    /// `PATCH symbol_uploads/{id}` with `status: committed`.
    fn commit_symbol_upload<'a>(&'a self, symbol_upload_id: &'a str) -> ApiFuture<'a, ()>;
}

/// [`DistributionApi`] backed by the App Center REST API.
///
/// Release creation and chunk uploads are attempted once; every other
/// call goes through `retry`.
pub struct AppCenterApi {
    client: Client,
    app: AppSlug,
    retry: RetryPolicy,
}

impl AppCenterApi {
    pub fn new(client: Client, app: AppSlug, retry: RetryPolicy) -> Self {
        Self { client, app, retry }
    }

    /// Control-plane URL below `apps/{owner}/{app}/`.
    fn app_url(&self, path: &str) -> String {
        self.client
            .endpoint(&format!("apps/{}/{}", self.app.path(), path))
    }
}

fn upload_url(target: &UploadTarget, action: &str, query: &str) -> String {
    format!(
        "{}/upload/{}/{}?{}token={}",
        target.upload_domain,
        action,
        encode(&target.package_asset_id),
        query,
        target.url_encoded_token
    )
}

impl DistributionApi for AppCenterApi {
    fn begin_release_upload<'a>(
        &'a self,
        req: &'a BeginReleaseUploadRequest,
    ) -> ApiFuture<'a, BeginReleaseUploadResponse> {
        Box::pin(async move {
            let url = self.app_url("uploads/releases");
            Ok(self.client.post_json(&url, req, &RetryPolicy::none()).await?)
        })
    }

    fn set_metadata<'a>(
        &'a self,
        target: &'a UploadTarget,
        package: &'a PackageMetadata,
    ) -> ApiFuture<'a, SetMetadataResponse> {
        Box::pin(async move {
            let query = format!(
                "file_name={}&file_size={}&content_type={}&",
                encode(&package.file_name),
                package.file_size,
                encode(&package.content_type)
            );
            let url = upload_url(target, "set_metadata", &query);
            Ok(self.client.post_bytes(&url, None, &self.retry).await?)
        })
    }

    fn upload_chunk<'a>(
        &'a self,
        target: &'a UploadTarget,
        chunk: Chunk,
    ) -> ApiFuture<'a, ChunkUploadResponse> {
        Box::pin(async move {
            let url = upload_url(target, "upload_chunk", &format!("chunk={}&", chunk.index));
            Ok(self
                .client
                .post_bytes(&url, Some(Bytes::from(chunk.data)), &RetryPolicy::none())
                .await?)
        })
    }

    fn finish_upload<'a>(&'a self, target: &'a UploadTarget) -> ApiFuture<'a, FinishUploadResponse> {
        Box::pin(async move {
            let url = upload_url(target, "finished", "");
            Ok(self.client.post_bytes(&url, None, &self.retry).await?)
        })
    }

    fn patch_upload_status<'a>(
        &'a self,
        upload_id: &'a str,
        status: UploadStatus,
    ) -> ApiFuture<'a, UploadStatusResponse> {
        Box::pin(async move {
            let url = self.app_url(&format!("uploads/releases/{}", encode(upload_id)));
            let body = UploadStatusPatch {
                upload_status: status,
            };
            Ok(self.client.patch_json(&url, &body, &self.retry).await?)
        })
    }

    fn get_upload_status<'a>(&'a self, upload_id: &'a str) -> ApiFuture<'a, UploadStatusResponse> {
        Box::pin(async move {
            let url = self.app_url(&format!("uploads/releases/{}", encode(upload_id)));
            Ok(self.client.get_json(&url, &self.retry).await?)
        })
    }

    fn publish_release<'a>(&'a self, release_id: u64, body: &'a ReleasePublish) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.app_url(&format!("releases/{release_id}"));
            let _: IgnoredAny = self.client.patch_json(&url, body, &self.retry).await?;
            Ok(())
        })
    }

    fn distribute_to_store<'a>(
        &'a self,
        release_id: u64,
        body: &'a StoreDestination,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.app_url(&format!("releases/{release_id}/stores"));
            let _: IgnoredAny = self.client.post_json(&url, body, &self.retry).await?;
            Ok(())
        })
    }

    fn update_release<'a>(&'a self, release_id: u64, body: &'a ReleaseUpdate) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.app_url(&format!("releases/{release_id}"));
            let _: IgnoredAny = self.client.put_json(&url, body, &self.retry).await?;
            Ok(())
        })
    }

    fn begin_symbol_upload<'a>(
        &'a self,
        body: &'a SymbolUploadBegin,
    ) -> ApiFuture<'a, SymbolUploadBeginResponse> {
        Box::pin(async move {
            let url = self.app_url("symbol_uploads");
            Ok(self.client.post_json(&url, body, &self.retry).await?)
        })
    }

    fn upload_symbol_blob<'a>(&'a self, upload_url: &'a str, data: Bytes) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.client.put_blob(upload_url, data, &self.retry).await?;
            Ok(())
        })
    }

    fn commit_symbol_upload<'a>(&'a self, symbol_upload_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.app_url(&format!("symbol_uploads/{}", encode(symbol_upload_id)));
            let body = SymbolUploadCommit::committed();
            let _: IgnoredAny = self.client.patch_json(&url, &body, &self.retry).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> UploadTarget {
        UploadTarget {
            upload_id: "u1".into(),
            package_asset_id: "asset-1".into(),
            upload_domain: "https://upload.example".into(),
            url_encoded_token: "abc%3D%3D".into(),
        }
    }

    #[test]
    fn chunk_url_keeps_token_verbatim() {
        let url = upload_url(&target(), "upload_chunk", "chunk=3&");
        assert_eq!(
            url,
            "https://upload.example/upload/upload_chunk/asset-1?chunk=3&token=abc%3D%3D"
        );
    }

    #[test]
    fn finished_url() {
        let url = upload_url(&target(), "finished", "");
        assert_eq!(url, "https://upload.example/upload/finished/asset-1?token=abc%3D%3D");
    }

    #[test]
    fn app_url_scopes_to_app() {
        let client =
            Client::new(&appcenter_api::ClientConfig::new("https://api.example", "t")).unwrap();
        let api = AppCenterApi::new(client, "testuser/testapp".parse().unwrap(), RetryPolicy::none());
        assert_eq!(
            api.app_url("uploads/releases"),
            "https://api.example/v0.1/apps/testuser/testapp/uploads/releases"
        );
    }
}
