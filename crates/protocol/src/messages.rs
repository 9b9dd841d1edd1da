use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BuildInfo, Destination, SymbolType, UploadStatus, string_or_number};

// ---------------------------------------------------------------------------
// Release upload (control plane)
// ---------------------------------------------------------------------------

/// Body of `POST uploads/releases`. Serializes to `{}` when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeginReleaseUploadRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
}

/// Reply of `POST uploads/releases`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginReleaseUploadResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    pub package_asset_id: String,
    pub upload_domain: String,
    pub url_encoded_token: String,
}

/// Body of `PATCH uploads/releases/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadStatusPatch {
    pub upload_status: UploadStatus,
}

/// Reply of `GET`/`PATCH uploads/releases/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadStatusResponse {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub upload_status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_distinct_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl UploadStatusResponse {
    /// Extracts the numeric release id, falling back to the tail of `release_url`.
    pub fn release_id(&self) -> Option<u64> {
        self.release_distinct_id.or_else(|| {
            self.release_url
                .as_deref()
                .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
                .and_then(|tail| tail.parse().ok())
        })
    }
}

// ---------------------------------------------------------------------------
// Upload domain (chunk endpoints)
// ---------------------------------------------------------------------------

/// Reply of `upload/set_metadata/{package_asset_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetMetadataResponse {
    pub chunk_size: u64,
    #[serde(default)]
    pub chunk_list: Vec<u32>,
    #[serde(default)]
    pub blob_partitions: u32,
    #[serde(default)]
    pub resume_restart: bool,
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Reply of `upload/upload_chunk/{package_asset_id}`; the body may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkUploadResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Reply of `upload/finished/{package_asset_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinishUploadResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FinishUploadResponse {
    /// `true` when the service assembled every chunk.
    pub fn is_done(&self) -> bool {
        !self.error && self.state == crate::UPLOAD_STATE_DONE
    }
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

/// Body of `PATCH releases/{id}` making the release available to groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleasePublish {
    pub status: String,
    pub destinations: Vec<Destination>,
    pub release_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandatory_update: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_testers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildInfo>,
}

impl ReleasePublish {
    /// Builds an `available` publish body.
    pub fn available(destinations: Vec<Destination>, release_notes: String) -> Self {
        Self {
            status: "available".into(),
            destinations,
            release_notes,
            mandatory_update: None,
            notify_testers: None,
            build: None,
        }
    }
}

/// Body of `POST releases/{id}/stores`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDestination {
    pub id: String,
}

/// Body of `PUT releases/{id}` attaching notes and build metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseUpdate {
    pub release_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildInfo>,
}

// ---------------------------------------------------------------------------
// Symbol uploads
// ---------------------------------------------------------------------------

/// Body of `POST symbol_uploads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolUploadBegin {
    pub symbol_type: SymbolType,
    /// URL the service calls once the symbols are processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_callback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Reply of `POST symbol_uploads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolUploadBeginResponse {
    pub symbol_upload_id: String,
    pub upload_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
}

/// Body of `PATCH symbol_uploads/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolUploadCommit {
    pub status: String,
}

impl SymbolUploadCommit {
    pub fn committed() -> Self {
        Self {
            status: "committed".into(),
        }
    }
}
