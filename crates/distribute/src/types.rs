//! Data types for the distribution flow.

use std::path::PathBuf;

use appcenter_api::RetryPolicy;
use appcenter_protocol::{BuildInfo, DEFAULT_DESTINATION_ID, SymbolType};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::DistributeError;

/// Characters escaped in URL path segments and query values (RFC 3986 unreserved are kept).
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encodes one URL path segment or query value.
pub(crate) fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// `owner/app` identifier of an App Center app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSlug {
    pub owner: String,
    pub app: String,
}

impl AppSlug {
    /// Path segment `{owner}/{app}`, each part percent-encoded.
    pub fn path(&self) -> String {
        format!(
            "{}/{}",
            encode_component(&self.owner),
            encode_component(&self.app)
        )
    }
}

impl std::str::FromStr for AppSlug {
    type Err = DistributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split('/').collect::<Vec<_>>().as_slice() {
            [owner, app] if !owner.is_empty() && !app.is_empty() => Ok(Self {
                owner: (*owner).to_string(),
                app: (*app).to_string(),
            }),
            _ => Err(DistributeError::Input(format!(
                "app slug must have the form owner/app: {s:?}"
            ))),
        }
    }
}

impl std::fmt::Display for AppSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.app)
    }
}

/// Where the committed release is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishDestination {
    /// Distribution groups, by id.
    Groups {
        ids: Vec<String>,
        mandatory: bool,
        notify_testers: bool,
    },
    /// A connected store, by id.
    Store { store_id: String },
}

impl Default for PublishDestination {
    fn default() -> Self {
        Self::Groups {
            ids: vec![DEFAULT_DESTINATION_ID.to_string()],
            mandatory: false,
            notify_testers: true,
        }
    }
}

impl PublishDestination {
    /// Checks that every destination id is a UUID.
    pub fn validate(&self) -> Result<(), DistributeError> {
        let ids: Vec<&str> = match self {
            Self::Groups { ids, .. } if ids.is_empty() => {
                return Err(DistributeError::Input("no destination group ids".into()));
            }
            Self::Groups { ids, .. } => ids.iter().map(String::as_str).collect(),
            Self::Store { store_id } => vec![store_id.as_str()],
        };
        for id in ids {
            uuid::Uuid::parse_str(id)
                .map_err(|e| DistributeError::Input(format!("invalid destination id {id:?}: {e}")))?;
        }
        Ok(())
    }
}

/// Debug symbols to upload alongside the release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolsConfig {
    pub symbol_type: SymbolType,
    /// A single archive or mapping file.
    pub path: PathBuf,
}

/// Everything one distribution run needs.
#[derive(Debug, Clone)]
pub struct DistributeConfig {
    /// Package file to upload (`.ipa`, `.apk`, `.aab`, ...).
    pub package_path: PathBuf,
    pub release_notes: String,
    /// Required by the service for some package types (`.zip`, `.msi`, ...).
    pub build_version: Option<String>,
    pub build_number: Option<String>,
    pub destination: PublishDestination,
    pub build: BuildInfo,
    pub symbols: Option<SymbolsConfig>,
    /// Treat missing symbols as a warning.
    pub continue_if_symbols_missing: bool,
    /// Chunk uploads in flight at once; 1 uploads strictly in sequence.
    pub chunk_concurrency: usize,
    /// Status polling while the release is processed.
    pub poll: RetryPolicy,
}

impl DistributeConfig {
    /// A config with defaults for everything but the package.
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        Self {
            package_path: package_path.into(),
            release_notes: String::new(),
            build_version: None,
            build_number: None,
            destination: PublishDestination::default(),
            build: BuildInfo::default(),
            symbols: None,
            continue_if_symbols_missing: false,
            chunk_concurrency: 1,
            poll: default_poll_policy(),
        }
    }
}

/// Polls every 2 s, up to 4 minutes.
pub fn default_poll_policy() -> RetryPolicy {
    RetryPolicy::fixed(120, std::time::Duration::from_secs(2))
}

/// Release identity after the commit step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedRelease {
    pub release_id: u64,
    pub release_url: Option<String>,
}

/// Result of the symbol step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOutcome {
    Uploaded { symbol_upload_id: String },
    /// Symbols missing and tolerated.
    Skipped { reason: String },
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BeginUpload,
    UploadChunks,
    FinishUpload,
    Commit,
    Symbols,
    Publish,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::BeginUpload => "begin upload",
            Self::UploadChunks => "upload chunks",
            Self::FinishUpload => "finish upload",
            Self::Commit => "commit release",
            Self::Symbols => "upload symbols",
            Self::Publish => "publish release",
        })
    }
}

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum DistributeEvent {
    Stage(Stage),
    /// Chunk upload progress.
    Progress {
        completed_chunks: u32,
        total_chunks: u32,
        fraction: f64,
        remaining_bytes: u64,
        bytes_per_second: f64,
        /// Time left at the recent rate; `None` until a rate is known.
        eta: Option<std::time::Duration>,
    },
    /// Recoverable problem; the run continues.
    Warning(String),
    Completed { release_id: u64 },
    Failed { error: String },
}

/// Sends `event` without waiting; a full or closed channel drops it.
pub(crate) fn emit(events: &tokio::sync::mpsc::Sender<DistributeEvent>, event: DistributeEvent) {
    if let Err(e) = events.try_send(event) {
        tracing::trace!(error = %e, "event dropped");
    }
}

/// Successful run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributeOutcome {
    pub release_id: u64,
    pub release_url: Option<String>,
    pub symbols: Option<SymbolOutcome>,
    pub warnings: Vec<String>,
}
