//! Distribution error types.

use appcenter_protocol::UploadStatus;

/// Errors produced during a distribution run.
#[derive(Debug, thiserror::Error)]
pub enum DistributeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] appcenter_api::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] appcenter_transfer::TransferError),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("release processing failed ({status}): {details}")]
    ReleaseFailed { status: UploadStatus, details: String },

    #[error("release not ready after {attempts} status checks")]
    PollTimeout { attempts: u32 },

    #[error("commit response carried no release id")]
    MissingReleaseId,

    #[error("symbols not found: {0}")]
    SymbolsNotFound(String),

    #[error("cancelled")]
    Cancelled,
}

impl DistributeError {
    /// `true` when the service answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_not_found())
    }
}
