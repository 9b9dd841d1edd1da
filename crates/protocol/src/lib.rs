//! Wire types for the App Center release distribution REST API.
//!
//! Covers the control-plane release upload endpoints, the upload-domain
//! chunk endpoints, release publishing and symbol uploads.

pub mod constants;
pub mod messages;
pub mod types;

pub use constants::{
    API_VERSION, CONTINUE_IF_SYMBOLS_NOT_FOUND_ENV, DEFAULT_API_URL, DEFAULT_DESTINATION_ID,
    RETRIABLE_STATUS_CODES, UPLOAD_STATE_DONE,
};
pub use types::{BuildInfo, Destination, DestinationType, SymbolType, UploadStatus};
