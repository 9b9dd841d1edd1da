//! Protocol constants shared by the client and the release pipeline.

/// Control-plane API version path segment.
pub const API_VERSION: &str = "v0.1";

/// Default control-plane base URL.
pub const DEFAULT_API_URL: &str = "https://api.appcenter.ms";

/// HTTP status codes that are retried by the generic request policy.
///
/// Every other non-2xx status is fatal on first sight.
pub const RETRIABLE_STATUS_CODES: [u16; 6] = [408, 409, 500, 502, 503, 504];

/// State reported by `upload/finished` once all chunks are assembled.
pub const UPLOAD_STATE_DONE: &str = "Done";

/// Built-in "Collaborators" distribution group.
pub const DEFAULT_DESTINATION_ID: &str = "00000000-0000-0000-0000-000000000000";

/// When `true`, a missing symbols archive is reported as a warning.
pub const CONTINUE_IF_SYMBOLS_NOT_FOUND_ENV: &str = "VSMOBILECENTERUPLOAD_CONTINUEIFSYMBOLSNOTFOUND";

/// Pipeline build id.
pub const BUILD_ID_ENV: &str = "BUILD_BUILDID";

/// Pipeline source branch (`refs/heads/...`).
pub const BUILD_SOURCE_BRANCH_ENV: &str = "BUILD_SOURCEBRANCH";

/// Pipeline source commit.
pub const BUILD_SOURCE_VERSION_ENV: &str = "BUILD_SOURCEVERSION";

/// Header carrying the App Center API token (lowercase, as sent on the wire).
pub const API_TOKEN_HEADER: &str = "x-api-token";

/// Header identifying pipeline-originated requests.
pub const REQUEST_SOURCE_HEADER: &str = "internal-request-source";

/// Value of [`REQUEST_SOURCE_HEADER`].
pub const REQUEST_SOURCE: &str = "VSTS";

/// Returns `true` if `status` is in [`RETRIABLE_STATUS_CODES`].
pub fn is_retriable_status(status: u16) -> bool {
    RETRIABLE_STATUS_CODES.contains(&status)
}
