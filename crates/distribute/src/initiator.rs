//! Release creation: opens an upload session on the control plane.

use appcenter_protocol::messages::BeginReleaseUploadRequest;
use appcenter_transfer::UploadTarget;
use tracing::info;

use crate::api::DistributionApi;
use crate::error::DistributeError;
use crate::types::DistributeConfig;

/// Builds the `uploads/releases` body from the run config.
pub fn begin_request(config: &DistributeConfig) -> BeginReleaseUploadRequest {
    BeginReleaseUploadRequest {
        build_version: non_empty(config.build_version.as_deref()),
        build_number: non_empty(config.build_number.as_deref()),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// Requests a new release upload and returns where to send the package.
///
/// Attempted once: a failed creation aborts the run.
pub async fn begin_release(
    api: &dyn DistributionApi,
    config: &DistributeConfig,
) -> Result<UploadTarget, DistributeError> {
    let resp = api.begin_release_upload(&begin_request(config)).await?;
    if resp.package_asset_id.is_empty() || resp.upload_domain.is_empty() {
        return Err(DistributeError::UploadRejected(
            "upload session reply lacks package asset id or upload domain".into(),
        ));
    }

    let target = UploadTarget::from(&resp);
    info!(
        upload_id = %target.upload_id,
        asset = %target.package_asset_id,
        domain = %target.upload_domain,
        "release upload started"
    );
    Ok(target)
}
