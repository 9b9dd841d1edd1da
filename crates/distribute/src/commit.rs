//! Commit coordination: mark the upload finished, wait for the service to
//! process the package, then commit the release.

use appcenter_api::RetryPolicy;
use appcenter_protocol::UploadStatus;
use appcenter_protocol::messages::UploadStatusResponse;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::DistributionApi;
use crate::error::DistributeError;
use crate::types::CommittedRelease;

/// Runs `uploadFinished` → poll → `committed` for one upload.
///
/// The commit is only issued after `readyToBePublished` was observed.
pub async fn commit_release(
    api: &dyn DistributionApi,
    upload_id: &str,
    poll: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<CommittedRelease, DistributeError> {
    api.patch_upload_status(upload_id, UploadStatus::UploadFinished)
        .await?;
    debug!(upload_id, "upload marked finished");

    let ready = wait_until_ready(api, upload_id, poll, cancel).await?;

    if cancel.is_cancelled() {
        return Err(DistributeError::Cancelled);
    }
    let committed = api
        .patch_upload_status(upload_id, UploadStatus::Committed)
        .await?;
    if committed.upload_status.is_failure() {
        return Err(failed(&committed));
    }

    let release_id = committed
        .release_id()
        .or_else(|| ready.release_id())
        .ok_or(DistributeError::MissingReleaseId)?;
    let release_url = committed.release_url.or(ready.release_url);
    info!(upload_id, release_id, "release committed");

    Ok(CommittedRelease {
        release_id,
        release_url,
    })
}

/// Polls the upload status until `readyToBePublished`.
async fn wait_until_ready(
    api: &dyn DistributionApi,
    upload_id: &str,
    poll: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<UploadStatusResponse, DistributeError> {
    let mut delays = poll.delays();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(DistributeError::Cancelled);
        }
        attempts += 1;
        let resp = api.get_upload_status(upload_id).await?;
        let status = resp.upload_status.clone();
        if status == UploadStatus::ReadyToBePublished {
            debug!(upload_id, attempts, "release ready to be published");
            return Ok(resp);
        }
        if status.is_failure() {
            return Err(failed(&resp));
        }
        debug!(upload_id, attempts, %status, "release still processing");

        let Some(delay) = delays.next() else {
            return Err(DistributeError::PollTimeout { attempts });
        };
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return Err(DistributeError::Cancelled),
        }
    }
}

fn failed(resp: &UploadStatusResponse) -> DistributeError {
    DistributeError::ReleaseFailed {
        status: resp.upload_status.clone(),
        details: resp
            .error_details
            .clone()
            .unwrap_or_else(|| "no details from service".into()),
    }
}
