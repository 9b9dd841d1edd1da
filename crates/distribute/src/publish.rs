//! Publishing a committed release to its destination.

use appcenter_protocol::messages::{ReleasePublish, ReleaseUpdate, StoreDestination};
use appcenter_protocol::types::{BuildInfo, Destination};
use tracing::info;

use crate::api::DistributionApi;
use crate::error::DistributeError;
use crate::types::{DistributeConfig, PublishDestination};

fn build_info(build: &BuildInfo) -> Option<BuildInfo> {
    (!build.is_empty()).then(|| build.clone())
}

/// `PATCH releases/{id}` body for group distribution.
pub fn group_publish_body(
    ids: &[String],
    mandatory: bool,
    notify_testers: bool,
    config: &DistributeConfig,
) -> ReleasePublish {
    let destinations = ids.iter().map(|id| Destination { id: id.clone() }).collect();
    ReleasePublish {
        mandatory_update: Some(mandatory),
        notify_testers: Some(notify_testers),
        build: build_info(&config.build),
        ..ReleasePublish::available(destinations, config.release_notes.clone())
    }
}

/// Makes `release_id` available at the configured destination.
pub async fn publish_release(
    api: &dyn DistributionApi,
    release_id: u64,
    config: &DistributeConfig,
) -> Result<(), DistributeError> {
    match &config.destination {
        PublishDestination::Groups {
            ids,
            mandatory,
            notify_testers,
        } => {
            let body = group_publish_body(ids, *mandatory, *notify_testers, config);
            api.publish_release(release_id, &body).await?;
            info!(release_id, groups = ids.len(), "release distributed to groups");
        }
        PublishDestination::Store { store_id } => {
            let store = StoreDestination {
                id: store_id.clone(),
            };
            api.distribute_to_store(release_id, &store).await?;

            let update = ReleaseUpdate {
                release_notes: config.release_notes.clone(),
                build: build_info(&config.build),
            };
            api.update_release(release_id, &update).await?;
            info!(release_id, store = %store_id, "release distributed to store");
        }
    }
    Ok(())
}
