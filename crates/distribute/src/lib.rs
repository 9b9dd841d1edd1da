//! App Center release distribution pipeline.
//!
//! Implements the business logic of one distribution run. HTTP access goes
//! through the [`DistributionApi`] trait; [`AppCenterApi`] is the production
//! implementation on top of `appcenter_api::Client`.
//!
//! # Pipeline
//!
//! 1. **Begin**: request an upload session (`uploads/releases`)
//! 2. **Upload**: `set_metadata`, then each requested chunk, then `finished`
//! 3. **Commit**: mark `uploadFinished`, poll for `readyToBePublished`, commit
//! 4. **Symbols**: optional debug symbol upload
//! 5. **Publish**: make the release available to groups or a store

pub mod api;
pub mod commit;
pub mod error;
pub mod initiator;
pub mod pipeline;
pub mod publish;
pub mod symbols;
pub mod types;
pub mod uploader;

#[cfg(test)]
pub(crate) mod mock;

pub use api::{AppCenterApi, ApiFuture, DistributionApi, PackageMetadata};
pub use error::DistributeError;
pub use pipeline::Distributor;
pub use types::{
    AppSlug, CommittedRelease, DistributeConfig, DistributeEvent, DistributeOutcome,
    PublishDestination, Stage, SymbolOutcome, SymbolsConfig,
};
