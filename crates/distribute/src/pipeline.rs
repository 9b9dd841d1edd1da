//! Distribution run orchestrator.
//!
//! Runs begin → upload → finish → commit → symbols → publish for one
//! package, reporting progress through an event channel, and supports
//! cancellation between stages and chunks.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::DistributionApi;
use crate::error::DistributeError;
use crate::types::{DistributeConfig, DistributeEvent, DistributeOutcome, Stage, emit};
use crate::uploader::{PackageUploader, package_metadata};
use crate::{commit, initiator, publish, symbols};

/// Runs one release distribution.
pub struct Distributor<A> {
    api: A,
    config: DistributeConfig,
    events_tx: mpsc::Sender<DistributeEvent>,
    events_rx: Option<mpsc::Receiver<DistributeEvent>>,
    cancel: CancellationToken,
}

impl<A: DistributionApi> Distributor<A> {
    pub fn new(api: A, config: DistributeConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            api,
            config,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<DistributeEvent>> {
        self.events_rx.take()
    }

    /// Returns a cancellation token for this run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Runs every stage and reports `Completed` or `Failed` on the event channel.
    pub async fn run(&self) -> Result<DistributeOutcome, DistributeError> {
        match self.run_stages().await {
            Ok(outcome) => {
                info!(
                    release_id = outcome.release_id,
                    warnings = outcome.warnings.len(),
                    "release distributed"
                );
                emit(
                    &self.events_tx,
                    DistributeEvent::Completed {
                        release_id: outcome.release_id,
                    },
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "distribution failed");
                emit(
                    &self.events_tx,
                    DistributeEvent::Failed {
                        error: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    async fn run_stages(&self) -> Result<DistributeOutcome, DistributeError> {
        let config = &self.config;

        // Input problems fail before any request is made.
        config.destination.validate()?;
        package_metadata(&config.package_path).await?;

        self.enter(Stage::BeginUpload)?;
        let target = initiator::begin_release(&self.api, config).await?;

        self.enter(Stage::UploadChunks)?;
        let uploader =
            PackageUploader::new(&self.api, self.cancel.clone(), config.chunk_concurrency);
        let session = uploader
            .upload(&target, &config.package_path, &self.events_tx)
            .await?;

        self.enter(Stage::FinishUpload)?;
        uploader.finish(&session).await?;

        self.enter(Stage::Commit)?;
        let release =
            commit::commit_release(&self.api, &target.upload_id, &config.poll, &self.cancel)
                .await?;

        let mut warnings = Vec::new();
        let symbol_outcome = match &config.symbols {
            Some(sym) => {
                self.enter(Stage::Symbols)?;
                let outcome = symbols::upload_symbols(&self.api, sym, config, &mut warnings).await?;
                for w in &warnings {
                    emit(&self.events_tx, DistributeEvent::Warning(w.clone()));
                }
                Some(outcome)
            }
            None => None,
        };

        self.enter(Stage::Publish)?;
        publish::publish_release(&self.api, release.release_id, config).await?;

        Ok(DistributeOutcome {
            release_id: release.release_id,
            release_url: release.release_url,
            symbols: symbol_outcome,
            warnings,
        })
    }

    fn enter(&self, stage: Stage) -> Result<(), DistributeError> {
        if self.cancel.is_cancelled() {
            return Err(DistributeError::Cancelled);
        }
        info!(%stage, "stage started");
        emit(&self.events_tx, DistributeEvent::Stage(stage));
        Ok(())
    }
}
