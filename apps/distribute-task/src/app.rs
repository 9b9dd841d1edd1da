//! Wires the resolved task to the distribution pipeline.

use anyhow::Context;
use appcenter_api::{Client, ClientConfig};
use appcenter_distribute::{
    AppCenterApi, DistributeEvent, DistributeOutcome, Distributor,
};
use tokio::sync::mpsc;

use crate::config::Tuning;
use crate::inputs::Task;
use crate::report;

/// Runs one distribution; Ctrl-C cancels it.
pub async fn run(task: Task, tuning: Tuning) -> anyhow::Result<DistributeOutcome> {
    let client_config = ClientConfig {
        timeout: tuning.timeout(),
        ..ClientConfig::new(&task.api_url, &task.api_token)
    };
    let client = Client::new(&client_config).context("creating API client")?;
    let api = AppCenterApi::new(client, task.app.clone(), tuning.retry_policy());

    let mut config = task.config;
    config.poll = tuning.poll_policy();
    config.chunk_concurrency = tuning.chunk_concurrency;

    tracing::info!(
        app = %task.app,
        package = %config.package_path.display(),
        api = %task.api_url,
        "distributing release"
    );

    let mut distributor = Distributor::new(api, config);
    let events = distributor
        .take_events()
        .context("event channel already taken")?;
    let logger = tokio::spawn(log_events(events));

    let cancel = distributor.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("SIGINT received, cancelling");
            cancel.cancel();
        }
    });

    let result = distributor.run().await;
    interrupt.abort();

    // Dropping the distributor closes the channel and ends the logger.
    drop(distributor);
    let _ = logger.await;

    Ok(result?)
}

async fn log_events(mut events: mpsc::Receiver<DistributeEvent>) {
    let mut last_decile = 0;
    while let Some(event) = events.recv().await {
        match event {
            DistributeEvent::Stage(stage) => tracing::info!("{stage}"),
            DistributeEvent::Progress {
                completed_chunks,
                total_chunks,
                fraction,
                remaining_bytes,
                bytes_per_second,
                eta,
            } => {
                let decile = (fraction * 10.0).floor() as u32;
                if decile > last_decile || completed_chunks == total_chunks {
                    last_decile = decile;
                    tracing::info!(
                        completed_chunks,
                        total_chunks,
                        remaining_bytes,
                        kib_per_sec = (bytes_per_second / 1024.0).round() as u64,
                        eta_secs = eta.map(|d| d.as_secs()),
                        "uploaded {:.0}%",
                        fraction * 100.0
                    );
                }
            }
            DistributeEvent::Warning(message) => println!("{}", report::warning(&message)),
            DistributeEvent::Completed { release_id } => {
                tracing::debug!(release_id, "run completed");
            }
            DistributeEvent::Failed { error } => tracing::debug!(%error, "run failed"),
        }
    }
}
