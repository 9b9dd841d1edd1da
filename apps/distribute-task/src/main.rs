//! App Center distribution task entry point.

mod app;
mod config;
mod inputs;
mod report;

use std::process::ExitCode;

use appcenter_distribute::DistributeOutcome;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::Tuning;
use crate::inputs::Args;
use crate::report::TaskResult;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let message = e.render().to_string();
            tracing::error!(error = %message.trim(), "invalid task inputs");
            return fail(message.trim()).exit_code();
        }
    };

    let result = match run(&args) {
        Ok(outcome) => {
            let mut message = format!("release {} distributed", outcome.release_id);
            if let Some(url) = &outcome.release_url {
                message.push_str(&format!(" ({url})"));
            }
            println!("{}", report::complete(TaskResult::Succeeded, &message));
            TaskResult::Succeeded
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "distribution failed");
            fail(&format!("{e:#}"))
        }
    };
    result.exit_code()
}

fn fail(message: &str) -> TaskResult {
    for line in report::failure(message) {
        println!("{line}");
    }
    TaskResult::Failed
}

fn run(args: &Args) -> anyhow::Result<DistributeOutcome> {
    let tuning = Tuning::load(args.config.as_deref())?;
    let task = args.resolve(&|key| std::env::var(key).ok())?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting App Center distribution");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(task, tuning))
}
