//! Task inputs and their resolution into a distribution run.
//!
//! Every input can be given as a flag or through the `INPUT_<NAME>`
//! variable the pipeline agent sets for task inputs. Service endpoint
//! credentials and build metadata come from the agent's environment.

use std::path::PathBuf;

use anyhow::{Context, bail};
use appcenter_distribute::{AppSlug, DistributeConfig, PublishDestination, SymbolsConfig};
use appcenter_protocol::constants::{
    BUILD_ID_ENV, BUILD_SOURCE_BRANCH_ENV, BUILD_SOURCE_VERSION_ENV,
};
use appcenter_protocol::{
    BuildInfo, CONTINUE_IF_SYMBOLS_NOT_FOUND_ENV, DEFAULT_API_URL, DEFAULT_DESTINATION_ID, DestinationType,
    SymbolType,
};
use clap::builder::FalseyValueParser;
use clap::{Parser, ValueEnum};

/// Where the release notes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotesSource {
    Input,
    File,
}

/// Upload a package to App Center and distribute the release.
#[derive(Debug, Parser)]
#[command(name = "appcenter-distribute", version)]
pub struct Args {
    /// Service connection id used to look up the endpoint URL and API token.
    #[arg(long, env = "INPUT_SERVERENDPOINT")]
    pub server_endpoint: Option<String>,

    /// API base URL, overriding the service connection.
    #[arg(long)]
    pub api_url: Option<String>,

    /// API token, overriding the service connection.
    #[arg(long)]
    pub api_token: Option<String>,

    /// App slug in `owner/app` form.
    #[arg(long, env = "INPUT_APPSLUG")]
    pub app_slug: String,

    /// Package to upload.
    #[arg(long, env = "INPUT_APP")]
    pub app: PathBuf,

    #[arg(
        long,
        env = "INPUT_RELEASENOTESSELECTION",
        value_enum,
        ignore_case = true,
        default_value = "input"
    )]
    pub release_notes_selection: NotesSource,

    #[arg(long, env = "INPUT_RELEASENOTESINPUT")]
    pub release_notes_input: Option<String>,

    #[arg(long, env = "INPUT_RELEASENOTESFILE")]
    pub release_notes_file: Option<PathBuf>,

    /// Require testers to install this release.
    #[arg(long, env = "INPUT_ISMANDATORY", value_parser = FalseyValueParser::new())]
    pub is_mandatory: bool,

    /// `groups` or `store`.
    #[arg(long, env = "INPUT_DESTINATIONTYPE", default_value = "groups")]
    pub destination_type: DestinationType,

    /// Comma or semicolon separated distribution group ids.
    #[arg(long, env = "INPUT_DESTINATIONGROUPIDS")]
    pub destination_group_ids: Option<String>,

    #[arg(long, env = "INPUT_DESTINATIONSTOREID")]
    pub destination_store_id: Option<String>,

    /// Do not notify testers.
    #[arg(long, env = "INPUT_ISSILENT", value_parser = FalseyValueParser::new())]
    pub is_silent: bool,

    /// `Apple`, `AndroidProguard`, `Breakpad` or `UWP`.
    #[arg(long, env = "INPUT_SYMBOLSTYPE")]
    pub symbols_type: Option<String>,

    /// Single symbols file (zip archive or mapping file).
    #[arg(long, env = "INPUT_SYMBOLSPATH")]
    pub symbols_path: Option<PathBuf>,

    #[arg(long, env = "INPUT_BUILDVERSION")]
    pub build_version: Option<String>,

    #[arg(long, env = "INPUT_BUILDNUMBER")]
    pub build_number: Option<String>,

    /// TOML file with retry, polling and concurrency tuning.
    #[arg(long, env = "APPCENTER_DISTRIBUTE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// A fully resolved run.
#[derive(Debug, Clone)]
pub struct Task {
    pub api_url: String,
    pub api_token: String,
    pub app: AppSlug,
    pub config: DistributeConfig,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

fn non_empty_path(value: Option<&PathBuf>) -> Option<PathBuf> {
    value.filter(|p| !p.as_os_str().is_empty()).cloned()
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Build metadata from the pipeline variables; `refs/heads/` is stripped from the branch.
pub fn build_info(env: &dyn Fn(&str) -> Option<String>) -> BuildInfo {
    let get = |key: &str| non_empty(env(key).as_deref());
    BuildInfo {
        id: get(BUILD_ID_ENV),
        branch: get(BUILD_SOURCE_BRANCH_ENV)
            .map(|b| b.strip_prefix("refs/heads/").map(String::from).unwrap_or(b)),
        commit_hash: get(BUILD_SOURCE_VERSION_ENV),
    }
}

impl Args {
    /// Resolves inputs against `env` (the process environment in production).
    pub fn resolve(&self, env: &dyn Fn(&str) -> Option<String>) -> anyhow::Result<Task> {
        let app: AppSlug = self.app_slug.parse()?;
        let (api_url, api_token) = self.endpoint(env)?;

        let mut config = DistributeConfig::new(self.app.clone());
        config.release_notes = self.release_notes()?;
        config.build_version = non_empty(self.build_version.as_deref());
        config.build_number = non_empty(self.build_number.as_deref());
        config.destination = self.destination()?;
        config.build = build_info(env);
        config.symbols = self.symbols()?;
        config.continue_if_symbols_missing = env(CONTINUE_IF_SYMBOLS_NOT_FOUND_ENV)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        Ok(Task {
            api_url,
            api_token,
            app,
            config,
        })
    }

    fn endpoint(&self, env: &dyn Fn(&str) -> Option<String>) -> anyhow::Result<(String, String)> {
        let id = non_empty(self.server_endpoint.as_deref());
        let from_endpoint = |key: String| non_empty(env(&key).as_deref());

        let url = non_empty(self.api_url.as_deref())
            .or_else(|| id.as_ref().and_then(|id| from_endpoint(format!("ENDPOINT_URL_{id}"))))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let token = non_empty(self.api_token.as_deref()).or_else(|| {
            id.as_ref()
                .and_then(|id| from_endpoint(format!("ENDPOINT_AUTH_PARAMETER_{id}_APITOKEN")))
        });
        let Some(token) = token else {
            match id {
                Some(id) => bail!("no API token found for service connection {id}"),
                None => bail!("either --server-endpoint or --api-token is required"),
            }
        };
        Ok((url, token))
    }

    fn release_notes(&self) -> anyhow::Result<String> {
        match self.release_notes_selection {
            NotesSource::Input => Ok(self.release_notes_input.clone().unwrap_or_default()),
            NotesSource::File => {
                let Some(path) = non_empty_path(self.release_notes_file.as_ref()) else {
                    bail!("release notes file selected but no file given");
                };
                std::fs::read_to_string(&path)
                    .with_context(|| format!("reading release notes from {}", path.display()))
            }
        }
    }

    fn destination(&self) -> anyhow::Result<PublishDestination> {
        match self.destination_type {
            DestinationType::Groups => {
                let mut ids = self
                    .destination_group_ids
                    .as_deref()
                    .map(split_ids)
                    .unwrap_or_default();
                if ids.is_empty() {
                    ids.push(DEFAULT_DESTINATION_ID.to_string());
                }
                Ok(PublishDestination::Groups {
                    ids,
                    mandatory: self.is_mandatory,
                    notify_testers: !self.is_silent,
                })
            }
            DestinationType::Store => {
                let Some(store_id) = non_empty(self.destination_store_id.as_deref()) else {
                    bail!("store destination selected but no store id given");
                };
                Ok(PublishDestination::Store { store_id })
            }
        }
    }

    fn symbols(&self) -> anyhow::Result<Option<SymbolsConfig>> {
        let kind = non_empty(self.symbols_type.as_deref());
        let path = non_empty_path(self.symbols_path.as_ref());
        match (kind, path) {
            (None, None) => Ok(None),
            (Some(kind), Some(path)) => {
                let symbol_type = kind.parse::<SymbolType>().map_err(anyhow::Error::msg)?;
                Ok(Some(SymbolsConfig { symbol_type, path }))
            }
            (Some(kind), None) => bail!("symbols type {kind} given without a symbols path"),
            (None, Some(path)) => bail!("symbols path {} given without a symbols type", path.display()),
        }
    }
}
