//! Debug symbol upload: reserve a symbol upload, PUT the archive to its
//! blob URL, then commit it.

use appcenter_protocol::messages::SymbolUploadBegin;
use bytes::Bytes;
use chrono::Utc;
use tracing::{info, warn};

use crate::api::DistributionApi;
use crate::error::DistributeError;
use crate::types::{DistributeConfig, SymbolOutcome, SymbolsConfig};

/// Uploads `symbols` for the release described by `config`.
///
/// A missing file or a 404 from the symbol endpoints is tolerated when
/// `config.continue_if_symbols_missing` is set: the run goes on and a
/// message is appended to `warnings`.
pub async fn upload_symbols(
    api: &dyn DistributionApi,
    symbols: &SymbolsConfig,
    config: &DistributeConfig,
    warnings: &mut Vec<String>,
) -> Result<SymbolOutcome, DistributeError> {
    let path = &symbols.path;
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let reason = format!("symbols file {} not found", path.display());
            return tolerate(config, reason, warnings);
        }
        Err(e) => return Err(e.into()),
    };
    if meta.is_dir() {
        return Err(DistributeError::Input(format!(
            "symbols path {} is a directory; archive it into a single file first",
            path.display()
        )));
    }

    let begin = SymbolUploadBegin {
        symbol_type: symbols.symbol_type,
        client_callback: None,
        file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        build: config.build_number.clone(),
        version: config.build_version.clone(),
    };

    let reservation = match api.begin_symbol_upload(&begin).await {
        Ok(r) => r,
        Err(e) if e.is_not_found() => {
            return tolerate(config, format!("symbol upload endpoint: {e}"), warnings);
        }
        Err(e) => return Err(e),
    };

    if let Some(expires) = reservation.expiration_date
        && expires <= Utc::now()
    {
        let msg = format!("symbol upload URL expired at {expires}; attempting upload anyway");
        warn!(symbol_upload_id = %reservation.symbol_upload_id, "{msg}");
        warnings.push(msg);
    }

    let data = Bytes::from(tokio::fs::read(path).await?);
    let size = data.len();
    if let Err(e) = api.upload_symbol_blob(&reservation.upload_url, data).await {
        if e.is_not_found() {
            return tolerate(config, format!("symbol blob upload: {e}"), warnings);
        }
        return Err(e);
    }

    if let Err(e) = api
        .commit_symbol_upload(&reservation.symbol_upload_id)
        .await
    {
        if e.is_not_found() {
            return tolerate(config, format!("symbol upload commit: {e}"), warnings);
        }
        return Err(e);
    }

    info!(
        symbol_upload_id = %reservation.symbol_upload_id,
        symbol_type = ?symbols.symbol_type,
        bytes = size,
        "symbols uploaded"
    );
    Ok(SymbolOutcome::Uploaded {
        symbol_upload_id: reservation.symbol_upload_id,
    })
}

fn tolerate(
    config: &DistributeConfig,
    reason: String,
    warnings: &mut Vec<String>,
) -> Result<SymbolOutcome, DistributeError> {
    if !config.continue_if_symbols_missing {
        return Err(DistributeError::SymbolsNotFound(reason));
    }
    warn!(%reason, "continuing without symbols");
    warnings.push(reason.clone());
    Ok(SymbolOutcome::Skipped { reason })
}
