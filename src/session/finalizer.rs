// src/session/finalizer.rs
// Terminal-success validation and local asset materialization

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::join_all;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AnimaError;
use crate::protocol::{AssetRef, AssetsStorage, DonePayload};

use super::reducer::ResultDraft;
use super::state::CodegenResult;

/// Assemble the final result once `done` arrives.
///
/// A `done` without files previously stashed by `generating_code` is a
/// malformed-result failure. When the caller asked for local asset storage,
/// every listed asset is downloaded concurrently and inlined into the file
/// map; individual download failures are omitted, not fatal.
pub async fn finalize(
    http: &Client,
    cancel: &CancellationToken,
    storage: &AssetsStorage,
    draft: ResultDraft,
    session_id: Option<String>,
    done: DonePayload,
    asset_timeout: Duration,
) -> Result<CodegenResult, AnimaError> {
    let mut files = match draft.files {
        Some(files) if !files.is_empty() => files,
        _ => return Err(AnimaError::NoFilesGenerated),
    };

    if let AssetsStorage::Local { path } = storage {
        if let Some(assets) = &draft.assets {
            info!("Inlining {} assets under '{}'", assets.len(), path);
            let downloads = join_all(
                assets
                    .iter()
                    .map(|asset| inline_asset(http, asset, asset_timeout)),
            );
            let outcomes = tokio::select! {
                outcomes = downloads => outcomes,
                _ = cancel.cancelled() => return Err(AnimaError::Cancelled),
            };
            for (asset, outcome) in assets.iter().zip(outcomes) {
                match outcome {
                    Some(data_uri) => {
                        files.insert(format!("{}/{}", path.trim_end_matches('/'), asset.name), data_uri);
                    }
                    None => {
                        warn!("Asset '{}' omitted from result", asset.name);
                    }
                }
            }
        }
    }

    Ok(CodegenResult {
        session_id: done.session_id.or(session_id),
        token_usage: done.token_usage,
        files,
        assets: draft.assets,
        design_metadata: draft.design_metadata,
    })
}

/// Download one asset and encode it as a base64 data URI. Any failure yields
/// `None`; the fan-out treats a missing asset as partial success.
async fn inline_asset(http: &Client, asset: &AssetRef, timeout: Duration) -> Option<String> {
    let response = match http.get(&asset.url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!("Asset '{}' download failed: {}", asset.name, err);
            return None;
        }
    };

    if !response.status().is_success() {
        warn!(
            "Asset '{}' download returned HTTP {}",
            asset.name,
            response.status().as_u16()
        );
        return None;
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Asset '{}' body read failed: {}", asset.name, err);
            return None;
        }
    };

    debug!("Inlined asset '{}' ({} bytes)", asset.name, bytes.len());
    Some(format!("data:{};base64,{}", content_type, BASE64.encode(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn done() -> DonePayload {
        DonePayload {
            session_id: Some("s1".to_string()),
            token_usage: Some(10),
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn done_without_files_is_malformed() {
        let result = finalize(
            &Client::new(),
            &CancellationToken::new(),
            &AssetsStorage::Host,
            ResultDraft::default(),
            None,
            done(),
            TIMEOUT,
        )
        .await;
        assert!(matches!(result, Err(AnimaError::NoFilesGenerated)));
    }

    #[tokio::test]
    async fn done_with_empty_file_map_is_malformed() {
        let draft = ResultDraft {
            files: Some(HashMap::new()),
            ..Default::default()
        };
        let result = finalize(
            &Client::new(),
            &CancellationToken::new(),
            &AssetsStorage::Host,
            draft,
            None,
            done(),
            TIMEOUT,
        )
        .await;
        assert!(matches!(result, Err(AnimaError::NoFilesGenerated)));
    }

    #[tokio::test]
    async fn host_storage_skips_fan_out_and_keeps_fields() {
        let draft = ResultDraft {
            files: Some(HashMap::from([("a.txt".to_string(), "hi".to_string())])),
            assets: Some(vec![AssetRef {
                name: "logo.png".to_string(),
                url: "https://assets.example.com/logo.png".to_string(),
            }]),
            design_metadata: None,
        };
        let result = finalize(
            &Client::new(),
            &CancellationToken::new(),
            &AssetsStorage::Host,
            draft,
            Some("fallback".to_string()),
            done(),
            TIMEOUT,
        )
        .await
        .unwrap();

        assert_eq!(result.session_id.as_deref(), Some("s1"));
        assert_eq!(result.token_usage, Some(10));
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.assets.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn done_session_id_falls_back_to_reducer_value() {
        let draft = ResultDraft {
            files: Some(HashMap::from([("a.txt".to_string(), "hi".to_string())])),
            ..Default::default()
        };
        let result = finalize(
            &Client::new(),
            &CancellationToken::new(),
            &AssetsStorage::Host,
            draft,
            Some("from-start".to_string()),
            DonePayload {
                session_id: None,
                token_usage: None,
            },
            TIMEOUT,
        )
        .await
        .unwrap();
        assert_eq!(result.session_id.as_deref(), Some("from-start"));
    }
}
