// src/protocol/params.rs
// Caller-supplied generation parameters and their wire form

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AnimaError;

/// Kind of generation job, used for endpoint resolution and re-attachment
/// bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Design file to code.
    F2c,
    /// Website (URL or MHTML capture) to code.
    W2c,
    /// Free-text prompt to code.
    P2c,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::F2c => "f2c",
            JobType::W2c => "w2c",
            JobType::P2c => "p2c",
        }
    }

    /// Parse a job type, folding the legacy `codegen` name into `f2c`.
    pub fn parse(value: &str) -> Result<JobType, AnimaError> {
        match value {
            "f2c" | "codegen" => Ok(JobType::F2c),
            "w2c" => Ok(JobType::W2c),
            "p2c" => Ok(JobType::P2c),
            other => Err(AnimaError::JobTypeNotFound(other.to_string())),
        }
    }
}

/// What to generate code from. The legacy "link-to-code" request shape is
/// folded into `Website` at this boundary; nothing downstream sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CodegenSource {
    #[serde(rename_all = "camelCase")]
    DesignFile {
        file_key: String,
        node_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase", alias = "link")]
    Website {
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mhtml: Option<String>,
    },
    Prompt { text: String },
}

impl CodegenSource {
    pub fn job_type(&self) -> JobType {
        match self {
            CodegenSource::DesignFile { .. } => JobType::F2c,
            CodegenSource::Website { .. } => JobType::W2c,
            CodegenSource::Prompt { .. } => JobType::P2c,
        }
    }
}

/// Framework/styling settings shared by every source type. Validation of
/// these values is the settings-schema collaborator's job; the SDK puts them
/// on the wire as given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodegenSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styling: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_library: Option<String>,
}

/// How generated assets should be materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetsStorage {
    /// Server hosts assets and the result references them by URL.
    Host,
    /// Caller provides an external upload target.
    External { upload_url: String },
    /// Assets are downloaded by this SDK after completion and inlined into
    /// the file map under `path`.
    Local { path: String },
}

impl Default for AssetsStorage {
    fn default() -> Self {
        AssetsStorage::Host
    }
}

impl AssetsStorage {
    /// Wire descriptor sent to the server. Local materialization is a client
    /// concern, so the server is asked to host the assets and the SDK
    /// downloads them afterwards.
    pub fn wire_descriptor(&self) -> Value {
        match self {
            AssetsStorage::Host | AssetsStorage::Local { .. } => {
                serde_json::json!({ "strategy": "host" })
            }
            AssetsStorage::External { upload_url } => {
                serde_json::json!({ "strategy": "external", "uploadUrl": upload_url })
            }
        }
    }
}

/// Optional caller-side tracking metadata, forwarded opaquely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_app: Option<String>,
}

/// Full parameter set for one `create_job` call.
#[derive(Debug, Clone)]
pub struct GetCodeParams {
    pub source: CodegenSource,
    pub settings: CodegenSettings,
    pub assets_storage: AssetsStorage,
    pub tracking: Option<TrackingMetadata>,
}

impl GetCodeParams {
    pub fn new(source: CodegenSource) -> Self {
        Self {
            source,
            settings: CodegenSettings::default(),
            assets_storage: AssetsStorage::default(),
            tracking: None,
        }
    }

    pub fn settings(mut self, settings: CodegenSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn assets_storage(mut self, storage: AssetsStorage) -> Self {
        self.assets_storage = storage;
        self
    }

    pub fn tracking(mut self, tracking: TrackingMetadata) -> Self {
        self.tracking = Some(tracking);
        self
    }

    /// Serialize the request body, substituting the server-understood asset
    /// storage descriptor.
    pub fn wire_body(&self) -> Value {
        let mut body = serde_json::json!({
            "source": self.source,
            "settings": self.settings,
            "assetsStorage": self.assets_storage.wire_descriptor(),
        });
        if let Some(tracking) = &self.tracking {
            body["tracking"] = serde_json::to_value(tracking).unwrap_or(Value::Null);
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_normalizes_legacy_codegen() {
        assert_eq!(JobType::parse("codegen").unwrap(), JobType::F2c);
        assert_eq!(JobType::parse("f2c").unwrap(), JobType::F2c);
        assert!(JobType::parse("unknown").is_err());
    }

    #[test]
    fn local_storage_sent_as_host() {
        let storage = AssetsStorage::Local {
            path: "assets".to_string(),
        };
        assert_eq!(storage.wire_descriptor()["strategy"], "host");
    }

    #[test]
    fn wire_body_shape() {
        let params = GetCodeParams::new(CodegenSource::DesignFile {
            file_key: "KEY".to_string(),
            node_ids: vec!["1:2".to_string()],
        });
        let body = params.wire_body();
        assert_eq!(body["source"]["type"], "designFile");
        assert_eq!(body["source"]["fileKey"], "KEY");
        assert_eq!(body["assetsStorage"]["strategy"], "host");
        assert!(body.get("tracking").is_none());
    }

    #[test]
    fn legacy_link_source_deserializes_as_website() {
        let source: CodegenSource =
            serde_json::from_str(r#"{"type":"link","url":"https://example.com"}"#).unwrap();
        assert_eq!(source.job_type(), JobType::W2c);
    }
}
