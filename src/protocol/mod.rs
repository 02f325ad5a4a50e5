// src/protocol/mod.rs
// Wire-level event model for the job stream

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub mod params;

pub use params::{
    AssetsStorage, CodegenSettings, CodegenSource, GetCodeParams, JobType, TrackingMetadata,
};

/// Response header carrying the job type of a freshly created job. Legacy
/// servers report `codegen` where current ones report `f2c`.
pub const JOB_TYPE_HEADER: &str = "x-anima-job-type";

/// One reference to a remote asset produced by the job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetRef {
    pub name: String,
    pub url: String,
}

/// Design metadata reported mid-stream, surfaced on the final result only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesignMetadata {
    pub figma_file_name: String,
    pub figma_selected_frame_name: String,
}

/// One human-readable progress entry. Updates replace the whole sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressMessage {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AssetRef>,
}

/// Sub-status of one `generating_code` update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Running,
    Success,
    Failure,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratingCodePayload {
    pub status: GenerationStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub files: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    #[serde(default)]
    pub error_name: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub token_usage: Option<u64>,
}

/// Discriminated union over the named events the server emits. Each variant
/// maps one-to-one onto a reducer transition.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Queueing { session_id: String },
    Start { session_id: String },
    PreCodegen { message: String },
    FigmaMetadata(DesignMetadata),
    GeneratingCode(GeneratingCodePayload),
    ProgressMessagesUpdated(Vec<ProgressMessage>),
    JobStatusUpdated(HashMap<String, Value>),
    CodegenCompleted,
    AssetsUploaded,
    AssetsList(Vec<AssetRef>),
    Aborted,
    Error(ErrorPayload),
    Done(DonePayload),
    /// Well-formed event with a name this client does not know. Forwarded to
    /// the observer for forward compatibility, never a state change.
    Unknown { name: String, data: Value },
}

/// Payloads that nest their content under a `payload` key.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    payload: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionIdPayload {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressMessagesPayload {
    progress_messages: Vec<ProgressMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusPayload {
    job_status: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AssetsPayload {
    assets: Vec<AssetRef>,
}

impl StreamEvent {
    /// Decode one named frame into a typed event.
    ///
    /// Returns `None` when the data line is not parseable as the payload the
    /// name requires. The stream is expected to carry comments and
    /// heartbeats, so a failed decode skips the frame instead of failing the
    /// job.
    pub fn decode(name: &str, data: &str) -> Option<StreamEvent> {
        let event = match name {
            "queueing" => StreamEvent::Queueing {
                session_id: from_json::<SessionIdPayload>(data)?.session_id,
            },
            "start" => StreamEvent::Start {
                session_id: from_json::<SessionIdPayload>(data)?.session_id,
            },
            "pre_codegen" => StreamEvent::PreCodegen {
                message: from_json::<MessagePayload>(data)?.message,
            },
            "figma_metadata" => StreamEvent::FigmaMetadata(from_json(data)?),
            "generating_code" => {
                StreamEvent::GeneratingCode(from_json::<Envelope<GeneratingCodePayload>>(data)?.payload)
            }
            "progress_messages_updated" => StreamEvent::ProgressMessagesUpdated(
                from_json::<Envelope<ProgressMessagesPayload>>(data)?
                    .payload
                    .progress_messages,
            ),
            "job_status_updated" => StreamEvent::JobStatusUpdated(
                from_json::<Envelope<JobStatusPayload>>(data)?.payload.job_status,
            ),
            // Two names for the same transition; older servers emit the first.
            "codegen_completed" | "generation_completed" => StreamEvent::CodegenCompleted,
            "assets_uploaded" => StreamEvent::AssetsUploaded,
            "assets_list" => {
                StreamEvent::AssetsList(from_json::<Envelope<AssetsPayload>>(data)?.payload.assets)
            }
            "aborted" => StreamEvent::Aborted,
            "error" => StreamEvent::Error(
                from_json::<Envelope<ErrorPayload>>(data)
                    .map(|e| e.payload)
                    .unwrap_or(ErrorPayload {
                        error_name: None,
                        reason: None,
                        status: None,
                        detail: None,
                    }),
            ),
            "done" => StreamEvent::Done(from_json::<Envelope<DonePayload>>(data)?.payload),
            other => {
                let data = from_json::<Value>(data)?;
                StreamEvent::Unknown {
                    name: other.to_string(),
                    data,
                }
            }
        };
        Some(event)
    }
}

fn from_json<T: serde::de::DeserializeOwned>(data: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!("Skipping undecodable frame payload: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_session_events() {
        let event = StreamEvent::decode("queueing", r#"{"sessionId":"abc"}"#);
        assert!(matches!(event, Some(StreamEvent::Queueing { session_id }) if session_id == "abc"));

        let event = StreamEvent::decode("start", r#"{"sessionId":"abc"}"#);
        assert!(matches!(event, Some(StreamEvent::Start { .. })));
    }

    #[test]
    fn decodes_generating_code_with_files() {
        let data = r#"{"payload":{"status":"success","progress":100,"files":{"a.txt":"hello"}}}"#;
        match StreamEvent::decode("generating_code", data) {
            Some(StreamEvent::GeneratingCode(payload)) => {
                assert_eq!(payload.status, GenerationStatus::Success);
                assert_eq!(payload.files.unwrap()["a.txt"], "hello");
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn legacy_completion_name_maps_to_same_event() {
        assert!(matches!(
            StreamEvent::decode("generation_completed", "{}"),
            Some(StreamEvent::CodegenCompleted)
        ));
        assert!(matches!(
            StreamEvent::decode("codegen_completed", "{}"),
            Some(StreamEvent::CodegenCompleted)
        ));
    }

    #[test]
    fn malformed_json_yields_no_event() {
        assert!(StreamEvent::decode("done", "not json").is_none());
        assert!(StreamEvent::decode("generating_code", "{\"payload\":").is_none());
    }

    #[test]
    fn unknown_name_passes_through_when_well_formed() {
        match StreamEvent::decode("telemetry", r#"{"ping":1}"#) {
            Some(StreamEvent::Unknown { name, data }) => {
                assert_eq!(name, "telemetry");
                assert_eq!(data["ping"], 1);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
        assert!(StreamEvent::decode("telemetry", "???").is_none());
    }

    #[test]
    fn error_frame_tolerates_missing_payload_fields() {
        match StreamEvent::decode("error", r#"{"payload":{"errorName":"Task Crashed"}}"#) {
            Some(StreamEvent::Error(payload)) => {
                assert_eq!(payload.error_name.as_deref(), Some("Task Crashed"));
                assert!(payload.reason.is_none());
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }
}
