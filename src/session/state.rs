// src/session/state.rs
// Job state tracked across one streaming attempt

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::AnimaError;
use crate::protocol::{AssetRef, DesignMetadata, ProgressMessage};

/// Overall job status. Transitions are monotonic: `Idle → Pending` and then
/// exactly one of the terminal states; nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Pending,
    Success,
    Aborted,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Aborted | JobStatus::Error)
    }
}

/// Status of one tracked sub-task. Ordering matters: a sub-task only ever
/// advances, never regresses within one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Finished,
}

impl TaskStatus {
    /// Move forward to `next` if it is an advance; out-of-order updates are
    /// dropped to preserve monotonicity.
    pub fn advance_to(&mut self, next: TaskStatus) {
        if next > *self {
            *self = next;
        }
    }
}

/// Code-generation sub-task tracker, the only one with a progress figure.
#[derive(Debug, Clone, Serialize)]
pub struct CodeGenerationTask {
    pub status: TaskStatus,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
}

/// The three tracked phases of a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTasks {
    pub fetch_design: TaskStatus,
    pub code_generation: CodeGenerationTask,
    pub upload_assets: TaskStatus,
}

impl Default for JobTasks {
    fn default() -> Self {
        Self {
            fetch_design: TaskStatus::Pending,
            code_generation: CodeGenerationTask {
                status: TaskStatus::Pending,
                progress: 0.0,
            },
            upload_assets: TaskStatus::Pending,
        }
    }
}

/// Completed generation result, assembled atomically at `done`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodegenResult {
    pub session_id: Option<String>,
    pub token_usage: Option<u64>,
    pub files: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<AssetRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_metadata: Option<DesignMetadata>,
}

/// Snapshot of one job attempt. Created fresh for every
/// `create_job`/`attach_job` call; observers only ever see clones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub status: JobStatus,
    pub session_id: Option<String>,
    pub tasks: JobTasks,
    pub progress_messages: Vec<ProgressMessage>,
    pub job_status: HashMap<String, Value>,
    #[serde(skip)]
    pub error: Option<AnimaError>,
    pub result: Option<CodegenResult>,
}

impl JobState {
    pub fn new() -> Self {
        Self {
            status: JobStatus::Idle,
            session_id: None,
            tasks: JobTasks::default(),
            progress_messages: Vec::new(),
            job_status: HashMap::new(),
            error: None,
            result: None,
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}
