// src/session/reducer.rs
// Folds the event sequence into the job state, one snapshot per transition

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::AnimaError;
use crate::protocol::{AssetRef, DesignMetadata, GenerationStatus, StreamEvent};

use super::observer::JobObserver;
use super::state::{CodegenResult, JobState, JobStatus, TaskStatus};

/// Message on the `pre_codegen` event that marks the design model as built.
const MODEL_BUILT_MESSAGE: &str = "model built";

/// Result fields accumulated while the stream is live. Nothing here is
/// observable on the state until the job finalizes.
#[derive(Debug, Default, Clone)]
pub struct ResultDraft {
    pub files: Option<HashMap<String, String>>,
    pub assets: Option<Vec<AssetRef>>,
    pub design_metadata: Option<DesignMetadata>,
}

/// Single writer over one job's `JobState`. Constructed fresh per invocation;
/// every applied event ends with an immutable snapshot handed to the
/// observer.
pub struct SessionReducer<'a> {
    state: JobState,
    draft: ResultDraft,
    observer: &'a dyn JobObserver,
}

impl<'a> SessionReducer<'a> {
    pub fn new(observer: &'a dyn JobObserver) -> Self {
        let reducer = Self {
            state: JobState::new(),
            draft: ResultDraft::default(),
            observer,
        };
        reducer.observer.on_state(&reducer.state);
        reducer
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.state.session_id.as_deref()
    }

    pub fn draft(&self) -> &ResultDraft {
        &self.draft
    }

    /// Mark the attempt in flight. Called once, before the stream opens.
    pub fn begin(&mut self) {
        self.state.status = JobStatus::Pending;
        self.emit();
    }

    /// Apply one non-terminal event. Terminal frames (`error`, `aborted`,
    /// `done`) are routed by the caller through the classifier and finalizer
    /// and settle via `fail`/`abort`/`complete`.
    pub fn apply(&mut self, event: StreamEvent) {
        if self.state.status.is_terminal() {
            debug!("Dropping event after terminal state");
            return;
        }

        match event {
            StreamEvent::Queueing { session_id } => {
                self.record_session_id(session_id);
            }
            StreamEvent::Start { session_id } => {
                self.record_session_id(session_id);
                self.state.tasks.fetch_design.advance_to(TaskStatus::Running);
            }
            StreamEvent::PreCodegen { message } => {
                if message == MODEL_BUILT_MESSAGE {
                    self.state.tasks.fetch_design.advance_to(TaskStatus::Finished);
                    self.state
                        .tasks
                        .code_generation
                        .status
                        .advance_to(TaskStatus::Running);
                    self.state.tasks.upload_assets.advance_to(TaskStatus::Running);
                }
            }
            StreamEvent::FigmaMetadata(metadata) => {
                self.draft.design_metadata = Some(metadata);
            }
            StreamEvent::GeneratingCode(payload) => {
                self.state
                    .tasks
                    .code_generation
                    .status
                    .advance_to(TaskStatus::Running);
                let progress = payload.progress.clamp(0.0, 100.0);
                if progress > self.state.tasks.code_generation.progress {
                    self.state.tasks.code_generation.progress = progress;
                }
                if payload.status == GenerationStatus::Success {
                    if let Some(files) = payload.files {
                        self.draft.files = Some(files);
                    }
                }
            }
            StreamEvent::ProgressMessagesUpdated(messages) => {
                // Snapshot semantics: each update replaces the sequence.
                self.state.progress_messages = messages;
            }
            StreamEvent::JobStatusUpdated(status) => {
                self.state.job_status = status;
            }
            StreamEvent::CodegenCompleted => {
                self.state
                    .tasks
                    .code_generation
                    .status
                    .advance_to(TaskStatus::Finished);
            }
            StreamEvent::AssetsUploaded => {
                self.state.tasks.upload_assets.advance_to(TaskStatus::Finished);
            }
            StreamEvent::AssetsList(assets) => {
                self.draft.assets = Some(assets);
            }
            StreamEvent::Unknown { name, data } => {
                debug!("Unknown stream event '{}', forwarding to observer", name);
                self.observer.on_unknown_event(&name, &data);
                return; // not a transition, no snapshot
            }
            StreamEvent::Error(_) | StreamEvent::Aborted | StreamEvent::Done(_) => {
                warn!("Terminal frame reached the reducer directly; ignoring");
                return;
            }
        }

        self.emit();
    }

    /// Settle successfully. The result becomes observable atomically with
    /// the `Success` status.
    pub fn complete(&mut self, result: CodegenResult) {
        if self.state.status.is_terminal() {
            return;
        }
        self.state.tasks.code_generation.status.advance_to(TaskStatus::Finished);
        self.state.tasks.code_generation.progress = 100.0;
        self.state.status = JobStatus::Success;
        self.state.result = Some(result);
        self.emit();
    }

    /// Settle with a terminal error.
    pub fn fail(&mut self, error: AnimaError) {
        self.settle(JobStatus::Error, error);
    }

    /// Settle as server-aborted.
    pub fn abort(&mut self) {
        self.settle(JobStatus::Aborted, AnimaError::Aborted);
    }

    fn settle(&mut self, status: JobStatus, error: AnimaError) {
        if self.state.status.is_terminal() {
            return;
        }
        self.state.status = status;
        self.state.error = Some(error);
        self.emit();
    }

    fn record_session_id(&mut self, session_id: String) {
        // Set once; the id never changes for the life of one attempt.
        if self.state.session_id.is_none() {
            self.state.session_id = Some(session_id);
        }
    }

    fn emit(&self) {
        self.observer.on_state(&self.state);
    }
}
