// src/session/mod.rs
// Job session machinery: state, reducer, classification, finalization

pub mod classifier;
pub mod finalizer;
pub mod observer;
pub mod reducer;
pub mod state;
pub mod store;

pub use classifier::{Classification, ErrorClassifier};
pub use observer::{JobObserver, NoopObserver, SnapshotFn};
pub use reducer::{ResultDraft, SessionReducer};
pub use state::{CodeGenerationTask, CodegenResult, JobState, JobStatus, JobTasks, TaskStatus};
pub use store::{InMemorySessionStore, SessionStore};
