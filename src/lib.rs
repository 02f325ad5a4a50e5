// src/lib.rs

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod stream;

pub use client::AnimaClient;
pub use config::ClientConfig;
pub use error::AnimaError;
pub use protocol::{
    AssetsStorage, CodegenSettings, CodegenSource, GetCodeParams, JobType, StreamEvent,
};
pub use session::{
    CodegenResult, InMemorySessionStore, JobObserver, JobState, JobStatus, NoopObserver,
    SessionStore, SnapshotFn, TaskStatus,
};
pub use tokio_util::sync::CancellationToken;
