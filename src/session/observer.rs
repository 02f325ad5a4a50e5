// src/session/observer.rs
// Snapshot observer interface for job progress

use serde_json::Value;

use super::state::JobState;

/// Observer notified as a job advances. Every method has a no-op default, so
/// callers implement only what they care about.
///
/// `on_state` receives an immutable snapshot after every applied event; it is
/// the only way progress is observable before the job settles.
pub trait JobObserver: Send + Sync {
    fn on_state(&self, _state: &JobState) {}

    /// A well-formed event whose name this client does not know. Surfaced
    /// for forward compatibility instead of being dropped silently.
    fn on_unknown_event(&self, _name: &str, _payload: &Value) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl JobObserver for NoopObserver {}

/// Adapter wrapping a single closure for the common snapshot-only call style.
pub struct SnapshotFn<F>(pub F);

impl<F> JobObserver for SnapshotFn<F>
where
    F: Fn(&JobState) + Send + Sync,
{
    fn on_state(&self, state: &JobState) {
        (self.0)(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::JobStatus;
    use std::sync::Mutex;

    #[test]
    fn snapshot_fn_forwards_state() {
        let seen = Mutex::new(Vec::new());
        let observer = SnapshotFn(|state: &JobState| {
            seen.lock().unwrap().push(state.status);
        });
        observer.on_state(&JobState::new());
        observer.on_unknown_event("telemetry", &serde_json::json!({}));
        assert_eq!(*seen.lock().unwrap(), vec![JobStatus::Idle]);
    }
}
