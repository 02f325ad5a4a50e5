// src/session/store.rs
// Injected persistence capability for session re-attachment

use std::collections::HashMap;
use std::sync::Mutex;

use crate::protocol::JobType;

/// Remembers which job type a session id belongs to, so a caller can
/// re-attach after a restart. The SDK only needs get/set/remove by key;
/// entry expiry is the caller's concern.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Option<JobType>;
    fn set(&self, session_id: &str, job_type: JobType);
    fn remove(&self, session_id: &str);
}

/// Default store backed by a process-local map. Callers needing persistence
/// across restarts supply their own implementation.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, JobType>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session_id: &str) -> Option<JobType> {
        self.entries.lock().unwrap().get(session_id).copied()
    }

    fn set(&self, session_id: &str, job_type: JobType) {
        self.entries
            .lock()
            .unwrap()
            .insert(session_id.to_string(), job_type);
    }

    fn remove(&self, session_id: &str) {
        self.entries.lock().unwrap().remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let store = InMemorySessionStore::new();
        assert!(store.get("s1").is_none());
        store.set("s1", JobType::W2c);
        assert_eq!(store.get("s1"), Some(JobType::W2c));
        store.remove("s1");
        assert!(store.get("s1").is_none());
    }
}
