// src/client.rs
// Session facade: create and attach entry points over the job stream

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::AnimaError;
use crate::protocol::{AssetsStorage, GetCodeParams, JobType, StreamEvent};
use crate::session::classifier::{Classification, ErrorClassifier};
use crate::session::finalizer;
use crate::session::observer::JobObserver;
use crate::session::reducer::SessionReducer;
use crate::session::state::CodegenResult;
use crate::session::store::{InMemorySessionStore, SessionStore};
use crate::stream::{JobStream, open_stream};

/// Client for the Anima code-generation API.
///
/// One instance drives at most one `create_job` at a time; concurrent
/// `attach_job` calls on different sessions are independent and unguarded.
pub struct AnimaClient {
    http: ReqwestClient,
    config: ClientConfig,
    store: Arc<dyn SessionStore>,
    create_inflight: AtomicBool,
}

impl AnimaClient {
    pub fn new(config: ClientConfig) -> Result<Self, AnimaError> {
        Self::with_session_store(config, Arc::new(InMemorySessionStore::new()))
    }

    /// Build a client with a caller-supplied session store, for persistence
    /// that survives process restarts.
    pub fn with_session_store(
        config: ClientConfig,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, AnimaError> {
        config
            .validate()
            .map_err(|e| AnimaError::Transport(e.to_string()))?;

        // Only connection establishment is time-bounded. A job stream lives
        // as long as the server keeps it open or until the caller's
        // cancellation token fires; per-request timeouts apply to the
        // non-streamed asset downloads only.
        let http = ReqwestClient::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(AnimaError::from)?;

        info!("Initializing Anima client: base_url={}", config.base_url());

        Ok(Self {
            http,
            config,
            store,
            create_inflight: AtomicBool::new(false),
        })
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Start a new generation job and drive it to completion.
    ///
    /// Resolves with the finished result or rejects with exactly one typed
    /// error; the observer sees every intermediate state snapshot, including
    /// the terminal one, before this returns.
    pub async fn create_job(
        &self,
        params: GetCodeParams,
        observer: &dyn JobObserver,
        cancel: CancellationToken,
    ) -> Result<CodegenResult, AnimaError> {
        let _guard = InflightGuard::acquire(&self.create_inflight)
            .ok_or(AnimaError::JobAlreadyPending)?;

        let job_type = params.source.job_type();
        let url = format!(
            "{}/v2/{}/jobs/stream",
            self.config.base_url(),
            job_type.as_str()
        );

        let mut reducer = SessionReducer::new(observer);
        reducer.begin();

        let stream = match open_stream(
            &self.http,
            &self.config,
            Method::POST,
            &url,
            &params.wire_body(),
        )
        .await
        {
            Ok(stream) => stream,
            Err(err) => {
                reducer.fail(err.clone());
                return Err(err);
            }
        };

        // The response header is authoritative for re-attachment bookkeeping;
        // legacy servers report `codegen` where current ones report `f2c`.
        let persisted_type = stream
            .job_type_header()
            .and_then(|value| JobType::parse(value).ok())
            .unwrap_or(job_type);

        self.run_job(
            stream,
            &mut reducer,
            &cancel,
            &params.assets_storage,
            Some(persisted_type),
        )
        .await
    }

    /// Re-attach to a job created earlier (possibly by another process using
    /// the same session store).
    pub async fn attach_job(
        &self,
        session_id: &str,
        assets_storage: AssetsStorage,
        observer: &dyn JobObserver,
        cancel: CancellationToken,
    ) -> Result<CodegenResult, AnimaError> {
        let job_type = self
            .store
            .get(session_id)
            .ok_or_else(|| AnimaError::JobTypeNotFound(session_id.to_string()))?;

        let url = format!(
            "{}/v2/{}/jobs/{}/stream",
            self.config.base_url(),
            job_type.as_str(),
            session_id
        );

        let mut reducer = SessionReducer::new(observer);
        reducer.begin();

        let stream = match open_stream(
            &self.http,
            &self.config,
            Method::GET,
            &url,
            &serde_json::json!({}),
        )
        .await
        {
            Ok(stream) => stream,
            Err(err) => {
                reducer.fail(err.clone());
                return Err(err);
            }
        };

        self.run_job(stream, &mut reducer, &cancel, &assets_storage, None)
            .await
    }

    /// Drive one open stream to its single terminal resolution. The stream
    /// is released on every exit path and the reducer settles exactly once,
    /// so snapshot observers and the returned result never disagree.
    async fn run_job(
        &self,
        mut stream: JobStream,
        reducer: &mut SessionReducer<'_>,
        cancel: &CancellationToken,
        storage: &AssetsStorage,
        persist_type: Option<JobType>,
    ) -> Result<CodegenResult, AnimaError> {
        let mut classifier = ErrorClassifier::new(&self.config);

        let outcome = loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break Err(AnimaError::Cancelled),
                frame = stream.next_frame() => frame,
            };

            let frame = match frame {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => break Err(err),
                None => {
                    break Err(AnimaError::Transport(
                        "stream closed before the job completed".to_string(),
                    ));
                }
            };

            // Unnamed frames are heartbeats; unparseable payloads are skipped.
            let Some(name) = frame.event.as_deref() else {
                continue;
            };
            let Some(event) = StreamEvent::decode(name, &frame.data) else {
                debug!("Skipping malformed '{}' frame", name);
                continue;
            };

            match event {
                StreamEvent::Error(payload) => match classifier.classify(payload) {
                    Classification::Transient => continue,
                    Classification::Fatal(err) => break Err(err),
                },
                StreamEvent::Aborted => break Err(AnimaError::Aborted),
                StreamEvent::Done(done) => {
                    let draft = reducer.draft().clone();
                    let session_id = reducer.session_id().map(str::to_string);
                    break finalizer::finalize(
                        &self.http,
                        cancel,
                        storage,
                        draft,
                        session_id,
                        done,
                        self.config.timeout(),
                    )
                    .await;
                }
                event => {
                    let had_session = reducer.session_id().is_some();
                    reducer.apply(event);
                    if !had_session {
                        if let (Some(job_type), Some(session_id)) =
                            (persist_type, reducer.session_id())
                        {
                            debug!("Persisting session {} as {}", session_id, job_type.as_str());
                            self.store.set(session_id, job_type);
                        }
                    }
                }
            }
        };

        stream.close();

        // The terminal snapshot is delivered before the call settles.
        match &outcome {
            Ok(result) => reducer.complete(result.clone()),
            Err(AnimaError::Aborted) => reducer.abort(),
            Err(err) => {
                warn!("Job settled with error: {}", err);
                reducer.fail(err.clone());
            }
        }

        outcome
    }
}

/// Advisory single-flight control for `create_job`: released when the call
/// settles, on every path.
struct InflightGuard<'a>(&'a AtomicBool);

impl<'a> InflightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflight_guard_is_exclusive_until_dropped() {
        let flag = AtomicBool::new(false);
        let guard = InflightGuard::acquire(&flag).expect("first acquire");
        assert!(InflightGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(InflightGuard::acquire(&flag).is_some());
    }

    #[tokio::test]
    async fn attach_requires_persisted_job_type() {
        let client = AnimaClient::new(ClientConfig::with_base_url("http://127.0.0.1:9"))
            .expect("client");
        let err = client
            .attach_job(
                "unknown-session",
                AssetsStorage::Host,
                &crate::session::observer::NoopObserver,
                CancellationToken::new(),
            )
            .await
            .expect_err("attach must fail");
        assert!(matches!(err, AnimaError::JobTypeNotFound(_)));
    }
}
