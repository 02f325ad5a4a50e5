// src/error.rs
// Typed error taxonomy surfaced by every job entry point

/// Error returned (or stored on the job state) when a code-generation job
/// fails. Exactly one of these settles each `create_job`/`attach_job` call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnimaError {
    /// Non-2xx response before any stream was established.
    #[error("HTTP error {status}: {detail}")]
    Http { status: u16, detail: String },

    /// Terminal in-band protocol error (fatal name, or retry ceiling hit).
    #[error("{name}: {reason}")]
    Protocol {
        name: String,
        reason: String,
        http_status: Option<u16>,
        detail: Option<String>,
    },

    /// Server-side cancellation reported on the stream.
    #[error("Aborted")]
    Aborted,

    /// Caller-supplied cancellation signal fired while the job was running.
    #[error("Cancelled")]
    Cancelled,

    /// `done` arrived without any files produced by `generating_code`.
    #[error("code generation completed without producing files")]
    NoFilesGenerated,

    /// A job is already pending on this client instance.
    #[error("a job is already pending on this client")]
    JobAlreadyPending,

    /// Re-attach was requested for a session with no recorded job type.
    #[error("no job type recorded for session {0}")]
    JobTypeNotFound(String),

    /// Transport-level failure (connect, mid-stream read).
    #[error("transport error: {0}")]
    Transport(String),
}

impl AnimaError {
    /// Stable name for this error, matching the server taxonomy where one
    /// exists (protocol errors keep the server-reported `errorName`).
    pub fn name(&self) -> &str {
        match self {
            AnimaError::Http { .. } => "HttpError",
            AnimaError::Protocol { name, .. } => name,
            AnimaError::Aborted => "Aborted",
            AnimaError::Cancelled => "Cancelled",
            AnimaError::NoFilesGenerated => "NoFilesGenerated",
            AnimaError::JobAlreadyPending => "JobAlreadyPending",
            AnimaError::JobTypeNotFound(_) => "JobTypeNotFound",
            AnimaError::Transport(_) => "TransportError",
        }
    }

    /// HTTP status attached to this error, when one applies.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            AnimaError::Http { status, .. } => Some(*status),
            AnimaError::Protocol { http_status, .. } => *http_status,
            _ => None,
        }
    }

    /// Fallback used when the retry ceiling is exceeded without a fatal
    /// frame ever naming the failure.
    pub fn unknown(reason: impl Into<String>) -> Self {
        AnimaError::Protocol {
            name: "Unknown error".to_string(),
            reason: reason.into(),
            http_status: None,
            detail: None,
        }
    }
}

impl From<reqwest::Error> for AnimaError {
    fn from(err: reqwest::Error) -> Self {
        AnimaError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_keeps_server_name() {
        let err = AnimaError::Protocol {
            name: "Task Crashed".to_string(),
            reason: "worker died".to_string(),
            http_status: None,
            detail: None,
        };
        assert_eq!(err.name(), "Task Crashed");
        assert_eq!(err.to_string(), "Task Crashed: worker died");
    }

    #[test]
    fn unknown_fallback_shape() {
        let err = AnimaError::unknown("too many transient errors");
        assert_eq!(err.name(), "Unknown error");
        assert_eq!(err.http_status(), None);
    }
}
