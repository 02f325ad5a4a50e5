// src/session/classifier.rs
// Transient-vs-fatal classification of in-band error frames

use tracing::{error, warn};

use crate::config::ClientConfig;
use crate::error::AnimaError;
use crate::protocol::ErrorPayload;

/// Outcome of classifying one error frame.
#[derive(Debug)]
pub enum Classification {
    /// Keep listening; the counter was incremented.
    Transient,
    /// Terminal; settle the job with this error.
    Fatal(AnimaError),
}

/// Per-job error classifier. Constructed fresh for every invocation so the
/// tolerated-error counter never leaks across jobs.
pub struct ErrorClassifier {
    fatal_names: Vec<String>,
    ceiling: u32,
    tolerated: u32,
}

impl ErrorClassifier {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            fatal_names: config.fatal_error_names.clone(),
            ceiling: config.retry_ceiling,
            tolerated: 0,
        }
    }

    /// Classify one in-band `error` frame.
    ///
    /// Frames naming a fatal category terminate immediately. Everything else
    /// is tolerated until the ceiling, after which the job is forced terminal
    /// with the "Unknown error" fallback.
    pub fn classify(&mut self, payload: ErrorPayload) -> Classification {
        let name = payload.error_name.clone().unwrap_or_default();

        if self.fatal_names.iter().any(|fatal| *fatal == name) {
            let err = Self::protocol_error(&name, payload);
            error!("Fatal protocol error: {}", err);
            return Classification::Fatal(err);
        }

        self.tolerated += 1;
        if self.tolerated > self.ceiling {
            error!(
                "Tolerated error ceiling exceeded ({} > {}), forcing terminal",
                self.tolerated, self.ceiling
            );
            return Classification::Fatal(AnimaError::unknown(format!(
                "exceeded {} tolerated protocol errors",
                self.ceiling
            )));
        }

        warn!(
            "Transient protocol error '{}' tolerated ({}/{})",
            name, self.tolerated, self.ceiling
        );
        Classification::Transient
    }

    fn protocol_error(name: &str, payload: ErrorPayload) -> AnimaError {
        // Rate-limit failures arrive as a named category but carry HTTP 429
        // semantics for callers that branch on status.
        let http_status = payload.status.or_else(|| {
            (name == "Rate Limit Exceeded").then_some(429)
        });
        AnimaError::Protocol {
            name: name.to_string(),
            reason: payload.reason.unwrap_or_else(|| name.to_string()),
            http_status,
            detail: payload.detail,
        }
    }
}
