// src/stream/mod.rs
// Transport opener: streamed job requests over reqwest

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use futures::StreamExt;
use reqwest::{Client, Method, header};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::AnimaError;
use crate::protocol::JOB_TYPE_HEADER;

pub mod sse;

pub use sse::{SseFrame, SseFrames};

type FrameStream = SseFrames<
    futures::stream::BoxStream<'static, Result<bytes::Bytes, reqwest::Error>>,
>;

/// An open job stream: the parsed frame sequence plus the response metadata
/// the streaming layer itself does not expose.
pub struct JobStream {
    frames: FrameStream,
    job_type_header: Option<String>,
}

impl JobStream {
    /// Next frame, or `None` when the server closes the connection.
    pub async fn next_frame(&mut self) -> Option<Result<SseFrame, AnimaError>> {
        self.frames.next().await
    }

    /// Value of the `x-anima-job-type` response header, when the server sent
    /// one on job creation.
    pub fn job_type_header(&self) -> Option<&str> {
        self.job_type_header.as_deref()
    }

    /// Release the underlying connection. Dropping has the same effect; this
    /// exists so the release point reads explicitly at the call site.
    pub fn close(self) {
        drop(self);
    }
}

/// Open a streamed request against a job endpoint.
///
/// No reachability probe happens before the request is sent; connection
/// failures surface as the returned error, and mid-stream failures surface as
/// error items on the frame stream. A non-2xx response is turned into a typed
/// HTTP error carrying whatever detail the body offers.
pub async fn open_stream(
    client: &Client,
    config: &ClientConfig,
    method: Method,
    url: &str,
    body: &Value,
) -> Result<JobStream, AnimaError> {
    debug!("Opening job stream: {} {}", method, url);

    let mut request = client
        .request(method, url)
        .header(header::ACCEPT, "text/event-stream")
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = &config.auth_token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let payload = serde_json::to_vec(body)
        .map_err(|e| AnimaError::Transport(format!("request encode failed: {e}")))?;

    request = if config.gzip_requests {
        match gzip(&payload) {
            Ok(compressed) => request
                .header(header::CONTENT_ENCODING, "gzip")
                .body(compressed),
            Err(err) => {
                // Compression is an optimization; fall back to plain JSON.
                warn!("Request gzip failed, sending plain JSON: {}", err);
                request.body(payload)
            }
        }
    } else {
        request.body(payload)
    };

    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body_text = response.text().await.unwrap_or_default();
        warn!("Job endpoint returned HTTP {}: {}", status, body_text);
        return Err(http_error(status, &body_text));
    }

    let job_type_header = response
        .headers()
        .get(JOB_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    Ok(JobStream {
        frames: SseFrames::new(response.bytes_stream().boxed()),
        job_type_header,
    })
}

/// Build a typed HTTP error from a non-2xx response body. Prefers the JSON
/// `payload.message` shape the server uses; falls back to the raw text.
pub fn http_error(status: u16, body: &str) -> AnimaError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/payload/message")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.trim().to_string());
    AnimaError::Http { status, detail }
}

fn gzip(payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_prefers_json_message() {
        let err = http_error(422, r#"{"payload":{"message":"bad node ids"}}"#);
        match err {
            AnimaError::Http { status, detail } => {
                assert_eq!(status, 422);
                assert_eq!(detail, "bad node ids");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn http_error_falls_back_to_raw_text() {
        let err = http_error(500, "internal server error\n");
        match err {
            AnimaError::Http { status, detail } => {
                assert_eq!(status, 500);
                assert_eq!(detail, "internal server error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn gzip_round_trip() {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let compressed = gzip(b"{\"a\":1}").unwrap();
        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        assert_eq!(out, "{\"a\":1}");
    }
}
