use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::json;
use tracing::debug;
use tracing::trace;

use crate::config::CoreConfig;
use crate::conversation::Tone;
use crate::error::DuetErr;
use crate::error::Result;

/// Raw byte stream of one answer, as delivered by the transport.
pub(crate) type AnswerByteStream = BoxStream<'static, reqwest::Result<Bytes>>;

/// Thin HTTP client for the answer service. Explicitly constructed and
/// owned by the coordinator; there is no process-wide shared instance.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    num_results: u32,
}

impl ChatClient {
    pub fn new(config: &CoreConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            num_results: config.num_results,
        }
    }

    /// POST one prompt and hand back the streamed response body. No retry:
    /// a failed request surfaces as-is and resubmission is the only
    /// recovery path.
    pub(crate) async fn stream_answer(&self, prompt: &str, tone: Tone) -> Result<AnswerByteStream> {
        let payload = json!({
            "message": prompt,
            "tone": tone,
            "numResults": self.num_results,
        });

        let url = format!("{}/answer/stream", self.base_url);
        debug!(url, "POST (answer stream)");
        trace!("request payload: {payload}");

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DuetErr::UnexpectedStatus(status, body));
        }
        Ok(resp.bytes_stream().boxed())
    }
}
