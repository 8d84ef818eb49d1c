use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use axum::body::Bytes;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::error::AppError;

#[derive(Serialize, Debug)]
#[serde(rename_all = "lowercase")]
enum Role {
    User,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    max_tokens: u32,
}

/// Streaming chat-completion client for the upstream model API.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(cfg: &AiConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
        })
    }

    /// Sends `prompt` as a single user message and returns the upstream body
    /// once the handshake succeeded. Nothing has been forwarded to the caller
    /// when this fails.
    pub async fn open_stream(&self, prompt: &str) -> Result<RelayStream<reqwest::Error>, AppError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: Role::User,
                content: prompt,
            }],
            stream: true,
            max_tokens: self.max_tokens,
        };
        debug!(model = %self.model, max_tokens = self.max_tokens, "opening upstream stream");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::UpstreamFailure(format!("connect: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            // dropping `response` here releases the connection
            return Err(AppError::UpstreamFailure(format!("HTTP error: {status}")));
        }
        info!(%status, "upstream stream opened");
        Ok(RelayStream::new(response.bytes_stream().boxed()))
    }
}

/// Forwards upstream chunks one at a time, in order.
///
/// The upstream body is dropped as soon as it ends or fails, or when the
/// relay itself is dropped (caller went away), and never twice. An upstream
/// error becomes `AppError::RelayInterrupted`, after which the stream ends.
pub struct RelayStream<E> {
    upstream: Option<BoxStream<'static, Result<Bytes, E>>>,
    forwarded: usize,
}

impl<E> RelayStream<E> {
    pub fn new(upstream: BoxStream<'static, Result<Bytes, E>>) -> Self {
        Self {
            upstream: Some(upstream),
            forwarded: 0,
        }
    }

    #[cfg(test)]
    pub fn forwarded(&self) -> usize {
        self.forwarded
    }

    fn release(&mut self) {
        if self.upstream.take().is_some() {
            debug!(forwarded = self.forwarded, "upstream released");
        }
    }
}

impl<E: std::fmt::Display> Stream for RelayStream<E> {
    type Item = Result<Bytes, AppError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let Some(upstream) = this.upstream.as_mut() else {
            return Poll::Ready(None);
        };
        match ready!(upstream.poll_next_unpin(cx)) {
            Some(Ok(chunk)) => {
                this.forwarded += chunk.len();
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                let err = AppError::RelayInterrupted {
                    forwarded: this.forwarded,
                    reason: e.to_string(),
                };
                warn!("{err}");
                this.release();
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.release();
                Poll::Ready(None)
            }
        }
    }
}

impl<E> Drop for RelayStream<E> {
    fn drop(&mut self) {
        if self.upstream.is_some() {
            warn!(forwarded = self.forwarded, "caller disconnected before the stream ended");
            self.release();
        }
    }
}
