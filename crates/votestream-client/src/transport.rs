//! `SseTransport` — the HTTP read loop behind a vote stream.
//!
//! One call to [`SseTransport::run`] is one connection:
//!
//! ```text
//! begin_connect ──► GET <stream_url>?token=… ──► status ok? ──► mark_connected
//!                                                   │                 │
//!                                                   ▼                 ▼
//!                                            Lost(Status)      chunk loop ──► StreamSession::ingest
//!                                                                     │
//!                          shutdown / read error / idle / end of body ┘──► disconnect
//! ```
//!
//! The chunk read is the only suspension point inside the loop; every frame
//! in a chunk is applied before the next read. Nothing escapes `run` as a
//! panic or an error: the outcome is always a [`ConnectionEnd`].

use bytes::Bytes;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use votestream_core::{ConnectionLifecycle, ConnectionStatus, IngestOutcome, StreamSession};

use crate::config::EngineConfig;
use crate::error::ClientError;

/// How a connection ended.
#[derive(Debug)]
pub enum ConnectionEnd {
    /// The caller asked to stop.
    Cancelled,
    /// The connection failed or the server closed it.
    Lost(ClientError),
}

/// Receives everything a running connection produces.
///
/// Called from the consumer task only, never concurrently.
pub trait StreamObserver: Send {
    /// The lifecycle changed state.
    fn on_status(&mut self, status: &ConnectionStatus);

    /// A chunk was applied to `session`.
    fn on_ingest(&mut self, session: &StreamSession, outcome: &IngestOutcome);
}

/// Streaming HTTP client for one event-stream endpoint.
#[derive(Debug, Clone)]
pub struct SseTransport {
    url: String,
    http: reqwest::Client,
    idle_timeout: Option<Duration>,
}

impl SseTransport {
    pub fn new(config: &EngineConfig) -> Result<Self, ClientError> {
        // no overall request timeout: the body is meant to stay open
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ClientError::Http(e.to_string()))?;

        Ok(Self {
            url: config.stream_url.clone(),
            http,
            idle_timeout: config.idle_timeout(),
        })
    }

    /// The endpoint, without credentials.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The endpoint with the credential appended as `token`.
    ///
    /// The credential goes in the query string because plain event-stream
    /// clients cannot set an `Authorization` header.
    pub fn request_url(&self, token: &str) -> Result<reqwest::Url, ClientError> {
        reqwest::Url::parse_with_params(&self.url, &[("token", token)]).map_err(|e| {
            ClientError::InvalidUrl {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// Run one connection to completion.
    ///
    /// Drives `lifecycle` through `Connecting → Connected → Disconnected`,
    /// reporting every change and every applied chunk to `observer`.
    pub async fn run(
        &self,
        token: &str,
        session: &mut StreamSession,
        lifecycle: &mut ConnectionLifecycle,
        observer: &mut dyn StreamObserver,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ConnectionEnd {
        lifecycle.begin_connect();
        observer.on_status(&lifecycle.status());
        info!(url = %self.url, "opening vote stream");

        let opened = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => None,
            result = self.open(token) => Some(result),
        };
        let mut response = match opened {
            None => return Self::finish(lifecycle, observer, ConnectionEnd::Cancelled),
            Some(Err(e)) => return Self::finish(lifecycle, observer, ConnectionEnd::Lost(e)),
            Some(Ok(response)) => response,
        };

        if lifecycle.mark_connected() {
            observer.on_status(&lifecycle.status());
        }
        info!(url = %self.url, "vote stream connected");

        let end = loop {
            let read = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => break ConnectionEnd::Cancelled,
                read = self.read_chunk(&mut response) => read,
            };

            match read {
                Ok(Some(chunk)) => {
                    debug!(bytes = chunk.len(), "chunk received");
                    let outcome = session.ingest(&chunk);
                    Self::dispatch(session, lifecycle, observer, outcome);
                }
                Ok(None) => {
                    let outcome = session.finish();
                    Self::dispatch(session, lifecycle, observer, outcome);
                    break ConnectionEnd::Lost(ClientError::Closed);
                }
                Err(e) => break ConnectionEnd::Lost(e),
            }
        };

        Self::finish(lifecycle, observer, end)
    }

    async fn open(&self, token: &str) -> Result<reqwest::Response, ClientError> {
        let url = self.request_url(token)?;
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn read_chunk(&self, response: &mut reqwest::Response) -> Result<Option<Bytes>, ClientError> {
        let read = response.chunk();
        let result = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ClientError::IdleTimeout {
                    ms: limit.as_millis() as u64,
                })?,
            None => read.await,
        };
        result.map_err(|e| ClientError::Http(e.to_string()))
    }

    fn dispatch(
        session: &StreamSession,
        lifecycle: &mut ConnectionLifecycle,
        observer: &mut dyn StreamObserver,
        outcome: IngestOutcome,
    ) {
        if outcome.connected && lifecycle.mark_connected() {
            observer.on_status(&lifecycle.status());
        }
        if outcome.frames > 0 {
            observer.on_ingest(session, &outcome);
        }
    }

    fn finish(
        lifecycle: &mut ConnectionLifecycle,
        observer: &mut dyn StreamObserver,
        end: ConnectionEnd,
    ) -> ConnectionEnd {
        match &end {
            ConnectionEnd::Cancelled => {
                info!("vote stream closed by caller");
                lifecycle.disconnect(None);
            }
            ConnectionEnd::Lost(e) => {
                warn!(error = %e, "vote stream lost");
                lifecycle.disconnect(Some(e.to_string()));
            }
        }
        observer.on_status(&lifecycle.status());
        end
    }
}

/// Resolves once shutdown is requested or the requesting side is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(url: &str) -> SseTransport {
        SseTransport::new(&EngineConfig::single_stream(url)).unwrap()
    }

    #[test]
    fn token_goes_in_query_string() {
        let t = transport("http://localhost:8000/api/votings/10/stream");
        let url = t.request_url("abc 123").unwrap();
        assert_eq!(url.path(), "/api/votings/10/stream");
        assert_eq!(url.query(), Some("token=abc+123"));
        assert_eq!(t.url(), "http://localhost:8000/api/votings/10/stream");
    }

    #[test]
    fn existing_query_is_kept() {
        let t = transport("http://localhost:8000/stream?voting=10");
        let url = t.request_url("t").unwrap();
        assert_eq!(url.query(), Some("voting=10&token=t"));
    }

    #[tokio::test]
    async fn shutdown_resolves_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        shutdown_requested(&mut rx).await;
    }

    #[tokio::test]
    async fn shutdown_resolves_on_request() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { shutdown_requested(&mut rx).await });
        tx.send(true).unwrap();
        waiter.await.unwrap();
    }
}
