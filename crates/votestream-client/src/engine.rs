//! `VoteStreamEngine` — connects a session and publishes its live views.
//!
//! # Usage
//! ```no_run
//! # async fn example() -> Result<(), votestream_client::ClientError> {
//! use votestream_client::{EngineConfig, VoteStreamEngine};
//!
//! let engine = VoteStreamEngine::new(&EngineConfig::single_stream(
//!     "https://api.example.com/votings/10/stream",
//! ))?;
//! let handle = engine.connect("TOKEN").await?;
//! let mut tallies = handle.tallies();
//! while tallies.changed().await.is_ok() {
//!     println!("{:?}", *tallies.borrow());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! One consumer task per handle owns the session and ledger. Readers only
//! ever see published snapshots through `watch` channels.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use votestream_core::{
    tally, units, ConnectionLifecycle, ConnectionStatus, IngestOutcome, StreamMetrics,
    StreamSession, TallyEntry, UnitRecord, UnitVoteStatus, VotingOption,
};

use crate::config::EngineConfig;
use crate::directory::{load_roster, HttpSessionDirectory, Roster, SessionDirectory, StaticDirectory};
use crate::error::ClientError;
use crate::policy::ReconnectPolicy;
use crate::transport::{shutdown_requested, ConnectionEnd, SseTransport, StreamObserver};

pub struct VoteStreamEngine {
    transport: Arc<SseTransport>,
    directory: Arc<dyn SessionDirectory>,
    policy: Arc<dyn ReconnectPolicy>,
}

impl VoteStreamEngine {
    /// Build an engine from config. Without a `directory` section the
    /// option list and roster are empty.
    pub fn new(config: &EngineConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let directory: Arc<dyn SessionDirectory> = match &config.directory {
            Some(dir) => Arc::new(HttpSessionDirectory::new(dir.clone())?),
            None => Arc::new(StaticDirectory::default()),
        };
        Ok(Self {
            transport: Arc::new(SseTransport::new(config)?),
            directory,
            policy: config.reconnect.policy(),
        })
    }

    /// Replace the REST directory.
    pub fn with_directory(mut self, directory: Arc<dyn SessionDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Replace the reconnect policy.
    pub fn with_reconnect_policy(mut self, policy: Arc<dyn ReconnectPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Load the roster, open the stream and return the live handle.
    ///
    /// Fails only if the option list or roster cannot be loaded. Stream
    /// failures are reported on [`StreamHandle::connection`].
    pub async fn connect(&self, token: impl Into<String>) -> Result<StreamHandle, ClientError> {
        let token = token.into();
        let roster = load_roster(self.directory.as_ref(), &token).await?;

        let fallback = StreamSession::with_fallback(roster.votes.clone());
        let (tallies_tx, tallies_rx) = watch::channel(fallback.tallies(&roster.options));
        let (units_tx, units_rx) =
            watch::channel(fallback.unit_statuses(&roster.units, &roster.options));
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let (metrics_tx, metrics_rx) = watch::channel(StreamMetrics::default());
        let (heartbeat_tx, heartbeat_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let publisher = ViewPublisher {
            options: roster.options.clone(),
            units: roster.units.clone(),
            tallies: tallies_tx,
            unit_statuses: units_tx,
            status: status_tx,
            metrics: metrics_tx,
            heartbeat: heartbeat_tx,
            previous: StreamMetrics::default(),
        };

        let task = tokio::spawn(run_consumer(
            Arc::clone(&self.transport),
            Arc::clone(&self.policy),
            token,
            roster,
            publisher,
            shutdown_rx,
        ));

        Ok(StreamHandle {
            tallies: tallies_rx,
            unit_statuses: units_rx,
            status: status_rx,
            metrics: metrics_rx,
            heartbeat: heartbeat_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        })
    }
}

// ─── Consumer task ────────────────────────────────────────────────────────────

async fn run_consumer(
    transport: Arc<SseTransport>,
    policy: Arc<dyn ReconnectPolicy>,
    token: String,
    roster: Roster,
    mut publisher: ViewPublisher,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut lifecycle = ConnectionLifecycle::new();
    let mut fallback = roster.votes;
    let mut attempt = 0u32;

    loop {
        let mut session = StreamSession::with_fallback(fallback);

        let end = transport
            .run(&token, &mut session, &mut lifecycle, &mut publisher, &mut shutdown)
            .await;

        // a 2xx that closes before the snapshot is not progress
        let delivered_snapshot = session.ledger().is_seeded();
        // the next session shows what this one knew until its own snapshot lands
        fallback = session.effective_votes();
        publisher.close_session(session.metrics());

        let err = match end {
            ConnectionEnd::Cancelled => return,
            ConnectionEnd::Lost(err) => err,
        };
        if !err.is_retryable() {
            info!(error = %err, "not reconnecting after permanent error");
            return;
        }
        if delivered_snapshot {
            attempt = 0;
        }
        attempt += 1;

        let Some(delay) = policy.next_delay(attempt) else {
            info!(attempt, "reconnect policy gave up; staying disconnected");
            return;
        };
        warn!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting vote stream");
        publisher.record_reconnect();

        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Recomputes and publishes the derived views on behalf of the consumer task.
struct ViewPublisher {
    options: Vec<VotingOption>,
    units: Vec<UnitRecord>,
    tallies: watch::Sender<Vec<TallyEntry>>,
    unit_statuses: watch::Sender<Vec<UnitVoteStatus>>,
    status: watch::Sender<ConnectionStatus>,
    metrics: watch::Sender<StreamMetrics>,
    heartbeat: watch::Sender<Option<Instant>>,
    /// Counters of finished sessions.
    previous: StreamMetrics,
}

impl ViewPublisher {
    fn publish_metrics(&self, current: &StreamMetrics) {
        let mut total = self.previous.clone();
        total.accumulate(current);
        self.metrics.send_replace(total);
    }

    fn close_session(&mut self, session: &StreamMetrics) {
        self.previous.accumulate(session);
        self.metrics.send_replace(self.previous.clone());
    }

    fn record_reconnect(&mut self) {
        self.previous.reconnections += 1;
        self.metrics.send_replace(self.previous.clone());
    }
}

impl StreamObserver for ViewPublisher {
    fn on_status(&mut self, status: &ConnectionStatus) {
        self.status.send_replace(status.clone());
    }

    fn on_ingest(&mut self, session: &StreamSession, outcome: &IngestOutcome) {
        if outcome.ledger_changed {
            let votes = session.effective_votes();
            self.tallies.send_replace(tally::aggregate(&self.options, &votes));
            self.unit_statuses
                .send_replace(units::resolve(&self.units, &self.options, &votes));
        }
        if session.heartbeat().beats() > 0 {
            let seen = session.heartbeat().last_seen();
            self.heartbeat.send_if_modified(|last| {
                let changed = *last != Some(seen);
                *last = Some(seen);
                changed
            });
        }
        self.publish_metrics(session.metrics());
    }
}

// ─── Handle ───────────────────────────────────────────────────────────────────

/// A live stream. Dropping it stops the stream; [`close`] also waits for
/// the consumer task to finish.
///
/// [`close`]: StreamHandle::close
pub struct StreamHandle {
    tallies: watch::Receiver<Vec<TallyEntry>>,
    unit_statuses: watch::Receiver<Vec<UnitVoteStatus>>,
    status: watch::Receiver<ConnectionStatus>,
    metrics: watch::Receiver<StreamMetrics>,
    heartbeat: watch::Receiver<Option<Instant>>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Per-option tallies, republished on every ledger change.
    pub fn tallies(&self) -> watch::Receiver<Vec<TallyEntry>> {
        self.tallies.clone()
    }

    /// Per-unit voting status, republished on every ledger change.
    pub fn unit_statuses(&self) -> watch::Receiver<Vec<UnitVoteStatus>> {
        self.unit_statuses.clone()
    }

    /// Connection state plus the error behind the last disconnect.
    pub fn connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn metrics(&self) -> watch::Receiver<StreamMetrics> {
        self.metrics.clone()
    }

    /// When the last `heartbeat` event arrived, across reconnects.
    /// `None` until the server sends one.
    pub fn heartbeat(&self) -> watch::Receiver<Option<Instant>> {
        self.heartbeat.clone()
    }

    pub fn last_heartbeat(&self) -> Option<Instant> {
        *self.heartbeat.borrow()
    }

    pub fn current_tallies(&self) -> Vec<TallyEntry> {
        self.tallies.borrow().clone()
    }

    pub fn current_unit_statuses(&self) -> Vec<UnitVoteStatus> {
        self.unit_statuses.borrow().clone()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// `true` once the consumer task has exited (closed, or gave up reconnecting).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait until the consumer task exits on its own.
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.as_mut() {
            if let Err(e) = task.await {
                warn!(error = %e, "vote stream task ended abnormally");
            }
            self.task = None;
        }
    }

    /// Stop the stream and wait for the final `Disconnected` to be published.
    pub async fn close(mut self) {
        self.shutdown.send_replace(true);
        self.finished().await;
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
