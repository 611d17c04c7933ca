//! Outbox forwarder.
//!
//! Relays outbox records to the transport in insertion order and marks each
//! one forwarded only after the transport accepted it. A crash between the
//! two steps republishes the record on restart; consumers deduplicate on the
//! message id.

use std::sync::Arc;
use std::time::Duration;

use store::OutboxStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::{Message, Publisher, Result, RetryPolicy};

/// Forwarder settings.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Pause between polls when the outbox is drained.
    pub poll_interval: Duration,
    /// Records fetched per poll.
    pub batch_size: usize,
    /// Backoff between restarts after a failure.
    pub restart: RetryPolicy,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            batch_size: 100,
            restart: RetryPolicy {
                initial_backoff: Duration::from_millis(100),
                max_backoff: Duration::from_secs(10),
                max_attempts: u32::MAX,
            },
        }
    }
}

/// Health of a supervised forwarder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwarderHealth {
    /// Spawned, no batch forwarded yet.
    Starting,
    /// The last poll succeeded.
    Running,
    /// The forwarder failed and is restarting.
    Degraded { error: String, restarts: u32 },
    /// Shut down.
    Stopped,
}

impl ForwarderHealth {
    /// Returns true unless the forwarder is degraded.
    pub fn is_healthy(&self) -> bool {
        matches!(self, ForwarderHealth::Starting | ForwarderHealth::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForwarderHealth::Starting => "starting",
            ForwarderHealth::Running => "running",
            ForwarderHealth::Degraded { .. } => "degraded",
            ForwarderHealth::Stopped => "stopped",
        }
    }
}

/// Relays outbox records to a publisher.
pub struct OutboxForwarder<O, P> {
    outbox: O,
    publisher: P,
    config: ForwarderConfig,
}

impl<O, P> OutboxForwarder<O, P>
where
    O: OutboxStore + 'static,
    P: Publisher + 'static,
{
    /// Creates a forwarder from `outbox` to `publisher`.
    pub fn new(outbox: O, publisher: P, config: ForwarderConfig) -> Self {
        Self {
            outbox,
            publisher,
            config,
        }
    }

    /// Forwards one batch of pending records. Returns how many were forwarded.
    ///
    /// Stops at the first record the transport refuses, so later records of
    /// the same stream never overtake it.
    #[instrument(skip(self))]
    pub async fn forward_batch(&self) -> Result<usize> {
        let records = self.outbox.fetch_pending(self.config.batch_size).await?;
        let mut forwarded = 0;

        for record in &records {
            let message = &record.message;
            if let Err(e) = self
                .publisher
                .publish(&message.topic, Message::from(message))
                .await
            {
                metrics::counter!("outbox_forward_errors_total").increment(1);
                return Err(e);
            }
            self.outbox.mark_forwarded(&[message.event_id]).await?;

            debug!(
                event_id = %message.event_id,
                topic = %message.topic,
                position = record.position,
                "Outbox record forwarded"
            );
            metrics::counter!("outbox_forwarded_total", "topic" => message.topic.clone())
                .increment(1);
            forwarded += 1;
        }

        Ok(forwarded)
    }

    /// Forwards until `shutdown` flips or a batch fails.
    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<bool>,
        health: &watch::Sender<ForwarderHealth>,
    ) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let forwarded = self.forward_batch().await?;
            health.send_if_modified(|h| {
                if *h == ForwarderHealth::Running {
                    false
                } else {
                    *h = ForwarderHealth::Running;
                    true
                }
            });

            if forwarded < self.config.batch_size {
                tokio::select! {
                    _ = shutdown.changed() => return Ok(()),
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }
    }

    /// Runs the forwarder in a background task that restarts it with backoff
    /// whenever it fails or panics.
    ///
    /// Returns the task and a receiver reporting the forwarder's health.
    pub fn spawn_supervised(
        self,
        mut shutdown: watch::Receiver<bool>,
    ) -> (JoinHandle<()>, watch::Receiver<ForwarderHealth>) {
        let (health_tx, health_rx) = watch::channel(ForwarderHealth::Starting);
        let health_tx = Arc::new(health_tx);
        let forwarder = Arc::new(self);

        let task = tokio::spawn(async move {
            let mut restarts: u32 = 0;
            loop {
                let run = {
                    let forwarder = forwarder.clone();
                    let shutdown = shutdown.clone();
                    let health = health_tx.clone();
                    tokio::spawn(async move { forwarder.run(shutdown, &health).await })
                };

                let error = match run.await {
                    Ok(Ok(())) => break,
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => format!("forwarder task aborted: {e}"),
                };

                restarts = restarts.saturating_add(1);
                let backoff = forwarder.config.restart.backoff(restarts);
                error!(%error, restarts, ?backoff, "Outbox forwarder failed, restarting");
                metrics::counter!("outbox_forwarder_restarts_total").increment(1);
                health_tx.send_replace(ForwarderHealth::Degraded { error, restarts });

                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }

            health_tx.send_replace(ForwarderHealth::Stopped);
            info!("Outbox forwarder stopped");
        });

        (task, health_rx)
    }
}

impl<O, P> OutboxForwarder<O, P> {
    /// Returns the forwarder settings.
    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }
}
