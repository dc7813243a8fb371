//! Consumer-group reader for the raw telemetry stream
//!
//! Pulls batches from the durable stream, parses each entry, and runs one
//! handler task per entry. Acknowledgment discipline: ack strictly after the
//! handler succeeds; a failed handler leaves the entry pending for broker
//! redelivery; an unparseable entry is acked immediately so it cannot poison
//! the group.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::stream_source::{RawEntry, StreamSource};
use crate::telemetry::TelemetryInput;

/// Maximum entries fetched from the broker per read.
const READ_BATCH_SIZE: usize = 10;
/// Bound on concurrently processing entries. Sized against the database
/// connection pool so a burst of entries cannot starve it.
const MAX_IN_FLIGHT: usize = 40;
/// Backoff after an empty read, so a non-blocking broker doesn't hot-loop.
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(100);
/// Backoff after a failed read.
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ConsumeError {
    /// Cancellation was observed and all in-flight entries have drained.
    #[error("stream consumption cancelled")]
    Cancelled,
    /// The consumer group could not be created or joined.
    #[error("failed to set up consumer group: {0}")]
    Setup(anyhow::Error),
}

/// A parsed stream entry, owned by the pipeline for its processing lifetime.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    /// Broker-assigned entry id, used for acknowledgment.
    pub id: String,
    /// Transmitter MAC address, as sent by the ingester.
    pub plane_id: String,
    pub telemetry: TelemetryInput,
    /// When the ingester received the sample; now when absent or unparseable.
    pub received_at: DateTime<Utc>,
}

pub struct StreamConsumer<S> {
    source: Arc<S>,
    limiter: Arc<Semaphore>,
    in_flight: Arc<AtomicI64>,
}

impl<S: StreamSource> StreamConsumer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            limiter: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
            in_flight: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Number of entries currently being processed.
    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Read from the stream until cancelled, running `handler` in its own task
    /// for every parsed entry.
    pub async fn consume<H, Fut>(
        &self,
        cancel: CancellationToken,
        handler: H,
    ) -> Result<(), ConsumeError>
    where
        H: Fn(StreamEntry) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.source.ensure_group().await.map_err(ConsumeError::Setup)?;

        info!("Stream consumer started (each entry processed in its own task)");

        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            // Reap finished handler tasks so the set doesn't grow unbounded
            while tasks.try_join_next().is_some() {}

            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.source.read_batch(READ_BATCH_SIZE) => match result {
                    Ok(batch) => batch,
                    Err(e) => {
                        error!("Failed to read from stream: {}", e);
                        metrics::counter!("worker.stream.read_errors").increment(1);
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(READ_ERROR_BACKOFF) => continue,
                        }
                    }
                },
            };

            if batch.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(EMPTY_READ_BACKOFF) => continue,
                }
            }

            for raw in batch {
                let entry = match parse_entry(&raw) {
                    Ok(entry) => entry,
                    Err(e) => {
                        error!("Failed to parse stream entry {}: {}", raw.id, e);
                        metrics::counter!("worker.stream.parse_errors").increment(1);
                        // Acknowledge poison entries so the group never redelivers them
                        if let Err(ack_err) = self.source.ack(&raw.id).await {
                            error!("Failed to acknowledge invalid entry {}: {}", raw.id, ack_err);
                        }
                        continue;
                    }
                };

                // Backpressure: delivered entries wait here rather than
                // piling up as tasks
                let permit = Arc::clone(&self.limiter)
                    .acquire_owned()
                    .await
                    .expect("entry limiter semaphore closed");

                let source = Arc::clone(&self.source);
                let handler = handler.clone();
                let in_flight = Arc::clone(&self.in_flight);

                in_flight.fetch_add(1, Ordering::Relaxed);
                metrics::gauge!("worker.entries.in_flight").increment(1.0);

                tasks.spawn(async move {
                    let _permit = permit;
                    let id = entry.id.clone();
                    let plane_id = entry.plane_id.clone();

                    match handler(entry).await {
                        Ok(()) => {
                            if let Err(e) = source.ack(&id).await {
                                error!("Failed to acknowledge entry {}: {}", id, e);
                            }
                            metrics::counter!("worker.entries.processed").increment(1);
                        }
                        Err(e) => {
                            // Left un-acked; the broker will redeliver it
                            error!("Handler failed for entry {} (plane {}): {}", id, plane_id, e);
                            metrics::counter!("worker.entries.failed").increment(1);
                        }
                    }

                    in_flight.fetch_sub(1, Ordering::Relaxed);
                    metrics::gauge!("worker.entries.in_flight").decrement(1.0);
                });
            }
        }

        info!(
            "Waiting for {} in-flight entries to complete",
            self.in_flight()
        );
        while tasks.join_next().await.is_some() {}

        Err(ConsumeError::Cancelled)
    }
}

/// Parse a raw stream entry: `plane_id` and `data_json` are required,
/// `received_at` (RFC3339) is optional and defaults to now.
fn parse_entry(raw: &RawEntry) -> Result<StreamEntry> {
    let fields: HashMap<String, String> = serde_json::from_slice(&raw.payload)
        .context("entry payload is not a JSON object of string fields")?;

    let plane_id = fields
        .get("plane_id")
        .cloned()
        .context("missing or invalid plane_id")?;

    let data_json = fields
        .get("data_json")
        .context("missing or invalid data_json")?;
    let telemetry: TelemetryInput =
        serde_json::from_str(data_json).context("failed to decode telemetry payload")?;

    let received_at = fields
        .get("received_at")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(StreamEntry {
        id: raw.id.clone(),
        plane_id,
        telemetry,
        received_at,
    })
}
