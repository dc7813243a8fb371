//! Live feed fan-out over the broker's pub/sub channels
//!
//! Every processed record goes to the global feed; anomalous records
//! additionally go to the alert feed with their anomaly metadata. Both feeds
//! are best-effort views; the time-series store is the source of truth.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::telemetry::{Anomaly, TelemetryRecord};

/// Fire-and-forget broadcast capability over the broker.
#[async_trait]
pub trait FeedSink: Send + Sync + 'static {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()>;
}

/// Core NATS publisher used in production.
#[derive(Clone)]
pub struct NatsFeedSink {
    client: async_nats::Client,
}

impl NatsFeedSink {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedSink for NatsFeedSink {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(channel.to_string(), payload.into())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to publish to channel {}: {}", channel, e))
    }
}

/// Alert feed message: the persisted record plus the anomaly that flagged it.
#[derive(Serialize)]
struct AlertMessage<'a> {
    telemetry: &'a TelemetryRecord,
    anomaly: &'a Anomaly,
}

pub struct FeedPublisher<F> {
    sink: F,
    global_feed_channel: String,
    alert_feed_channel: String,
}

impl<F: FeedSink> FeedPublisher<F> {
    pub fn new(sink: F, global_feed_channel: String, alert_feed_channel: String) -> Self {
        Self {
            sink,
            global_feed_channel,
            alert_feed_channel,
        }
    }

    /// Publish a processed record to the global telemetry feed.
    pub async fn publish_global_telemetry(&self, record: &TelemetryRecord) -> Result<()> {
        let payload =
            serde_json::to_vec(record).context("failed to encode global telemetry message")?;

        self.sink
            .publish(&self.global_feed_channel, payload)
            .await
            .context("failed to publish to global feed")?;

        metrics::counter!("worker.feed.global_published").increment(1);
        Ok(())
    }

    /// Publish an anomalous record with its anomaly metadata to the alert feed.
    pub async fn publish_alert(&self, record: &TelemetryRecord, anomaly: &Anomaly) -> Result<()> {
        let payload = serde_json::to_vec(&AlertMessage {
            telemetry: record,
            anomaly,
        })
        .context("failed to encode alert message")?;

        self.sink
            .publish(&self.alert_feed_channel, payload)
            .await
            .context("failed to publish alert")?;

        metrics::counter!("worker.feed.alerts_published").increment(1);
        info!(
            "Alert published to alert feed (aircraft {}, type '{}')",
            record.aircraft_id, anomaly.kind
        );
        Ok(())
    }
}
