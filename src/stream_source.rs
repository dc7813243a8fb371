//! Durable stream access for the telemetry consumer
//!
//! The consumer group contract: entries are delivered to one member of the
//! group, stay on the pending list until acknowledged, and are redelivered by
//! the broker when an acknowledgment never arrives.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_nats::jetstream;
use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy, PullConsumer};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// How long a fetch waits for new entries before returning what it has.
const FETCH_EXPIRES: Duration = Duration::from_secs(5);

/// An entry delivered from the stream, before field parsing.
#[derive(Debug, Clone)]
pub struct RawEntry {
    /// Broker-assigned id, unique within the stream.
    pub id: String,
    pub payload: Vec<u8>,
}

/// Capabilities the consumer needs from the durable stream broker.
#[async_trait]
pub trait StreamSource: Send + Sync + 'static {
    /// Create the consumer group at the start of the stream, or reuse it if it
    /// already exists.
    async fn ensure_group(&self) -> Result<()>;

    /// Fetch up to `count` entries. An empty vec is the "no data right now"
    /// indicator, distinct from a read failure.
    async fn read_batch(&self, count: usize) -> Result<Vec<RawEntry>>;

    /// Acknowledge a delivered entry. Acking an unknown or already-acked id
    /// is a no-op.
    async fn ack(&self, id: &str) -> Result<()>;
}

/// JetStream-backed stream source.
///
/// The durable pull consumer is the consumer group: explicit acks, deliver-all
/// on first creation, broker-side redelivery of un-acked entries. Delivered
/// messages are parked in a pending map so `ack` can resolve them by id.
pub struct JetStreamSource {
    jetstream: jetstream::Context,
    stream_name: String,
    group_name: String,
    consumer_name: String,
    consumer: RwLock<Option<PullConsumer>>,
    pending: Mutex<HashMap<String, jetstream::Message>>,
}

impl JetStreamSource {
    pub fn new(
        jetstream: jetstream::Context,
        stream_name: String,
        group_name: String,
        consumer_name: String,
    ) -> Self {
        Self {
            jetstream,
            stream_name,
            group_name,
            consumer_name,
            consumer: RwLock::new(None),
            pending: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StreamSource for JetStreamSource {
    async fn ensure_group(&self) -> Result<()> {
        // Create the stream if the ingester has not written to it yet
        let stream = self
            .jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: self.stream_name.clone(),
                subjects: vec![self.stream_name.clone().into()],
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get stream '{}': {}", self.stream_name, e))?;

        let consumer_config = PullConfig {
            durable_name: Some(self.group_name.clone()),
            ack_policy: AckPolicy::Explicit,
            deliver_policy: DeliverPolicy::All,
            ..Default::default()
        };

        let consumer = match stream.get_consumer::<PullConfig>(&self.group_name).await {
            Ok(consumer) => {
                warn!(
                    "Consumer group '{}' already exists, consumer '{}' joining it",
                    self.group_name, self.consumer_name
                );
                consumer
            }
            Err(_) => {
                let consumer = stream.create_consumer(consumer_config).await.map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to create consumer group '{}': {}",
                        self.group_name,
                        e
                    )
                })?;
                info!(
                    "Created consumer group '{}' on stream '{}' (consumer '{}')",
                    self.group_name, self.stream_name, self.consumer_name
                );
                consumer
            }
        };

        *self.consumer.write().await = Some(consumer);
        Ok(())
    }

    async fn read_batch(&self, count: usize) -> Result<Vec<RawEntry>> {
        let consumer = self
            .consumer
            .read()
            .await
            .clone()
            .context("consumer group not initialized")?;

        let mut batch = consumer
            .fetch()
            .max_messages(count)
            .expires(FETCH_EXPIRES)
            .messages()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch from stream: {}", e))?;

        let mut entries = Vec::new();
        while let Some(message) = batch.next().await {
            let message =
                message.map_err(|e| anyhow::anyhow!("Failed to receive stream entry: {}", e))?;
            let info = message
                .info()
                .map_err(|e| anyhow::anyhow!("Stream entry has no delivery info: {}", e))?;
            let id = info.stream_sequence.to_string();

            entries.push(RawEntry {
                id: id.clone(),
                payload: message.payload.to_vec(),
            });
            self.pending.lock().await.insert(id, message);
        }

        Ok(entries)
    }

    async fn ack(&self, id: &str) -> Result<()> {
        let message = self.pending.lock().await.remove(id);

        match message {
            Some(message) => message
                .ack()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to acknowledge entry {}: {}", id, e)),
            // Unknown or already-acked: the group contract makes this a no-op
            None => Ok(()),
        }
    }
}
