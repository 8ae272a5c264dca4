//! Kafka consumer feeding Canal-JSON change records into the pipeline.
//!
//! Offsets are stored only after a record has been handled, and
//! auto-commit publishes stored offsets, so a restart may replay records
//! that were already forwarded (at-least-once).

use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::AppState;

/// How long the startup metadata probe may wait for the broker.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to create consumer: {0}")]
    Create(#[source] KafkaError),
    #[error("failed to subscribe to `{topic}`: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: KafkaError,
    },
    #[error("broker unreachable: {0}")]
    Probe(#[source] KafkaError),
    #[error("metadata probe aborted: {0}")]
    ProbeTask(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub retry_backoff: Duration,
    pub probe_timeout: Duration,
}

impl From<&Config> for KafkaSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            brokers: cfg.kafka_broker.clone(),
            topic: cfg.kafka_topic.clone(),
            group_id: cfg.kafka_group.clone(),
            retry_backoff: cfg.retry_backoff(),
            probe_timeout: PROBE_TIMEOUT,
        }
    }
}

pub struct Ingestor {
    settings: KafkaSettings,
    state: Arc<AppState>,
}

impl Ingestor {
    pub fn new(settings: KafkaSettings, state: Arc<AppState>) -> Self {
        Self { settings, state }
    }

    /// Connect and consume until `shutdown` flips. Connection failures are
    /// retried on a fixed backoff, without limit.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }
            attempt += 1;

            match self.connect().await {
                Ok(consumer) => {
                    info!(
                        brokers = %self.settings.brokers,
                        topic = %self.settings.topic,
                        attempt,
                        "CDC consumer subscribed"
                    );
                    self.consume(&consumer, &mut shutdown).await;
                    consumer.unsubscribe();
                    break;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        error = %e,
                        backoff_secs = self.settings.retry_backoff.as_secs(),
                        "CDC consumer failed to start, retrying"
                    );
                }
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.settings.retry_backoff) => {}
            }
        }

        info!("CDC consumer stopped");
    }

    async fn connect(&self) -> Result<Arc<StreamConsumer>, IngestError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.settings.brokers)
            .set("group.id", &self.settings.group_id)
            .set("client.id", "cdc-observatory")
            .set("auto.offset.reset", "latest")
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "3000")
            .create()
            .map_err(IngestError::Create)?;

        let topic = self.settings.topic.clone();
        consumer
            .subscribe(&[topic.as_str()])
            .map_err(|source| IngestError::Subscribe {
                topic: topic.clone(),
                source,
            })?;

        // subscribe() does not touch the network; probe so an unreachable
        // broker is reported here and retried
        let consumer = Arc::new(consumer);
        let probe = Arc::clone(&consumer);
        let timeout = self.settings.probe_timeout;
        tokio::task::spawn_blocking(move || {
            probe
                .fetch_metadata(Some(topic.as_str()), timeout)
                .map(|_| ())
        })
        .await?
        .map_err(IngestError::Probe)?;

        Ok(consumer)
    }

    async fn consume(&self, consumer: &StreamConsumer, shutdown: &mut watch::Receiver<bool>) {
        loop {
            let msg = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                msg = consumer.recv() => msg,
            };

            match msg {
                Ok(msg) => {
                    crate::cdc::ingest_record(&self.state, msg.payload());
                    if let Err(e) = consumer.store_offset_from_message(&msg) {
                        warn!(
                            partition = msg.partition(),
                            offset = msg.offset(),
                            error = %e,
                            "failed to store offset"
                        );
                    }
                }
                // librdkafka reconnects on its own; keep polling
                Err(e) => warn!(error = %e, "Kafka consumer error"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn unreachable() -> KafkaSettings {
        KafkaSettings {
            // Nothing listens on the discard port
            brokers: "127.0.0.1:9".into(),
            topic: "sre-db-changes".into(),
            group_id: "cdc-observatory-test".into(),
            retry_backoff: Duration::from_millis(50),
            probe_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn settings_follow_config() {
        use clap::Parser;
        let cfg = Config::parse_from(["cdc-observatory", "--kafka-broker", "b:1"]);
        let settings = KafkaSettings::from(&cfg);
        assert_eq!(settings.brokers, "b:1");
        assert_eq!(settings.retry_backoff, Duration::from_secs(5));
        assert_eq!(settings.probe_timeout, PROBE_TIMEOUT);
    }

    #[tokio::test]
    async fn retries_until_shutdown() {
        let state = Arc::new(AppState::new(4));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Ingestor::new(unreachable(), state.clone()).run(rx));

        // Several connect + backoff cycles
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        timeout(Duration::from_secs(2), handle)
            .await
            .expect("ingestor did not stop")
            .unwrap();
        assert!(state.metrics.change_events().is_empty());
    }

    #[tokio::test]
    async fn returns_immediately_when_already_shut_down() {
        let state = Arc::new(AppState::new(4));
        let (_tx, rx) = watch::channel(true);
        timeout(
            Duration::from_millis(500),
            Ingestor::new(unreachable(), state).run(rx),
        )
        .await
        .expect("ingestor did not stop");
    }
}
