use std::time::Duration;

use clap::Parser;

/// Runtime settings. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "cdc-observatory", version, about = "Live CDC + request telemetry hub")]
pub struct Config {
    /// Address the HTTP/WebSocket server binds to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// Kafka bootstrap broker(s)
    #[arg(long, env = "KAFKA_BROKER", default_value = "kafka-broker:29092")]
    pub kafka_broker: String,

    /// Topic carrying Canal-JSON change records
    #[arg(long, env = "KAFKA_TOPIC", default_value = "sre-db-changes")]
    pub kafka_topic: String,

    #[arg(long, env = "KAFKA_GROUP_ID", default_value = "sre-cdc-group")]
    pub kafka_group: String,

    /// Skip the log consumer; CDC events then arrive only via the webhook
    #[arg(long, env = "CDC_INGEST_DISABLED")]
    pub no_ingest: bool,

    /// Fixed delay between broker reconnect attempts
    #[arg(long, env = "CDC_RETRY_BACKOFF_SECS", default_value_t = 5)]
    pub retry_backoff_secs: u64,

    /// Period of `metrics_update` broadcasts (0 disables)
    #[arg(long, env = "METRICS_INTERVAL_SECS", default_value_t = 2)]
    pub metrics_interval_secs: u64,

    /// Frames queued per dashboard connection before it starts missing some
    #[arg(long, env = "WS_SUBSCRIBER_BUFFER", default_value_t = 64)]
    pub subscriber_buffer: usize,
}

impl Config {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn metrics_interval(&self) -> Option<Duration> {
        (self.metrics_interval_secs > 0).then(|| Duration::from_secs(self.metrics_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::parse_from(["cdc-observatory"]);
        assert_eq!(cfg.kafka_topic, "sre-db-changes");
        assert_eq!(cfg.retry_backoff(), Duration::from_secs(5));
        assert_eq!(cfg.metrics_interval(), Some(Duration::from_secs(2)));
        assert!(!cfg.no_ingest);
    }

    #[test]
    fn zero_interval_disables_ticker() {
        let cfg = Config::parse_from(["cdc-observatory", "--metrics-interval-secs", "0", "--no-ingest"]);
        assert_eq!(cfg.metrics_interval(), None);
        assert!(cfg.no_ingest);
    }
}
