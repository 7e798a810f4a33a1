//! Kafka implementation of [`Publisher`].
//!
//! Each `send` waits for the broker acknowledgment (or failure) of that one
//! record before returning. Delivery guarantees and retries on the broker
//! side are whatever the configured `acks`/`retries` give; the bridge adds
//! none of its own.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header as KafkaHeader, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::KafkaSettings;
use crate::contract::{Delivery, OutboundMessage, PublishError, Publisher};

/// Creates an `rdkafka` `ClientConfig` for the producer from the loaded settings.
///
/// Handles bootstrap servers, batching and reliability knobs, and the optional
/// security section (protocol, SASL credentials, CA location).
pub fn create_client_config(settings: &KafkaSettings) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &settings.bootstrap_servers)
        .set("client.id", &settings.client_id)
        .set("acks", &settings.acks)
        .set("retries", settings.retries.to_string())
        .set("retry.backoff.ms", settings.retry_backoff_ms.to_string())
        .set(
            "max.in.flight.requests.per.connection",
            settings.max_in_flight.to_string(),
        )
        .set("batch.size", settings.batch_size_bytes.to_string())
        .set("linger.ms", settings.linger_ms.to_string())
        .set("message.timeout.ms", settings.message_timeout_ms.to_string());

    if let Some(security) = &settings.security {
        info!(protocol = security.protocol.as_str(), "Configuring Kafka security");
        client_config.set("security.protocol", security.protocol.as_str());

        if let Some(mechanism) = &security.sasl_mechanism {
            client_config.set("sasl.mechanism", mechanism);
        }
        if let Some(username) = &security.sasl_username {
            client_config.set("sasl.username", username);
        }
        if let Some(password) = &security.sasl_password {
            client_config.set("sasl.password", password);
        }
        if let Some(ca) = &security.ssl_ca_location {
            client_config.set("ssl.ca.location", ca.to_string_lossy());
        }
    }

    client_config
}

pub struct KafkaPublisher {
    producer: FutureProducer,
    message_timeout: Duration,
    flush_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(settings: &KafkaSettings) -> Result<Self, PublishError> {
        info!(
            bootstrap_servers = %settings.bootstrap_servers,
            client_id = %settings.client_id,
            acks = %settings.acks,
            "Initializing Kafka producer"
        );

        let producer: FutureProducer = create_client_config(settings).create().map_err(|e| {
            error!(error = %e, "Failed to create Kafka producer");
            PublishError::Client(e.to_string())
        })?;

        Ok(Self {
            producer,
            message_timeout: settings.message_timeout(),
            flush_timeout: settings.flush_timeout(),
        })
    }
}

fn to_kafka_headers(message: &OutboundMessage) -> OwnedHeaders {
    message
        .headers
        .iter()
        .fold(OwnedHeaders::new_with_capacity(message.headers.len()), |acc, h| {
            acc.insert(KafkaHeader {
                key: h.name.as_str(),
                value: Some(h.value.as_slice()),
            })
        })
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn send(&self, message: &OutboundMessage) -> Result<Delivery, PublishError> {
        let mut record = FutureRecord::<str, str>::to(&message.topic)
            .payload(message.body.as_str())
            .headers(to_kafka_headers(message));
        if let Some(key) = &message.key {
            record = record.key(key.as_str());
        }
        if let Some(partition) = message.partition {
            record = record.partition(partition);
        }
        if let Some(timestamp) = message.timestamp {
            record = record.timestamp(timestamp);
        }

        match self
            .producer
            .send(record, Timeout::After(self.message_timeout))
            .await
        {
            Ok((partition, offset)) => {
                debug!(
                    topic = %message.topic,
                    partition,
                    offset,
                    body = %message.body,
                    "Wrote message"
                );
                Ok(Delivery { partition, offset })
            }
            Err((kafka_err, _)) => {
                error!(error = %kafka_err, topic = %message.topic, "Kafka rejected message");
                Err(PublishError::Delivery(kafka_err.to_string()))
            }
        }
    }

    async fn flush(&self) -> Result<(), PublishError> {
        // librdkafka's flush blocks the calling thread
        let producer = self.producer.clone();
        let timeout = self.flush_timeout;
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| PublishError::Flush(e.to_string()))?
            .map_err(|e| PublishError::Flush(e.to_string()))
    }

    async fn close(&self) -> Result<(), PublishError> {
        info!("Closing Kafka producer");
        self.flush().await
    }
}
