//! # contract: shared message types and the seams of the bridge
//!
//! This module defines the data that flows from a drop file to the broker
//! ([`OutboundMessage`], [`Header`], [`Delivery`]) and the two traits the
//! rest of the crate is written against:
//!
//! - [`Publisher`]: delivers a message to a broker topic and reports the
//!   acknowledgment. The Kafka implementation lives in [`crate::publish`].
//! - [`FileProcessor`]: handles the text of one file during a directory scan
//!   and reports whether the file may be considered consumed.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`, so tests (and downstream crates
//! with the `test-export-mocks` feature) get `MockPublisher` and
//! `MockFileProcessor`.

use async_trait::async_trait;

use mockall::automock;

/// One record header. Values are raw bytes; names are text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: Vec<u8>,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The value as text, replacing invalid UTF-8.
    pub fn value_lossy(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// A publish-ready message addressed to a topic.
///
/// Partition and timestamp are left unset by the assembler so the broker
/// assigns them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub key: Option<String>,
    pub headers: Vec<Header>,
    pub body: String,
    pub partition: Option<i32>,
    pub timestamp: Option<i64>,
}

/// Broker acknowledgment for a single send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

/// Why a publish did not go through.
#[derive(Debug)]
pub enum PublishError {
    /// The broker rejected the record or delivery timed out.
    Delivery(String),
    /// Outstanding records could not be flushed in time.
    Flush(String),
    /// The client could not be created or is unusable.
    Client(String),
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Delivery(msg) => write!(f, "delivery failed: {msg}"),
            PublishError::Flush(msg) => write!(f, "flush failed: {msg}"),
            PublishError::Client(msg) => write!(f, "publisher client error: {msg}"),
        }
    }
}

impl std::error::Error for PublishError {}

/// Trait for delivering messages to a broker.
///
/// `send` resolves only once the broker has acknowledged the record or the
/// delivery is known to have failed; callers never issue a second send for
/// the same payload while one is outstanding.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Send one message and wait for its acknowledgment.
    async fn send(&self, message: &OutboundMessage) -> Result<Delivery, PublishError>;

    /// Push any client-side buffered records to the broker.
    async fn flush(&self) -> Result<(), PublishError>;

    /// Flush and release the client. The publisher must not be used afterwards.
    async fn close(&self) -> Result<(), PublishError>;
}

/// What happened to one file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// A message was built and acknowledged by the broker.
    Published,
    /// The file held nothing to publish; it counts as handled.
    NothingToPublish,
    /// Parsing or publishing failed; the file must stay for the next cycle.
    Failed,
}

impl FileOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, FileOutcome::Failed)
    }
}

/// Handler invoked by the directory poller for every regular file.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FileProcessor: Send + Sync {
    /// Handle the full text of one file.
    async fn process(&self, content: &str) -> FileOutcome;
}
