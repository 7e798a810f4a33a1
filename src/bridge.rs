//! The poll → publish → delete loop.
//!
//! [`run`] scans the drop directory, turns each file into an
//! [`OutboundMessage`](crate::contract::OutboundMessage), publishes it and
//! lets the poller delete the file once the broker has acknowledged it.
//!
//! # Cycle
//! - Scan the directory once, one file at a time: parse, send, wait for the
//!   ack, flush, then (optionally) delete.
//! - With `run_once` the loop stops after the first scan.
//! - Otherwise it sleeps for `delay` and scans again. Cancelling the
//!   shutdown token during the sleep stops the loop without another scan.
//!   A scan that is underway always runs to completion.
//!
//! # Failures
//! - A file whose headers are malformed, or whose send or flush fails, stays
//!   on disk and is retried from scratch on the next cycle. There is no
//!   per-file retry count and no backoff.
//! - A scan that fails part-way (unreadable file) is returned as an error in
//!   run-once mode and logged and retried otherwise. Files handled before
//!   the failure are counted in the report either way.
//! - A missing or non-directory location, or a blank topic, is rejected
//!   before the first scan.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assemble::assemble;
use crate::contract::{FileOutcome, FileProcessor, Publisher};
use crate::poll::{self, PollError, PollOutcome};

/// What to poll, where to publish, and how often.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub directory: PathBuf,
    pub topic: String,
    pub run_once: bool,
    pub delay: Duration,
    pub delete_on_success: bool,
}

/// Totals over all cycles of one [`run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeReport {
    pub cycles: u64,
    pub files_seen: u64,
    pub processed: u64,
    pub failed: u64,
    pub deleted: u64,
    pub delete_failures: u64,
    pub scan_errors: u64,
}

impl BridgeReport {
    fn record(&mut self, outcome: &PollOutcome) {
        self.files_seen += outcome.files_seen as u64;
        self.processed += outcome.processed as u64;
        self.failed += outcome.failed as u64;
        self.deleted += outcome.deleted as u64;
        self.delete_failures += outcome.delete_failures as u64;
    }
}

#[derive(Debug)]
pub enum BridgeError {
    MissingTopic,
    /// The configured location is unusable; nothing was scanned.
    Poll(PollError),
    /// A run-once scan stopped part-way. `report` still counts the files
    /// that were published (and possibly deleted) before the failure.
    Scan {
        report: BridgeReport,
        source: PollError,
    },
}

impl BridgeError {
    /// The work done before the failure, if any scan ran.
    pub fn report(&self) -> Option<&BridgeReport> {
        match self {
            BridgeError::Scan { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::MissingTopic => write!(f, "a topic is required"),
            BridgeError::Poll(e) => write!(f, "{e}"),
            BridgeError::Scan { source, .. } => write!(f, "scan stopped early: {source}"),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Poll(e) | BridgeError::Scan { source: e, .. } => Some(e),
            BridgeError::MissingTopic => None,
        }
    }
}

impl From<PollError> for BridgeError {
    fn from(e: PollError) -> Self {
        BridgeError::Poll(e)
    }
}

/// Per-file handler: assemble, send, flush.
pub struct PublishProcessor<'a, P: ?Sized> {
    topic: &'a str,
    publisher: &'a P,
}

impl<'a, P> PublishProcessor<'a, P>
where
    P: Publisher + ?Sized,
{
    pub fn new(topic: &'a str, publisher: &'a P) -> Self {
        Self { topic, publisher }
    }
}

#[async_trait]
impl<'a, P> FileProcessor for PublishProcessor<'a, P>
where
    P: Publisher + ?Sized,
{
    async fn process(&self, content: &str) -> FileOutcome {
        let message = match assemble(self.topic, content) {
            Ok(Some(message)) => message,
            Ok(None) => {
                info!(topic = %self.topic, "No content to publish");
                return FileOutcome::NothingToPublish;
            }
            Err(e) => {
                warn!(error = %e, "[BRIDGE] Could not parse file content");
                return FileOutcome::Failed;
            }
        };

        let start = Instant::now();
        let sent = self.publisher.send(&message).await;

        // flush before reporting, so a delete never runs ahead of delivery
        let flushed = self.publisher.flush().await;

        match (sent, flushed) {
            (Ok(delivery), Ok(())) => {
                info!(
                    topic = %message.topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    latency_ms = start.elapsed().as_millis(),
                    "Message published successfully"
                );
                FileOutcome::Published
            }
            (Err(e), _) => {
                error!(error = %e, topic = %message.topic, "[BRIDGE] Could not publish message");
                FileOutcome::Failed
            }
            (Ok(_), Err(e)) => {
                error!(error = %e, topic = %message.topic, "[BRIDGE] Could not flush publisher");
                FileOutcome::Failed
            }
        }
    }
}

/// Check the options before the first scan.
pub fn validate(options: &BridgeOptions) -> Result<(), BridgeError> {
    if options.topic.trim().is_empty() {
        return Err(BridgeError::MissingTopic);
    }
    poll::check_directory(&options.directory)?;
    Ok(())
}

/// Poll `options.directory` and publish every file through `publisher` until
/// `run_once` completes a cycle or `shutdown` is cancelled during a delay.
pub async fn run<P>(
    options: &BridgeOptions,
    publisher: &P,
    shutdown: CancellationToken,
) -> Result<BridgeReport, BridgeError>
where
    P: Publisher + ?Sized,
{
    validate(options)?;

    info!(
        dir = %options.directory.display(),
        topic = %options.topic,
        run_once = options.run_once,
        delay_ms = options.delay.as_millis(),
        delete_on_success = options.delete_on_success,
        "[BRIDGE] Starting publish loop"
    );
    if !options.delete_on_success {
        info!("[BRIDGE] Based on config, files will not be deleted");
    }

    let processor = PublishProcessor::new(&options.topic, publisher);
    let mut report = BridgeReport::default();

    loop {
        report.cycles += 1;
        info!(dir = %options.directory.display(), cycle = report.cycles, "[BRIDGE] Looking for files");

        match poll::scan(&options.directory, &processor, options.delete_on_success).await {
            Ok(outcome) => {
                report.record(&outcome);
                debug!(?outcome, "[BRIDGE] Scan finished");
            }
            Err(e) => {
                if let Some(partial) = e.partial_outcome() {
                    report.record(partial);
                }
                report.scan_errors += 1;

                if options.run_once {
                    error!(error = %e, ?report, "[BRIDGE] Scan failed");
                    return Err(BridgeError::Scan { report, source: e });
                }
                error!(error = %e, "[BRIDGE] Scan failed, retrying next cycle");
            }
        }

        if options.run_once {
            info!("[BRIDGE] Run-once requested, stopping after one poll");
            break;
        }

        debug!(delay_ms = options.delay.as_millis(), "[BRIDGE] Waiting before next poll");
        if shutdown
            .run_until_cancelled(tokio::time::sleep(options.delay))
            .await
            .is_none()
        {
            info!("[BRIDGE] Shutdown requested during poll wait");
            break;
        }
    }

    info!(?report, "[BRIDGE] Publish loop stopped");
    Ok(report)
}
