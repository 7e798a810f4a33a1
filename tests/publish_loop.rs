use std::fs::write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockall::Sequence;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use dirpub::bridge::{run, BridgeError, BridgeOptions, PublishProcessor};
use dirpub::contract::{
    Delivery, FileOutcome, FileProcessor, Header, MockPublisher, OutboundMessage, PublishError,
};
use dirpub::poll::PollError;

fn options(dir: &Path, run_once: bool, delay: Duration) -> BridgeOptions {
    BridgeOptions {
        directory: dir.to_path_buf(),
        topic: "orders".to_string(),
        run_once,
        delay,
        delete_on_success: true,
    }
}

fn acking_publisher(sent: Arc<Mutex<Vec<OutboundMessage>>>) -> MockPublisher {
    let mut publisher = MockPublisher::new();
    publisher.expect_send().returning(move |message| {
        sent.lock().unwrap().push(message.clone());
        Ok(Delivery {
            partition: 0,
            offset: 42,
        })
    });
    publisher.expect_flush().returning(|| Ok(()));
    publisher
}

#[tokio::test]
async fn run_once_publishes_and_deletes_each_file() {
    let tmp = tempdir().unwrap();
    write(tmp.path().join("one.txt"), "k\n--key\nsource:test\n--header\npayload").unwrap();

    let sent = Arc::new(Mutex::new(Vec::new()));
    let publisher = acking_publisher(sent.clone());

    let report = run(
        &options(tmp.path(), true, Duration::from_secs(3600)),
        &publisher,
        CancellationToken::new(),
    )
    .await
    .expect("run should succeed");

    assert_eq!(report.cycles, 1);
    assert_eq!(report.files_seen, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.deleted, 1);
    assert!(!tmp.path().join("one.txt").exists());

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].topic, "orders");
    assert_eq!(sent[0].key.as_deref(), Some("k"));
    assert_eq!(sent[0].headers, vec![Header::new("source", "test")]);
    assert_eq!(sent[0].body, "payload");
}

#[tokio::test]
async fn run_once_ignores_the_delay() {
    let tmp = tempdir().unwrap();
    let publisher = MockPublisher::new();

    // an hour-long delay must not be waited out after the only scan
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        run(
            &options(tmp.path(), true, Duration::from_secs(3600)),
            &publisher,
            CancellationToken::new(),
        ),
    )
    .await
    .expect("run-once must not sleep")
    .unwrap();

    assert_eq!(report.cycles, 1);
    assert_eq!(report.files_seen, 0);
}

#[tokio::test]
async fn failed_send_keeps_the_file() {
    let tmp = tempdir().unwrap();
    write(tmp.path().join("one.txt"), "payload").unwrap();

    let mut publisher = MockPublisher::new();
    publisher
        .expect_send()
        .times(1)
        .returning(|_| Err(PublishError::Delivery("broker unavailable".to_string())));
    publisher.expect_flush().returning(|| Ok(()));

    let report = run(
        &options(tmp.path(), true, Duration::ZERO),
        &publisher,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.deleted, 0);
    assert!(tmp.path().join("one.txt").exists());
}

#[tokio::test]
async fn malformed_headers_keep_the_file_without_sending() {
    let tmp = tempdir().unwrap();
    write(tmp.path().join("bad.txt"), "no colon\n--header\nbody").unwrap();

    let mut publisher = MockPublisher::new();
    publisher.expect_send().never();
    publisher.expect_flush().never();

    let report = run(
        &options(tmp.path(), true, Duration::ZERO),
        &publisher,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.failed, 1);
    assert!(tmp.path().join("bad.txt").exists());
}

#[tokio::test]
async fn blank_file_is_deleted_without_sending() {
    let tmp = tempdir().unwrap();
    write(tmp.path().join("blank.txt"), "  \n ").unwrap();

    let mut publisher = MockPublisher::new();
    publisher.expect_send().never();

    let report = run(
        &options(tmp.path(), true, Duration::ZERO),
        &publisher,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.deleted, 1);
    assert!(!tmp.path().join("blank.txt").exists());
}

#[tokio::test]
async fn flush_happens_after_send_before_success_is_reported() {
    let mut seq = Sequence::new();
    let mut publisher = MockPublisher::new();
    publisher
        .expect_send()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Delivery { partition: 1, offset: 7 }));
    publisher
        .expect_flush()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));

    let processor = PublishProcessor::new("orders", &publisher);
    assert_eq!(processor.process("payload").await, FileOutcome::Published);
}

#[tokio::test]
async fn failed_flush_fails_the_file() {
    let mut publisher = MockPublisher::new();
    publisher
        .expect_send()
        .returning(|_| Ok(Delivery { partition: 1, offset: 7 }));
    publisher
        .expect_flush()
        .returning(|| Err(PublishError::Flush("timed out".to_string())));

    let processor = PublishProcessor::new("orders", &publisher);
    assert_eq!(processor.process("payload").await, FileOutcome::Failed);
}

#[tokio::test]
async fn failed_files_are_retried_each_cycle_until_cancelled() {
    let tmp = tempdir().unwrap();
    write(tmp.path().join("stuck.txt"), "payload").unwrap();

    let attempts = Arc::new(Mutex::new(0u32));
    let attempts_clone = attempts.clone();
    let mut publisher = MockPublisher::new();
    publisher.expect_send().returning(move |_| {
        *attempts_clone.lock().unwrap() += 1;
        Err(PublishError::Delivery("rejected".to_string()))
    });
    publisher.expect_flush().returning(|| Ok(()));

    let shutdown = CancellationToken::new();
    let canceller = shutdown.clone();
    let opts = options(tmp.path(), false, Duration::from_millis(10));

    let (report, _) = tokio::join!(run(&opts, &publisher, shutdown), async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });
    let report = report.unwrap();

    assert!(report.cycles >= 2, "expected repeated scans, got {}", report.cycles);
    assert_eq!(u64::from(*attempts.lock().unwrap()), report.cycles);
    assert_eq!(report.failed, report.cycles);
    assert!(tmp.path().join("stuck.txt").exists());
}

#[tokio::test]
async fn cancellation_during_the_delay_stops_without_another_scan() {
    let tmp = tempdir().unwrap();
    write(tmp.path().join("one.txt"), "payload").unwrap();

    let sent = Arc::new(Mutex::new(Vec::new()));
    let publisher = acking_publisher(sent.clone());

    let shutdown = CancellationToken::new();
    let canceller = shutdown.clone();
    let opts = BridgeOptions {
        delete_on_success: false,
        ..options(tmp.path(), false, Duration::from_secs(3600))
    };

    let (report, _) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(run(&opts, &publisher, shutdown), async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        })
    })
    .await
    .expect("cancellation must cut the delay short");
    let report = report.unwrap();

    assert_eq!(report.cycles, 1);
    assert_eq!(sent.lock().unwrap().len(), 1);
    assert!(tmp.path().join("one.txt").exists());
}

#[tokio::test]
async fn missing_directory_is_rejected_before_scanning() {
    let tmp = tempdir().unwrap();
    let mut publisher = MockPublisher::new();
    publisher.expect_send().never();

    let err = run(
        &options(&tmp.path().join("missing"), false, Duration::ZERO),
        &publisher,
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        BridgeError::Poll(PollError::DirectoryNotFound(_))
    ));
}

#[tokio::test]
async fn blank_topic_is_rejected() {
    let tmp = tempdir().unwrap();
    let publisher = MockPublisher::new();
    let opts = BridgeOptions {
        topic: " ".to_string(),
        ..options(tmp.path(), true, Duration::ZERO)
    };

    let err = run(&opts, &publisher, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::MissingTopic));
}

#[tokio::test]
async fn read_failure_is_returned_in_run_once_mode() {
    let tmp = tempdir().unwrap();
    write(tmp.path().join("binary.bin"), [0xffu8, 0xfe]).unwrap();
    let publisher = MockPublisher::new();

    let err = run(
        &options(tmp.path(), true, Duration::ZERO),
        &publisher,
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        BridgeError::Scan {
            source: PollError::Read { .. },
            ..
        }
    ));
    assert_eq!(err.report().map(|r| r.scan_errors), Some(1));
}

fn remaining_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn run_once_failure_still_reports_files_deleted_before_it() {
    let tmp = tempdir().unwrap();
    for i in 0..10 {
        write(tmp.path().join(format!("good-{i}.txt")), format!("payload {i}")).unwrap();
    }
    write(tmp.path().join("binary.bin"), [0xffu8, 0xfe]).unwrap();

    let sent = Arc::new(Mutex::new(Vec::new()));
    let publisher = acking_publisher(sent.clone());

    let err = run(
        &options(tmp.path(), true, Duration::ZERO),
        &publisher,
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    let report = err.report().expect("a scan ran, so there is a report");
    let deleted_on_disk = 11 - remaining_files(tmp.path());
    assert_eq!(report.deleted, deleted_on_disk as u64);
    assert_eq!(report.processed, sent.lock().unwrap().len() as u64);
    assert_eq!(report.scan_errors, 1);
    assert!(tmp.path().join("binary.bin").exists());
}

#[tokio::test]
async fn files_handled_before_a_read_failure_are_counted_each_cycle() {
    let tmp = tempdir().unwrap();
    for i in 0..20 {
        write(tmp.path().join(format!("good-{i}.txt")), format!("payload {i}")).unwrap();
    }
    write(tmp.path().join("binary.bin"), [0xffu8, 0xfe]).unwrap();

    let sent = Arc::new(Mutex::new(Vec::new()));
    let publisher = acking_publisher(sent.clone());

    let shutdown = CancellationToken::new();
    let canceller = shutdown.clone();
    let opts = options(tmp.path(), false, Duration::from_millis(10));

    let (report, _) = tokio::join!(run(&opts, &publisher, shutdown), async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });
    let report = report.unwrap();

    let deleted_on_disk = 21 - remaining_files(tmp.path());
    assert_eq!(report.deleted, deleted_on_disk as u64);
    assert_eq!(report.processed, sent.lock().unwrap().len() as u64);
    assert_eq!(report.scan_errors, report.cycles);
}

#[tokio::test]
async fn read_failure_is_counted_and_retried_when_running_continuously() {
    let tmp = tempdir().unwrap();
    write(tmp.path().join("binary.bin"), [0xffu8, 0xfe]).unwrap();
    let publisher = MockPublisher::new();

    let shutdown = CancellationToken::new();
    let canceller = shutdown.clone();
    let opts = options(tmp.path(), false, Duration::from_millis(10));

    let (report, _) = tokio::join!(run(&opts, &publisher, shutdown), async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });
    let report = report.unwrap();

    assert!(report.cycles >= 2);
    assert_eq!(report.scan_errors, report.cycles);
}
