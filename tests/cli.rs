use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn inspect_prints_the_parsed_parts() {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), "order-17\n--key\ntrace:abc\nsource:billing\n--header\n{\"total\": 3}").unwrap();

    let mut cmd = Command::cargo_bin("dirpub").expect("Binary exists");
    cmd.arg("inspect").arg(file.path());

    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("key: order-17")
                .and(predicate::str::contains("trace: abc"))
                .and(predicate::str::contains("source: billing"))
                .and(predicate::str::contains("{\"total\": 3}")),
        );
}

#[test]
fn inspect_fails_on_malformed_headers() {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), "broken header\n--header\nbody").unwrap();

    let mut cmd = Command::cargo_bin("dirpub").expect("Binary exists");
    cmd.arg("inspect").arg(file.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("malformed header"));
}

#[test]
fn publish_fails_fast_when_the_directory_is_missing() {
    let tmp = tempdir().unwrap();
    let config = tmp.path().join("dirpub.yaml");
    let missing = tmp.path().join("no-such-outbox");
    write(
        &config,
        format!(
            "source:\n  message_location: {}\nkafka:\n  topic: orders\n  bootstrap_servers: \"localhost:9092\"\n",
            missing.display()
        ),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("dirpub").expect("Binary exists");
    cmd.arg("publish").arg("--config").arg(&config).arg("--run-once");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn publish_requires_a_config() {
    let mut cmd = Command::cargo_bin("dirpub").expect("Binary exists");
    cmd.arg("publish");

    cmd.assert().failure().stderr(predicate::str::contains("--config"));
}
