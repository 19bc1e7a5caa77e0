//! Process-wide logger registration. Kept in its own test binary since the
//! global subscriber can only be set once per process.

use dapr_sdk::logging::{init_logger, LoggerOptions, SharedBuffer, LOGGER_NAME};
use tracing::{info, warn};

#[test]
fn first_registration_wins_and_records_use_fixed_keys() {
    let sink = SharedBuffer::new();
    assert!(init_logger(LoggerOptions::development(), sink.clone()));

    let other = SharedBuffer::new();
    assert!(!init_logger(LoggerOptions::production(), other.clone()));

    info!(target: LOGGER_NAME, "data published");
    warn!(target: LOGGER_NAME, attempt = 2u64, "slow sidecar");

    let records: Vec<_> = sink
        .records()
        .into_iter()
        .filter(|r| r["msg"] != "logger configured")
        .collect();
    assert_eq!(records.len(), 2);

    for key in ["level", "time", "name", "caller", "msg"] {
        assert!(records[0].contains_key(key), "missing {key}");
    }
    assert_eq!(records[0]["level"], "info");
    assert_eq!(records[0]["name"], "dapr-client");
    assert!(records[0]["caller"]
        .as_str()
        .unwrap()
        .starts_with("tests/logger_bootstrap.rs:"));

    assert_eq!(records[1]["level"], "warn");
    assert_eq!(records[1]["attempt"], 2);
    assert!(records[1].contains_key("stacktrace"));

    assert!(other.contents().is_empty());
}
