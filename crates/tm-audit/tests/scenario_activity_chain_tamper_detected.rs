//! Activity log hash chain.
//!
//! GREEN when:
//! - A chained log of 5 entries verifies with the right line count.
//! - Editing one entry's details is detected at that line.
//! - Deleting a line is detected at the line that follows it.
//! - Re-opening the log resumes both listing and the chain.

use serde_json::json;
use tm_audit::{verify_hash_chain, ActionKind, ActivityFilter, ActivityLog, VerifyResult};

fn write_five(path: &std::path::Path) {
    let log = ActivityLog::open(path, true).unwrap();
    for i in 0..5 {
        log.append(
            "club-admin",
            ActionKind::OfferCreated,
            json!({ "index": i, "amount": 1_000_000 * i }),
        );
    }
}

#[test]
fn untampered_chain_verifies_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activity.jsonl");
    write_five(&path);

    assert_eq!(
        verify_hash_chain(&path).unwrap(),
        VerifyResult::Valid { lines: 5 }
    );
}

#[test]
fn tampered_details_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activity.jsonl");
    write_five(&path);

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<String> = content
        .lines()
        .enumerate()
        .map(|(i, l)| {
            if i == 2 {
                l.replace("\"amount\":2000000", "\"amount\":1")
            } else {
                l.to_string()
            }
        })
        .collect();
    assert_ne!(lines.join("\n"), content.trim_end(), "tamper must change line 3");
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    match verify_hash_chain(&path).unwrap() {
        VerifyResult::Broken { line, reason } => {
            assert_eq!(line, 3);
            assert!(reason.contains("hash_self"), "unexpected reason: {reason}");
        }
        other => panic!("expected Broken, got {other:?}"),
    }
}

#[test]
fn deleted_line_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activity.jsonl");
    write_five(&path);

    let content = std::fs::read_to_string(&path).unwrap();
    let kept: Vec<&str> = content
        .lines()
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .map(|(_, l)| l)
        .collect();
    std::fs::write(&path, kept.join("\n") + "\n").unwrap();

    match verify_hash_chain(&path).unwrap() {
        VerifyResult::Broken { line, reason } => {
            assert_eq!(line, 2);
            assert!(reason.contains("hash_prev"), "unexpected reason: {reason}");
        }
        other => panic!("expected Broken, got {other:?}"),
    }
}

#[test]
fn reopen_resumes_listing_and_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activity.jsonl");
    write_five(&path);

    let log = ActivityLog::open(&path, true).unwrap();
    assert_eq!(log.len(), 5);
    let e = log.append("club-admin", ActionKind::MarketClosed, json!({}));
    assert_eq!(e.seq, 5);

    let closed = log.list(&ActivityFilter {
        kind: Some(ActionKind::MarketClosed),
        ..ActivityFilter::default()
    });
    assert_eq!(closed.len(), 1);

    assert_eq!(
        verify_hash_chain(&path).unwrap(),
        VerifyResult::Valid { lines: 6 }
    );
}

#[test]
fn clear_truncates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activity.jsonl");
    write_five(&path);

    let log = ActivityLog::open(&path, true).unwrap();
    log.clear().unwrap();
    assert!(log.is_empty());
    log.append("admin", ActionKind::Note, json!({ "text": "fresh start" }));

    assert_eq!(
        verify_hash_chain(&path).unwrap(),
        VerifyResult::Valid { lines: 1 }
    );
}
