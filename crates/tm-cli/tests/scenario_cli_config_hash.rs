use assert_cmd::Command;
use predicates::prelude::*;

fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
    let p = dir.path().join(name);
    std::fs::write(&p, body).unwrap();
    p.to_string_lossy().to_string()
}

#[test]
fn config_hash_is_stable_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(&dir, "base.yaml", "sync:\n  enabled: false\n  interval_secs: 60\n");

    let run = || {
        let out = Command::cargo_bin("tm")
            .unwrap()
            .args(["config-hash", &base])
            .output()
            .unwrap();
        assert!(out.status.success());
        String::from_utf8(out.stdout).unwrap()
    };
    let first = run();
    assert!(first.starts_with("config_hash="));
    assert_eq!(first, run());
}

#[test]
fn config_hash_refuses_inline_secret() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(
        &dir,
        "base.yaml",
        "store:\n  url_env: \"postgres://user:pw@localhost/tm\"\n",
    );
    Command::cargo_bin("tm")
        .unwrap()
        .args(["config-hash", &base])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("pw@").not());
}

#[test]
fn strict_config_hash_fails_on_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(&dir, "base.yaml", "sync:\n  enabled: false\n  intervl_secs: 60\n");
    Command::cargo_bin("tm")
        .unwrap()
        .args(["config-hash", "--strict", &base])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));
}
