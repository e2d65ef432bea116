mod common;

use std::process::Command;

use assert_cmd::prelude::*;
use common::three_handed;
use hand_pipeline::hand::Street;
use predicates::prelude::*;

#[test]
fn once_runs_a_synthetic_cycle() {
    let mut cmd = Command::cargo_bin("hand-pipeline").expect("binary exists");
    cmd.args(["once", "--synthetic", "40", "--seed", "3", "--no-color"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Cycle "))
        .stdout(predicate::str::contains("added=40"))
        .stdout(predicate::str::contains("Summary: players="));
}

#[test]
fn once_reads_a_hand_directory() {
    let dir = tempfile::tempdir().unwrap();
    let hands: Vec<_> = (0..3)
        .map(|i| {
            three_handed(
                &format!("file-{i}"),
                &[(Street::Preflop, "", &["r250", "f", "c"])],
            )
        })
        .collect();
    std::fs::write(
        dir.path().join("hands.json"),
        serde_json::to_string(&hands).unwrap(),
    )
    .unwrap();
    std::fs::write(dir.path().join("broken.json"), "[{}]").unwrap();

    let mut cmd = Command::cargo_bin("hand-pipeline").expect("binary exists");
    cmd.arg("once")
        .arg("--hands-dir")
        .arg(dir.path())
        .arg("--no-color");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("added=3"))
        .stdout(predicate::str::contains("errors=1"))
        .stdout(predicate::str::contains("no player above the hand threshold"));
}

#[test]
fn rules_lists_the_built_in_rule_set() {
    let mut cmd = Command::cargo_bin("hand-pipeline").expect("binary exists");
    cmd.args(["rules", "--no-color"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("checkraise"))
        .stdout(predicate::str::contains("fallback_raise"));
}

#[test]
fn invalid_rule_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.yml");
    std::fs::write(
        &path,
        "rules:\n  - { id: only_bets, priority: 1000, when: { current_token: bet }, result: bet }\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("hand-pipeline").expect("binary exists");
    cmd.arg("--rules").arg(&path).args(["rules", "--no-color"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("raise"));
}
