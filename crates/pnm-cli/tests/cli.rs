use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::tempdir;

fn repo_path(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(rel)
}

fn pnm() -> Command {
    Command::cargo_bin("pnm").unwrap()
}

#[test]
fn ptdf_prints_table() {
    pnm()
        .args(["ptdf", repo_path("test_data/five_bus.json").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("BRANCH"))
        .stdout(predicate::str::contains("0.000000"));
}

#[test]
fn ptdf_writes_record() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("ptdf.json");
    pnm()
        .args(["ptdf", repo_path("test_data/five_bus.json").to_str().unwrap()])
        .args(["--solver", "dense", "-o", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("PTDF written to"));
    assert!(out.exists());

    pnm()
        .args(["inspect", out.to_str().unwrap(), "--row", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PTDF 5x6"))
        .stdout(predicate::str::contains("0.000000 0.000000 0.000000"));
}

#[test]
fn lodf_inspect_entry() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("lodf.json");
    pnm()
        .args(["lodf", repo_path("test_data/five_bus.json").to_str().unwrap()])
        .args(["-o", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("LODF written to"));

    pnm()
        .args(["inspect", out.to_str().unwrap(), "--row", "5", "--col", "6"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-0.307"));

    pnm()
        .args(["inspect", out.to_str().unwrap(), "--row", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown branch"));
}

#[test]
fn islands_lists_each_island() {
    pnm()
        .args([
            "islands",
            repo_path("test_data/two_islands.json").to_str().unwrap(),
            "--emit",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Island 0: 3 bus(es) [1, 2, 3], flagged reference 1",
        ))
        .stdout(predicate::str::contains(
            "Island 1: 2 bus(es) [10, 11], no flagged reference",
        ))
        .stdout(predicate::str::contains("Reference buses: 1, 10"))
        .stdout(predicate::str::contains("bus 11       -> island 1"));
}

#[test]
fn islands_reports_conflicting_references() {
    let dir = tempdir().unwrap();
    let topology = dir.path().join("double_ref.json");
    std::fs::write(
        &topology,
        r#"{
  "buses": [{"id": 1, "kind": "ref"}, {"id": 2, "kind": "ref"}, {"id": 3}],
  "branches": [
    {"id": 1, "name": "1-2", "from_bus": 1, "to_bus": 2, "reactance": 0.1},
    {"id": 2, "name": "2-3", "from_bus": 2, "to_bus": 3, "reactance": 0.1}
  ]
}"#,
    )
    .unwrap();

    pnm()
        .args(["islands", topology.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Island 0: 3 bus(es) [1, 2, 3], flagged reference 1, 2",
        ))
        .stdout(predicate::str::contains("Reference assignment failed"))
        .stdout(predicate::str::contains("2 reference buses (1, 2)"));

    pnm()
        .args(["ptdf", topology.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn strict_reference_policy_rejects_unflagged_island() {
    pnm()
        .args(["ptdf", repo_path("test_data/two_islands.json").to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reference"));

    pnm()
        .args(["ptdf", repo_path("test_data/two_islands.json").to_str().unwrap()])
        .arg("--auto-reference")
        .assert()
        .success();
}

#[test]
fn unknown_solver_fails() {
    pnm()
        .args(["ptdf", repo_path("test_data/five_bus.json").to_str().unwrap()])
        .args(["--solver", "pardiso"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pardiso"));
}

#[test]
fn alt_direct_rejected_for_lodf() {
    pnm()
        .args(["lodf", repo_path("test_data/five_bus.json").to_str().unwrap()])
        .args(["--solver", "alt-direct"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("LODF"));
}

#[test]
fn config_file_and_flags_combine() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("pnm.toml");
    std::fs::write(&config, "linear_solver = \"dense\"\ntolerance = 0.01\n").unwrap();
    let out = dir.path().join("ptdf.json");
    pnm()
        .args(["ptdf", repo_path("test_data/five_bus.json").to_str().unwrap()])
        .args(["--config", config.to_str().unwrap()])
        .args(["--slack-weights", "1,1,1,1,1", "-o", out.to_str().unwrap()])
        .assert()
        .success();

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("\"format\": \"csr\""));
    assert!(text.contains("\"distributed_slack\""));
}
