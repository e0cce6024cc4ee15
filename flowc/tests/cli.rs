use assert_cmd::Command;
use predicates::str::contains;
use std::io::Write;
use tempfile::NamedTempFile;

fn flow_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn check_reports_no_errors_for_a_clean_program() {
    let file = flow_file("workflow:\n    complete with ok true\n");

    Command::cargo_bin("flowc")
        .unwrap()
        .arg("check")
        .arg(file.path())
        .assert()
        .success()
        .stdout(contains("no errors"));
}

#[test]
fn check_reports_diagnostics_for_an_unbound_identifier() {
    let file = flow_file("workflow:\n    log missing_name\n");

    Command::cargo_bin("flowc")
        .unwrap()
        .arg("check")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(contains("unbound identifier"));
}

#[test]
fn run_prints_completed_outcome_and_outputs() {
    let file = flow_file("workflow:\n    set x to 2 plus 3\n    complete with result x\n");

    Command::cargo_bin("flowc")
        .unwrap()
        .arg("run")
        .arg(file.path())
        .assert()
        .success()
        .stdout(contains("completed"))
        .stdout(contains("result: 5"));
}

#[test]
fn run_reads_a_trigger_file_and_branches_on_it() {
    let file = flow_file(
        "workflow:\n    if request.n is above 10:\n        complete with tier \"big\"\n    otherwise:\n        complete with tier \"small\"\n",
    );
    let mut trigger = NamedTempFile::new().unwrap();
    write!(trigger, r#"{{"request": {{"n": 42}}}}"#).unwrap();

    Command::cargo_bin("flowc")
        .unwrap()
        .arg("run")
        .arg(file.path())
        .arg("--trigger")
        .arg(trigger.path())
        .assert()
        .success()
        .stdout(contains("tier: big"));
}

#[test]
fn run_reports_rejected_outcome() {
    let file = flow_file("workflow:\n    reject with \"bad input\"\n");

    Command::cargo_bin("flowc")
        .unwrap()
        .arg("run")
        .arg(file.path())
        .assert()
        .failure()
        .stdout(contains("rejected: bad input"));
}

#[test]
fn run_fails_loudly_on_a_missing_service() {
    let file = flow_file("services:\n    Api is an API at \"https://x/\"\nworkflow:\n    get data using Api\n");

    Command::cargo_bin("flowc")
        .unwrap()
        .arg("run")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(contains("no connector registered"));
}
