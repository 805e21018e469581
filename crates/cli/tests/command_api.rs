use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const SAMPLE: [f64; 10] = [100.0, 100.0, 90.0, 90.0, 90.0, 80.0, 70.0, 60.0, 50.0, 40.0];

fn submission(id: u64, region_id: u64, raw: f64, bonus: &str) -> Value {
    json!({
        "id": id,
        "exam_id": 1,
        "region_id": region_id,
        "exam_type": "public",
        "user_id": 100 + id,
        "user_name": format!("박응시{id}"),
        "raw_score": raw,
        "bonus_type": bonus,
    })
}

/// Region 11: the ten-score sample with two recruits, plus one cutoff-failed
/// and one suspicious row. Region 12: ten recruits, 18 plain rows and three
/// veterans whose bonus lifts them into the pass set.
fn write_dataset(dir: &Path) -> PathBuf {
    let mut submissions: Vec<Value> = SAMPLE
        .iter()
        .enumerate()
        .map(|(idx, score)| submission(idx as u64 + 1, 11, *score, "none"))
        .collect();

    let mut cutoff = submission(11, 11, 95.0, "none");
    cutoff["has_cutoff"] = json!(true);
    submissions.push(cutoff);
    let mut suspicious = submission(12, 11, 99.0, "none");
    suspicious["suspicious"] = json!(true);
    submissions.push(suspicious);

    for offset in 0..18u64 {
        submissions.push(submission(100 + offset, 12, 71.0 + offset as f64, "none"));
    }
    for offset in 0..3u64 {
        submissions.push(submission(200 + offset, 12, 68.0, "veteran10"));
    }

    let dataset = json!({
        "exams": [{"id": 1, "name": "2025년 1차 경찰공무원 채용", "year": 2025, "round": 1}],
        "regions": [{"id": 11, "name": "서울"}, {"id": 12, "name": "부산"}],
        "quotas": [
            {"exam_id": 1, "region_id": 11, "exam_type": "public", "recruit_count": 2},
            {"exam_id": 1, "region_id": 12, "exam_type": "public", "recruit_count": 10}
        ],
        "submissions": submissions,
    });
    let path = dir.join("dataset.json");
    fs::write(&path, serde_json::to_string_pretty(&dataset).unwrap()).unwrap();
    path
}

fn setup() -> (TempDir, PathBuf) {
    let temp = tempdir().unwrap();
    let data = write_dataset(temp.path());
    (temp, data)
}

#[allow(deprecated)]
fn passline() -> Command {
    let mut cmd = Command::cargo_bin("passline").expect("binary");
    cmd.env_remove("PASSLINE_POLICY").env_remove("PASSLINE_DATA");
    cmd
}

fn run_request(data: &Path, extra: &[&str], request: Value) -> (bool, Value) {
    let output = passline()
        .arg("--data")
        .arg(data)
        .args(extra)
        .arg("command")
        .arg("--json")
        .arg(request.to_string())
        .output()
        .expect("command run");
    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    (output.status.success(), body)
}

#[test]
fn predict_ranks_tied_candidate_at_band_start() {
    let (_temp, data) = setup();
    let (ok, body) = run_request(
        &data,
        &[],
        json!({"action": "predict", "payload": {"submission_id": 4}}),
    );
    assert!(ok, "predict failed: {body}");
    assert_eq!(body["status"], "ok");

    let summary = &body["data"]["summary"];
    assert_eq!(summary["my_rank"], 3);
    assert_eq!(summary["total_participants"], 10);
    assert_eq!(summary["tier"], "possible");
    assert_eq!(summary["my_multiple"], 1.5);
    assert_eq!(summary["pass_count"], 6);
    assert_eq!(summary["region_name"], "서울");

    let counts: Vec<u64> = body["data"]["pyramid"]
        .as_array()
        .unwrap()
        .iter()
        .map(|level| level["count"].as_u64().unwrap())
        .collect();
    assert_eq!(counts, vec![2, 0, 4, 1, 3]);
    assert_eq!(body["meta"]["policy"], "builtin");
}

#[test]
fn suspicious_rows_join_only_on_request() {
    let (_temp, data) = setup();
    let request = json!({"action": "predict", "payload": {"submission_id": 4}});

    let (_, strict) = run_request(&data, &[], request.clone());
    assert_eq!(strict["data"]["summary"]["total_participants"], 10);

    let (ok, lenient) = run_request(&data, &["--include-suspicious"], request);
    assert!(ok);
    assert_eq!(lenient["data"]["summary"]["total_participants"], 11);
    assert_eq!(lenient["data"]["summary"]["my_rank"], 4);
}

#[test]
fn cutoff_candidate_is_a_user_facing_error() {
    let (_temp, data) = setup();
    let (ok, body) = run_request(
        &data,
        &[],
        json!({"action": "predict", "payload": {"submission_id": 11}}),
    );
    assert!(!ok, "expected non-zero exit for cutoff candidate");
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["code"], "candidate_cutoff");
    assert_eq!(body["error"]["severity"], "user_correctable");
}

#[test]
fn fourth_veteran_is_rejected_with_cap_details() {
    let (_temp, data) = setup();
    let request = json!({
        "action": "validate_bonus",
        "payload": {
            "exam_id": 1,
            "region_id": 12,
            "exam_type": "public",
            "raw_score": 68.0,
            "bonus_type": "veteran10"
        }
    });
    let (ok, body) = run_request(&data, &[], request);
    assert!(!ok);
    assert_eq!(body["error"]["code"], "bonus_cap_exceeded");
    assert_eq!(body["error"]["details"]["cap_count"], 3);
    assert_eq!(body["error"]["details"]["beneficiaries"], 4);
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(message.contains("취업지원대상자"), "message: {message}");
}

#[test]
fn editing_a_veteran_stays_within_cap() {
    let (_temp, data) = setup();
    let request = json!({
        "action": "validate_bonus",
        "payload": {
            "exam_id": 1,
            "region_id": 12,
            "exam_type": "public",
            "submission_id": 202,
            "raw_score": 68.0,
            "bonus_type": "veteran10"
        }
    });
    let (ok, body) = run_request(&data, &[], request);
    assert!(ok, "validation failed: {body}");
    assert_eq!(body["data"]["outcome"], "within");
    assert_eq!(body["data"]["beneficiaries"], 3);
    assert_eq!(body["data"]["pass_count"], 18);
}

#[test]
fn preview_counts_the_hypothetical_row() {
    let (_temp, data) = setup();
    let request = json!({
        "action": "preview",
        "payload": {"exam_id": 1, "region_id": 11, "exam_type": "public", "final_score": 95.0}
    });
    let (ok, body) = run_request(&data, &[], request);
    assert!(ok);
    assert_eq!(body["data"]["rank"], 3);
    assert_eq!(body["data"]["total_participants"], 11);
}

#[test]
fn negative_preview_score_is_user_correctable() {
    let (_temp, data) = setup();
    let request = json!({
        "action": "preview",
        "payload": {"exam_id": 1, "region_id": 11, "exam_type": "public", "final_score": -5.0}
    });
    let (ok, body) = run_request(&data, &[], request);
    assert!(!ok);
    assert_eq!(body["error"]["code"], "invalid_entered_score");
    assert_eq!(body["error"]["severity"], "user_correctable");
}

#[test]
fn competitors_page_is_masked_and_clamped() {
    let (_temp, data) = setup();
    let request = json!({
        "action": "competitors",
        "payload": {"user_id": 101, "page": 9, "limit": 4}
    });
    let (ok, body) = run_request(&data, &[], request);
    assert!(ok);
    assert_eq!(body["data"]["total_pages"], 3);
    assert_eq!(body["data"]["page"], 3);
    let entries = body["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["masked_name"], "박**");
}

#[test]
fn invalid_payload_is_reported_with_field() {
    let (_temp, data) = setup();
    let (ok, body) = run_request(
        &data,
        &[],
        json!({"action": "predict", "payload": {"submission": 4}}),
    );
    assert!(!ok);
    assert_eq!(body["error"]["code"], "invalid_request");
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(message.contains("submission"), "message: {message}");
}

#[test]
fn policy_action_needs_no_dataset() {
    let output = passline()
        .arg("command")
        .arg("--json")
        .arg(r#"{"action":"policy","payload":{"recruit_count":50}}"#)
        .output()
        .expect("command run");
    assert!(output.status.success());
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["data"]["name"], "builtin");
    assert_eq!(body["data"]["boundaries"]["possible_max"], 85);
}

#[test]
fn dataset_actions_without_data_fail_cleanly() {
    let output = passline()
        .arg("command")
        .arg("--json")
        .arg(r#"{"action":"predict","payload":{"submission_id":1}}"#)
        .output()
        .expect("command run");
    assert!(!output.status.success());
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["error"]["code"], "dataset_missing");
}

#[test]
fn broken_policy_file_becomes_error_envelope() {
    let (temp, data) = setup();
    let policy = temp.path().join("policy.toml");
    fs::write(&policy, "schema_version = 2\n").unwrap();

    let (ok, body) = run_request(
        &data,
        &["--policy", policy.to_str().unwrap()],
        json!({"action": "policy"}),
    );
    assert!(!ok);
    assert_eq!(body["error"]["code"], "invalid_policy");
}

#[test]
fn policy_file_from_env_changes_thresholds() {
    let (temp, data) = setup();
    let policy = temp.path().join("strict.toml");
    let builtin = include_str!("../../../policies/default.toml");
    fs::write(&policy, builtin.replace("likely_cap = \"1.2\"", "likely_cap = \"1.0\"")).unwrap();

    let output = passline()
        .env("PASSLINE_POLICY", &policy)
        .arg("--data")
        .arg(&data)
        .arg("command")
        .arg("--json")
        .arg(r#"{"action":"policy","payload":{"recruit_count":50}}"#)
        .output()
        .expect("command run");
    assert!(output.status.success());
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["data"]["boundaries"]["likely_max"], 50);
    assert_eq!(
        body["meta"]["policy"].as_str().unwrap(),
        policy.display().to_string()
    );
}

#[test]
fn human_predict_renders_tier_label() {
    let (_temp, data) = setup();
    passline()
        .arg("--data")
        .arg(&data)
        .args(["predict", "--submission", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("합격 가능권"))
        .stdout(predicate::str::contains("Rank 3/10"));
}

#[test]
fn human_validate_prints_error_and_fails() {
    let (_temp, data) = setup();
    passline()
        .arg("--data")
        .arg(&data)
        .args([
            "validate", "--exam", "1", "--region", "12", "--raw", "68", "--bonus", "veteran10",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bonus_cap_exceeded"));
}

#[test]
fn schema_lists_every_payload() {
    let output = passline().arg("schema").output().expect("schema run");
    assert!(output.status.success());
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    for action in ["predict", "competitors", "validate_bonus", "preview", "policy"] {
        assert!(
            body["payloads"].get(action).is_some(),
            "missing payload schema for {action}"
        );
    }
    assert!(body.get("request").is_some());
}
