use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_scorestatd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn scorestatd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}


fn cohort_payload() -> serde_json::Value {
    json!({
        "records": [
            { "id": "s1", "name": "Ann", "classLabel": "A", "scores": { "math": 90, "english": 80 }, "totalScore": 170 },
            { "id": "s2", "name": "Bob", "classLabel": "B", "scores": { "math": 95, "english": 90 }, "totalScore": 185 },
            { "id": "s3", "name": "Cat", "classLabel": "A", "scores": { "math": "absent", "english": 70 }, "totalScore": 70 },
            { "id": "s4", "name": "Dan", "classLabel": "B", "scores": { "math": 70, "english": 100 }, "totalScore": 170 },
            { "id": "s5", "name": "Eve", "classLabel": "A", "scores": { "math": 85, "english": 85 }, "totalScore": 170 },
            { "id": "s6", "name": "Fay", "classLabel": "B", "scores": {}, "totalScore": "n/a" }
        ],
        "subjects": ["math", "english", "music"],
        "subjectConfigs": {
            "math": { "fullMark": 100 },
            "english": { "fullMark": 120, "pass": 72, "good": 84, "excellent": 96 }
        }
    })
}

fn row<'a>(rows: &'a serde_json::Value, id: &str) -> &'a serde_json::Value {
    rows.as_array()
        .expect("rows array")
        .iter()
        .find(|r| r["studentId"].as_str() == Some(id))
        .unwrap_or_else(|| panic!("missing row {}", id))
}

#[test]
fn level_table_scaled_scores() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(&mut stdin, &mut reader, "1", "cohort.load", cohort_payload());

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "analytics.scaledScores",
        json!({ "subject": "math", "method": "levelTable" }),
    );
    assert_eq!(result["population"].as_u64(), Some(4));
    let rows = &result["rows"];
    assert_eq!(row(rows, "s2")["rank"].as_u64(), Some(1));
    assert_eq!(row(rows, "s2")["scaled"].as_i64(), Some(82));
    assert_eq!(row(rows, "s1")["scaled"].as_i64(), Some(76));
    assert_eq!(row(rows, "s5")["scaled"].as_i64(), Some(70));
    assert_eq!(row(rows, "s4")["scaled"].as_i64(), Some(40));
    assert!(row(rows, "s3")["scaled"].is_null());
    assert!(row(rows, "s3")["rank"].is_null());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn piecewise_scaled_scores() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(&mut stdin, &mut reader, "1", "cohort.load", cohort_payload());

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "analytics.scaledScores",
        json!({ "subject": "math", "method": "piecewise312" }),
    );
    assert_eq!(result["method"].as_str(), Some("piecewise312"));
    let rows = &result["rows"];
    assert_eq!(row(rows, "s2")["scaled"].as_i64(), Some(100));
    assert_eq!(row(rows, "s1")["scaled"].as_i64(), Some(85));
    assert_eq!(row(rows, "s5")["scaled"].as_i64(), Some(70));
    assert_eq!(row(rows, "s4")["scaled"].as_i64(), Some(56));
    assert!(row(rows, "s6")["scaled"].is_null());

    let bad = request(
        &mut stdin,
        &mut reader,
        "3",
        "analytics.scaledScores",
        json!({ "subject": "math", "method": "zscore" }),
    );
    assert_eq!(bad["error"]["code"].as_str(), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn standard_scores_attach_z_and_t() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(&mut stdin, &mut reader, "1", "cohort.load", cohort_payload());

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "analytics.standardScores",
        json!({ "subjects": ["math"] }),
    );
    let rows = &result["rows"];
    // math: mean 85, stdDev 9.35
    let s2 = &row(rows, "s2")["scores"][0];
    assert_eq!(s2["subject"].as_str(), Some("math"));
    assert_eq!(s2["z"].as_f64(), Some(1.07));
    assert_eq!(s2["t"].as_f64(), Some(60.7));
    let s5 = &row(rows, "s5")["scores"][0];
    assert_eq!(s5["z"].as_f64(), Some(0.0));
    assert_eq!(s5["t"].as_f64(), Some(50.0));
    assert_eq!(row(rows, "s3")["scores"], json!([]));
    assert_eq!(row(rows, "s1")["totalScore"].as_f64(), Some(170.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn zero_spread_gives_neutral_standard_scores() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "cohort.load",
        json!({
            "records": [
                { "id": "a", "name": "A", "classLabel": "1", "scores": { "math": 75 } },
                { "id": "b", "name": "B", "classLabel": "1", "scores": { "math": 75 } },
                { "id": "c", "name": "C", "classLabel": "2", "scores": { "math": 75 } }
            ],
            "subjects": ["math"],
            "subjectConfigs": { "math": { "fullMark": 100 } }
        }),
    );
    let result = request_ok(&mut stdin, &mut reader, "2", "analytics.standardScores", json!({}));
    for r in result["rows"].as_array().expect("rows") {
        assert_eq!(r["scores"][0]["z"].as_f64(), Some(0.0));
        assert_eq!(r["scores"][0]["t"].as_f64(), Some(50.0));
    }

    drop(stdin);
    let _ = child.wait();
}
