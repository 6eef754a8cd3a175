use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

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
            { "id": 2, "name": "Bob", "class": "B", "scores": { "math": "95", "english": 90 }, "totalScore": "185", "rank": 1 },
            { "id": "s3", "name": "Cat", "classLabel": "A", "scores": { "math": "absent", "english": 70 }, "totalScore": 70 }
        ],
        "subjects": ["math", "english", "music"],
        "subjectConfigs": {
            "math": { "fullMark": 100 },
            "english": { "fullMark": 120, "pass": 72, "good": 84, "excellent": 96 }
        }
    })
}

#[test]
fn inline_and_file_loads_share_a_content_version() {
    let workspace = temp_dir("scorestatd-cohort-load");
    let file = workspace.join("cohort.json");
    std::fs::write(&file, serde_json::to_string_pretty(&cohort_payload()).expect("json"))
        .expect("write cohort file");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let inline = request_ok(&mut stdin, &mut reader, "1", "cohort.load", cohort_payload());
    assert_eq!(inline["studentCount"].as_u64(), Some(3));
    assert_eq!(inline["classes"], json!(["A", "B"]));
    assert_eq!(inline["unconfiguredSubjects"], json!(["music"]));
    let version = inline["version"].as_str().expect("version").to_string();
    assert_eq!(version.len(), 64);

    let from_file = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "cohort.loadFile",
        json!({ "path": file.to_string_lossy() }),
    );
    assert_eq!(from_file["version"].as_str(), Some(version.as_str()));

    let health = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
    assert_eq!(health["cohortVersion"].as_str(), Some(version.as_str()));

    let info = request_ok(&mut stdin, &mut reader, "4", "cohort.info", json!({}));
    assert_eq!(info["subjects"], json!(["math", "english", "music"]));
    assert!(info["loadedAt"].as_str().is_some());

    let cleared = request_ok(&mut stdin, &mut reader, "5", "cohort.clear", json!({}));
    assert_eq!(cleared["cleared"].as_bool(), Some(true));
    let after = request(&mut stdin, &mut reader, "6", "cohort.info", json!({}));
    assert_eq!(after["error"]["code"].as_str(), Some("no_cohort"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn load_errors_are_reported_not_fatal() {
    let workspace = temp_dir("scorestatd-cohort-errors");
    let garbage = workspace.join("garbage.json");
    std::fs::write(&garbage, "{ records: ").expect("write garbage");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let missing = request(
        &mut stdin,
        &mut reader,
        "1",
        "cohort.loadFile",
        json!({ "path": workspace.join("nope.json").to_string_lossy() }),
    );
    assert_eq!(missing["error"]["code"].as_str(), Some("load_failed"));

    let bad_json = request(
        &mut stdin,
        &mut reader,
        "2",
        "cohort.loadFile",
        json!({ "path": garbage.to_string_lossy() }),
    );
    assert_eq!(bad_json["error"]["code"].as_str(), Some("load_failed"));

    let no_path = request(&mut stdin, &mut reader, "3", "cohort.loadFile", json!({}));
    assert_eq!(no_path["error"]["code"].as_str(), Some("bad_params"));

    let wrong_shape = request(
        &mut stdin,
        &mut reader,
        "4",
        "cohort.load",
        json!({ "records": "not a list" }),
    );
    assert_eq!(wrong_shape["error"]["code"].as_str(), Some("bad_params"));

    let health = request_ok(&mut stdin, &mut reader, "5", "health", json!({}));
    assert_eq!(health["cohortLoaded"].as_bool(), Some(false));

    drop(stdin);
    let _ = child.wait();
}
