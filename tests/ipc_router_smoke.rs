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
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut child = Command::new(exe)
        .env_remove("ROSTERD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rosterd");
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
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
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

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

#[test]
fn every_method_dispatches_and_data_methods_need_a_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    let methods = [
        "auth.adminLogin",
        "auth.studentLogin",
        "students.add",
        "students.list",
        "students.replaceAll",
        "students.search",
        "students.viewMine",
        "credentials.addAdmin",
        "credentials.addStudent",
        "exchange.previewImport",
        "exchange.applyImport",
        "exchange.exportXlsx",
        "dashboard.summary",
        "logs.view",
        "setup.get",
        "setup.update",
    ];
    for (i, method) in methods.iter().enumerate() {
        let code = request_err(
            &mut stdin,
            &mut reader,
            &format!("nw-{}", i),
            method,
            json!({}),
        );
        assert_eq!(code, "no_workspace", "{}", method);
    }

    let code = request_err(&mut stdin, &mut reader, "2", "grades.list", json!({}));
    assert_eq!(code, "not_implemented");

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json reply");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse reply");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("bad_json"));

    // the loop keeps serving after a bad line
    let _ = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn workspace_select_creates_tables_and_methods_route() {
    let workspace = temp_dir("rosterd-router-smoke").join("ws");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["settings"]["matchThreshold"], json!(0.5));
    for file in ["students.csv", "admin_logins.csv", "student_logins.csv"] {
        assert!(workspace.join(file).is_file(), "{} missing", file);
    }
    let header = std::fs::read_to_string(workspace.join("students.csv")).expect("read header");
    assert_eq!(
        header,
        "Name,Age,Gender,Date of Birth,Grade / Class,Section,Roll Number / Student ID,Contact Number,Email Address\n"
    );

    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    let expected = workspace.to_string_lossy().to_string();
    assert_eq!(health["workspacePath"].as_str(), Some(expected.as_str()));

    let admin_only = [
        "students.add",
        "students.list",
        "students.replaceAll",
        "credentials.addStudent",
        "exchange.previewImport",
        "exchange.applyImport",
        "exchange.exportXlsx",
        "dashboard.summary",
        "logs.view",
        "setup.update",
    ];
    for (i, method) in admin_only.iter().enumerate() {
        let code = request_err(
            &mut stdin,
            &mut reader,
            &format!("adm-{}", i),
            method,
            json!({ "sessionId": "nope" }),
        );
        assert_eq!(code, "admin_required", "{}", method);
    }

    let _ = request_ok(&mut stdin, &mut reader, "3", "setup.get", json!({}));
    let search = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.search",
        json!({ "query": "" }),
    );
    assert_eq!(search["students"], json!([]));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn workspace_from_environment_is_opened_at_start() {
    let workspace = temp_dir("rosterd-env-workspace");
    let mut child = Command::new(env!("CARGO_BIN_EXE_rosterd"))
        .env("ROSTERD_WORKSPACE", &workspace)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rosterd");
    let mut stdin = child.stdin.take().expect("child stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("child stdout"));

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    let expected = workspace.to_string_lossy().to_string();
    assert_eq!(health["workspacePath"].as_str(), Some(expected.as_str()));
    assert!(workspace.join("admin_logins.csv").is_file());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
