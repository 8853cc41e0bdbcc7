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

const HEADER: &str = "Name,Age,Gender,Date of Birth,Grade / Class,Section,Roll Number / Student ID,Contact Number,Email Address";

fn admin_session(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
) -> String {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "boot",
        "credentials.addAdmin",
        json!({ "email": "a.smith@x.com", "password": "p1", "name": "A Smith" }),
    );
    let login = request_ok(
        stdin,
        reader,
        "login",
        "auth.adminLogin",
        json!({ "email": "a.smith@x.com", "password": "p1" }),
    );
    login["sessionId"].as_str().expect("sessionId").to_string()
}

#[test]
fn csv_preview_then_confirmed_apply() {
    let workspace = temp_dir("rosterd-exchange-csv");
    let upload = workspace.join("upload.csv");
    std::fs::write(
        &upload,
        "Email Address,Name,Age,Gender,Date of Birth,Grade / Class,Section,Roll Number / Student ID,Contact Number,Remarks\n\
         ann@x.com,Ann Lee,12,Female,2012-01-02,7,A,R1,555,keen\n\
         bo@x.com,Bo Park,13.0,Male,2011-03-04,8,B,R2,556,\n",
    )
    .expect("write upload");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let sid = admin_session(&mut stdin, &mut reader, &workspace);

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "exchange.previewImport",
        json!({ "sessionId": sid, "path": upload.to_string_lossy() }),
    );
    assert_eq!(preview["format"], json!("csv"));
    assert_eq!(preview["rowCount"], json!(2));
    assert_eq!(preview["ignoredColumns"], json!(["Remarks"]));
    assert_eq!(preview["students"][1]["age"], json!(13));

    // preview never writes
    let listed = request_ok(&mut stdin, &mut reader, "2", "students.list", json!({ "sessionId": sid }));
    assert_eq!(listed["students"], json!([]));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "exchange.applyImport",
        json!({ "sessionId": sid, "path": upload.to_string_lossy() }),
    );
    assert_eq!(code, "not_confirmed");

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "exchange.applyImport",
        json!({ "sessionId": sid, "path": upload.to_string_lossy(), "confirm": true }),
    );
    assert_eq!(applied["rowCount"], json!(2));
    assert_eq!(
        applied["message"],
        json!("Student records have been updated with the imported file.")
    );

    let text = std::fs::read_to_string(workspace.join("students.csv")).expect("read table");
    assert_eq!(
        text,
        format!(
            "{}\nAnn Lee,12,Female,2012-01-02,7,A,R1,555,ann@x.com\nBo Park,13,Male,2011-03-04,8,B,R2,556,bo@x.com\n",
            HEADER
        )
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

/// A workbook holding only the given worksheet XML.
fn write_sheet(path: &std::path::Path, sheet_xml: &str) {
    let file = std::fs::File::create(path).expect("create xlsx");
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("xl/worksheets/sheet1.xml", zip::write::FileOptions::default())
        .expect("start sheet");
    zip.write_all(sheet_xml.as_bytes()).expect("write sheet");
    zip.finish().expect("finish xlsx");
}

#[test]
fn malformed_uploads_leave_records_alone() {
    let workspace = temp_dir("rosterd-exchange-bad");
    let missing_column = workspace.join("missing.csv");
    std::fs::write(&missing_column, "Name,Age\nAnn,12\n").expect("write");
    let bad_age = workspace.join("bad_age.csv");
    std::fs::write(
        &bad_age,
        format!("{}\nAnn,twelve,Female,2012-01-02,7,A,R1,555,a@x\n", HEADER),
    )
    .expect("write");
    let ragged = workspace.join("ragged.csv");
    std::fs::write(&ragged, format!("{}\nAnn,12\n", HEADER)).expect("write");
    let bad_ref = workspace.join("bad_ref.xlsx");
    write_sheet(
        &bad_ref,
        r#"<worksheet><sheetData><row r="1"><c r="ZZZZZZZZZZZZZZZ1" t="inlineStr"><is><t>Name</t></is></c></row></sheetData></worksheet>"#,
    );

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let sid = admin_session(&mut stdin, &mut reader, &workspace);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.add",
        json!({
            "sessionId": sid,
            "student": {
                "name": "Keep Me", "age": 10, "gender": "Other", "dateOfBirth": "2014-01-01",
                "grade": "5", "section": "C", "rollNumber": "K1", "contact": "1", "email": "k@x"
            }
        }),
    );

    let before = request_ok(&mut stdin, &mut reader, "rev", "students.list", json!({ "sessionId": sid }));

    for (i, path) in [&missing_column, &bad_age, &ragged, &bad_ref].iter().enumerate() {
        let value = request(
            &mut stdin,
            &mut reader,
            &format!("bad-{}", i),
            "exchange.applyImport",
            json!({ "sessionId": sid, "path": path.to_string_lossy(), "confirm": true }),
        );
        assert_eq!(value["error"]["code"], json!("malformed_import"), "{}", value);
        assert!(value["error"]["message"]
            .as_str()
            .unwrap_or("")
            .starts_with("Failed to import file:"));
    }

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "exchange.previewImport",
        json!({ "sessionId": sid, "path": workspace.join("absent.csv").to_string_lossy() }),
    );
    assert_eq!(code, "malformed_import");

    let listed = request_ok(&mut stdin, &mut reader, "3", "students.list", json!({ "sessionId": sid }));
    assert_eq!(listed["students"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(listed["students"][0]["name"], json!("Keep Me"));
    assert_eq!(listed["revision"], before["revision"]);

    // the process is still answering
    let _ = request_ok(&mut stdin, &mut reader, "4", "health", json!({}));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn export_xlsx_reimports_as_same_rows() {
    let workspace = temp_dir("rosterd-exchange-xlsx");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let sid = admin_session(&mut stdin, &mut reader, &workspace);

    let rows = json!([
        { "name": "Zoë <Z>", "age": 11, "gender": "Female", "dateOfBirth": "2013-05-06",
          "grade": "6", "section": "A", "rollNumber": "Z1", "contact": "0100", "email": "z@x" },
        { "name": "Yan & Co", "age": "12", "gender": "Male", "dateOfBirth": "2012-07-08",
          "grade": "7", "section": "B", "rollNumber": "Y1", "contact": "0101", "email": "y@x" }
    ]);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.replaceAll",
        json!({ "sessionId": sid, "students": rows }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exchange.exportXlsx",
        json!({ "sessionId": sid }),
    );
    assert_eq!(exported["rowCount"], json!(2));
    assert_eq!(exported["sheetName"], json!("Students"));
    let out = workspace.join("students_export.xlsx");
    assert_eq!(exported["path"].as_str().map(PathBuf::from), Some(out.clone()));
    let bytes = std::fs::read(&out).expect("read export");
    assert!(bytes.starts_with(b"PK\x03\x04"));

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "exchange.previewImport",
        json!({ "sessionId": sid, "path": out.to_string_lossy() }),
    );
    assert_eq!(preview["format"], json!("xlsx"));
    let listed = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({ "sessionId": sid }));
    assert_eq!(preview["students"], listed["students"]);
    assert_eq!(preview["students"][0]["name"], json!("Zoë <Z>"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
