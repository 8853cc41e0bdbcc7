use crate::error::{AuthError, StoreError};
use crate::ipc::helpers::{
    form_str, optional_str, require_admin, respond, workspace, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::matcher::email_local_part;
use crate::records::{StudentForm, StudentRecord};
use crate::store::TableStore;
use log::info;
use serde_json::{json, Value};

fn parse_form(v: &Value, row: Option<usize>) -> Result<StudentForm, HandlerErr> {
    if !v.is_object() {
        return Err(HandlerErr::bad_params("student must be an object"));
    }
    serde_json::from_value(v.clone()).map_err(|e| {
        let e = HandlerErr::bad_params(format!("invalid student: {}", e));
        match row {
            Some(r) => e.with_details(json!({ "row": r })),
            None => e,
        }
    })
}

fn handle_students_add(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    require_admin(&state.sessions, &req.params)?;
    let Some(raw) = req.params.get("student") else {
        return Err(HandlerErr::bad_params("missing student"));
    };
    let record = parse_form(raw, None)?.validate()?;
    ws.records.append(&record)?;
    ws.note_usage("students.add", &record.name);
    info!("student added");
    Ok(json!({
        "message": format!("Student {} added.", record.name),
        "student": record
    }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    require_admin(&state.sessions, &req.params)?;
    let students = ws.records.read()?;
    let revision = ws.records.revision()?;
    let message = if students.is_empty() {
        "No students found."
    } else {
        ""
    };
    Ok(json!({
        "students": students,
        "revision": revision,
        "message": message
    }))
}

fn handle_students_replace_all(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    require_admin(&state.sessions, &req.params)?;
    let Some(items) = req.params.get("students").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("students must be an array"));
    };

    let mut rows: Vec<StudentRecord> = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let record = parse_form(item, Some(i + 1))?
            .into_record()
            .map_err(|e| HandlerErr::from(e).with_details(json!({ "row": i + 1 })))?;
        rows.push(record);
    }

    if let Some(expected) = optional_str(&req.params, "expectedRevision") {
        let actual = ws.records.revision()?;
        if expected != actual {
            return Err(StoreError::StaleRevision {
                expected: expected.to_string(),
                actual,
            }
            .into());
        }
    }

    ws.records.overwrite(&rows)?;
    ws.note_usage("students.replaceAll", &format!("{} rows", rows.len()));
    info!("student records overwritten: {} rows", rows.len());
    Ok(json!({
        "message": "Changes saved.",
        "rowCount": rows.len(),
        "revision": ws.records.revision()?
    }))
}

fn handle_students_search(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    let query = form_str(&req.params, "query");
    let query = query.trim();
    if query.is_empty() {
        return Ok(json!({ "students": [], "message": "" }));
    }
    let students: Vec<StudentRecord> = ws
        .records
        .read()?
        .into_iter()
        .filter(|r| r.matches_query(query))
        .collect();
    let message = if students.is_empty() {
        "No matching records found."
    } else {
        ""
    };
    Ok(json!({ "students": students, "message": message }))
}

fn handle_students_view_mine(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    let email = form_str(&req.params, "email");
    let password = form_str(&req.params, "password");
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingInput.into());
    }

    let m = ws.auth_service().find_matching_record(email.trim())?;
    Ok(json!({
        "message": format!(
            "Found matching student: {} ({:.1}% match)",
            m.record.name,
            m.similarity * 100.0
        ),
        "searchedFor": email_local_part(email.trim()),
        "student": m.record,
        "similarity": m.similarity,
        "percent": m.percent,
        "rowIndex": m.row_index
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "students.add" => handle_students_add(state, req),
        "students.list" => handle_students_list(state, req),
        "students.replaceAll" => handle_students_replace_all(state, req),
        "students.search" => handle_students_search(state, req),
        "students.viewMine" => handle_students_view_mine(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
