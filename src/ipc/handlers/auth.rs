use crate::audit::now_local;
use crate::ipc::helpers::{form_str, optional_str, required_str, respond, workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::session::{Role, Session, SessionTable};
use serde_json::{json, Value};

fn unknown_session(id: &str) -> HandlerErr {
    HandlerErr::new("unknown_session", "session is not open").with_details(json!({ "sessionId": id }))
}

/// A supplied id must already exist; a missing one is opened after a
/// successful login.
fn check_session_id(sessions: &SessionTable, params: &Value) -> Result<(), HandlerErr> {
    match optional_str(params, "sessionId") {
        Some(id) if sessions.get(id).is_none() => Err(unknown_session(id)),
        _ => Ok(()),
    }
}

fn session_flags(id: &str, s: &Session) -> Value {
    json!({
        "sessionId": id,
        "signedOut": s.is_empty(),
        "adminLoggedIn": s.admin.is_some(),
        "studentLoggedIn": s.student.is_some(),
        "admin": s.admin,
        "student": s.student
    })
}

fn handle_admin_login(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    check_session_id(&state.sessions, &req.params)?;
    let email = form_str(&req.params, "email");
    let password = form_str(&req.params, "password");

    let admin = ws
        .auth_service()
        .authenticate_admin(&email, &password, now_local())?;
    ws.note_usage("auth.adminLogin", &admin.email);

    let message = format!("Welcome, {}! Admin access granted.", admin.display_name);
    let (id, session) = state
        .sessions
        .get_or_open(optional_str(&req.params, "sessionId"))
        .ok_or_else(|| HandlerErr::new("unknown_session", "session is not open"))?;
    session.admin = Some(admin.clone());
    Ok(json!({
        "sessionId": id,
        "message": message,
        "admin": admin
    }))
}

fn handle_student_login(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    check_session_id(&state.sessions, &req.params)?;
    let email = form_str(&req.params, "email");
    let password = form_str(&req.params, "password");

    let student = ws.auth_service().authenticate_student(&email, &password)?;
    ws.note_usage("auth.studentLogin", &student.email);

    let message = format!("Welcome, {}!", student.display_name);
    let (id, session) = state
        .sessions
        .get_or_open(optional_str(&req.params, "sessionId"))
        .ok_or_else(|| HandlerErr::new("unknown_session", "session is not open"))?;
    session.student = Some(student.clone());
    Ok(json!({
        "sessionId": id,
        "message": message,
        "student": student
    }))
}

fn handle_logout(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = required_str(&req.params, "sessionId")?;
    let role_raw = optional_str(&req.params, "role").unwrap_or("all");
    let role = Role::parse(role_raw)
        .ok_or_else(|| HandlerErr::bad_params("role must be one of: admin, student, all"))?;
    let session = state
        .sessions
        .logout(&id, role)
        .ok_or_else(|| unknown_session(&id))?;
    Ok(session_flags(&id, session))
}

fn handle_session_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = required_str(&req.params, "sessionId")?;
    let session = state.sessions.get(&id).ok_or_else(|| unknown_session(&id))?;
    Ok(session_flags(&id, session))
}

fn handle_session_close(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = required_str(&req.params, "sessionId")?;
    Ok(json!({ "closed": state.sessions.close(&id) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "auth.adminLogin" => handle_admin_login(state, req),
        "auth.studentLogin" => handle_student_login(state, req),
        "auth.logout" => handle_logout(state, req),
        "session.get" => handle_session_get(state, req),
        "session.close" => handle_session_close(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
