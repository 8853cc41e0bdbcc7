use crate::error::RecordError;
use crate::ipc::helpers::{form_str, require_admin, respond, workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records::Credential;
use crate::store::TableStore;
use log::info;
use serde_json::{json, Value};

/// Duplicates are not checked: the first matching row wins at login.
fn credential_from_params(params: &Value) -> Result<Credential, HandlerErr> {
    let email = form_str(params, "email").trim().to_string();
    let password = form_str(params, "password");
    let name = form_str(params, "name").trim().to_string();
    for (label, value) in [("Email", &email), ("Password", &password), ("Name", &name)] {
        if value.is_empty() {
            return Err(RecordError::MissingInput(label).into());
        }
    }
    // the login audit log is comma separated, one line per login
    if email.contains([',', '\r', '\n']) {
        return Err(RecordError::InvalidEmail.into());
    }
    Ok(Credential::new(email, password, name))
}

fn handle_add_admin(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    let bootstrap = ws.admins.read()?.is_empty();
    if !bootstrap {
        require_admin(&state.sessions, &req.params)?;
    }
    let cred = credential_from_params(&req.params)?;
    ws.admins.append(&cred)?;
    ws.note_usage("credentials.addAdmin", &cred.email);
    info!("admin credential added (bootstrap: {})", bootstrap);
    Ok(json!({
        "message": format!("Admin {} added.", cred.display_name),
        "admin": cred,
        "bootstrap": bootstrap
    }))
}

fn handle_add_student(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    require_admin(&state.sessions, &req.params)?;
    let cred = credential_from_params(&req.params)?;
    ws.students.append(&cred)?;
    ws.note_usage("credentials.addStudent", &cred.email);
    info!("student credential added");
    Ok(json!({
        "message": format!("Student login for {} added.", cred.display_name),
        "student": cred
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "credentials.addAdmin" => handle_add_admin(state, req),
        "credentials.addStudent" => handle_add_student(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
