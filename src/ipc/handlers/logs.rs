use crate::ipc::helpers::{require_admin, respond, workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_logs_view(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    require_admin(&state.sessions, &req.params)?;
    let counts = ws.audit.login_counts()?;
    let usage = ws.usage.read_all()?;

    let admin_logins: Vec<Value> = counts
        .iter()
        .map(|(email, count)| {
            json!({
                "email": email,
                "count": count,
                "label": format!("{}: {} logins", email, count)
            })
        })
        .collect();
    let mut messages = Vec::new();
    if admin_logins.is_empty() {
        messages.push("No admin login logs found.");
    }
    if usage.is_empty() {
        messages.push("No logs found.");
    }
    Ok(json!({
        "adminLogins": admin_logins,
        "usageLog": usage,
        "message": messages.join(" ")
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "logs.view" => Some(respond(&req.id, handle_logs_view(state, req))),
        _ => None,
    }
}
