use crate::ipc::error::ok;
use crate::ipc::helpers::{required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::session::SessionTable;
use crate::workspace::Workspace;
use serde_json::{json, Value};
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state
                .workspace
                .as_ref()
                .map(|w| w.root().to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let path = PathBuf::from(required_str(&req.params, "path")?);
    let ws = Workspace::open(&path)?;
    let settings = ws.settings.clone();
    state.workspace = Some(ws);
    // logins belong to the previous workspace's tables
    state.sessions = SessionTable::default();
    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "settings": settings
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(respond(&req.id, handle_workspace_select(state, req))),
        _ => None,
    }
}
