use crate::ipc::helpers::{require_admin, respond, workspace, workspace_mut, HandlerErr};
use crate::ipc::types::{AppState, Request};
use log::info;
use serde_json::{json, Value};

fn handle_setup_get(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    Ok(json!({ "settings": ws.settings }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    workspace(&state.workspace)?;
    require_admin(&state.sessions, &req.params)?;
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };

    let ws = workspace_mut(&mut state.workspace)?;
    let mut next = ws.settings.clone();
    next.apply_patch(patch).map_err(HandlerErr::bad_params)?;
    let previous = std::mem::replace(&mut ws.settings, next);
    if let Err(e) = ws.save_settings() {
        ws.settings = previous;
        return Err(e.into());
    }
    let keys: Vec<&str> = patch.keys().map(String::as_str).collect();
    ws.note_usage("setup.update", &keys.join(","));
    info!("settings updated: {}", keys.join(","));
    Ok(json!({ "settings": ws.settings }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "setup.get" => handle_setup_get(state, req),
        "setup.update" => handle_setup_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
