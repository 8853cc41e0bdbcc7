use crate::dashboard::summarize;
use crate::ipc::helpers::{require_admin, respond, workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::TableStore;
use serde_json::{json, Value};

fn handle_dashboard_summary(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    require_admin(&state.sessions, &req.params)?;
    let students = ws.records.read()?;
    let summary = summarize(&students, ws.settings.age_histogram_bins);
    let mut out = serde_json::to_value(&summary)
        .map_err(|e| HandlerErr::new("internal", e.to_string()))?;
    out["message"] = json!(format!("Total Students: {}", summary.total));
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "dashboard.summary" => Some(respond(&req.id, handle_dashboard_summary(state, req))),
        _ => None,
    }
}
