use crate::error::ImportError;
use crate::exchange::{export_xlsx, read_import_file};
use crate::ipc::helpers::{optional_str, require_admin, required_str, respond, workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::TableStore;
use log::{info, warn};
use serde_json::{json, Value};
use std::path::PathBuf;

pub const DEFAULT_EXPORT_FILE: &str = "students_export.xlsx";

fn handle_preview_import(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    workspace(&state.workspace)?;
    require_admin(&state.sessions, &req.params)?;
    let path = required_str(&req.params, "path")?;
    let preview = read_import_file(&PathBuf::from(&path)).map_err(|e| {
        warn!("import preview failed: {}", e.code());
        HandlerErr::from(e).with_details(json!({ "path": path }))
    })?;
    Ok(json!({
        "format": preview.format,
        "rowCount": preview.students.len(),
        "students": preview.students,
        "ignoredColumns": preview.ignored_columns
    }))
}

fn handle_apply_import(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    require_admin(&state.sessions, &req.params)?;
    let path = required_str(&req.params, "path")?;
    if req.params.get("confirm").and_then(|v| v.as_bool()) != Some(true) {
        return Err(ImportError::NotConfirmed.into());
    }

    let preview = read_import_file(&PathBuf::from(&path))
        .map_err(|e| HandlerErr::from(e).with_details(json!({ "path": path })))?;
    ws.records
        .overwrite(&preview.students)
        .map_err(ImportError::from)?;
    ws.note_usage(
        "exchange.applyImport",
        &format!("{} rows from {}", preview.students.len(), path),
    );
    info!("imported {} student rows", preview.students.len());
    Ok(json!({
        "message": "Student records have been updated with the imported file.",
        "rowCount": preview.students.len(),
        "revision": ws.records.revision()?
    }))
}

fn handle_export_xlsx(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ws = workspace(&state.workspace)?;
    require_admin(&state.sessions, &req.params)?;
    let out_path = match optional_str(&req.params, "outPath").map(str::trim) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => ws.root().join(DEFAULT_EXPORT_FILE),
    };

    let students = ws.records.read()?;
    let summary = export_xlsx(&students, &out_path).map_err(|e| {
        HandlerErr::new("export_failed", format!("{e:#}"))
            .with_details(json!({ "path": out_path.to_string_lossy() }))
    })?;
    ws.note_usage("exchange.exportXlsx", &out_path.to_string_lossy());
    info!("exported {} student rows", summary.row_count);
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "rowCount": summary.row_count,
        "sheetName": summary.sheet_name
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "exchange.previewImport" => handle_preview_import(state, req),
        "exchange.applyImport" => handle_apply_import(state, req),
        "exchange.exportXlsx" => handle_export_xlsx(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
