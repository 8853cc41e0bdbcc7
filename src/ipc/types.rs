use crate::session::SessionTable;
use crate::workspace::Workspace;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Default)]
pub struct AppState {
    pub workspace: Option<Workspace>,
    pub sessions: SessionTable,
}
