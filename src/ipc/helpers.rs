use crate::error::{AuthError, ImportError, RecordError, StoreError};
use crate::ipc::error::{err, ok};
use crate::session::{AdminSession, SessionTable};
use crate::workspace::Workspace;
use serde_json::Value;

/// Failure of one handler, rendered into the error envelope.
#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

macro_rules! from_domain_error {
    ($($t:ty),*) => {
        $(impl From<$t> for HandlerErr {
            fn from(e: $t) -> Self {
                Self::new(e.code(), e.to_string())
            }
        })*
    };
}

from_domain_error!(AuthError, StoreError, RecordError, ImportError);

pub fn respond(id: &str, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Form text: absent means empty, validation is up to the caller.
pub fn form_str(params: &Value, key: &str) -> String {
    optional_str(params, key).unwrap_or_default().to_string()
}

pub fn workspace(ws: &Option<Workspace>) -> Result<&Workspace, HandlerErr> {
    ws.as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn workspace_mut(ws: &mut Option<Workspace>) -> Result<&mut Workspace, HandlerErr> {
    ws.as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

/// The admin signed in on `params.sessionId`.
pub fn require_admin<'a>(
    sessions: &'a SessionTable,
    params: &Value,
) -> Result<&'a AdminSession, HandlerErr> {
    let session = optional_str(params, "sessionId").and_then(|id| sessions.get(id));
    match session {
        Some(s) => Ok(s.require_admin()?),
        None => Err(AuthError::AdminRequired.into()),
    }
}
