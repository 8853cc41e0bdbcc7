use crate::error::AuthError;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub email: String,
    pub display_name: String,
    /// ISO-8601 local time.
    pub logged_in_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSession {
    pub email: String,
    pub display_name: String,
}

/// Login state of one UI context. Both roles can be signed in at once, the
/// way the admin and student tabs sit side by side.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub admin: Option<AdminSession>,
    pub student: Option<StudentSession>,
}

impl Session {
    pub fn require_admin(&self) -> Result<&AdminSession, AuthError> {
        self.admin.as_ref().ok_or(AuthError::AdminRequired)
    }

    pub fn is_empty(&self) -> bool {
        self.admin.is_none() && self.student.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Student,
    All,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "student" => Some(Self::Student),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Sessions for the life of the process, keyed by an opaque id handed to the
/// front end. Nothing here is written to disk.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
}

impl SessionTable {
    pub fn open(&mut self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Session::default());
        id
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// The session for `id`, or a fresh one when no id was supplied.
    pub fn get_or_open(&mut self, id: Option<&str>) -> Option<(String, &mut Session)> {
        let id = match id {
            Some(id) => id.to_string(),
            None => self.open(),
        };
        let session = self.get_mut(&id)?;
        Some((id, session))
    }

    pub fn close(&mut self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn logout(&mut self, id: &str, role: Role) -> Option<&Session> {
        let s = self.sessions.get_mut(id)?;
        match role {
            Role::Admin => s.admin = None,
            Role::Student => s.student = None,
            Role::All => *s = Session::default(),
        }
        Some(&*s)
    }
}
