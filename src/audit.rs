//! Append-only text logs kept next to the tables: admin logins
//! (`email,timestamp`) and general usage (`timestamp action detail`).

use crate::error::StoreError;
use chrono::NaiveDateTime;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// ISO-8601 local time with microseconds, e.g. `2024-05-01T09:30:00.000123`.
pub fn iso_timestamp(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

pub fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn append_line(path: &Path, line: &str) -> Result<(), StoreError> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    writeln!(f, "{}", line).map_err(|e| StoreError::io(path, e))
}

fn read_or_empty(path: &Path) -> Result<String, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record_admin_login(&self, email: &str, at: NaiveDateTime) -> Result<(), StoreError> {
        let email = email.replace(['\r', '\n'], " ");
        append_line(&self.path, &format!("{},{}", email, iso_timestamp(at)))
    }

    /// Successful logins per email, in order of first appearance. The
    /// timestamp follows the last comma; lines without one are ignored.
    pub fn login_counts(&self) -> Result<Vec<(String, usize)>, StoreError> {
        let text = read_or_empty(&self.path)?;
        let mut counts: Vec<(String, usize)> = Vec::new();
        for line in text.lines() {
            let Some((email, _)) = line.rsplit_once(',') else {
                continue;
            };
            let email = email.trim();
            match counts.iter_mut().find(|(e, _)| e == email) {
                Some((_, n)) => *n += 1,
                None => counts.push((email.to_string(), 1)),
            }
        }
        Ok(counts)
    }
}

#[derive(Debug, Clone)]
pub struct UsageLog {
    path: PathBuf,
}

impl UsageLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(&self, action: &str, detail: &str, at: NaiveDateTime) -> Result<(), StoreError> {
        let detail = detail.replace(['\r', '\n'], " ");
        append_line(
            &self.path,
            &format!("{} {} {}", iso_timestamp(at), action, detail)
                .trim_end()
                .to_string(),
        )
    }

    pub fn read_all(&self) -> Result<String, StoreError> {
        read_or_empty(&self.path)
    }
}
