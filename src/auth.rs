//! Login checks for both roles and the fuzzy "which record is mine" lookup.
//!
//! Two rules here are odd on purpose and kept exactly:
//! - an admin's email local-part must spell the admin's display name;
//! - a student may only log in when the admin table has a row for the same
//!   email whose display name equals the student's, character for character.
//!
//! Neither adds real security. They re-derive identity from data that is
//! already in the credential row.

use crate::audit::{iso_timestamp, AuditLog};
use crate::error::AuthError;
use crate::matcher::{email_local_part, normalize_name, similarity};
use crate::records::{Credential, StudentRecord};
use crate::session::{AdminSession, StudentSession};
use crate::store::TableStore;
use chrono::NaiveDateTime;
use log::{info, warn};
use serde::Serialize;

/// Result of the fuzzy record lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMatch {
    pub record: StudentRecord,
    pub similarity: f64,
    /// `similarity` as a percentage rounded to one decimal, for display.
    pub percent: f64,
    /// Zero-based position in the record table.
    pub row_index: usize,
}

pub struct AuthService<'a> {
    pub admins: &'a dyn TableStore<Credential>,
    pub students: &'a dyn TableStore<Credential>,
    pub records: &'a dyn TableStore<StudentRecord>,
    /// Where successful admin logins are appended, if auditing is on.
    pub audit: Option<&'a AuditLog>,
    pub match_threshold: f64,
}

fn require_inputs(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingInput);
    }
    Ok(())
}

impl<'a> AuthService<'a> {
    pub fn authenticate_admin(
        &self,
        email: &str,
        password: &str,
        at: NaiveDateTime,
    ) -> Result<AdminSession, AuthError> {
        require_inputs(email, password)?;
        let email = email.trim();

        let admins = self.admins.read()?;
        let local = email_local_part(email);
        let mut credentials_matched = false;
        let mut found = None;
        for c in admins.iter().filter(|c| c.matches(email, password)) {
            credentials_matched = true;
            if normalize_name(&c.display_name) == local {
                found = Some(c);
                break;
            }
        }
        let Some(row) = found else {
            if credentials_matched {
                warn!("admin login rejected: identity_mismatch");
                return Err(AuthError::IdentityMismatch);
            }
            warn!("admin login rejected: invalid_credentials");
            return Err(AuthError::InvalidCredentials);
        };

        if let Some(audit) = self.audit {
            if let Err(e) = audit.record_admin_login(email, at) {
                warn!("could not append admin login audit line: {}", e);
            }
        }
        info!("admin login: {}", email);

        Ok(AdminSession {
            email: email.to_string(),
            display_name: row.display_name.clone(),
            logged_in_at: iso_timestamp(at),
        })
    }

    pub fn authenticate_student(
        &self,
        email: &str,
        password: &str,
    ) -> Result<StudentSession, AuthError> {
        require_inputs(email, password)?;
        let email = email.trim();

        let students = self.students.read()?;
        let Some(student) = students.iter().find(|c| c.matches(email, password)) else {
            warn!("student login rejected: invalid_credentials");
            return Err(AuthError::InvalidCredentials);
        };

        let admins = self.admins.read()?;
        let Some(admin) = admins.iter().find(|c| c.has_email(email)) else {
            warn!("student login rejected: no_admin_record");
            return Err(AuthError::NoAdminRecord);
        };

        if student.display_name != admin.display_name {
            warn!("student login rejected: name_mismatch");
            return Err(AuthError::NameMismatch);
        }

        info!("student login: {}", email);
        Ok(StudentSession {
            email: email.to_string(),
            display_name: student.display_name.clone(),
        })
    }

    /// First record, in file order, whose normalized name is similar enough
    /// to the email's local-part. Not a best match: later, closer records are
    /// never considered once one clears the threshold. Rows that fail to load
    /// are skipped so one bad row does not hide everyone else's.
    pub fn find_matching_record(&self, email: &str) -> Result<RecordMatch, AuthError> {
        let local = email_local_part(email);
        let (records, skipped) = self.records.read_lenient()?;
        for e in &skipped {
            warn!("record lookup skipped a row: {}", e);
        }
        for (row_index, record) in records {
            let Some(score) = similarity(&local, &normalize_name(&record.name)) else {
                continue;
            };
            if score >= self.match_threshold {
                return Ok(RecordMatch {
                    record,
                    similarity: score,
                    percent: (score * 1000.0).round() / 10.0,
                    row_index,
                });
            }
        }
        Err(AuthError::NotFound)
    }
}
