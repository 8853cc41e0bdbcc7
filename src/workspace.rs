use crate::audit::{now_local, AuditLog, UsageLog};
use crate::auth::AuthService;
use crate::config::{Settings, SETTINGS_FILE};
use crate::error::StoreError;
use crate::records::{
    Credential, StudentRecord, ADMIN_COLUMNS, STUDENT_COLUMNS, STUDENT_LOGIN_COLUMNS,
};
use crate::store::CsvTable;
use log::{info, warn};
use std::path::{Path, PathBuf};

pub const RECORDS_FILE: &str = "students.csv";
pub const ADMIN_LOGINS_FILE: &str = "admin_logins.csv";
pub const STUDENT_LOGINS_FILE: &str = "student_logins.csv";
pub const ADMIN_AUDIT_FILE: &str = "admin_login_logs.txt";
pub const USAGE_LOG_FILE: &str = "usage_logs.txt";

/// One directory holding every table and log file.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    pub records: CsvTable<StudentRecord>,
    pub admins: CsvTable<Credential>,
    pub students: CsvTable<Credential>,
    pub audit: AuditLog,
    pub usage: UsageLog,
    pub settings: Settings,
}

impl Workspace {
    /// Create the directory and any missing table (header only), then load
    /// settings.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root).map_err(|e| StoreError::io(root, e))?;

        let records: CsvTable<StudentRecord> =
            CsvTable::new(root.join(RECORDS_FILE), &STUDENT_COLUMNS);
        let admins: CsvTable<Credential> = CsvTable::new(root.join(ADMIN_LOGINS_FILE), &ADMIN_COLUMNS);
        let students: CsvTable<Credential> =
            CsvTable::new(root.join(STUDENT_LOGINS_FILE), &STUDENT_LOGIN_COLUMNS);
        records.ensure()?;
        admins.ensure()?;
        students.ensure()?;

        let settings = Settings::load(&root.join(SETTINGS_FILE))?;
        info!("workspace opened: {}", root.to_string_lossy());

        Ok(Self {
            root: root.to_path_buf(),
            records,
            admins,
            students,
            audit: AuditLog::new(root.join(ADMIN_AUDIT_FILE)),
            usage: UsageLog::new(root.join(USAGE_LOG_FILE)),
            settings,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save_settings(&self) -> Result<(), StoreError> {
        self.settings.save(&self.root.join(SETTINGS_FILE))
    }

    pub fn auth_service(&self) -> AuthService<'_> {
        AuthService {
            admins: &self.admins,
            students: &self.students,
            records: &self.records,
            audit: self.settings.audit_admin_logins.then_some(&self.audit),
            match_threshold: self.settings.match_threshold,
        }
    }

    /// Append a usage line when enabled. Failing to log never fails the
    /// action that triggered it.
    pub fn note_usage(&self, action: &str, detail: &str) {
        if !self.settings.usage_log {
            return;
        }
        if let Err(e) = self.usage.record(action, detail, now_local()) {
            warn!("could not append usage log line: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TableStore;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    #[test]
    fn open_creates_tables_with_headers() {
        let root = temp_dir("rosterd-workspace-open").join("nested");
        let ws = Workspace::open(&root).expect("open");
        let header = std::fs::read_to_string(root.join(ADMIN_LOGINS_FILE)).expect("read");
        assert_eq!(header, "Email,Password,AdminName\n");
        assert!(root.join(RECORDS_FILE).exists());
        assert!(root.join(STUDENT_LOGINS_FILE).exists());
        assert!(ws.records.read().expect("read").is_empty());
        assert_eq!(ws.settings, Settings::default());
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn reopen_keeps_existing_rows() {
        let root = temp_dir("rosterd-workspace-reopen");
        let ws = Workspace::open(&root).expect("open");
        ws.admins
            .append(&Credential::new("a.smith@x.com", "p1", "A Smith"))
            .expect("append");
        drop(ws);
        let ws = Workspace::open(&root).expect("reopen");
        assert_eq!(ws.admins.read().expect("read").len(), 1);
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn usage_notes_respect_setting() {
        let root = temp_dir("rosterd-workspace-usage");
        let mut ws = Workspace::open(&root).expect("open");
        ws.note_usage("students.add", "Ann");
        ws.settings.usage_log = false;
        ws.note_usage("students.add", "Bo");
        let text = ws.usage.read_all().expect("read");
        assert_eq!(text.lines().count(), 1);
        assert!(text.trim_end().ends_with("students.add Ann"));
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn audit_follows_setting() {
        let root = temp_dir("rosterd-workspace-audit");
        let mut ws = Workspace::open(&root).expect("open");
        assert!(ws.auth_service().audit.is_some());
        ws.settings.audit_admin_logins = false;
        assert!(ws.auth_service().audit.is_none());
        let _ = std::fs::remove_dir_all(root);
    }
}
