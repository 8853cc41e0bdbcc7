use std::path::PathBuf;
use thiserror::Error;

/// Failures of the CSV tables behind the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{table} is missing column \"{column}\"")]
    MissingColumn { table: String, column: String },

    #[error("{table} row {row}: age must be a whole number, got \"{value}\"")]
    NonNumericAge {
        table: String,
        row: usize,
        value: String,
    },

    #[error("records changed since they were loaded (expected revision {expected}, found {actual})")]
    StaleRevision { expected: String, actual: String },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "store_io_failed",
            Self::MissingColumn { .. } => "store_malformed",
            Self::NonNumericAge { .. } => "non_numeric_age",
            Self::StaleRevision { .. } => "stale_revision",
        }
    }
}

/// Login and lookup failures. Messages are shown to the user as-is.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please enter both email and password.")]
    MissingInput,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Invalid credentials or admin name does not match email prefix.")]
    IdentityMismatch,

    #[error("No admin record found for this email. Login not allowed.")]
    NoAdminRecord,

    #[error("Wrong user name")]
    NameMismatch,

    #[error("No sufficiently matching student record found.")]
    NotFound,

    #[error("Admin login required.")]
    AdminRequired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingInput => "missing_input",
            Self::InvalidCredentials => "invalid_credentials",
            Self::IdentityMismatch => "identity_mismatch",
            Self::NoAdminRecord => "no_admin_record",
            Self::NameMismatch => "name_mismatch",
            Self::NotFound => "not_found",
            Self::AdminRequired => "admin_required",
            Self::Store(e) => e.code(),
        }
    }
}

/// Validation of a single student record coming from a form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("All fields are required ({0} is empty).")]
    MissingInput(&'static str),

    #[error("Age must be a number.")]
    NonNumericAge(String),

    #[error("Date of birth must be YYYY-MM-DD, got \"{0}\".")]
    InvalidDateOfBirth(String),

    #[error("Email must not contain commas or line breaks.")]
    InvalidEmail,
}

impl RecordError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingInput(_) => "missing_input",
            Self::NonNumericAge(_) => "non_numeric_age",
            Self::InvalidDateOfBirth(_) => "invalid_date_of_birth",
            Self::InvalidEmail => "invalid_email",
        }
    }
}

/// Failures reading an uploaded CSV or XLSX payload.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to import file: {0}")]
    Malformed(String),

    #[error("Import must be confirmed before student records are overwritten.")]
    NotConfirmed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed_import",
            Self::NotConfirmed => "not_confirmed",
            Self::Store(e) => e.code(),
        }
    }
}

impl From<anyhow::Error> for ImportError {
    fn from(e: anyhow::Error) -> Self {
        Self::Malformed(format!("{e:#}"))
    }
}
