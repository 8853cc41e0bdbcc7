use crate::error::{RecordError, StoreError};
use serde::{Deserialize, Deserializer, Serialize};

pub const STUDENT_COLUMNS: [&str; 9] = [
    "Name",
    "Age",
    "Gender",
    "Date of Birth",
    "Grade / Class",
    "Section",
    "Roll Number / Student ID",
    "Contact Number",
    "Email Address",
];
pub const ADMIN_COLUMNS: [&str; 3] = ["Email", "Password", "AdminName"];
pub const STUDENT_LOGIN_COLUMNS: [&str; 3] = ["Email", "Password", "Name"];

/// A row type that can live in a CSV table. Fields are exchanged in the
/// table's canonical column order.
pub trait TabularRow: Sized + Clone {
    fn from_fields(table: &str, row: usize, fields: Vec<String>) -> Result<Self, StoreError>;
    fn to_fields(&self) -> Vec<String>;
}

/// Login row, shared by the admin and student credential tables. Only the
/// header differs: `AdminName` vs `Name` for the display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub display_name: String,
}

impl Credential {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            display_name: display_name.into(),
        }
    }

    /// Case-insensitive email, exact password.
    pub fn matches(&self, email: &str, password: &str) -> bool {
        self.has_email(email) && self.password == password
    }

    pub fn has_email(&self, email: &str) -> bool {
        self.email.trim().to_lowercase() == email.trim().to_lowercase()
    }
}

impl TabularRow for Credential {
    fn from_fields(_table: &str, _row: usize, fields: Vec<String>) -> Result<Self, StoreError> {
        let mut it = fields.into_iter();
        Ok(Self {
            email: it.next().unwrap_or_default(),
            password: it.next().unwrap_or_default(),
            display_name: it.next().unwrap_or_default(),
        })
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.email.clone(),
            self.password.clone(),
            self.display_name.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub date_of_birth: String,
    pub grade: String,
    pub section: String,
    pub roll_number: String,
    pub contact: String,
    pub email: String,
}

impl StudentRecord {
    /// Case-insensitive substring match on name or grade.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.name.to_lowercase().contains(&q) || self.grade.to_lowercase().contains(&q)
    }
}

impl TabularRow for StudentRecord {
    fn from_fields(table: &str, row: usize, fields: Vec<String>) -> Result<Self, StoreError> {
        let mut it = fields.into_iter();
        let mut next = || it.next().unwrap_or_default();
        let name = next();
        let raw_age = next();
        let age = parse_age(&raw_age).ok_or_else(|| StoreError::NonNumericAge {
            table: table.to_string(),
            row,
            value: raw_age.clone(),
        })?;
        Ok(Self {
            name,
            age,
            gender: next(),
            date_of_birth: next(),
            grade: next(),
            section: next(),
            roll_number: next(),
            contact: next(),
            email: next(),
        })
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.age.to_string(),
            self.gender.clone(),
            self.date_of_birth.clone(),
            self.grade.clone(),
            self.section.clone(),
            self.roll_number.clone(),
            self.contact.clone(),
            self.email.clone(),
        ]
    }
}

/// Whole, non-negative ages. Spreadsheet tools like to write `12.0`, which is
/// accepted; `12.5`, `-3` and blanks are not.
pub fn parse_age(raw: &str) -> Option<u32> {
    let t = raw.trim();
    if let Ok(v) = t.parse::<u32>() {
        return Some(v);
    }
    let f = t.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
        Some(f as u32)
    } else {
        None
    }
}

/// Student fields as a form submits them. Age may arrive as a JSON string or
/// number.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentForm {
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub age: String,
    pub gender: String,
    pub date_of_birth: String,
    pub grade: String,
    pub section: String,
    pub roll_number: String,
    pub contact: String,
    pub email: String,
}

fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(de)?;
    Ok(match v {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl StudentForm {
    /// Rules for "Add Student": every field filled in, numeric age, ISO date
    /// of birth.
    pub fn validate(self) -> Result<StudentRecord, RecordError> {
        let required: [(&'static str, &str); 9] = [
            ("Name", self.name.as_str()),
            ("Age", self.age.as_str()),
            ("Gender", self.gender.as_str()),
            ("Date of Birth", self.date_of_birth.as_str()),
            ("Grade / Class", self.grade.as_str()),
            ("Section", self.section.as_str()),
            ("Roll Number / Student ID", self.roll_number.as_str()),
            ("Contact Number", self.contact.as_str()),
            ("Email Address", self.email.as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(RecordError::MissingInput(*field));
        }
        let dob = self.date_of_birth.trim();
        if chrono::NaiveDate::parse_from_str(dob, "%Y-%m-%d").is_err() {
            return Err(RecordError::InvalidDateOfBirth(dob.to_string()));
        }
        let date_of_birth = dob.to_string();
        self.into_record().map(|mut r| {
            r.date_of_birth = date_of_birth;
            r
        })
    }

    /// Rules for bulk edits: only the age is checked, everything else is
    /// stored as typed.
    pub fn into_record(self) -> Result<StudentRecord, RecordError> {
        let age = parse_age(&self.age).ok_or_else(|| RecordError::NonNumericAge(self.age.clone()))?;
        Ok(StudentRecord {
            name: self.name,
            age,
            gender: self.gender,
            date_of_birth: self.date_of_birth,
            grade: self.grade,
            section: self.section,
            roll_number: self.roll_number,
            contact: self.contact,
            email: self.email,
        })
    }
}
