use crate::error::ImportError;
use crate::records::{StudentRecord, TabularRow, STUDENT_COLUMNS};
use crate::spreadsheet::{is_zip, read_xlsx, write_xlsx};
use crate::tabular::{header_key, map_columns, parse_csv, project};
use anyhow::Context;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

pub const EXPORT_SHEET_NAME: &str = "Students";
const DATE_OF_BIRTH_COLUMN: usize = 3;
const AGE_COLUMN: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    Csv,
    Xlsx,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub format: ImportFormat,
    pub students: Vec<StudentRecord>,
    /// Header cells that do not correspond to a student column.
    pub ignored_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub row_count: usize,
    pub sheet_name: String,
}

/// Spreadsheets store dates as days since 1899-12-30. Anything that is not a
/// plausible serial is returned unchanged.
fn excel_serial_to_iso(raw: &str) -> Option<String> {
    let serial = raw.trim().parse::<f64>().ok()?;
    if !serial.is_finite() || !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let day = epoch.checked_add_days(Days::new(serial.floor() as u64))?;
    Some(day.format("%Y-%m-%d").to_string())
}

/// CSV rows must have exactly as many fields as the header. Worksheets omit
/// trailing empty cells, so there only text past the header is rejected.
fn check_width(
    format: ImportFormat,
    row: usize,
    rec: &[String],
    width: usize,
) -> Result<(), ImportError> {
    let ragged = match format {
        ImportFormat::Csv => rec.len() != width,
        ImportFormat::Xlsx => rec.iter().skip(width).any(|c| !c.trim().is_empty()),
    };
    if ragged {
        return Err(ImportError::Malformed(format!(
            "row {} has {} fields, expected {}",
            row,
            rec.len(),
            width
        )));
    }
    Ok(())
}

/// Parse an uploaded payload. XLSX is recognised by its zip signature,
/// everything else is read as CSV text. Columns are matched by header name,
/// so their order in the file does not matter.
pub fn parse_import(bytes: &[u8]) -> Result<ImportPreview, ImportError> {
    let (format, records) = if is_zip(bytes) {
        (ImportFormat::Xlsx, read_xlsx(Cursor::new(bytes))?)
    } else {
        let text = String::from_utf8_lossy(bytes);
        (ImportFormat::Csv, parse_csv(&text))
    };

    let mut it = records.into_iter();
    let header = it
        .next()
        .ok_or_else(|| ImportError::Malformed("file is empty".to_string()))?;
    let idx = map_columns("import", &header, &STUDENT_COLUMNS)
        .map_err(|e| ImportError::Malformed(e.to_string()))?;

    let known: Vec<String> = STUDENT_COLUMNS.iter().map(|c| header_key(c)).collect();
    let ignored_columns = header
        .iter()
        .filter(|h| !h.trim().is_empty() && !known.contains(&header_key(h)))
        .cloned()
        .collect();

    let mut students = Vec::new();
    for (i, rec) in it.enumerate() {
        check_width(format, i + 1, &rec, header.len())?;
        let mut fields = project(&rec, &idx);
        if format == ImportFormat::Xlsx {
            if let Some(iso) = excel_serial_to_iso(&fields[DATE_OF_BIRTH_COLUMN]) {
                fields[DATE_OF_BIRTH_COLUMN] = iso;
            }
        }
        let student = StudentRecord::from_fields("import", i + 1, fields)
            .map_err(|e| ImportError::Malformed(e.to_string()))?;
        students.push(student);
    }

    Ok(ImportPreview {
        format,
        students,
        ignored_columns,
    })
}

pub fn read_import_file(path: &Path) -> Result<ImportPreview, ImportError> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    parse_import(&bytes)
}

/// Write the records as a one-sheet workbook. The file appears under its
/// final name only once it is complete.
pub fn export_xlsx(records: &[StudentRecord], out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(records.len() + 1);
    rows.push(STUDENT_COLUMNS.iter().map(|c| c.to_string()).collect());
    rows.extend(records.iter().map(|r| r.to_fields()));

    let mut tmp_name = out_path.as_os_str().to_owned();
    tmp_name.push(".exporting");
    let tmp = std::path::PathBuf::from(tmp_name);

    let file = File::create(&tmp)
        .with_context(|| format!("failed to create output file {}", tmp.to_string_lossy()))?;
    let mut writer = BufWriter::new(file);
    write_xlsx(&mut writer, EXPORT_SHEET_NAME, &rows, &[AGE_COLUMN])?;
    writer.flush().context("failed to flush workbook")?;
    drop(writer);

    std::fs::rename(&tmp, out_path).with_context(|| {
        format!(
            "failed to move workbook to {}",
            out_path.to_string_lossy()
        )
    })?;

    Ok(ExportSummary {
        row_count: records.len(),
        sheet_name: EXPORT_SHEET_NAME.to_string(),
    })
}
