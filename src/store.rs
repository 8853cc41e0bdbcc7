use crate::error::StoreError;
use crate::records::TabularRow;
use crate::tabular::{csv_line, map_columns, parse_csv, project};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Row storage as the services see it. The CSV implementation below is the
/// only one shipped; anything transactional can slot in behind this.
pub trait TableStore<R: TabularRow> {
    /// All rows in file order.
    fn read(&self) -> Result<Vec<R>, StoreError>;
    /// Replace every row.
    fn overwrite(&self, rows: &[R]) -> Result<(), StoreError>;
    fn append(&self, row: &R) -> Result<(), StoreError>;
    /// Opaque token that changes whenever the stored content changes.
    fn revision(&self) -> Result<String, StoreError>;
    /// Rows that convert, each with its zero-based position, plus the errors
    /// for rows that do not. A bad header still fails the whole read.
    fn read_lenient(&self) -> Result<(Vec<(usize, R)>, Vec<StoreError>), StoreError> {
        Ok((self.read()?.into_iter().enumerate().collect(), Vec::new()))
    }
}

/// A CSV file with a fixed set of named columns.
///
/// Columns are matched by header name when reading, so hand-edited files with
/// reordered or extra columns still load. Writes always use the canonical
/// order. No locking: a single writer is assumed.
#[derive(Debug, Clone)]
pub struct CsvTable<R> {
    path: PathBuf,
    columns: &'static [&'static str],
    _row: PhantomData<fn() -> R>,
}

impl<R: TabularRow> CsvTable<R> {
    pub fn new(path: impl Into<PathBuf>, columns: &'static [&'static str]) -> Self {
        Self {
            path: path.into(),
            columns,
            _row: PhantomData,
        }
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }

    /// Create the file with just its header when it does not exist yet.
    pub fn ensure(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        std::fs::write(&self.path, csv_line(self.columns))
            .map_err(|e| StoreError::io(&self.path, e))
    }

    fn read_text(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Convert parsed CSV records (header first) into rows.
    pub fn rows_from_records(&self, records: Vec<Vec<String>>) -> Result<Vec<R>, StoreError> {
        let table = self.name();
        let mut it = records.into_iter();
        let Some(header) = it.next() else {
            return Ok(Vec::new());
        };
        let idx = map_columns(&table, &header, self.columns)?;
        it.enumerate()
            .map(|(i, rec)| R::from_fields(&table, i + 1, project(&rec, &idx)))
            .collect()
    }

    fn render(&self, rows: &[R]) -> String {
        let mut out = csv_line(self.columns);
        for r in rows {
            out.push_str(&csv_line(&r.to_fields()));
        }
        out
    }

    /// Header in canonical order with nothing extra, so appending a line in
    /// canonical order keeps the file consistent.
    fn header_is_canonical(&self, text: &str) -> Result<bool, StoreError> {
        let Some(header) = parse_csv(text).into_iter().next() else {
            return Ok(false);
        };
        let idx = map_columns(&self.name(), &header, self.columns)?;
        Ok(header.len() == self.columns.len() && idx.iter().enumerate().all(|(i, &j)| i == j))
    }
}

impl<R: TabularRow> TableStore<R> for CsvTable<R> {
    fn read(&self) -> Result<Vec<R>, StoreError> {
        match self.read_text()? {
            Some(text) => self.rows_from_records(parse_csv(&text)),
            None => Ok(Vec::new()),
        }
    }

    /// Written to a sibling temp file first and renamed over the original, so
    /// a crash mid-write leaves the previous contents intact.
    fn overwrite(&self, rows: &[R]) -> Result<(), StoreError> {
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".writing");
        let tmp = PathBuf::from(tmp_name);

        let mut f = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        f.write_all(self.render(rows).as_bytes())
            .and_then(|_| f.sync_all())
            .map_err(|e| StoreError::io(&tmp, e))?;
        drop(f);

        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            StoreError::io(&self.path, e)
        })
    }

    fn append(&self, row: &R) -> Result<(), StoreError> {
        let text = self.read_text()?.unwrap_or_default();
        if text.trim().is_empty() {
            return self.overwrite(std::slice::from_ref(row));
        }
        if !self.header_is_canonical(&text)? {
            let mut rows = self.rows_from_records(parse_csv(&text))?;
            rows.push(row.clone());
            return self.overwrite(&rows);
        }

        let mut line = String::new();
        if !text.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(&csv_line(&row.to_fields()));

        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        f.write_all(line.as_bytes())
            .map_err(|e| StoreError::io(&self.path, e))
    }

    fn revision(&self) -> Result<String, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    fn read_lenient(&self) -> Result<(Vec<(usize, R)>, Vec<StoreError>), StoreError> {
        let Some(text) = self.read_text()? else {
            return Ok((Vec::new(), Vec::new()));
        };
        let table = self.name();
        let mut it = parse_csv(&text).into_iter();
        let Some(header) = it.next() else {
            return Ok((Vec::new(), Vec::new()));
        };
        let idx = map_columns(&table, &header, self.columns)?;
        let mut rows = Vec::new();
        let mut skipped = Vec::new();
        for (i, rec) in it.enumerate() {
            match R::from_fields(&table, i + 1, project(&rec, &idx)) {
                Ok(r) => rows.push((i, r)),
                Err(e) => skipped.push(e),
            }
        }
        Ok((rows, skipped))
    }
}

/// In-memory table for exercising services without touching disk.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryTable<R> {
    rows: std::cell::RefCell<Vec<R>>,
    writes: std::cell::Cell<u64>,
}

#[cfg(test)]
impl<R: TabularRow> MemoryTable<R> {
    pub fn with_rows(rows: Vec<R>) -> Self {
        Self {
            rows: std::cell::RefCell::new(rows),
            writes: std::cell::Cell::new(0),
        }
    }
}

#[cfg(test)]
impl<R: TabularRow> TableStore<R> for MemoryTable<R> {
    fn read(&self) -> Result<Vec<R>, StoreError> {
        Ok(self.rows.borrow().clone())
    }

    fn overwrite(&self, rows: &[R]) -> Result<(), StoreError> {
        *self.rows.borrow_mut() = rows.to_vec();
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn append(&self, row: &R) -> Result<(), StoreError> {
        self.rows.borrow_mut().push(row.clone());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn revision(&self) -> Result<String, StoreError> {
        Ok(self.writes.get().to_string())
    }
}
