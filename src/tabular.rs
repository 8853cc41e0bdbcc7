//! Comma-separated text as the stores and imports see it.

use crate::error::StoreError;

/// Parse a whole CSV document into records.
///
/// Quoted fields may contain commas, doubled quotes and line breaks. A leading
/// UTF-8 BOM is dropped, `\r\n` and `\n` both end a record, and blank lines are
/// skipped.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    // true once the current record has any content, so blank lines vanish
    let mut touched = false;

    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    buf.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                buf.push(ch);
            }
            continue;
        }
        match ch {
            '"' => {
                in_quotes = true;
                touched = true;
            }
            ',' => {
                record.push(std::mem::take(&mut buf));
                touched = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                if touched {
                    record.push(std::mem::take(&mut buf));
                    records.push(std::mem::take(&mut record));
                }
                buf.clear();
                touched = false;
            }
            _ => {
                buf.push(ch);
                touched = true;
            }
        }
    }
    if touched {
        record.push(buf);
        records.push(record);
    }
    records
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// One CSV line, newline included.
pub fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_quote(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Key used to match header cells: trimmed, lowercased, inner whitespace
/// collapsed. `" Grade  /  Class"` and `"grade / class"` are the same column.
pub fn header_key(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// For each expected column, the index of the matching header cell.
///
/// Extra columns are ignored; when a column appears twice the first one wins.
pub fn map_columns(
    table: &str,
    header: &[String],
    expected: &[&str],
) -> Result<Vec<usize>, StoreError> {
    let keys: Vec<String> = header.iter().map(|h| header_key(h)).collect();
    expected
        .iter()
        .map(|col| {
            let want = header_key(col);
            keys.iter()
                .position(|k| *k == want)
                .ok_or_else(|| StoreError::MissingColumn {
                    table: table.to_string(),
                    column: col.to_string(),
                })
        })
        .collect()
}

/// Pick `indexes` out of `record` in order; short records read as empty
/// cells.
pub fn project(record: &[String], indexes: &[usize]) -> Vec<String> {
    indexes
        .iter()
        .map(|&i| record.get(i).cloned().unwrap_or_default())
        .collect()
}
