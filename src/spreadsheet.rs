//! Minimal single-sheet XLSX support: enough to hand the roster to a
//! spreadsheet program and to read back what it saves.
//!
//! Writing produces inline-string cells (numbers for the columns the caller
//! marks numeric). Reading understands shared strings, inline strings and
//! plain values on the first worksheet; styles, formulas and dates stored as
//! numbers are returned as their raw cell text.

use anyhow::{anyhow, Context};
use std::io::{Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == ZIP_SIGNATURE
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
pub fn column_name(mut index: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Last column a worksheet can hold (`XFD`).
const MAX_COLUMN: usize = 16_383;

/// Zero-based column of a cell reference like `AB12`. `None` when the
/// reference has no letters.
fn column_index(cell_ref: &str) -> anyhow::Result<Option<usize>> {
    let letters: Vec<u8> = cell_ref
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return Ok(None);
    }
    let mut n = 0usize;
    for b in letters {
        n = n
            .checked_mul(26)
            .and_then(|v| v.checked_add((b - b'A' + 1) as usize))
            .filter(|v| *v <= MAX_COLUMN + 1)
            .ok_or_else(|| anyhow!("cell reference {:?} is past column XFD", cell_ref))?;
    }
    Ok(Some(n - 1))
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // not representable in XML 1.0
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

fn unescape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            e if e.starts_with("#x") || e.starts_with("#X") => {
                u32::from_str_radix(&e[2..], 16).ok().and_then(char::from_u32)
            }
            e if e.starts_with('#') => e[1..].parse::<u32>().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn sheet_xml(rows: &[Vec<String>], numeric_columns: &[usize]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        let row_no = r + 1;
        xml.push_str(&format!("<row r=\"{}\">", row_no));
        for (c, value) in row.iter().enumerate() {
            let cell_ref = format!("{}{}", column_name(c), row_no);
            // header row stays text
            let numeric = r > 0 && numeric_columns.contains(&c) && value.trim().parse::<f64>().is_ok();
            if numeric {
                xml.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", cell_ref, value.trim()));
            } else {
                xml.push_str(&format!(
                    "<c r=\"{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                    cell_ref,
                    escape_xml(value)
                ));
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Write `rows` (header first) as a one-sheet workbook.
pub fn write_xlsx<W: Write + Seek>(
    out: W,
    sheet_name: &str,
    rows: &[Vec<String>],
    numeric_columns: &[usize],
) -> anyhow::Result<()> {
    let mut zip = ZipWriter::new(out);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape_xml(sheet_name)
    );

    let parts: [(&str, String); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(rows, numeric_columns)),
    ];
    for (name, body) in parts {
        zip.start_file(name, opts)
            .with_context(|| format!("failed to start {}", name))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write {}", name))?;
    }
    zip.finish().context("failed to finalize workbook")?;
    Ok(())
}

struct Element<'x> {
    attrs: &'x str,
    inner: &'x str,
}

/// Non-nested elements called `name`, in document order.
fn elements<'x>(xml: &'x str, name: &str) -> Vec<Element<'x>> {
    let open = format!("<{}", name);
    let close = format!("</{}>", name);
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some(rel) = xml[pos..].find(&open) {
        let after = pos + rel + open.len();
        let boundary = xml[after..].chars().next();
        if !matches!(boundary, Some(c) if c == '>' || c == '/' || c.is_whitespace()) {
            pos = after;
            continue;
        }
        let Some(gt) = xml[after..].find('>') else {
            break;
        };
        let tag_end = after + gt;
        let attrs = &xml[after..tag_end];
        if attrs.ends_with('/') {
            out.push(Element {
                attrs: attrs.trim_end_matches('/'),
                inner: "",
            });
            pos = tag_end + 1;
            continue;
        }
        let body = tag_end + 1;
        let Some(end) = xml[body..].find(&close) else {
            break;
        };
        out.push(Element {
            attrs,
            inner: &xml[body..body + end],
        });
        pos = body + end + close.len();
    }
    out
}

fn attr(attrs: &str, name: &str) -> Option<String> {
    for quote in ['"', '\''] {
        for lead in [' ', '\t', '\n', '\r'] {
            let needle = format!("{}{}={}", lead, name, quote);
            if let Some(i) = attrs.find(&needle) {
                let start = i + needle.len();
                let end = attrs[start..].find(quote)?;
                return Some(unescape_xml(&attrs[start..start + end]));
            }
        }
    }
    None
}

/// Text of a rich or plain string item, skipping phonetic runs.
fn string_item_text(inner: &str) -> String {
    let mut cleaned = String::with_capacity(inner.len());
    let mut rest = inner;
    while let Some(i) = rest.find("<rPh") {
        cleaned.push_str(&rest[..i]);
        match rest[i..].find("</rPh>") {
            Some(j) => rest = &rest[i + j + "</rPh>".len()..],
            None => {
                rest = "";
            }
        }
    }
    cleaned.push_str(rest);
    elements(&cleaned, "t")
        .iter()
        .map(|t| unescape_xml(t.inner))
        .collect()
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<String> {
    let mut f = archive.by_name(name).ok()?;
    let mut text = String::new();
    f.read_to_string(&mut text).ok()?;
    Some(text)
}

/// Path of the first worksheet, following workbook relationships when they
/// are present.
fn first_sheet_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> String {
    let fallback = "xl/worksheets/sheet1.xml".to_string();
    let Some(workbook) = read_entry(archive, "xl/workbook.xml") else {
        return fallback;
    };
    let Some(rid) = elements(&workbook, "sheet")
        .first()
        .and_then(|s| attr(s.attrs, "r:id"))
    else {
        return fallback;
    };
    let Some(rels) = read_entry(archive, "xl/_rels/workbook.xml.rels") else {
        return fallback;
    };
    elements(&rels, "Relationship")
        .iter()
        .find(|r| attr(r.attrs, "Id").as_deref() == Some(rid.as_str()))
        .and_then(|r| attr(r.attrs, "Target"))
        .map(|target| match target.strip_prefix('/') {
            Some(abs) => abs.to_string(),
            None => format!("xl/{}", target),
        })
        .unwrap_or(fallback)
}

/// Rows of the first worksheet as text. Gaps between cells are filled with
/// empty strings; rows with no text at all are dropped.
pub fn read_xlsx<R: Read + Seek>(input: R) -> anyhow::Result<Vec<Vec<String>>> {
    let mut archive = ZipArchive::new(input).context("not a valid xlsx (zip) file")?;

    let shared: Vec<String> = read_entry(&mut archive, "xl/sharedStrings.xml")
        .map(|xml| {
            elements(&xml, "si")
                .iter()
                .map(|si| string_item_text(si.inner))
                .collect()
        })
        .unwrap_or_default();

    let sheet_path = first_sheet_path(&mut archive);
    let sheet = read_entry(&mut archive, &sheet_path)
        .ok_or_else(|| anyhow!("workbook has no readable worksheet at {}", sheet_path))?;

    let mut rows = Vec::new();
    for row in elements(&sheet, "row") {
        let mut cells: Vec<String> = Vec::new();
        for cell in elements(row.inner, "c") {
            let col = match attr(cell.attrs, "r") {
                Some(r) => column_index(&r)?.unwrap_or(cells.len()),
                None => cells.len(),
            };
            let kind = attr(cell.attrs, "t").unwrap_or_default();
            let value = match kind.as_str() {
                "inlineStr" => elements(cell.inner, "is")
                    .first()
                    .map(|is| string_item_text(is.inner))
                    .unwrap_or_default(),
                "s" => {
                    let raw = elements(cell.inner, "v")
                        .first()
                        .map(|v| v.inner.trim().to_string())
                        .unwrap_or_default();
                    let idx: usize = raw
                        .parse()
                        .with_context(|| format!("bad shared string index {:?}", raw))?;
                    shared
                        .get(idx)
                        .cloned()
                        .ok_or_else(|| anyhow!("shared string {} out of range", idx))?
                }
                _ => elements(cell.inner, "v")
                    .first()
                    .map(|v| unescape_xml(v.inner))
                    .unwrap_or_default(),
            };
            if cells.len() <= col {
                cells.resize(col + 1, String::new());
            }
            cells[col] = value;
        }
        if cells.iter().any(|c| !c.is_empty()) {
            rows.push(cells);
        }
    }
    Ok(rows)
}
