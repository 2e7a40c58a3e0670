//! XLSX Export Module
//! Writes summary tables as a minimal SpreadsheetML workbook.
//!
//! Uses direct ZIP/XML generation; cells are written as inline strings or
//! numbers so no shared-string table or stylesheet is needed.

use crate::data::Field;
use crate::stats::MergedRow;
use log::info;
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Default name of the merged-table download.
pub const DEFAULT_EXPORT_FILE: &str = "EC_온도_생중량_분석결과.xlsx";

/// Characters Excel refuses in sheet names.
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
const MAX_SHEET_NAME_CHARS: usize = 31;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Invalid sheet name '{0}'")]
    InvalidSheetName(String),
    #[error("Workbook has no sheets")]
    Empty,
}

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    /// NaN is written as an empty cell.
    Number(f64),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

#[derive(Debug, Clone)]
struct Sheet {
    name: String,
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Builder for a workbook of header + rows sheets.
#[derive(Debug, Clone, Default)]
pub struct WorkbookWriter {
    sheets: Vec<Sheet>,
}

impl WorkbookWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet. Sheet order in the file follows call order.
    pub fn add_sheet(
        &mut self,
        name: &str,
        header: &[&str],
        rows: Vec<Vec<Cell>>,
    ) -> Result<&mut Self, ExportError> {
        let valid = !name.trim().is_empty()
            && name.chars().count() <= MAX_SHEET_NAME_CHARS
            && !name.contains(&FORBIDDEN_SHEET_CHARS[..])
            && !self.sheets.iter().any(|s| s.name == name);
        if !valid {
            return Err(ExportError::InvalidSheetName(name.to_string()));
        }

        self.sheets.push(Sheet {
            name: name.to_string(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows,
        });
        Ok(self)
    }

    pub fn write_to_path(&self, output_path: &Path) -> Result<(), ExportError> {
        let file = File::create(output_path)?;
        self.write(file)?;
        info!(
            "XLSX written: {} ({} sheets)",
            output_path.display(),
            self.sheets.len()
        );
        Ok(())
    }

    /// The workbook as bytes, for in-memory downloads.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ExportError> {
        let cursor = self.write(Cursor::new(Vec::new()))?;
        Ok(cursor.into_inner())
    }

    fn write<W: Write + Seek>(&self, sink: W) -> Result<W, ExportError> {
        if self.sheets.is_empty() {
            return Err(ExportError::Empty);
        }
        let mut zip = ZipWriter::new(sink);
        let options = FileOptions::default();
        let sheet_count = self.sheets.len();

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(Self::content_types_xml(sheet_count).as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(Self::rels_xml().as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(self.workbook_xml().as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(Self::workbook_rels_xml(sheet_count).as_bytes())?;

        for (idx, sheet) in self.sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", idx + 1), options)?;
            zip.write_all(Self::sheet_xml(sheet).as_bytes())?;
        }

        Ok(zip.finish()?)
    }

    fn content_types_xml(sheet_count: usize) -> String {
        let mut xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
"#
        .to_string();

        for i in 1..=sheet_count {
            xml.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i
            ));
            xml.push('\n');
        }
        xml.push_str("</Types>");
        xml
    }

    fn rels_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
    }

    fn workbook_xml(&self) -> String {
        let sheets: String = self
            .sheets
            .iter()
            .enumerate()
            .map(|(idx, sheet)| {
                format!(
                    r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                    escape_xml(&sheet.name),
                    idx + 1,
                    idx + 1
                )
            })
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>{}</sheets>
</workbook>"#,
            sheets
        )
    }

    fn workbook_rels_xml(sheet_count: usize) -> String {
        let mut xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#
        .to_string();

        for i in 1..=sheet_count {
            xml.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i, i
            ));
            xml.push('\n');
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn sheet_xml(sheet: &Sheet) -> String {
        let mut rows = String::new();
        let header: Vec<Cell> = sheet.header.iter().map(|h| Cell::Text(h.clone())).collect();

        for (row_idx, cells) in std::iter::once(&header).chain(sheet.rows.iter()).enumerate() {
            let row_num = row_idx + 1;
            rows.push_str(&format!(r#"<row r="{}">"#, row_num));
            for (col_idx, cell) in cells.iter().enumerate() {
                let reference = format!("{}{}", column_letters(col_idx), row_num);
                match cell {
                    Cell::Text(text) => rows.push_str(&format!(
                        r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        reference,
                        escape_xml(text)
                    )),
                    Cell::Number(value) if value.is_finite() => rows.push_str(&format!(
                        r#"<c r="{}"><v>{}</v></c>"#,
                        reference, value
                    )),
                    Cell::Number(_) => {}
                }
            }
            rows.push_str("</row>");
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>{}</sheetData>
</worksheet>"#,
            rows
        )
    }
}

/// Spreadsheet column name for a zero-based index (0 -> A, 26 -> AA).
pub fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Workbook with the merged table on one sheet: school then the requested fields.
pub fn merged_workbook(rows: &[MergedRow], fields: &[Field]) -> Result<WorkbookWriter, ExportError> {
    let mut header = vec!["school"];
    header.extend(fields.iter().map(|f| f.key()));

    let body = rows
        .iter()
        .map(|row| {
            let mut cells = vec![Cell::from(row.school.as_str())];
            cells.extend(
                fields
                    .iter()
                    .map(|f| Cell::Number(row.means.get(f).copied().unwrap_or(f64::NAN))),
            );
            cells
        })
        .collect();

    let mut writer = WorkbookWriter::new();
    writer.add_sheet("Sheet1", &header, body)?;
    Ok(writer)
}

/// Write the merged table to `output_path`.
pub fn export_merged(
    rows: &[MergedRow],
    fields: &[Field],
    output_path: &Path,
) -> Result<(), ExportError> {
    merged_workbook(rows, fields)?.write_to_path(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_roll_over() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn sheet_names_are_validated() {
        let mut writer = WorkbookWriter::new();
        assert!(writer.add_sheet("송도고", &["a"], Vec::new()).is_ok());
        assert!(matches!(
            writer.add_sheet("송도고", &["a"], Vec::new()),
            Err(ExportError::InvalidSheetName(_))
        ));
        assert!(writer.add_sheet("a/b", &["a"], Vec::new()).is_err());
        assert!(writer.add_sheet("", &["a"], Vec::new()).is_err());
    }

    #[test]
    fn nan_cells_are_left_empty() {
        let sheet = Sheet {
            name: "s".into(),
            header: vec!["school".into(), "weight".into()],
            rows: vec![vec![Cell::from("A&B"), Cell::Number(f64::NAN)]],
        };
        let xml = WorkbookWriter::sheet_xml(&sheet);
        assert!(xml.contains("A&amp;B"));
        assert!(!xml.contains(r#"r="B2""#));
        assert!(xml.contains(r#"r="B1""#));
    }

    #[test]
    fn empty_workbook_is_rejected() {
        assert!(matches!(
            WorkbookWriter::new().to_bytes(),
            Err(ExportError::Empty)
        ));
    }
}
