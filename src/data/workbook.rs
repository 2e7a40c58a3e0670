//! Growth workbook reader (one sheet per school).

use super::loader::LoaderError;
use super::matcher::nfc;
use super::model::{GrowthRecord, SchoolTable};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use log::debug;
use std::path::Path;

pub const WEIGHT_COLUMN: &str = "생중량(g)";
pub const LEAF_COUNT_COLUMN: &str = "잎 수(장)";
pub const SHOOT_LENGTH_COLUMN: &str = "지상부 길이(mm)";

/// Read every sheet of the growth workbook, keyed by sheet name in sheet order.
///
/// Sheet names become school names in NFC, whatever form the workbook stored.
pub fn read_growth_workbook(path: &Path) -> Result<SchoolTable<Vec<GrowthRecord>>, LoaderError> {
    let file = path.display().to_string();
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|source| LoaderError::Workbook {
        file: file.clone(),
        source,
    })?;

    let mut growth = SchoolTable::new();
    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| LoaderError::MissingSheet {
                sheet: sheet.clone(),
                file: file.clone(),
                reason: e.to_string(),
            })?;
        let school = nfc(&sheet);
        let records = parse_growth_sheet(&range, &school, &file)?;
        debug!("{}: {} growth records", school, records.len());
        growth.insert(school, records);
    }

    if growth.is_empty() {
        return Err(LoaderError::MissingSheet {
            sheet: String::new(),
            file,
            reason: "workbook has no sheets".to_string(),
        });
    }
    Ok(growth)
}

/// Parse one sheet. The first row is the header; fully blank rows are skipped.
fn parse_growth_sheet(
    range: &Range<Data>,
    school: &str,
    file: &str,
) -> Result<Vec<GrowthRecord>, LoaderError> {
    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| LoaderError::MissingSheet {
        sheet: school.to_string(),
        file: file.to_string(),
        reason: "sheet is empty".to_string(),
    })?;

    let source_name = format!("{file} [{school}]");
    let weight = column_index(header, WEIGHT_COLUMN, &source_name)?;
    let leaves = column_index(header, LEAF_COUNT_COLUMN, &source_name)?;
    let shoot = column_index(header, SHOOT_LENGTH_COLUMN, &source_name)?;

    let records = rows
        .filter(|row| !row.iter().all(|c| matches!(c, Data::Empty)))
        .map(|row| GrowthRecord {
            school: school.to_string(),
            weight: row.get(weight).map_or(f64::NAN, cell_f64),
            leaf_count: row.get(leaves).map_or(f64::NAN, cell_f64),
            shoot_length: row.get(shoot).map_or(f64::NAN, cell_f64),
        })
        .collect();

    Ok(records)
}

fn column_index(header: &[Data], wanted: &str, source_name: &str) -> Result<usize, LoaderError> {
    let wanted = nfc(wanted);
    header
        .iter()
        .position(|cell| match cell {
            Data::String(name) => nfc(name.trim()) == wanted,
            _ => false,
        })
        .ok_or_else(|| LoaderError::Schema {
            source_name: source_name.to_string(),
            column: wanted,
        })
}

fn cell_f64(cell: &Data) -> f64 {
    match cell {
        Data::Float(v) => *v,
        Data::Int(v) => *v as f64,
        Data::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_cells_convert_and_blanks_are_missing() {
        assert_eq!(cell_f64(&Data::Float(1.5)), 1.5);
        assert_eq!(cell_f64(&Data::Int(7)), 7.0);
        assert_eq!(cell_f64(&Data::String(" 3.25 ".into())), 3.25);
        assert!(cell_f64(&Data::Empty).is_nan());
        assert!(cell_f64(&Data::String("n/a".into())).is_nan());
    }

    #[test]
    fn header_lookup_ignores_surrounding_space() {
        let header = vec![
            Data::String("개체번호".into()),
            Data::String(" 생중량(g) ".into()),
        ];
        assert_eq!(column_index(&header, WEIGHT_COLUMN, "t").unwrap(), 1);
        assert!(matches!(
            column_index(&header, LEAF_COUNT_COLUMN, "t"),
            Err(LoaderError::Schema { .. })
        ));
    }
}
