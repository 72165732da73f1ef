use crate::error::{FlavpError, Result};
use crate::ingestion::{CellValue, WorkbookReader};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use log::{debug, info};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

/// A spreadsheet file loaded fully into memory through calamine.
pub struct XlsxWorkbook {
    sheet_names: Vec<String>,
    ranges: HashMap<String, Range<Data>>,
}

impl XlsxWorkbook {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let workbook = open_workbook_auto(path).map_err(|e| {
            FlavpError::Workbook(format!("failed to open {}: {}", path.display(), e))
        })?;
        info!("Opened workbook {}", path.display());
        Self::load(workbook)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        Self::load(workbook)
    }

    fn load<RS: Read + Seek>(mut workbook: Sheets<RS>) -> Result<Self> {
        let sheet_names = workbook.sheet_names();
        let mut ranges = HashMap::with_capacity(sheet_names.len());

        for name in &sheet_names {
            let range = workbook.worksheet_range(name).map_err(|e| {
                FlavpError::Workbook(format!("failed to read sheet '{}': {}", name, e))
            })?;
            debug!("Loaded sheet '{}' ({:?})", name, range.get_size());
            ranges.insert(name.clone(), range);
        }

        Ok(Self {
            sheet_names,
            ranges,
        })
    }
}

impl WorkbookReader for XlsxWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheet_names.clone()
    }

    fn has_sheet(&self, name: &str) -> bool {
        self.ranges.contains_key(name)
    }

    fn get_cell(&self, sheet: &str, addr: &str) -> Option<CellValue> {
        let position = parse_a1(addr)?;
        let data = self.ranges.get(sheet)?.get_value(position)?;
        to_cell_value(data)
    }
}

/// Converts an A1 address into an absolute zero-based `(row, column)`.
pub fn parse_a1(addr: &str) -> Option<(u32, u32)> {
    let addr = addr.trim();
    let split = addr.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = addr.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        let value = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        col = col.checked_mul(26)?.checked_add(value)?;
    }

    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

fn to_cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) if dt.is_datetime() => dt.as_datetime().map(CellValue::DateTime),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(_) | Data::Empty => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{ExcelDateTime, ExcelDateTimeType};
    use chrono::NaiveDate;

    #[test]
    fn test_parse_a1() {
        assert_eq!(parse_a1("A1"), Some((0, 0)));
        assert_eq!(parse_a1("B16"), Some((15, 1)));
        assert_eq!(parse_a1("P20"), Some((19, 15)));
        assert_eq!(parse_a1("AA3"), Some((2, 26)));
        assert_eq!(parse_a1("n23"), Some((22, 13)));
        assert_eq!(parse_a1("A0"), None);
        assert_eq!(parse_a1("12"), None);
        assert_eq!(parse_a1("B"), None);
        assert_eq!(parse_a1("B2C"), None);
    }

    #[test]
    fn test_data_conversion() {
        assert_eq!(
            to_cell_value(&Data::String("Viajando".into())),
            Some(CellValue::Text("Viajando".into()))
        );
        assert_eq!(to_cell_value(&Data::Int(4)), Some(CellValue::Number(4.0)));
        assert_eq!(to_cell_value(&Data::Float(0.0291)), Some(CellValue::Number(0.0291)));
        assert_eq!(to_cell_value(&Data::Empty), None);
    }

    #[test]
    fn test_date_cells_honour_the_workbook_date_system() {
        let date = |serial, is_1904| {
            to_cell_value(&Data::DateTime(ExcelDateTime::new(
                serial,
                ExcelDateTimeType::DateTime,
                is_1904,
            )))
        };
        let midnight = |y, m, d| {
            NaiveDate::from_ymd_opt(y, m, d)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(CellValue::DateTime)
        };

        assert_eq!(date(45292.0, false), midnight(2024, 1, 1));
        assert_eq!(date(0.0, true), midnight(1904, 1, 1));
        assert_eq!(date(43830.0, true), midnight(2024, 1, 1));

        let duration = ExcelDateTime::new(1.5, ExcelDateTimeType::TimeDelta, false);
        assert_eq!(
            to_cell_value(&Data::DateTime(duration)),
            Some(CellValue::Number(1.5))
        );
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let result = XlsxWorkbook::from_bytes(b"definitely not a workbook".to_vec());
        assert!(result.is_err());
    }

    #[test]
    fn test_range_lookup_uses_absolute_positions() {
        let mut range: Range<Data> = Range::new((3, 1), (5, 2));
        range.set_value((4, 2), Data::Float(12.5));

        let workbook = XlsxWorkbook {
            sheet_names: vec!["FL-AV-P-001".to_string()],
            ranges: HashMap::from([("FL-AV-P-001".to_string(), range)]),
        };

        assert_eq!(workbook.get_cell("FL-AV-P-001", "C5"), Some(CellValue::Number(12.5)));
        assert_eq!(workbook.get_cell("FL-AV-P-001", "A1"), None);
        assert_eq!(workbook.get_cell("FL-AV-P-001", "C4"), None);
        assert_eq!(workbook.get_cell("Other", "C5"), None);
        assert!(workbook.has_sheet("FL-AV-P-001"));
    }
}
