//! Reading and writing [`RawTable`]s as CSV, XLSX/XLS and JSON.
//!
//! The first row of every input sheet is the header row. Only the first
//! worksheet of a workbook is read unless a sheet name is given.

use crate::error::{GrowthMetricsError, Result};
use crate::table::{CellValue, RawTable};
use calamine::{open_workbook_auto, Data, Reader};
use log::debug;
use rust_xlsxwriter::Workbook;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
    Xls,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "xlsx" | "xlsm" => Ok(TableFormat::Xlsx),
            "xls" => Ok(TableFormat::Xls),
            _ => Err(GrowthMetricsError::UnsupportedFormat(format!(
                "'{}' (expected csv, xlsx or xls)",
                ext
            ))),
        }
    }
}

pub fn read_table(path: impl AsRef<Path>) -> Result<RawTable> {
    let path = path.as_ref();
    match TableFormat::from_path(path)? {
        TableFormat::Csv => read_csv(path),
        TableFormat::Xlsx | TableFormat::Xls => read_spreadsheet(path, None),
    }
}

/// Reads the named worksheet of a workbook; CSV files have no sheets and are
/// read whole.
pub fn read_table_with_sheet(path: impl AsRef<Path>, sheet_name: &str) -> Result<RawTable> {
    let path = path.as_ref();
    match TableFormat::from_path(path)? {
        TableFormat::Csv => read_csv(path),
        TableFormat::Xlsx | TableFormat::Xls => read_spreadsheet(path, Some(sheet_name)),
    }
}

pub fn read_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut table = RawTable::new(headers);

    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(CellValue::infer).collect());
    }

    debug!("Read {} rows from {}", table.len(), path.display());
    Ok(table)
}

/// Reads one worksheet (the first when `sheet_name` is `None`).
pub fn read_spreadsheet(path: &Path, sheet_name: Option<&str>) -> Result<RawTable> {
    let spreadsheet_error = |details: String| GrowthMetricsError::Spreadsheet {
        path: path.display().to_string(),
        details,
    };

    let mut workbook =
        open_workbook_auto(path).map_err(|e| spreadsheet_error(e.to_string()))?;

    let name = match sheet_name {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| spreadsheet_error("workbook contains no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| spreadsheet_error(format!("sheet '{}': {}", name, e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .enumerate()
            .map(|(idx, cell)| match data_to_cell_value(cell) {
                CellValue::Empty => format!("Unnamed: {}", idx),
                other => other.as_text(),
            })
            .collect(),
        None => Vec::new(),
    };

    let mut table = RawTable::new(headers);
    for row in rows {
        table.push_row(row.iter().map(data_to_cell_value).collect());
    }

    debug!(
        "Read {} rows from sheet '{}' of {}",
        table.len(),
        name,
        path.display()
    );
    Ok(table)
}

fn data_to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::String(s) => CellValue::infer(s),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

pub fn write_table(path: impl AsRef<Path>, table: &RawTable) -> Result<()> {
    write_table_with_sheet(path, "Sheet1", table)
}

/// Writes a table; `sheet_name` names the worksheet for XLSX output and is
/// ignored for CSV.
pub fn write_table_with_sheet(
    path: impl AsRef<Path>,
    sheet_name: &str,
    table: &RawTable,
) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    match TableFormat::from_path(path)? {
        TableFormat::Csv => write_csv(path, table),
        TableFormat::Xlsx => write_xlsx(path, sheet_name, table),
        TableFormat::Xls => Err(GrowthMetricsError::UnsupportedFormat(
            "xls (writing is only supported for csv and xlsx)".to_string(),
        )),
    }?;

    debug!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

fn write_csv(path: &Path, table: &RawTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.as_text()))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(path: &Path, sheet_name: &str, table: &RawTable) -> Result<()> {
    let xlsx_error = |details: String| GrowthMetricsError::Spreadsheet {
        path: path.display().to_string(),
        details,
    };

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sheet_name)
        .map_err(|e| xlsx_error(e.to_string()))?;

    for (col_idx, header) in table.headers.iter().enumerate() {
        let col = u16::try_from(col_idx).map_err(|_| xlsx_error("column index overflow".to_string()))?;
        worksheet
            .write_string(0, col, header)
            .map_err(|e| xlsx_error(e.to_string()))?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(row_idx + 1)
            .map_err(|_| xlsx_error("row index overflow".to_string()))?;

        for (col_idx, cell) in row.iter().enumerate() {
            let col = u16::try_from(col_idx)
                .map_err(|_| xlsx_error("column index overflow".to_string()))?;

            match cell {
                CellValue::Empty => {}
                CellValue::Number(n) if n.is_finite() => {
                    worksheet
                        .write_number(row_num, col, *n)
                        .map_err(|e| xlsx_error(e.to_string()))?;
                }
                CellValue::Number(_) => {}
                CellValue::Text(s) => {
                    worksheet
                        .write_string(row_num, col, s)
                        .map_err(|e| xlsx_error(e.to_string()))?;
                }
            }
        }
    }

    workbook.save(path).map_err(|e| xlsx_error(e.to_string()))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> RawTable {
        let mut table = RawTable::with_headers(&["S No", "Maker", "JAN", "FEB"]);
        table.push_row(vec![1.0.into(), "ACME".into(), 100.0.into(), CellValue::Empty]);
        table.push_row(vec![2.0.into(), "ZETA MOTORS".into(), 12.5.into(), 7.0.into()]);
        table
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(TableFormat::from_path(Path::new("a.CSV")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("a.xlsx")).unwrap(), TableFormat::Xlsx);
        assert_eq!(TableFormat::from_path(Path::new("a.xls")).unwrap(), TableFormat::Xls);
        assert!(matches!(
            TableFormat::from_path(Path::new("a.parquet")),
            Err(GrowthMetricsError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("table.csv");

        write_table(&path, &sample_table()).unwrap();
        let loaded = read_table(&path).unwrap();

        assert_eq!(loaded, sample_table());
    }

    #[test]
    fn test_xlsx_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.xlsx");

        write_table_with_sheet(&path, "Monthly_with_Growth", &sample_table()).unwrap();
        let loaded = read_table(&path).unwrap();

        assert_eq!(loaded.headers, sample_table().headers);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.cell(0, 1).as_text(), "ACME");
        assert_eq!(loaded.cell(0, 2).as_f64(), Some(100.0));
        assert!(loaded.cell(0, 3).is_blank());
        assert_eq!(loaded.cell(1, 3).as_f64(), Some(7.0));

        let named = read_table_with_sheet(&path, "Monthly_with_Growth").unwrap();
        assert_eq!(named, loaded);
        assert!(matches!(
            read_table_with_sheet(&path, "Quarterly_Growth"),
            Err(GrowthMetricsError::Spreadsheet { .. })
        ));
    }

    #[test]
    fn test_writing_xls_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_table(dir.path().join("t.xls"), &sample_table());
        assert!(matches!(result, Err(GrowthMetricsError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_json(&path, &serde_json::json!({ "total_records": 3 })).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("total_records"));
    }
}
