//! Combines a directory of per-vehicle-type monthly exports into one table.
//!
//! Export files carry no vehicle type, year or month column of their own;
//! those are read from the file name (`2W_Jan_2024.xlsx`, `4w-report-mar-2023.csv`).

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::io::read_table;
use crate::schema::{COL_MONTH, COL_SERIAL, COL_VEHICLE_TYPE, COL_YEAR};
use crate::table::{CellValue, RawTable};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use std::path::{Path, PathBuf};

pub const UNKNOWN_VEHICLE_TYPE: &str = "Unknown";

const VEHICLE_TYPES: [&str; 3] = ["2W", "3W", "4W"];

lazy_static! {
    static ref YEAR_PATTERN: Regex = Regex::new(r"20\d{2}").unwrap();
    static ref MONTH_PATTERN: Regex = Regex::new(
        r"(?i)^(jan(uary)?|feb(ruary)?|mar(ch)?|apr(il)?|may|june?|july?|aug(ust)?|sep(t(ember)?)?|oct(ober)?|nov(ember)?|dec(ember)?)$"
    )
    .unwrap();
}

/// What the file name says about its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    pub vehicle_type: String,
    pub year: Option<i32>,
    /// Three-letter abbreviation as written in the file name.
    pub month: Option<String>,
}

impl FileContext {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            vehicle_type: detect_vehicle_type(&name),
            year: detect_year(&name),
            month: detect_month(&name),
        }
    }
}

pub fn detect_vehicle_type(file_name: &str) -> String {
    let upper = file_name.to_uppercase();
    VEHICLE_TYPES
        .iter()
        .find(|vt| upper.contains(*vt))
        .map(|vt| vt.to_string())
        .unwrap_or_else(|| UNKNOWN_VEHICLE_TYPE.to_string())
}

pub fn detect_year(file_name: &str) -> Option<i32> {
    YEAR_PATTERN
        .find(file_name)
        .and_then(|m| m.as_str().parse().ok())
}

/// Month abbreviation (`Jan`..`Dec`) named by a whole word of the file name.
///
/// Words are runs of letters, so `Summary_Nov_2023` yields `Nov` and not the
/// `mar` inside `Summary`. When several months appear the first one wins.
pub fn detect_month(file_name: &str) -> Option<String> {
    let months: Vec<String> = file_name
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| MONTH_PATTERN.is_match(word))
        .map(month_abbreviation)
        .collect();

    if let Some(other) = months.iter().skip(1).find(|m| **m != months[0]) {
        warn!(
            "File name '{}' names more than one month ({} and {}); using {}",
            file_name, months[0], other, months[0]
        );
    }

    months.into_iter().next()
}

fn month_abbreviation(word: &str) -> String {
    let mut chars = word.chars().take(3);
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Files in `dir` whose extension is one of `extensions`, in sorted order.
pub fn discover_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);

        if matches {
            files.push(path);
        }
    }

    files.sort();
    debug!("Discovered {} input files in {}", files.len(), dir.display());
    Ok(files)
}

/// Reads one file and appends the columns detected from its name. Columns
/// the file already carries are kept as they are.
pub fn read_with_context(path: &Path) -> Result<RawTable> {
    let mut table = read_table(path)?;
    table.trim_headers();

    let context = FileContext::from_path(path);
    if table.column_index(COL_VEHICLE_TYPE).is_none() {
        if context.vehicle_type == UNKNOWN_VEHICLE_TYPE {
            warn!("No vehicle type in file name {}", path.display());
        }
        table.set_constant_column(COL_VEHICLE_TYPE, CellValue::from(context.vehicle_type));
    }
    if table.column_index(COL_YEAR).is_none() {
        table.set_constant_column(COL_YEAR, context.year.map(CellValue::from).unwrap_or_default());
    }
    if table.column_index(COL_MONTH).is_none() {
        table.set_constant_column(COL_MONTH, CellValue::from(context.month));
    }

    Ok(table)
}

/// Reads every matching file under `dir` and concatenates them by header.
///
/// The serial column, when present, is renumbered over the result.
/// A directory with no matching files yields an empty table.
pub fn combine_directory(
    dir: &Path,
    extensions: &[String],
    diagnostics: &mut Diagnostics,
) -> Result<RawTable> {
    let files = discover_files(dir, extensions)?;
    if files.is_empty() {
        warn!("No input files found in {}", dir.display());
        return Ok(RawTable::default());
    }

    let mut tables = Vec::with_capacity(files.len());
    for path in &files {
        let table = read_with_context(path)?;
        debug!("{}: {} rows", path.display(), table.len());
        diagnostics.rows_read += table.len();
        tables.push(table);
    }
    diagnostics.files_read += files.len();

    let mut combined = RawTable::concat(tables);
    renumber_serial(&mut combined);

    info!(
        "Combined {} files into {} rows x {} columns",
        files.len(),
        combined.len(),
        combined.width()
    );
    Ok(combined)
}

/// Numeric serials become 1..n in row order. Non-numeric markers (`Total`,
/// banner text) are left in place for cleaning to drop.
fn renumber_serial(table: &mut RawTable) {
    let Some(idx) = table.column_index(COL_SERIAL) else {
        return;
    };

    let mut next = 1.0;
    for row in &mut table.rows {
        if row[idx].as_f64().is_some() {
            row[idx] = CellValue::Number(next);
            next += 1.0;
        }
    }
}
