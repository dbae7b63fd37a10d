//! A plain header-plus-rows table: the shape every file format is read into
//! and written from.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Infers a cell from raw text: blank → `Empty`, numeric → `Number`.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    /// Numeric view of the cell. Text is parsed after stripping thousands
    /// separators, so `"1,234"` reads as 1234.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Number(_) | CellValue::Empty => None,
            CellValue::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => format!("{}", n),
            CellValue::Text(s) => s.trim().to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Number(n) => n.is_nan(),
            CellValue::Text(s) => {
                let t = s.trim();
                t.is_empty() || t.eq_ignore_ascii_case("nan")
            }
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map(CellValue::Number).unwrap_or(CellValue::Empty)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map(CellValue::Text).unwrap_or(CellValue::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn with_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        Self::new(headers.iter().map(|h| h.as_ref().to_string()).collect())
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.headers.len(), CellValue::Empty);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Case-insensitive exact header lookup (surrounding whitespace ignored).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    }

    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(EMPTY)
    }

    pub fn trim_headers(&mut self) {
        for header in &mut self.headers {
            *header = header.trim().to_string();
        }
    }

    /// Sets `name` to `value` on every row, adding the column if needed.
    pub fn set_constant_column(&mut self, name: &str, value: CellValue) {
        let index = match self.column_index(name) {
            Some(index) => index,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.resize(self.headers.len() - 1, CellValue::Empty);
                    row.push(CellValue::Empty);
                }
                self.headers.len() - 1
            }
        };

        for row in &mut self.rows {
            row[index] = value.clone();
        }
    }

    /// Concatenates tables by header name. Columns missing from a table are
    /// left empty on its rows; header order is first-seen order.
    ///
    /// A header repeated within one table stays a separate column: the n-th
    /// `JAN` of every table lines up with the n-th `JAN` of the result.
    pub fn concat(tables: Vec<RawTable>) -> RawTable {
        let mut columns: Vec<(String, usize)> = Vec::new();
        for table in &tables {
            for key in occurrence_keys(&table.headers) {
                if !columns.contains(&key) {
                    if key.1 > 0 {
                        warn!("Header '{}' appears more than once; keeping each copy", key.0);
                    }
                    columns.push(key);
                }
            }
        }

        let mut combined = RawTable::new(columns.iter().map(|(h, _)| h.clone()).collect());
        for table in tables {
            let mapping: Vec<Option<usize>> = occurrence_keys(&table.headers)
                .iter()
                .map(|key| columns.iter().position(|c| c == key))
                .collect();

            for row in table.rows {
                let mut out = vec![CellValue::Empty; combined.width()];
                for (source, cell) in row.into_iter().enumerate() {
                    if let Some(Some(target)) = mapping.get(source) {
                        out[*target] = cell;
                    }
                }
                combined.rows.push(out);
            }
        }

        combined
    }
}

/// Pairs each header with how many times it appeared before it.
fn occurrence_keys(headers: &[String]) -> Vec<(String, usize)> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    headers
        .iter()
        .map(|header| {
            let count = seen.entry(header.as_str()).or_insert(0);
            let key = (header.clone(), *count);
            *count += 1;
            key
        })
        .collect()
}
