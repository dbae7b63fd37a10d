//! Wide (one column per month) ↔ long (one row per group and month) layouts.

use crate::diagnostics::Diagnostics;
use crate::period::{is_supported_year, parse_month_token, YearMonth, MONTH_COLUMN_PREFIX};
use crate::schema::{EntityGroup, Observation, COL_MAKER, COL_VEHICLE_CATEGORY, COL_VEHICLE_TYPE, COL_YEAR};
use crate::table::{CellValue, RawTable};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// One group's registrations for one month, plus the source row's
/// non-period columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub group: EntityGroup,
    pub period: YearMonth,
    pub registrations: f64,
    pub attributes: BTreeMap<String, CellValue>,
}

impl LongRecord {
    pub fn new(group: EntityGroup, period: YearMonth, registrations: f64) -> Self {
        Self {
            group,
            period,
            registrations,
            attributes: BTreeMap::new(),
        }
    }

    pub fn observation(&self) -> Observation<YearMonth> {
        Observation::new(self.group.clone(), self.period, self.registrations)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub group: EntityGroup,
    pub year: Option<i32>,
    pub attributes: BTreeMap<String, CellValue>,
    /// Aligned with [`WideTable::period_columns`].
    pub values: Vec<CellValue>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideTable {
    pub period_columns: Vec<String>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Lays the table out as group columns, year, attributes, then periods.
    /// The category column is only emitted when some row has a category.
    pub fn to_table(&self) -> RawTable {
        let has_category = self.rows.iter().any(|r| r.group.vehicle_category.is_some());
        let attribute_names: BTreeSet<&String> =
            self.rows.iter().flat_map(|r| r.attributes.keys()).collect();

        let mut headers = vec![COL_VEHICLE_TYPE.to_string()];
        if has_category {
            headers.push(COL_VEHICLE_CATEGORY.to_string());
        }
        headers.push(COL_MAKER.to_string());
        headers.push(COL_YEAR.to_string());
        headers.extend(attribute_names.iter().map(|name| name.to_string()));
        headers.extend(self.period_columns.iter().cloned());

        let mut table = RawTable::new(headers);
        for row in &self.rows {
            let mut cells: Vec<CellValue> = vec![row.group.vehicle_type.clone().into()];
            if has_category {
                cells.push(row.group.vehicle_category.clone().into());
            }
            cells.push(row.group.maker.clone().into());
            cells.push(row.year.map(CellValue::from).unwrap_or_default());
            for name in &attribute_names {
                cells.push(row.attributes.get(*name).cloned().unwrap_or_default());
            }
            cells.extend(row.values.iter().cloned());
            table.push_row(cells);
        }

        table
    }
}

/// Wide → long. Emits one record per (row, recognized month column).
///
/// Unrecognized period columns and rows without a year are skipped and
/// counted; unusable values become 0 and are counted.
pub fn unpivot(table: &WideTable, diagnostics: &mut Diagnostics) -> Vec<LongRecord> {
    let months: Vec<Option<u32>> = table
        .period_columns
        .iter()
        .map(|label| match parse_month_token(label) {
            Ok(month) => Some(month),
            Err(e) => {
                warn!("Skipping column during unpivot: {}", e);
                diagnostics.invalid_period_labels += 1;
                None
            }
        })
        .collect();

    let mut records = Vec::with_capacity(table.rows.len() * months.len());
    let mut missing_year = 0;

    for row in &table.rows {
        let Some(year) = row.year.filter(|year| is_supported_year(*year)) else {
            missing_year += 1;
            debug!("Dropping {} row without a usable year ({:?})", row.group, row.year);
            continue;
        };

        for (idx, month) in months.iter().enumerate() {
            let Some(Ok(period)) = month.map(|month| YearMonth::new(year, month)) else {
                continue;
            };
            let cell = row.values.get(idx).cloned().unwrap_or_default();
            let registrations = diagnostics.coerce_registrations(&cell);

            records.push(LongRecord {
                group: row.group.clone(),
                period,
                registrations,
                attributes: row.attributes.clone(),
            });
        }
    }

    if missing_year > 0 {
        warn!("Excluded {} rows whose year could not be determined", missing_year);
        diagnostics.missing_year_rows += missing_year;
    }

    debug!(
        "Unpivoted {} wide rows into {} long records",
        table.rows.len(),
        records.len()
    );
    records
}

/// Long → wide. Duplicate (group, month) records are summed; every distinct
/// month becomes a `month_<n>` column and missing combinations are 0.
pub fn pivot(records: &[LongRecord]) -> WideTable {
    let mut sums: BTreeMap<(EntityGroup, i32), BTreeMap<u32, f64>> = BTreeMap::new();
    let mut months: BTreeSet<u32> = BTreeSet::new();

    for record in records {
        months.insert(record.period.month());
        *sums
            .entry((record.group.clone(), record.period.year()))
            .or_default()
            .entry(record.period.month())
            .or_insert(0.0) += record.registrations;
    }

    let period_columns = months
        .iter()
        .map(|month| format!("{}{}", MONTH_COLUMN_PREFIX, month))
        .collect();

    let rows = sums
        .into_iter()
        .map(|((group, year), by_month)| WideRow {
            group,
            year: Some(year),
            attributes: BTreeMap::new(),
            values: months
                .iter()
                .map(|month| CellValue::Number(by_month.get(month).copied().unwrap_or(0.0)))
                .collect(),
        })
        .collect();

    WideTable {
        period_columns,
        rows,
    }
}
