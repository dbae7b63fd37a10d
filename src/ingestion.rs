//! Turns a combined raw table into the canonical wide layout.
//!
//! Exports differ in how they name their columns ("Maker", "Manufacturer
//! Name", "Registrations", "Total Reg.") and in their shape: some carry one
//! column per month, others one row per month with explicit year and month
//! columns. [`ColumnMapping`] finds the columns by substring; a
//! [`LayoutAdapter`] produces the [`WideTable`] the pipeline runs on.

use crate::combine::UNKNOWN_VEHICLE_TYPE;
use crate::diagnostics::Diagnostics;
use crate::error::{GrowthMetricsError, Result};
use crate::period::{parse_month_token, parse_year_token, year_from_number, YearMonth};
use crate::reshape::{pivot, LongRecord, WideRow, WideTable};
use crate::schema::{EntityGroup, COL_MAKER, COL_MONTH, COL_REGISTRATIONS, COL_SERIAL, COL_YEAR};
use crate::table::{CellValue, RawTable};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Where each canonical field lives in a raw table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub serial: Option<usize>,
    pub maker: usize,
    pub vehicle_type: Option<usize>,
    pub vehicle_category: Option<usize>,
    pub year: Option<usize>,
    pub month: Option<usize>,
    pub registrations: Option<usize>,
    /// Headers that name a month (`JAN`, `month_3`): the wide layout.
    pub period_columns: Vec<usize>,
}

fn normalized(header: &str) -> String {
    header.trim().to_lowercase().replace(['_', '-'], " ")
}

impl ColumnMapping {
    pub fn detect(table: &RawTable) -> Result<Self> {
        let headers: Vec<String> = table.headers.iter().map(|h| normalized(h)).collect();
        let exact = |name: &str| {
            let wanted = normalized(name);
            headers.iter().position(|h| *h == wanted)
        };

        let maker = headers
            .iter()
            .position(|h| h.contains("maker") || h.contains("manufactur"))
            .ok_or_else(|| GrowthMetricsError::MissingColumn(COL_MAKER.to_string()))?;

        let serial = exact(COL_SERIAL);
        let vehicle_type = headers.iter().position(|h| h.contains("vehicle type"));
        let vehicle_category = headers.iter().position(|h| h.contains("categor"));
        let year = exact(COL_YEAR);
        let month = exact(COL_MONTH);

        let keys = [Some(maker), serial, vehicle_type, vehicle_category, year, month];
        let is_key = |idx: usize| keys.contains(&Some(idx));

        let period_columns: Vec<usize> = (0..headers.len())
            .filter(|idx| !is_key(*idx))
            .filter(|idx| parse_month_token(&table.headers[*idx]).is_ok())
            .collect();

        let registrations = exact(COL_REGISTRATIONS)
            .or_else(|| {
                headers
                    .iter()
                    .rposition(|h| h.contains("reg"))
                    .filter(|idx| !is_key(*idx))
            })
            .or_else(|| {
                (0..headers.len())
                    .rev()
                    .filter(|idx| !is_key(*idx) && !period_columns.contains(idx))
                    .find(|idx| is_numeric_column(table, *idx))
            });

        let mapping = Self {
            serial,
            maker,
            vehicle_type,
            vehicle_category,
            year,
            month,
            registrations,
            period_columns,
        };
        debug!("Detected columns: {:?}", mapping);
        Ok(mapping)
    }

    pub fn layout(&self) -> Result<InputLayout> {
        if !self.period_columns.is_empty() {
            return Ok(InputLayout::Wide);
        }
        match (self.month, self.registrations) {
            (Some(_), Some(_)) => Ok(InputLayout::Long),
            (None, _) => Err(GrowthMetricsError::MissingColumn(COL_MONTH.to_string())),
            (_, None) => Err(GrowthMetricsError::MissingColumn(COL_REGISTRATIONS.to_string())),
        }
    }

    fn is_mapped(&self, idx: usize) -> bool {
        [
            self.serial,
            Some(self.maker),
            self.vehicle_type,
            self.vehicle_category,
            self.year,
            self.month,
            self.registrations,
        ]
        .contains(&Some(idx))
            || self.period_columns.contains(&idx)
    }
}

fn is_numeric_column(table: &RawTable, idx: usize) -> bool {
    let mut seen = false;
    for row in 0..table.len() {
        let cell = table.cell(row, idx);
        if cell.is_blank() {
            continue;
        }
        if cell.as_f64().is_none() {
            return false;
        }
        seen = true;
    }
    seen
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// One row per group and year, one column per month.
    Wide,
    /// One row per group and month, with year, month and metric columns.
    Long,
}

/// Builds the canonical wide table from a raw table and its mapping.
pub trait LayoutAdapter {
    fn adapt(
        &self,
        table: &RawTable,
        mapping: &ColumnMapping,
        diagnostics: &mut Diagnostics,
    ) -> Result<WideTable>;
}

pub struct WideLayoutAdapter;

pub struct LongLayoutAdapter;

/// Identifying fields of a data row, or `None` for rows that must be dropped.
fn row_group(
    table: &RawTable,
    mapping: &ColumnMapping,
    row: usize,
    diagnostics: &mut Diagnostics,
) -> Option<EntityGroup> {
    if let Some(serial) = mapping.serial {
        if table.cell(row, serial).as_f64().is_none() {
            diagnostics.non_data_rows += 1;
            return None;
        }
    }

    let maker = table.cell(row, mapping.maker);
    if maker.is_blank() {
        diagnostics.missing_group_rows += 1;
        return None;
    }

    let vehicle_type = mapping
        .vehicle_type
        .map(|idx| table.cell(row, idx))
        .filter(|cell| !cell.is_blank())
        .map(|cell| cell.as_text())
        .unwrap_or_else(|| UNKNOWN_VEHICLE_TYPE.to_string());

    let vehicle_category = mapping
        .vehicle_category
        .map(|idx| table.cell(row, idx))
        .filter(|cell| !cell.is_blank())
        .map(|cell| cell.as_text());

    Some(EntityGroup {
        vehicle_type,
        vehicle_category,
        maker: maker.as_text(),
    })
}

fn read_year(cell: &CellValue) -> Option<i32> {
    match cell {
        CellValue::Number(n) => year_from_number(*n),
        CellValue::Text(s) => parse_year_token(s),
        CellValue::Empty => None,
    }
}

impl LayoutAdapter for WideLayoutAdapter {
    fn adapt(
        &self,
        table: &RawTable,
        mapping: &ColumnMapping,
        diagnostics: &mut Diagnostics,
    ) -> Result<WideTable> {
        let period_columns = mapping
            .period_columns
            .iter()
            .map(|idx| table.headers[*idx].clone())
            .collect();

        let attribute_columns: Vec<usize> = (0..table.width())
            .filter(|idx| !mapping.is_mapped(*idx))
            .collect();

        let mut rows = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let Some(group) = row_group(table, mapping, row, diagnostics) else {
                continue;
            };

            let year = mapping.year.and_then(|idx| read_year(table.cell(row, idx)));
            let values = mapping
                .period_columns
                .iter()
                .map(|idx| CellValue::Number(diagnostics.coerce_registrations(table.cell(row, *idx))))
                .collect();
            let attributes = attribute_columns
                .iter()
                .map(|idx| (table.headers[*idx].clone(), table.cell(row, *idx).clone()))
                .collect();

            rows.push(WideRow {
                group,
                year,
                attributes,
                values,
            });
        }

        Ok(WideTable {
            period_columns,
            rows,
        })
    }
}

impl LayoutAdapter for LongLayoutAdapter {
    fn adapt(
        &self,
        table: &RawTable,
        mapping: &ColumnMapping,
        diagnostics: &mut Diagnostics,
    ) -> Result<WideTable> {
        let month_idx = mapping
            .month
            .ok_or_else(|| GrowthMetricsError::MissingColumn(COL_MONTH.to_string()))?;
        let registrations_idx = mapping
            .registrations
            .ok_or_else(|| GrowthMetricsError::MissingColumn(COL_REGISTRATIONS.to_string()))?;

        let mut records = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let Some(group) = row_group(table, mapping, row, diagnostics) else {
                continue;
            };

            let Some(year) = mapping.year.and_then(|idx| read_year(table.cell(row, idx))) else {
                diagnostics.missing_year_rows += 1;
                continue;
            };

            let label = table.cell(row, month_idx).as_text();
            let period = match parse_month_token(&label).and_then(|month| YearMonth::new(year, month)) {
                Ok(period) => period,
                Err(e) => {
                    debug!("Row {} skipped: {}", row, e);
                    diagnostics.invalid_period_labels += 1;
                    continue;
                }
            };

            let registrations = diagnostics.coerce_registrations(table.cell(row, registrations_idx));
            records.push(LongRecord {
                group,
                period,
                registrations,
                attributes: BTreeMap::new(),
            });
        }

        Ok(pivot(&records))
    }
}

/// Cleans a combined raw table into the canonical wide layout, choosing the
/// adapter from the detected columns.
pub fn clean_table(table: &RawTable, diagnostics: &mut Diagnostics) -> Result<WideTable> {
    if table.headers.is_empty() {
        return Ok(WideTable::default());
    }

    let mut table = table.clone();
    table.trim_headers();

    let mapping = ColumnMapping::detect(&table)?;
    let layout = mapping.layout()?;
    let adapter: &dyn LayoutAdapter = match layout {
        InputLayout::Wide => &WideLayoutAdapter,
        InputLayout::Long => &LongLayoutAdapter,
    };

    let before = diagnostics.dropped_rows();
    let wide = adapter.adapt(&table, &mapping, diagnostics)?;
    let dropped = diagnostics.dropped_rows() - before;

    if dropped > 0 {
        warn!("Cleaning dropped {} of {} rows", dropped, table.len());
    }
    info!(
        "Cleaned {:?} layout into {} wide rows x {} period columns",
        layout,
        wide.rows.len(),
        wide.period_columns.len()
    );
    Ok(wide)
}
