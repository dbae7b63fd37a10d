//! Joins monthly YoY growth with quarterly QoQ growth and builds the final
//! reporting tables and summary aggregates.

use crate::error::{GrowthMetricsError, Result};
use crate::period::{ComparablePeriod, YearMonth, YearQuarter};
use crate::schema::*;
use crate::table::{CellValue, RawTable};
use crate::utils::{finite_or_none, mean, round_to};
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Worksheet names used when a report is written as XLSX.
pub const MONTHLY_SHEET: &str = "Monthly_with_Growth";
pub const QUARTERLY_SHEET: &str = "Quarterly_Growth";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReportRow {
    pub group: EntityGroup,
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub year_quarter: String,
    pub registrations: f64,
    pub registrations_last_year: Option<f64>,
    pub yoy_growth_pct: Option<f64>,
    pub registrations_last_quarter: Option<f64>,
    pub qoq_growth_pct: Option<f64>,
}

impl MonthlyReportRow {
    pub fn period(&self) -> Result<YearMonth> {
        YearMonth::new(self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyReportRow {
    pub group: EntityGroup,
    pub year: i32,
    pub quarter: u32,
    pub year_quarter: String,
    pub registrations: f64,
    pub registrations_last_quarter: Option<f64>,
    pub qoq_growth_pct: Option<f64>,
}

impl QuarterlyReportRow {
    pub fn period(&self) -> Result<YearQuarter> {
        YearQuarter::new(self.year, self.quarter)
    }
}

fn clean_value(value: Option<f64>) -> Option<f64> {
    finite_or_none(value)
}

fn clean_growth(value: Option<f64>) -> Option<f64> {
    finite_or_none(value).map(|v| round_to(v, 2))
}

/// Left join from the monthly side on (group, year, quarter).
///
/// Every monthly record yields exactly one row; quarterly fields stay absent
/// when the quarter has no record. Non-finite values become absent. Rows are
/// sorted by period, then group.
pub fn merge_growth(
    monthly: &[GrowthRecord<YearMonth>],
    quarterly: &[GrowthRecord<YearQuarter>],
) -> Vec<MonthlyReportRow> {
    let mut quarter_index: HashMap<(&EntityGroup, YearQuarter), &GrowthRecord<YearQuarter>> =
        HashMap::with_capacity(quarterly.len());
    for record in quarterly {
        quarter_index.entry((&record.group, record.period)).or_insert(record);
    }

    let mut rows: Vec<MonthlyReportRow> = monthly
        .iter()
        .map(|record| {
            let year_quarter = record.period.year_quarter();
            let matched = quarter_index.get(&(&record.group, year_quarter));

            MonthlyReportRow {
                group: record.group.clone(),
                date: record.period.date(),
                year: record.period.year(),
                month: record.period.month(),
                quarter: year_quarter.quarter(),
                year_quarter: year_quarter.label(),
                registrations: record.current,
                registrations_last_year: clean_value(record.prior),
                yoy_growth_pct: clean_growth(record.growth_pct),
                registrations_last_quarter: matched.and_then(|q| clean_value(q.prior)),
                qoq_growth_pct: matched.and_then(|q| clean_growth(q.growth_pct)),
            }
        })
        .collect();

    rows.sort_by(|a, b| (a.date, &a.group).cmp(&(b.date, &b.group)));

    debug!(
        "Merged {} monthly records with {} quarterly records",
        monthly.len(),
        quarterly.len()
    );
    rows
}

/// The quarterly view, cleaned and sorted like the monthly one.
pub fn quarterly_report(quarterly: &[GrowthRecord<YearQuarter>]) -> Vec<QuarterlyReportRow> {
    let mut rows: Vec<QuarterlyReportRow> = quarterly
        .iter()
        .map(|record| QuarterlyReportRow {
            group: record.group.clone(),
            year: record.period.year(),
            quarter: record.period.quarter(),
            year_quarter: record.period.label(),
            registrations: record.current,
            registrations_last_quarter: clean_value(record.prior),
            qoq_growth_pct: clean_growth(record.growth_pct),
        })
        .collect();

    rows.sort_by(|a, b| (a.year, a.quarter, &a.group).cmp(&(b.year, b.quarter, &b.group)));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleTypeSummary {
    pub vehicle_type: String,
    pub total_registrations: f64,
    pub mean_registrations: f64,
    pub mean_yoy_growth_pct: Option<f64>,
    pub mean_qoq_growth_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakerGrowth {
    pub maker: String,
    pub mean_yoy_growth_pct: f64,
    pub total_registrations: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SummaryStatistics {
    pub total_records: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub unique_vehicle_types: usize,
    pub unique_makers: usize,
    pub rows_with_yoy: usize,
    pub rows_with_qoq: usize,
    pub vehicle_types: Vec<VehicleTypeSummary>,
    /// Makers ranked by mean YoY growth over rows that have one.
    pub top_yoy_makers: Vec<MakerGrowth>,
}

/// Aggregates over the merged monthly report. Means ignore absent values;
/// all figures are rounded to 2 decimals.
pub fn summarize(rows: &[MonthlyReportRow], top_n: usize) -> SummaryStatistics {
    let vehicle_types: BTreeSet<&str> = rows.iter().map(|r| r.group.vehicle_type.as_str()).collect();
    let makers: BTreeSet<&str> = rows.iter().map(|r| r.group.maker.as_str()).collect();

    let mut by_type: BTreeMap<&str, Vec<&MonthlyReportRow>> = BTreeMap::new();
    for row in rows {
        by_type.entry(row.group.vehicle_type.as_str()).or_default().push(row);
    }

    let vehicle_type_summaries = by_type
        .into_iter()
        .map(|(vehicle_type, rows)| {
            let total: f64 = rows.iter().map(|r| r.registrations).sum();
            VehicleTypeSummary {
                vehicle_type: vehicle_type.to_string(),
                total_registrations: round_to(total, 2),
                mean_registrations: round_to(total / rows.len() as f64, 2),
                mean_yoy_growth_pct: mean(rows.iter().filter_map(|r| r.yoy_growth_pct))
                    .map(|v| round_to(v, 2)),
                mean_qoq_growth_pct: mean(rows.iter().filter_map(|r| r.qoq_growth_pct))
                    .map(|v| round_to(v, 2)),
            }
        })
        .collect();

    let mut by_maker: BTreeMap<&str, (Vec<f64>, f64)> = BTreeMap::new();
    for row in rows {
        if let Some(pct) = row.yoy_growth_pct {
            let entry = by_maker.entry(row.group.maker.as_str()).or_default();
            entry.0.push(pct);
            entry.1 += row.registrations;
        }
    }

    let mut top_yoy_makers: Vec<MakerGrowth> = by_maker
        .into_iter()
        .filter_map(|(maker, (growths, total))| {
            mean(growths).map(|avg| MakerGrowth {
                maker: maker.to_string(),
                mean_yoy_growth_pct: round_to(avg, 2),
                total_registrations: round_to(total, 2),
            })
        })
        .collect();
    top_yoy_makers.sort_by(|a, b| {
        b.mean_yoy_growth_pct
            .total_cmp(&a.mean_yoy_growth_pct)
            .then_with(|| a.maker.cmp(&b.maker))
    });
    top_yoy_makers.truncate(top_n);

    let summary = SummaryStatistics {
        total_records: rows.len(),
        first_date: rows.iter().map(|r| r.date).min(),
        last_date: rows.iter().map(|r| r.date).max(),
        unique_vehicle_types: vehicle_types.len(),
        unique_makers: makers.len(),
        rows_with_yoy: rows.iter().filter(|r| r.yoy_growth_pct.is_some()).count(),
        rows_with_qoq: rows.iter().filter(|r| r.qoq_growth_pct.is_some()).count(),
        vehicle_types: vehicle_type_summaries,
        top_yoy_makers,
    };

    info!(
        "Report covers {} rows, {} vehicle types, {} makers",
        summary.total_records, summary.unique_vehicle_types, summary.unique_makers
    );
    summary
}

fn has_category<'a>(groups: impl IntoIterator<Item = &'a EntityGroup>) -> bool {
    groups.into_iter().any(|g| g.vehicle_category.is_some())
}

fn group_headers(with_category: bool) -> Vec<String> {
    let mut headers = vec![COL_VEHICLE_TYPE.to_string()];
    if with_category {
        headers.push(COL_VEHICLE_CATEGORY.to_string());
    }
    headers.push(COL_MAKER.to_string());
    headers
}

fn group_cells(group: &EntityGroup, with_category: bool) -> Vec<CellValue> {
    let mut cells = vec![CellValue::from(group.vehicle_type.clone())];
    if with_category {
        cells.push(group.vehicle_category.clone().into());
    }
    cells.push(CellValue::from(group.maker.clone()));
    cells
}

/// Column lookup over a report table read back from disk.
struct ReportColumns<'a> {
    table: &'a RawTable,
}

impl<'a> ReportColumns<'a> {
    fn index(&self, name: &str) -> Result<usize> {
        self.table
            .column_index(name)
            .ok_or_else(|| GrowthMetricsError::MissingColumn(name.to_string()))
    }

    fn group(&self, row: usize) -> Result<EntityGroup> {
        let category = self
            .table
            .column_index(COL_VEHICLE_CATEGORY)
            .map(|idx| self.table.cell(row, idx))
            .filter(|cell| !cell.is_blank())
            .map(|cell| cell.as_text());

        Ok(EntityGroup {
            vehicle_type: self.table.cell(row, self.index(COL_VEHICLE_TYPE)?).as_text(),
            vehicle_category: category,
            maker: self.table.cell(row, self.index(COL_MAKER)?).as_text(),
        })
    }

    fn number(&self, row: usize, name: &str) -> Result<Option<f64>> {
        Ok(self.table.cell(row, self.index(name)?).as_f64())
    }

    fn whole(&self, row: usize, name: &str) -> Result<i64> {
        let cell = self.table.cell(row, self.index(name)?);
        cell.as_f64()
            .filter(|v| v.fract() == 0.0)
            .map(|v| v as i64)
            .ok_or_else(|| {
                GrowthMetricsError::InvalidPeriod(format!("{} = '{}'", name, cell.as_text()))
            })
    }
}

pub fn monthly_rows_to_table(rows: &[MonthlyReportRow]) -> RawTable {
    let with_category = has_category(rows.iter().map(|r| &r.group));
    let mut headers = group_headers(with_category);
    headers.extend(
        [
            COL_DATE,
            COL_YEAR,
            COL_MONTH,
            COL_QUARTER,
            COL_YEAR_QUARTER,
            COL_REGISTRATIONS,
            COL_REGISTRATIONS_LAST_YEAR,
            COL_YOY_GROWTH,
            COL_REGISTRATIONS_LAST_QUARTER,
            COL_QOQ_GROWTH,
        ]
        .iter()
        .map(|h| h.to_string()),
    );

    let mut table = RawTable::new(headers);
    for row in rows {
        let mut cells = group_cells(&row.group, with_category);
        cells.extend([
            CellValue::from(row.date.format("%Y-%m-%d").to_string()),
            row.year.into(),
            row.month.into(),
            row.quarter.into(),
            row.year_quarter.clone().into(),
            row.registrations.into(),
            row.registrations_last_year.into(),
            row.yoy_growth_pct.into(),
            row.registrations_last_quarter.into(),
            row.qoq_growth_pct.into(),
        ]);
        table.push_row(cells);
    }
    table
}

/// Parses a monthly report written by [`monthly_rows_to_table`]. The date,
/// quarter and label are re-derived from year and month.
pub fn monthly_rows_from_table(table: &RawTable) -> Result<Vec<MonthlyReportRow>> {
    let columns = ReportColumns { table };
    let mut rows = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        let year = i32::try_from(columns.whole(row, COL_YEAR)?)
            .map_err(|_| GrowthMetricsError::InvalidPeriod(COL_YEAR.to_string()))?;
        let month = u32::try_from(columns.whole(row, COL_MONTH)?)
            .map_err(|_| GrowthMetricsError::InvalidPeriod(COL_MONTH.to_string()))?;
        let period = YearMonth::new(year, month)?;

        rows.push(MonthlyReportRow {
            group: columns.group(row)?,
            date: period.date(),
            year,
            month,
            quarter: period.quarter(),
            year_quarter: period.year_quarter().label(),
            registrations: columns.number(row, COL_REGISTRATIONS)?.unwrap_or(0.0),
            registrations_last_year: columns.number(row, COL_REGISTRATIONS_LAST_YEAR)?,
            yoy_growth_pct: columns.number(row, COL_YOY_GROWTH)?,
            registrations_last_quarter: columns.number(row, COL_REGISTRATIONS_LAST_QUARTER)?,
            qoq_growth_pct: columns.number(row, COL_QOQ_GROWTH)?,
        });
    }

    Ok(rows)
}

pub fn quarterly_rows_to_table(rows: &[QuarterlyReportRow]) -> RawTable {
    let with_category = has_category(rows.iter().map(|r| &r.group));
    let mut headers = group_headers(with_category);
    headers.extend(
        [
            COL_YEAR,
            COL_QUARTER,
            COL_YEAR_QUARTER,
            COL_REGISTRATIONS,
            COL_REGISTRATIONS_LAST_QUARTER,
            COL_QOQ_GROWTH,
        ]
        .iter()
        .map(|h| h.to_string()),
    );

    let mut table = RawTable::new(headers);
    for row in rows {
        let mut cells = group_cells(&row.group, with_category);
        cells.extend([
            CellValue::from(row.year),
            row.quarter.into(),
            row.year_quarter.clone().into(),
            row.registrations.into(),
            row.registrations_last_quarter.into(),
            row.qoq_growth_pct.into(),
        ]);
        table.push_row(cells);
    }
    table
}

pub fn quarterly_rows_from_table(table: &RawTable) -> Result<Vec<QuarterlyReportRow>> {
    let columns = ReportColumns { table };
    let mut rows = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        let year = i32::try_from(columns.whole(row, COL_YEAR)?)
            .map_err(|_| GrowthMetricsError::InvalidPeriod(COL_YEAR.to_string()))?;
        let quarter = u32::try_from(columns.whole(row, COL_QUARTER)?)
            .map_err(|_| GrowthMetricsError::InvalidPeriod(COL_QUARTER.to_string()))?;
        let period = YearQuarter::new(year, quarter)?;

        rows.push(QuarterlyReportRow {
            group: columns.group(row)?,
            year,
            quarter,
            year_quarter: period.label(),
            registrations: columns.number(row, COL_REGISTRATIONS)?.unwrap_or(0.0),
            registrations_last_quarter: columns.number(row, COL_REGISTRATIONS_LAST_QUARTER)?,
            qoq_growth_pct: columns.number(row, COL_QOQ_GROWTH)?,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> EntityGroup {
        EntityGroup::new("2W", "ACME")
    }

    fn month(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    fn monthly_record(group: EntityGroup, period: YearMonth, current: f64) -> GrowthRecord<YearMonth> {
        GrowthRecord {
            group,
            period,
            current,
            prior: None,
            growth_pct: None,
        }
    }

    fn quarterly_record(
        group: EntityGroup,
        year: i32,
        quarter: u32,
        prior: Option<f64>,
        growth_pct: Option<f64>,
    ) -> GrowthRecord<YearQuarter> {
        GrowthRecord {
            group,
            period: YearQuarter::new(year, quarter).unwrap(),
            current: 0.0,
            prior,
            growth_pct,
        }
    }

    #[test]
    fn test_left_join_keeps_every_monthly_row() {
        let monthly = vec![
            monthly_record(acme(), month(2024, 1), 10.0),
            monthly_record(acme(), month(2024, 2), 20.0),
            monthly_record(acme(), month(2024, 4), 30.0),
        ];
        let quarterly = vec![quarterly_record(acme(), 2024, 1, Some(250.0), Some(20.0))];

        let rows = merge_growth(&monthly, &quarterly);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].registrations_last_quarter, Some(250.0));
        assert_eq!(rows[1].qoq_growth_pct, Some(20.0));
        assert_eq!(rows[2].year_quarter, "2024-Q2");
        assert_eq!(rows[2].registrations_last_quarter, None);
        assert_eq!(rows[2].qoq_growth_pct, None);
    }

    #[test]
    fn test_merge_does_not_cross_groups() {
        let zeta = EntityGroup::new("2W", "ZETA");
        let monthly = vec![monthly_record(acme(), month(2024, 1), 10.0)];
        let quarterly = vec![quarterly_record(zeta, 2024, 1, Some(5.0), Some(100.0))];

        let rows = merge_growth(&monthly, &quarterly);
        assert_eq!(rows[0].qoq_growth_pct, None);
    }

    #[test]
    fn test_infinite_values_become_absent() {
        let mut record = monthly_record(acme(), month(2024, 1), 10.0);
        record.prior = Some(f64::INFINITY);
        record.growth_pct = Some(f64::NEG_INFINITY);
        let quarterly = vec![quarterly_record(acme(), 2024, 1, Some(f64::NAN), Some(f64::INFINITY))];

        let rows = merge_growth(&[record], &quarterly);
        assert_eq!(rows[0].registrations_last_year, None);
        assert_eq!(rows[0].yoy_growth_pct, None);
        assert_eq!(rows[0].registrations_last_quarter, None);
        assert_eq!(rows[0].qoq_growth_pct, None);
    }

    #[test]
    fn test_sorted_by_period_then_group() {
        let acme = acme();
        let zeta = EntityGroup::new("2W", "ZETA");
        let three_wheeler = EntityGroup::new("3W", "ACME");
        let monthly = vec![
            monthly_record(zeta.clone(), month(2024, 1), 1.0),
            monthly_record(acme.clone(), month(2024, 2), 1.0),
            monthly_record(three_wheeler.clone(), month(2024, 1), 1.0),
            monthly_record(acme.clone(), month(2024, 1), 1.0),
        ];

        let rows = merge_growth(&monthly, &[]);
        let order: Vec<(YearMonth, &EntityGroup)> = rows.iter().map(|r| (r.period().unwrap(), &r.group)).collect();
        assert_eq!(
            order,
            vec![
                (month(2024, 1), &acme),
                (month(2024, 1), &zeta),
                (month(2024, 1), &three_wheeler),
                (month(2024, 2), &acme),
            ]
        );
    }

    #[test]
    fn test_empty_inputs_produce_empty_outputs() {
        assert!(merge_growth(&[], &[]).is_empty());
        assert!(quarterly_report(&[]).is_empty());
        let summary = summarize(&[], 10);
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.first_date, None);
    }

    #[test]
    fn test_quarterly_report_sorted_by_period() {
        let zeta = EntityGroup::new("2W", "ZETA");
        let rows = quarterly_report(&[
            quarterly_record(zeta, 2023, 4, None, None),
            quarterly_record(acme(), 2024, 1, Some(250.0), Some(20.0)),
            quarterly_record(acme(), 2023, 4, None, None),
        ]);

        assert_eq!(rows[0].group, acme());
        assert_eq!(rows[0].year_quarter, "2023-Q4");
        assert_eq!(rows[1].group.maker, "ZETA");
        assert_eq!(rows[2].qoq_growth_pct, Some(20.0));
    }

    #[test]
    fn test_summary_statistics() {
        let zeta = EntityGroup::new("3W", "ZETA");
        let mut rows = merge_growth(
            &[
                monthly_record(acme(), month(2024, 1), 100.0),
                monthly_record(acme(), month(2024, 2), 300.0),
                monthly_record(zeta, month(2024, 1), 50.0),
            ],
            &[],
        );
        rows[0].yoy_growth_pct = Some(10.0);
        rows[1].yoy_growth_pct = Some(40.0);

        let summary = summarize(&rows, 1);

        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.unique_vehicle_types, 2);
        assert_eq!(summary.unique_makers, 2);
        assert_eq!(summary.rows_with_yoy, 2);
        assert_eq!(summary.first_date, Some(month(2024, 1).date()));
        assert_eq!(summary.last_date, Some(month(2024, 2).date()));

        let two_wheelers = &summary.vehicle_types[0];
        assert_eq!(two_wheelers.vehicle_type, "2W");
        assert_eq!(two_wheelers.total_registrations, 400.0);
        assert_eq!(two_wheelers.mean_registrations, 200.0);
        assert_eq!(two_wheelers.mean_yoy_growth_pct, Some(10.0));
        assert_eq!(two_wheelers.mean_qoq_growth_pct, None);

        assert_eq!(summary.top_yoy_makers.len(), 1);
        assert_eq!(summary.top_yoy_makers[0].maker, "ZETA");
    }

    #[test]
    fn test_monthly_table_round_trip() {
        let mut rows = merge_growth(
            &[monthly_record(
                acme().with_category("SCOOTER"),
                month(2024, 5),
                12.0,
            )],
            &[quarterly_record(
                acme().with_category("SCOOTER"),
                2024,
                2,
                Some(8.0),
                Some(50.0),
            )],
        );
        rows[0].registrations_last_year = Some(10.0);
        rows[0].yoy_growth_pct = Some(20.0);

        let table = monthly_rows_to_table(&rows);
        assert_eq!(table.headers[1], COL_VEHICLE_CATEGORY);
        assert_eq!(monthly_rows_from_table(&table).unwrap(), rows);
    }

    #[test]
    fn test_quarterly_table_round_trip() {
        let rows = quarterly_report(&[quarterly_record(acme(), 2024, 1, None, None)]);
        let table = quarterly_rows_to_table(&rows);

        assert!(table.column_index(COL_VEHICLE_CATEGORY).is_none());
        assert!(table.cell(0, table.column_index(COL_QOQ_GROWTH).unwrap()).is_blank());
        assert_eq!(quarterly_rows_from_table(&table).unwrap(), rows);
    }

    #[test]
    fn test_from_table_requires_columns() {
        let table = RawTable::with_headers(&["maker"]);
        assert!(monthly_rows_from_table(&table).is_ok());

        let mut table = RawTable::with_headers(&["maker", "year"]);
        table.push_row(vec!["ACME".into(), 2024.0.into()]);
        assert!(matches!(
            monthly_rows_from_table(&table),
            Err(GrowthMetricsError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_from_table_rejects_out_of_range_year() {
        let mut rows = merge_growth(&[monthly_record(acme(), month(2024, 5), 12.0)], &[]);
        rows[0].year = 99_999;
        let table = monthly_rows_to_table(&rows);

        assert!(matches!(
            monthly_rows_from_table(&table),
            Err(GrowthMetricsError::InvalidPeriod(_))
        ));
        assert!(rows[0].period().is_err());

        let mut quarterly = quarterly_report(&[quarterly_record(acme(), 2024, 1, None, None)]);
        quarterly[0].year = -40;
        assert!(matches!(
            quarterly_rows_from_table(&quarterly_rows_to_table(&quarterly)),
            Err(GrowthMetricsError::InvalidPeriod(_))
        ));
    }
}
