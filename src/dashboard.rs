//! Data layer behind the registrations dashboard.
//!
//! Loads the monthly and quarterly reports, applies the sidebar filters and
//! produces chart-ready series. Read-only: nothing here writes back.

use crate::error::Result;
use crate::io::read_table_with_sheet;
use crate::report::{
    monthly_rows_from_table, quarterly_rows_from_table, MonthlyReportRow, QuarterlyReportRow,
    MONTHLY_SHEET, QUARTERLY_SHEET,
};
use crate::schema::EntityGroup;
use crate::utils::{mean, round_to};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// How many makers the growth bar charts show.
pub const RANKED_MAKERS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Monthly,
    Quarterly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthMetric {
    Yoy,
    Qoq,
}

impl fmt::Display for GrowthMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowthMetric::Yoy => write!(f, "YoY"),
            GrowthMetric::Qoq => write!(f, "QoQ"),
        }
    }
}

/// Common view over monthly and quarterly report rows.
pub trait ReportRow {
    fn group(&self) -> &EntityGroup;
    fn registrations(&self) -> f64;
    fn growth(&self, metric: GrowthMetric) -> Option<f64>;
    fn year(&self) -> i32;
    /// Month start for monthly rows; quarterly rows have no single date.
    fn date(&self) -> Option<NaiveDate>;
    /// Sortable x-axis label: `2024-01` or `2024-Q1`.
    fn period_label(&self) -> String;
}

impl ReportRow for MonthlyReportRow {
    fn group(&self) -> &EntityGroup {
        &self.group
    }

    fn registrations(&self) -> f64 {
        self.registrations
    }

    fn growth(&self, metric: GrowthMetric) -> Option<f64> {
        match metric {
            GrowthMetric::Yoy => self.yoy_growth_pct,
            GrowthMetric::Qoq => self.qoq_growth_pct,
        }
    }

    fn year(&self) -> i32 {
        self.year
    }

    fn date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }

    fn period_label(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

impl ReportRow for QuarterlyReportRow {
    fn group(&self) -> &EntityGroup {
        &self.group
    }

    fn registrations(&self) -> f64 {
        self.registrations
    }

    fn growth(&self, metric: GrowthMetric) -> Option<f64> {
        match metric {
            GrowthMetric::Yoy => None,
            GrowthMetric::Qoq => self.qoq_growth_pct,
        }
    }

    fn year(&self) -> i32 {
        self.year
    }

    fn date(&self) -> Option<NaiveDate> {
        None
    }

    fn period_label(&self) -> String {
        self.year_quarter.clone()
    }
}

/// Sidebar selections. `None` selects everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub vehicle_types: Option<BTreeSet<String>>,
    pub vehicle_categories: Option<BTreeSet<String>>,
    pub makers: Option<BTreeSet<String>>,
    /// Inclusive; applies to rows that carry a date (the monthly view).
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Inclusive.
    pub year_range: Option<(i32, i32)>,
}

fn selected(selection: &Option<BTreeSet<String>>, value: &str) -> bool {
    selection.as_ref().map_or(true, |set| set.contains(value))
}

impl DashboardFilter {
    pub fn matches<R: ReportRow>(&self, row: &R) -> bool {
        let group = row.group();

        let category_ok = match (&self.vehicle_categories, &group.vehicle_category) {
            (None, _) => true,
            (Some(set), Some(category)) => set.contains(category),
            (Some(_), None) => false,
        };

        let date_ok = match (self.date_range, row.date()) {
            (Some((start, end)), Some(date)) => start <= date && date <= end,
            _ => true,
        };

        let year_ok = self
            .year_range
            .map_or(true, |(start, end)| start <= row.year() && row.year() <= end);

        selected(&self.vehicle_types, &group.vehicle_type)
            && selected(&self.makers, &group.maker)
            && category_ok
            && date_ok
            && year_ok
    }
}

/// Everything the sidebar can offer, taken from the monthly report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub vehicle_types: BTreeSet<String>,
    pub vehicle_categories: BTreeSet<String>,
    pub makers: BTreeSet<String>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub year_range: Option<(i32, i32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_registrations: f64,
    pub mean_yoy_growth_pct: Option<f64>,
    pub mean_qoq_growth_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub period: String,
    pub registrations: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMaker {
    pub maker: String,
    pub mean_growth_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketShare {
    pub maker: String,
    pub registrations: f64,
    pub share_pct: f64,
}

/// One render of the dashboard for a view and filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot<R> {
    pub kpis: Kpis,
    /// Registrations per period, keyed by vehicle type.
    pub time_series: BTreeMap<String, Vec<SeriesPoint>>,
    pub top_yoy: Vec<RankedMaker>,
    pub top_qoq: Vec<RankedMaker>,
    pub market_share: Vec<MarketShare>,
    pub rows: Vec<R>,
}

pub fn kpis<R: ReportRow>(rows: &[&R]) -> Kpis {
    Kpis {
        total_registrations: rows.iter().map(|r| r.registrations()).sum(),
        mean_yoy_growth_pct: mean(rows.iter().filter_map(|r| r.growth(GrowthMetric::Yoy)))
            .map(|v| round_to(v, 2)),
        mean_qoq_growth_pct: mean(rows.iter().filter_map(|r| r.growth(GrowthMetric::Qoq)))
            .map(|v| round_to(v, 2)),
    }
}

/// Registrations summed per (vehicle type, period), periods ascending.
pub fn time_series<R: ReportRow>(rows: &[&R]) -> BTreeMap<String, Vec<SeriesPoint>> {
    let mut sums: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for row in rows {
        *sums
            .entry(row.group().vehicle_type.clone())
            .or_default()
            .entry(row.period_label())
            .or_insert(0.0) += row.registrations();
    }

    sums.into_iter()
        .map(|(vehicle_type, by_period)| {
            let points = by_period
                .into_iter()
                .map(|(period, registrations)| SeriesPoint {
                    period,
                    registrations,
                })
                .collect();
            (vehicle_type, points)
        })
        .collect()
}

/// Makers ranked by mean growth, highest first. Rows without the metric are
/// ignored and makers with no value at all are left out.
pub fn ranked_growth<R: ReportRow>(rows: &[&R], metric: GrowthMetric, top_n: usize) -> Vec<RankedMaker> {
    let mut by_maker: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        if let Some(pct) = row.growth(metric) {
            by_maker.entry(row.group().maker.as_str()).or_default().push(pct);
        }
    }

    let mut ranked: Vec<RankedMaker> = by_maker
        .into_iter()
        .filter_map(|(maker, values)| {
            mean(values).map(|avg| RankedMaker {
                maker: maker.to_string(),
                mean_growth_pct: round_to(avg, 2),
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.mean_growth_pct
            .total_cmp(&a.mean_growth_pct)
            .then_with(|| a.maker.cmp(&b.maker))
    });
    ranked.truncate(top_n);
    ranked
}

/// Share of total registrations per maker, largest first.
pub fn market_share<R: ReportRow>(rows: &[&R]) -> Vec<MarketShare> {
    let mut by_maker: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows {
        *by_maker.entry(row.group().maker.as_str()).or_insert(0.0) += row.registrations();
    }

    let total: f64 = by_maker.values().sum();
    let mut shares: Vec<MarketShare> = by_maker
        .into_iter()
        .map(|(maker, registrations)| MarketShare {
            maker: maker.to_string(),
            registrations,
            share_pct: if total > 0.0 {
                round_to(registrations / total * 100.0, 2)
            } else {
                0.0
            },
        })
        .collect();

    shares.sort_by(|a, b| {
        b.registrations
            .total_cmp(&a.registrations)
            .then_with(|| a.maker.cmp(&b.maker))
    });
    shares
}

fn snapshot<R: ReportRow + Clone>(rows: Vec<&R>) -> DashboardSnapshot<R> {
    DashboardSnapshot {
        kpis: kpis(&rows),
        time_series: time_series(&rows),
        top_yoy: ranked_growth(&rows, GrowthMetric::Yoy, RANKED_MAKERS),
        top_qoq: ranked_growth(&rows, GrowthMetric::Qoq, RANKED_MAKERS),
        market_share: market_share(&rows),
        rows: rows.into_iter().cloned().collect(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    monthly: Vec<MonthlyReportRow>,
    quarterly: Vec<QuarterlyReportRow>,
}

impl Dashboard {
    pub fn new(monthly: Vec<MonthlyReportRow>, quarterly: Vec<QuarterlyReportRow>) -> Self {
        Self { monthly, quarterly }
    }

    /// Loads both reports. XLSX reports are read from their named sheets.
    pub fn from_files(monthly_path: impl AsRef<Path>, quarterly_path: impl AsRef<Path>) -> Result<Self> {
        let monthly = monthly_rows_from_table(&read_table_with_sheet(monthly_path, MONTHLY_SHEET)?)?;
        let quarterly =
            quarterly_rows_from_table(&read_table_with_sheet(quarterly_path, QUARTERLY_SHEET)?)?;

        info!(
            "Dashboard loaded {} monthly and {} quarterly rows",
            monthly.len(),
            quarterly.len()
        );
        Ok(Self::new(monthly, quarterly))
    }

    pub fn monthly(&self) -> &[MonthlyReportRow] {
        &self.monthly
    }

    pub fn quarterly(&self) -> &[QuarterlyReportRow] {
        &self.quarterly
    }

    pub fn filter_options(&self) -> FilterOptions {
        let dates = self.monthly.iter().map(|r| r.date);
        let years = self.quarterly.iter().map(|r| r.year);

        FilterOptions {
            vehicle_types: self.monthly.iter().map(|r| r.group.vehicle_type.clone()).collect(),
            vehicle_categories: self
                .monthly
                .iter()
                .filter_map(|r| r.group.vehicle_category.clone())
                .collect(),
            makers: self.monthly.iter().map(|r| r.group.maker.clone()).collect(),
            date_range: dates.clone().min().zip(dates.max()),
            year_range: years.clone().min().zip(years.max()),
        }
    }

    pub fn filtered_monthly(&self, filter: &DashboardFilter) -> Vec<&MonthlyReportRow> {
        self.monthly.iter().filter(|r| filter.matches(*r)).collect()
    }

    pub fn filtered_quarterly(&self, filter: &DashboardFilter) -> Vec<&QuarterlyReportRow> {
        self.quarterly.iter().filter(|r| filter.matches(*r)).collect()
    }

    pub fn monthly_snapshot(&self, filter: &DashboardFilter) -> DashboardSnapshot<MonthlyReportRow> {
        snapshot(self.filtered_monthly(filter))
    }

    pub fn quarterly_snapshot(
        &self,
        filter: &DashboardFilter,
    ) -> DashboardSnapshot<QuarterlyReportRow> {
        snapshot(self.filtered_quarterly(filter))
    }

    /// KPIs for whichever view is selected.
    pub fn kpis(&self, view: View, filter: &DashboardFilter) -> Kpis {
        match view {
            View::Monthly => kpis(&self.filtered_monthly(filter)),
            View::Quarterly => kpis(&self.filtered_quarterly(filter)),
        }
    }
}
