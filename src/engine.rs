use crate::aggregate::{aggregate_monthly, aggregate_quarterly};
use crate::diagnostics::Diagnostics;
use crate::growth::GrowthCalculator;
use crate::period::{YearMonth, YearQuarter};
use crate::report::{
    merge_growth, quarterly_report, summarize, MonthlyReportRow, QuarterlyReportRow,
    SummaryStatistics,
};
use crate::reshape::{unpivot, WideTable};
use crate::schema::{GrowthConvention, GrowthRecord};
use log::info;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_MAKERS: usize = 10;

/// Everything one run of the growth pipeline produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrowthOutput {
    pub monthly: Vec<MonthlyReportRow>,
    pub quarterly: Vec<QuarterlyReportRow>,
    pub summary: SummaryStatistics,
    pub diagnostics: Diagnostics,
}

/// Runs unpivot → aggregate → growth → merge over a cleaned wide table.
///
/// Monthly and quarterly growth are computed independently from the same
/// long records and only meet in the merge.
pub struct GrowthEngine {
    calculator: GrowthCalculator,
    top_makers: usize,
}

impl Default for GrowthEngine {
    fn default() -> Self {
        Self::new(GrowthConvention::default())
    }
}

impl GrowthEngine {
    pub fn new(convention: GrowthConvention) -> Self {
        Self {
            calculator: GrowthCalculator::new(convention),
            top_makers: DEFAULT_TOP_MAKERS,
        }
    }

    pub fn with_top_makers(mut self, top_makers: usize) -> Self {
        self.top_makers = top_makers;
        self
    }

    pub fn run(&self, wide: &WideTable) -> GrowthOutput {
        let mut diagnostics = Diagnostics::default();
        let records = unpivot(wide, &mut diagnostics);
        info!(
            "Unpivoted {} wide rows into {} monthly records",
            wide.rows.len(),
            records.len()
        );

        let monthly_totals = aggregate_monthly(&records);
        let quarterly_totals = aggregate_quarterly(&records);
        info!(
            "Aggregated into {} monthly and {} quarterly observations",
            monthly_totals.len(),
            quarterly_totals.len()
        );

        let monthly_growth: Vec<GrowthRecord<YearMonth>> = self.calculator.compute(&monthly_totals);
        let quarterly_growth: Vec<GrowthRecord<YearQuarter>> =
            self.calculator.compute(&quarterly_totals);

        let monthly = merge_growth(&monthly_growth, &quarterly_growth);
        let quarterly = quarterly_report(&quarterly_growth);
        let summary = summarize(&monthly, self.top_makers);

        info!(
            "Growth computed: {} monthly rows ({} with YoY), {} quarterly rows",
            monthly.len(),
            summary.rows_with_yoy,
            quarterly.len()
        );

        GrowthOutput {
            monthly,
            quarterly,
            summary,
            diagnostics,
        }
    }
}

pub fn compute_growth_metrics(wide: &WideTable) -> GrowthOutput {
    GrowthEngine::default().run(wide)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reshape::WideRow;
    use crate::schema::EntityGroup;
    use crate::table::CellValue;
    use std::collections::BTreeMap;

    fn row(maker: &str, year: i32, values: &[f64]) -> WideRow {
        WideRow {
            group: EntityGroup::new("2W", maker),
            year: Some(year),
            attributes: BTreeMap::new(),
            values: values.iter().map(|v| CellValue::Number(*v)).collect(),
        }
    }

    fn months(n: u32) -> Vec<String> {
        (1..=n).map(|m| format!("month_{}", m)).collect()
    }

    #[test]
    fn test_full_run_over_two_years() {
        let wide = WideTable {
            period_columns: months(12),
            rows: vec![
                row("ACME", 2023, &[100.0, 100.0, 100.0, 50.0, 50.0, 50.0, 0.0, 0.0, 0.0, 80.0, 80.0, 90.0]),
                row("ACME", 2024, &[150.0, 100.0, 50.0, 50.0, 50.0, 50.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ],
        };

        let output = compute_growth_metrics(&wide);

        assert_eq!(output.monthly.len(), 24);
        assert_eq!(output.quarterly.len(), 8);

        let jan_2024 = output
            .monthly
            .iter()
            .find(|r| r.year == 2024 && r.month == 1)
            .unwrap();
        assert_eq!(jan_2024.registrations_last_year, Some(100.0));
        assert_eq!(jan_2024.yoy_growth_pct, Some(50.0));
        // Q1 2024 = 300 against Q4 2023 = 250
        assert_eq!(jan_2024.registrations_last_quarter, Some(250.0));
        assert_eq!(jan_2024.qoq_growth_pct, Some(20.0));

        let jul_2024 = output
            .monthly
            .iter()
            .find(|r| r.year == 2024 && r.month == 7)
            .unwrap();
        assert_eq!(jul_2024.registrations_last_year, Some(0.0));
        assert_eq!(jul_2024.yoy_growth_pct, None);

        let q3_2023 = output
            .quarterly
            .iter()
            .find(|r| r.year_quarter == "2023-Q3")
            .unwrap();
        assert_eq!(q3_2023.registrations, 0.0);
        assert_eq!(q3_2023.qoq_growth_pct, Some(100.0));

        assert_eq!(output.summary.total_records, 24);
        assert_eq!(output.diagnostics, Diagnostics::default());
    }

    #[test]
    fn test_signed_engine_reports_declines() {
        let wide = WideTable {
            period_columns: months(1),
            rows: vec![row("ACME", 2023, &[150.0]), row("ACME", 2024, &[100.0])],
        };

        let output = GrowthEngine::new(GrowthConvention::Signed).run(&wide);
        assert_eq!(output.monthly[1].yoy_growth_pct, Some(-33.33));
    }

    #[test]
    fn test_empty_table_runs_to_empty_output() {
        let output = compute_growth_metrics(&WideTable::default());
        assert!(output.monthly.is_empty());
        assert!(output.quarterly.is_empty());
        assert_eq!(output.summary.total_records, 0);
    }
}
