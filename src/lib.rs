//! # Vehicle Growth Metrics
//!
//! A library for turning a directory of monthly vehicle-registration exports
//! into growth reports: year-over-year change per month and
//! quarter-over-quarter change per quarter, for every maker and vehicle type.
//!
//! ## Core Concepts
//!
//! - **Entity Group**: maker + vehicle type (+ optional category). Growth is
//!   never compared across groups.
//! - **Calendar lookback**: the comparison for Jan-2024 is Jan-2023 and for
//!   Q1-2024 is Q4-2023, found by calendar arithmetic. A missing period leaves
//!   the growth fields empty instead of comparing against a neighbouring row.
//! - **Diagnostics**: malformed rows and values never abort a run. They are
//!   dropped or coerced, counted, and logged.
//!
//! ## Pipeline
//!
//! raw files → [`combine`] → [`ingestion`] (cleaned wide table) →
//! [`reshape::unpivot`] → [`aggregate`] → [`growth`] → [`report`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use vehicle_growth_metrics::*;
//!
//! let mut config = PipelineConfig::new("raw data", "out/vehicle_growth_metrics.xlsx");
//! config.summary_output = Some("out/summary.json".into());
//!
//! let output = process_growth_metrics(&config).unwrap();
//! for row in output.monthly.iter().filter(|r| r.yoy_growth_pct.is_some()) {
//!     println!("{} {}: {:?}%", row.group, row.date, row.yoy_growth_pct);
//! }
//! ```

pub mod aggregate;
pub mod combine;
pub mod dashboard;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod growth;
pub mod ingestion;
pub mod io;
pub mod period;
pub mod report;
pub mod reshape;
pub mod schema;
pub mod table;
pub mod utils;

pub use aggregate::{aggregate, aggregate_monthly, aggregate_quarterly, roll_up};
pub use combine::{combine_directory, discover_files, FileContext};
pub use dashboard::{Dashboard, DashboardFilter, DashboardSnapshot, GrowthMetric, View};
pub use diagnostics::Diagnostics;
pub use engine::{compute_growth_metrics, GrowthEngine, GrowthOutput};
pub use error::{GrowthMetricsError, Result};
pub use growth::{compute_growth, growth_percentage, GrowthCalculator};
pub use ingestion::{clean_table, ColumnMapping, InputLayout};
pub use period::{ComparablePeriod, Granularity, YearMonth, YearQuarter};
pub use report::{
    merge_growth, quarterly_report, summarize, MonthlyReportRow, QuarterlyReportRow,
    SummaryStatistics,
};
pub use reshape::{pivot, unpivot, LongRecord, WideTable};
pub use schema::*;
pub use table::{CellValue, RawTable};

use crate::io::{write_json, write_table, write_table_with_sheet};
use crate::report::{monthly_rows_to_table, quarterly_rows_to_table, MONTHLY_SHEET, QUARTERLY_SHEET};
use log::{debug, info};

pub struct VehicleGrowthProcessor;

impl VehicleGrowthProcessor {
    /// Reads and concatenates every raw export under the configured directory.
    pub fn combine(config: &PipelineConfig, diagnostics: &mut Diagnostics) -> Result<RawTable> {
        combine_directory(&config.raw_data_dir, &config.file_extensions, diagnostics)
    }

    pub fn clean(combined: &RawTable, diagnostics: &mut Diagnostics) -> Result<WideTable> {
        clean_table(combined, diagnostics)
    }

    pub fn calculate(cleaned: &WideTable, config: &PipelineConfig) -> GrowthOutput {
        GrowthEngine::new(config.growth_convention)
            .with_top_makers(config.top_makers)
            .run(cleaned)
    }

    /// Runs the whole pipeline and writes every configured output.
    pub fn process(config: &PipelineConfig) -> Result<GrowthOutput> {
        config.validate()?;

        info!(
            "Processing registrations from {}",
            config.raw_data_dir.display()
        );
        debug!("Pipeline configuration: {:?}", config);

        let mut diagnostics = Diagnostics::default();
        let combined = Self::combine(config, &mut diagnostics)?;
        if let Some(path) = &config.combined_output {
            write_table(path, &combined)?;
            info!("Combined snapshot written to {}", path.display());
        }

        let cleaned = Self::clean(&combined, &mut diagnostics)?;
        if let Some(path) = &config.cleaned_output {
            write_table(path, &cleaned.to_table())?;
            info!("Cleaned snapshot written to {}", path.display());
        }

        let mut output = Self::calculate(&cleaned, config);
        diagnostics.merge(&output.diagnostics);
        output.diagnostics = diagnostics;

        Self::write_reports(config, &output)?;
        output.diagnostics.log_summary();

        Ok(output)
    }

    pub fn write_reports(config: &PipelineConfig, output: &GrowthOutput) -> Result<()> {
        write_table_with_sheet(
            &config.monthly_output,
            MONTHLY_SHEET,
            &monthly_rows_to_table(&output.monthly),
        )?;
        info!(
            "Monthly report ({} rows) written to {}",
            output.monthly.len(),
            config.monthly_output.display()
        );

        let quarterly_path = config.quarterly_output_path();
        write_table_with_sheet(
            &quarterly_path,
            QUARTERLY_SHEET,
            &quarterly_rows_to_table(&output.quarterly),
        )?;
        info!(
            "Quarterly report ({} rows) written to {}",
            output.quarterly.len(),
            quarterly_path.display()
        );

        if let Some(path) = &config.summary_output {
            write_json(path, &output.summary)?;
            info!("Summary written to {}", path.display());
        }

        Ok(())
    }
}

pub fn process_growth_metrics(config: &PipelineConfig) -> Result<GrowthOutput> {
    VehicleGrowthProcessor::process(config)
}
