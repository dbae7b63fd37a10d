use crate::table::CellValue;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Counts of every row or value the pipeline dropped or coerced.
///
/// Data-quality problems never abort a run; they are tallied here and
/// reported through [`Diagnostics::log_summary`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub files_read: usize,
    pub rows_read: usize,
    /// Rows whose serial number was not numeric (banners, totals, notes).
    pub non_data_rows: usize,
    /// Rows with a blank maker.
    pub missing_group_rows: usize,
    /// Rows whose year could not be determined.
    pub missing_year_rows: usize,
    /// Period labels that matched no known month token.
    pub invalid_period_labels: usize,
    /// Metric cells that were blank, non-numeric or negative and became 0.
    pub coerced_values: usize,
}

impl Diagnostics {
    pub fn merge(&mut self, other: &Diagnostics) {
        self.files_read += other.files_read;
        self.rows_read += other.rows_read;
        self.non_data_rows += other.non_data_rows;
        self.missing_group_rows += other.missing_group_rows;
        self.missing_year_rows += other.missing_year_rows;
        self.invalid_period_labels += other.invalid_period_labels;
        self.coerced_values += other.coerced_values;
    }

    /// Reads a registration count; blank, non-numeric and negative values
    /// count as 0 and are tallied.
    pub fn coerce_registrations(&mut self, cell: &CellValue) -> f64 {
        match cell.as_f64() {
            Some(value) if value >= 0.0 => value,
            _ => {
                self.coerced_values += 1;
                0.0
            }
        }
    }

    pub fn dropped_rows(&self) -> usize {
        self.non_data_rows + self.missing_group_rows + self.missing_year_rows
    }

    pub fn log_summary(&self) {
        info!(
            "Read {} rows from {} files; {} rows dropped",
            self.rows_read,
            self.files_read,
            self.dropped_rows()
        );

        if self.non_data_rows > 0 {
            warn!("Dropped {} non-data rows (non-numeric serial number)", self.non_data_rows);
        }
        if self.missing_group_rows > 0 {
            warn!("Dropped {} rows with a blank maker", self.missing_group_rows);
        }
        if self.missing_year_rows > 0 {
            warn!("Dropped {} rows whose year could not be determined", self.missing_year_rows);
        }
        if self.invalid_period_labels > 0 {
            warn!("Skipped {} unrecognized period labels", self.invalid_period_labels);
        }
        if self.coerced_values > 0 {
            warn!("Coerced {} non-numeric registration values to 0", self.coerced_values);
        }
    }
}
