use crate::error::{GrowthMetricsError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const COL_VEHICLE_TYPE: &str = "vehicle_type";
pub const COL_VEHICLE_CATEGORY: &str = "vehicle_category";
pub const COL_MAKER: &str = "maker";
pub const COL_DATE: &str = "date";
pub const COL_YEAR: &str = "year";
pub const COL_MONTH: &str = "month";
pub const COL_QUARTER: &str = "quarter";
pub const COL_YEAR_QUARTER: &str = "year_quarter";
pub const COL_REGISTRATIONS: &str = "registrations";
pub const COL_REGISTRATIONS_LAST_YEAR: &str = "registrations_last_year";
pub const COL_YOY_GROWTH: &str = "yoy_growth_pct";
pub const COL_REGISTRATIONS_LAST_QUARTER: &str = "registrations_last_quarter";
pub const COL_QOQ_GROWTH: &str = "qoq_growth_pct";
pub const COL_SERIAL: &str = "S No";

/// The key that partitions every growth comparison.
///
/// Ordering follows field order: vehicle type, then category (absent first),
/// then maker.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct EntityGroup {
    pub vehicle_type: String,
    pub vehicle_category: Option<String>,
    pub maker: String,
}

impl EntityGroup {
    pub fn new(vehicle_type: impl Into<String>, maker: impl Into<String>) -> Self {
        Self {
            vehicle_type: vehicle_type.into(),
            vehicle_category: None,
            maker: maker.into(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.vehicle_category = Some(category.into());
        self
    }
}

impl fmt::Display for EntityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.vehicle_category {
            Some(category) => write!(f, "{}/{}/{}", self.maker, self.vehicle_type, category),
            None => write!(f, "{}/{}", self.maker, self.vehicle_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation<P> {
    pub group: EntityGroup,
    pub period: P,
    pub registrations: f64,
}

impl<P> Observation<P> {
    pub fn new(group: EntityGroup, period: P, registrations: f64) -> Self {
        Self {
            group,
            period,
            registrations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRecord<P> {
    pub group: EntityGroup,
    pub period: P,
    pub current: f64,
    /// Value at the calendar-prior period, when an observation exists there.
    pub prior: Option<f64>,
    /// Only set when `prior` is strictly positive.
    pub growth_pct: Option<f64>,
}

/// How the sign of a period-over-period change is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GrowthConvention {
    /// Magnitude only: a 50% rise and a 50% fall both report 50.0.
    #[default]
    #[schemars(description = "Report the magnitude of change only; decreases show as positive percentages.")]
    Absolute,

    #[schemars(description = "Keep the sign; decreases show as negative percentages.")]
    Signed,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    #[schemars(description = "Directory holding the raw per-vehicle-type/month/year exports.")]
    pub raw_data_dir: PathBuf,

    #[serde(default = "default_file_extensions")]
    #[schemars(description = "File extensions picked up from raw_data_dir (case-insensitive).")]
    pub file_extensions: Vec<String>,

    #[serde(default)]
    #[schemars(description = "Optional snapshot of the combined long-form table.")]
    pub combined_output: Option<PathBuf>,

    #[serde(default)]
    #[schemars(description = "Optional snapshot of the cleaned month-by-month table.")]
    pub cleaned_output: Option<PathBuf>,

    #[schemars(description = "Monthly report with YoY and QoQ growth (csv or xlsx).")]
    pub monthly_output: PathBuf,

    #[serde(default)]
    #[schemars(description = "Quarterly report. Defaults to '<monthly stem>_quarterly.<ext>'.")]
    pub quarterly_output: Option<PathBuf>,

    #[serde(default)]
    #[schemars(description = "Optional JSON file receiving the summary statistics.")]
    pub summary_output: Option<PathBuf>,

    #[serde(default)]
    pub growth_convention: GrowthConvention,

    #[serde(default = "default_top_makers")]
    #[schemars(description = "How many makers the top-YoY summary lists.")]
    pub top_makers: usize,
}

fn default_file_extensions() -> Vec<String> {
    vec!["xlsx".to_string(), "xls".to_string(), "csv".to_string()]
}

fn default_top_makers() -> usize {
    10
}

impl PipelineConfig {
    pub fn new(raw_data_dir: impl Into<PathBuf>, monthly_output: impl Into<PathBuf>) -> Self {
        Self {
            raw_data_dir: raw_data_dir.into(),
            file_extensions: default_file_extensions(),
            combined_output: None,
            cleaned_output: None,
            monthly_output: monthly_output.into(),
            quarterly_output: None,
            summary_output: None,
            growth_convention: GrowthConvention::default(),
            top_makers: default_top_makers(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.file_extensions.is_empty() {
            return Err(GrowthMetricsError::InvalidConfig(
                "file_extensions must list at least one extension".to_string(),
            ));
        }

        if self.monthly_output.file_name().is_none() {
            return Err(GrowthMetricsError::InvalidConfig(format!(
                "monthly_output '{}' has no file name",
                self.monthly_output.display()
            )));
        }

        if self.top_makers == 0 {
            return Err(GrowthMetricsError::InvalidConfig(
                "top_makers must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// The quarterly report path, derived from the monthly one when unset.
    pub fn quarterly_output_path(&self) -> PathBuf {
        if let Some(path) = &self.quarterly_output {
            return path.clone();
        }

        let stem = self
            .monthly_output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = match self.monthly_output.extension() {
            Some(ext) => format!("{}_quarterly.{}", stem, ext.to_string_lossy()),
            None => format!("{}_quarterly", stem),
        };
        self.monthly_output.with_file_name(file_name)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PipelineConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
