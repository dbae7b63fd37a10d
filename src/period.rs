//! Calendar periods and the normalizer that maps raw labels onto them.
//!
//! Raw exports label months in several ways (`JAN`, `January`, `month_1`,
//! `1`) and years as numbers or text. Everything downstream works with
//! [`YearMonth`] and [`YearQuarter`], which compare by calendar position.

use crate::error::{GrowthMetricsError, Result};
use crate::utils::{first_day_of_month, parse_year_month_string, quarter_of_month, year_quarter_label};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

pub const MONTH_COLUMN_PREFIX: &str = "month_";

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2200;

/// Whether a year falls in the range periods may be built for.
pub fn is_supported_year(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}

fn check_year(year: i32, label: impl FnOnce() -> String) -> Result<i32> {
    if is_supported_year(year) {
        Ok(year)
    } else {
        Err(GrowthMetricsError::InvalidPeriod(label()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Month,
    Quarter,
}

impl Granularity {
    /// Name of the growth metric computed at this granularity.
    pub fn metric_name(&self) -> &'static str {
        match self {
            Granularity::Month => "YoY",
            Granularity::Quarter => "QoQ",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Month => write!(f, "monthly"),
            Granularity::Quarter => write!(f, "quarterly"),
        }
    }
}

/// A period whose comparison target is found by calendar arithmetic.
pub trait ComparablePeriod: Copy + Ord + Hash + fmt::Debug {
    const GRANULARITY: Granularity;

    /// The period this one is compared against: same month a year earlier
    /// for months, the preceding quarter for quarters.
    fn comparison_period(&self) -> Self;

    fn label(&self) -> String;
}

/// A calendar month. The year lies in 1900..=2200 and the month in 1..=12.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(try_from = "MonthParts")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct MonthParts {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let invalid = || format!("{}-{}", year, month);
        if !(1..=12).contains(&month) {
            return Err(GrowthMetricsError::InvalidPeriod(invalid()));
        }
        let year = check_year(year, invalid)?;
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn quarter(&self) -> u32 {
        quarter_of_month(self.month)
    }

    pub fn year_quarter(&self) -> YearQuarter {
        YearQuarter {
            year: self.year,
            quarter: self.quarter(),
        }
    }

    /// Canonical date key: the first day of the month.
    pub fn date(&self) -> NaiveDate {
        // bounded year and month always name a real day
        first_day_of_month(self.year, self.month).unwrap_or_default()
    }
}

impl TryFrom<MonthParts> for YearMonth {
    type Error = GrowthMetricsError;

    fn try_from(parts: MonthParts) -> Result<Self> {
        Self::new(parts.year, parts.month)
    }
}

impl ComparablePeriod for YearMonth {
    const GRANULARITY: Granularity = Granularity::Month;

    fn comparison_period(&self) -> Self {
        Self {
            year: self.year.saturating_sub(1),
            month: self.month,
        }
    }

    fn label(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for YearMonth {
    type Err = GrowthMetricsError;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = parse_year_month_string(s)?;
        Self::new(year, month)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(try_from = "QuarterParts")]
pub struct YearQuarter {
    year: i32,
    quarter: u32,
}

impl YearQuarter {
    pub fn new(year: i32, quarter: u32) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(GrowthMetricsError::InvalidQuarter(quarter));
        }
        let year = check_year(year, || year_quarter_label(year, quarter))?;
        Ok(Self { year, quarter })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u32 {
        self.quarter
    }
}

#[derive(Deserialize)]
struct QuarterParts {
    year: i32,
    quarter: u32,
}

impl TryFrom<QuarterParts> for YearQuarter {
    type Error = GrowthMetricsError;

    fn try_from(parts: QuarterParts) -> Result<Self> {
        Self::new(parts.year, parts.quarter)
    }
}

impl ComparablePeriod for YearQuarter {
    const GRANULARITY: Granularity = Granularity::Quarter;

    fn comparison_period(&self) -> Self {
        if self.quarter == 1 {
            Self {
                year: self.year.saturating_sub(1),
                quarter: 4,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter - 1,
            }
        }
    }

    fn label(&self) -> String {
        year_quarter_label(self.year, self.quarter)
    }
}

impl From<YearMonth> for YearQuarter {
    fn from(month: YearMonth) -> Self {
        month.year_quarter()
    }
}

impl fmt::Display for YearQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for YearQuarter {
    type Err = GrowthMetricsError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || GrowthMetricsError::InvalidPeriod(s.to_string());
        let (year, quarter) = s.trim().split_once("-Q").ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let quarter = quarter.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, quarter)
    }
}

/// Maps a month label to its number (1-12).
///
/// Recognized forms: abbreviations and full names in any case (`JAN`,
/// `january`), the `month_<n>` headers written by [`crate::reshape::pivot`],
/// and plain numbers (`1`, `01`, `12`).
pub fn parse_month_token(label: &str) -> Result<u32> {
    let token = label.trim();
    let invalid = || GrowthMetricsError::InvalidPeriod(label.to_string());

    if token.is_empty() {
        return Err(invalid());
    }

    if let Ok(month) = token.parse::<chrono::Month>() {
        return Ok(month.number_from_month());
    }

    let lowered = token.to_lowercase();
    let numeric = lowered.strip_prefix(MONTH_COLUMN_PREFIX).unwrap_or(&lowered);

    match parse_whole_number(numeric) {
        Some(n) if (1..=12).contains(&n) => Ok(n as u32),
        _ => Err(invalid()),
    }
}

/// Reads a year from a label such as `2023` or `2023.0`.
pub fn parse_year_token(label: &str) -> Option<i32> {
    parse_whole_number(label.trim())
        .and_then(|n| i32::try_from(n).ok())
        .filter(|year| is_supported_year(*year))
}

pub fn year_from_number(value: f64) -> Option<i32> {
    if value.is_finite() && value.fract() == 0.0 {
        parse_year_token(&format!("{}", value as i64))
    } else {
        None
    }
}

/// Builds a [`YearMonth`] from a year label and a month label.
pub fn normalize_period(year_label: &str, month_label: &str) -> Result<YearMonth> {
    let year = parse_year_token(year_label)
        .ok_or_else(|| GrowthMetricsError::InvalidPeriod(year_label.to_string()))?;
    let month = parse_month_token(month_label)?;
    YearMonth::new(year, month)
}

fn parse_whole_number(token: &str) -> Option<i64> {
    if let Ok(n) = token.parse::<i64>() {
        return Some(n);
    }
    match token.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i64),
        _ => None,
    }
}
