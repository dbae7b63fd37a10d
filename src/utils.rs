use crate::error::{GrowthMetricsError, Result};
use chrono::NaiveDate;

pub fn first_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        GrowthMetricsError::DateError(format!("No calendar date for {}-{:02}-01", year, month))
    })
}

/// Quarter (1-4) a calendar month belongs to.
pub fn quarter_of_month(month: u32) -> u32 {
    ((month.max(1) - 1) / 3) + 1
}

pub fn year_quarter_label(year: i32, quarter: u32) -> String {
    format!("{}-Q{}", year, quarter)
}

/// Rounds to the given number of decimals, breaking exact ties toward the
/// even digit (0.125 -> 0.12, 0.375 -> 0.38).
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}

/// Maps NaN and +/- infinity to `None`.
pub fn finite_or_none(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Parses a month string in the format "YYYY-MM" (a trailing "-DD" is
/// tolerated so canonical dates read back from snapshots also parse).
/// Returns (year, month).
pub fn parse_year_month_string(period: &str) -> Result<(i32, u32)> {
    let trimmed = period.trim();
    let parts: Vec<&str> = trimmed.split('-').collect();

    if parts.len() < 2 || parts.len() > 3 {
        return Err(GrowthMetricsError::DateError(format!(
            "Invalid period format: {}. Expected 'YYYY-MM'",
            period
        )));
    }

    let year = parts[0].parse::<i32>().map_err(|_| {
        GrowthMetricsError::DateError(format!("Invalid year in period: {}", period))
    })?;
    let month = parts[1].parse::<u32>().map_err(|_| {
        GrowthMetricsError::DateError(format!("Invalid month in period: {}", period))
    })?;

    if !(1..=12).contains(&month) {
        return Err(GrowthMetricsError::DateError(format!(
            "Month out of range in period: {}",
            period
        )));
    }

    Ok((year, month))
}
