use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::Path;
use vehicle_growth_metrics::io::{read_table, read_table_with_sheet, write_table};
use vehicle_growth_metrics::report::{MONTHLY_SHEET, QUARTERLY_SHEET};
use vehicle_growth_metrics::*;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Writes one raw export per month in the shape the registration portal
/// produces: a serial column, maker, registrations and a trailing total row.
fn write_monthly_exports(
    dir: &Path,
    vehicle_type: &str,
    year: i32,
    extension: &str,
    makers: &[(&str, [f64; 12])],
) {
    for (idx, month) in MONTHS.iter().enumerate() {
        let mut table = RawTable::with_headers(&["S No", "Maker", "Registrations"]);
        let mut total = 0.0;
        for (n, (maker, values)) in makers.iter().enumerate() {
            table.push_row(vec![
                CellValue::from((n + 1) as f64),
                CellValue::from(*maker),
                CellValue::from(values[idx]),
            ]);
            total += values[idx];
        }
        table.push_row(vec!["Total".into(), CellValue::Empty, total.into()]);

        let path = dir.join(format!("{}_{}_{}.{}", vehicle_type, month, year, extension));
        write_table(&path, &table).unwrap();
    }
}

fn find_monthly<'a>(
    rows: &'a [MonthlyReportRow],
    vehicle_type: &str,
    maker: &str,
    year: i32,
    month: u32,
) -> &'a MonthlyReportRow {
    rows.iter()
        .find(|r| {
            r.group.vehicle_type == vehicle_type
                && r.group.maker == maker
                && r.year == year
                && r.month == month
        })
        .unwrap()
}

#[test]
fn test_two_wheeler_market_over_two_years() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    write_monthly_exports(
        raw.path(),
        "2W",
        2023,
        "xlsx",
        &[
            ("HERO MOTOCORP", [100.0, 110.0, 120.0, 90.0, 95.0, 100.0, 80.0, 85.0, 90.0, 150.0, 160.0, 140.0]),
            ("BAJAJ AUTO", [50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0]),
        ],
    );
    write_monthly_exports(
        raw.path(),
        "2W",
        2024,
        "xlsx",
        &[
            ("HERO MOTOCORP", [150.0, 99.0, 120.0, 90.0, 95.0, 100.0, 80.0, 85.0, 90.0, 150.0, 160.0, 140.0]),
            ("BAJAJ AUTO", [25.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 0.0]),
        ],
    );

    let mut config = PipelineConfig::new(raw.path(), out.path().join("vehicle_growth_metrics.xlsx"));
    config.combined_output = Some(out.path().join("combined.xlsx"));
    config.cleaned_output = Some(out.path().join("cleaned.xlsx"));
    config.summary_output = Some(out.path().join("summary.json"));

    let output = process_growth_metrics(&config).unwrap();

    // 2 makers x 24 months, 2 makers x 8 quarters
    assert_eq!(output.monthly.len(), 48);
    assert_eq!(output.quarterly.len(), 16);

    assert_eq!(output.diagnostics.files_read, 24);
    assert_eq!(output.diagnostics.rows_read, 72);
    assert_eq!(output.diagnostics.non_data_rows, 24);
    assert_eq!(output.diagnostics.missing_group_rows, 0);

    let hero_jan = find_monthly(&output.monthly, "2W", "HERO MOTOCORP", 2024, 1);
    assert_eq!(hero_jan.registrations_last_year, Some(100.0));
    assert_eq!(hero_jan.yoy_growth_pct, Some(50.0));
    assert_eq!(hero_jan.year_quarter, "2024-Q1");

    let hero_feb = find_monthly(&output.monthly, "2W", "HERO MOTOCORP", 2024, 2);
    assert_eq!(hero_feb.yoy_growth_pct, Some(10.0));

    // Q1-2024 = 369 against Q4-2023 = 450
    assert_eq!(hero_feb.registrations_last_quarter, Some(450.0));
    assert_eq!(hero_feb.qoq_growth_pct, Some(18.0));

    let bajaj_jan = find_monthly(&output.monthly, "2W", "BAJAJ AUTO", 2024, 1);
    assert_eq!(bajaj_jan.yoy_growth_pct, Some(50.0));

    let hero_jan_2023 = find_monthly(&output.monthly, "2W", "HERO MOTOCORP", 2023, 1);
    assert_eq!(hero_jan_2023.registrations_last_year, None);
    assert_eq!(hero_jan_2023.yoy_growth_pct, None);
    assert_eq!(hero_jan_2023.qoq_growth_pct, None);

    assert!(output
        .monthly
        .iter()
        .filter_map(|r| r.yoy_growth_pct)
        .all(|pct| pct >= 0.0));

    let dates: Vec<NaiveDate> = output.monthly.iter().map(|r| r.date).collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);

    assert_eq!(output.summary.unique_makers, 2);
    assert_eq!(output.summary.rows_with_yoy, 24);
    assert_eq!(output.summary.vehicle_types[0].vehicle_type, "2W");

    for name in [
        "vehicle_growth_metrics.xlsx",
        "vehicle_growth_metrics_quarterly.xlsx",
        "combined.xlsx",
        "cleaned.xlsx",
        "summary.json",
    ] {
        assert!(out.path().join(name).exists(), "{} missing", name);
    }

    let cleaned = read_table(out.path().join("cleaned.xlsx")).unwrap();
    assert_eq!(cleaned.len(), 4);
    assert!(cleaned.column_index("month_12").is_some());
}

#[test]
fn test_reports_load_back_into_dashboard() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    write_monthly_exports(
        raw.path(),
        "2W",
        2023,
        "csv",
        &[("ACME", [100.0; 12]), ("ZETA", [10.0; 12])],
    );
    write_monthly_exports(
        raw.path(),
        "2W",
        2024,
        "csv",
        &[("ACME", [150.0; 12]), ("ZETA", [5.0; 12])],
    );
    write_monthly_exports(raw.path(), "3W", 2024, "csv", &[("ACME", [20.0; 12])]);

    let config = PipelineConfig::new(raw.path(), out.path().join("growth.xlsx"));
    let output = process_growth_metrics(&config).unwrap();

    let monthly_table = read_table_with_sheet(out.path().join("growth.xlsx"), MONTHLY_SHEET).unwrap();
    assert_eq!(monthly_table.headers[0], COL_VEHICLE_TYPE);
    assert_eq!(monthly_table.len(), output.monthly.len());
    assert!(read_table_with_sheet(out.path().join("growth_quarterly.xlsx"), QUARTERLY_SHEET).is_ok());

    let dashboard = Dashboard::from_files(
        out.path().join("growth.xlsx"),
        out.path().join("growth_quarterly.xlsx"),
    )
    .unwrap();
    assert_eq!(dashboard.monthly(), output.monthly.as_slice());
    assert_eq!(dashboard.quarterly(), output.quarterly.as_slice());

    let options = dashboard.filter_options();
    assert_eq!(options.vehicle_types, BTreeSet::from(["2W".to_string(), "3W".to_string()]));
    assert_eq!(options.year_range, Some((2023, 2024)));

    let filter = DashboardFilter {
        vehicle_types: Some(BTreeSet::from(["2W".to_string()])),
        date_range: Some((
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
        )),
        ..Default::default()
    };
    let snapshot = dashboard.monthly_snapshot(&filter);

    assert_eq!(snapshot.rows.len(), 24);
    assert_eq!(snapshot.kpis.total_registrations, 12.0 * 155.0);
    assert_eq!(snapshot.kpis.mean_yoy_growth_pct, Some(50.0));
    assert_eq!(snapshot.time_series["2W"].len(), 12);
    assert_eq!(snapshot.top_yoy.len(), 2);
    assert_eq!(snapshot.top_yoy[0].mean_growth_pct, 50.0);
    assert_eq!(snapshot.market_share[0].maker, "ACME");

    let quarterly = dashboard.quarterly_snapshot(&DashboardFilter {
        year_range: Some((2024, 2024)),
        ..Default::default()
    });
    assert_eq!(quarterly.rows.len(), 12);
    assert_eq!(quarterly.kpis.mean_yoy_growth_pct, None);
}

#[test]
fn test_wide_snapshot_input_with_gaps() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    // A cleaned month-by-month snapshot fed straight back in, with Q2-2023
    // missing for ACME.
    let mut table = RawTable::with_headers(&[
        "vehicle_type", "maker", "year", "month_1", "month_2", "month_3", "month_7", "month_8", "month_9",
    ]);
    table.push_row(vec![
        "4W".into(), "ACME".into(), 2023.0.into(),
        10.0.into(), 10.0.into(), 10.0.into(), 30.0.into(), 30.0.into(), 30.0.into(),
    ]);
    table.push_row(vec![
        "4W".into(), "".into(), 2023.0.into(),
        1.0.into(), 1.0.into(), 1.0.into(), 1.0.into(), 1.0.into(), 1.0.into(),
    ]);
    write_table(raw.path().join("snapshot.csv"), &table).unwrap();

    let config = PipelineConfig::new(raw.path(), out.path().join("growth.csv"));
    let output = process_growth_metrics(&config).unwrap();

    assert_eq!(output.diagnostics.missing_group_rows, 1);
    assert_eq!(output.quarterly.len(), 2);

    let q3 = output
        .quarterly
        .iter()
        .find(|r| r.year_quarter == "2023-Q3")
        .unwrap();
    assert_eq!(q3.registrations, 90.0);
    assert_eq!(q3.registrations_last_quarter, None);
    assert_eq!(q3.qoq_growth_pct, None);

    let report = read_table(out.path().join("growth.csv")).unwrap();
    let qoq = report.column_index(COL_QOQ_GROWTH).unwrap();
    assert!((0..report.len()).all(|row| report.cell(row, qoq).is_blank()));
}

#[test]
fn test_signed_growth_from_config_file() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    write_monthly_exports(raw.path(), "2W", 2023, "csv", &[("ACME", [150.0; 12])]);
    write_monthly_exports(raw.path(), "2W", 2024, "csv", &[("ACME", [100.0; 12])]);

    let config_path = out.path().join("pipeline.json");
    let json = serde_json::json!({
        "raw_data_dir": raw.path(),
        "monthly_output": out.path().join("growth.csv"),
        "growth_convention": "signed",
        "top_makers": 3
    });
    std::fs::write(&config_path, json.to_string()).unwrap();

    let config = PipelineConfig::from_json_file(&config_path).unwrap();
    let output = process_growth_metrics(&config).unwrap();

    let jan = find_monthly(&output.monthly, "2W", "ACME", 2024, 1);
    assert_eq!(jan.yoy_growth_pct, Some(-33.33));
    assert_eq!(output.summary.top_yoy_makers[0].mean_yoy_growth_pct, -33.33);
}

#[test]
fn test_empty_raw_directory_produces_empty_reports() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let config = PipelineConfig::new(raw.path(), out.path().join("growth.csv"));
    let output = process_growth_metrics(&config).unwrap();

    assert!(output.monthly.is_empty());
    assert!(output.quarterly.is_empty());
    assert_eq!(output.summary.total_records, 0);

    let report = read_table(out.path().join("growth.csv")).unwrap();
    assert!(report.is_empty());
    assert_eq!(report.column_index(COL_YOY_GROWTH), Some(9));
}

#[test]
fn test_schema_generation() {
    let schema = PipelineConfig::schema_as_json().unwrap();
    assert!(schema.contains("raw_data_dir"));
    assert!(schema.contains("growth_convention"));
    assert!(schema.contains("top_makers"));
}
