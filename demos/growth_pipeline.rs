use anyhow::Result;
use vehicle_growth_metrics::io::write_table;
use vehicle_growth_metrics::*;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Writes a year of portal-style exports for one vehicle type.
fn write_sample_exports(
    dir: &std::path::Path,
    vehicle_type: &str,
    year: i32,
    makers: &[(&str, f64, f64)],
) -> Result<()> {
    for (idx, month) in MONTHS.iter().enumerate() {
        let mut table = RawTable::with_headers(&["S No", "Maker", "Registrations"]);
        for (n, (maker, base, monthly_step)) in makers.iter().enumerate() {
            table.push_row(vec![
                CellValue::from((n + 1) as f64),
                CellValue::from(*maker),
                CellValue::from((base + monthly_step * idx as f64).round()),
            ]);
        }
        table.push_row(vec!["Total".into(), CellValue::Empty, CellValue::Empty]);

        write_table(dir.join(format!("{}_{}_{}.xlsx", vehicle_type, month, year)), &table)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("🚗 Vehicle Registration Growth Pipeline\n");

    let workspace = std::env::temp_dir().join("vehicle_growth_demo");
    let raw_dir = workspace.join("raw data");
    std::fs::create_dir_all(&raw_dir)?;

    write_sample_exports(&raw_dir, "2W", 2023, &[("HERO MOTOCORP", 420_000.0, 5_000.0), ("TVS MOTOR", 250_000.0, 2_000.0)])?;
    write_sample_exports(&raw_dir, "2W", 2024, &[("HERO MOTOCORP", 465_000.0, 4_000.0), ("TVS MOTOR", 240_000.0, 3_500.0)])?;
    write_sample_exports(&raw_dir, "4W", 2023, &[("MARUTI SUZUKI", 140_000.0, 800.0)])?;
    write_sample_exports(&raw_dir, "4W", 2024, &[("MARUTI SUZUKI", 151_000.0, 600.0)])?;

    let mut config = PipelineConfig::new(&raw_dir, workspace.join("vehicle_growth_metrics.xlsx"));
    config.combined_output = Some(workspace.join("vehicle_registrations_combined.xlsx"));
    config.cleaned_output = Some(workspace.join("vehicle_registrations_cleaned.xlsx"));
    config.summary_output = Some(workspace.join("summary.json"));

    let output = process_growth_metrics(&config)?;

    println!("\n📈 Latest month per group:");
    let latest = output.monthly.iter().map(|r| r.date).max();
    for row in output.monthly.iter().filter(|r| Some(r.date) == latest) {
        println!(
            "  {:<28} {:>10.0}  YoY {:>7}  QoQ {:>7}",
            row.group.to_string(),
            row.registrations,
            format_pct(row.yoy_growth_pct),
            format_pct(row.qoq_growth_pct),
        );
    }

    println!("\n🏆 Top makers by mean YoY growth:");
    for maker in &output.summary.top_yoy_makers {
        println!(
            "  {:<20} {:>7.2}%  ({:.0} registrations)",
            maker.maker, maker.mean_yoy_growth_pct, maker.total_registrations
        );
    }

    println!("\n✅ Reports written to {}", workspace.display());
    println!("   Monthly:   {}", config.monthly_output.display());
    println!("   Quarterly: {}", config.quarterly_output_path().display());

    Ok(())
}

fn format_pct(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}%", v)).unwrap_or_else(|| "N/A".to_string())
}
