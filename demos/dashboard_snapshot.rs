use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use vehicle_growth_metrics::*;

/// Loads the reports written by `growth_pipeline` and prints what the
/// dashboard would show for the two-wheeler market.
///
/// Usage: dashboard_snapshot [MONTHLY_REPORT] [QUARTERLY_REPORT]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let workspace = std::env::temp_dir().join("vehicle_growth_demo");
    let mut args = std::env::args().skip(1);
    let monthly_path: PathBuf = args
        .next()
        .map(Into::into)
        .unwrap_or_else(|| workspace.join("vehicle_growth_metrics.xlsx"));
    let quarterly_path: PathBuf = args
        .next()
        .map(Into::into)
        .unwrap_or_else(|| workspace.join("vehicle_growth_metrics_quarterly.xlsx"));

    if !monthly_path.exists() {
        bail!(
            "{} not found; run the growth_pipeline example first",
            monthly_path.display()
        );
    }

    let dashboard = Dashboard::from_files(&monthly_path, &quarterly_path)
        .context("loading growth reports")?;

    let options = dashboard.filter_options();
    println!("📊 Registrations Dashboard\n");
    println!("Vehicle types: {:?}", options.vehicle_types);
    println!("Makers:        {:?}", options.makers);
    if let Some((start, end)) = options.date_range {
        println!("Dates:         {} .. {}", start, end);
    }

    let filter = DashboardFilter {
        vehicle_types: Some(BTreeSet::from(["2W".to_string()])),
        ..Default::default()
    };

    for view in [View::Monthly, View::Quarterly] {
        let kpis = dashboard.kpis(view, &filter);
        println!("\n=== {:?} view (2W) ===", view);
        println!("Total registrations: {:.0}", kpis.total_registrations);
        if let Some(yoy) = kpis.mean_yoy_growth_pct {
            println!("Avg YoY growth:      {:.2}%", yoy);
        }
        if let Some(qoq) = kpis.mean_qoq_growth_pct {
            println!("Avg QoQ growth:      {:.2}%", qoq);
        }
    }

    let snapshot = dashboard.quarterly_snapshot(&filter);

    println!("\n📈 Registrations over time:");
    for (vehicle_type, points) in &snapshot.time_series {
        for point in points {
            println!("  {} {:<8} {:>12.0}", vehicle_type, point.period, point.registrations);
        }
    }

    println!("\n🏆 Top manufacturers by avg QoQ growth:");
    for maker in &snapshot.top_qoq {
        println!("  {:<20} {:>7.2}%", maker.maker, maker.mean_growth_pct);
    }

    println!("\n🥧 Market share:");
    for share in &snapshot.market_share {
        println!("  {:<20} {:>6.2}%", share.maker, share.share_pct);
    }

    println!("\n{}", serde_json::to_string_pretty(&snapshot.kpis)?);
    Ok(())
}
