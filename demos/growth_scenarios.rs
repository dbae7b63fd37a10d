use vehicle_growth_metrics::*;

fn month(year: i32, month: u32) -> YearMonth {
    YearMonth::new(year, month).unwrap()
}

fn quarter(year: i32, quarter: u32) -> YearQuarter {
    YearQuarter::new(year, quarter).unwrap()
}

fn print_records<P: ComparablePeriod>(title: &str, records: &[GrowthRecord<P>]) {
    println!("{}", title);
    for record in records {
        println!(
            "  {:<10} {:<8} current {:>6.0}  prior {:>8}  growth {:>8}",
            record.group.to_string(),
            record.period.label(),
            record.current,
            record.prior.map(|p| format!("{:.0}", p)).unwrap_or_else(|| "-".into()),
            record.growth_pct.map(|g| format!("{:.2}%", g)).unwrap_or_else(|| "-".into()),
        );
    }
    println!();
}

fn main() {
    println!("🔎 Growth lookback scenarios\n");

    let acme = EntityGroup::new("2W", "ACME");

    let rise = compute_growth(&[
        Observation::new(acme.clone(), month(2023, 1), 100.0),
        Observation::new(acme.clone(), month(2024, 1), 150.0),
    ]);
    print_records("YoY increase (100 → 150):", &rise);

    let fall = compute_growth(&[
        Observation::new(acme.clone(), month(2023, 1), 150.0),
        Observation::new(acme.clone(), month(2024, 1), 100.0),
    ]);
    print_records("YoY decrease (150 → 100), magnitude convention:", &fall);

    let signed = GrowthCalculator::new(GrowthConvention::Signed).compute(&[
        Observation::new(acme.clone(), month(2023, 1), 150.0),
        Observation::new(acme.clone(), month(2024, 1), 100.0),
    ]);
    print_records("YoY decrease (150 → 100), signed convention:", &signed);

    let rollover = compute_growth(&[
        Observation::new(acme.clone(), quarter(2023, 4), 250.0),
        Observation::new(acme.clone(), quarter(2024, 1), 200.0),
    ]);
    print_records("QoQ across the year boundary (Q4-2023 → Q1-2024):", &rollover);

    let gap = compute_growth(&[
        Observation::new(acme.clone(), quarter(2023, 1), 100.0),
        Observation::new(acme.clone(), quarter(2023, 3), 300.0),
        Observation::new(acme.clone(), quarter(2023, 4), 150.0),
    ]);
    print_records("Missing Q2: Q3 has no comparison, Q4 compares to Q3:", &gap);

    let zero = compute_growth(&[
        Observation::new(acme.clone(), month(2023, 6), 0.0),
        Observation::new(acme, month(2024, 6), 40.0),
    ]);
    print_records("Zero prior: growth is undefined:", &zero);
}
