use crate::period::{ComparablePeriod, YearMonth, YearQuarter};
use crate::reshape::LongRecord;
use crate::schema::{EntityGroup, Observation};
use log::debug;
use std::collections::BTreeMap;

/// Sums observations into one row per (group, `Q` period).
///
/// `Q` is the target granularity; rolling months into quarters and
/// re-aggregating months (`Q = P`) use the same code path. Output is sorted
/// by group, then period.
pub fn roll_up<P, Q>(observations: &[Observation<P>]) -> Vec<Observation<Q>>
where
    P: Copy,
    Q: ComparablePeriod + From<P>,
{
    let mut totals: BTreeMap<(EntityGroup, Q), f64> = BTreeMap::new();

    for observation in observations {
        *totals
            .entry((observation.group.clone(), Q::from(observation.period)))
            .or_insert(0.0) += observation.registrations;
    }

    debug!(
        "Aggregated {} observations into {} {} rows",
        observations.len(),
        totals.len(),
        Q::GRANULARITY
    );

    totals
        .into_iter()
        .map(|((group, period), registrations)| Observation::new(group, period, registrations))
        .collect()
}

/// Same-granularity aggregation. Idempotent.
pub fn aggregate<P: ComparablePeriod>(observations: &[Observation<P>]) -> Vec<Observation<P>> {
    roll_up::<P, P>(observations)
}

pub fn aggregate_monthly(records: &[LongRecord]) -> Vec<Observation<YearMonth>> {
    aggregate(&to_observations(records))
}

pub fn aggregate_quarterly(records: &[LongRecord]) -> Vec<Observation<YearQuarter>> {
    roll_up(&to_observations(records))
}

fn to_observations(records: &[LongRecord]) -> Vec<Observation<YearMonth>> {
    records.iter().map(LongRecord::observation).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    fn records() -> Vec<LongRecord> {
        let acme = EntityGroup::new("2W", "ACME");
        let zeta = EntityGroup::new("2W", "ZETA");
        vec![
            LongRecord::new(acme.clone(), month(2023, 2), 20.0),
            LongRecord::new(acme.clone(), month(2023, 1), 10.0),
            LongRecord::new(acme.clone(), month(2023, 1), 5.0),
            LongRecord::new(acme.clone(), month(2023, 4), 40.0),
            LongRecord::new(zeta, month(2023, 3), 3.0),
        ]
    }

    #[test]
    fn test_monthly_sums_duplicates() {
        let monthly = aggregate_monthly(&records());

        assert_eq!(monthly.len(), 4);
        assert_eq!(monthly[0].period, month(2023, 1));
        assert_eq!(monthly[0].registrations, 15.0);
        assert_eq!(monthly[1].period, month(2023, 2));
        assert_eq!(monthly[3].group.maker, "ZETA");
    }

    #[test]
    fn test_quarterly_rolls_months_into_quarters() {
        let quarterly = aggregate_quarterly(&records());

        assert_eq!(quarterly.len(), 3);
        assert_eq!(quarterly[0].period, YearQuarter::new(2023, 1).unwrap());
        assert_eq!(quarterly[0].registrations, 35.0);
        assert_eq!(quarterly[1].period, YearQuarter::new(2023, 2).unwrap());
        assert_eq!(quarterly[1].registrations, 40.0);
        assert_eq!(quarterly[2].registrations, 3.0);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let monthly = aggregate_monthly(&records());
        assert_eq!(aggregate(&monthly), monthly);

        let quarterly = aggregate_quarterly(&records());
        assert_eq!(aggregate(&quarterly), quarterly);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_monthly(&[]).is_empty());
        assert!(aggregate_quarterly(&[]).is_empty());
    }
}
