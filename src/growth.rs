//! Period-over-period growth per entity group.
//!
//! The comparison target of every observation is found by calendar
//! arithmetic ([`ComparablePeriod::comparison_period`]) and looked up by exact
//! match inside the group. A group with a gap never compares against its
//! neighbouring row unless that row is exactly the calendar-prior period.
//!
//! Growth is reported as a magnitude by default: a rise from 100 to 150 and
//! a fall from 150 to 100 report 50.00 and 33.33 respectively. Use
//! [`GrowthConvention::Signed`] to keep the direction.

use crate::period::ComparablePeriod;
use crate::schema::{EntityGroup, GrowthConvention, GrowthRecord, Observation};
use crate::utils::round_to;
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// Percentage change from `prior` to `current`, rounded to 2 decimals.
///
/// Returns `None` when `prior` is not strictly positive or either value is
/// not finite.
pub fn growth_percentage(current: f64, prior: f64, convention: GrowthConvention) -> Option<f64> {
    if !prior.is_finite() || prior <= 0.0 || !current.is_finite() {
        return None;
    }

    let change = (current - prior) / prior * 100.0;
    let change = match convention {
        GrowthConvention::Absolute => change.abs(),
        GrowthConvention::Signed => change,
    };

    Some(round_to(change, 2)).filter(|pct| pct.is_finite())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GrowthCalculator {
    convention: GrowthConvention,
}

impl GrowthCalculator {
    pub fn new(convention: GrowthConvention) -> Self {
        Self { convention }
    }

    pub fn convention(&self) -> GrowthConvention {
        self.convention
    }

    /// Computes growth for every observation, group by group.
    ///
    /// Output is ordered by group, then period; observations sharing a
    /// period keep their input order.
    pub fn compute<P: ComparablePeriod>(
        &self,
        observations: &[Observation<P>],
    ) -> Vec<GrowthRecord<P>> {
        let mut groups: BTreeMap<&EntityGroup, Vec<(P, f64)>> = BTreeMap::new();
        for observation in observations {
            groups
                .entry(&observation.group)
                .or_default()
                .push((observation.period, observation.registrations));
        }

        let records: Vec<GrowthRecord<P>> = groups
            .into_iter()
            .flat_map(|(group, mut series)| {
                series.sort_by_key(|(period, _)| *period);
                self.compute_group(group, &series)
            })
            .collect();

        debug!(
            "Computed {} {} records, {} with a growth percentage",
            records.len(),
            P::GRANULARITY.metric_name(),
            records.iter().filter(|r| r.growth_pct.is_some()).count()
        );

        records
    }

    /// Growth for a single group's series, which must be sorted by period.
    ///
    /// Pure: returns new records and leaves the input untouched. When a
    /// period appears more than once the first occurrence is the comparison
    /// value.
    pub fn compute_group<P: ComparablePeriod>(
        &self,
        group: &EntityGroup,
        series: &[(P, f64)],
    ) -> Vec<GrowthRecord<P>> {
        let mut by_period: HashMap<P, f64> = HashMap::with_capacity(series.len());
        for (period, value) in series {
            by_period.entry(*period).or_insert(*value);
        }

        series
            .iter()
            .map(|(period, current)| {
                let prior = by_period.get(&period.comparison_period()).copied();
                let growth_pct =
                    prior.and_then(|prior| growth_percentage(*current, prior, self.convention));

                GrowthRecord {
                    group: group.clone(),
                    period: *period,
                    current: *current,
                    prior,
                    growth_pct,
                }
            })
            .collect()
    }
}

/// Growth with the default (absolute) convention.
pub fn compute_growth<P: ComparablePeriod>(observations: &[Observation<P>]) -> Vec<GrowthRecord<P>> {
    GrowthCalculator::default().compute(observations)
}
