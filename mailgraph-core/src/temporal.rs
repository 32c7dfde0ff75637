//! Day-granularity aggregation of relations for the activity histogram.
//!
//! Every relation is assigned to the UTC calendar day of its timestamp.
//! Relations from before the domain-start cutoff are dropped entirely: they
//! contribute to no total and no participant count.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::types::{EntityId, Relation};

/// Milliseconds in one day.
const DAY_MS: i64 = 86_400_000;

/// Earliest meaningful data point: 1998-11-20T00:00:00Z.
pub const DEFAULT_DOMAIN_START_MS: i64 = 911_520_000_000;

/// The default domain-start cutoff as an instant.
pub fn default_domain_start() -> DateTime<Utc> {
    DayKey(DEFAULT_DOMAIN_START_MS).as_datetime()
}

/// Bucket key: epoch milliseconds of a UTC midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DayKey(pub i64);

impl DayKey {
    /// Truncate an instant to the UTC midnight of its calendar day.
    pub fn of(instant: DateTime<Utc>) -> Self {
        DayKey(instant.timestamp_millis().div_euclid(DAY_MS) * DAY_MS)
    }

    pub fn millis(self) -> i64 {
        self.0
    }

    pub fn as_datetime(self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_datetime().format("%Y-%m-%d"))
    }
}

/// Activity recorded on one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub total_events: usize,
    /// How many times each entity appeared as source or target that day.
    pub participants: HashMap<EntityId, usize>,
}

impl DayBucket {
    fn record(&mut self, relation: &Relation) {
        self.total_events += 1;
        *self.participants.entry(relation.source.clone()).or_insert(0) += 1;
        *self.participants.entry(relation.target.clone()).or_insert(0) += 1;
    }

    pub fn participation(&self, id: &str) -> usize {
        self.participants.get(id).copied().unwrap_or(0)
    }
}

/// Buckets keyed by day. Carries no ordering; use [`sorted_keys`].
pub type BucketMap = HashMap<DayKey, DayBucket>;

/// One bar of the activity histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramPoint {
    pub day: DayKey,
    pub total_events: usize,
}

impl HistogramPoint {
    pub fn instant(&self) -> DateTime<Utc> {
        self.day.as_datetime()
    }
}

/// Builds day buckets from a relation set.
#[derive(Debug, Clone, Copy)]
pub struct TemporalAggregator {
    domain_start: DayKey,
}

impl TemporalAggregator {
    /// The cutoff is compared against truncated keys, so it is itself
    /// truncated to its day.
    pub fn new(domain_start: DateTime<Utc>) -> Self {
        Self {
            domain_start: DayKey::of(domain_start),
        }
    }

    pub fn domain_start(&self) -> DayKey {
        self.domain_start
    }

    /// Rebuild the bucket map from scratch.
    ///
    /// Self-relations and relations without a parseable timestamp are
    /// skipped, as are those whose day falls before the cutoff.
    pub fn build<'a>(&self, relations: impl IntoIterator<Item = &'a Relation>) -> BucketMap {
        let mut buckets = BucketMap::new();
        for relation in relations {
            if relation.is_self() {
                continue;
            }
            let Some(timestamp) = relation.timestamp else {
                continue;
            };
            let key = DayKey::of(timestamp);
            if key < self.domain_start {
                continue;
            }
            buckets.entry(key).or_default().record(relation);
        }
        buckets
    }
}

/// Bucket keys in ascending order.
pub fn sorted_keys(buckets: &BucketMap) -> Vec<DayKey> {
    let mut keys: Vec<DayKey> = buckets.keys().copied().collect();
    keys.sort_unstable();
    keys
}

/// The histogram series, time-ascending.
pub fn histogram_series(buckets: &BucketMap) -> Vec<HistogramPoint> {
    sorted_keys(buckets)
        .into_iter()
        .map(|day| HistogramPoint {
            day,
            total_events: buckets[&day].total_events,
        })
        .collect()
}

/// Latest parseable timestamp among the relations.
pub fn latest_timestamp<'a>(
    relations: impl IntoIterator<Item = &'a Relation>,
) -> Option<DateTime<Utc>> {
    relations.into_iter().filter_map(|r| r.timestamp).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(y: i32, m: u32, d: u32, h: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    #[test]
    fn test_default_domain_start() {
        assert_eq!(
            default_domain_start(),
            Utc.with_ymd_and_hms(1998, 11, 20, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_day_key_truncates_to_utc_midnight() {
        let key = DayKey::of(at(2000, 7, 17, 23).unwrap());
        assert_eq!(key.as_datetime(), at(2000, 7, 17, 0).unwrap());
        assert_eq!(key.to_string(), "2000-07-17");
    }

    #[test]
    fn test_day_key_before_epoch() {
        let key = DayKey::of(at(1969, 12, 31, 12).unwrap());
        assert_eq!(key.as_datetime(), at(1969, 12, 31, 0).unwrap());
    }

    #[test]
    fn test_build_counts_totals_and_participants() {
        let relations = vec![
            Relation::new("1", "a", "b", at(2000, 1, 1, 9)),
            Relation::new("2", "a", "c", at(2000, 1, 1, 17)),
            Relation::new("3", "b", "c", at(2000, 1, 2, 8)),
        ];
        let buckets = TemporalAggregator::new(default_domain_start()).build(&relations);

        assert_eq!(buckets.len(), 2);
        let day1 = &buckets[&DayKey::of(at(2000, 1, 1, 0).unwrap())];
        assert_eq!(day1.total_events, 2);
        assert_eq!(day1.participation("a"), 2);
        assert_eq!(day1.participation("b"), 1);
        assert_eq!(day1.participation("c"), 1);
        assert_eq!(day1.participation("z"), 0);
    }

    #[test]
    fn test_build_skips_early_self_and_undated() {
        let relations = vec![
            Relation::new("early", "a", "b", at(1998, 11, 19, 23)),
            Relation::new("self", "a", "a", at(2000, 1, 1, 0)),
            Relation::new("undated", "a", "b", None),
            Relation::new("cutoff", "a", "b", at(1998, 11, 20, 0)),
        ];
        let buckets = TemporalAggregator::new(default_domain_start()).build(&relations);
        assert_eq!(buckets.len(), 1);
        assert_eq!(
            sorted_keys(&buckets),
            vec![DayKey(DEFAULT_DOMAIN_START_MS)]
        );
    }

    #[test]
    fn test_mid_day_cutoff_keeps_its_whole_day() {
        let relations = vec![
            Relation::new("morning", "a", "b", at(2000, 1, 1, 6)),
            Relation::new("evening", "a", "b", at(2000, 1, 1, 20)),
            Relation::new("before", "a", "b", at(1999, 12, 31, 23)),
        ];
        let aggregator = TemporalAggregator::new(at(2000, 1, 1, 12).unwrap());
        assert_eq!(aggregator.domain_start(), DayKey::of(at(2000, 1, 1, 0).unwrap()));

        let buckets = aggregator.build(&relations);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[&aggregator.domain_start()].total_events, 2);
    }

    #[test]
    fn test_build_is_idempotent() {
        let relations = vec![
            Relation::new("1", "a", "b", at(2000, 1, 1, 9)),
            Relation::new("2", "b", "a", at(2000, 3, 1, 9)),
        ];
        let aggregator = TemporalAggregator::new(default_domain_start());
        assert_eq!(aggregator.build(&relations), aggregator.build(&relations));
    }

    #[test]
    fn test_histogram_series_is_ascending() {
        let relations = vec![
            Relation::new("1", "a", "b", at(2001, 5, 1, 9)),
            Relation::new("2", "a", "b", at(1999, 5, 1, 9)),
            Relation::new("3", "a", "b", at(2000, 5, 1, 9)),
            Relation::new("4", "b", "a", at(2000, 5, 1, 10)),
        ];
        let buckets = TemporalAggregator::new(default_domain_start()).build(&relations);
        let series = histogram_series(&buckets);
        let totals: Vec<usize> = series.iter().map(|p| p.total_events).collect();
        assert_eq!(totals, vec![1, 2, 1]);
        assert!(series.windows(2).all(|w| w[0].day < w[1].day));
    }

    #[test]
    fn test_latest_timestamp() {
        let relations = vec![
            Relation::new("1", "a", "b", at(2001, 5, 1, 9)),
            Relation::new("2", "a", "b", None),
            Relation::new("3", "a", "b", at(2000, 5, 1, 9)),
        ];
        assert_eq!(latest_timestamp(&relations), at(2001, 5, 1, 9));
        assert_eq!(latest_timestamp(&Vec::<Relation>::new()), None);
    }
}
