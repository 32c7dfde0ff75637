//! Degree and date co-filtering.
//!
//! The engine owns everything derived from a loaded dataset: send counts,
//! day buckets, the connectivity graph, and the current [`FilterState`].
//! An entity is visible when it passes both predicates; a relation is
//! visible when both of its endpoints are. Each predicate keeps a cached
//! pass-set that is recomputed in full whenever its input changes.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::DatasetError;
use crate::graph::{DegreeSource, RelationGraph};
use crate::stats::{EntityStatsIndex, RankBounds};
use crate::temporal::{
    BucketMap, DayKey, HistogramPoint, TemporalAggregator, histogram_series, sorted_keys,
};
use crate::types::{Entity, EntityId, Relation};

/// An inclusive range of instants selected on the histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Any pair is accepted; `start > end` is a valid, empty range.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whole calendar days from `first` to `last`, both inclusive.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Self {
        let start = first.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = last.and_time(chrono::NaiveTime::MIN).and_utc() + Duration::days(1)
            - Duration::milliseconds(1);
        Self { start, end }
    }

    pub fn is_degenerate(&self) -> bool {
        self.start > self.end
    }

    /// Whether a bucket key lies inside the range.
    pub fn contains(&self, day: DayKey) -> bool {
        let ms = day.millis();
        ms >= self.start.timestamp_millis() && ms <= self.end.timestamp_millis()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

/// The current filter inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub degree_threshold: usize,
    /// `None` means no date filter has been applied yet.
    pub date_range: Option<DateRange>,
}

/// Co-filtering engine for one loaded dataset.
#[derive(Debug, Clone)]
pub struct CoFilterEngine {
    dataset: Dataset,
    stats: EntityStatsIndex,
    aggregator: TemporalAggregator,
    buckets: BucketMap,
    days: Vec<DayKey>,
    graph: RelationGraph,
    state: FilterState,
    degree_pass: HashSet<EntityId>,
    /// `None` while the date range is unbounded.
    date_pass: Option<HashSet<EntityId>>,
}

impl CoFilterEngine {
    /// Derive all statistics for a dataset and evaluate the initial,
    /// unfiltered state.
    ///
    /// # Errors
    /// Returns [`DatasetError::Empty`] when the dataset has no entities; the
    /// caller is expected to show a notice and stay uninitialized.
    pub fn new(mut dataset: Dataset, domain_start: DateTime<Utc>) -> Result<Self, DatasetError> {
        if dataset.is_empty() {
            return Err(DatasetError::Empty);
        }

        let stats = EntityStatsIndex::compute(dataset.entities(), dataset.relations());
        dataset.apply_sent_counts(stats.ranks());

        let aggregator = TemporalAggregator::new(domain_start);
        let buckets = aggregator.build(dataset.relations());
        let days = sorted_keys(&buckets);
        let graph = RelationGraph::build(&dataset);

        info!(
            entities = dataset.entities().len(),
            relations = dataset.relations().len(),
            buckets = buckets.len(),
            edges = graph.edge_count(),
            "Filter engine initialized"
        );

        let mut engine = Self {
            dataset,
            stats,
            aggregator,
            buckets,
            days,
            graph,
            state: FilterState::default(),
            degree_pass: HashSet::new(),
            date_pass: None,
        };
        engine.recompute_degree();
        engine.recompute_date();
        Ok(engine)
    }

    /// Update the minimum connectivity degree and re-evaluate every entity.
    ///
    /// Buckets are not touched: the histogram always reflects the full
    /// relation set.
    pub fn set_degree_threshold(&mut self, threshold: usize) {
        self.state.degree_threshold = threshold;
        self.recompute_degree();
    }

    /// Update the active date range (`None` for unbounded) and re-evaluate
    /// every entity.
    pub fn set_date_range(&mut self, range: Option<DateRange>) {
        self.state.date_range = range;
        self.recompute_date();
    }

    pub fn clear_date_range(&mut self) {
        self.set_date_range(None);
    }

    fn recompute_degree(&mut self) {
        let threshold = self.state.degree_threshold;
        self.degree_pass = degree_pass_set(self.dataset.entities(), &self.graph, threshold);
        debug!(
            threshold,
            passing = self.degree_pass.len(),
            "Degree predicate recomputed"
        );
    }

    fn recompute_date(&mut self) {
        self.date_pass = self.state.date_range.map(|range| self.date_pass_set(&range));
        debug!(
            range = ?self.state.date_range,
            passing = self.date_pass.as_ref().map(HashSet::len),
            "Date predicate recomputed"
        );
    }

    /// Entities participating in any bucket inside the range. Only buckets
    /// within the range are visited.
    fn date_pass_set(&self, range: &DateRange) -> HashSet<EntityId> {
        let mut passing = HashSet::new();
        if range.is_degenerate() {
            return passing;
        }
        let floor = range
            .start
            .timestamp_millis()
            .max(self.aggregator.domain_start().millis());
        let first = self.days.partition_point(|d| d.millis() < floor);
        for day in self.days[first..].iter().take_while(|d| range.contains(**d)) {
            if let Some(bucket) = self.buckets.get(day) {
                passing.extend(bucket.participants.keys().cloned());
            }
        }
        passing
    }

    pub fn passes_degree(&self, id: &str) -> bool {
        self.degree_pass.contains(id)
    }

    pub fn passes_date(&self, id: &str) -> bool {
        self.date_pass.as_ref().is_none_or(|set| set.contains(id))
    }

    /// Whether an entity of the dataset passes both predicates.
    pub fn is_visible(&self, id: &str) -> bool {
        self.dataset.contains_entity(id) && self.passes_degree(id) && self.passes_date(id)
    }

    /// Whether both endpoints of a relation are visible.
    pub fn is_relation_visible(&self, relation: &Relation) -> bool {
        self.is_visible(&relation.source) && self.is_visible(&relation.target)
    }

    pub fn visible_entities(&self) -> BTreeSet<EntityId> {
        self.dataset
            .entities()
            .iter()
            .filter(|e| self.passes_degree(&e.id) && self.passes_date(&e.id))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Ids of the visible relations.
    pub fn visible_relations(&self) -> BTreeSet<String> {
        let visible = self.visible_entities();
        self.dataset
            .relations()
            .iter()
            .filter(|r| visible.contains(&r.source) && visible.contains(&r.target))
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.dataset.entity(id)
    }

    pub fn stats(&self) -> &EntityStatsIndex {
        &self.stats
    }

    pub fn rank_bounds(&self) -> Option<RankBounds> {
        self.stats.bounds()
    }

    pub fn graph(&self) -> &RelationGraph {
        &self.graph
    }

    pub fn buckets(&self) -> &BucketMap {
        &self.buckets
    }

    /// Bucket keys in ascending order.
    pub fn days(&self) -> &[DayKey] {
        &self.days
    }

    pub fn histogram(&self) -> Vec<HistogramPoint> {
        histogram_series(&self.buckets)
    }

    pub fn domain_start(&self) -> DayKey {
        self.aggregator.domain_start()
    }
}

fn degree_pass_set(
    entities: &[Entity],
    source: &impl DegreeSource,
    threshold: usize,
) -> HashSet<EntityId> {
    entities
        .iter()
        .filter(|e| threshold == 0 || source.connectivity_degree(&e.id) >= threshold)
        .map(|e| e.id.clone())
        .collect()
}
