//! Filter metrics — counters for filter updates and renderer directives.

/// Counters kept by the render feed.
#[derive(Debug, Default)]
pub struct FilterMetrics {
    pub degree_updates: u64,
    pub range_updates: u64,
    pub ignored_range_events: u64,
    pub visibility_pushes: u64,
    pub directives_issued: u64,
    pub directives_skipped: u64,
}

impl FilterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a degree threshold change.
    pub fn record_degree_update(&mut self) {
        self.degree_updates += 1;
    }

    /// Record a date range change that reached the engine.
    pub fn record_range_update(&mut self) {
        self.range_updates += 1;
    }

    /// Record a range event from the chart that was ignored.
    pub fn record_ignored_range(&mut self) {
        self.ignored_range_events += 1;
    }

    /// Record one visibility push and how many directives it produced.
    pub fn record_push(&mut self, issued: u64, skipped: u64) {
        self.visibility_pushes += 1;
        self.directives_issued += issued;
        self.directives_skipped += skipped;
    }

    /// Get a summary snapshot of all metrics.
    pub fn snapshot(&self) -> FilterMetricsSnapshot {
        FilterMetricsSnapshot {
            degree_updates: self.degree_updates,
            range_updates: self.range_updates,
            ignored_range_events: self.ignored_range_events,
            visibility_pushes: self.visibility_pushes,
            directives_issued: self.directives_issued,
            directives_skipped: self.directives_skipped,
        }
    }
}

/// Immutable snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FilterMetricsSnapshot {
    pub degree_updates: u64,
    pub range_updates: u64,
    pub ignored_range_events: u64,
    pub visibility_pushes: u64,
    pub directives_issued: u64,
    pub directives_skipped: u64,
}
