//! Boundary between the filter engine and the external graph renderer and
//! histogram chart.
//!
//! The feed pushes node/edge elements and the day series once, then turns
//! every degree or range change into show/hide directives. Only directives
//! that change an element's last known state are sent.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

use crate::config::RenderConfig;
use crate::filter::{CoFilterEngine, DateRange};
use crate::metrics::FilterMetrics;
use crate::temporal::{HistogramPoint, latest_timestamp};
use crate::types::{EntityId, EntityKind};

/// A node as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeElement {
    pub id: EntityId,
    pub name: String,
    /// Display name, truncated to the configured length.
    pub label: String,
    pub kind: EntityKind,
    pub css_class: Option<&'static str>,
    pub rank: usize,
    pub size: f64,
}

/// An edge as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeElement {
    pub id: String,
    pub source: EntityId,
    pub target: EntityId,
    pub timestamp: Option<DateTime<Utc>>,
    pub subject: String,
}

/// Reference to a rendered element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementRef {
    Node(EntityId),
    Edge(String),
}

/// The graph view the feed drives.
pub trait GraphRenderer {
    fn add_nodes(&mut self, nodes: Vec<NodeElement>);
    fn add_edges(&mut self, edges: Vec<EdgeElement>);
    fn set_hidden(&mut self, element: ElementRef, hidden: bool);

    /// Start grouping directives into one repaint.
    fn begin_batch(&mut self) {}
    fn end_batch(&mut self) {}
}

/// The histogram widget the feed drives.
pub trait ChartWidget {
    fn set_series(&mut self, series: &[HistogramPoint]);
    fn set_window(&mut self, start: DateTime<Utc>, end: DateTime<Utc>);
}

/// Shorten a display name to at most `max` characters, ending in `...`.
pub fn truncate_label(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut label: String = name.chars().take(keep).collect();
    label.push_str("...");
    label
}

/// Outcome of one visibility push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub shown: usize,
    pub hidden: usize,
    pub unchanged: usize,
}

impl PushSummary {
    pub fn issued(&self) -> usize {
        self.shown + self.hidden
    }
}

/// Connects a [`CoFilterEngine`] to a renderer and a chart.
pub struct RenderFeed<R, C> {
    engine: CoFilterEngine,
    renderer: R,
    chart: C,
    config: RenderConfig,
    metrics: FilterMetrics,
    /// Last hidden state sent for every element.
    hidden: HashMap<ElementRef, bool>,
    last_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    initialized: bool,
}

impl<R: GraphRenderer, C: ChartWidget> RenderFeed<R, C> {
    pub fn new(engine: CoFilterEngine, renderer: R, chart: C, config: RenderConfig) -> Self {
        Self {
            engine,
            renderer,
            chart,
            config,
            metrics: FilterMetrics::new(),
            hidden: HashMap::new(),
            last_range: None,
            initialized: false,
        }
    }

    /// Build node and edge elements from the engine's dataset.
    pub fn elements(&self) -> (Vec<NodeElement>, Vec<EdgeElement>) {
        let dataset = self.engine.dataset();
        let stats = self.engine.stats();
        let nodes = dataset
            .entities()
            .iter()
            .map(|e| NodeElement {
                id: e.id.clone(),
                name: e.name.clone(),
                label: truncate_label(&e.name, self.config.label_max_len),
                kind: e.kind.clone(),
                css_class: e.kind.css_class(),
                rank: stats.rank(&e.id),
                size: stats.size_of(
                    &e.id,
                    self.config.min_node_size,
                    self.config.max_node_size,
                ),
            })
            .collect();
        let edges = dataset
            .relations()
            .iter()
            .filter(|r| dataset.contains_entity(&r.source) && dataset.contains_entity(&r.target))
            .map(|r| EdgeElement {
                id: r.id.clone(),
                source: r.source.clone(),
                target: r.target.clone(),
                timestamp: r.timestamp,
                subject: r.subject.clone(),
            })
            .collect();
        (nodes, edges)
    }

    /// Push elements, the day series and the initial window, then apply the
    /// current filter state. Later calls only push visibility again.
    pub fn initialize(&mut self) -> PushSummary {
        if self.initialized {
            return self.push_visibility();
        }
        let (nodes, edges) = self.elements();
        for node in &nodes {
            self.hidden.insert(ElementRef::Node(node.id.clone()), false);
        }
        for edge in &edges {
            self.hidden.insert(ElementRef::Edge(edge.id.clone()), false);
        }
        info!(nodes = nodes.len(), edges = edges.len(), "Pushing graph elements");
        self.renderer.add_nodes(nodes);
        self.renderer.add_edges(edges);

        let series = self.engine.histogram();
        if series.is_empty() {
            warn!("No events at or after domain start; histogram is empty");
        }
        self.chart.set_series(&series);

        let start = self.engine.domain_start().as_datetime();
        if let Some(end) = latest_timestamp(self.engine.dataset().relations())
            .filter(|end| *end >= start)
        {
            self.chart.set_window(start, end);
            self.last_range = Some((start, end));
        }

        self.initialized = true;
        self.push_visibility()
    }

    /// Hook for the chart's range-change callback.
    ///
    /// Returns `true` when the range reached the engine. Initial events and
    /// repeats of the last seen range are ignored.
    pub fn on_range_change(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        is_initial: bool,
    ) -> bool {
        if is_initial || self.last_range == Some((start, end)) {
            self.metrics.record_ignored_range();
            debug!(%start, %end, is_initial, "Range event ignored");
            return false;
        }
        self.last_range = Some((start, end));
        self.engine.set_date_range(Some(DateRange::new(start, end)));
        self.metrics.record_range_update();
        self.push_visibility();
        true
    }

    /// Hook for the degree-threshold control.
    pub fn on_degree_change(&mut self, threshold: usize) -> PushSummary {
        self.engine.set_degree_threshold(threshold);
        self.metrics.record_degree_update();
        self.push_visibility()
    }

    /// Drop the date filter and show everything that passes the degree filter.
    pub fn clear_range(&mut self) -> PushSummary {
        self.engine.clear_date_range();
        self.last_range = None;
        self.metrics.record_range_update();
        self.push_visibility()
    }

    /// Send show/hide directives for every element whose state changed.
    pub fn push_visibility(&mut self) -> PushSummary {
        let visible = self.engine.visible_entities();
        let dataset = self.engine.dataset();

        let mut wanted: Vec<(ElementRef, bool)> =
            Vec::with_capacity(dataset.entities().len() + dataset.relations().len());
        for entity in dataset.entities() {
            wanted.push((
                ElementRef::Node(entity.id.clone()),
                !visible.contains(&entity.id),
            ));
        }
        for relation in dataset.relations() {
            let edge = ElementRef::Edge(relation.id.clone());
            if !self.hidden.contains_key(&edge) {
                continue;
            }
            let shown = visible.contains(&relation.source) && visible.contains(&relation.target);
            wanted.push((edge, !shown));
        }

        let mut summary = PushSummary::default();
        self.renderer.begin_batch();
        for (element, hide) in wanted {
            if self.hidden.get(&element) == Some(&hide) {
                summary.unchanged += 1;
                continue;
            }
            trace!(?element, hide, "Visibility directive");
            if hide {
                summary.hidden += 1;
            } else {
                summary.shown += 1;
            }
            self.renderer.set_hidden(element.clone(), hide);
            self.hidden.insert(element, hide);
        }
        self.renderer.end_batch();

        self.metrics
            .record_push(summary.issued() as u64, summary.unchanged as u64);
        debug!(
            shown = summary.shown,
            hidden = summary.hidden,
            unchanged = summary.unchanged,
            "Visibility pushed"
        );
        summary
    }

    pub fn engine(&self) -> &CoFilterEngine {
        &self.engine
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn chart(&self) -> &C {
        &self.chart
    }

    pub fn metrics(&self) -> &FilterMetrics {
        &self.metrics
    }

    /// Whether the element is currently hidden on the renderer.
    pub fn is_hidden(&self, element: &ElementRef) -> bool {
        self.hidden.get(element).copied().unwrap_or(false)
    }
}

/// In-memory renderer that records everything it receives.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub nodes: Vec<NodeElement>,
    pub edges: Vec<EdgeElement>,
    /// Every directive in the order received.
    pub directives: Vec<(ElementRef, bool)>,
    pub batches: usize,
    hidden: HashMap<ElementRef, bool>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hidden(&self, element: &ElementRef) -> bool {
        self.hidden.get(element).copied().unwrap_or(false)
    }

    /// Ids of nodes not currently hidden, sorted.
    pub fn visible_nodes(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| !self.is_hidden(&ElementRef::Node(n.id.clone())))
            .map(|n| n.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of edges not currently hidden, sorted.
    pub fn visible_edges(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .edges
            .iter()
            .filter(|e| !self.is_hidden(&ElementRef::Edge(e.id.clone())))
            .map(|e| e.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl GraphRenderer for RecordingRenderer {
    fn add_nodes(&mut self, nodes: Vec<NodeElement>) {
        self.nodes.extend(nodes);
    }

    fn add_edges(&mut self, edges: Vec<EdgeElement>) {
        self.edges.extend(edges);
    }

    fn set_hidden(&mut self, element: ElementRef, hidden: bool) {
        self.hidden.insert(element.clone(), hidden);
        self.directives.push((element, hidden));
    }

    fn end_batch(&mut self) {
        self.batches += 1;
    }
}

/// In-memory chart that keeps the last series and window.
#[derive(Debug, Default)]
pub struct RecordingChart {
    pub series: Vec<HistogramPoint>,
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl RecordingChart {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChartWidget for RecordingChart {
    fn set_series(&mut self, series: &[HistogramPoint]) {
        self.series = series.to_vec();
    }

    fn set_window(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.window = Some((start, end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::temporal::default_domain_start;
    use crate::types::{Entity, Relation};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, d, h, 0, 0).unwrap()
    }

    fn feed() -> RenderFeed<RecordingRenderer, RecordingChart> {
        let entities = vec![
            Entity::new("a", "Alice Anderson-Whitfield", EntityKind::EnronAddress),
            Entity::new("b", "Bob", EntityKind::ExternalAddress),
            Entity::new("c", "Carol", EntityKind::NerPerson),
        ];
        let relations = vec![
            Relation::new("1", "a", "b", Some(at(1, 9))),
            Relation::new("2", "b", "c", Some(at(2, 9))),
            Relation::new("3", "c", "ghost", Some(at(2, 10))),
        ];
        let (dataset, _) = Dataset::from_parts(entities, relations);
        let engine = CoFilterEngine::new(dataset, default_domain_start()).unwrap();
        RenderFeed::new(
            engine,
            RecordingRenderer::new(),
            RecordingChart::new(),
            RenderConfig::default(),
        )
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("short", 20), "short");
        assert_eq!(truncate_label("exactly twenty chars", 20), "exactly twenty chars");
        assert_eq!(
            truncate_label("Alice Anderson-Whitfield", 20),
            "Alice Anderson-Wh..."
        );
        assert_eq!(truncate_label("Zoë Ørsted-Ågård", 8), "Zoë Ø...");
    }

    #[test]
    fn test_initialize_pushes_elements_and_series() {
        let mut feed = feed();
        let summary = feed.initialize();
        assert_eq!(summary.issued(), 0);

        let renderer = feed.renderer();
        assert_eq!(renderer.nodes.len(), 3);
        // Relation 3 has an unknown endpoint and is not drawn.
        assert_eq!(renderer.edges.len(), 2);
        assert_eq!(renderer.nodes[0].label, "Alice Anderson-Wh...");
        assert_eq!(renderer.nodes[0].css_class, Some("enronAddress"));
        assert_eq!(renderer.nodes[0].rank, 1);

        let chart = feed.chart();
        let totals: Vec<usize> = chart.series.iter().map(|p| p.total_events).collect();
        assert_eq!(totals, vec![1, 2]);
        assert_eq!(chart.window, Some((default_domain_start(), at(2, 10))));
    }

    #[test]
    fn test_initial_range_event_is_ignored() {
        let mut feed = feed();
        feed.initialize();
        assert!(!feed.on_range_change(at(2, 0), at(2, 23), true));
        assert!(feed.engine().state().date_range.is_none());
        assert_eq!(feed.metrics().ignored_range_events, 1);
    }

    #[test]
    fn test_repeated_range_is_ignored() {
        let mut feed = feed();
        feed.initialize();
        let (start, end) = feed.chart().window.unwrap();
        assert!(!feed.on_range_change(start, end, false));

        assert!(feed.on_range_change(at(2, 0), at(2, 23), false));
        assert!(!feed.on_range_change(at(2, 0), at(2, 23), false));
        assert_eq!(feed.metrics().range_updates, 1);
        assert_eq!(feed.metrics().ignored_range_events, 2);
    }

    #[test]
    fn test_range_change_hides_out_of_range_entities() {
        let mut feed = feed();
        feed.initialize();
        feed.on_range_change(at(2, 0), at(2, 23), false);

        let renderer = feed.renderer();
        assert_eq!(renderer.visible_nodes(), vec!["b", "c"]);
        assert_eq!(renderer.visible_edges(), vec!["2"]);
        assert!(feed.is_hidden(&ElementRef::Node("a".into())));
    }

    #[test]
    fn test_degree_change_only_sends_changes() {
        let mut feed = feed();
        feed.initialize();

        let first = feed.on_degree_change(2);
        // a and c drop out, taking both edges with them.
        assert_eq!(first.hidden, 4);
        assert_eq!(first.shown, 0);
        assert_eq!(feed.renderer().visible_nodes(), vec!["b"]);

        let again = feed.on_degree_change(2);
        assert_eq!(again.issued(), 0);

        let back = feed.on_degree_change(0);
        assert_eq!(back.shown, 4);
        assert_eq!(feed.renderer().visible_edges(), vec!["1", "2"]);
        assert_eq!(feed.metrics().degree_updates, 3);
    }

    #[test]
    fn test_clear_range_restores_entities() {
        let mut feed = feed();
        feed.initialize();
        feed.on_range_change(at(1, 0), at(1, 23), false);
        assert_eq!(feed.renderer().visible_nodes(), vec!["a", "b"]);

        feed.clear_range();
        assert_eq!(feed.renderer().visible_nodes(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_histogram_still_initializes() {
        let entities = vec![
            Entity::new("a", "A", EntityKind::EnronAddress),
            Entity::new("b", "B", EntityKind::EnronAddress),
        ];
        let early = Utc.with_ymd_and_hms(1990, 5, 1, 0, 0, 0).unwrap();
        let relations = vec![Relation::new("1", "a", "b", Some(early))];
        let (dataset, _) = Dataset::from_parts(entities, relations);
        let engine = CoFilterEngine::new(dataset, default_domain_start()).unwrap();
        let mut feed = RenderFeed::new(
            engine,
            RecordingRenderer::new(),
            RecordingChart::new(),
            RenderConfig::default(),
        );
        feed.initialize();
        assert!(feed.chart().series.is_empty());
        assert!(feed.chart().window.is_none());
        assert_eq!(feed.renderer().nodes.len(), 2);
        assert_eq!(feed.renderer().edges.len(), 1);
    }
}
