//! # Mailgraph Core
//!
//! Core library for the Mailgraph communication-graph explorer.
//! Provides dataset loading, per-entity send counts, day-bucketed event
//! aggregation, degree and date co-filtering, the render feed that drives
//! an external graph view and histogram, configuration, and error types.

pub mod config;
pub mod dataset;
pub mod error;
pub mod feed;
pub mod filter;
pub mod graph;
pub mod inspect;
pub mod metrics;
pub mod stats;
pub mod temporal;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{DataConfig, ExplorerConfig, FilterConfig, RenderConfig, load_config};
pub use dataset::{Dataset, LoadReport, load_dataset, load_with_overlay};
pub use error::{ConfigError, DatasetError, MailgraphError, Result};
pub use feed::{
    ChartWidget, EdgeElement, ElementRef, GraphRenderer, NodeElement, PushSummary,
    RecordingChart, RecordingRenderer, RenderFeed, truncate_label,
};
pub use filter::{CoFilterEngine, DateRange, FilterState};
pub use graph::{DegreeSource, RelationGraph};
pub use inspect::{EntityDetails, RelationDetails};
pub use metrics::{FilterMetrics, FilterMetricsSnapshot};
pub use stats::{EntityStatsIndex, RankBounds};
pub use temporal::{DayBucket, DayKey, HistogramPoint, TemporalAggregator};
pub use types::{Entity, EntityId, EntityKind, Relation};
