//! CLI subcommand handlers.

use crate::{Commands, ConfigAction};
use chrono::NaiveDate;
use mailgraph_core::inspect::{EntityDetails, connected_relation_lines};
use mailgraph_core::{CoFilterEngine, DatasetError, DateRange, ExplorerConfig, LoadReport};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Widest histogram bar, in characters.
const BAR_WIDTH: usize = 50;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config: ExplorerConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, &config, workspace),
        Commands::Summary => {
            if let Some((engine, report)) = load_or_notify(&config, workspace).await? {
                print!("{}", render_summary(&engine, &report));
            }
            Ok(())
        }
        Commands::Histogram { json } => {
            let Some((engine, _)) = load_or_notify(&config, workspace).await? else {
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&histogram_pairs(&engine))?);
            } else {
                print!("{}", render_histogram(&engine));
            }
            Ok(())
        }
        Commands::Filter {
            degree,
            from,
            to,
            json,
        } => {
            let Some((mut engine, _)) = load_or_notify(&config, workspace).await? else {
                return Ok(());
            };
            let output = apply_filter(&mut engine, degree, from, to);
            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print!("{}", output.render());
            }
            Ok(())
        }
        Commands::Inspect { id } => {
            let Some((engine, _)) = load_or_notify(&config, workspace).await? else {
                return Ok(());
            };
            match render_inspect(&engine, &id) {
                Some(text) => {
                    print!("{text}");
                    Ok(())
                }
                None => anyhow::bail!("Unknown entity id: {}", id),
            }
        }
        Commands::Session => {
            let Some((engine, _)) = load_or_notify(&config, workspace).await? else {
                return Ok(());
            };
            crate::session::run_session(engine, config.render)
        }
    }
}

async fn load_or_notify(
    config: &ExplorerConfig,
    workspace: &Path,
) -> anyhow::Result<Option<(CoFilterEngine, LoadReport)>> {
    let loaded = load_engine(config, workspace).await?;
    if loaded.is_none() {
        println!("No entities in the dataset; nothing to explore.");
    }
    Ok(loaded)
}

fn handle_config(
    action: ConfigAction,
    config: &ExplorerConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".mailgraph");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&ExplorerConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

/// Load the configured dataset and build the engine.
///
/// Returns `Ok(None)` for a dataset without entities.
pub async fn load_engine(
    config: &ExplorerConfig,
    workspace: &Path,
) -> anyhow::Result<Option<(CoFilterEngine, LoadReport)>> {
    let entity_path = resolve(workspace, &config.data.entity_path);
    let event_path = resolve(workspace, &config.data.event_path);
    let overlay = config
        .data
        .overlay()
        .map(|(e, r)| (resolve(workspace, e), resolve(workspace, r)));

    let (dataset, report) = mailgraph_core::load_with_overlay(
        (entity_path.as_path(), event_path.as_path()),
        overlay.as_ref().map(|(e, r)| (e.as_path(), r.as_path())),
    )
    .await?;
    if report.has_issues() {
        info!(?report, "Dataset loaded with skipped or altered records");
    }

    match CoFilterEngine::new(dataset, config.filter.domain_start) {
        Ok(mut engine) => {
            engine.set_degree_threshold(config.filter.initial_degree);
            Ok(Some((engine, report)))
        }
        Err(DatasetError::Empty) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn render_summary(engine: &CoFilterEngine, report: &LoadReport) -> String {
    let mut out = String::new();
    let dataset = engine.dataset();
    let _ = writeln!(out, "Entities:  {}", dataset.entities().len());
    let _ = writeln!(
        out,
        "Relations: {} ({} drawn)",
        dataset.relations().len(),
        engine.graph().edge_count()
    );
    if let Some(bounds) = engine.rank_bounds() {
        let _ = writeln!(out, "Rank:      {} .. {}", bounds.min, bounds.max);
    }
    let _ = writeln!(out, "Max degree: {}", engine.graph().max_degree());
    let days = engine.days();
    match (days.first(), days.last()) {
        (Some(first), Some(last)) => {
            let _ = writeln!(out, "Days:      {} ({} .. {})", days.len(), first, last);
        }
        _ => {
            let _ = writeln!(out, "Days:      0 (no events at or after {})", engine.domain_start());
        }
    }
    if report.has_issues() || report.self_relations > 0 || report.renamed_relations > 0 {
        let _ = writeln!(
            out,
            "Skipped:   {} entities, {} duplicate entities, {} events, {} self-relations",
            report.entities_skipped,
            report.duplicate_entities,
            report.relations_skipped,
            report.self_relations
        );
        let _ = writeln!(
            out,
            "Altered:   {} undated, {} renamed, {} with unknown endpoints",
            report.unparseable_dates, report.renamed_relations, report.dangling_relations
        );
    }
    out
}

/// `(day millis, total events)` pairs, time-ascending.
pub fn histogram_pairs(engine: &CoFilterEngine) -> Vec<(i64, usize)> {
    engine
        .histogram()
        .into_iter()
        .map(|p| (p.day.millis(), p.total_events))
        .collect()
}

pub fn render_histogram(engine: &CoFilterEngine) -> String {
    let series = engine.histogram();
    let Some(peak) = series.iter().map(|p| p.total_events).max() else {
        return "No data loaded\n".to_string();
    };
    let mut out = String::new();
    for point in &series {
        let width = (point.total_events * BAR_WIDTH).div_ceil(peak.max(1));
        let _ = writeln!(
            out,
            "{} {:>6} {}",
            point.day,
            point.total_events,
            "#".repeat(width)
        );
    }
    out
}

/// Visible sets under one filter setting.
#[derive(Debug, Serialize)]
pub struct FilterOutput {
    pub degree_threshold: usize,
    pub date_range: Option<DateRange>,
    pub entities: Vec<String>,
    pub relations: Vec<String>,
}

impl FilterOutput {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let range = self
            .date_range
            .map_or_else(|| "all dates".to_string(), |r| r.to_string());
        let _ = writeln!(
            out,
            "Degree >= {}, {}: {} entities, {} relations",
            self.degree_threshold,
            range,
            self.entities.len(),
            self.relations.len()
        );
        for id in &self.entities {
            let _ = writeln!(out, "  entity   {id}");
        }
        for id in &self.relations {
            let _ = writeln!(out, "  relation {id}");
        }
        out
    }
}

/// Apply a degree threshold and an optional day range.
///
/// A missing bound defaults to the first or last day with events.
pub fn apply_filter(
    engine: &mut CoFilterEngine,
    degree: usize,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> FilterOutput {
    engine.set_degree_threshold(degree);
    let range = if from.is_none() && to.is_none() {
        None
    } else {
        let fallback = engine.domain_start().as_datetime().date_naive();
        let first = engine
            .days()
            .first()
            .map_or(fallback, |d| d.as_datetime().date_naive());
        let last = engine
            .days()
            .last()
            .map_or(fallback, |d| d.as_datetime().date_naive());
        Some(DateRange::days(from.unwrap_or(first), to.unwrap_or(last)))
    };
    engine.set_date_range(range);

    FilterOutput {
        degree_threshold: degree,
        date_range: range,
        entities: engine.visible_entities().into_iter().collect(),
        relations: engine.visible_relations().into_iter().collect(),
    }
}

pub fn render_inspect(engine: &CoFilterEngine, id: &str) -> Option<String> {
    let details = EntityDetails::of(engine, id)?;
    let mut out = String::new();
    let _ = writeln!(out, "{}", details.summary());
    for line in details.tooltip() {
        let _ = writeln!(out, "  {line}");
    }
    if details.is_ner {
        let _ = writeln!(out, "  Kind: {} (extracted)", details.kind);
    }
    for line in connected_relation_lines(engine, id) {
        let _ = writeln!(out, "  {line}");
    }
    Some(out)
}
