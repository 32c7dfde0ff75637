//! Interactive filtering session.
//!
//! Drives a [`RenderFeed`] over the in-memory renderer and chart, so every
//! command reports the directives a real view would have received.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use mailgraph_core::inspect::connected_relation_lines;
use mailgraph_core::{
    CoFilterEngine, DateRange, EntityDetails, PushSummary, RecordingChart, RecordingRenderer,
    RenderConfig, RenderFeed,
};
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

type Feed = RenderFeed<RecordingRenderer, RecordingChart>;

/// One parsed session line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Degree(usize),
    Range(DateTime<Utc>, DateTime<Utc>),
    Clear,
    Visible,
    Inspect(String),
    Stats,
    Help,
    Quit,
}

const HELP: &str = "\
Commands:
  degree N            show entities with at least N connections
  range FROM TO       show entities active between two days (YYYY-MM-DD)
  clear               drop the date range
  visible             list visible entities and relations
  inspect ID          show details for one entity
  stats               show filter counters
  quit                leave the session";

fn parse_day(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{raw}': {e}"))?;
    let start = date.and_time(NaiveTime::MIN).and_utc();
    Ok(if end_of_day {
        DateRange::days(date, date).end
    } else {
        start
    })
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<SessionCommand, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["degree", n] => n
            .parse()
            .map(SessionCommand::Degree)
            .map_err(|_| format!("Not a degree: {n}")),
        ["range", from, to] => Ok(SessionCommand::Range(
            parse_day(from, false)?,
            parse_day(to, true)?,
        )),
        ["clear"] => Ok(SessionCommand::Clear),
        ["visible"] => Ok(SessionCommand::Visible),
        ["inspect", id] => Ok(SessionCommand::Inspect(id.to_string())),
        ["stats"] => Ok(SessionCommand::Stats),
        ["help"] | ["?"] => Ok(SessionCommand::Help),
        ["quit"] | ["exit"] | ["q"] => Ok(SessionCommand::Quit),
        [] => Err("Empty command".to_string()),
        _ => Err(format!("Unknown command: {line}. Type 'help'.")),
    }
}

fn describe_push(summary: PushSummary, feed: &Feed) -> String {
    format!(
        "{} shown, {} hidden, {} unchanged ({} entities visible)",
        summary.shown,
        summary.hidden,
        summary.unchanged,
        feed.renderer().visible_nodes().len()
    )
}

/// Apply a command to the feed and return the text to print.
pub fn apply(feed: &mut Feed, command: SessionCommand) -> String {
    match command {
        SessionCommand::Degree(n) => {
            let summary = feed.on_degree_change(n);
            describe_push(summary, feed)
        }
        SessionCommand::Range(start, end) => {
            let before = feed.metrics().directives_issued;
            let pushes = feed.metrics().visibility_pushes;
            if !feed.on_range_change(start, end, false) {
                return "Range unchanged".to_string();
            }
            let issued = feed.metrics().directives_issued - before;
            let suffix = if start > end { " (empty range)" } else { "" };
            format!(
                "{issued} directives over {} push(es), {} entities visible{suffix}",
                feed.metrics().visibility_pushes - pushes,
                feed.renderer().visible_nodes().len()
            )
        }
        SessionCommand::Clear => {
            let summary = feed.clear_range();
            describe_push(summary, feed)
        }
        SessionCommand::Visible => {
            let mut out = String::new();
            let nodes = feed.renderer().visible_nodes();
            let edges = feed.renderer().visible_edges();
            let _ = writeln!(out, "{} entities: {}", nodes.len(), nodes.join(", "));
            let _ = write!(out, "{} relations: {}", edges.len(), edges.join(", "));
            out
        }
        SessionCommand::Inspect(id) => inspect(feed.engine(), &id),
        SessionCommand::Stats => {
            let snapshot = feed.metrics().snapshot();
            serde_json::to_string_pretty(&snapshot).unwrap_or_else(|e| e.to_string())
        }
        SessionCommand::Help => HELP.to_string(),
        SessionCommand::Quit => String::new(),
    }
}

fn inspect(engine: &CoFilterEngine, id: &str) -> String {
    let Some(details) = EntityDetails::of(engine, id) else {
        return format!("Unknown entity id: {id}");
    };
    let mut out = details.summary();
    let state = if engine.is_visible(id) { "visible" } else { "hidden" };
    let _ = write!(out, " [{state}]");
    for line in connected_relation_lines(engine, id) {
        let _ = write!(out, "\n  {line}");
    }
    out
}

/// Run the interactive loop on stdin until `quit` or end of input.
pub fn run_session(engine: CoFilterEngine, render: RenderConfig) -> anyhow::Result<()> {
    let mut feed = RenderFeed::new(
        engine,
        RecordingRenderer::new(),
        RecordingChart::new(),
        render,
    );
    feed.initialize();

    let chart = feed.chart();
    println!(
        "\n  {} entities, {} edges, {} days of activity",
        feed.renderer().nodes.len(),
        feed.renderer().edges.len(),
        chart.series.len()
    );
    if let Some((start, end)) = chart.window {
        println!(
            "  Window: {} .. {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
    }
    println!("  Type 'help' for commands, 'quit' to exit\n");

    let stdin = io::stdin();
    loop {
        print!("\x1b[1;34m> \x1b[0m");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input).is_err() || input.is_empty() {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match parse_command(input) {
            Ok(SessionCommand::Quit) => break,
            Ok(command) => println!("{}", apply(&mut feed, command)),
            Err(message) => println!("\x1b[31m{message}\x1b[0m"),
        }
    }
    Ok(())
}
