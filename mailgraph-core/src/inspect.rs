//! Detail text for selected or hovered elements.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::filter::CoFilterEngine;
use crate::types::{Entity, EntityId, EntityKind, Relation};

/// `dd-mm-yyyy`, or `-` when the date is unknown.
pub fn format_short_date(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(|| "-".to_string(), |t| t.format("%d-%m-%Y").to_string())
}

/// `dd-mm-yyyy hh:mm`, or `-` when the date is unknown.
pub fn format_date_with_time(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(
        || "-".to_string(),
        |t| t.format("%d-%m-%Y %H:%M").to_string(),
    )
}

/// Everything shown about a selected entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDetails {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub sent: usize,
    /// Connected relations not sent by the entity.
    pub received: usize,
    pub degree: usize,
    pub is_ner: bool,
}

impl EntityDetails {
    pub fn of(engine: &CoFilterEngine, id: &str) -> Option<Self> {
        let entity = engine.entity(id)?;
        let sent = engine.stats().rank(id);
        let degree = engine.graph().degree(id);
        Some(Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
            kind: entity.kind.clone(),
            sent,
            received: degree.saturating_sub(sent),
            degree,
            is_ner: entity.kind.is_ner(),
        })
    }

    pub fn summary(&self) -> String {
        format!("Id: {}, {}, Degree: {}", self.id, self.name, self.degree)
    }

    pub fn tooltip(&self) -> Vec<String> {
        vec![
            format!("Node ID: {}", self.id),
            format!("Name: {}", self.name),
            format!("Sent: {}", self.sent),
            format!("Received: {}", self.received),
        ]
    }
}

/// Everything shown about a selected relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationDetails {
    pub id: String,
    pub source: EntityId,
    pub target: EntityId,
    pub timestamp: Option<DateTime<Utc>>,
    pub subject: String,
    pub kind: String,
}

impl RelationDetails {
    pub fn of(engine: &CoFilterEngine, id: &str) -> Option<Self> {
        engine.dataset().relation(id).map(Self::from)
    }

    pub fn summary(&self) -> String {
        format!(
            "Id: {}, Date: {}, Subject: {}",
            self.id,
            format_date_with_time(self.timestamp),
            self.subject
        )
    }

    pub fn tooltip(&self) -> Vec<String> {
        vec![
            format!("Event ID: {}", self.id),
            format!("Date: {}", format_date_with_time(self.timestamp)),
            format!("From: {}", self.source),
            format!("To: {}", self.target),
            format!("Subject: {}", self.subject),
        ]
    }
}

impl From<&Relation> for RelationDetails {
    fn from(relation: &Relation) -> Self {
        Self {
            id: relation.id.clone(),
            source: relation.source.clone(),
            target: relation.target.clone(),
            timestamp: relation.timestamp,
            subject: relation.subject.clone(),
            kind: relation.kind.clone(),
        }
    }
}

fn display_name<'a>(engine: &'a CoFilterEngine, id: &'a str) -> &'a str {
    engine.entity(id).map_or(id, |e| e.name.as_str())
}

/// One line per relation touching the entity, in dataset order.
pub fn connected_relation_lines(engine: &CoFilterEngine, id: &str) -> Vec<String> {
    let relations = engine.dataset().relations();
    engine
        .graph()
        .connected_relations(id)
        .into_iter()
        .map(|i| {
            let r = &relations[i];
            format!(
                "From: {}, To: {}, Subject: {}, Date: {}",
                display_name(engine, &r.source),
                display_name(engine, &r.target),
                r.subject,
                format_short_date(r.timestamp)
            )
        })
        .collect()
}

/// Relations between the same two entities as `relation_id`, in either
/// direction, including the relation itself.
pub fn sibling_relations<'a>(engine: &'a CoFilterEngine, relation_id: &str) -> Vec<&'a Relation> {
    let Some(relation) = engine.dataset().relation(relation_id) else {
        return Vec::new();
    };
    let relations = engine.dataset().relations();
    engine
        .graph()
        .relations_between(&relation.source, &relation.target)
        .into_iter()
        .map(|i| &relations[i])
        .collect()
}

/// One line per sibling relation.
pub fn sibling_relation_lines(engine: &CoFilterEngine, relation_id: &str) -> Vec<String> {
    sibling_relations(engine, relation_id)
        .into_iter()
        .map(|r| {
            format!(
                "Subject: {}, Id: {}, Date: {}, Type: {}",
                r.subject,
                r.id,
                format_short_date(r.timestamp),
                r.kind
            )
        })
        .collect()
}

/// Entities adjacent to `id` in either direction, sorted by id.
pub fn neighbours<'a>(engine: &'a CoFilterEngine, id: &str) -> Vec<&'a Entity> {
    engine
        .graph()
        .neighbours(id)
        .into_iter()
        .filter_map(|n| engine.entity(n))
        .collect()
}
