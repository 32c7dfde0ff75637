//! Dataset loading and validation.
//!
//! The input feed is two JSON arrays: entities `{id, name, type}` and
//! events `{date, subject, message_id, from, to, type}`. Records are
//! validated one by one; a malformed record is skipped and counted in the
//! [`LoadReport`] rather than failing the whole load. Self-relations are
//! dropped here so nothing downstream ever sees them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

use crate::error::DatasetError;
use crate::types::{Entity, EntityId, EntityKind, Relation};

/// An id field that may be written as a JSON string or number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_id(self) -> Option<String> {
        let id = match self {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Number(n) => n.to_string(),
        };
        if id.is_empty() { None } else { Some(id) }
    }
}

/// Entity record as it appears in the input feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEntity {
    pub id: Option<RawId>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Event record as it appears in the input feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRelation {
    pub date: Option<String>,
    pub subject: Option<String>,
    pub message_id: Option<RawId>,
    pub from: Option<RawId>,
    pub to: Option<RawId>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Counters describing what happened to the records of a load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub entities_loaded: usize,
    pub entities_skipped: usize,
    pub duplicate_entities: usize,
    pub relations_loaded: usize,
    pub relations_skipped: usize,
    pub self_relations: usize,
    pub unparseable_dates: usize,
    pub renamed_relations: usize,
    /// Relations kept whose source or target is not a known entity.
    pub dangling_relations: usize,
}

impl LoadReport {
    /// Whether any record was dropped or altered.
    pub fn has_issues(&self) -> bool {
        self.entities_skipped > 0
            || self.duplicate_entities > 0
            || self.relations_skipped > 0
            || self.unparseable_dates > 0
    }

    /// Fold in an overlay load. `loaded` covers what was dropped while
    /// reading the overlay files; `merged` covers what [`Dataset::merge`]
    /// kept, dropped or renamed. Merge redoes every rename, so renames are
    /// only taken from `merged`.
    fn absorb_overlay(&mut self, loaded: &LoadReport, merged: &LoadReport) {
        self.entities_loaded += merged.entities_loaded;
        self.entities_skipped += loaded.entities_skipped;
        self.duplicate_entities += loaded.duplicate_entities + merged.duplicate_entities;
        self.relations_loaded += merged.relations_loaded;
        self.relations_skipped += loaded.relations_skipped;
        self.self_relations += loaded.self_relations;
        self.unparseable_dates += loaded.unparseable_dates;
        self.renamed_relations += merged.renamed_relations;
        self.dangling_relations = merged.dangling_relations;
    }
}

/// Parse an input date. Accepts RFC 3339 and naive `YYYY-MM-DD[ HH:MM:SS]`
/// forms, the latter interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A validated, immutable-once-built set of entities and relations.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    entities: Vec<Entity>,
    relations: Vec<Relation>,
    entity_index: HashMap<EntityId, usize>,
    relation_ids: HashSet<String>,
    message_occurrences: HashMap<String, usize>,
}

impl Dataset {
    /// Build a dataset from raw records, skipping the malformed ones.
    pub fn from_raw(
        entities: impl IntoIterator<Item = RawEntity>,
        relations: impl IntoIterator<Item = RawRelation>,
    ) -> (Self, LoadReport) {
        let mut dataset = Self::default();
        let report = dataset.extend_raw(entities, relations);
        (dataset, report)
    }

    /// Build a dataset from already-typed records. Used by tests and by
    /// callers that construct graphs programmatically.
    pub fn from_parts(
        entities: impl IntoIterator<Item = Entity>,
        relations: impl IntoIterator<Item = Relation>,
    ) -> (Self, LoadReport) {
        let mut dataset = Self::default();
        let mut report = LoadReport::default();
        for entity in entities {
            dataset.push_entity(entity, &mut report);
        }
        for relation in relations {
            dataset.push_relation(relation, &mut report);
        }
        report.dangling_relations = dataset.count_dangling();
        (dataset, report)
    }

    /// Append an overlay dataset (e.g. named entities extracted from message
    /// bodies). Entity ids already present are kept from the base dataset.
    pub fn merge(&mut self, overlay: Dataset) -> LoadReport {
        let mut report = LoadReport::default();
        for entity in overlay.entities {
            self.push_entity(entity, &mut report);
        }
        for relation in overlay.relations {
            let relation = Relation {
                id: relation.message_id.clone(),
                ..relation
            };
            self.push_relation(relation, &mut report);
        }
        report.dangling_relations = self.count_dangling();
        info!(
            entities = report.entities_loaded,
            relations = report.relations_loaded,
            "Merged overlay dataset"
        );
        report
    }

    fn extend_raw(
        &mut self,
        entities: impl IntoIterator<Item = RawEntity>,
        relations: impl IntoIterator<Item = RawRelation>,
    ) -> LoadReport {
        let mut report = LoadReport::default();

        for raw in entities {
            let Some(id) = raw.id.and_then(RawId::into_id) else {
                warn!(name = ?raw.name, "Skipping entity without id");
                report.entities_skipped += 1;
                continue;
            };
            let name = raw.name.unwrap_or_else(|| id.clone());
            let kind = EntityKind::parse(raw.kind.as_deref().unwrap_or_default());
            self.push_entity(Entity::new(id, name, kind), &mut report);
        }

        for raw in relations {
            let (Some(message_id), Some(source), Some(target)) = (
                raw.message_id.and_then(RawId::into_id),
                raw.from.and_then(RawId::into_id),
                raw.to.and_then(RawId::into_id),
            ) else {
                warn!(subject = ?raw.subject, "Skipping event missing message_id, from or to");
                report.relations_skipped += 1;
                continue;
            };

            let timestamp = raw.date.as_deref().and_then(parse_timestamp);
            if timestamp.is_none() && source != target {
                warn!(%message_id, date = ?raw.date, "Unparseable event date");
                report.unparseable_dates += 1;
            }

            let relation = Relation {
                subject: raw.subject.unwrap_or_default(),
                kind: raw.kind.unwrap_or_default(),
                ..Relation::new(message_id, source, target, timestamp)
            };
            self.push_relation(relation, &mut report);
        }

        report.dangling_relations = self.count_dangling();
        report
    }

    fn push_entity(&mut self, entity: Entity, report: &mut LoadReport) {
        if self.entity_index.contains_key(&entity.id) {
            warn!(id = %entity.id, "Skipping duplicate entity");
            report.duplicate_entities += 1;
            return;
        }
        self.entity_index.insert(entity.id.clone(), self.entities.len());
        self.entities.push(entity);
        report.entities_loaded += 1;
    }

    fn push_relation(&mut self, mut relation: Relation, report: &mut LoadReport) {
        if relation.is_self() {
            report.self_relations += 1;
            return;
        }

        // One message to several recipients shares a message id, but the
        // renderer needs a distinct id per edge.
        let seen = self
            .message_occurrences
            .entry(relation.message_id.clone())
            .or_insert(0);
        if *seen > 0 || self.relation_ids.contains(&relation.id) {
            let mut n = (*seen).max(1);
            let mut candidate = format!("{}#{}", relation.message_id, n);
            while self.relation_ids.contains(&candidate) {
                n += 1;
                candidate = format!("{}#{}", relation.message_id, n);
            }
            relation.id = candidate;
            report.renamed_relations += 1;
        }
        *seen += 1;

        self.relation_ids.insert(relation.id.clone());
        self.relations.push(relation);
        report.relations_loaded += 1;
    }

    fn count_dangling(&self) -> usize {
        self.relations
            .iter()
            .filter(|r| {
                !self.entity_index.contains_key(&r.source)
                    || !self.entity_index.contains_key(&r.target)
            })
            .count()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entity_index.get(id).map(|&i| &self.entities[i])
    }

    pub fn relation(&self, id: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.id == id)
    }

    pub fn contains_entity(&self, id: &str) -> bool {
        self.entity_index.contains_key(id)
    }

    /// A dataset with no entities cannot be explored.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Store computed send counts on the entities.
    pub(crate) fn apply_sent_counts(&mut self, ranks: &HashMap<EntityId, usize>) {
        for entity in &mut self.entities {
            entity.sent_count = ranks.get(&entity.id).copied().unwrap_or(0);
        }
    }
}

async fn read_records<T: DeserializeOwned>(
    path: &Path,
    skipped: &mut usize,
) -> Result<Vec<T>, DatasetError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let values: Vec<serde_json::Value> =
        serde_json::from_slice(&bytes).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut records = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping malformed record");
                *skipped += 1;
            }
        }
    }
    Ok(records)
}

/// Load a dataset from an entity file and an event file.
///
/// Both files are read concurrently. This is the only asynchronous step of
/// the pipeline; everything after it runs synchronously.
pub async fn load_dataset(
    entity_path: &Path,
    event_path: &Path,
) -> Result<(Dataset, LoadReport), DatasetError> {
    let mut bad_entities = 0;
    let mut bad_events = 0;
    let (entities, events) = tokio::try_join!(
        read_records::<RawEntity>(entity_path, &mut bad_entities),
        read_records::<RawRelation>(event_path, &mut bad_events),
    )?;

    let (dataset, mut report) = Dataset::from_raw(entities, events);
    report.entities_skipped += bad_entities;
    report.relations_skipped += bad_events;

    info!(
        entities = report.entities_loaded,
        relations = report.relations_loaded,
        skipped = report.entities_skipped + report.relations_skipped,
        "Dataset loaded"
    );
    Ok((dataset, report))
}

/// Load a base dataset and, if given, merge an overlay dataset into it.
pub async fn load_with_overlay(
    base: (&Path, &Path),
    overlay: Option<(&Path, &Path)>,
) -> Result<(Dataset, LoadReport), DatasetError> {
    let (mut dataset, mut report) = load_dataset(base.0, base.1).await?;
    if let Some((entities, events)) = overlay {
        let (extra, extra_report) = load_dataset(entities, events).await?;
        let merged = dataset.merge(extra);
        report.absorb_overlay(&extra_report, &merged);
    }
    Ok((dataset, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw_entity(id: &str, name: &str, kind: &str) -> RawEntity {
        RawEntity {
            id: Some(RawId::Text(id.into())),
            name: Some(name.into()),
            kind: Some(kind.into()),
        }
    }

    fn raw_event(id: &str, from: &str, to: &str, date: &str) -> RawRelation {
        RawRelation {
            date: Some(date.into()),
            subject: Some("subject".into()),
            message_id: Some(RawId::Text(id.into())),
            from: Some(RawId::Text(from.into())),
            to: Some(RawId::Text(to.into())),
            kind: Some("email".into()),
        }
    }

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let ts = parse_timestamp("2000-07-17T07:51:00.000Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2000, 7, 17, 7, 51, 0).unwrap());

        let ts = parse_timestamp("2001-05-14T16:39:00-07:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2001, 5, 14, 23, 39, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_naive_forms() {
        assert_eq!(
            parse_timestamp("2000-01-02 03:04:05").unwrap(),
            Utc.with_ymd_and_hms(2000, 1, 2, 3, 4, 5).unwrap()
        );
        assert_eq!(
            parse_timestamp("2000-01-02").unwrap(),
            Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_from_raw_skips_malformed_entities() {
        let entities = vec![
            raw_entity("1", "alice@enron.com", "EnronEmailAddress"),
            RawEntity {
                id: None,
                name: Some("nobody".into()),
                kind: None,
            },
            RawEntity {
                id: Some(RawId::Text("   ".into())),
                ..Default::default()
            },
        ];
        let (dataset, report) = Dataset::from_raw(entities, Vec::new());
        assert_eq!(dataset.entities().len(), 1);
        assert_eq!(report.entities_loaded, 1);
        assert_eq!(report.entities_skipped, 2);
        assert_eq!(dataset.entity("1").unwrap().kind, EntityKind::EnronAddress);
    }

    #[test]
    fn test_numeric_ids_are_accepted() {
        let entities = vec![RawEntity {
            id: Some(RawId::Number(42.into())),
            name: None,
            kind: None,
        }];
        let (dataset, _) = Dataset::from_raw(entities, Vec::new());
        let entity = dataset.entity("42").unwrap();
        assert_eq!(entity.name, "42");
        assert_eq!(entity.kind, EntityKind::Other(String::new()));
    }

    #[test]
    fn test_duplicate_entities_keep_first() {
        let entities = vec![
            raw_entity("a", "first", "EnronEmailAddress"),
            raw_entity("a", "second", "ExternalEmailAddress"),
        ];
        let (dataset, report) = Dataset::from_raw(entities, Vec::new());
        assert_eq!(dataset.entities().len(), 1);
        assert_eq!(dataset.entity("a").unwrap().name, "first");
        assert_eq!(report.duplicate_entities, 1);
    }

    #[test]
    fn test_from_raw_relation_policies() {
        let entities = vec![raw_entity("a", "a", ""), raw_entity("b", "b", "")];
        let events = vec![
            raw_event("m1", "a", "b", "2000-01-01T10:00:00Z"),
            raw_event("m2", "a", "a", "2000-01-01T10:00:00Z"),
            raw_event("m3", "b", "a", "garbage"),
            RawRelation {
                from: Some(RawId::Text("a".into())),
                ..Default::default()
            },
        ];
        let (dataset, report) = Dataset::from_raw(entities, events);

        assert_eq!(dataset.relations().len(), 2);
        assert_eq!(report.self_relations, 1);
        assert_eq!(report.unparseable_dates, 1);
        assert_eq!(report.relations_skipped, 1);
        assert!(dataset.relation("m3").unwrap().timestamp.is_none());
        assert!(dataset.relations().iter().all(|r| !r.is_self()));
    }

    #[test]
    fn test_shared_message_ids_are_suffixed() {
        let entities = vec![
            raw_entity("a", "a", ""),
            raw_entity("b", "b", ""),
            raw_entity("c", "c", ""),
        ];
        let events = vec![
            raw_event("m1", "a", "b", "2000-01-01"),
            raw_event("m1", "a", "c", "2000-01-01"),
            raw_event("m1", "a", "d", "2000-01-01"),
        ];
        let (dataset, report) = Dataset::from_raw(entities, events);
        let ids: Vec<&str> = dataset.relations().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m1#1", "m1#2"]);
        assert!(dataset.relations().iter().all(|r| r.message_id == "m1"));
        assert_eq!(report.renamed_relations, 2);
        assert_eq!(report.dangling_relations, 1);
    }

    #[test]
    fn test_merge_overlay() {
        let (mut base, _) = Dataset::from_raw(
            vec![raw_entity("a", "a", "EnronEmailAddress"), raw_entity("b", "b", "")],
            vec![raw_event("m1", "a", "b", "2000-01-01")],
        );
        let (overlay, _) = Dataset::from_raw(
            vec![raw_entity("n1", "Acme", "NERCompany"), raw_entity("a", "dup", "")],
            vec![raw_event("m1", "a", "n1", "2000-01-02")],
        );

        let report = base.merge(overlay);
        assert_eq!(report.entities_loaded, 1);
        assert_eq!(report.duplicate_entities, 1);
        assert_eq!(report.renamed_relations, 1);
        assert_eq!(base.entities().len(), 3);
        assert_eq!(base.relations().len(), 2);
        assert!(base.relation("m1#1").is_some());
        assert_eq!(base.entity("a").unwrap().name, "a");
        assert!(base.entity("n1").unwrap().kind.is_ner());
    }

    #[test]
    fn test_empty_dataset() {
        let (dataset, report) = Dataset::from_raw(Vec::new(), Vec::new());
        assert!(dataset.is_empty());
        assert!(!report.has_issues());
    }
}
