//! Core type definitions for Mailgraph.
//!
//! Entities are the nodes of the communication graph (addresses, people,
//! organisations) and relations are the timestamped messages between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an entity as it appears in the input feed.
pub type EntityId = String;

/// Category of an entity, parsed from the input `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    EnronAddress,
    ExternalAddress,
    NerPerson,
    NerEmail,
    NerCompany,
    NerAgency,
    Other(String),
}

impl EntityKind {
    /// Parse the raw type string from the dataset.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "EnronEmailAddress" => EntityKind::EnronAddress,
            "ExternalEmailAddress" => EntityKind::ExternalAddress,
            "NERPerson" => EntityKind::NerPerson,
            "NEREmail" => EntityKind::NerEmail,
            "NERCompany" => EntityKind::NerCompany,
            "NERAgency" => EntityKind::NerAgency,
            other => EntityKind::Other(other.to_string()),
        }
    }

    /// The type string as it appears in the dataset.
    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::EnronAddress => "EnronEmailAddress",
            EntityKind::ExternalAddress => "ExternalEmailAddress",
            EntityKind::NerPerson => "NERPerson",
            EntityKind::NerEmail => "NEREmail",
            EntityKind::NerCompany => "NERCompany",
            EntityKind::NerAgency => "NERAgency",
            EntityKind::Other(raw) => raw,
        }
    }

    /// Style class the renderer uses to colour this kind of node.
    pub fn css_class(&self) -> Option<&'static str> {
        match self {
            EntityKind::EnronAddress => Some("enronAddress"),
            EntityKind::ExternalAddress => Some("externalAddress"),
            EntityKind::NerPerson => Some("NERPerson"),
            EntityKind::NerEmail => Some("NEREmail"),
            EntityKind::NerCompany => Some("NERCompany"),
            EntityKind::NerAgency => Some("NERAgency"),
            EntityKind::Other(_) => None,
        }
    }

    /// Whether the entity came from named-entity extraction rather than
    /// message headers. Any type string starting with `NER` counts.
    pub fn is_ner(&self) -> bool {
        self.as_str().starts_with("NER")
    }
}

impl From<String> for EntityKind {
    fn from(raw: String) -> Self {
        EntityKind::parse(&raw)
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the communication graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    /// Number of non-self relations with this entity as source.
    #[serde(default)]
    pub sent_count: usize,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            sent_count: 0,
        }
    }
}

/// A directed, timestamped message between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Unique element id. Equal to `message_id` unless the message was
    /// delivered to several recipients, see [`crate::dataset`].
    pub id: String,
    pub message_id: String,
    pub source: EntityId,
    pub target: EntityId,
    /// `None` when the input date could not be parsed.
    pub timestamp: Option<DateTime<Utc>>,
    pub subject: String,
    #[serde(default)]
    pub kind: String,
}

impl Relation {
    /// Create a relation whose element id equals its message id.
    pub fn new(
        message_id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        let message_id = message_id.into();
        Self {
            id: message_id.clone(),
            message_id,
            source: source.into(),
            target: target.into(),
            timestamp,
            subject: String::new(),
            kind: String::new(),
        }
    }

    /// Set the subject line.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// A relation from an entity to itself carries no flow information.
    pub fn is_self(&self) -> bool {
        self.source == self.target
    }

    /// Whether the relation touches the given entity at either end.
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}
