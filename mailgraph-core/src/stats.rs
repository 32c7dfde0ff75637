//! Per-entity send counts ("rank") and the bounds used for node sizing.
//!
//! Rank is the out-degree over non-self relations. It drives node size
//! only; the degree filter uses connectivity from [`crate::graph`].

use serde::Serialize;
use std::collections::HashMap;

use crate::types::{Entity, EntityId, Relation};

/// Running minimum and maximum over computed ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankBounds {
    pub min: usize,
    pub max: usize,
}

impl RankBounds {
    /// Fold a sequence of ranks; the first value seeds both bounds.
    pub fn from_ranks(ranks: impl IntoIterator<Item = usize>) -> Option<Self> {
        ranks.into_iter().fold(None, |bounds, rank| {
            Some(match bounds {
                None => RankBounds { min: rank, max: rank },
                Some(b) => RankBounds {
                    min: b.min.min(rank),
                    max: b.max.max(rank),
                },
            })
        })
    }

    /// Map a rank onto a node size between `min_size` and `max_size`.
    ///
    /// Ranks below 1 and a zero-width range both yield `min_size`.
    pub fn size_for(&self, rank: usize, min_size: f64, max_size: f64) -> f64 {
        if rank < 1 || self.max <= self.min {
            return min_size;
        }
        let clamped = rank.clamp(self.min, self.max);
        let normalised = (clamped - self.min) as f64 / (self.max - self.min) as f64;
        normalised * (max_size - min_size) + min_size
    }
}

/// Send counts for every entity of a dataset.
#[derive(Debug, Clone, Default)]
pub struct EntityStatsIndex {
    ranks: HashMap<EntityId, usize>,
    bounds: Option<RankBounds>,
}

impl EntityStatsIndex {
    /// Count, for each entity, the relations it sent to someone else.
    ///
    /// Relations with an empty source or target are ignored. Entities that
    /// sent nothing get rank 0.
    pub fn compute<'a>(
        entities: impl IntoIterator<Item = &'a Entity>,
        relations: impl IntoIterator<Item = &'a Relation>,
    ) -> Self {
        let mut sent: HashMap<&str, usize> = HashMap::new();
        for relation in relations {
            if relation.source.is_empty() || relation.target.is_empty() || relation.is_self() {
                continue;
            }
            *sent.entry(relation.source.as_str()).or_insert(0) += 1;
        }

        let ranks: HashMap<EntityId, usize> = entities
            .into_iter()
            .filter(|e| !e.id.is_empty())
            .map(|e| (e.id.clone(), sent.get(e.id.as_str()).copied().unwrap_or(0)))
            .collect();
        let bounds = RankBounds::from_ranks(ranks.values().copied());

        Self { ranks, bounds }
    }

    pub fn rank(&self, id: &str) -> usize {
        self.ranks.get(id).copied().unwrap_or(0)
    }

    pub fn ranks(&self) -> &HashMap<EntityId, usize> {
        &self.ranks
    }

    /// `None` only when there were no entities.
    pub fn bounds(&self) -> Option<RankBounds> {
        self.bounds
    }

    /// Node size for an entity, falling back to `min_size` without bounds.
    pub fn size_of(&self, id: &str, min_size: f64, max_size: f64) -> f64 {
        match self.bounds {
            Some(bounds) => bounds.size_for(self.rank(id), min_size, max_size),
            None => min_size,
        }
    }
}
