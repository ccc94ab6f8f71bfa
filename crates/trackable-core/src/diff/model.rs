//! Change set and change summary types.
//!
//! Summary types implement `Debug, Clone, Serialize, Deserialize, PartialEq`
//! and list entries in walk order, so equal change sets serialize equally.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use trackable_core_types::{CollectionKey, EntityKey};

use crate::errors::Result;
use crate::model::TrackingState;
use crate::ops::EntityGraph;
use crate::traversal::GraphWalk;

/// Changes-only copy of a tracked graph
///
/// Owns a new graph whose root collection (tracking off) holds the copied
/// root entities. Nothing in it is shared with the live graph.
#[derive(Debug)]
pub struct ChangeSet {
    graph: EntityGraph,
    root: CollectionKey,
}

impl ChangeSet {
    pub(crate) fn new(graph: EntityGraph, root: CollectionKey) -> Self {
        Self { graph, root }
    }

    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut EntityGraph {
        &mut self.graph
    }

    pub fn root(&self) -> CollectionKey {
        self.root
    }

    /// Root entities of the copy
    pub fn items(&self) -> &[EntityKey] {
        self.graph
            .collection(self.root)
            .map(|c| c.items())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn into_parts(self) -> (EntityGraph, CollectionKey) {
        (self.graph, self.root)
    }

    /// Summarize every changed entity of the copy
    ///
    /// # Errors
    ///
    /// Returns lookup errors for dangling keys.
    pub fn summary(&self) -> Result<ChangeSummary> {
        summarize(&self.graph, self.root)
    }
}

/// Serializable overview of the entities a change set touches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeSummary {
    /// Schema version of this structure (always 1)
    pub summary_schema_version: u32,
    /// Changed entities in walk order
    pub entities: Vec<EntityChangeEntry>,
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// One changed entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityChangeEntry {
    pub entity_type: String,
    /// Natural key, if the entity exposes one
    pub primary_key: Option<String>,
    pub state: TrackingState,
    /// Sorted modified property names (Modified entities only)
    pub modified_properties: Vec<String>,
    /// `Type.Navigation` the entity was reached through; `None` for roots
    pub via: Option<String>,
}

/// Summarize the changed entities reachable from a collection
///
/// # Errors
///
/// Returns lookup errors for dangling keys.
pub fn summarize(graph: &EntityGraph, root: CollectionKey) -> Result<ChangeSummary> {
    let mut summary = ChangeSummary {
        summary_schema_version: 1,
        entities: Vec::new(),
        added: 0,
        modified: 0,
        deleted: 0,
    };
    let mut seen = HashSet::new();

    for item in graph.collection(root)?.items() {
        let mut walk = GraphWalk::new(*item);
        while let Some(node) = walk.next_node(graph)? {
            if !seen.insert(node.entity) {
                continue;
            }
            let entity = graph.entity(node.entity)?;
            let state = entity.tracking().state();
            match state {
                TrackingState::Unchanged => continue,
                TrackingState::Added => summary.added += 1,
                TrackingState::Modified => summary.modified += 1,
                TrackingState::Deleted => summary.deleted += 1,
            }

            let via = match node.source {
                Some(source) => Some(format!(
                    "{}.{}",
                    graph.entity(source.entity)?.type_name(),
                    source.navigation
                )),
                None => None,
            };
            summary.entities.push(EntityChangeEntry {
                entity_type: entity.type_name().to_string(),
                primary_key: entity.primary_key(),
                state,
                modified_properties: entity
                    .tracking()
                    .modified_properties()
                    .map(|p| p.iter().cloned().collect())
                    .unwrap_or_default(),
                via,
            });
        }
    }
    Ok(summary)
}
