//! Graph change collector
//!
//! One memoized pass over a root set of entities. For every entity the
//! collector records which reference navigations are proven unchanged and,
//! per collection navigation, which members are proven changed. The cloner
//! consults those records to decide what to copy.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use trackable_core_types::{CollectionKey, EntityKey};

use crate::errors::Result;
use crate::model::TrackingState;
use crate::ops::EntityGraph;
use crate::traversal::VisitationGuard;

/// What the collector proved about one entity's navigation properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityChangeRecord {
    /// Reference navigations whose target needs no copy
    pub unchanged_references: BTreeSet<&'static str>,
    /// Members proven changed, per collection navigation
    pub changed_items: BTreeMap<&'static str, HashSet<EntityKey>>,
}

#[derive(Debug, Default)]
pub struct ChangeCollector {
    guard: VisitationGuard,
    records: HashMap<EntityKey, EntityChangeRecord>,
}

impl ChangeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changed members of a collection
    ///
    /// # Errors
    ///
    /// Returns lookup errors for dangling keys.
    pub fn collect_collection(
        &mut self,
        graph: &EntityGraph,
        collection: CollectionKey,
    ) -> Result<Vec<EntityKey>> {
        let items = graph.collection(collection)?.items().to_vec();
        self.collect(graph, Some(collection), &items)
    }

    /// Entities of `items` that changed or lead to a change
    ///
    /// An entity is kept when its own state is not Unchanged or when one of
    /// its navigation properties reaches a change. `collection` is the
    /// collection the items were taken from; a collection already collected
    /// yields nothing.
    ///
    /// # Errors
    ///
    /// Returns lookup errors for dangling keys.
    pub fn collect(
        &mut self,
        graph: &EntityGraph,
        collection: Option<CollectionKey>,
        items: &[EntityKey],
    ) -> Result<Vec<EntityKey>> {
        if let Some(collection) = collection {
            if !self.guard.try_visit(collection) {
                return Ok(Vec::new());
            }
        }

        let fresh: Vec<EntityKey> = items
            .iter()
            .copied()
            .filter(|item| self.guard.try_visit(*item))
            .collect();

        let mut changed = Vec::new();
        for item in fresh {
            if self.entity_has_changes(graph, item)? {
                changed.push(item);
            }
        }
        Ok(changed)
    }

    fn entity_has_changes(&mut self, graph: &EntityGraph, item: EntityKey) -> Result<bool> {
        let mut downstream = false;

        for nav in graph.navigation_properties(item)? {
            if let Some(rp) = nav.as_reference_property() {
                let Some(target) = rp.target else {
                    continue;
                };
                let target_state = graph.state(target)?;

                if self.guard.is_visited(target) {
                    if target_state == TrackingState::Unchanged {
                        self.record(item).unchanged_references.insert(rp.name);
                    }
                    continue;
                }

                let reference_changes = match rp.tracker {
                    Some(tracker) => self.collect_collection(graph, tracker)?,
                    None => self.collect(graph, None, &[target])?,
                };
                let mut local = matches!(
                    target_state,
                    TrackingState::Added | TrackingState::Modified
                );
                for change in &reference_changes {
                    if graph.state(*change)? != TrackingState::Deleted {
                        local = true;
                    }
                }

                if !local && target_state == TrackingState::Unchanged {
                    self.record(item).unchanged_references.insert(rp.name);
                    continue;
                }
                downstream |= local;
            }

            if let Some(cp) = nav.as_collection_property() {
                let Some(collection) = cp.collection else {
                    continue;
                };
                let coll = graph.collection(collection)?;
                if coll.is_empty() || self.guard.is_visited(collection) {
                    continue;
                }
                let members = coll.items().to_vec();
                let changes = self.collect(graph, Some(collection), &members)?;
                downstream |= !changes.is_empty();
                self.record(item)
                    .changed_items
                    .insert(cp.name, changes.into_iter().collect());
            }
        }

        Ok(downstream || graph.state(item)? != TrackingState::Unchanged)
    }

    fn record(&mut self, entity: EntityKey) -> &mut EntityChangeRecord {
        self.records.entry(entity).or_default()
    }

    /// Record gathered for an entity, if any navigation needed one
    pub fn record_for(&self, entity: EntityKey) -> Option<&EntityChangeRecord> {
        self.records.get(&entity)
    }

    /// Should the reference navigation be copied
    ///
    /// False only for references proven unchanged.
    pub fn include_reference(&self, entity: EntityKey, property: &str) -> bool {
        self.records
            .get(&entity)
            .map_or(true, |r| !r.unchanged_references.contains(property))
    }

    /// Should a member of a collection navigation be copied
    ///
    /// Entities the collector never recorded keep every member; otherwise
    /// only members recorded as changed are kept.
    pub fn include_collection_item(&self, entity: EntityKey, property: &str, item: EntityKey) -> bool {
        match self.records.get(&entity) {
            None => true,
            Some(record) => record
                .changed_items
                .get(property)
                .is_some_and(|changed| changed.contains(&item)),
        }
    }
}
