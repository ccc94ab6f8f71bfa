//! Change-preserving graph cloner
//!
//! Copies entity graphs into a new [`EntityGraph`]. A [`ReferenceTable`]
//! maps every source node to its copy, so an entity reachable along several
//! paths (or through a cycle) is copied once and every copied navigation
//! points at that one copy.
//!
//! Two modes:
//! - [`CloneMode::Full`]: deep copy of everything reachable
//! - [`CloneMode::ChangesOnly`]: only what a [`ChangeCollector`] proved
//!   changed, plus the entities needed to reach it

use std::collections::HashMap;
use std::time::Instant;

use trackable_core_types::{CollectionKey, EntityKey};

use crate::errors::{Result, TrackingError};
use crate::model::{CollectionSlot, Trackable};
use crate::navigation::NavigationKind;
use crate::ops::{EntityGraph, TrackingCollection};
use crate::{log_op_end, log_op_error, log_op_start};

use super::collector::ChangeCollector;
use super::model::ChangeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CloneMode {
    /// Copy every reachable entity and collection member
    #[default]
    Full,
    /// Copy only changed entities and the paths leading to them
    ChangesOnly,
}

/// Cloner configuration, passed explicitly to every clone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloneOptions {
    pub mode: CloneMode,
}

impl CloneOptions {
    pub fn full() -> Self {
        Self {
            mode: CloneMode::Full,
        }
    }

    pub fn changes_only() -> Self {
        Self {
            mode: CloneMode::ChangesOnly,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ReferenceEntry {
    ref_id: u64,
    copy: EntityKey,
}

/// Source-to-copy identity map of one clone
///
/// Reference ids are handed out in first-encounter order, starting at 1.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    next_ref_id: u64,
    entries: HashMap<EntityKey, ReferenceEntry>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the copy of `source`; returns the reference id assigned
    pub fn assign(&mut self, source: EntityKey, copy: EntityKey) -> u64 {
        self.next_ref_id += 1;
        let ref_id = self.next_ref_id;
        self.entries.insert(source, ReferenceEntry { ref_id, copy });
        ref_id
    }

    /// Copy already made for `source`
    pub fn resolve(&self, source: EntityKey) -> Option<EntityKey> {
        self.entries.get(&source).map(|e| e.copy)
    }

    pub fn ref_id(&self, source: EntityKey) -> Option<u64> {
        self.entries.get(&source).map(|e| e.ref_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Explicit visitor building the copy of a graph
pub struct GraphCloner<'a> {
    source: &'a EntityGraph,
    options: CloneOptions,
    collector: Option<ChangeCollector>,
    table: ReferenceTable,
    target: EntityGraph,
}

impl<'a> GraphCloner<'a> {
    pub fn new(source: &'a EntityGraph, options: CloneOptions) -> Self {
        Self {
            source,
            options,
            collector: None,
            table: ReferenceTable::new(),
            target: EntityGraph::with_registry(source.registry().clone()),
        }
    }

    /// Copy a collection and what its members reach
    ///
    /// The copied collection has tracking disabled.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if a node is missing or of an unregistered
    /// type, and `CollectionNotFound` for an unknown root.
    pub fn clone_collection(mut self, collection: CollectionKey) -> Result<ChangeSet> {
        let roots = match self.options.mode {
            CloneMode::Full => self.source.collection(collection)?.items().to_vec(),
            CloneMode::ChangesOnly => {
                let mut collector = ChangeCollector::new();
                let changed = collector.collect_collection(self.source, collection)?;
                self.collector = Some(collector);
                changed
            }
        };

        let mut copies = Vec::with_capacity(roots.len());
        for root in roots {
            copies.push(self.clone_node(root)?);
        }
        tracing::debug!(
            collection_key = %collection,
            copied = self.table.len(),
            "collection cloned"
        );

        let root = self
            .target
            .insert_collection(TrackingCollection::new(false).with_items(copies));
        Ok(ChangeSet::new(self.target, root))
    }

    /// Copy one entity and what it reaches
    ///
    /// In changes-only mode an entity with nothing to report yields `None`.
    ///
    /// # Errors
    ///
    /// Same as [`GraphCloner::clone_collection`].
    pub fn clone_entity(mut self, entity: EntityKey) -> Result<Option<(EntityGraph, EntityKey)>> {
        if self.options.mode == CloneMode::ChangesOnly {
            let mut collector = ChangeCollector::new();
            let changed = collector.collect(self.source, None, &[entity])?;
            if changed.is_empty() {
                return Ok(None);
            }
            self.collector = Some(collector);
        }

        let copy = self.clone_node(entity)?;
        Ok(Some((self.target, copy)))
    }

    fn clone_node(&mut self, node: EntityKey) -> Result<EntityKey> {
        if let Some(copy) = self.table.resolve(node) {
            return Ok(copy);
        }

        let source = self.source;
        let original = source.entity(node).map_err(|_| TrackingError::Serialization {
            reason: format!("dangling reference to {node}"),
        })?;
        let descriptor = source
            .registry()
            .descriptor_for(original)
            .map_err(|e| TrackingError::Serialization {
                reason: e.to_string(),
            })?;

        let copy = self
            .target
            .insert_raw(descriptor.detached_copy(original, CollectionSlot::Unloaded));
        self.table.assign(node, copy);

        for nav in descriptor.navigation() {
            match nav.kind() {
                NavigationKind::Reference => {
                    let target = nav.reference(original).and_then(|slot| slot.target());
                    let Some(target) = target else {
                        continue;
                    };
                    if !self.include_reference(node, nav.name()) {
                        continue;
                    }
                    let target_copy = self.clone_node(target)?;
                    self.target.bind_reference_slot(copy, nav, Some(target_copy))?;
                }
                NavigationKind::Collection { many_to_many } => {
                    let slot = nav.collection(original).copied().unwrap_or_default();
                    let value = match slot.collection() {
                        Some(members) => {
                            let items = source
                                .collection(members)
                                .map_err(|e| TrackingError::Serialization {
                                    reason: e.to_string(),
                                })?
                                .items()
                                .to_vec();
                            let mut kept = Vec::new();
                            for item in items {
                                if self.include_collection_item(node, nav.name(), item) {
                                    kept.push(self.clone_node(item)?);
                                }
                            }
                            // Changes-only copies leave collections without changes unloaded
                            if kept.is_empty() && self.collector.is_some() {
                                CollectionSlot::Unloaded
                            } else {
                                let collection = TrackingCollection::new(false)
                                    .with_parent(many_to_many.then_some(copy))
                                    .with_items(kept);
                                CollectionSlot::Bound(self.target.insert_collection(collection))
                            }
                        }
                        None => CollectionSlot::Unloaded,
                    };
                    self.target.set_collection_slot(copy, nav, value)?;
                }
            }
        }
        Ok(copy)
    }

    fn include_reference(&self, entity: EntityKey, property: &str) -> bool {
        self.collector
            .as_ref()
            .map_or(true, |c| c.include_reference(entity, property))
    }

    fn include_collection_item(&self, entity: EntityKey, property: &str, item: EntityKey) -> bool {
        self.collector
            .as_ref()
            .map_or(true, |c| c.include_collection_item(entity, property, item))
    }
}

/// Deep copy of a collection and everything reachable from it
///
/// # Errors
///
/// Returns `Serialization` if the graph cannot be copied.
pub fn clone_collection(
    graph: &EntityGraph,
    collection: CollectionKey,
    options: CloneOptions,
) -> Result<ChangeSet> {
    log_op_start!("clone_collection", collection_key = %collection, mode = ?options.mode);
    let start = Instant::now();

    let cloned = GraphCloner::new(graph, options)
        .clone_collection(collection)
        .map_err(|e| {
            log_op_error!(
                "clone_collection",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

    log_op_end!(
        "clone_collection",
        duration_ms = start.elapsed().as_millis() as u64,
        item_count = cloned.len()
    );
    Ok(cloned)
}

/// Deep copy of one entity and everything reachable from it
///
/// # Errors
///
/// Returns `Serialization` if the graph cannot be copied.
pub fn clone_entity_graph(
    graph: &EntityGraph,
    entity: EntityKey,
    options: CloneOptions,
) -> Result<Option<(EntityGraph, EntityKey)>> {
    log_op_start!("clone_entity_graph", entity_key = %entity, mode = ?options.mode);
    let start = Instant::now();

    let cloned = GraphCloner::new(graph, options)
        .clone_entity(entity)
        .map_err(|e| {
            log_op_error!(
                "clone_entity_graph",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

    log_op_end!(
        "clone_entity_graph",
        duration_ms = start.elapsed().as_millis() as u64
    );
    Ok(cloned)
}
