use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trackable_core::navigation::NavigationPropertiesExt;
use trackable_core::{log_op_end, log_op_error, log_op_start};
use trackable_core::{EntityGraph, EntityKey, Trackable};

use crate::errors::{missing_key, not_tracked, persistence, Result};
use crate::relationship::{EntityState, NavigationMetadata};
use crate::session::PersistenceSession;

use super::{Association, MemoryStore, RowKey};

/// Counts of the writes performed by [`MemorySession::save_changes`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub associations_added: usize,
    pub associations_removed: usize,
}

impl SaveReport {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted + self.associations_added + self.associations_removed
    }
}

#[derive(Debug)]
struct SessionEntry {
    entity_type: &'static str,
    primary_key: Option<String>,
    values: BTreeMap<String, Value>,
    entity: Box<dyn Trackable>,
    state: EntityState,
    modified: BTreeSet<String>,
    /// Join rows to the members of the entity's skip navigations
    joins: Vec<(EntityKey, Association)>,
}

#[derive(Debug, Clone)]
struct AssociationChange {
    association: Association,
    add: bool,
}

/// Unit of work over a [`MemoryStore`]
///
/// Entity states are recorded from the graph at the time they are set.
/// Nothing reaches the store until [`MemorySession::save_changes`]. Members
/// of a skip navigation that get inserted are joined to its owner on save.
#[derive(Debug)]
pub struct MemorySession<'s> {
    store: &'s mut MemoryStore,
    order: Vec<EntityKey>,
    entries: HashMap<EntityKey, SessionEntry>,
    associations: Vec<AssociationChange>,
}

impl<'s> MemorySession<'s> {
    pub(super) fn new(store: &'s mut MemoryStore) -> Self {
        Self {
            store,
            order: Vec::new(),
            entries: HashMap::new(),
            associations: Vec::new(),
        }
    }

    /// Properties that an update of the entity would write
    pub fn modified_properties(&self, entity: EntityKey) -> Option<&BTreeSet<String>> {
        self.entries.get(&entity).map(|e| &e.modified)
    }

    /// Entities tracked in a given state, in the order they were first seen
    pub fn entities_in(&self, state: EntityState) -> Vec<EntityKey> {
        self.order
            .iter()
            .copied()
            .filter(|k| self.entity_state(*k) == state)
            .collect()
    }

    pub fn pending_associations(&self) -> usize {
        self.associations.len()
    }

    /// Write every recorded change to the store
    ///
    /// All changes are validated first; the store is only touched when every
    /// one of them can be applied. Afterwards the session is empty.
    ///
    /// # Errors
    ///
    /// - `MissingKey`: a changed entity has no primary key
    /// - `Persistence`: an insert hits an existing row, or an update or
    ///   delete finds none
    pub fn save_changes(&mut self) -> Result<SaveReport> {
        log_op_start!("save_changes", entity_count = self.entries.len());
        let start = Instant::now();

        let report = self.save_impl().map_err(|e| {
            log_op_error!(
                "save_changes",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "save_changes",
            duration_ms = start.elapsed().as_millis() as u64,
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted
        );
        Ok(report)
    }

    fn save_impl(&mut self) -> Result<SaveReport> {
        let mut writes = Vec::new();
        for key in &self.order {
            let Some(entry) = self.entries.get(key) else {
                continue;
            };
            if matches!(entry.state, EntityState::Unchanged | EntityState::Detached) {
                continue;
            }
            let primary_key = entry
                .primary_key
                .clone()
                .ok_or_else(|| missing_key("save_changes", entry.entity_type).with_entity_key(key))?;
            let row_key = RowKey::new(entry.entity_type, primary_key);

            let exists = self.store.rows.contains_key(&row_key);
            match (entry.state, exists) {
                (EntityState::Added, true) => {
                    return Err(persistence("save_changes", format!("duplicate key {}", row_key)));
                }
                (EntityState::Modified | EntityState::Deleted, false) => {
                    return Err(persistence("save_changes", format!("row {} not found", row_key)));
                }
                _ => {}
            }
            writes.push((row_key, *key));
        }

        let joins: Vec<Association> = self
            .order
            .iter()
            .filter_map(|key| self.entries.get(key))
            .filter(|entry| entry.state != EntityState::Deleted)
            .flat_map(|entry| &entry.joins)
            .filter(|(item, _)| self.entity_state(*item) == EntityState::Added)
            .map(|(_, association)| association.clone())
            .collect();

        let mut report = SaveReport::default();
        for (row_key, key) in writes {
            let Some(entry) = self.entries.get(&key) else {
                continue;
            };
            match entry.state {
                EntityState::Added => {
                    self.store
                        .put_row(row_key, entry.values.clone(), entry.entity.clone_entity());
                    report.inserted += 1;
                }
                EntityState::Modified => {
                    if let Some(row) = self.store.rows.get_mut(&row_key) {
                        for property in &entry.modified {
                            if let Some(value) = entry.values.get(property) {
                                row.values.insert(property.clone(), value.clone());
                            }
                        }
                    }
                    report.updated += 1;
                }
                EntityState::Deleted => {
                    self.store.rows.remove(&row_key);
                    self.store
                        .associations
                        .retain(|a| a.owner != row_key && a.item != row_key);
                    report.deleted += 1;
                }
                EntityState::Unchanged | EntityState::Detached => {}
            }
        }

        for change in std::mem::take(&mut self.associations) {
            if change.add {
                if self.store.associations.insert(change.association) {
                    report.associations_added += 1;
                }
            } else if self.store.associations.remove(&change.association) {
                report.associations_removed += 1;
            }
        }
        for association in joins {
            if self.store.associations.insert(association) {
                report.associations_added += 1;
            }
        }

        self.order.clear();
        self.entries.clear();
        Ok(report)
    }

    fn association(
        &self,
        graph: &EntityGraph,
        owner: EntityKey,
        navigation: &str,
        item: EntityKey,
    ) -> Result<Association> {
        Ok(Association {
            owner: row_key_of(graph, owner, "association")?,
            navigation: navigation.to_string(),
            item: row_key_of(graph, item, "association")?,
        })
    }

    fn skip_navigation_joins(&self, graph: &EntityGraph, owner: EntityKey) -> Result<Vec<(EntityKey, Association)>> {
        let owner_type = graph.entity(owner)?.type_name();
        let Ok(owner_row) = row_key_of(graph, owner, "association") else {
            return Ok(Vec::new());
        };

        let mut joins = Vec::new();
        for cp in graph.navigation_properties(owner)?.collections() {
            let skip = self
                .store
                .navigation_metadata(owner_type, cp.name)
                .is_some_and(|m| m.is_skip_navigation);
            let Some(collection) = cp.collection.filter(|_| skip) else {
                continue;
            };
            for item in graph.collection(collection)?.items() {
                // Keyless items fail on save anyway
                if let Ok(item_row) = row_key_of(graph, *item, "association") {
                    joins.push((
                        *item,
                        Association {
                            owner: owner_row.clone(),
                            navigation: cp.name.to_string(),
                            item: item_row,
                        },
                    ));
                }
            }
        }
        Ok(joins)
    }
}

fn row_key_of(graph: &EntityGraph, key: EntityKey, op: &str) -> Result<RowKey> {
    let entity = graph.entity(key)?;
    let primary_key = entity
        .primary_key()
        .ok_or_else(|| missing_key(op, entity.type_name()).with_entity_key(key))?;
    Ok(RowKey::new(entity.type_name(), primary_key))
}

impl PersistenceSession for MemorySession<'_> {
    fn navigation_metadata(&self, entity_type: &str, navigation: &str) -> Option<NavigationMetadata> {
        self.store.navigation_metadata(entity_type, navigation).cloned()
    }

    fn entity_state(&self, entity: EntityKey) -> EntityState {
        self.entries
            .get(&entity)
            .map_or(EntityState::Detached, |e| e.state)
    }

    fn set_entity_state(&mut self, graph: &EntityGraph, entity: EntityKey, state: EntityState) -> Result<()> {
        if state == EntityState::Detached {
            self.entries.remove(&entity);
            self.order.retain(|k| *k != entity);
            return Ok(());
        }

        let source = graph.entity(entity)?;
        let values = source.property_values();
        let modified = if state == EntityState::Modified {
            values.keys().cloned().collect()
        } else {
            BTreeSet::new()
        };
        let snapshot = SessionEntry {
            entity_type: source.type_name(),
            primary_key: source.primary_key(),
            values,
            entity: graph.detached_copy(entity)?,
            state,
            modified,
            joins: self.skip_navigation_joins(graph, entity)?,
        };

        if self.entries.insert(entity, snapshot).is_none() {
            self.order.push(entity);
        }
        tracing::trace!(entity_key = %entity, state = ?state, "entity state set");
        Ok(())
    }

    fn property_names(&self, entity: EntityKey) -> Result<Vec<String>> {
        self.entries
            .get(&entity)
            .map(|e| e.values.keys().cloned().collect())
            .ok_or_else(|| not_tracked("property_names", entity))
    }

    fn set_property_modified(&mut self, entity: EntityKey, property: &str, modified: bool) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&entity)
            .ok_or_else(|| not_tracked("set_property_modified", entity))?;
        if modified {
            entry.modified.insert(property.to_string());
        } else {
            entry.modified.remove(property);
        }
        Ok(())
    }

    fn exists(&self, entity_type: &str, primary_key: &str) -> Result<bool> {
        Ok(self.store.contains(entity_type, primary_key))
    }

    fn add_association(
        &mut self,
        graph: &EntityGraph,
        owner: EntityKey,
        navigation: &str,
        item: EntityKey,
    ) -> Result<()> {
        let association = self.association(graph, owner, navigation, item)?;
        self.associations.push(AssociationChange {
            association,
            add: true,
        });
        Ok(())
    }

    fn remove_association(
        &mut self,
        graph: &EntityGraph,
        owner: EntityKey,
        navigation: &str,
        item: EntityKey,
    ) -> Result<()> {
        let association = self.association(graph, owner, navigation, item)?;
        self.associations.push(AssociationChange {
            association,
            add: false,
        });
        Ok(())
    }
}
