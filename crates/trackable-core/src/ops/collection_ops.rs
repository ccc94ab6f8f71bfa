//! Tracking collection operations
//!
//! Free functions over an [`EntityGraph`] and one of its collections. The
//! insertion and removal rules drive the per-entity state machine:
//!
//! - inserting while tracking marks the entity (and what it owns) Added and
//!   starts observing its property changes
//! - removing while tracking marks it Deleted and keeps it in the
//!   collection's cached deletes, unless it was Added in the first place
//! - property changes flip Unchanged entities to Modified and record the
//!   property name
//!
//! `get_changes` produces the changes-only copy persisted by a store.

use std::time::Instant;

use trackable_core_types::{CollectionKey, EntityKey, ObjectId};

use crate::diff::{ChangeSet, CloneOptions, GraphCloner};
use crate::errors::{Result, TrackingError};
use crate::model::{TrackingState, MODIFIED_PROPERTIES_PROPERTY, TRACKING_STATE_PROPERTY};
use crate::navigation::NavigationPropertiesExt;
use crate::traversal::{RestoredDeletes, VisitationGuard};
use crate::{log_op_end, log_op_error, log_op_start};

use super::collection::TrackingCollection;
use super::graph::EntityGraph;
use super::tracking_ops;

/// Create an empty collection
pub fn new_collection(graph: &mut EntityGraph, tracking: bool) -> CollectionKey {
    graph.insert_collection(TrackingCollection::new(tracking))
}

/// Create a collection seeded with existing entities
///
/// The entities keep their current state; tracking is then enabled over the
/// whole reachable graph unless `disable_tracking` is set.
///
/// # Errors
///
/// Returns `EntityNotFound` if any entity is not part of the graph.
pub fn from_entities<I>(
    graph: &mut EntityGraph,
    entities: I,
    disable_tracking: bool,
) -> Result<CollectionKey>
where
    I: IntoIterator<Item = EntityKey>,
{
    let items: Vec<EntityKey> = entities.into_iter().collect();
    for item in &items {
        graph.entity(*item)?;
    }

    let collection = graph.insert_collection(TrackingCollection::new(false).with_items(items));
    if !disable_tracking {
        set_tracking(graph, collection, true)?;
    }
    Ok(collection)
}

/// Turn tracking on or off for a collection and its reachable graph
///
/// # Errors
///
/// Returns `CollectionNotFound`/`EntityNotFound` for dangling keys and
/// `UnregisteredType` for entities whose type was never described.
pub fn set_tracking(graph: &mut EntityGraph, collection: CollectionKey, enabled: bool) -> Result<()> {
    let mut guard = VisitationGuard::new();
    tracking_ops::set_collection_tracking(
        graph,
        collection,
        enabled,
        &mut guard,
        false,
        Some(collection),
    )?;
    tracing::debug!(collection_key = %collection, enabled, "tracking toggled");
    Ok(())
}

/// Append an entity to the collection
///
/// # Errors
///
/// See [`insert`].
pub fn add(graph: &mut EntityGraph, collection: CollectionKey, entity: EntityKey) -> Result<()> {
    let len = graph.collection(collection)?.len();
    insert(graph, collection, len, entity)
}

/// Insert an entity at `index`
///
/// With tracking on, the entity gets an identifier, becomes observed, has
/// tracking enabled on its navigation properties and is marked Added together
/// with the items of its collections. The collection and its parent are
/// treated as already visited so back-references are left alone.
///
/// # Errors
///
/// Returns `IndexOutOfRange` if `index > len`, and `EntityNotFound` /
/// `CollectionNotFound` for dangling keys.
pub fn insert(
    graph: &mut EntityGraph,
    collection: CollectionKey,
    index: usize,
    entity: EntityKey,
) -> Result<()> {
    let (len, tracking, parent) = {
        let coll = graph.collection(collection)?;
        (coll.len(), coll.tracking(), coll.parent())
    };
    if index > len {
        return Err(TrackingError::IndexOutOfRange { index, len });
    }
    graph.entity(entity)?;

    if tracking {
        {
            let header = graph.entity_mut(entity)?.tracking_mut();
            header.ensure_identifier();
            header.notifier_mut().observe(collection);
        }

        let guard = seeded_guard(collection, parent);
        tracking_ops::set_entity_tracking(graph, entity, true, &mut guard.branch(), false, None)?;
        tracking_ops::set_state(graph, entity, TrackingState::Added, &mut guard.branch(), false)?;
        graph.raise_entity_changed(collection);
    }

    graph.collection_mut(collection)?.insert_item(index, entity);
    tracing::debug!(collection_key = %collection, entity_key = %entity, tracking, "entity inserted");
    Ok(())
}

/// Remove the first occurrence of an entity; false if it was not a member
///
/// # Errors
///
/// See [`remove_at`].
pub fn remove(graph: &mut EntityGraph, collection: CollectionKey, entity: EntityKey) -> Result<bool> {
    match graph.collection(collection)?.position(entity) {
        Some(index) => {
            remove_at(graph, collection, index)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Remove the entity at `index` and return it
///
/// With tracking on, the entity's modified properties are cleared (also on
/// the items it owns), it stops being observed, tracking is switched off on
/// the collections it owns, and it is marked Deleted. An entity that was
/// Added vanishes without a delete record, except when it belongs to a
/// many-to-many collection, where removing it deletes the association.
///
/// # Errors
///
/// Returns `IndexOutOfRange` if `index >= len`.
pub fn remove_at(graph: &mut EntityGraph, collection: CollectionKey, index: usize) -> Result<EntityKey> {
    let (entity, tracking, parent) = {
        let coll = graph.collection(collection)?;
        let entity = coll
            .items()
            .get(index)
            .copied()
            .ok_or(TrackingError::IndexOutOfRange {
                index,
                len: coll.len(),
            })?;
        (entity, coll.tracking(), coll.parent())
    };

    if tracking {
        let guard = seeded_guard(collection, parent);

        graph
            .entity_mut(entity)?
            .tracking_mut()
            .set_modified_properties(None);
        tracking_ops::set_modified_properties(graph, entity, None, &mut guard.branch())?;

        graph
            .entity_mut(entity)?
            .tracking_mut()
            .notifier_mut()
            .unobserve(collection);
        tracking_ops::set_entity_tracking(graph, entity, false, &mut guard.branch(), true, None)?;

        let many_to_many_added =
            parent.is_some() && graph.state(entity)? == TrackingState::Added;
        tracking_ops::set_state(graph, entity, TrackingState::Deleted, &mut guard.branch(), false)?;
        if many_to_many_added {
            graph
                .entity_mut(entity)?
                .tracking_mut()
                .set_state(TrackingState::Deleted);
        }
        graph.raise_entity_changed(collection);

        if graph.state(entity)? != TrackingState::Added && !many_to_many_added {
            graph.collection_mut(collection)?.cache_delete(entity);
        }
    }

    graph.collection_mut(collection)?.remove_item(index);
    tracing::debug!(collection_key = %collection, entity_key = %entity, tracking, "entity removed");
    Ok(entity)
}

/// Forget the entities removed while tracking
///
/// Called once the deletes have been persisted.
///
/// # Errors
///
/// Returns `CollectionNotFound` for an unknown collection.
pub fn remove_cached_deletes(graph: &mut EntityGraph, collection: CollectionKey) -> Result<()> {
    graph.collection_mut(collection)?.clear_cached_deletes();
    Ok(())
}

/// Handle a property-changed notification from an observed entity
///
/// Assigning a reference navigation extends tracking onto the new target and
/// leaves the entity's own state alone. Any other property, unless it is
/// excluded or one of the tracking properties themselves, moves an
/// Unchanged entity to Modified and is recorded in its modified properties.
pub(crate) fn on_property_changed(
    graph: &mut EntityGraph,
    collection: CollectionKey,
    entity: EntityKey,
    property: &str,
) -> Result<()> {
    let (tracking, excluded) = {
        let coll = graph.collection(collection)?;
        (coll.tracking(), coll.excluded_properties().contains(property))
    };
    if !tracking {
        return Ok(());
    }
    if property.is_empty() {
        return Err(TrackingError::NullPropertyName { key: entity });
    }

    if graph.descriptor_of(entity)?.is_reference_navigation(property) {
        if let Some(tracker) = graph.ref_property_change_tracker(entity, property)? {
            tracking_ops::set_collection_tracking(
                graph,
                tracker,
                true,
                &mut VisitationGuard::new(),
                false,
                Some(collection),
            )?;
        }
        return Ok(());
    }

    if property == TRACKING_STATE_PROPERTY || property == MODIFIED_PROPERTIES_PROPERTY || excluded {
        return Ok(());
    }

    let header = graph.entity_mut(entity)?.tracking_mut();
    let became_modified = header.state() == TrackingState::Unchanged;
    if became_modified {
        header.set_state(TrackingState::Modified);
    }
    header.add_modified_property(property);

    if became_modified {
        graph.raise_entity_changed(collection);
    }
    tracing::trace!(entity_key = %entity, property, "property change recorded");
    Ok(())
}

/// Changes-only copy of the collection's graph
///
/// Cached deletes are put back into the live collections for the duration
/// of the diff and removed again afterwards, also when the diff fails. The
/// result holds copies of the changed entities (and of the unchanged
/// entities needed to reach them), with tracking disabled.
///
/// # Arguments
///
/// - `graph`: graph owning the collection
/// - `collection`: root collection to diff
///
/// # Returns
///
/// A [`ChangeSet`] owning a new graph; the live graph is left as it was.
///
/// # Errors
///
/// Returns `Serialization` if the graph cannot be copied, plus the lookup
/// errors of dangling keys.
pub fn get_changes(graph: &mut EntityGraph, collection: CollectionKey) -> Result<ChangeSet> {
    log_op_start!("get_changes", collection_key = %collection);
    let start = Instant::now();

    let changes = get_changes_impl(graph, collection).map_err(|e| {
        log_op_error!(
            "get_changes",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "get_changes",
        duration_ms = start.elapsed().as_millis() as u64,
        changed_count = changes.len()
    );
    Ok(changes)
}

fn get_changes_impl(graph: &mut EntityGraph, collection: CollectionKey) -> Result<ChangeSet> {
    let restored = RestoredDeletes::restore(graph, collection)?;
    GraphCloner::new(&restored, CloneOptions::changes_only()).clone_collection(collection)
}

/// Changed members of the collection without copying anything
///
/// A new collection, tracking off, holding the live items that are not
/// Unchanged followed by the cached deletes.
///
/// # Errors
///
/// Returns `CollectionNotFound`/`EntityNotFound` for dangling keys.
pub fn get_changes_shallow(graph: &mut EntityGraph, collection: CollectionKey) -> Result<CollectionKey> {
    log_op_start!("get_changes_shallow", collection_key = %collection);
    let start = Instant::now();

    let result = get_changes_shallow_impl(graph, collection).map_err(|e| {
        log_op_error!(
            "get_changes_shallow",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "get_changes_shallow",
        duration_ms = start.elapsed().as_millis() as u64
    );
    Ok(result)
}

fn get_changes_shallow_impl(graph: &mut EntityGraph, collection: CollectionKey) -> Result<CollectionKey> {
    let coll = graph.collection(collection)?;
    let mut items = Vec::with_capacity(coll.len() + coll.cached_deletes().len());
    for item in coll.items() {
        if graph.state(*item)? != TrackingState::Unchanged {
            items.push(*item);
        }
    }
    for deleted in coll.cached_deletes() {
        if !items.contains(deleted) {
            items.push(*deleted);
        }
    }
    Ok(graph.insert_collection(TrackingCollection::new(false).with_items(items)))
}

/// Replace an entity of the collection with its persisted counterpart
///
/// `updated` is the entity returned by a persistence round trip (already
/// absorbed into `graph`). Children that were Unchanged in `original`, and
/// so never left with the change set, are added back to the matching
/// collections of `updated`, and their references to the parent are
/// pointed at `updated`. Then, with tracking suspended, `original` is
/// swapped for `updated` and tracking is restored to what it was.
///
/// # Errors
///
/// Returns `EntityNotFound` if either entity is missing and the lookup
/// errors of dangling keys.
#[deprecated(note = "persist the change set and call accept_changes on the live graph instead")]
pub fn merge_changes(
    graph: &mut EntityGraph,
    collection: CollectionKey,
    original: EntityKey,
    updated: EntityKey,
) -> Result<EntityKey> {
    log_op_start!("merge_changes", entity_key = %original);
    let start = Instant::now();

    merge_changes_impl(graph, collection, original, updated).map_err(|e| {
        log_op_error!(
            "merge_changes",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "merge_changes",
        duration_ms = start.elapsed().as_millis() as u64
    );
    Ok(updated)
}

fn merge_changes_impl(
    graph: &mut EntityGraph,
    collection: CollectionKey,
    original: EntityKey,
    updated: EntityKey,
) -> Result<()> {
    let updated_type = graph.entity(updated)?.as_any().type_id();

    for cp in graph.navigation_properties(updated)?.collections() {
        let Some(target) = cp.collection else {
            continue;
        };
        let Some(source) = graph.collection_of(original, cp.name)? else {
            continue;
        };

        let mut unchanged = Vec::new();
        for child in graph.collection(source)?.items() {
            if graph.state(*child)? == TrackingState::Unchanged {
                unchanged.push(*child);
            }
        }

        for child in unchanged {
            add(graph, target, child)?;
            for rp in graph.navigation_properties(child)?.references() {
                if rp.target_type == updated_type && rp.target.is_some() && rp.target != Some(updated) {
                    graph.bind_reference(child, rp.name, Some(updated))?;
                }
            }
        }
    }

    let was_tracking = graph.collection(collection)?.tracking();
    set_tracking(graph, collection, false)?;
    remove(graph, collection, original)?;
    add(graph, collection, updated)?;
    set_tracking(graph, collection, was_tracking)?;
    Ok(())
}

fn seeded_guard(collection: CollectionKey, parent: Option<EntityKey>) -> VisitationGuard {
    let mut guard = VisitationGuard::seeded(parent.map(ObjectId::from));
    guard.try_visit(collection);
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Node;

    fn tracked_root(graph: &mut EntityGraph, names: &[&str]) -> (CollectionKey, Vec<EntityKey>) {
        let keys: Vec<EntityKey> = names
            .iter()
            .map(|n| graph.attach(Node::named(n)).unwrap())
            .collect();
        let root = from_entities(graph, keys.clone(), false).unwrap();
        (root, keys)
    }

    #[test]
    fn test_insert_marks_added_and_observes() {
        let mut graph = EntityGraph::new();
        let root = new_collection(&mut graph, true);
        let node = graph.attach(Node::named("n")).unwrap();

        add(&mut graph, root, node).unwrap();

        let entity = graph.entity(node).unwrap();
        assert_eq!(entity.tracking().state(), TrackingState::Added);
        assert!(entity.tracking().notifier().is_observed_by(root));
        assert!(entity.tracking().entity_identifier().is_some());
        assert_eq!(
            graph.drain_events(),
            vec![crate::ops::GraphEvent::EntityChanged { collection: root }]
        );
    }

    #[test]
    fn test_insert_without_tracking_keeps_state() {
        let mut graph = EntityGraph::new();
        let root = new_collection(&mut graph, false);
        let node = graph.attach(Node::named("n")).unwrap();

        add(&mut graph, root, node).unwrap();

        assert_eq!(graph.state(node).unwrap(), TrackingState::Unchanged);
        assert!(graph.events().is_empty());
    }

    #[test]
    fn test_insert_rejects_out_of_range_index() {
        let mut graph = EntityGraph::new();
        let root = new_collection(&mut graph, true);
        let node = graph.attach(Node::named("n")).unwrap();

        let err = insert(&mut graph, root, 1, node).unwrap_err();

        assert_eq!(err, TrackingError::IndexOutOfRange { index: 1, len: 0 });
    }

    #[test]
    fn test_remove_caches_unchanged_entity() {
        let mut graph = EntityGraph::new();
        let (root, keys) = tracked_root(&mut graph, &["a", "b"]);

        assert!(remove(&mut graph, root, keys[0]).unwrap());

        let coll = graph.collection(root).unwrap();
        assert_eq!(coll.items(), &[keys[1]]);
        assert_eq!(coll.cached_deletes(), &[keys[0]]);
        assert_eq!(graph.state(keys[0]).unwrap(), TrackingState::Deleted);
        assert!(!graph
            .entity(keys[0])
            .unwrap()
            .tracking()
            .notifier()
            .is_observed_by(root));
    }

    #[test]
    fn test_remove_added_entity_leaves_no_record() {
        let mut graph = EntityGraph::new();
        let root = new_collection(&mut graph, true);
        let node = graph.attach(Node::named("n")).unwrap();
        add(&mut graph, root, node).unwrap();

        remove(&mut graph, root, node).unwrap();

        assert!(graph.collection(root).unwrap().cached_deletes().is_empty());
        assert_eq!(graph.state(node).unwrap(), TrackingState::Added);
    }

    #[test]
    fn test_remove_missing_entity_returns_false() {
        let mut graph = EntityGraph::new();
        let (root, _) = tracked_root(&mut graph, &["a"]);
        let stranger = graph.attach(Node::named("x")).unwrap();

        assert!(!remove(&mut graph, root, stranger).unwrap());
    }

    #[test]
    fn test_property_change_marks_modified_once() {
        let mut graph = EntityGraph::new();
        let (root, keys) = tracked_root(&mut graph, &["a"]);

        graph.modify::<Node, _, _>(keys[0], |n| n.set_name("x")).unwrap();
        graph.modify::<Node, _, _>(keys[0], |n| n.set_name("y")).unwrap();

        let tracking = graph.entity(keys[0]).unwrap().tracking();
        assert_eq!(tracking.state(), TrackingState::Modified);
        assert_eq!(
            tracking.modified_properties().unwrap().iter().collect::<Vec<_>>(),
            vec!["Name"]
        );
        let events: Vec<_> = graph
            .drain_events()
            .into_iter()
            .filter(|e| *e == crate::ops::GraphEvent::EntityChanged { collection: root })
            .collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_empty_property_name_fails() {
        let mut graph = EntityGraph::new();
        let (_, keys) = tracked_root(&mut graph, &["a"]);

        let err = graph.raise_property_changed(keys[0], "").unwrap_err();

        assert_eq!(err, TrackingError::NullPropertyName { key: keys[0] });
    }

    #[test]
    fn test_untracked_collection_ignores_changes() {
        let mut graph = EntityGraph::new();
        let (root, keys) = tracked_root(&mut graph, &["a"]);
        set_tracking(&mut graph, root, false).unwrap();

        graph.modify::<Node, _, _>(keys[0], |n| n.set_name("x")).unwrap();

        assert_eq!(graph.state(keys[0]).unwrap(), TrackingState::Unchanged);
    }

    #[test]
    fn test_shallow_changes_include_cached_deletes() {
        let mut graph = EntityGraph::new();
        let (root, keys) = tracked_root(&mut graph, &["a", "b", "c"]);
        graph.modify::<Node, _, _>(keys[0], |n| n.set_name("x")).unwrap();
        remove(&mut graph, root, keys[2]).unwrap();

        let shallow = get_changes_shallow(&mut graph, root).unwrap();

        let coll = graph.collection(shallow).unwrap();
        assert_eq!(coll.items(), &[keys[0], keys[2]]);
        assert!(!coll.tracking());
    }
}
