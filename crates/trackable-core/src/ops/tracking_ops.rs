//! Recursive tracking operations over entity subgraphs
//!
//! Each walk takes the caller's [`VisitationGuard`]; the guard is what keeps
//! a cyclic graph from being walked forever.

use trackable_core_types::{CollectionKey, EntityKey};

use crate::errors::Result;
use crate::model::TrackingState;
use crate::navigation::NavigationPropertiesExt;
use crate::traversal::VisitationGuard;

use super::graph::EntityGraph;

/// Enable or disable tracking on a collection and everything reachable from it
///
/// Every item that passes the guard starts (or stops) being observed by the
/// collection, receives an entity identifier, and has tracking set on its
/// own navigation properties. When `forward` is given, child collections
/// forward their `EntityChanged` events to it while tracking is on.
pub(crate) fn set_collection_tracking(
    graph: &mut EntityGraph,
    collection: CollectionKey,
    enabled: bool,
    guard: &mut VisitationGuard,
    one_to_many_only: bool,
    forward: Option<CollectionKey>,
) -> Result<()> {
    if !guard.try_visit(collection) {
        return Ok(());
    }

    let items = graph.collection(collection)?.items().to_vec();
    for item in items {
        if !guard.try_visit(item) {
            continue;
        }
        {
            let tracking = graph.entity_mut(item)?.tracking_mut();
            if enabled {
                tracking.notifier_mut().observe(collection);
            } else {
                tracking.notifier_mut().unobserve(collection);
            }
            tracking.ensure_identifier();
        }
        set_entity_tracking(graph, item, enabled, guard, one_to_many_only, forward)?;
    }

    graph.collection_mut(collection)?.set_tracking_flag(enabled);
    tracing::trace!(collection_key = %collection, enabled, "collection tracking set");
    Ok(())
}

/// Set tracking on the navigation properties of one entity
///
/// Reference properties are reached through their change trackers. With
/// `one_to_many_only`, references and many-to-many collections are left
/// alone; only collections the entity owns are walked.
pub(crate) fn set_entity_tracking(
    graph: &mut EntityGraph,
    entity: EntityKey,
    enabled: bool,
    guard: &mut VisitationGuard,
    one_to_many_only: bool,
    forward: Option<CollectionKey>,
) -> Result<()> {
    let navs = graph.navigation_properties(entity)?;

    if !one_to_many_only {
        for rp in navs.references() {
            if let Some(tracker) = rp.tracker {
                set_collection_tracking(graph, tracker, enabled, guard, one_to_many_only, forward)?;
                apply_forward(graph, tracker, enabled, forward)?;
            }
        }
    }

    for cp in navs.collections() {
        let Some(collection) = cp.collection else {
            continue;
        };
        if one_to_many_only && cp.many_to_many {
            continue;
        }
        set_collection_tracking(graph, collection, enabled, guard, one_to_many_only, forward)?;
        apply_forward(graph, collection, enabled, forward)?;
    }
    Ok(())
}

fn apply_forward(
    graph: &mut EntityGraph,
    collection: CollectionKey,
    enabled: bool,
    forward: Option<CollectionKey>,
) -> Result<()> {
    if let Some(target) = forward.filter(|f| *f != collection) {
        graph
            .collection_mut(collection)?
            .set_entity_changed_forward(enabled.then_some(target));
    }
    Ok(())
}

/// Set the tracking state of an entity and of the items of its collections
///
/// Reference targets keep their state. Many-to-many items change state
/// themselves but do not pass it on, since their own collections belong to
/// the other side of the association. Deleting an Added entity leaves it
/// Added.
pub(crate) fn set_state(
    graph: &mut EntityGraph,
    entity: EntityKey,
    state: TrackingState,
    guard: &mut VisitationGuard,
    is_many_to_many_item: bool,
) -> Result<()> {
    if !is_many_to_many_item {
        for cp in graph.navigation_properties(entity)?.collections() {
            let Some(collection) = cp.collection else {
                continue;
            };
            if !guard.try_visit(collection) {
                continue;
            }
            let (items, many_to_many) = {
                let coll = graph.collection(collection)?;
                (coll.items().to_vec(), coll.parent().is_some())
            };
            for child in items {
                if !guard.try_visit(child) {
                    continue;
                }
                set_state(graph, child, state, guard, many_to_many)?;
            }
        }
    }

    let tracking = graph.entity_mut(entity)?.tracking_mut();
    if !(state == TrackingState::Deleted && tracking.state() == TrackingState::Added) {
        tracking.set_state(state);
    }
    Ok(())
}

/// Replace the modified properties of every item reachable through collections
pub(crate) fn set_modified_properties(
    graph: &mut EntityGraph,
    entity: EntityKey,
    properties: Option<&std::collections::BTreeSet<String>>,
    guard: &mut VisitationGuard,
) -> Result<()> {
    for cp in graph.navigation_properties(entity)?.collections() {
        let Some(collection) = cp.collection else {
            continue;
        };
        if !guard.try_visit(collection) {
            continue;
        }
        let items = graph.collection(collection)?.items().to_vec();
        for child in items {
            if !guard.try_visit(child) {
                continue;
            }
            graph
                .entity_mut(child)?
                .tracking_mut()
                .set_modified_properties(properties.cloned());
            set_modified_properties(graph, child, properties, guard)?;
        }
    }
    Ok(())
}
