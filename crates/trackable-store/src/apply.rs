//! Persistence state mapper
//!
//! Walks a change graph from its root and tells a [`PersistenceSession`]
//! which state each entity must be saved in. The state follows the entity's
//! own tracking state, except where the relationship to the entity it was
//! reached from calls for something else:
//!
//! | Relationship | Condition | Session state |
//! |---|---|---|
//! | OneToOne | source Added / Deleted | Added / Deleted |
//! | ManyToOne | source Added | Added |
//! | ManyToOne | source Deleted | Deleted (fails if Added children remain) |
//! | OneToMany | entity Deleted | Unchanged |
//! | ManyToMany | entity Added and already stored | Unchanged, association added |
//! | ManyToMany | entity Added and new | Added, joined by the engine |
//! | ManyToMany | entity Modified | Unchanged |
//! | ManyToMany | entity Deleted | Unchanged, association removed |

use std::time::Instant;

use trackable_core::errors::{ExError, ExErrorKind};
use trackable_core::traversal::{GraphNode, GraphWalk, VisitationGuard};
use trackable_core::{log_op_end, log_op_error, log_op_start};
use trackable_core::{EntityGraph, EntityKey, Trackable, TrackingState};

use crate::errors::{deleted_with_added_children, Result};
use crate::relationship::{EntityState, RelationshipType};
use crate::session::PersistenceSession;

/// Map the states of a change graph onto a persistence session
///
/// # Errors
///
/// See [`apply_changes_with`].
pub fn apply_changes<S>(session: &mut S, graph: &mut EntityGraph, root: EntityKey) -> Result<usize>
where
    S: PersistenceSession + ?Sized,
{
    apply_changes_with(session, graph, root, |_| {})
}

/// Map the states of a change graph, running `hook` on every entity first
///
/// The hook sees each entity before its state is decided, for example to
/// stamp audit columns. The root is detached from the session before the
/// walk starts.
///
/// # Arguments
///
/// - `session`: unit of work receiving the states
/// - `graph`: graph holding the changes (usually a change set copy)
/// - `root`: entity to start from
/// - `hook`: per-entity callback
///
/// # Returns
///
/// Number of entities mapped.
///
/// # Errors
///
/// - `DeletedWithAddedChildren`: a cascaded delete reaches an entity that
///   still owns Added entities
/// - `NotFound`: a navigation points outside the graph
/// - any error raised by the session
pub fn apply_changes_with<S, F>(
    session: &mut S,
    graph: &mut EntityGraph,
    root: EntityKey,
    mut hook: F,
) -> Result<usize>
where
    S: PersistenceSession + ?Sized,
    F: FnMut(&mut dyn Trackable),
{
    log_op_start!("apply_changes", entity_key = %root);
    let start = Instant::now();

    let mapped = apply_impl(session, graph, root, &mut hook).map_err(|e| {
        log_op_error!(
            "apply_changes",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "apply_changes",
        duration_ms = start.elapsed().as_millis() as u64,
        entity_count = mapped
    );
    Ok(mapped)
}

/// Map several change graphs in order
///
/// # Errors
///
/// Stops at the first failing root; see [`apply_changes_with`].
pub fn apply_changes_many<S>(session: &mut S, graph: &mut EntityGraph, roots: &[EntityKey]) -> Result<usize>
where
    S: PersistenceSession + ?Sized,
{
    let mut mapped = 0;
    for root in roots {
        mapped += apply_changes(session, graph, *root)?;
    }
    Ok(mapped)
}

/// Stop tracking every entity reachable from the roots
///
/// # Errors
///
/// Returns `NotFound` if a navigation points outside the graph.
pub fn detach_entities<S>(session: &mut S, graph: &EntityGraph, roots: &[EntityKey]) -> Result<()>
where
    S: PersistenceSession + ?Sized,
{
    for root in roots {
        let mut walk = GraphWalk::new(*root);
        while let Some(node) = walk.next_node(graph)? {
            session.set_entity_state(graph, node.entity, EntityState::Detached)?;
        }
    }
    Ok(())
}

fn apply_impl<S, F>(session: &mut S, graph: &mut EntityGraph, root: EntityKey, hook: &mut F) -> Result<usize>
where
    S: PersistenceSession + ?Sized,
    F: FnMut(&mut dyn Trackable),
{
    session.set_entity_state(graph, root, EntityState::Detached)?;

    let mut walk = GraphWalk::new(root);
    let mut mapped = 0;
    while let Some(node) = walk.next_node(graph)? {
        graph.modify_dyn(node.entity, &mut *hook)?;
        session.set_entity_state(graph, node.entity, EntityState::Detached)?;
        map_node(session, graph, node)?;
        mapped += 1;
    }
    Ok(mapped)
}

fn map_node<S>(session: &mut S, graph: &EntityGraph, node: GraphNode) -> Result<()>
where
    S: PersistenceSession + ?Sized,
{
    let entity = graph.entity(node.entity)?;
    let state = entity.tracking().state();

    let Some(source) = node.source else {
        return set_state(session, graph, node.entity, state);
    };
    let source_type = graph.entity(source.entity)?.type_name();
    let relationship = session
        .navigation_metadata(source_type, source.navigation)
        .map(|m| m.relationship());
    let source_state = session.entity_state(source.entity);

    tracing::trace!(
        entity_key = %node.entity,
        navigation = source.navigation,
        relationship = ?relationship,
        "mapping node"
    );

    match relationship {
        Some(RelationshipType::OneToOne) => {
            let resolved = match source_state {
                EntityState::Added => TrackingState::Added,
                EntityState::Deleted => TrackingState::Deleted,
                _ => state,
            };
            return set_state(session, graph, node.entity, resolved);
        }
        Some(RelationshipType::ManyToOne) => {
            if source_state == EntityState::Added {
                return set_state(session, graph, node.entity, TrackingState::Added);
            }
            if source_state == EntityState::Deleted || graph.state(source.entity)? == TrackingState::Deleted {
                let added = count_added_descendants(graph, node.entity)?;
                if added > 0 {
                    let cause = ExError::new(ExErrorKind::Persistence)
                        .with_op("set_entity_state")
                        .with_entity_key(node.entity)
                        .with_message(format!(
                            "{} dependent entities are Added under a Deleted principal",
                            added
                        ));
                    return Err(deleted_with_added_children(entity.type_name(), node.entity, cause));
                }
                return set_state(session, graph, node.entity, TrackingState::Deleted);
            }
        }
        Some(RelationshipType::OneToMany) => {
            if state == TrackingState::Deleted {
                return set_state(session, graph, node.entity, TrackingState::Unchanged);
            }
        }
        Some(RelationshipType::ManyToMany) => match state {
            TrackingState::Added => {
                let stored = match entity.primary_key() {
                    Some(key) => session.exists(entity.type_name(), &key)?,
                    None => false,
                };
                if !stored {
                    return set_state(session, graph, node.entity, TrackingState::Added);
                }
                set_state(session, graph, node.entity, TrackingState::Unchanged)?;
                return session.add_association(graph, source.entity, source.navigation, node.entity);
            }
            TrackingState::Modified => {
                return set_state(session, graph, node.entity, TrackingState::Unchanged);
            }
            TrackingState::Deleted => {
                set_state(session, graph, node.entity, TrackingState::Unchanged)?;
                return session.remove_association(graph, source.entity, source.navigation, node.entity);
            }
            TrackingState::Unchanged => {}
        },
        None => {}
    }

    set_state(session, graph, node.entity, state)
}

/// Record a state; a Modified entity only keeps its modified properties dirty
fn set_state<S>(session: &mut S, graph: &EntityGraph, entity: EntityKey, state: TrackingState) -> Result<()>
where
    S: PersistenceSession + ?Sized,
{
    session.set_entity_state(graph, entity, state.into())?;
    if state != TrackingState::Modified {
        return Ok(());
    }

    let Some(modified) = graph.entity(entity)?.tracking().modified_properties() else {
        return Ok(());
    };
    for property in session.property_names(entity)? {
        let dirty = modified.iter().any(|m| m.eq_ignore_ascii_case(&property));
        session.set_property_modified(entity, &property, dirty)?;
    }
    Ok(())
}

/// Added entities owned, directly or not, through collection navigations
fn count_added_descendants(graph: &EntityGraph, entity: EntityKey) -> Result<usize> {
    let mut guard = VisitationGuard::new();
    guard.try_visit(entity);
    let mut pending = vec![entity];
    let mut added = 0;

    while let Some(current) = pending.pop() {
        for nav in graph.navigation_properties(current)? {
            let Some(collection) = nav.as_collection_property().and_then(|cp| cp.collection) else {
                continue;
            };
            for item in graph.collection(collection)?.items() {
                if !guard.try_visit(*item) {
                    continue;
                }
                if graph.state(*item)? == TrackingState::Added {
                    added += 1;
                }
                pending.push(*item);
            }
        }
    }
    Ok(added)
}
