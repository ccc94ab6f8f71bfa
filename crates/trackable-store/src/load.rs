//! Loading unset reference navigations across a graph
//!
//! Every entity reachable from the roots is visited once. Before the walk
//! descends into an entity, each of its reference navigations that holds no
//! target is offered to the loader; a returned entity is attached (or matched
//! to an entity of the graph with the same type and primary key) and
//! assigned, so the walk continues into what was just loaded.

use std::collections::HashMap;
use std::time::Instant;

use trackable_core::traversal::{traverse, GraphWalk};
use trackable_core::{log_op_end, log_op_error, log_op_start};
use trackable_core::{EntityGraph, EntityKey, Trackable};

use crate::errors::Result;
use crate::session::{AsyncReferenceLoader, ReferenceLoader, ReferenceRequest};

type IdentityMap = HashMap<(&'static str, String), EntityKey>;

/// Populate unset references reachable from the roots
///
/// # Returns
///
/// Number of references assigned.
///
/// # Errors
///
/// Returns loader errors unchanged, and `NotFound`/`UnregisteredType` if a
/// loaded entity cannot join the graph.
pub fn load_related_entities<L>(loader: &L, graph: &mut EntityGraph, roots: &[EntityKey]) -> Result<usize>
where
    L: ReferenceLoader + ?Sized,
{
    log_op_start!("load_related_entities", root_count = roots.len());
    let start = Instant::now();

    let loaded = load_impl(loader, graph, roots).map_err(|e| {
        log_op_error!(
            "load_related_entities",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "load_related_entities",
        duration_ms = start.elapsed().as_millis() as u64,
        loaded_count = loaded
    );
    Ok(loaded)
}

/// Asynchronous counterpart of [`load_related_entities`]
///
/// # Errors
///
/// See [`load_related_entities`].
pub async fn load_related_entities_async<L>(
    loader: &L,
    graph: &mut EntityGraph,
    roots: &[EntityKey],
) -> Result<usize>
where
    L: AsyncReferenceLoader + ?Sized,
{
    log_op_start!("load_related_entities_async", root_count = roots.len());
    let start = Instant::now();

    let loaded = load_async_impl(loader, graph, roots).await.map_err(|e| {
        log_op_error!(
            "load_related_entities_async",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "load_related_entities_async",
        duration_ms = start.elapsed().as_millis() as u64,
        loaded_count = loaded
    );
    Ok(loaded)
}

fn load_impl<L>(loader: &L, graph: &mut EntityGraph, roots: &[EntityKey]) -> Result<usize>
where
    L: ReferenceLoader + ?Sized,
{
    let mut identities = identity_map(graph, roots)?;
    let mut loaded = 0;

    for root in roots {
        let mut walk = GraphWalk::new(*root);
        while let Some(node) = walk.next_node(graph)? {
            for request in unset_references(graph, node.entity)? {
                if let Some(entity) = loader.load_reference(&request)? {
                    assign(graph, &mut identities, node.entity, request.navigation, entity)?;
                    loaded += 1;
                }
            }
        }
    }
    Ok(loaded)
}

async fn load_async_impl<L>(loader: &L, graph: &mut EntityGraph, roots: &[EntityKey]) -> Result<usize>
where
    L: AsyncReferenceLoader + ?Sized,
{
    let mut identities = identity_map(graph, roots)?;
    let mut loaded = 0;

    for root in roots {
        let mut walk = GraphWalk::new(*root);
        while let Some(node) = walk.next_node(graph)? {
            for request in unset_references(graph, node.entity)? {
                if let Some(entity) = loader.load_reference(&request).await? {
                    assign(graph, &mut identities, node.entity, request.navigation, entity)?;
                    loaded += 1;
                }
            }
        }
    }
    Ok(loaded)
}

/// Entities with a primary key already reachable from the roots
fn identity_map(graph: &EntityGraph, roots: &[EntityKey]) -> Result<IdentityMap> {
    let mut identities = IdentityMap::new();
    for root in roots {
        for node in traverse(graph, *root)? {
            let entity = graph.entity(node.entity)?;
            if let Some(key) = entity.primary_key() {
                identities.entry((entity.type_name(), key)).or_insert(node.entity);
            }
        }
    }
    Ok(identities)
}

fn unset_references(graph: &EntityGraph, entity: EntityKey) -> Result<Vec<ReferenceRequest>> {
    let descriptor = graph.descriptor_of(entity)?;
    let owner = graph.entity(entity)?;
    let mut requests = Vec::new();
    for nav in descriptor.navigation() {
        if !nav.is_reference() || graph.reference_of(entity, nav.name())?.is_some() {
            continue;
        }
        requests.push(ReferenceRequest {
            entity_type: descriptor.type_name(),
            navigation: nav.name(),
            target_type: nav.target_name(),
            owner_values: owner.property_values(),
        });
    }
    Ok(requests)
}

fn assign(
    graph: &mut EntityGraph,
    identities: &mut IdentityMap,
    owner: EntityKey,
    navigation: &str,
    entity: Box<dyn Trackable>,
) -> Result<()> {
    let identity = entity.primary_key().map(|k| (entity.type_name(), k));
    let target = match identity.as_ref().and_then(|id| identities.get(id)) {
        Some(existing) => *existing,
        None => {
            let key = graph.attach_boxed(entity)?;
            if let Some(identity) = identity {
                identities.insert(identity, key);
            }
            key
        }
    };
    tracing::debug!(entity_key = %owner, navigation, target_key = %target, "reference loaded");
    graph.set_reference(owner, navigation, Some(target))?;
    Ok(())
}
