//! Accepting changes after a successful save

use std::time::Instant;

use trackable_core::traversal::GraphWalk;
use trackable_core::{log_op_end, log_op_error, log_op_start};
use trackable_core::{EntityGraph, EntityKey, TrackingState};

use crate::errors::Result;

/// Mark every entity reachable from the roots Unchanged
///
/// Modified properties are cleared along with the state.
///
/// # Returns
///
/// Number of entities whose state changed.
///
/// # Errors
///
/// Returns `NotFound` if a navigation points outside the graph.
pub fn accept_changes(graph: &mut EntityGraph, roots: &[EntityKey]) -> Result<usize> {
    log_op_start!("accept_changes", root_count = roots.len());
    let start = Instant::now();

    let accepted = accept_impl(graph, roots).map_err(|e| {
        log_op_error!(
            "accept_changes",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "accept_changes",
        duration_ms = start.elapsed().as_millis() as u64,
        accepted_count = accepted
    );
    Ok(accepted)
}

fn accept_impl(graph: &mut EntityGraph, roots: &[EntityKey]) -> Result<usize> {
    let mut accepted = 0;
    for root in roots {
        let mut walk = GraphWalk::new(*root);
        while let Some(node) = walk.next_node(graph)? {
            let changed = graph.modify_dyn(node.entity, |entity| {
                let tracking = entity.tracking_mut();
                let changed = tracking.state() != TrackingState::Unchanged;
                tracking.set_state(TrackingState::Unchanged);
                changed
            })?;
            if changed {
                accepted += 1;
            }
        }
    }
    Ok(accepted)
}
