use trackable_core_types::EntityKey;

use crate::errors::Result;
use crate::navigation::NavigationProperty;
use crate::ops::EntityGraph;

use super::guard::VisitationGuard;

/// Navigation an entity was first reached through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSource {
    pub entity: EntityKey,
    pub navigation: &'static str,
}

/// One step of a [`GraphWalk`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphNode {
    pub entity: EntityKey,
    /// `None` for the root
    pub source: Option<NodeSource>,
}

/// Depth-first, pre-order walk over references and collection items
///
/// Each entity is yielded once. A node's navigation properties are only read
/// when the next node is requested, so callers may fill in a node (for
/// example load a missing reference) before the walk descends into it.
#[derive(Debug)]
pub struct GraphWalk {
    guard: VisitationGuard,
    stack: Vec<GraphNode>,
    last: Option<EntityKey>,
}

impl GraphWalk {
    pub fn new(root: EntityKey) -> Self {
        Self {
            guard: VisitationGuard::new(),
            stack: vec![GraphNode {
                entity: root,
                source: None,
            }],
            last: None,
        }
    }

    /// Advance the walk
    ///
    /// # Errors
    ///
    /// Returns lookup errors when a navigation points at a missing node.
    pub fn next_node(&mut self, graph: &EntityGraph) -> Result<Option<GraphNode>> {
        if let Some(previous) = self.last.take() {
            self.expand(graph, previous)?;
        }

        while let Some(node) = self.stack.pop() {
            if self.guard.try_visit(node.entity) {
                self.last = Some(node.entity);
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    fn expand(&mut self, graph: &EntityGraph, entity: EntityKey) -> Result<()> {
        let mut children = Vec::new();
        for nav in graph.navigation_properties(entity)? {
            match nav {
                NavigationProperty::Reference(rp) => {
                    if let Some(target) = rp.target {
                        children.push(GraphNode {
                            entity: target,
                            source: Some(NodeSource {
                                entity,
                                navigation: rp.name,
                            }),
                        });
                    }
                }
                NavigationProperty::Collection(cp) => {
                    if let Some(collection) = cp.collection {
                        for item in graph.collection(collection)?.items() {
                            children.push(GraphNode {
                                entity: *item,
                                source: Some(NodeSource {
                                    entity,
                                    navigation: cp.name,
                                }),
                            });
                        }
                    }
                }
            }
        }

        // Reversed so the first navigation is popped first
        for child in children.into_iter().rev() {
            if !self.guard.is_visited(child.entity) {
                self.stack.push(child);
            }
        }
        Ok(())
    }
}

/// Collect every node reachable from `root`
///
/// # Errors
///
/// Returns lookup errors when a navigation points at a missing node.
pub fn traverse(graph: &EntityGraph, root: EntityKey) -> Result<Vec<GraphNode>> {
    let mut walk = GraphWalk::new(root);
    let mut nodes = Vec::new();
    while let Some(node) = walk.next_node(graph)? {
        nodes.push(node);
    }
    Ok(nodes)
}
