use std::ops::Deref;

use trackable_core_types::{CollectionKey, EntityKey};

use crate::errors::Result;
use crate::navigation::NavigationPropertiesExt;
use crate::ops::EntityGraph;

use super::guard::VisitationGuard;

/// Cached deletes put back into their collections for one diff pass
///
/// Restoring walks the collection and every collection below it, reached
/// through collection navigation properties and through the change trackers
/// of reference navigation properties, appending each collection's cached
/// deletes to its live items. Dropping the guard removes exactly what was
/// appended, whether or not the diff succeeded. While alive, the guard
/// dereferences to the graph so readers can walk it.
#[derive(Debug)]
pub struct RestoredDeletes<'g> {
    graph: &'g mut EntityGraph,
    restored: Vec<(CollectionKey, Vec<EntityKey>)>,
}

impl<'g> RestoredDeletes<'g> {
    /// Restore cached deletes below `root`
    ///
    /// # Errors
    ///
    /// Returns lookup errors for dangling keys; anything restored before the
    /// failure has been removed again by the time the error is returned.
    pub fn restore(graph: &'g mut EntityGraph, root: CollectionKey) -> Result<Self> {
        let mut restored = Self {
            graph,
            restored: Vec::new(),
        };
        restored.restore_collection(root, &mut VisitationGuard::new())?;
        Ok(restored)
    }

    fn restore_collection(&mut self, collection: CollectionKey, guard: &mut VisitationGuard) -> Result<()> {
        if !guard.try_visit(collection) {
            return Ok(());
        }

        let deletes = self.graph.collection(collection)?.cached_deletes().to_vec();
        if !deletes.is_empty() {
            let coll = self.graph.collection_mut(collection)?;
            for entity in &deletes {
                coll.push_item(*entity);
            }
            self.restored.push((collection, deletes));
        }

        let items = self.graph.collection(collection)?.items().to_vec();
        for item in items {
            if !guard.try_visit(item) {
                continue;
            }
            let navs = self.graph.navigation_properties(item)?;
            let below = navs
                .references()
                .into_iter()
                .filter_map(|rp| rp.tracker)
                .chain(navs.collections().into_iter().filter_map(|cp| cp.collection))
                .collect::<Vec<_>>();
            for child in below {
                self.restore_collection(child, guard)?;
            }
        }
        Ok(())
    }

    /// Number of entities currently restored
    pub fn restored_count(&self) -> usize {
        self.restored.iter().map(|(_, keys)| keys.len()).sum()
    }
}

impl Deref for RestoredDeletes<'_> {
    type Target = EntityGraph;

    fn deref(&self) -> &EntityGraph {
        &*self.graph
    }
}

impl Drop for RestoredDeletes<'_> {
    fn drop(&mut self) {
        for (collection, keys) in self.restored.drain(..).rev() {
            if let Ok(coll) = self.graph.collection_mut(collection) {
                for key in keys.iter().rev() {
                    coll.remove_last(*key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::collection_ops;
    use crate::test_support::Node;

    #[test]
    fn test_restore_and_drop_are_paired() {
        let mut graph = EntityGraph::new();
        let parent = graph.attach(Node::named("parent")).unwrap();
        let child = graph.attach(Node::named("child")).unwrap();
        let children = graph.collection_of(parent, "Children").unwrap().unwrap();
        collection_ops::add(&mut graph, children, child).unwrap();
        let root = collection_ops::from_entities(&mut graph, [parent], false).unwrap();
        collection_ops::remove(&mut graph, children, child).unwrap();

        {
            let restored = RestoredDeletes::restore(&mut graph, root).unwrap();
            assert_eq!(restored.restored_count(), 1);
            assert_eq!(restored.collection(children).unwrap().items(), &[child]);
        }

        assert!(graph.collection(children).unwrap().is_empty());
        assert_eq!(graph.collection(children).unwrap().cached_deletes(), &[child]);
    }
}
