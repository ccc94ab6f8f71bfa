use std::collections::HashSet;

use trackable_core_types::ObjectId;

/// Cycle breaker for one recursive graph walk
///
/// Records graph objects (entities and collections) by identity. The first
/// `try_visit` of an object succeeds; every later one fails, which truncates
/// the walk instead of recursing forever. Cloning a guard branches it: the
/// copy starts with everything visited so far and evolves independently.
#[derive(Debug, Clone, Default)]
pub struct VisitationGuard {
    visited: HashSet<ObjectId>,
}

impl VisitationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard that treats the given objects as already visited
    pub fn seeded<I, O>(objects: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<ObjectId>,
    {
        Self {
            visited: objects.into_iter().map(Into::into).collect(),
        }
    }

    /// Record the object; false if it was already visited
    pub fn try_visit(&mut self, object: impl Into<ObjectId>) -> bool {
        self.visited.insert(object.into())
    }

    pub fn is_visited(&self, object: impl Into<ObjectId>) -> bool {
        self.visited.contains(&object.into())
    }

    /// Independent copy for a sibling subtree
    pub fn branch(&self) -> Self {
        self.clone()
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}
