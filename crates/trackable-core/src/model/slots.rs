use trackable_core_types::{CollectionKey, EntityKey};

/// Storage for a reference navigation property (1-1 or M-1)
///
/// Holds the referenced entity plus the one-element tracking collection
/// that forwards change tracking onto it. The graph maintains the tracker;
/// entity code only ever sets the initial target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSlot {
    target: Option<EntityKey>,
    tracker: Option<CollectionKey>,
}

impl ReferenceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot that already points at an entity of the same graph
    pub fn to(target: EntityKey) -> Self {
        Self {
            target: Some(target),
            tracker: None,
        }
    }

    pub fn target(&self) -> Option<EntityKey> {
        self.target
    }

    pub fn tracker(&self) -> Option<CollectionKey> {
        self.tracker
    }

    pub fn is_null(&self) -> bool {
        self.target.is_none()
    }

    pub(crate) fn bind(&mut self, target: Option<EntityKey>, tracker: Option<CollectionKey>) {
        self.target = target;
        self.tracker = tracker;
    }
}

/// Storage for a collection navigation property (1-M or M-M)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollectionSlot {
    /// Not yet materialized; attaching the entity creates an empty collection
    #[default]
    Pending,
    /// Deliberately left unloaded; the property value is null
    Unloaded,
    /// Backed by a tracking collection of the owning graph
    Bound(CollectionKey),
}

impl CollectionSlot {
    pub fn collection(&self) -> Option<CollectionKey> {
        match self {
            CollectionSlot::Bound(key) => Some(*key),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.collection().is_none()
    }
}
