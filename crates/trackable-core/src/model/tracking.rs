use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use trackable_core_types::{CollectionKey, EntityIdentifier};

use super::state::TrackingState;

/// Name under which a tracking-state change is reported
pub const TRACKING_STATE_PROPERTY: &str = "TrackingState";

/// Name under which a modified-properties change is reported
pub const MODIFIED_PROPERTIES_PROPERTY: &str = "ModifiedProperties";

/// Per-entity tracking header
///
/// Every trackable entity composes one of these. It carries the tracking
/// state, the modified property names and the identifier assigned when
/// tracking begins, plus the notifier that buffers property-changed
/// notifications until the owning graph dispatches them.
///
/// Modified properties are only retained while the state is `Modified`;
/// moving to any other state clears them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityTracking {
    tracking_state: TrackingState,
    modified_properties: Option<BTreeSet<String>>,
    entity_identifier: Option<EntityIdentifier>,
    #[serde(skip)]
    notifier: PropertyChangeNotifier,
}

impl EntityTracking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header for an entity that starts in the given state
    pub fn with_state(state: TrackingState) -> Self {
        Self {
            tracking_state: state,
            ..Self::default()
        }
    }

    pub fn state(&self) -> TrackingState {
        self.tracking_state
    }

    pub fn set_state(&mut self, state: TrackingState) {
        self.tracking_state = state;
        if state != TrackingState::Modified {
            self.modified_properties = None;
        }
    }

    pub fn modified_properties(&self) -> Option<&BTreeSet<String>> {
        self.modified_properties.as_ref()
    }

    /// Replace the modified property set; ignored unless the state is `Modified`
    pub fn set_modified_properties(&mut self, properties: Option<BTreeSet<String>>) {
        if properties.is_none() || self.tracking_state == TrackingState::Modified {
            self.modified_properties = properties;
        }
    }

    /// Record a modified property name; returns false if it was already listed
    pub fn add_modified_property(&mut self, name: &str) -> bool {
        if self.tracking_state != TrackingState::Modified {
            return false;
        }
        self.modified_properties
            .get_or_insert_with(BTreeSet::new)
            .insert(name.to_string())
    }

    pub fn entity_identifier(&self) -> Option<EntityIdentifier> {
        self.entity_identifier
    }

    /// Assign an identifier once; later calls return the existing one
    pub fn ensure_identifier(&mut self) -> EntityIdentifier {
        *self
            .entity_identifier
            .get_or_insert_with(EntityIdentifier::new)
    }

    /// Report a property change
    ///
    /// Setters call this after writing a field. The notification is buffered
    /// and delivered when the owning graph finishes the mutation.
    pub fn notify(&mut self, property: impl Into<String>) {
        self.notifier.pending.push(property.into());
    }

    pub fn notifier(&self) -> &PropertyChangeNotifier {
        &self.notifier
    }

    pub(crate) fn notifier_mut(&mut self) -> &mut PropertyChangeNotifier {
        &mut self.notifier
    }
}

/// Buffered property-changed notifications and the collections observing them
///
/// Cloning a notifier yields an empty one: a copied entity is not observed
/// by anything until it is added to a tracking collection.
#[derive(Debug, Default, PartialEq)]
pub struct PropertyChangeNotifier {
    pending: Vec<String>,
    observers: Vec<CollectionKey>,
}

impl Clone for PropertyChangeNotifier {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl PropertyChangeNotifier {
    pub fn observers(&self) -> &[CollectionKey] {
        &self.observers
    }

    pub fn is_observed_by(&self, collection: CollectionKey) -> bool {
        self.observers.contains(&collection)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn observe(&mut self, collection: CollectionKey) {
        if !self.observers.contains(&collection) {
            self.observers.push(collection);
        }
    }

    pub(crate) fn unobserve(&mut self, collection: CollectionKey) {
        self.observers.retain(|c| *c != collection);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }
}
