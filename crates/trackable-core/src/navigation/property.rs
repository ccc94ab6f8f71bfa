use std::any::TypeId;

use trackable_core_types::{CollectionKey, EntityKey};

use crate::model::Trackable;

/// Current value of one navigation property of one entity
///
/// Produced by [`EntityGraph::navigation_properties`](crate::ops::EntityGraph::navigation_properties).
/// The safe-cast helpers return an `Option`, so the usual way to branch on
/// the variant is a loop that runs at most once:
///
/// ```ignore
/// for nav in graph.navigation_properties(order)? {
///     for rp in nav.as_reference_property() {
///         // 1-1 and M-1
///     }
///     for cp in nav.as_collection_property() {
///         // 1-M and M-M
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationProperty {
    Reference(ReferenceProperty),
    Collection(CollectionProperty),
}

/// Value of a reference navigation property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceProperty {
    pub name: &'static str,
    pub target_type: TypeId,
    pub target: Option<EntityKey>,
    /// One-element collection forwarding tracking onto the target
    pub tracker: Option<CollectionKey>,
}

/// Value of a collection navigation property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionProperty {
    pub name: &'static str,
    pub target_type: TypeId,
    pub many_to_many: bool,
    pub collection: Option<CollectionKey>,
}

impl NavigationProperty {
    pub fn name(&self) -> &'static str {
        match self {
            NavigationProperty::Reference(rp) => rp.name,
            NavigationProperty::Collection(cp) => cp.name,
        }
    }

    /// True when the property holds no value (unset reference or unloaded collection)
    pub fn value_is_null(&self) -> bool {
        match self {
            NavigationProperty::Reference(rp) => rp.target.is_none(),
            NavigationProperty::Collection(cp) => cp.collection.is_none(),
        }
    }

    pub fn as_reference_property(&self) -> Option<ReferenceProperty> {
        match self {
            NavigationProperty::Reference(rp) => Some(*rp),
            NavigationProperty::Collection(_) => None,
        }
    }

    /// Reference property whose declared target is `T`; never fails on mismatch
    pub fn as_reference_property_of<T: Trackable>(&self) -> Option<ReferenceProperty> {
        self.as_reference_property()
            .filter(|rp| rp.target_type == TypeId::of::<T>())
    }

    pub fn as_collection_property(&self) -> Option<CollectionProperty> {
        match self {
            NavigationProperty::Collection(cp) => Some(*cp),
            NavigationProperty::Reference(_) => None,
        }
    }

    /// Collection property whose element type is `T`; never fails on mismatch
    pub fn as_collection_property_of<T: Trackable>(&self) -> Option<CollectionProperty> {
        self.as_collection_property()
            .filter(|cp| cp.target_type == TypeId::of::<T>())
    }
}

/// Variant filters over a list of navigation properties
pub trait NavigationPropertiesExt {
    fn references(&self) -> Vec<ReferenceProperty>;
    fn collections(&self) -> Vec<CollectionProperty>;
}

impl NavigationPropertiesExt for [NavigationProperty] {
    fn references(&self) -> Vec<ReferenceProperty> {
        self.iter()
            .filter_map(NavigationProperty::as_reference_property)
            .collect()
    }

    fn collections(&self) -> Vec<CollectionProperty> {
        self.iter()
            .filter_map(NavigationProperty::as_collection_property)
            .collect()
    }
}
