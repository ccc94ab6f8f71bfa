use std::any::Any;
use std::collections::BTreeMap;

use crate::navigation::EntityDescriptorBuilder;

use super::tracking::EntityTracking;

/// Capability contract of every node in an entity graph
///
/// Implementors compose an [`EntityTracking`] header and hold their
/// navigation properties in [`ReferenceSlot`](super::ReferenceSlot) and
/// [`CollectionSlot`](super::CollectionSlot) fields. `describe` registers
/// those fields once per concrete type; everything else (state propagation,
/// change collection, cloning) is driven generically from that description.
///
/// # Example
///
/// ```
/// use trackable_core::model::{EntityTracking, ReferenceSlot, Trackable};
/// use trackable_core::navigation::EntityDescriptorBuilder;
///
/// #[derive(Debug, Clone, Default)]
/// struct Category {
///     tracking: EntityTracking,
///     name: String,
///     parent: ReferenceSlot,
/// }
///
/// impl Trackable for Category {
///     fn tracking(&self) -> &EntityTracking {
///         &self.tracking
///     }
///
///     fn tracking_mut(&mut self) -> &mut EntityTracking {
///         &mut self.tracking
///     }
///
///     fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
///         builder
///             .property("Name")
///             .reference::<Category>("Parent", |c| &c.parent, |c| &mut c.parent);
///     }
/// }
/// ```
pub trait Trackable: AsAny + CloneEntity + std::fmt::Debug + Send + Sync {
    fn tracking(&self) -> &EntityTracking;

    fn tracking_mut(&mut self) -> &mut EntityTracking;

    /// Register scalar properties and navigation slots of this type
    fn describe(builder: &mut EntityDescriptorBuilder<Self>)
    where
        Self: Sized;

    /// Natural key as stored by a persistence engine; `None` while unset
    fn primary_key(&self) -> Option<String> {
        None
    }

    /// Scalar property values keyed by property name
    fn property_values(&self) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::new()
    }

    /// Short name of the concrete type
    fn type_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Upcast to `Any` for checked downcasts from `dyn Trackable`
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Object-safe clone for boxed entities
pub trait CloneEntity {
    fn clone_entity(&self) -> Box<dyn Trackable>;
}

impl<T: Trackable + Clone> CloneEntity for T {
    fn clone_entity(&self) -> Box<dyn Trackable> {
        Box::new(self.clone())
    }
}

/// Downcast a graph node to its concrete type
pub fn downcast_ref<T: Trackable>(entity: &dyn Trackable) -> Option<&T> {
    entity.as_any().downcast_ref::<T>()
}

/// Mutable counterpart of [`downcast_ref`]
pub fn downcast_mut<T: Trackable>(entity: &mut dyn Trackable) -> Option<&mut T> {
    entity.as_any_mut().downcast_mut::<T>()
}

pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}
