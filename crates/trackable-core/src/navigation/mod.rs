//! Navigation property reflection
//!
//! Entity types describe their navigation properties once through
//! [`Trackable::describe`](crate::model::Trackable::describe). The resulting
//! descriptors are cached per concrete type in a [`NavigationRegistry`] and
//! let the graph enumerate reference and collection properties of any
//! entity without knowing its type.

pub mod descriptor;
pub mod property;
pub mod registry;

pub use descriptor::{EntityDescriptor, EntityDescriptorBuilder, NavigationDescriptor, NavigationKind};
pub use property::{CollectionProperty, NavigationPropertiesExt, NavigationProperty, ReferenceProperty};
pub use registry::NavigationRegistry;
