pub mod entity;
pub mod slots;
pub mod state;
pub mod tracking;

pub use entity::{downcast_mut, downcast_ref, AsAny, CloneEntity, Trackable};
pub use slots::{CollectionSlot, ReferenceSlot};
pub use state::TrackingState;
pub use tracking::{
    EntityTracking, PropertyChangeNotifier, MODIFIED_PROPERTIES_PROPERTY, TRACKING_STATE_PROPERTY,
};
