//! Canonical schema constants for structured logging and events
//!
//! These constants keep field names consistent across the tracking engine,
//! the change collector, and the persistence mapper.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Graph node identifiers
pub const FIELD_ENTITY_KEY: &str = "entity_key";
pub const FIELD_COLLECTION_KEY: &str = "collection_key";
pub const FIELD_ENTITY_TYPE: &str = "entity_type";
pub const FIELD_PROPERTY: &str = "property";

// Tracking states
pub const FIELD_STATE: &str = "state";
pub const FIELD_ENTITY_STATE: &str = "entity_state";
pub const FIELD_RELATIONSHIP: &str = "relationship";

// Collection sizes
pub const FIELD_ITEM_COUNT: &str = "item_count";
pub const FIELD_CHANGED_COUNT: &str = "changed_count";
pub const FIELD_DELETED_COUNT: &str = "deleted_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";
pub const FIELD_ERR_ENTITY_KEY: &str = "err_entity_key";
pub const FIELD_ERR_PROPERTY: &str = "err_property";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_accessibility() {
        assert!(!FIELD_COMPONENT.is_empty());
        assert!(!FIELD_OP.is_empty());
        assert!(!FIELD_ENTITY_KEY.is_empty());
        assert!(!EVENT_START.is_empty());
        assert!(!EVENT_END.is_empty());
        assert!(!EVENT_END_ERROR.is_empty());
    }

    #[test]
    fn test_event_names_are_distinct() {
        assert_ne!(EVENT_START, EVENT_END);
        assert_ne!(EVENT_START, EVENT_END_ERROR);
        assert_ne!(EVENT_END, EVENT_END_ERROR);
    }

    #[test]
    fn test_key_fields_are_distinct() {
        assert_ne!(FIELD_ENTITY_KEY, FIELD_COLLECTION_KEY);
        assert_ne!(FIELD_STATE, FIELD_ENTITY_STATE);
    }
}
