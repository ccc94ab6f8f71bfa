use thiserror::Error;
use trackable_core_types::{CollectionKey, EntityKey};

/// Result type alias using TrackingError
pub type Result<T> = std::result::Result<T, TrackingError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of every error
/// raised by the tracking engine and the persistence mapper. Each kind maps
/// to a stable error code that callers can match on programmatically, for
/// example to translate a failure into a conflict or validation response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural/Validation
    NotFound,
    TypeMismatch,
    UnregisteredType,
    UnknownNavigation,
    IndexOutOfRange,

    // Notification
    NullPropertyName,

    // Persistence policy
    DeletedWithAddedChildren,
    MissingKey,
    NotTracked,

    // Integration/IO
    Serialization,
    Persistence,
}

impl ExErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::TypeMismatch => "ERR_TYPE_MISMATCH",
            ExErrorKind::UnregisteredType => "ERR_UNREGISTERED_TYPE",
            ExErrorKind::UnknownNavigation => "ERR_UNKNOWN_NAVIGATION",
            ExErrorKind::IndexOutOfRange => "ERR_INDEX_OUT_OF_RANGE",
            ExErrorKind::NullPropertyName => "ERR_NULL_PROPERTY_NAME",
            ExErrorKind::DeletedWithAddedChildren => "ERR_DELETED_WITH_ADDED_CHILDREN",
            ExErrorKind::MissingKey => "ERR_MISSING_KEY",
            ExErrorKind::NotTracked => "ERR_NOT_TRACKED",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
        }
    }
}

/// Canonical structured error
///
/// Carries the error kind plus optional context: the operation that failed,
/// the graph node and property involved, a human-readable message and a
/// wrapped source error.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_key: Option<String>,
    property: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_key: None,
            property: None,
            message: String::new(),
            source: None,
        }
    }

    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_entity_key(mut self, key: impl ToString) -> Self {
        self.entity_key = Some(key.to_string());
        self
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_key(&self) -> Option<&str> {
        self.entity_key.as_deref()
    }

    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.kind.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_key) = &self.entity_key {
            write!(f, " (entity: {})", entity_key)?;
        }
        if let Some(property) = &self.property {
            write!(f, " (property: {})", property)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Errors raised by the in-memory tracking engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    // ===== Structural Errors =====
    /// Entity key does not address a node in this graph
    #[error("Entity not found: {key}")]
    EntityNotFound { key: EntityKey },

    /// Collection key does not address a collection in this graph
    #[error("Collection not found: {key}")]
    CollectionNotFound { key: CollectionKey },

    /// Node exists but is not of the requested concrete type
    #[error("Entity {key} is a {actual}, not a {expected}")]
    TypeMismatch {
        key: EntityKey,
        expected: &'static str,
        actual: &'static str,
    },

    /// No navigation descriptor was registered for the type
    #[error("Entity type is not registered: {type_name}")]
    UnregisteredType { type_name: String },

    /// Type has no navigation property with that name
    #[error("Unknown navigation property {type_name}.{property}")]
    UnknownNavigation { type_name: String, property: String },

    /// Position outside the collection bounds
    #[error("Index {index} out of range for collection of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    // ===== Notification Errors =====
    /// A property-changed notification arrived without a property name
    #[error("Property-changed notification carried no property name (entity {key})")]
    NullPropertyName { key: EntityKey },

    // ===== Clone Errors =====
    /// The graph cannot be represented by the cloner
    #[error("Graph cannot be cloned: {reason}")]
    Serialization { reason: String },
}

impl From<TrackingError> for ExError {
    fn from(err: TrackingError) -> Self {
        match err {
            TrackingError::EntityNotFound { key } => ExError::new(ExErrorKind::NotFound)
                .with_entity_key(key)
                .with_message("Entity not found in graph"),

            TrackingError::CollectionNotFound { key } => ExError::new(ExErrorKind::NotFound)
                .with_message(format!("Collection {} not found in graph", key)),

            TrackingError::TypeMismatch {
                key,
                expected,
                actual,
            } => ExError::new(ExErrorKind::TypeMismatch)
                .with_entity_key(key)
                .with_message(format!("expected {}, found {}", expected, actual)),

            TrackingError::UnregisteredType { type_name } => {
                ExError::new(ExErrorKind::UnregisteredType)
                    .with_message(format!("type {} has no navigation descriptor", type_name))
            }

            TrackingError::UnknownNavigation {
                type_name,
                property,
            } => ExError::new(ExErrorKind::UnknownNavigation)
                .with_property(property)
                .with_message(format!("type {} has no such navigation", type_name)),

            TrackingError::IndexOutOfRange { index, len } => {
                ExError::new(ExErrorKind::IndexOutOfRange)
                    .with_message(format!("index {} out of range (len {})", index, len))
            }

            TrackingError::NullPropertyName { key } => {
                ExError::new(ExErrorKind::NullPropertyName)
                    .with_entity_key(key)
                    .with_op("on_property_changed")
                    .with_message("Property name must not be empty")
            }

            TrackingError::Serialization { reason } => {
                ExError::new(ExErrorKind::Serialization).with_message(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        let cases = [
            (ExErrorKind::NotFound, "ERR_NOT_FOUND"),
            (ExErrorKind::NullPropertyName, "ERR_NULL_PROPERTY_NAME"),
            (ExErrorKind::Serialization, "ERR_SERIALIZATION"),
            (
                ExErrorKind::DeletedWithAddedChildren,
                "ERR_DELETED_WITH_ADDED_CHILDREN",
            ),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_null_property_name_converts_with_context() {
        let key = EntityKey::new();
        let ex: ExError = TrackingError::NullPropertyName { key }.into();

        assert_eq!(ex.kind(), ExErrorKind::NullPropertyName);
        assert_eq!(ex.op(), Some("on_property_changed"));
        assert_eq!(ex.entity_key(), Some(key.to_string().as_str()));
    }

    #[test]
    fn test_display_includes_op_and_property() {
        let err = ExError::new(ExErrorKind::UnknownNavigation)
            .with_op("set_reference")
            .with_property("Customer")
            .with_message("no such navigation");

        let text = err.to_string();
        assert!(text.starts_with("[ERR_UNKNOWN_NAVIGATION]"));
        assert!(text.contains("in operation 'set_reference'"));
        assert!(text.contains("(property: Customer)"));
    }

    #[test]
    fn test_source_chain_is_exposed() {
        use std::error::Error as _;

        let inner = ExError::new(ExErrorKind::Serialization).with_message("broken");
        let outer = ExError::new(ExErrorKind::Persistence).with_source(inner);

        assert_eq!(
            outer.source_error().map(|e| e.kind()),
            Some(ExErrorKind::Serialization)
        );
        assert!(outer.source().is_some());
    }
}
