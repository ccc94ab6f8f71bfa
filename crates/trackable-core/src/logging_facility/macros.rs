//! Canonical logging macros
//!
//! Every macro stamps `component`, `op` and `event` so that log consumers can
//! pair start and end records of one operation.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use trackable_core::log_op_start;
/// log_op_start!("get_changes");
/// log_op_start!("get_changes", item_count = 3);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = trackable_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = trackable_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use trackable_core::log_op_end;
/// log_op_end!("get_changes", duration_ms = 4);
/// log_op_end!("get_changes", duration_ms = 4, changed_count = 2);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = trackable_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = trackable_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error
///
/// The error is converted into the canonical `ExError` so the record carries
/// a stable `err_code`, plus the graph node and property the error names
/// (`err_entity_key`, `err_property`) when it has them.
///
/// # Example
///
/// ```
/// # use trackable_core::{log_op_error, errors::TrackingError};
/// # use trackable_core_types::EntityKey;
/// let err = TrackingError::EntityNotFound { key: EntityKey::new() };
/// log_op_error!("get_changes", err, duration_ms = 1);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        use $crate::errors::ExError;
        let ex_err: ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = trackable_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            err_entity_key = ex_err.entity_key(),
            err_property = ex_err.property(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        use $crate::errors::ExError;
        let ex_err: ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = trackable_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            err_entity_key = ex_err.entity_key(),
            err_property = ex_err.property(),
            $($field)*
        );
    }};
}
