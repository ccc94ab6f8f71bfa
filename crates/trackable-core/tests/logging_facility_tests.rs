#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use trackable_core::diff::{clone_collection, CloneOptions};
use trackable_core::errors::TrackingError;
use trackable_core::logging_facility::test_capture::init_test_capture;
use trackable_core::{collection_ops, log_op_end, log_op_error, log_op_start, EntityGraph, EntityKey};
use trackable_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_ERR_CODE};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    capture.assert_event_exists(op_name, EVENT_START);
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let end_events: Vec<_> = capture
        .events_for(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END))
        .collect();

    assert_eq!(end_events.len(), 1, "Should have exactly one end event");
    assert_eq!(end_events[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = TrackingError::EntityNotFound {
        key: EntityKey::new(),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let error_event = capture
        .events_for(op_name)
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have error event");

    assert_eq!(error_event.field(FIELD_ERR_CODE), Some("ERR_NOT_FOUND"));
    assert_eq!(error_event.field("err_kind"), Some("NotFound"));
}

#[test]
fn test_log_macros_with_multiple_fields() {
    let capture = init_test_capture();
    let op_name = "test_log_macros_fields_unique_4";

    log_op_start!(op_name, entity_type = "Order", item_count = 3);

    let start_event = capture
        .events_for(op_name)
        .into_iter()
        .next()
        .expect("Should have start event");

    assert_eq!(start_event.field("entity_type"), Some("Order"));
    assert_eq!(start_event.field("item_count"), Some("3"));
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();

    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}

#[test]
fn test_get_changes_logs_one_start_and_end() {
    let capture = init_test_capture();
    let mut graph = EntityGraph::new();
    let (order, details) = order_with_details(&mut graph, 1, &[10.0]);
    let root = tracked(&mut graph, &[order]);
    graph
        .modify::<OrderDetail, _, _>(details[0], |d| d.set_price(12.0))
        .unwrap();

    let changes = collection_ops::get_changes(&mut graph, root).unwrap();
    assert_eq!(changes.len(), 1);

    let key = root.to_string();
    let events: Vec<_> = capture
        .events_for("get_changes")
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_START) && e.field("collection_key") == Some(key.as_str()))
        .collect();
    assert_eq!(events.len(), 1);

    // Parallel tests share the buffer; at least our end event must be there
    let ends = capture.count_events(|e| {
        e.op.as_deref() == Some("get_changes")
            && e.event.as_deref() == Some(EVENT_END)
            && e.field("changed_count") == Some("1")
    });
    assert!(ends >= 1);
}

#[test]
fn test_failed_clone_logs_end_error() {
    let capture = init_test_capture();
    let graph = EntityGraph::new();
    let mut other = EntityGraph::new();
    let foreign = collection_ops::new_collection(&mut other, true);

    let err = clone_collection(&graph, foreign, CloneOptions::full()).unwrap_err();
    assert_eq!(err, TrackingError::CollectionNotFound { key: foreign });

    let errors = capture.count_events(|e| {
        e.op.as_deref() == Some("clone_collection")
            && e.event.as_deref() == Some(EVENT_END_ERROR)
            && e.field(FIELD_ERR_CODE) == Some("ERR_NOT_FOUND")
    });
    assert!(errors >= 1);
}
