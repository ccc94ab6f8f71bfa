#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::HashSet;

use common::*;
use proptest::prelude::*;
use trackable_core::diff::{clone_collection, render_change_summary, CloneOptions};
use trackable_core::model::ReferenceSlot;
use trackable_core::{collection_ops, CollectionKey, EntityGraph, EntityKey, TrackingState};

#[test]
fn test_untouched_graph_has_no_changes() {
    let mut graph = EntityGraph::new();
    let (customer, _) = customer_with_order(&mut graph, "ALFKI", 1);
    let (order, _) = order_with_details(&mut graph, 2, &[10.0, 20.0]);
    let root = tracked(&mut graph, &[customer, order]);

    let changes = collection_ops::get_changes(&mut graph, root).unwrap();

    assert!(changes.is_empty());
    assert!(changes.summary().unwrap().is_empty());
}

#[test]
fn test_three_level_edit_is_diffed() {
    let mut graph = EntityGraph::new();
    let (order, details) = order_with_details(&mut graph, 1, &[10.0, 20.0]);
    let (od1, od2) = (details[0], details[1]);
    let root = tracked(&mut graph, &[order]);
    let details_coll = graph.collection_of(order, "OrderDetails").unwrap().unwrap();

    graph
        .modify::<Order, _, _>(order, |o| o.set_order_date(date(2024, 2, 1)))
        .unwrap();
    graph
        .modify::<OrderDetail, _, _>(od1, |d| d.set_price(11.0))
        .unwrap();
    collection_ops::remove(&mut graph, details_coll, od2).unwrap();
    let mut od3 = OrderDetail::new(13, 30.0);
    od3.order_id = 1;
    let od3 = graph.attach(od3).unwrap();
    collection_ops::add(&mut graph, details_coll, od3).unwrap();

    let changes = collection_ops::get_changes(&mut graph, root).unwrap();

    assert_eq!(changes.len(), 1);
    let copy = changes.graph();
    let order_copy = changes.items()[0];
    assert_ne!(order_copy, order);
    assert_eq!(copy.state(order_copy).unwrap(), TrackingState::Modified);
    assert_eq!(modified_properties(copy, order_copy), vec!["OrderDate"]);

    let copied_details = copy
        .collection(copy.collection_of(order_copy, "OrderDetails").unwrap().unwrap())
        .unwrap()
        .items()
        .to_vec();
    assert_eq!(copied_details.len(), 3);

    let od1_copy = find_by_key::<OrderDetail>(copy, &copied_details, "11").unwrap();
    let od2_copy = find_by_key::<OrderDetail>(copy, &copied_details, "12").unwrap();
    let od3_copy = find_by_key::<OrderDetail>(copy, &copied_details, "13").unwrap();
    assert_eq!(copy.state(od1_copy).unwrap(), TrackingState::Modified);
    assert_eq!(modified_properties(copy, od1_copy), vec!["Price"]);
    assert_eq!(copy.get::<OrderDetail>(od1_copy).unwrap().price, 11.0);
    assert_eq!(copy.state(od2_copy).unwrap(), TrackingState::Deleted);
    assert_eq!(copy.state(od3_copy).unwrap(), TrackingState::Added);

    // Back-references resolve to the copied order
    assert_eq!(copy.reference_of(od1_copy, "Order").unwrap(), Some(order_copy));

    // Live graph is left as it was
    assert_eq!(graph.collection(details_coll).unwrap().items(), &[od1, od3]);
    assert_eq!(graph.collection(details_coll).unwrap().cached_deletes(), &[od2]);
}

#[test]
fn test_unchanged_siblings_are_omitted() {
    let mut graph = EntityGraph::new();
    let (order, details) = order_with_details(&mut graph, 1, &[10.0, 20.0, 30.0]);
    let root = tracked(&mut graph, &[order]);

    graph
        .modify::<OrderDetail, _, _>(details[1], |d| d.set_quantity(4))
        .unwrap();

    let changes = collection_ops::get_changes(&mut graph, root).unwrap();
    let copy = changes.graph();
    let order_copy = changes.items()[0];
    assert_eq!(copy.state(order_copy).unwrap(), TrackingState::Unchanged);
    let copied = copy
        .collection(copy.collection_of(order_copy, "OrderDetails").unwrap().unwrap())
        .unwrap()
        .items()
        .to_vec();
    assert_eq!(copied.len(), 1);
    assert_eq!(copy.get::<OrderDetail>(copied[0]).unwrap().quantity, 4);
}

#[test]
fn test_unchanged_reference_is_omitted() {
    let mut graph = EntityGraph::new();
    let (customer, order) = customer_with_order(&mut graph, "ALFKI", 1);
    let root = tracked(&mut graph, &[order]);
    graph.modify::<Order, _, _>(order, |o| o.set_freight(7.0)).unwrap();

    let changes = collection_ops::get_changes(&mut graph, root).unwrap();

    let copy = changes.graph();
    let order_copy = changes.items()[0];
    assert_eq!(copy.reference_of(order_copy, "Customer").unwrap(), None);
    assert_eq!(copy.len(), 1);
    assert_eq!(graph.reference_of(order, "Customer").unwrap(), Some(customer));
}

#[test]
fn test_modified_reference_target_is_carried() {
    let mut graph = EntityGraph::new();
    let (customer, order) = customer_with_order(&mut graph, "ALFKI", 1);
    let root = tracked(&mut graph, &[order]);
    graph
        .modify::<Customer, _, _>(customer, |c| c.set_company_name("Alfreds"))
        .unwrap();

    let changes = collection_ops::get_changes(&mut graph, root).unwrap();

    let copy = changes.graph();
    let order_copy = changes.items()[0];
    assert_eq!(copy.state(order_copy).unwrap(), TrackingState::Unchanged);
    let customer_copy = copy.reference_of(order_copy, "Customer").unwrap().unwrap();
    assert_eq!(copy.state(customer_copy).unwrap(), TrackingState::Modified);
    assert_eq!(
        copy.get::<Customer>(customer_copy).unwrap().company_name,
        "Alfreds"
    );
}

#[test]
fn test_shared_product_is_copied_once() {
    let mut graph = EntityGraph::new();
    let product = graph.attach(Product::new(7, "Chai", 18.0)).unwrap();
    let (order, details) = order_with_details(&mut graph, 1, &[10.0, 20.0]);
    for detail in &details {
        graph.set_reference(*detail, "Product", Some(product)).unwrap();
    }
    let root = tracked(&mut graph, &[order]);
    graph
        .modify::<Product, _, _>(product, |p| p.set_unit_price(19.0))
        .unwrap();
    for detail in &details {
        graph
            .modify::<OrderDetail, _, _>(*detail, |d| d.set_quantity(2))
            .unwrap();
    }

    let changes = collection_ops::get_changes(&mut graph, root).unwrap();

    let copy = changes.graph();
    let order_copy = changes.items()[0];
    let copied = copy
        .collection(copy.collection_of(order_copy, "OrderDetails").unwrap().unwrap())
        .unwrap()
        .items()
        .to_vec();
    assert_eq!(copied.len(), 2);
    let first = copy.reference_of(copied[0], "Product").unwrap();
    let second = copy.reference_of(copied[1], "Product").unwrap();
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn test_full_clone_preserves_diamond() {
    let mut graph = EntityGraph::new();
    let customer = graph.attach(Customer::new("ALFKI", "Alfreds")).unwrap();
    let mut left = Order::new(1, date(2024, 1, 1));
    left.customer = ReferenceSlot::to(customer);
    let mut right = Order::new(2, date(2024, 1, 2));
    right.customer = ReferenceSlot::to(customer);
    let left = graph.attach(left).unwrap();
    let right = graph.attach(right).unwrap();
    let root = collection_ops::from_entities(&mut graph, [left, right], true).unwrap();

    let cloned = clone_collection(&graph, root, CloneOptions::full()).unwrap();

    let copy = cloned.graph();
    let a = copy.reference_of(cloned.items()[0], "Customer").unwrap();
    let b = copy.reference_of(cloned.items()[1], "Customer").unwrap();
    assert!(a.is_some());
    assert_eq!(a, b);
    assert_ne!(a, Some(customer));
}

#[test]
fn test_cyclic_graph_terminates() {
    let mut graph = EntityGraph::new();
    let a = graph.attach(Category::new("a")).unwrap();
    let b = graph.attach(Category::new("b")).unwrap();
    graph.set_reference(a, "Parent", Some(b)).unwrap();
    graph.set_reference(b, "Parent", Some(a)).unwrap();
    let root = tracked(&mut graph, &[a]);

    graph
        .modify::<Category, _, _>(b, |c| c.set_name("b2"))
        .unwrap();
    let changes = collection_ops::get_changes(&mut graph, root).unwrap();

    let copy = changes.graph();
    let a_copy = changes.items()[0];
    let b_copy = copy.reference_of(a_copy, "Parent").unwrap().unwrap();
    assert_eq!(copy.state(b_copy).unwrap(), TrackingState::Modified);
    // Back edge leads to an unchanged, already visited entity
    assert_eq!(copy.reference_of(b_copy, "Parent").unwrap(), None);

    let full = clone_collection(&graph, root, CloneOptions::full()).unwrap();
    let copy = full.graph();
    let a_copy = full.items()[0];
    let b_copy = copy.reference_of(a_copy, "Parent").unwrap().unwrap();
    assert_eq!(copy.reference_of(b_copy, "Parent").unwrap(), Some(a_copy));
}

#[test]
fn test_shallow_changes_union_cached_deletes() {
    let mut graph = EntityGraph::new();
    let (o1, _) = order_with_details(&mut graph, 1, &[]);
    let (o2, _) = order_with_details(&mut graph, 2, &[]);
    let (o3, _) = order_with_details(&mut graph, 3, &[]);
    let root = tracked(&mut graph, &[o1, o2, o3]);
    graph.modify::<Order, _, _>(o2, |o| o.set_freight(1.0)).unwrap();
    collection_ops::remove(&mut graph, root, o3).unwrap();

    let shallow = collection_ops::get_changes_shallow(&mut graph, root).unwrap();

    assert_eq!(graph.collection(shallow).unwrap().items(), &[o2, o3]);
    assert!(!graph.collection(shallow).unwrap().tracking());
}

#[test]
fn test_summary_renders_changes() {
    let mut graph = EntityGraph::new();
    let (order, details) = order_with_details(&mut graph, 1, &[10.0]);
    let root = tracked(&mut graph, &[order]);
    graph
        .modify::<OrderDetail, _, _>(details[0], |d| d.set_price(11.0))
        .unwrap();

    let changes = collection_ops::get_changes(&mut graph, root).unwrap();
    let summary = changes.summary().unwrap();
    let text = render_change_summary(&summary);

    assert_eq!(summary.modified, 1);
    assert_eq!(summary.entities[0].entity_type, "OrderDetail");
    assert_eq!(summary.entities[0].via.as_deref(), Some("Order.OrderDetails"));
    assert!(text.contains("- OrderDetail `11` (Price) via `Order.OrderDetails`"));
}

#[test]
fn test_cached_deletes_behind_reference_are_diffed() {
    let mut graph = EntityGraph::new();
    let (customer, order) = customer_with_order(&mut graph, "ALFKI", 1);
    let mut sibling = Order::new(2, date(2024, 1, 2));
    sibling.customer_id = Some("ALFKI".to_string());
    sibling.customer = ReferenceSlot::to(customer);
    let sibling = graph.attach(sibling).unwrap();
    let orders = graph.collection_of(customer, "Orders").unwrap().unwrap();
    collection_ops::add(&mut graph, orders, sibling).unwrap();
    let root = tracked(&mut graph, &[order]);
    collection_ops::remove(&mut graph, orders, sibling).unwrap();

    let changes = collection_ops::get_changes(&mut graph, root).unwrap();

    // Customer is only reachable through the order's reference
    assert_eq!(changes.len(), 1);
    let copy = changes.graph();
    let customer_copy = copy
        .reference_of(changes.items()[0], "Customer")
        .unwrap()
        .unwrap();
    let copied_orders = copy
        .collection(copy.collection_of(customer_copy, "Orders").unwrap().unwrap())
        .unwrap()
        .items()
        .to_vec();
    let sibling_copy = find_by_key::<Order>(copy, &copied_orders, "2").unwrap();
    assert_eq!(copy.state(sibling_copy).unwrap(), TrackingState::Deleted);

    assert_eq!(graph.collection(orders).unwrap().items(), &[order]);
    assert_eq!(graph.collection(orders).unwrap().cached_deletes(), &[sibling]);
}

#[test]
fn test_failed_diff_puts_cached_deletes_back() {
    let mut graph = EntityGraph::new();
    let (order, details) = order_with_details(&mut graph, 1, &[10.0, 20.0]);
    let root = tracked(&mut graph, &[order]);
    let details_coll = graph.collection_of(order, "OrderDetails").unwrap().unwrap();
    collection_ops::remove(&mut graph, details_coll, details[1]).unwrap();
    // Slot assigned directly, so the target was never checked
    graph
        .modify::<OrderDetail, _, _>(details[0], |d| {
            d.product = ReferenceSlot::to(EntityKey::new());
        })
        .unwrap();

    let result = collection_ops::get_changes(&mut graph, root);

    assert!(result.is_err());
    let coll = graph.collection(details_coll).unwrap();
    assert_eq!(coll.items(), &[details[0]]);
    assert_eq!(coll.cached_deletes(), &[details[1]]);
    assert_eq!(graph.state(details[1]).unwrap(), TrackingState::Deleted);
}

#[test]
fn test_collection_without_changes_stays_unloaded() {
    let mut graph = EntityGraph::new();
    let (order, _) = order_with_details(&mut graph, 1, &[10.0, 20.0]);
    let root = tracked(&mut graph, &[order]);
    graph.modify::<Order, _, _>(order, |o| o.set_freight(7.0)).unwrap();

    let changes = collection_ops::get_changes(&mut graph, root).unwrap();

    let order_copy = changes.items()[0];
    assert_eq!(
        changes.graph().collection_of(order_copy, "OrderDetails").unwrap(),
        None
    );

    let full = clone_collection(&graph, root, CloneOptions::full()).unwrap();
    let copied_details = full
        .graph()
        .collection_of(full.items()[0], "OrderDetails")
        .unwrap()
        .unwrap();
    assert_eq!(full.graph().collection(copied_details).unwrap().len(), 2);
}

fn category_graph(
    parents: &[usize],
    edits: &[usize],
) -> (EntityGraph, CollectionKey, Vec<EntityKey>) {
    let mut graph = EntityGraph::new();
    let keys: Vec<EntityKey> = (0..parents.len())
        .map(|i| graph.attach(Category::new(&format!("c{i}"))).unwrap())
        .collect();
    for (i, parent) in parents.iter().enumerate() {
        graph
            .set_reference(keys[i], "Parent", Some(keys[parent % keys.len()]))
            .unwrap();
    }
    let root = tracked(&mut graph, &keys);
    for edit in edits {
        let key = keys[edit % keys.len()];
        graph
            .modify::<Category, _, _>(key, |c| c.set_name("edited"))
            .unwrap();
    }
    (graph, root, keys)
}

proptest! {
    #[test]
    fn test_random_reference_cycles_terminate(
        parents in proptest::collection::vec(0usize..8, 1..8),
        edits in proptest::collection::vec(0usize..8, 0..4),
    ) {
        let (mut graph, root, keys) = category_graph(&parents, &edits);

        let changes = collection_ops::get_changes(&mut graph, root).unwrap();

        let edited: HashSet<EntityKey> = edits.iter().map(|e| keys[e % keys.len()]).collect();
        prop_assert!(changes.len() <= keys.len());
        prop_assert_eq!(edited.is_empty(), changes.is_empty());
        let full = clone_collection(&graph, root, CloneOptions::full()).unwrap();
        prop_assert_eq!(full.graph().len(), keys.len());
    }
}
