//! Order Round Trip Demo
//!
//! Edits a tracked customer graph, extracts the changes, persists them into a
//! `MemoryStore` and accepts them on the live graph.
#![allow(clippy::unwrap_used, clippy::expect_used)]
//!
//! Key concepts illustrated:
//! 1. Tracking collections recording Added/Modified/Deleted
//! 2. Changes-only copies and their summaries
//! 3. Relationship-aware persistence mapping
//! 4. Partial updates of Modified rows

use std::collections::BTreeMap;

use serde_json::{json, Value};
use trackable_core::diff::render_change_summary;
use trackable_core::model::{CollectionSlot, EntityTracking, ReferenceSlot, Trackable};
use trackable_core::{collection_ops, EntityDescriptorBuilder, EntityGraph};
use trackable_store::{
    accept_changes, apply_changes_many, MemoryStore, NavigationMetadata, RelationshipType,
};

#[derive(Debug, Clone, Default)]
struct Customer {
    tracking: EntityTracking,
    id: String,
    name: String,
    orders: CollectionSlot,
}

impl Trackable for Customer {
    fn tracking(&self) -> &EntityTracking {
        &self.tracking
    }

    fn tracking_mut(&mut self) -> &mut EntityTracking {
        &mut self.tracking
    }

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder
            .property("Id")
            .property("Name")
            .collection::<Order>("Orders", |c| &c.orders, |c| &mut c.orders);
    }

    fn primary_key(&self) -> Option<String> {
        Some(self.id.clone())
    }

    fn property_values(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("Id".to_string(), json!(self.id)),
            ("Name".to_string(), json!(self.name)),
        ])
    }
}

#[derive(Debug, Clone, Default)]
struct Order {
    tracking: EntityTracking,
    id: i32,
    total: f64,
    note: String,
    customer: ReferenceSlot,
}

impl Order {
    fn new(id: i32, total: f64) -> Self {
        Self {
            id,
            total,
            ..Self::default()
        }
    }

    fn set_total(&mut self, total: f64) {
        self.total = total;
        self.tracking.notify("Total");
    }
}

impl Trackable for Order {
    fn tracking(&self) -> &EntityTracking {
        &self.tracking
    }

    fn tracking_mut(&mut self) -> &mut EntityTracking {
        &mut self.tracking
    }

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder
            .property("Id")
            .property("Total")
            .property("Note")
            .reference::<Customer>("Customer", |o| &o.customer, |o| &mut o.customer);
    }

    fn primary_key(&self) -> Option<String> {
        Some(self.id.to_string())
    }

    fn property_values(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("Id".to_string(), json!(self.id)),
            ("Total".to_string(), json!(self.total)),
            ("Note".to_string(), json!(self.note)),
        ])
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Order Round Trip Demo ===\n");

    // ===== Part 1: Stored rows and the live graph =====
    println!("## Part 1: Loading\n");

    let mut store = MemoryStore::new();
    store.configure_navigation(
        "Customer",
        "Orders",
        NavigationMetadata::for_relationship(RelationshipType::ManyToOne),
    );
    let customer = Customer {
        id: "ALFKI".to_string(),
        name: "Alfreds".to_string(),
        ..Customer::default()
    };
    store.seed(customer.clone())?;
    store.seed(Order::new(1, 100.0))?;
    store.seed(Order::new(2, 50.0))?;

    let mut graph = EntityGraph::new();
    let customer = graph.attach(customer)?;
    let orders = graph
        .collection_of(customer, "Orders")?
        .ok_or("orders not loaded")?;
    let first = graph.attach(Order::new(1, 100.0))?;
    let second = graph.attach(Order::new(2, 50.0))?;
    collection_ops::add(&mut graph, orders, first)?;
    collection_ops::add(&mut graph, orders, second)?;
    let root = collection_ops::from_entities(&mut graph, [customer], false)?;
    println!("✓ Tracking customer with {} orders", store.count("Order"));

    // ===== Part 2: Editing =====
    println!("\n## Part 2: Editing\n");

    graph.modify::<Order, _, _>(first, |o| o.set_total(120.0))?;
    collection_ops::remove(&mut graph, orders, second)?;
    let third = graph.attach(Order::new(3, 75.0))?;
    collection_ops::add(&mut graph, orders, third)?;
    println!("✓ Order 1 edited, order 2 removed, order 3 added");

    // ===== Part 3: Changes-only copy =====
    println!("\n## Part 3: Changes\n");

    let changes = collection_ops::get_changes(&mut graph, root)?;
    println!("{}", render_change_summary(&changes.summary()?));
    let roots = changes.items().to_vec();
    let (mut copy, _) = changes.into_parts();

    // ===== Part 4: Persisting =====
    println!("## Part 4: Persisting\n");

    let report = {
        let mut session = store.session();
        apply_changes_many(&mut session, &mut copy, &roots)?;
        session.save_changes()?
    };
    println!(
        "✓ Saved: {} inserted, {} updated, {} deleted",
        report.inserted, report.updated, report.deleted
    );
    assert_eq!(store.count("Order"), 2);

    let accepted = accept_changes(&mut graph, &[customer])?;
    collection_ops::remove_cached_deletes(&mut graph, orders)?;
    println!("✓ Accepted {} entities", accepted);
    assert!(collection_ops::get_changes(&mut graph, root)?.is_empty());

    println!("\n=== Demo Complete ===");
    Ok(())
}
