//! Shared fixture model for integration tests
//!
//! A small Northwind-like model (customers, orders, details, products,
//! employees and territories) plus a parent/child family with back
//! references. Setters raise property-changed notifications the way real
//! entities do.

#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{json, Value};
use trackable_core::model::{CollectionSlot, EntityTracking, ReferenceSlot, Trackable};
use trackable_core::navigation::EntityDescriptorBuilder;
use trackable_core::{collection_ops, CollectionKey, EntityGraph, EntityKey};

macro_rules! tracking_header {
    () => {
        fn tracking(&self) -> &EntityTracking {
            &self.tracking
        }

        fn tracking_mut(&mut self) -> &mut EntityTracking {
            &mut self.tracking
        }
    };
}

#[derive(Debug, Clone, Default)]
pub struct Customer {
    pub tracking: EntityTracking,
    pub customer_id: String,
    pub company_name: String,
    pub orders: CollectionSlot,
}

impl Customer {
    pub fn new(customer_id: &str, company_name: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            company_name: company_name.to_string(),
            ..Self::default()
        }
    }

    pub fn set_company_name(&mut self, value: &str) {
        self.company_name = value.to_string();
        self.tracking.notify("CompanyName");
    }
}

impl Trackable for Customer {
    tracking_header!();

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder
            .property("CustomerId")
            .property("CompanyName")
            .collection::<Order>("Orders", |c| &c.orders, |c| &mut c.orders);
    }

    fn primary_key(&self) -> Option<String> {
        (!self.customer_id.is_empty()).then(|| self.customer_id.clone())
    }

    fn property_values(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("CustomerId".to_string(), json!(self.customer_id)),
            ("CompanyName".to_string(), json!(self.company_name)),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Order {
    pub tracking: EntityTracking,
    pub order_id: i32,
    pub order_date: Option<NaiveDate>,
    pub freight: f64,
    pub audit_timestamp: Option<String>,
    pub customer_id: Option<String>,
    pub customer: ReferenceSlot,
    pub details: CollectionSlot,
}

impl Order {
    pub fn new(order_id: i32, order_date: NaiveDate) -> Self {
        Self {
            order_id,
            order_date: Some(order_date),
            ..Self::default()
        }
    }

    pub fn set_order_date(&mut self, value: NaiveDate) {
        self.order_date = Some(value);
        self.tracking.notify("OrderDate");
    }

    pub fn set_freight(&mut self, value: f64) {
        self.freight = value;
        self.tracking.notify("Freight");
    }

    pub fn set_audit_timestamp(&mut self, value: &str) {
        self.audit_timestamp = Some(value.to_string());
        self.tracking.notify("AuditTimestamp");
    }
}

impl Trackable for Order {
    tracking_header!();

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder
            .property("OrderId")
            .property("OrderDate")
            .property("Freight")
            .property("AuditTimestamp")
            .property("CustomerId")
            .reference::<Customer>("Customer", |o| &o.customer, |o| &mut o.customer)
            .collection::<OrderDetail>("OrderDetails", |o| &o.details, |o| &mut o.details);
    }

    fn primary_key(&self) -> Option<String> {
        (self.order_id != 0).then(|| self.order_id.to_string())
    }

    fn property_values(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("OrderId".to_string(), json!(self.order_id)),
            (
                "OrderDate".to_string(),
                json!(self.order_date.map(|d| d.to_string())),
            ),
            ("Freight".to_string(), json!(self.freight)),
            ("AuditTimestamp".to_string(), json!(self.audit_timestamp)),
            ("CustomerId".to_string(), json!(self.customer_id)),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderDetail {
    pub tracking: EntityTracking,
    pub order_detail_id: i32,
    pub order_id: i32,
    pub product_id: Option<i32>,
    pub price: f64,
    pub quantity: i32,
    pub order: ReferenceSlot,
    pub product: ReferenceSlot,
}

impl OrderDetail {
    pub fn new(order_detail_id: i32, price: f64) -> Self {
        Self {
            order_detail_id,
            price,
            quantity: 1,
            ..Self::default()
        }
    }

    pub fn set_price(&mut self, value: f64) {
        self.price = value;
        self.tracking.notify("Price");
    }

    pub fn set_quantity(&mut self, value: i32) {
        self.quantity = value;
        self.tracking.notify("Quantity");
    }
}

impl Trackable for OrderDetail {
    tracking_header!();

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder
            .property("OrderDetailId")
            .property("OrderId")
            .property("ProductId")
            .property("Price")
            .property("Quantity")
            .reference::<Order>("Order", |d| &d.order, |d| &mut d.order)
            .reference::<Product>("Product", |d| &d.product, |d| &mut d.product);
    }

    fn primary_key(&self) -> Option<String> {
        (self.order_detail_id != 0).then(|| self.order_detail_id.to_string())
    }

    fn property_values(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("OrderDetailId".to_string(), json!(self.order_detail_id)),
            ("OrderId".to_string(), json!(self.order_id)),
            ("ProductId".to_string(), json!(self.product_id)),
            ("Price".to_string(), json!(self.price)),
            ("Quantity".to_string(), json!(self.quantity)),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Product {
    pub tracking: EntityTracking,
    pub product_id: i32,
    pub product_name: String,
    pub unit_price: f64,
}

impl Product {
    pub fn new(product_id: i32, product_name: &str, unit_price: f64) -> Self {
        Self {
            product_id,
            product_name: product_name.to_string(),
            unit_price,
            ..Self::default()
        }
    }

    pub fn set_unit_price(&mut self, value: f64) {
        self.unit_price = value;
        self.tracking.notify("UnitPrice");
    }
}

impl Trackable for Product {
    tracking_header!();

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder
            .property("ProductId")
            .property("ProductName")
            .property("UnitPrice");
    }

    fn primary_key(&self) -> Option<String> {
        (self.product_id != 0).then(|| self.product_id.to_string())
    }

    fn property_values(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("ProductId".to_string(), json!(self.product_id)),
            ("ProductName".to_string(), json!(self.product_name)),
            ("UnitPrice".to_string(), json!(self.unit_price)),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Employee {
    pub tracking: EntityTracking,
    pub employee_id: i32,
    pub last_name: String,
    pub territories: CollectionSlot,
}

impl Employee {
    pub fn new(employee_id: i32, last_name: &str) -> Self {
        Self {
            employee_id,
            last_name: last_name.to_string(),
            ..Self::default()
        }
    }

    pub fn set_last_name(&mut self, value: &str) {
        self.last_name = value.to_string();
        self.tracking.notify("LastName");
    }
}

impl Trackable for Employee {
    tracking_header!();

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder
            .property("EmployeeId")
            .property("LastName")
            .many_to_many::<Territory>("Territories", |e| &e.territories, |e| &mut e.territories);
    }

    fn primary_key(&self) -> Option<String> {
        (self.employee_id != 0).then(|| self.employee_id.to_string())
    }

    fn property_values(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("EmployeeId".to_string(), json!(self.employee_id)),
            ("LastName".to_string(), json!(self.last_name)),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Territory {
    pub tracking: EntityTracking,
    pub territory_id: String,
    pub description: String,
}

impl Territory {
    pub fn new(territory_id: &str, description: &str) -> Self {
        Self {
            territory_id: territory_id.to_string(),
            description: description.to_string(),
            ..Self::default()
        }
    }

    pub fn set_description(&mut self, value: &str) {
        self.description = value.to_string();
        self.tracking.notify("Description");
    }
}

impl Trackable for Territory {
    tracking_header!();

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder.property("TerritoryId").property("Description");
    }

    fn primary_key(&self) -> Option<String> {
        (!self.territory_id.is_empty()).then(|| self.territory_id.clone())
    }

    fn property_values(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("TerritoryId".to_string(), json!(self.territory_id)),
            ("Description".to_string(), json!(self.description)),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Parent {
    pub tracking: EntityTracking,
    pub name: String,
    pub children: CollectionSlot,
}

impl Parent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Trackable for Parent {
    tracking_header!();

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder
            .property("Name")
            .collection::<Child>("Children", |p| &p.children, |p| &mut p.children);
    }

    fn primary_key(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn property_values(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([("Name".to_string(), json!(self.name))])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Child {
    pub tracking: EntityTracking,
    pub name: String,
    pub parent: ReferenceSlot,
}

impl Child {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn set_name(&mut self, value: &str) {
        self.name = value.to_string();
        self.tracking.notify("Name");
    }
}

impl Trackable for Child {
    tracking_header!();

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder
            .property("Name")
            .reference::<Parent>("Parent", |c| &c.parent, |c| &mut c.parent);
    }

    fn primary_key(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn property_values(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([("Name".to_string(), json!(self.name))])
    }
}

/// Self-referencing hierarchy used for cycle tests
#[derive(Debug, Clone, Default)]
pub struct Category {
    pub tracking: EntityTracking,
    pub name: String,
    pub parent: ReferenceSlot,
    pub subcategories: CollectionSlot,
}

impl Category {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn set_name(&mut self, value: &str) {
        self.name = value.to_string();
        self.tracking.notify("Name");
    }
}

impl Trackable for Category {
    tracking_header!();

    fn describe(builder: &mut EntityDescriptorBuilder<Self>) {
        builder
            .property("Name")
            .reference::<Category>("Parent", |c| &c.parent, |c| &mut c.parent)
            .collection::<Category>("Subcategories", |c| &c.subcategories, |c| &mut c.subcategories);
    }

    fn primary_key(&self) -> Option<String> {
        Some(self.name.clone())
    }
}

// ===== Builders =====

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Order with one detail per price, details pointing back at the order
pub fn order_with_details(
    graph: &mut EntityGraph,
    order_id: i32,
    prices: &[f64],
) -> (EntityKey, Vec<EntityKey>) {
    let order = graph.attach(Order::new(order_id, date(2024, 1, 1))).unwrap();
    let details_coll = graph.collection_of(order, "OrderDetails").unwrap().unwrap();

    let mut details = Vec::new();
    for (i, price) in prices.iter().enumerate() {
        let mut detail = OrderDetail::new(order_id * 10 + i as i32 + 1, *price);
        detail.order_id = order_id;
        detail.order = ReferenceSlot::to(order);
        let key = graph.attach(detail).unwrap();
        collection_ops::add(graph, details_coll, key).unwrap();
        details.push(key);
    }
    (order, details)
}

/// Customer owning one order, order referencing the customer
pub fn customer_with_order(graph: &mut EntityGraph, customer_id: &str, order_id: i32) -> (EntityKey, EntityKey) {
    let customer = graph.attach(Customer::new(customer_id, "Acme")).unwrap();
    let mut order = Order::new(order_id, date(2024, 1, 1));
    order.customer_id = Some(customer_id.to_string());
    order.customer = ReferenceSlot::to(customer);
    let order = graph.attach(order).unwrap();
    let orders = graph.collection_of(customer, "Orders").unwrap().unwrap();
    collection_ops::add(graph, orders, order).unwrap();
    (customer, order)
}

/// Root collection with tracking enabled over the given entities
pub fn tracked(graph: &mut EntityGraph, items: &[EntityKey]) -> CollectionKey {
    collection_ops::from_entities(graph, items.iter().copied(), false).unwrap()
}

pub fn modified_properties(graph: &EntityGraph, key: EntityKey) -> Vec<String> {
    graph
        .entity(key)
        .unwrap()
        .tracking()
        .modified_properties()
        .map(|p| p.iter().cloned().collect())
        .unwrap_or_default()
}

/// Copy in `graph` whose primary key matches
pub fn find_by_key<T: Trackable>(graph: &EntityGraph, keys: &[EntityKey], primary_key: &str) -> Option<EntityKey> {
    keys.iter().copied().find(|k| {
        graph.get::<T>(*k).ok().and_then(|e| e.primary_key()).as_deref() == Some(primary_key)
    })
}
