//! Core types shared across the trackable facilities
//!
//! This crate provides foundational types used by the change-tracking
//! engine, its error facility and its logging facility:
//!
//! - **Identity types**: EntityKey, CollectionKey, EntityIdentifier, ObjectId
//! - **Schema constants**: Canonical field keys and event names

pub mod ids;
pub mod schema;

pub use ids::{CollectionKey, EntityIdentifier, EntityKey, ObjectId};
