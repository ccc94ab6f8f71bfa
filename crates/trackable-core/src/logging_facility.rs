//! Structured logging facility for the tracking engine
//!
//! This module provides:
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! Public graph operations (change extraction, cloning, merging, persistence
//! mapping) log a start event and exactly one end or end_error event. The
//! recursive walks underneath them only emit `debug!`/`trace!` records.
//!
//! # Usage
//!
//! ```rust
//! use trackable_core::logging_facility::{init, Profile};
//!
//! // Initialize once at application startup
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
