// Test code is allowed to panic on failure
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

//! Unit tests for the Search Operator
//!
//! This module contains unit tests for:
//! - Resource builders (Secret, StatefulSet, PersistentVolumeClaim)
//! - Storage settings validation
//! - The persistence decision engine
//! - Readiness probing
//! - Status publication
//! - Collector restarts
//! - End-to-end reconcile passes against an in-memory store

#[path = "../common/mod.rs"]
mod common;

mod validation;
