//! Carbon Credit Registry
//!
//! Issuance, purchase and retirement of carbon-offset credits with a
//! consistent inventory, serialized batches, per-buyer holdings and an
//! append-only ledger.
//!
//! # Modules
//!
//! - [`core_types`] - Core type aliases (ProjectId, UserId, Quantity, etc.)
//! - [`money`] - Quantity/price parsing and Decimal arithmetic
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL connection pool
//! - [`registry`] - Registry domain: planners, invariants, stores, coordinator
//! - [`gateway`] - axum HTTP surface

// Core types - must be first!
pub mod core_types;

pub mod money;

// Service plumbing
pub mod config;
pub mod db;
pub mod logging;

// Registry
pub mod registry;

// HTTP
pub mod gateway;

// Convenient re-exports at crate root
pub use core_types::{ProjectId, Quantity, UserId, Vintage};
pub use registry::{RegistryCoordinator, RegistryError};
