//! Persistence layer for the Leadflow back office.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - Query latency metrics

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
