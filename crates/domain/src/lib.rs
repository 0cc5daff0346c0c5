//! Domain layer for the Leadflow back office.
//!
//! This crate contains:
//! - Domain models (Lead, Company, User, LeadRequest, LeadReturn)
//! - The lead state machine, request quota and return transitions
//! - Integration outcome types and collaborator traits
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::{LeadError, QuotaReason};
