//! Shared utilities and common types for the Leadflow backend.
//!
//! This crate provides functionality used across the other crates:
//! - JWT access tokens carrying the caller's role and company
//! - Password hashing with Argon2id
//! - Phone normalization and input validation helpers
//! - Range pagination

pub mod jwt;
pub mod pagination;
pub mod password;
pub mod validation;
