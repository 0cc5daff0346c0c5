//! HTTP route handlers.

pub mod auth;
pub mod companies;
pub mod health;
pub mod lead_requests;
pub mod leads;
pub mod returns;
pub mod users;
