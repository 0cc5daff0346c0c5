//! Domain services for Leadflow.
//!
//! Services contain the decision logic that operates on domain models. They
//! perform no I/O; callers load snapshots and persist the returned patches.

pub mod import;
pub mod integration;
pub mod lifecycle;
pub mod quota;
pub mod returns;

pub use integration::{
    AssignmentMirror, IntegrationOutcome, MockAssignmentMirror, MockPartnerGateway,
    PartnerEndpoint, PartnerGateway, PartnerResponse,
};
pub use quota::{check_request_quota, QuotaStatus, QuotaUsage};
