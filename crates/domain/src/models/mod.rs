//! Domain models for Leadflow.

pub mod company;
pub mod import;
pub mod lead;
pub mod lead_request;
pub mod lead_return;
pub mod user;

pub use company::Company;
pub use lead::{Lead, LeadPatch, LeadStatus, TempStatus};
pub use lead_request::{LeadRequest, LeadRequestStatus};
pub use lead_return::{Attachment, LeadReturn, LeadReturnStatus};
pub use user::{Actor, Role, User};
