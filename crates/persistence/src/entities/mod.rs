//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod company;
pub mod lead;
pub mod lead_request;
pub mod lead_return;
pub mod user;

pub use company::CompanyEntity;
pub use lead::{LeadEntity, LeadStatusDb, PlatformDb, TempStatusDb};
pub use lead_request::{LeadRequestEntity, LeadRequestStatusDb};
pub use lead_return::{AttachmentEntity, AttachmentKindDb, LeadReturnEntity, LeadReturnStatusDb};
pub use user::{UserEntity, UserRoleDb};
