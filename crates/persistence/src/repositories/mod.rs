//! Repository implementations for database operations.

pub mod company;
pub mod lead;
pub mod lead_request;
pub mod lead_return;
pub mod user;

pub use company::{CompanyRepository, CreateCompanyInput};
pub use lead::LeadRepository;
pub use lead_request::{ApproveOutcome, LeadRequestRepository, ListLeadRequestsQuery};
pub use lead_return::{LeadReturnRepository, NewAttachment, ReturnScope};
pub use user::{CreateUserInput, UserRepository};
