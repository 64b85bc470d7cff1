//! Core business logic for hostelhub.
//!
//! This crate contains the domain services that sit between the HTTP
//! surface and the database layer:
//!
//! - **Caller context**: [`CallerContext`], the closed role union every
//!   authorization decision matches over
//! - **Visibility filter**: pure mapping from caller to the complaint
//!   records that caller is entitled to see
//! - **Complaint service**: lifecycle transitions, merging, cascades, and
//!   bulk maintenance
//! - **User service**: registration, login, token refresh, and staff
//!   administration

pub mod caller;
pub mod services;

pub use caller::CallerContext;
pub use services::complaint::{
    AssignInput, ComplaintService, CreateComplaintInput, MergeInput, transition_permitted,
};
pub use services::user::{LoginOutcome, RegisterInput, TokenPair, UserService};
pub use services::visibility::{self, ManagementTab};
