//! Database repositories.

mod complaint;
mod user;

pub use complaint::{ComplaintRepository, ComplaintScope};
pub use user::UserRepository;
