pub mod access;
pub mod auth;

pub use access::{ProjectAccess, load_project_access};
pub use auth::require_session;
