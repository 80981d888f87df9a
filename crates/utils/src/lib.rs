pub mod clerk;
pub mod response;
