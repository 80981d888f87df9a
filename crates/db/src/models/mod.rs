pub mod edge;
pub mod graph;
pub mod project;
pub mod task;
pub mod user;
pub mod user_to_project;
