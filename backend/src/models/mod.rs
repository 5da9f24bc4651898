pub mod dashboard;
pub mod files;
pub mod folders;
pub mod nodes;
