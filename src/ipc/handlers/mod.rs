pub mod core;
pub mod dashboard;
pub mod payments;
pub mod setup;
pub mod students;
