pub mod auth;
pub mod core;
pub mod credentials;
pub mod dashboard;
pub mod exchange;
pub mod logs;
pub mod setup;
pub mod students;
