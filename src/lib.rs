pub mod api;
pub mod certificate;
pub mod config;
pub mod course;
pub mod error;
pub mod grading;
pub mod platform;
pub mod policy;
pub mod store;
pub mod student;
pub mod utils;
