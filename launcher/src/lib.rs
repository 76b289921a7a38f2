//! easy-aws library
//!
//! Provisioning and teardown flows for per-branch ECS services.

pub mod app;
pub mod cloud;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod logs;
pub mod models;
pub mod utils;
