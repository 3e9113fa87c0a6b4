//! Workflow Forge HTTP API models

pub mod models;

pub use models::*;
