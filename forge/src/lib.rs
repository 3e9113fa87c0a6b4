//! Workflow Forge Library
//!
//! Generates GitHub Actions deployment workflows for EC2 and Kubernetes and
//! publishes them to a repository as pull requests.

pub mod app;
pub mod authn;
pub mod errors;
pub mod http;
pub mod logs;
pub mod models;
pub mod publish;
pub mod server;
pub mod services;
pub mod storage;
pub mod template;
pub mod utils;
