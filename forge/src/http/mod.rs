//! GitHub API access

pub mod client;
pub mod gateway;

pub use client::GitHubClient;
pub use gateway::GitHubGateway;
