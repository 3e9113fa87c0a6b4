//! Access token lookup

pub mod token_provider;

pub use token_provider::{AccessTokenProvider, StaticTokenProvider};
