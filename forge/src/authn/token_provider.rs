//! Access tokens for calling GitHub on behalf of a user

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;

use crate::errors::ForgeError;
use crate::storage::settings::Settings;

/// Token provider trait for testability
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get the GitHub access token of `user_id`
    async fn access_token(&self, user_id: &str) -> Result<SecretString, ForgeError>;
}

/// Tokens fixed at startup, with an optional fallback for unknown users
#[derive(Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, SecretString>,
    fallback: Option<SecretString>,
}

impl StaticTokenProvider {
    pub fn new(tokens: HashMap<String, String>, fallback: Option<String>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .filter(|(_, token)| !token.is_empty())
                .map(|(user, token)| (user, SecretString::from(token)))
                .collect(),
            fallback: fallback.filter(|t| !t.is_empty()).map(SecretString::from),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.tokens.clone(), settings.fallback_token.clone())
    }

    pub fn with_token(mut self, user_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens
            .insert(user_id.into(), SecretString::from(token.into()));
        self
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self, user_id: &str) -> Result<SecretString, ForgeError> {
        if let Some(token) = self.tokens.get(user_id) {
            return Ok(token.clone());
        }

        match &self.fallback {
            Some(token) => {
                debug!("No token for user {}, using fallback token", user_id);
                Ok(token.clone())
            }
            None => Err(ForgeError::TokenNotFound(user_id.to_string())),
        }
    }
}
