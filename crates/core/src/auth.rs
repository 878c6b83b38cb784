//! Caller verification seam.
//!
//! Session and token verification belong to the transport layer; this crate
//! only needs a verified user id and the role claims that came with it.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AuthConfig;
use crate::domain::geography::UserId;
use crate::errors::ApplicationError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedCaller {
    pub user_id: UserId,
    pub role_claims: Vec<String>,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` means the credential did not verify.
    async fn verify(
        &self,
        credential: &SecretString,
    ) -> Result<Option<VerifiedCaller>, ApplicationError>;
}

/// Fixed token table, used by the operator CLI and in tests.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenAuthenticator {
    callers: HashMap<String, VerifiedCaller>,
}

impl StaticTokenAuthenticator {
    pub fn new(entries: Vec<(SecretString, VerifiedCaller)>) -> Self {
        let callers = entries
            .into_iter()
            .map(|(token, caller)| (token.expose_secret().to_string(), caller))
            .collect();
        Self { callers }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(
            auth.service_tokens
                .iter()
                .map(|entry| {
                    let caller = VerifiedCaller { user_id: entry.user_id, role_claims: Vec::new() };
                    (entry.token.clone(), caller)
                })
                .collect(),
        )
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn verify(
        &self,
        credential: &SecretString,
    ) -> Result<Option<VerifiedCaller>, ApplicationError> {
        let caller = self.callers.get(credential.expose_secret().trim()).cloned();
        if caller.is_none() {
            debug!(event_name = "auth.credential_rejected", "credential did not verify");
        }
        Ok(caller)
    }
}
