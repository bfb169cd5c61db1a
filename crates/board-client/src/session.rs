//! Identity / session boundary.
//!
//! Credential issuance and refresh belong to the identity provider. The
//! gateway only asks for the current bearer credential and signs out when the
//! store rejects it.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current bearer credential, if a session exists.
    async fn bearer(&self) -> Option<String>;

    /// Drop the session so the user is asked to authenticate again.
    async fn sign_out(&self);
}

/// Holds a credential handed over by the identity provider.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// No session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn is_signed_in(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn bearer(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn sign_out(&self) {
        tracing::info!("Signing out: session rejected by store");
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
