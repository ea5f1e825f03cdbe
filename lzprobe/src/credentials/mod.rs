//! Credential providers for bearer-authenticated probes.
//!
//! Every probe that talks to a bearer-authenticated service resolves exactly
//! one [`AccessToken`] through the [`TokenCredential`] trait and threads it
//! into its client calls. The interactive [`DeviceCodeCredential`] is what an
//! operator uses; automated harnesses substitute a [`StaticTokenCredential`]
//! so no probe ever needs a browser to be testable.
//!
//! Credentials are constructed per probe run and dropped with it - there is
//! no shared credential cache and no refresh path.

mod device_code;

pub use device_code::DeviceCodeCredential;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

/// A bearer token scoped to one downstream service.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The raw token placed in `Authorization: Bearer` headers
    pub token: String,
    /// When the issuer says the token stops working
    pub expires_on: DateTime<Utc>,
}

/// A source of bearer tokens.
///
/// In practice this is the device-code flow over HTTP; the trait exists so
/// test harnesses and non-interactive environments can supply a token
/// directly. See `StaticTokenCredential`.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Acquire a token valid for the given OAuth scope.
    async fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

/// A credential that hands out a pre-acquired token.
///
/// Used by automated harnesses in place of the interactive flow, and handy
/// for operators who already hold a CLI-issued token.
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        Ok(AccessToken {
            token: self.token.clone(),
            // The holder vouches for the token; give downstream expiry checks
            // a comfortable horizon.
            expires_on: Utc::now() + chrono::Duration::hours(1),
        })
    }
}
