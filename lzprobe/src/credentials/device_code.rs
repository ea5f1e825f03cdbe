//! Interactive device-code credential.
//!
//! Implements the OAuth 2.0 device-authorization grant (RFC 8628): request a
//! device code, show the operator the user code and verification URL, then
//! poll the token endpoint until the browser prompt completes. The poll loop
//! honors the server's `interval` and `slow_down` pacing and gives up when
//! either the code's own `expires_in` or the configured prompt timeout
//! elapses, whichever is sooner - an abandoned prompt fails, it never hangs.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use super::{AccessToken, TokenCredential};
use crate::config::IdentityConfig;
use crate::errors::{Error, Result};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Fallback poll interval when the authorization response omits one.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Device authorization response (RFC 8628 §3.2).
#[derive(Debug, Deserialize)]
struct DeviceAuthorization {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    interval: Option<u64>,
    /// Human-readable prompt some identity providers include
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Error shape of a pending/failed token poll (RFC 8628 §3.5).
#[derive(Debug, Deserialize)]
struct TokenPollError {
    error: String,
    error_description: Option<String>,
}

/// Interactive credential backed by the device-authorization flow.
pub struct DeviceCodeCredential {
    client: Client,
    device_code_url: String,
    token_url: String,
    client_id: String,
    prompt_timeout: Duration,
}

impl DeviceCodeCredential {
    /// Build a credential from the identity section of the probe config.
    pub fn new(identity: &IdentityConfig, request_timeout: Duration) -> Result<Self> {
        identity.validate()?;
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            device_code_url: identity.device_code_url.clone(),
            token_url: identity.token_url.clone(),
            client_id: identity.client_id.clone(),
            prompt_timeout: identity.prompt_timeout,
        })
    }

    async fn request_device_code(&self, scope: &str) -> Result<DeviceAuthorization> {
        let response = self
            .client
            .post(&self.device_code_url)
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UnexpectedStatus {
                service: "identity",
                status,
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| Error::Decode {
            what: "device authorization",
            source,
        })
    }

    /// One poll of the token endpoint. `Ok(Some)` is a token, `Ok(None)`
    /// means keep waiting, `Err` ends the flow.
    async fn poll_token(&self, device_code: &str, interval: &mut Duration) -> Result<Option<AccessToken>> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", DEVICE_CODE_GRANT),
                ("device_code", device_code),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let token: TokenResponse = serde_json::from_str(&body).map_err(|source| Error::Decode {
                what: "token",
                source,
            })?;
            return Ok(Some(AccessToken {
                token: token.access_token,
                expires_on: Utc::now() + chrono::Duration::seconds(token.expires_in),
            }));
        }

        // Pending polls come back as OAuth errors; only two of them mean
        // "keep going".
        let poll: TokenPollError = serde_json::from_str(&body).map_err(|source| Error::Decode {
            what: "token poll",
            source,
        })?;
        match poll.error.as_str() {
            "authorization_pending" => Ok(None),
            "slow_down" => {
                *interval += Duration::from_secs(5);
                debug!(interval_secs = interval.as_secs(), "token endpoint requested slower polling");
                Ok(None)
            }
            _ => Err(Error::Auth {
                message: poll.error_description.unwrap_or(poll.error),
            }),
        }
    }
}

#[async_trait]
impl TokenCredential for DeviceCodeCredential {
    #[instrument(skip_all, fields(scope))]
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let authorization = self.request_device_code(scope).await?;

        // The prompt goes to stdout deliberately: it is the one piece of
        // probe output the operator must act on, not a log line.
        match &authorization.message {
            Some(message) => println!("{message}"),
            None => println!(
                "To sign in, open {} and enter the code {}",
                authorization.verification_uri, authorization.user_code
            ),
        }

        let mut interval = Duration::from_secs(authorization.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS));
        let deadline = Instant::now() + self.prompt_timeout.min(Duration::from_secs(authorization.expires_in));

        loop {
            if Instant::now() >= deadline {
                return Err(Error::Auth {
                    message: format!(
                        "device code prompt was not completed within {}",
                        humantime::format_duration(self.prompt_timeout.min(Duration::from_secs(authorization.expires_in)))
                    ),
                });
            }
            tokio::time::sleep(interval).await;

            if let Some(token) = self.poll_token(&authorization.device_code, &mut interval).await? {
                debug!("device code flow completed");
                return Ok(token);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity_for(server: &MockServer, prompt_timeout: Duration) -> IdentityConfig {
        IdentityConfig {
            device_code_url: format!("{}/devicecode", server.uri()),
            token_url: format!("{}/token", server.uri()),
            client_id: "probe-client".to_string(),
            prompt_timeout,
        }
    }

    fn device_code_response(interval: u64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://login.example.net/device",
            "expires_in": 900,
            "interval": interval,
        }))
    }

    #[test_log::test(tokio::test)]
    async fn pending_then_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/devicecode"))
            .respond_with(device_code_response(0))
            .expect(1)
            .mount(&server)
            .await;

        // First poll pending, then a token: the one-shot pending mock is
        // mounted first and falls away once its allowance is used.
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("device_code=dev-123"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "authorization_pending",
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok-456",
                "expires_in": 3600,
                "token_type": "Bearer",
            })))
            .mount(&server)
            .await;

        let credential = DeviceCodeCredential::new(&identity_for(&server, Duration::from_secs(30)), Duration::from_secs(5)).unwrap();

        let token = credential.get_token("https://vault.azure.net/.default").await.unwrap();
        assert_eq!(token.token, "tok-456");
        assert!(token.expires_on > Utc::now());
    }

    #[test_log::test(tokio::test)]
    async fn abandoned_prompt_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/devicecode"))
            .respond_with(device_code_response(0))
            .mount(&server)
            .await;

        // The operator never completes the prompt: every poll stays pending
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "authorization_pending",
            })))
            .mount(&server)
            .await;

        let credential = DeviceCodeCredential::new(&identity_for(&server, Duration::from_millis(200)), Duration::from_secs(5)).unwrap();

        let err = credential.get_token("scope").await.unwrap_err();
        assert!(matches!(err, Error::Auth { .. }), "got: {err:?}");
        assert!(err.to_string().contains("not completed"), "got: {err}");
    }

    #[test_log::test(tokio::test)]
    async fn denied_prompt_fails_immediately() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/devicecode"))
            .respond_with(device_code_response(0))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "access_denied",
                "error_description": "The user denied the request",
            })))
            .mount(&server)
            .await;

        let credential = DeviceCodeCredential::new(&identity_for(&server, Duration::from_secs(30)), Duration::from_secs(5)).unwrap();

        let err = credential.get_token("scope").await.unwrap_err();
        assert!(err.to_string().contains("denied"), "got: {err}");
    }

    #[test]
    fn placeholder_identity_is_rejected() {
        let identity = IdentityConfig::default();
        assert!(DeviceCodeCredential::new(&identity, Duration::from_secs(5)).is_err());
    }
}
