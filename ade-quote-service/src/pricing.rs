//! HTTP client for the pricing provider, with an injected OAuth token cache
//! shared across sessions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ade_quote_core::pricing::ScenarioRecord;
use ade_quote_core::{
    PricingAdapter, QuoteError, Result, TarificationRequest, TarificationResponse,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

/// The provider invalidates tokens after one hour; refresh a little earlier.
const TOKEN_TTL: Duration = Duration::from_secs(55 * 60);

/// Bearer-token cache handed to the adapter by its owner, so its lifetime is
/// explicit and tests can share or isolate it at will.
#[derive(Default)]
pub struct CredentialCache {
    token: Mutex<Option<CachedToken>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }
}

struct CachedToken {
    value: String,
    fetched_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        is_fresh_after(self.fetched_at.elapsed())
    }
}

fn is_fresh_after(age: Duration) -> bool {
    age < TOKEN_TTL
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct HttpPricingAdapter {
    http: reqwest::Client,
    base_url: String,
    login: String,
    password: String,
    credentials: Arc<CredentialCache>,
}

impl HttpPricingAdapter {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        login: String,
        password: String,
        credentials: Arc<CredentialCache>,
    ) -> Self {
        Self {
            http,
            base_url,
            login,
            password,
            credentials,
        }
    }

    /// Cached token when fresh, otherwise a basic-auth token call. The lock
    /// is held across the refresh so concurrent quotes share one fetch.
    async fn bearer_token(&self) -> Result<String> {
        let mut guard = self.credentials.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.value.clone());
            }
        }

        debug!("refreshing pricing provider token");
        let response = self
            .http
            .post(format!("{}/security/oauth2/token", self.base_url))
            .basic_auth(&self.login, Some(&self.password))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| QuoteError::Adapter(format!("token request failed: {e}")))?
            .error_for_status()
            .map_err(|e| QuoteError::Adapter(format!("token request rejected: {e}")))?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| QuoteError::Adapter(format!("token payload unreadable: {e}")))?;

        *guard = Some(CachedToken {
            value: token.access_token.clone(),
            fetched_at: Instant::now(),
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl PricingAdapter for HttpPricingAdapter {
    async fn quote(&self, request: &TarificationRequest) -> Result<TarificationResponse> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/rest/v2/ade/tarification/getTarifs",
                self.base_url
            ))
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| QuoteError::Adapter(format!("tarification call failed: {e}")))?
            .error_for_status()
            .map_err(|e| QuoteError::Adapter(format!("tarification call rejected: {e}")))?;

        response
            .json()
            .await
            .map_err(|e| QuoteError::Adapter(format!("tarification payload unreadable: {e}")))
    }

    async fn create_business_record(
        &self,
        external_record_id: &str,
        scenario: &ScenarioRecord,
    ) -> Result<()> {
        let token = self.bearer_token().await?;
        let body = json!({
            "externalRecordId": external_record_id,
            "scenarioRecordDataModel": scenario,
        });
        self.http
            .post(format!(
                "{}/rest/v2/ade/businessRecord/createBusinessRecord",
                self.base_url
            ))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| QuoteError::Adapter(format!("business record call failed: {e}")))?
            .error_for_status()
            .map_err(|e| QuoteError::Adapter(format!("business record rejected: {e}")))?;
        Ok(())
    }
}
