use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{AzureError, Result};

/// Tokens are refreshed this long before they expire
const EXPIRY_SKEW_SECS: i64 = 60;

/// What a client needs to set the Authorization header
#[derive(Debug, Clone)]
pub enum AuthHeader {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl AuthHeader {
    pub fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Basic { username, password } => req.basic_auth(username, Some(password)),
            Self::Bearer { token } => req.bearer_auth(token),
        }
    }
}

/// How a REST client authenticates
#[derive(Clone)]
pub enum Credential {
    /// Client-credentials token for `scope`, fetched and cached by the provider
    ClientSecret {
        provider: Arc<TokenProvider>,
        scope: String,
    },
    /// Azure DevOps personal access token
    Pat(String),
    /// Pre-acquired bearer token
    Static(String),
}

impl Credential {
    pub fn client_secret(provider: Arc<TokenProvider>, resource: &str) -> Self {
        Self::ClientSecret {
            provider,
            scope: format!("{}/.default", resource.trim_end_matches('/')),
        }
    }

    pub async fn header(&self) -> Result<AuthHeader> {
        match self {
            Self::ClientSecret { provider, scope } => Ok(AuthHeader::Bearer {
                token: provider.token(scope).await?,
            }),
            Self::Pat(pat) => Ok(AuthHeader::Basic {
                username: String::new(),
                password: pat.clone(),
            }),
            Self::Static(token) => Ok(AuthHeader::Bearer {
                token: token.clone(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// OAuth2 client-credentials flow against Entra ID, one cached token per scope
pub struct TokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cache: RwLock<HashMap<String, CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        http: reqwest::Client,
        authority_host: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            authority_host.trim_end_matches('/'),
            tenant_id
        );
        Self {
            http,
            token_url,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn token(&self, scope: &str) -> Result<String> {
        if let Some(cached) = self.cache.read().await.get(scope)
            && cached.expires_at > Utc::now()
        {
            return Ok(cached.access_token.clone());
        }

        let fresh = self.request_token(scope).await?;
        let token = fresh.access_token.clone();
        self.cache.write().await.insert(scope.to_string(), fresh);
        Ok(token)
    }

    async fn request_token(&self, scope: &str) -> Result<CachedToken> {
        debug!(scope, "Requesting access token");
        let resp = self
            .http
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!(
                "grant_type=client_credentials&client_id={}&client_secret={}&scope={}",
                urlencoding(&self.client_id),
                urlencoding(&self.client_secret),
                urlencoding(scope),
            ))
            .send()
            .await
            .map_err(|e| AzureError::auth(format!("token endpoint unreachable: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AzureError::auth(format!(
                "token request for {scope} failed (HTTP {status}): {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AzureError::auth(format!("failed to parse token response: {e}")))?;

        let lifetime = (token.expires_in - EXPIRY_SKEW_SECS).max(0);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        })
    }
}

fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
