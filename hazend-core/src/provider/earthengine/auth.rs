use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tokio::sync::Mutex;

const SCOPE: &str = "https://www.googleapis.com/auth/earthengine";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a Google service-account JSON key we need.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// OAuth2 access tokens for a service account, via the JWT-bearer grant.
///
/// A pre-issued token, when configured, is used as-is and the key file is never read.
#[derive(Debug)]
pub struct ServiceAccountAuth {
    key_file: Option<PathBuf>,
    service_account: Option<String>,
    fixed_token: Option<String>,
    http: Client,
    token: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(
        key_file: Option<PathBuf>,
        service_account: Option<String>,
        fixed_token: Option<String>,
    ) -> Self {
        Self {
            key_file,
            service_account,
            fixed_token,
            http: Client::new(),
            token: Mutex::new(None),
        }
    }

    pub fn load_key(&self) -> Result<ServiceAccountKey> {
        let path = self.key_file.as_ref().ok_or_else(|| {
            anyhow!(
                "No Earth Engine key file configured.\n\
                 Hint: set HAZEND_EE_KEY_FILE or run `hazend configure`."
            )
        })?;

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read Earth Engine key file: {}", path.display()))?;

        parse_key(&contents)
            .with_context(|| format!("Failed to parse Earth Engine key file: {}", path.display()))
    }

    /// A valid access token, fetching a new one when the cached token is stale.
    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = &self.fixed_token {
            return Ok(token.clone());
        }

        let mut cached = self.token.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let key = self.load_key()?;
        let issuer = self.service_account.as_deref().unwrap_or(&key.client_email);
        let assertion = sign_assertion(&key, issuer, now)?;

        let res = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("Failed to send token request for Earth Engine service account")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read token response body")?;

        if !status.is_success() {
            return Err(anyhow!("Token request failed with status {}: {}", status, body));
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).context("Failed to parse token response JSON")?;

        log::debug!("Obtained Earth Engine access token for {issuer}");

        let token = CachedToken {
            value: parsed.access_token,
            expires_at: now + Duration::seconds(parsed.expires_in),
        };
        let value = token.value.clone();
        *cached = Some(token);

        Ok(value)
    }
}

pub fn parse_key(contents: &str) -> Result<ServiceAccountKey> {
    Ok(serde_json::from_str(contents)?)
}

fn sign_assertion(key: &ServiceAccountKey, issuer: &str, now: DateTime<Utc>) -> Result<String> {
    let claims = Claims {
        iss: issuer,
        scope: SCOPE,
        aud: &key.token_uri,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .context("Service-account private key is not a valid RSA PEM")?;

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .context("Failed to sign service-account assertion")
}
