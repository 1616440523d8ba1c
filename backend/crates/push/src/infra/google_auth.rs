//! Google service-account credentials
//!
//! Decodes a base64 service-account JSON, signs an RS256 assertion and
//! exchanges it at the account's token endpoint for an access token.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use crate::domain::credential::{AccessCredential, CredentialSource};
use crate::error::{PushError, PushResult};

pub const FIREBASE_MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_base64(encoded: &str) -> PushResult<Self> {
        let json = STANDARD
            .decode(encoded.trim())
            .map_err(|e| PushError::Credential(format!("credential is not base64: {e}")))?;
        serde_json::from_slice(&json)
            .map_err(|e| PushError::Credential(format!("invalid service account json: {e}")))
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> PushResult<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: FIREBASE_MESSAGING_SCOPE,
        aud: &key.token_uri,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| PushError::Credential(format!("invalid private key: {e}")))?;

    encode(&header, &claims, &signing_key)
        .map_err(|e| PushError::Credential(format!("failed to sign assertion: {e}")))
}

#[derive(Debug, Clone, Default)]
pub struct ServiceAccountSource {
    http: reqwest::Client,
}

impl ServiceAccountSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl CredentialSource for ServiceAccountSource {
    async fn fetch(&self, app_id: &str, credential_base64: &str) -> PushResult<AccessCredential> {
        let key = ServiceAccountKey::from_base64(credential_base64)?;
        let now = Utc::now();
        let assertion = sign_assertion(&key, now)?;

        let response = self
            .http
            .post(&key.token_uri)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(format!(
                "grant_type={JWT_BEARER_GRANT}&assertion={assertion}"
            ))
            .send()
            .await
            .map_err(|e| PushError::Credential(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(app_id, status = status.as_u16(), "Token endpoint rejected assertion");
            return Err(PushError::Credential(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PushError::Credential(format!("invalid token response: {e}")))?;

        Ok(AccessCredential {
            access_token: token.access_token,
            project_id: key.project_id,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}
