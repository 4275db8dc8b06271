//! Firestore REST sink
//!
//! Documents are created with `POST .../documents/{collection}` so Firestore assigns
//! the id. A `runQuery` on `url` beforehand keeps one document per video. Access
//! tokens come from a service account key exchanged for a bearer token.

use crate::error::{Result, TrendsError};
use crate::storage::sink::VideoSink;
use crate::types::VideoRecord;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::path::Path;
use tokio::sync::Mutex;

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires
const TOKEN_SKEW_SECS: i64 = 60;

/// Service account key file as downloaded from the cloud console
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccount {
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            TrendsError::Storage(format!(
                "cannot read service account {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            TrendsError::Storage(format!("invalid service account {}: {}", path.display(), e))
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

fn signed_assertion(account: &ServiceAccount, now: i64) -> Result<String> {
    let claims = Claims {
        iss: account.client_email.clone(),
        scope: DATASTORE_SCOPE.to_string(),
        aud: account.token_uri.clone(),
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };
    let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &key,
    )?)
}

fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

fn timestamp_value(ts: DateTime<Utc>) -> Value {
    json!({ "timestampValue": ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true) })
}

fn date_value(date: Option<NaiveDate>) -> Value {
    match date.and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(dt) => timestamp_value(dt.and_utc()),
        None => json!({ "nullValue": null }),
    }
}

/// Firestore typed document body for a video
pub fn to_document(video: &VideoRecord) -> Value {
    let mut fields = Map::new();
    fields.insert("url".into(), string_value(&video.url));
    fields.insert("title".into(), string_value(&video.title));
    fields.insert(
        "language".into(),
        json!({ "integerValue": video.language.to_string() }),
    );
    fields.insert(
        "categories".into(),
        json!({ "integerValue": video.categories.to_string() }),
    );
    fields.insert("length".into(), string_value(&video.length));
    fields.insert("uploadDate".into(), date_value(video.upload_date));
    fields.insert("thumbnailUrl".into(), string_value(&video.thumbnail_url));
    fields.insert("isShorts".into(), json!({ "booleanValue": video.is_shorts }));
    fields.insert("createdAt".into(), timestamp_value(video.created_at));
    json!({ "fields": fields })
}

/// `runQuery` body matching at most one document with the given URL
pub fn url_query(collection: &str, url: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "url" },
                    "op": "EQUAL",
                    "value": string_value(url),
                }
            },
            "limit": 1,
        }
    })
}

/// `runQuery` answers with a stream of results; only entries carrying a
/// `document` are matches
fn query_matched(response: &Value) -> bool {
    response
        .as_array()
        .is_some_and(|rows| rows.iter().any(|row| row.get("document").is_some()))
}

pub struct FirestoreSink {
    client: Client,
    account: ServiceAccount,
    project: String,
    collection: String,
    token: Mutex<Option<CachedToken>>,
}

impl FirestoreSink {
    pub fn new(account: ServiceAccount, project: Option<String>, collection: &str) -> Self {
        let project = project.unwrap_or_else(|| account.project_id.clone());
        Self {
            client: Client::new(),
            account,
            project,
            collection: collection.to_string(),
            token: Mutex::new(None),
        }
    }

    /// Build a sink from a key file path
    pub async fn from_key_file(
        path: &Path,
        project: Option<String>,
        collection: &str,
    ) -> Result<Self> {
        let account = ServiceAccount::from_file(path).await?;
        tracing::info!(
            project = %project.as_deref().unwrap_or(&account.project_id),
            collection,
            "using Firestore sink"
        );
        Ok(Self::new(account, project, collection))
    }

    pub fn collection_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            FIRESTORE_BASE, self.project, self.collection
        )
    }

    pub fn query_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents:runQuery",
            FIRESTORE_BASE, self.project
        )
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref().filter(|t| t.expires_at - TOKEN_SKEW_SECS > now) {
            return Ok(token.value.clone());
        }

        let assertion = signed_assertion(&self.account, now)?;
        let response = self
            .client
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TrendsError::Storage(format!(
                "token exchange failed: HTTP {}",
                response.status()
            )));
        }

        let body: TokenResponse = response.json().await?;
        let expires_at = now + body.expires_in.unwrap_or(TOKEN_LIFETIME_SECS);
        tracing::debug!(expires_at, "obtained Firestore access token");

        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at,
        });
        Ok(body.access_token)
    }
}

#[async_trait]
impl VideoSink for FirestoreSink {
    async fn exists(&self, url: &str) -> Result<bool> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.query_url())
            .bearer_auth(token)
            .json(&url_query(&self.collection, url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrendsError::Storage(format!(
                "lookup of {} failed: HTTP {}",
                url, status
            )));
        }
        let body: Value = response.json().await?;
        Ok(query_matched(&body))
    }

    async fn insert(&self, video: &VideoRecord) -> Result<()> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.collection_url())
            .bearer_auth(token)
            .json(&to_document(video))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrendsError::Storage(format!(
                "insert of {} failed: HTTP {}: {}",
                video.url,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }
}
