//! Google Calendar v3 REST client using service-account credentials.
//!
//! Access tokens come from the OAuth2 JWT-bearer grant: an RS256 assertion
//! signed with the service account's private key is exchanged at the token
//! endpoint. Tokens are cached and refreshed a minute before they expire.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::api::CalendarApi;
use crate::error::CalendarError;
use crate::event::EventDetails;
use crate::timezone::CalendarTimeZone;

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// The fields of a Google service-account JSON key that the client uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, CalendarError> {
        serde_json::from_str(json)
            .map_err(|e| CalendarError::Credentials(format!("invalid service account key: {e}")))
    }
}

#[derive(Debug, Clone)]
pub struct GoogleCalendarConfig {
    pub credentials: ServiceAccountKey,
    pub time_zone: CalendarTimeZone,
    pub api_base: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl GoogleCalendarConfig {
    pub fn new(credentials: ServiceAccountKey, time_zone: CalendarTimeZone) -> Self {
        Self {
            credentials,
            time_zone,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
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
    refresh_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct InsertedEvent {
    id: String,
}

pub struct GoogleCalendarClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    time_zone: CalendarTimeZone,
    api_base: Url,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for GoogleCalendarClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCalendarClient")
            .field("client_email", &self.key.client_email)
            .field("api_base", &self.api_base.as_str())
            .field("time_zone", &self.time_zone)
            .finish()
    }
}

impl GoogleCalendarClient {
    pub fn new(config: GoogleCalendarConfig) -> Result<Self, CalendarError> {
        let signing_key = EncodingKey::from_rsa_pem(config.credentials.private_key.as_bytes())?;
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| CalendarError::Credentials(format!("invalid API base URL: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(CalendarError::Credentials(format!(
                "invalid API base URL: {api_base}"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            key: config.credentials,
            signing_key,
            time_zone: config.time_zone,
            api_base,
            token: Mutex::new(None),
        })
    }

    fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["calendars", calendar_id, "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        url
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, CalendarError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: CALENDAR_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.signing_key,
        )?)
    }

    async fn access_token(&self) -> Result<String, CalendarError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if now < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.sign_assertion(now)?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let response = ensure_success(response).await.map_err(|e| match e {
            CalendarError::Api { status, body } => {
                CalendarError::Credentials(format!("token exchange rejected ({status}): {body}"))
            }
            other => other,
        })?;
        let token: TokenResponse = response.json().await?;
        debug!(expires_in = token.expires_in, "obtained calendar access token");

        let lifetime = (token.expires_in - TOKEN_REFRESH_MARGIN_SECS).max(0);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: now + chrono::Duration::seconds(lifetime),
        });
        Ok(token.access_token)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(CalendarError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    #[instrument(skip(self, event), fields(calendar_id = %calendar_id), err)]
    async fn create_event(
        &self,
        calendar_id: &str,
        event: &EventDetails,
    ) -> Result<String, CalendarError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(self.events_url(calendar_id, None))
            .bearer_auth(token)
            .json(&event.to_body(&self.time_zone))
            .send()
            .await?;
        let inserted: InsertedEvent = ensure_success(response).await?.json().await?;
        Ok(inserted.id)
    }

    #[instrument(skip(self, event), fields(calendar_id = %calendar_id, event_id = %event_id), err)]
    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &EventDetails,
    ) -> Result<(), CalendarError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .put(self.events_url(calendar_id, Some(event_id)))
            .bearer_auth(token)
            .json(&event.to_body(&self.time_zone))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// An event that is already gone (404/410) counts as deleted.
    #[instrument(skip(self), fields(calendar_id = %calendar_id, event_id = %event_id), err)]
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .delete(self.events_url(calendar_id, Some(event_id)))
            .bearer_auth(token)
            .send()
            .await?;
        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            debug!("calendar event already removed");
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_PEM: &str = include_str!("../tests/fixtures/service_account_key.pem");

    fn client(api_base: &str) -> GoogleCalendarClient {
        let key = ServiceAccountKey {
            client_email: "labdesk@example.iam.gserviceaccount.com".into(),
            private_key: KEY_PEM.into(),
            token_uri: "http://127.0.0.1:9/token".into(),
        };
        let mut config = GoogleCalendarConfig::new(key, CalendarTimeZone::utc());
        config.api_base = api_base.to_string();
        GoogleCalendarClient::new(config).unwrap()
    }

    #[test]
    fn calendar_ids_are_percent_encoded_in_paths() {
        let c = client(DEFAULT_API_BASE);
        let url = c.events_url("abc#holiday@group.calendar.google.com", Some("evt/1"));
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/abc%23holiday@group.calendar.google.com/events/evt%2F1"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        let c = client("http://localhost:8080/calendar/v3/");
        let url = c.events_url("room1", None);
        assert_eq!(url.as_str(), "http://localhost:8080/calendar/v3/calendars/room1/events");
    }

    #[test]
    fn service_account_json_defaults_token_uri_and_redacts_key() {
        let key = ServiceAccountKey::from_json(
            r#"{"type":"service_account","client_email":"a@b.c","private_key":"secret"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(!format!("{key:?}").contains("secret"));
    }

    #[test]
    fn non_pem_private_key_is_a_credentials_error() {
        let key = ServiceAccountKey {
            client_email: "a@b.c".into(),
            private_key: "not a key".into(),
            token_uri: DEFAULT_TOKEN_URI.into(),
        };
        let err = GoogleCalendarClient::new(GoogleCalendarConfig::new(key, CalendarTimeZone::utc()))
            .unwrap_err();
        assert!(matches!(err, CalendarError::Credentials(_)));
    }
}
