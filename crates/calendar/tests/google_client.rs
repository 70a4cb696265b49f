//! Drives `GoogleCalendarClient` against a local fake of the token and events endpoints.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{post, put};
use axum::{Form, Json, Router};
use chrono::{TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Value, json};

use labdesk_calendar::{
    CalendarApi, CalendarError, CalendarTimeZone, EventDetails, GoogleCalendarClient,
    GoogleCalendarConfig, ServiceAccountKey,
};

const PRIVATE_KEY: &str = include_str!("fixtures/service_account_key.pem");
const PUBLIC_KEY: &str = include_str!("fixtures/service_account_pub.pem");
const CLIENT_EMAIL: &str = "labdesk@example.iam.gserviceaccount.com";

#[derive(Default)]
struct Recorded {
    token_requests: usize,
    bodies: Vec<Value>,
    auth_headers: Vec<String>,
    fail_inserts: bool,
}

type Shared = Arc<Mutex<Recorded>>;

#[derive(Deserialize)]
struct TokenForm {
    grant_type: String,
    assertion: String,
}

#[derive(Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
}

async fn token(State(state): State<(Shared, String)>, Form(form): Form<TokenForm>) -> (StatusCode, Json<Value>) {
    let (recorded, audience) = state;
    assert_eq!(form.grant_type, "urn:ietf:params:oauth:grant-type:jwt-bearer");

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);
    let key = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap();
    let Ok(data) = jsonwebtoken::decode::<AssertionClaims>(&form.assertion, &key, &validation) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" })));
    };
    assert_eq!(data.claims.iss, CLIENT_EMAIL);
    assert_eq!(data.claims.scope, "https://www.googleapis.com/auth/calendar");

    recorded.lock().unwrap().token_requests += 1;
    (
        StatusCode::OK,
        Json(json!({ "access_token": "ya29.test", "expires_in": 3600, "token_type": "Bearer" })),
    )
}

async fn insert(
    State((recorded, _)): State<(Shared, String)>,
    Path(calendar_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut r = recorded.lock().unwrap();
    if r.fail_inserts {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": { "message": "forbidden" } })));
    }
    r.auth_headers.push(auth(&headers));
    r.bodies.push(body);
    (StatusCode::OK, Json(json!({ "id": format!("{calendar_id}-evt-1") })))
}

async fn update(
    State((recorded, _)): State<(Shared, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut r = recorded.lock().unwrap();
    r.auth_headers.push(auth(&headers));
    r.bodies.push(body);
    StatusCode::OK
}

async fn delete(Path((_, event_id)): Path<(String, String)>) -> StatusCode {
    if event_id == "gone" {
        StatusCode::GONE
    } else if event_id == "broken" {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NO_CONTENT
    }
}

fn auth(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn spawn_fake(recorded: Shared) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let audience = format!("http://{addr}/token");

    let app = Router::new()
        .route("/token", post(token))
        .route("/calendar/v3/calendars/:calendar_id/events", post(insert))
        .route(
            "/calendar/v3/calendars/:calendar_id/events/:event_id",
            put(update).delete(delete),
        )
        .with_state((recorded, audience));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr) -> GoogleCalendarClient {
    let key = ServiceAccountKey {
        client_email: CLIENT_EMAIL.into(),
        private_key: PRIVATE_KEY.into(),
        token_uri: format!("http://{addr}/token"),
    };
    let tz = "Asia/Bangkok".parse::<CalendarTimeZone>().unwrap();
    let mut config = GoogleCalendarConfig::new(key, tz);
    config.api_base = format!("http://{addr}/calendar/v3");
    config.timeout = Duration::from_secs(5);
    GoogleCalendarClient::new(config).unwrap()
}

fn details() -> EventDetails {
    let start = Utc.with_ymd_and_hms(2030, 4, 2, 7, 0, 0).unwrap();
    EventDetails {
        summary: "Lab Room 1: HPLC".into(),
        description: "Reserved by someone\n\nHPLC".into(),
        start,
        end: start + chrono::Duration::hours(1),
    }
}

#[tokio::test]
async fn create_update_delete_share_one_cached_token() {
    let recorded: Shared = Arc::default();
    let addr = spawn_fake(recorded.clone()).await;
    let calendar = client(addr);

    let event_id = calendar.create_event("room1", &details()).await.unwrap();
    assert_eq!(event_id, "room1-evt-1");
    calendar.update_event("room1", &event_id, &details()).await.unwrap();
    calendar.delete_event("room1", &event_id).await.unwrap();

    let r = recorded.lock().unwrap();
    assert_eq!(r.token_requests, 1);
    assert!(r.auth_headers.iter().all(|h| h == "Bearer ya29.test"));

    let body = &r.bodies[0];
    assert_eq!(body["summary"], "Lab Room 1: HPLC");
    assert_eq!(body["start"]["dateTime"], "2030-04-02T14:00:00+07:00");
    assert_eq!(body["start"]["timeZone"], "Asia/Bangkok");
    assert_eq!(body["end"]["dateTime"], "2030-04-02T15:00:00+07:00");
    assert_eq!(r.bodies[0], r.bodies[1]);
}

#[tokio::test]
async fn provider_errors_surface_with_status() {
    let recorded: Shared = Arc::default();
    recorded.lock().unwrap().fail_inserts = true;
    let addr = spawn_fake(recorded.clone()).await;
    let calendar = client(addr);

    let err = calendar.create_event("room1", &details()).await.unwrap_err();
    assert!(matches!(err, CalendarError::Api { status: 403, .. }));

    let err = calendar.delete_event("room1", "broken").await.unwrap_err();
    assert!(matches!(err, CalendarError::Api { status: 500, .. }));
}

#[tokio::test]
async fn deleting_a_removed_event_succeeds() {
    let recorded: Shared = Arc::default();
    let addr = spawn_fake(recorded).await;
    let calendar = client(addr);

    calendar.delete_event("room1", "gone").await.unwrap();
}

#[tokio::test]
async fn unreachable_token_endpoint_is_a_request_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let calendar = client(addr);
    let err = calendar.create_event("room1", &details()).await.unwrap_err();
    assert!(matches!(err, CalendarError::Request(_)));
}
