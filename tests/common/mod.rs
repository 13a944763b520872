#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use eventhub_server::config::Config;
use eventhub_server::models::{Event, EventDraft, TicketDraft};
use eventhub_server::routes::create_routes;
use eventhub_server::state::AppState;
use eventhub_server::store::{MemoryStore, Store};

pub const PASSWORD: &str = "correct horse battery";
const BOUNDARY: &str = "eventhub-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let upload_dir = tempfile::tempdir().expect("temp upload dir");
        let config = Config {
            upload_dir: upload_dir.path().to_path_buf(),
            ..Config::default()
        };
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config);
        Self {
            router: create_routes(state),
            store,
            upload_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)], cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(urlencode(fields))).expect("request"))
            .await
    }

    pub async fn post_multipart(&self, uri: &str, fields: &[(&str, &str)], cookie: &str) -> Response {
        self.post_multipart_with_file(uri, fields, None, cookie).await
    }

    pub async fn post_multipart_with_file(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<FilePart<'_>>,
        cookie: &str,
    ) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(COOKIE, cookie)
            .body(Body::from(multipart_body(fields, file)))
            .expect("request");
        self.send(request).await
    }

    /// Registers with an explicit email, for uniqueness checks.
    pub async fn register_with_email(&self, username: &str, email: &str) -> Response {
        self.post_form(
            "/register",
            &[
                ("username", username),
                ("email", email),
                ("password", PASSWORD),
                ("confirm", PASSWORD),
                ("first_name", "Ada"),
                ("last_name", "Lovelace"),
            ],
            None,
        )
        .await
    }

    pub async fn register(&self, username: &str) -> Response {
        self.register_with_email(username, &format!("{username}@example.com"))
            .await
    }

    /// Registers and logs in, returning the `Cookie` header value.
    pub async fn signed_in(&self, username: &str) -> String {
        let response = self.register(username).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = self
            .post_form(
                "/login",
                &[("username", username), ("password", PASSWORD)],
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("login sets a session cookie")
    }
}

/// `name=value` of the first `Set-Cookie` header.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

pub fn location(response: &Response) -> Option<&str> {
    response.headers().get(LOCATION)?.to_str().ok()
}

pub async fn json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Id at the end of a redirect such as `/event/7`.
pub fn trailing_id(location: &str) -> i64 {
    location
        .trim_end_matches("/confirmation")
        .rsplit('/')
        .next()
        .and_then(|id| id.parse().ok())
        .expect("redirect ends with an id")
}

fn urlencode(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// An image part of a multipart submission.
pub struct FilePart<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub bytes: &'a [u8],
}

fn multipart_body(fields: &[(&str, &str)], file: Option<FilePart<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                file.field, file.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
}

pub fn draft(title: &str, description: &str, event_date: NaiveDate) -> EventDraft {
    EventDraft {
        title: title.to_string(),
        description: description.to_string(),
        genre: "Comedy".to_string(),
        location: Some("Main Hall".to_string()),
        event_date,
        start_time: NaiveTime::from_hms_opt(19, 30, 0).expect("time"),
        end_time: None,
        image: None,
        status: None,
    }
}

pub fn ticket(label: &str, price: &str, quota: Option<i32>) -> TicketDraft {
    TicketDraft {
        label: label.to_string(),
        price: price.parse::<Decimal>().expect("price"),
        quota,
    }
}

pub async fn seed_event(
    app: &TestApp,
    title: &str,
    description: &str,
    event_date: NaiveDate,
    tickets: Vec<TicketDraft>,
) -> Event {
    app.store
        .create_event(draft(title, description, event_date), "default.jpg", None, tickets)
        .await
        .expect("seed event")
}
