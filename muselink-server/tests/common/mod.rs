//! Shared helpers for muselink-server integration tests
//!
//! Every test gets its own file-backed database in a temp directory, so
//! WAL mode and concurrent pool connections behave as in production.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use muselink_common::config::AdminConfig;
use muselink_server::services::accounts;
use muselink_server::{build_router, AppState};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

pub const ADMIN_EMAIL: &str = "admin@muselink.test";
pub const ADMIN_PASSWORD: &str = "admin-pass";

/// A running app over a fresh database; the temp dir lives as long as this
pub struct TestApp {
    pub app: Router,
    pub db: SqlitePool,
    _dir: TempDir,
}

pub async fn setup() -> TestApp {
    let dir = TempDir::new().expect("Should create temp dir");
    let db = muselink_common::db::init_database(&dir.path().join("muselink.db"))
        .await
        .expect("Should initialize database");

    accounts::ensure_admin(
        &db,
        &AdminConfig {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            name: "Admin".to_string(),
        },
    )
    .await
    .expect("Should create admin");

    let app = build_router(AppState::new(db.clone()));
    TestApp { app, db, _dir: dir }
}

/// Extract JSON body from response (empty body reads as Null)
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

impl TestApp {
    /// Send a request and return status plus parsed body
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, extract_json(response.into_body()).await)
    }

    /// Register an account and return its session token and user id
    pub async fn register(&self, role: &str, email: &str) -> (String, String) {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "name": format!("{} user", role),
                    "email": email,
                    "password": "secret",
                    "role": role,
                    "phone": "+54 11 5555-0000",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    pub async fn client(&self, email: &str) -> (String, String) {
        self.register("client", email).await
    }

    pub async fn artist(&self, email: &str) -> (String, String) {
        self.register("artist", email).await
    }

    pub async fn admin_token(&self) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    /// Post a request as `client_token`; returns the request id
    pub async fn post_request(&self, client_token: &str, title: &str, max_unlocks: i64) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/requests",
                Some(client_token),
                Some(json!({
                    "title": title,
                    "description": "Looking for live music",
                    "genre": "jazz",
                    "event_date": "2026-12-31",
                    "budget": 500,
                    "max_unlocks": max_unlocks,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn balance(&self, token: &str) -> i64 {
        let (status, body) = self.call("GET", "/api/auth/me", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        body["credits"].as_i64().unwrap()
    }

    pub async fn unlock(&self, artist_token: &str, request_id: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            &format!("/api/requests/{}/unlock", request_id),
            Some(artist_token),
            None,
        )
        .await
    }
}
