//! Integration tests for MuseLink API endpoints
//!
//! Tests cover:
//! - Health endpoint (no auth required)
//! - Registration rules, login, logout and session validity
//! - Role guards and request ownership
//! - Open-request browsing filters
//! - Credit purchases and pricing
//! - Admin configuration, statistics and export

mod common;

use axum::http::StatusCode;
use common::{setup, ADMIN_EMAIL};
use muselink_common::db::settings;
use serde_json::json;

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let t = setup().await;

    let (status, body) = t.call("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "muselink");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_number());
}

// =============================================================================
// Account Tests
// =============================================================================

#[tokio::test]
async fn test_register_artist_gets_signup_credits() {
    let t = setup().await;

    let (status, body) = t
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "name": "Lucía",
                "email": "lucia@example.com",
                "password": "abc",
                "role": "artist",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "artist");
    assert_eq!(body["user"]["credits"], 3);
    assert_eq!(body["token"].as_str().unwrap().len(), 64);
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_validation_rules() {
    let t = setup().await;

    let cases = [
        // Client without phone
        json!({"name": "C", "email": "c@example.com", "password": "abc", "role": "client"}),
        // Password too short
        json!({"name": "A", "email": "a@example.com", "password": "ab", "role": "artist"}),
        // Self-registered admin
        json!({"name": "X", "email": "x@example.com", "password": "abc", "role": "admin"}),
        // Malformed emails
        json!({"name": "B", "email": "not-an-email", "password": "abc", "role": "artist"}),
        json!({"name": "B", "email": "ana@example..com", "password": "abc", "role": "artist"}),
        json!({"name": "B", "email": "ana@-.com", "password": "abc", "role": "artist"}),
        json!({"name": "B", "email": "<ana>@x.y", "password": "abc", "role": "artist"}),
        json!({"name": "B", "email": format!("{}@example.com", "a".repeat(300)), "password": "abc", "role": "artist"}),
        // Blank name
        json!({"name": "  ", "email": "n@example.com", "password": "abc", "role": "artist"}),
    ];

    for payload in cases {
        let (status, body) = t.call("POST", "/api/auth/register", None, Some(payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", payload);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    // Unknown role fails JSON decoding, still with the standard error body
    let (status, body) = t
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"name": "R", "email": "r@example.com", "password": "abc", "role": "roadie"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_duplicate_email_is_conflict_case_insensitive() {
    let t = setup().await;
    t.artist("dup@example.com").await;

    let (status, body) = t
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "name": "Dup",
                "email": "DUP@example.com",
                "password": "abc",
                "role": "artist",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_login_and_generic_failure_message() {
    let t = setup().await;
    t.artist("artist@example.com").await;

    let (status, body) = t
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "artist@example.com", "password": "secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "artist@example.com");

    let (status, wrong_password) = t
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "artist@example.com", "password": "nope"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unknown_email) = t
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ghost@example.com", "password": "secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password["error"]["message"], unknown_email["error"]["message"]);
}

#[tokio::test]
async fn test_protected_routes_require_valid_session() {
    let t = setup().await;

    let (status, body) = t.call("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = t.call("GET", "/api/auth/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unknown = "ab".repeat(32);
    let (status, _) = t.call("GET", "/api/auth/me", Some(&unknown), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_invalidates_token() {
    let t = setup().await;
    let (token, _) = t.client("client@example.com").await;

    let (status, _) = t.call("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.call("POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.call("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_session_rejected_and_purged_on_login() {
    let t = setup().await;
    let (token, _) = t.client("client@example.com").await;

    sqlx::query("UPDATE sessions SET expires_at = '2000-01-01T00:00:00.000000Z'")
        .execute(&t.db)
        .await
        .unwrap();

    let (status, _) = t.call("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    t.admin_token().await;
    let expired: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE expires_at < '2001-01-01'")
            .fetch_one(&t.db)
            .await
            .unwrap();
    assert_eq!(expired, 0);
}

#[tokio::test]
async fn test_out_of_range_session_timeout_fails_cleanly() {
    let t = setup().await;
    t.artist("artist@example.com").await;

    settings::set_setting(&t.db, settings::keys::SESSION_TIMEOUT_SECONDS, i64::MAX)
        .await
        .unwrap();

    let (status, body) = t
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "artist@example.com", "password": "secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
}

// =============================================================================
// Request Tests
// =============================================================================

#[tokio::test]
async fn test_create_request_defaults_and_role_guard() {
    let t = setup().await;
    let (client, client_id) = t.client("client@example.com").await;
    let (artist, _) = t.artist("artist@example.com").await;

    let payload = json!({
        "title": "Mariachi for a birthday",
        "description": "Saturday afternoon",
        "genre": "latin",
    });

    let (status, body) = t.call("POST", "/api/requests", Some(&client), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["client_id"], client_id.as_str());
    assert_eq!(body["max_unlocks"], 3);
    assert_eq!(body["unlock_count"], 0);
    assert_eq!(body["remaining_unlocks"], 3);
    assert_eq!(body["status"], "open");
    assert!(body["event_date"].is_null());

    let (status, _) = t.call("POST", "/api/requests", Some(&artist), Some(payload)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_request_validation() {
    let t = setup().await;
    let (client, _) = t.client("client@example.com").await;

    let cases = [
        json!({"title": "", "description": "d", "genre": "pop"}),
        json!({"title": "t", "description": " ", "genre": "pop"}),
        json!({"title": "t", "description": "d", "genre": "pop", "max_unlocks": 0}),
        json!({"title": "t", "description": "d", "genre": "pop", "max_unlocks": 51}),
        json!({"title": "t", "description": "d", "genre": "pop", "budget": -5}),
        json!({"title": "t", "description": "d", "genre": "pop", "event_date": "31/12/2026"}),
        json!({"title": "t", "description": "d", "genre": "polka"}),
    ];

    for payload in cases {
        let (status, _) = t.call("POST", "/api/requests", Some(&client), Some(payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", payload);
    }
}

#[tokio::test]
async fn test_requests_never_expose_contact() {
    let t = setup().await;
    let (client, _) = t.client("client@example.com").await;
    let (artist, _) = t.artist("artist@example.com").await;
    let id = t.post_request(&client, "Private gig", 3).await;

    let (status, body) = t.call("GET", &format!("/api/requests/{}", id), Some(&artist), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("contact").is_none());
    assert!(!body.to_string().contains("client@example.com"));

    let (_, list) = t.call("GET", "/api/requests", Some(&artist), None).await;
    assert!(!list.to_string().contains("client@example.com"));
}

#[tokio::test]
async fn test_update_and_delete_ownership() {
    let t = setup().await;
    let (owner, _) = t.client("owner@example.com").await;
    let (other, _) = t.client("other@example.com").await;
    let id = t.post_request(&owner, "Choir", 3).await;
    let uri = format!("/api/requests/{}", id);

    let edit = json!({
        "title": "Gospel choir",
        "description": "Sunday service",
        "genre": "other",
        "budget": 300,
    });

    let (status, _) = t.call("PUT", &uri, Some(&other), Some(edit.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t.call("PUT", &uri, Some(&owner), Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Gospel choir");
    assert_eq!(body["max_unlocks"], 3);

    let (status, _) = t.call("DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call("DELETE", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.call("GET", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.call("DELETE", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unlocked_request_limits_edits_and_deletion() {
    let t = setup().await;
    let (client, _) = t.client("client@example.com").await;
    let (a1, _) = t.artist("a1@example.com").await;
    let (a2, _) = t.artist("a2@example.com").await;
    let id = t.post_request(&client, "Brass band", 2).await;
    let uri = format!("/api/requests/{}", id);

    t.unlock(&a1, &id).await;
    t.unlock(&a2, &id).await;

    let (status, _) = t.call("DELETE", &uri, Some(&client), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut edit = json!({
        "title": "Brass band",
        "description": "Parade",
        "genre": "other",
        "max_unlocks": 1,
    });
    let (status, _) = t.call("PUT", &uri, Some(&client), Some(edit.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Raising the cap reopens a full request
    edit["max_unlocks"] = json!(4);
    let (status, body) = t.call("PUT", &uri, Some(&client), Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "open");
    assert_eq!(body["remaining_unlocks"], 2);
}

#[tokio::test]
async fn test_list_open_filters_and_sort() {
    let t = setup().await;
    let (client, _) = t.client("client@example.com").await;
    let (artist, _) = t.artist("artist@example.com").await;

    for (title, genre) in [("Jazz brunch", "jazz"), ("Rock party", "rock"), ("Late JAZZ club", "jazz")] {
        let (status, _) = t
            .call(
                "POST",
                "/api/requests",
                Some(&client),
                Some(json!({"title": title, "description": "d", "genre": genre})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let titles = |body: &serde_json::Value| -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|r| r["title"].as_str().unwrap().to_string())
            .collect()
    };

    let (_, body) = t.call("GET", "/api/requests", Some(&artist), None).await;
    assert_eq!(titles(&body), ["Late JAZZ club", "Rock party", "Jazz brunch"]);

    let (_, body) = t.call("GET", "/api/requests?sort=oldest", Some(&artist), None).await;
    assert_eq!(titles(&body), ["Jazz brunch", "Rock party", "Late JAZZ club"]);

    let (_, body) = t.call("GET", "/api/requests?genre=rock", Some(&artist), None).await;
    assert_eq!(titles(&body), ["Rock party"]);

    let (_, body) = t.call("GET", "/api/requests?search=jazz", Some(&artist), None).await;
    assert_eq!(titles(&body), ["Late JAZZ club", "Jazz brunch"]);

    let (status, _) = t.call("GET", "/api/requests?sort=random", Some(&artist), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Clients browse only their own list
    let (status, _) = t.call("GET", "/api/requests", Some(&client), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, mine) = t.call("GET", "/api/requests/mine", Some(&client), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 3);

    let admin = t.admin_token().await;
    let (status, _) = t.call("GET", "/api/requests", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Credit Tests
// =============================================================================

#[tokio::test]
async fn test_purchase_adds_credits_and_records_total() {
    let t = setup().await;
    let (artist, artist_id) = t.artist("artist@example.com").await;

    let (status, body) = t.call("GET", "/api/credits/price", Some(&artist), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["credit_price_cents"], 200);

    let (status, body) = t
        .call("POST", "/api/credits/purchase", Some(&artist), Some(json!({"credits": 5})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["credits"], 8);
    assert_eq!(body["transaction"]["credits"], 5);
    assert_eq!(body["transaction"]["unit_price_cents"], 200);
    assert_eq!(body["transaction"]["total_cents"], 1000);
    assert_eq!(body["transaction"]["user_id"], artist_id.as_str());
    assert!(body["transaction"]["invoice_number"]
        .as_str()
        .unwrap()
        .starts_with("INV-"));

    assert_eq!(t.balance(&artist).await, 8);

    let (_, history) = t.call("GET", "/api/credits/transactions", Some(&artist), None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_purchase_uses_price_in_effect() {
    let t = setup().await;
    let (artist, _) = t.artist("artist@example.com").await;
    let admin = t.admin_token().await;

    t.call("POST", "/api/credits/purchase", Some(&artist), Some(json!({"credits": 2})))
        .await;

    let (status, _) = t
        .call("PUT", "/api/admin/config", Some(&admin), Some(json!({"credit_price_cents": 350})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = t
        .call("POST", "/api/credits/purchase", Some(&artist), Some(json!({"credits": 3})))
        .await;
    assert_eq!(body["transaction"]["total_cents"], 1050);

    let (_, history) = t.call("GET", "/api/credits/transactions", Some(&artist), None).await;
    let totals: Vec<i64> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|tx| tx["total_cents"].as_i64().unwrap())
        .collect();
    assert_eq!(totals, [1050, 400]);
}

#[tokio::test]
async fn test_purchase_rules() {
    let t = setup().await;
    let (artist, _) = t.artist("artist@example.com").await;
    let (client, _) = t.client("client@example.com").await;

    for credits in [0, -1, 1001] {
        let (status, _) = t
            .call("POST", "/api/credits/purchase", Some(&artist), Some(json!({"credits": credits})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", credits);
    }

    let (status, _) = t
        .call("POST", "/api/credits/purchase", Some(&client), Some(json!({"credits": 1})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(t.balance(&artist).await, 3);
}

// =============================================================================
// Admin Tests
// =============================================================================

#[tokio::test]
async fn test_admin_routes_reject_other_roles() {
    let t = setup().await;
    let (artist, _) = t.artist("artist@example.com").await;

    for uri in [
        "/api/admin/config",
        "/api/admin/stats",
        "/api/admin/users",
        "/api/admin/transactions",
        "/api/admin/export",
    ] {
        let (status, _) = t.call("GET", uri, Some(&artist), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }

    let (status, _) = t
        .call("PUT", "/api/admin/config", Some(&artist), Some(json!({"credit_price_cents": 1})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_config_rejects_negative_price() {
    let t = setup().await;
    let admin = t.admin_token().await;

    let (status, _) = t
        .call("PUT", "/api/admin/config", Some(&admin), Some(json!({"credit_price_cents": -1})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = t.call("GET", "/api/admin/config", Some(&admin), None).await;
    assert_eq!(body["credit_price_cents"], 200);
}

#[tokio::test]
async fn test_admin_stats_arithmetic() {
    let t = setup().await;
    let admin = t.admin_token().await;
    let (client, _) = t.client("client@example.com").await;
    let (a1, _) = t.artist("a1@example.com").await;
    let (a2, _) = t.artist("a2@example.com").await;

    let full = t.post_request(&client, "One seat", 1).await;
    t.post_request(&client, "Many seats", 5).await;

    t.unlock(&a1, &full).await;
    t.call("POST", "/api/credits/purchase", Some(&a1), Some(json!({"credits": 10})))
        .await;
    t.call("POST", "/api/credits/purchase", Some(&a2), Some(json!({"credits": 1})))
        .await;

    let (status, stats) = t.call("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["revenue_cents"], 2200);
    assert_eq!(stats["clients"], 1);
    assert_eq!(stats["artists"], 2);
    assert_eq!(stats["requests"], 2);
    assert_eq!(stats["open_requests"], 1);
    assert_eq!(stats["unlocks"], 1);
    assert_eq!(stats["transactions"], 2);
    // a1: 3 - 1 + 10, a2: 3 + 1
    assert_eq!(stats["credits_in_circulation"], 16);
}

#[tokio::test]
async fn test_admin_listings_and_export() {
    let t = setup().await;
    let admin = t.admin_token().await;
    let (client, _) = t.client("client@example.com").await;
    let (artist, _) = t.artist("artist@example.com").await;
    t.post_request(&client, "Export me", 3).await;
    t.call("POST", "/api/credits/purchase", Some(&artist), Some(json!({"credits": 1})))
        .await;

    let (status, users) = t.call("GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 3);
    assert!(users.iter().any(|u| u["email"] == ADMIN_EMAIL && u["role"] == "admin"));
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));

    let (_, txs) = t.call("GET", "/api/admin/transactions", Some(&admin), None).await;
    assert_eq!(txs.as_array().unwrap().len(), 1);

    let (status, export) = t.call("GET", "/api/admin/export", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(export["exported_at"].is_string());
    assert_eq!(export["config"]["credit_price_cents"], 200);
    assert_eq!(export["users"].as_array().unwrap().len(), 3);
    assert_eq!(export["requests"].as_array().unwrap().len(), 1);
    assert_eq!(export["transactions"].as_array().unwrap().len(), 1);
    assert!(!export.to_string().contains("argon2"));
}
