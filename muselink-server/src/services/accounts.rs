//! Registration, login and session lifecycle

use chrono::{DateTime, Duration, Utc};
use muselink_common::auth::{self, MIN_PASSWORD_LEN};
use muselink_common::config::AdminConfig;
use muselink_common::db::settings;
use muselink_common::models::{Role, User};
use muselink_common::{time, Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{sessions, users};

/// Generic message for every login failure
const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A signed-in user plus the bearer token that identifies the session
#[derive(Debug, Clone, Serialize)]
pub struct SessionGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Longest address accepted, per RFC 5321
const MAX_EMAIL_LEN: usize = 254;

/// Dot-atom local part, then dot-separated labels that neither start nor end
/// with a hyphen, ending in an alphabetic TLD
static EMAIL_PATTERN: Lazy<std::result::Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9_%+-]+(?:\.[A-Za-z0-9_%+-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}$",
    )
});

fn validate_email(email: &str) -> Result<()> {
    if email.len() > MAX_EMAIL_LEN {
        return Err(Error::InvalidInput(format!(
            "Email must be at most {} characters",
            MAX_EMAIL_LEN
        )));
    }

    let pattern = EMAIL_PATTERN
        .as_ref()
        .map_err(|e| Error::Internal(format!("Email pattern failed to compile: {}", e)))?;

    if !pattern.is_match(email) {
        return Err(Error::InvalidInput(format!("Invalid email address: {}", email)));
    }

    Ok(())
}

async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| Error::Internal(format!("Password hashing task failed: {}", e)))?
}

async fn verify_password(password: String, stored_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored_hash))
        .await
        .map_err(|e| Error::Internal(format!("Password check task failed: {}", e)))?
}

fn session_expiry(now: DateTime<Utc>, timeout_seconds: i64) -> Result<DateTime<Utc>> {
    Duration::try_seconds(timeout_seconds.max(1))
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            Error::Config(format!(
                "session_timeout_seconds {} is out of range",
                timeout_seconds
            ))
        })
}

async fn open_session(db: &SqlitePool, user: User) -> Result<SessionGrant> {
    let timeout = settings::get_session_timeout_seconds(db).await?;
    let now = time::now();
    let expires_at = session_expiry(now, timeout)?;

    let token = auth::generate_session_token();
    sessions::insert_session(db, &auth::hash_session_token(&token), user.id, &now, &expires_at)
        .await?;

    Ok(SessionGrant {
        token,
        expires_at,
        user,
    })
}

/// Create a client or artist account and sign it in
pub async fn register(db: &SqlitePool, registration: Registration) -> Result<SessionGrant> {
    let name = registration.name.trim().to_string();
    let email = registration.email.trim().to_string();
    let phone = registration
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    if registration.role == Role::Admin {
        return Err(Error::InvalidInput(
            "Admin accounts cannot be registered".to_string(),
        ));
    }
    if name.is_empty() {
        return Err(Error::InvalidInput("Name is required".to_string()));
    }
    validate_email(&email)?;
    if registration.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if registration.role == Role::Client && phone.is_none() {
        return Err(Error::InvalidInput(
            "Phone is required for clients".to_string(),
        ));
    }

    let credits = match registration.role {
        Role::Artist => settings::get_artist_signup_credits(db).await?,
        _ => 0,
    };

    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        role: registration.role,
        phone,
        credits,
        created_at: time::now(),
    };

    let password_hash = hash_password(registration.password).await?;
    users::insert_user(db, &user, &password_hash).await?;

    info!(user_id = %user.id, role = %user.role, "Registered new account");

    open_session(db, user).await
}

/// Check credentials and open a new session
pub async fn login(db: &SqlitePool, email: &str, password: &str) -> Result<SessionGrant> {
    let purged = sessions::purge_expired(db, &time::now()).await?;
    if purged > 0 {
        info!("Purged {} expired sessions", purged);
    }

    let Some((user, stored_hash)) = users::find_credentials(db, email.trim()).await? else {
        return Err(Error::Unauthorized(BAD_CREDENTIALS.to_string()));
    };

    if !verify_password(password.to_string(), stored_hash).await? {
        warn!(user_id = %user.id, "Login rejected: wrong password");
        return Err(Error::Unauthorized(BAD_CREDENTIALS.to_string()));
    }

    open_session(db, user).await
}

/// End the session identified by `token`
pub async fn logout(db: &SqlitePool, token: &str) -> Result<()> {
    sessions::delete_session(db, &auth::hash_session_token(token)).await?;
    Ok(())
}

/// Resolve a bearer token to its user
pub async fn authenticate(db: &SqlitePool, token: &str) -> Result<User> {
    sessions::find_session_user(db, &auth::hash_session_token(token), &time::now())
        .await?
        .ok_or_else(|| Error::Unauthorized("Session is invalid or expired".to_string()))
}

/// The caller's account with a fresh balance
pub async fn me(db: &SqlitePool, user_id: Uuid) -> Result<User> {
    users::find_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::Unauthorized("Account no longer exists".to_string()))
}

/// Create the configured admin account if it is missing
///
/// An existing admin with the same email is left untouched. An existing
/// non-admin account with that email is a configuration error.
pub async fn ensure_admin(db: &SqlitePool, admin: &AdminConfig) -> Result<User> {
    let email = admin.email.trim();
    validate_email(email)?;

    if let Some((existing, _)) = users::find_credentials(db, email).await? {
        if existing.role != Role::Admin {
            return Err(Error::Config(format!(
                "Admin email {} belongs to a {} account",
                email, existing.role
            )));
        }
        return Ok(existing);
    }

    if admin.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Config(format!(
            "Admin password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: admin.name.clone(),
        email: email.to_string(),
        role: Role::Admin,
        phone: None,
        credits: 0,
        created_at: time::now(),
    };

    let password_hash = hash_password(admin.password.clone()).await?;
    users::insert_user(db, &user, &password_hash).await?;

    info!(user_id = %user.id, "Created admin account {}", user.email);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("a.b+c@mail.example.org").is_ok());
        assert!(validate_email("dj_set%2@sub-domain.example.co").is_ok());

        for bad in [
            "",
            "ana",
            "@example.com",
            "ana@",
            "ana@example",
            "ana@@example.com",
            "an a@example.com",
            "ana@.com",
            "ana@example..com",
            "ana@-.com",
            "ana@example-.com",
            ".ana@example.com",
            "ana..b@example.com",
            "a,b@x.y",
            "<ana>@x.y",
            "ana@example.c",
        ] {
            assert!(validate_email(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_session_expiry_bounds() {
        let now = time::now();
        assert_eq!(session_expiry(now, 3600).unwrap(), now + Duration::hours(1));
        assert_eq!(session_expiry(now, 0).unwrap(), now + Duration::seconds(1));

        match session_expiry(now, i64::MAX) {
            Err(Error::Config(msg)) => assert!(msg.contains("session_timeout_seconds")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_email_length_cap() {
        let domain = "@example.com";
        let fits = format!("{}{}", "a".repeat(MAX_EMAIL_LEN - domain.len()), domain);
        assert_eq!(fits.len(), MAX_EMAIL_LEN);
        assert!(validate_email(&fits).is_ok());

        let long = format!("{}{}", "a".repeat(300), domain);
        assert!(validate_email(&long).is_err());
    }
}
