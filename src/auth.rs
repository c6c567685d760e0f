//! Email/password accounts and bearer sessions.
//!
//! Passwords are stored as PBKDF2-SHA256 with a per-user salt. Session
//! tokens are random and only their SHA-256 is persisted, so a leaked
//! database does not hand out live sessions.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use pbkdf2::pbkdf2_hmac;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::UserRole;
use crate::models::{StoredSession, UserProfile};
use crate::validation::{validate_sign_up, FieldErrors};

#[cfg(not(test))]
pub const PBKDF2_ITERATIONS: u32 = 600_000;
/// Cheap hashing keeps the test suite fast; the format records the count.
#[cfg(test)]
pub const PBKDF2_ITERATIONS: u32 = 1_000;

const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;
const HASH_SCHEME: &str = "pbkdf2-sha256";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Invalid sign-up data: {0}")]
    Validation(FieldErrors),

    #[error("Session is invalid")]
    InvalidSession,

    #[error("Session has expired")]
    SessionExpired,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&UserProfile> for AuthenticatedUser {
    fn from(u: &UserProfile) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            full_name: u.full_name.clone(),
            role: u.role,
        }
    }
}

/// Issued on sign-in. `token` is shown once and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthenticatedUser,
}

// ── Password hashing ───────────────────────────────────────

/// `pbkdf2-sha256$<iterations>$<salt>$<hash>`, salt and hash base64.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LENGTH] = rand::random();
    let hash = derive(password, &salt, PBKDF2_ITERATIONS);
    format!(
        "{HASH_SCHEME}${PBKDF2_ITERATIONS}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    )
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, iterations, salt, hash] = parts.as_slice() else {
        return false;
    };
    if *scheme != HASH_SCHEME {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        STANDARD_NO_PAD.decode(salt),
        STANDARD_NO_PAD.decode(hash),
    ) else {
        return false;
    };
    let actual = derive(password, &salt, iterations);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

// ── Tokens ─────────────────────────────────────────────────

/// Random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a bearer token for storage and lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

// ── Accounts ───────────────────────────────────────────────

/// Create an account. The very first account becomes an admin; later
/// self sign-ups are consultants until an admin promotes them.
pub fn sign_up(conn: &Connection, input: &SignUp) -> Result<UserProfile, AuthError> {
    let role = if db::count_users(conn)? == 0 {
        UserRole::Admin
    } else {
        UserRole::Consultant
    };
    create_user(conn, input, role)
}

/// Create an account with an explicit role (admin user management).
pub fn create_user(conn: &Connection, input: &SignUp, role: UserRole) -> Result<UserProfile, AuthError> {
    validate_sign_up(&input.email, &input.full_name, &input.password).map_err(AuthError::Validation)?;

    if db::get_user_credentials(conn, &input.email)?.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let user = UserProfile {
        id: Uuid::new_v4(),
        email: input.email.trim().to_lowercase(),
        full_name: input.full_name.trim().to_string(),
        role,
        avatar_path: None,
        active: true,
        created_at: Utc::now(),
    };
    db::insert_user(conn, &user, &hash_password(&input.password))?;
    tracing::info!(user_id = %user.id, role = %role, "Account created");
    Ok(user)
}

pub fn sign_in(
    conn: &Connection,
    email: &str,
    password: &str,
    ttl: Duration,
) -> Result<SessionToken, AuthError> {
    let Some((user, stored_hash)) = db::get_user_credentials(conn, email)? else {
        return Err(AuthError::InvalidCredentials);
    };
    if !user.active || !verify_password(password, &stored_hash) {
        tracing::warn!(email = %email.trim().to_lowercase(), "Sign-in rejected");
        return Err(AuthError::InvalidCredentials);
    }

    let now = Utc::now();
    db::purge_expired_sessions(conn, now)?;

    let token = generate_token();
    let session = StoredSession {
        token_hash: hash_token(&token),
        user_id: user.id,
        created_at: now,
        expires_at: now + ttl,
    };
    db::insert_session(conn, &session)?;

    Ok(SessionToken {
        token,
        expires_at: session.expires_at,
        user: AuthenticatedUser::from(&user),
    })
}

/// Returns whether a session was open for this token.
pub fn sign_out(conn: &Connection, token: &str) -> Result<bool, AuthError> {
    Ok(db::delete_session(conn, &hash_token(token))?)
}

pub fn resolve_session(
    conn: &Connection,
    token: &str,
    now: DateTime<Utc>,
) -> Result<AuthenticatedUser, AuthError> {
    let token_hash = hash_token(token);
    let session = db::get_session(conn, &token_hash)?.ok_or(AuthError::InvalidSession)?;
    if session.expires_at <= now {
        db::delete_session(conn, &token_hash)?;
        return Err(AuthError::SessionExpired);
    }
    let user = db::get_user(conn, &session.user_id)?
        .filter(|u| u.active)
        .ok_or(AuthError::InvalidSession)?;
    Ok(AuthenticatedUser::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn input(email: &str) -> SignUp {
        SignUp {
            email: email.into(),
            full_name: "Marina Costa".into(),
            password: "catarata2026".into(),
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let stored = hash_password("catarata2026");
        assert!(stored.starts_with("pbkdf2-sha256$"));
        assert!(verify_password("catarata2026", &stored));
        assert!(!verify_password("catarata2027", &stored));
    }

    #[test]
    fn same_password_gets_different_salt() {
        assert_ne!(hash_password("catarata2026"), hash_password("catarata2026"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$abc$def"));
        assert!(!verify_password("x", "pbkdf2-sha256$many$abc$def"));
    }

    #[test]
    fn first_account_is_admin_then_consultants() {
        let conn = open_memory_database().unwrap();
        let first = sign_up(&conn, &input("Marina@Clinica.com")).unwrap();
        let second = sign_up(&conn, &input("rui@clinica.com")).unwrap();
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(first.email, "marina@clinica.com");
        assert_eq!(second.role, UserRole::Consultant);
    }

    #[test]
    fn duplicate_email_is_taken() {
        let conn = open_memory_database().unwrap();
        sign_up(&conn, &input("marina@clinica.com")).unwrap();
        let err = sign_up(&conn, &input("MARINA@clinica.com")).unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[test]
    fn weak_sign_up_reports_fields() {
        let conn = open_memory_database().unwrap();
        let err = sign_up(
            &conn,
            &SignUp { email: "x".into(), full_name: "".into(), password: "123".into() },
        )
        .unwrap_err();
        match err {
            AuthError::Validation(fields) => assert_eq!(fields.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(db::count_users(&conn).unwrap(), 0);
    }

    #[test]
    fn sign_in_then_resolve_then_sign_out() {
        let conn = open_memory_database().unwrap();
        let user = sign_up(&conn, &input("marina@clinica.com")).unwrap();

        let session = sign_in(&conn, "marina@clinica.com", "catarata2026", Duration::hours(1)).unwrap();
        let resolved = resolve_session(&conn, &session.token, Utc::now()).unwrap();
        assert_eq!(resolved.id, user.id);
        assert!(resolved.is_admin());

        assert!(sign_out(&conn, &session.token).unwrap());
        assert!(matches!(
            resolve_session(&conn, &session.token, Utc::now()),
            Err(AuthError::InvalidSession)
        ));
    }

    #[test]
    fn wrong_password_and_unknown_email_look_the_same() {
        let conn = open_memory_database().unwrap();
        sign_up(&conn, &input("marina@clinica.com")).unwrap();
        let a = sign_in(&conn, "marina@clinica.com", "wrong-pass", Duration::hours(1)).unwrap_err();
        let b = sign_in(&conn, "nobody@clinica.com", "catarata2026", Duration::hours(1)).unwrap_err();
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn expired_session_is_rejected_and_removed() {
        let conn = open_memory_database().unwrap();
        sign_up(&conn, &input("marina@clinica.com")).unwrap();
        let session = sign_in(&conn, "marina@clinica.com", "catarata2026", Duration::hours(1)).unwrap();

        let later = Utc::now() + Duration::hours(2);
        assert!(matches!(
            resolve_session(&conn, &session.token, later),
            Err(AuthError::SessionExpired)
        ));
        assert!(db::get_session(&conn, &hash_token(&session.token)).unwrap().is_none());
    }

    #[test]
    fn deactivated_user_loses_session() {
        let conn = open_memory_database().unwrap();
        let mut user = sign_up(&conn, &input("marina@clinica.com")).unwrap();
        let session = sign_in(&conn, "marina@clinica.com", "catarata2026", Duration::hours(1)).unwrap();

        user.active = false;
        db::update_user(&conn, &user).unwrap();

        assert!(matches!(
            resolve_session(&conn, &session.token, Utc::now()),
            Err(AuthError::InvalidSession)
        ));
    }

    #[test]
    fn token_hash_is_stable_and_not_the_token() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }
}
