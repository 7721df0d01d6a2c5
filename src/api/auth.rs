use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::request::Parts,
    http::StatusCode,
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ApiResponse};
use super::validation::{validate_email, validate_name, validate_password, validate_phone};
use crate::config::AuthConfig;
use crate::db::{AuthResponse, DbPool, LoginRequest, RegisterRequest, User, UserResponse};
use crate::AppState;

/// Claims carried by a signed session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Issue a signed session token for a user
pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(auth.token_ttl_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
}

/// Decode and verify a session token
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Emails are matched case-insensitively; normalize before every lookup
/// and write.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Authenticated caller, extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts).ok_or_else(|| ApiError::unauthorized("No token provided"))?;

        let claims = decode_token(&state.config.auth.jwt_secret, token)
            .map_err(|_| ApiError::unauthorized("Invalid token"))?;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// Authenticated caller with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

/// Insert a user row. Uniqueness of email/phone is enforced by the schema;
/// callers map the constraint violation to a conflict response.
pub(crate) async fn insert_user(
    pool: &DbPool,
    name: &str,
    email: &str,
    password_hash: &str,
    phone: Option<&str>,
    role: &str,
) -> Result<User, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = crate::utils::now_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, phone, role, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(phone)
    .bind(role)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await
}

/// Map a user-table unique violation onto the field that caused it.
pub(crate) fn map_user_conflict(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        let msg = db_err.message();
        if msg.contains("users.email") {
            return ApiError::conflict("Email already registered");
        }
        if msg.contains("users.phone") {
            return ApiError::conflict("Phone number already registered");
        }
    }
    ApiError::from(err)
}

/// Register a new customer account
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), ApiError> {
    validate_name(&req.name).map_err(ApiError::validation)?;
    validate_email(&req.email).map_err(ApiError::validation)?;
    validate_password(&req.password).map_err(ApiError::validation)?;
    if let Some(phone) = req.phone.as_deref() {
        validate_phone(phone.trim()).map_err(ApiError::validation)?;
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Registration failed. Please try again later.")
    })?;

    let email = normalize_email(&req.email);
    let user = insert_user(
        &state.db,
        req.name.trim(),
        &email,
        &password_hash,
        req.phone.as_deref().map(str::trim),
        "user",
    )
    .await
    .map_err(map_user_conflict)?;

    let token = issue_token(&state.config.auth, &user).map_err(|e| {
        tracing::error!("Failed to issue token: {}", e);
        ApiError::internal("Registration failed. Please try again later.")
    })?;

    tracing::info!(email = %user.email, "User registered");

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(
            "Registration successful",
            AuthResponse {
                user: UserResponse::from(user),
                token,
            },
        ),
    ))
}

/// Log in with email and password
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(normalize_email(&req.email))
        .fetch_optional(&state.db)
        .await?;

    // One error for both unknown email and wrong password, so the endpoint
    // cannot be used to enumerate accounts.
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = issue_token(&state.config.auth, &user).map_err(|e| {
        tracing::error!("Failed to issue token: {}", e);
        ApiError::internal("Login failed. Please try again later.")
    })?;

    Ok(ApiResponse::ok(
        "Login successful",
        AuthResponse {
            user: UserResponse::from(user),
            token,
        },
    ))
}

/// Ensure the configured admin account exists (runs at startup).
pub async fn ensure_admin_user(pool: &DbPool, auth: &AuthConfig) -> anyhow::Result<()> {
    let email = normalize_email(&auth.admin_email);
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    if existing.is_none() {
        let password_hash = hash_password(&auth.admin_password)
            .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;
        insert_user(pool, "Admin", &email, &password_hash, None, "admin").await?;
        tracing::info!(email = %email, "Created admin user");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    fn test_user() -> User {
        User {
            id: "u1".to_string(),
            name: "Budi".to_string(),
            email: "budi@example.com".to_string(),
            password_hash: String::new(),
            phone: None,
            role: "user".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("abc123").unwrap();
        assert_ne!(hash, "abc123");
        assert!(verify_password("abc123", &hash));
        assert!(!verify_password("abc124", &hash));
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("abc123", "not-a-hash"));
    }

    #[test]
    fn test_token_round_trip() {
        let auth = AuthConfig::default();
        let token = issue_token(&auth, &test_user()).unwrap();
        let claims = decode_token(&auth.jwt_secret, &token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email, "budi@example.com");
        assert_eq!(claims.role, "user");
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let auth = AuthConfig::default();
        let token = issue_token(&auth, &test_user()).unwrap();
        assert!(decode_token("some-other-secret", &token).is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Budi@Example.COM "), "budi@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::init(tmp.path()).await.unwrap();

        insert_user(&pool, "Budi", "budi@example.com", "h", None, "user")
            .await
            .unwrap();
        // Same address with different casing normalizes to the same row
        let err = insert_user(
            &pool,
            "Budi Again",
            &normalize_email("BUDI@example.com"),
            "h",
            None,
            "user",
        )
        .await
        .unwrap_err();

        let api_err = map_user_conflict(err);
        assert_eq!(api_err.code(), crate::api::error::ErrorCode::Conflict);
        assert_eq!(api_err.message(), "Email already registered");
    }

    #[tokio::test]
    async fn test_duplicate_phone_is_a_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::init(tmp.path()).await.unwrap();

        insert_user(
            &pool,
            "Budi",
            "budi@example.com",
            "h",
            Some("081234567890"),
            "user",
        )
        .await
        .unwrap();
        let err = insert_user(
            &pool,
            "Siti",
            "siti@example.com",
            "h",
            Some("081234567890"),
            "user",
        )
        .await
        .unwrap_err();

        let api_err = map_user_conflict(err);
        assert_eq!(api_err.code(), crate::api::error::ErrorCode::Conflict);
        assert_eq!(api_err.message(), "Phone number already registered");
    }

    #[tokio::test]
    async fn test_ensure_admin_user_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::init(tmp.path()).await.unwrap();
        let auth = AuthConfig::default();

        ensure_admin_user(&pool, &auth).await.unwrap();
        ensure_admin_user(&pool, &auth).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
