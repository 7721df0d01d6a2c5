//! User profile and admin user management endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::auth::{map_user_conflict, normalize_email, AdminUser, AuthUser};
use super::error::{ApiError, ApiResponse};
use super::validation::{validate_email, validate_name, validate_phone, validate_role};
use crate::db::{UpdateProfileRequest, UpdateUserRequest, User, UserResponse};
use crate::AppState;

async fn fetch_user(state: &AppState, id: &str) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Apply a partial update to a user row. Omitted fields keep prior values.
async fn apply_user_update(
    state: &AppState,
    user: &User,
    name: Option<&str>,
    email: Option<&str>,
    phone: Option<&str>,
    role: Option<&str>,
) -> Result<User, ApiError> {
    let name = match name {
        Some(n) => {
            validate_name(n).map_err(ApiError::validation)?;
            n.trim().to_string()
        }
        None => user.name.clone(),
    };
    let email = match email {
        Some(e) => {
            validate_email(e).map_err(ApiError::validation)?;
            normalize_email(e)
        }
        None => user.email.clone(),
    };
    let phone = match phone {
        Some(p) => {
            validate_phone(p).map_err(ApiError::validation)?;
            Some(p.trim().to_string())
        }
        None => user.phone.clone(),
    };
    let role = match role {
        Some(r) => {
            validate_role(r).map_err(ApiError::validation)?;
            r.to_string()
        }
        None => user.role.clone(),
    };

    sqlx::query(
        "UPDATE users SET name = ?, email = ?, phone = ?, role = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&email)
    .bind(&phone)
    .bind(&role)
    .bind(crate::utils::now_rfc3339())
    .bind(&user.id)
    .execute(&state.db)
    .await
    .map_err(map_user_conflict)?;

    fetch_user(state, &user.id).await
}

/// Get the caller's profile
///
/// GET /api/users/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = fetch_user(&state, &auth.id).await?;
    Ok(ApiResponse::ok(
        "User profile retrieved successfully",
        UserResponse::from(user),
    ))
}

/// Update the caller's profile
///
/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = fetch_user(&state, &auth.id).await?;
    let updated = apply_user_update(
        &state,
        &user,
        req.name.as_deref(),
        req.email.as_deref(),
        req.phone.as_deref(),
        None,
    )
    .await?;

    Ok(ApiResponse::ok(
        "Profile updated successfully",
        UserResponse::from(updated),
    ))
}

/// List all users
///
/// GET /api/users (admin)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(ApiResponse::ok(
        "Users retrieved successfully",
        users.into_iter().map(UserResponse::from).collect(),
    ))
}

/// Get a user by id
///
/// GET /api/users/:id (admin)
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = fetch_user(&state, &id).await?;
    Ok(ApiResponse::ok(
        "User retrieved successfully",
        UserResponse::from(user),
    ))
}

/// Update a user, optionally changing their role
///
/// PUT /api/users/:id (admin)
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = fetch_user(&state, &id).await?;
    let updated = apply_user_update(
        &state,
        &user,
        req.name.as_deref(),
        req.email.as_deref(),
        req.phone.as_deref(),
        req.role.as_deref(),
    )
    .await?;

    tracing::info!(user_id = %id, "User updated by admin");

    Ok(ApiResponse::ok(
        "User updated successfully",
        UserResponse::from(updated),
    ))
}

/// Delete a user
///
/// DELETE /api/users/:id (admin)
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user = fetch_user(&state, &id).await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&user.id)
        .execute(&state.db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.message().contains("FOREIGN KEY constraint failed") {
                    return ApiError::validation("User has existing orders and cannot be deleted");
                }
            }
            ApiError::from(e)
        })?;

    tracing::info!(user_id = %id, "User deleted by admin");

    Ok(ApiResponse::message("User deleted successfully"))
}
