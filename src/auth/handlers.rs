use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest,
            SettingsRequest, SettingsResponse,
        },
        repo::User,
        services::{
            check_new_password, hash_password, is_valid_email, normalize_email, verify_password,
            AuthUser, JwtKeys,
        },
    },
    error::{ApiError, ApiResult},
    extract::ApiJson,
    state::AppState,
    warranties::repo as warranty_repo,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/settings", get(get_settings).put(update_settings))
}

fn public(user: User) -> PublicUser {
    PublicUser {
        id: user.id,
        email: user.email,
        created_at: user.created_at,
    }
}

fn issue_tokens(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: public(user),
    })
}

async fn load_user(state: &AppState, user_id: Uuid) -> ApiResult<User> {
    User::find_by_id(&state.db, user_id).await?.ok_or_else(|| {
        warn!(%user_id, "token subject no longer exists");
        ApiError::unauthorized("User not found")
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ApiError::validation("Invalid email address."));
    }
    check_new_password(&payload.password, Some(payload.confirm_password.as_str()))?;

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(ApiError::conflict("Email already registered."));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &email, &hash).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = normalize_email(&payload.email);
    let invalid = || ApiError::unauthorized("Invalid email or password.");

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(%email, "login unknown email");
        return Err(invalid());
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;
    let user = load_user(&state, claims.sub).await?;
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let user = load_user(&state, user_id).await?;
    Ok(Json(public(user)))
}

#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<SettingsResponse>> {
    let user = load_user(&state, user_id).await?;
    let total_products = warranty_repo::count_by_user(&state.db, user_id).await?;
    Ok(Json(SettingsResponse {
        account_age_days: account_age_days(user.created_at, OffsetDateTime::now_utc()),
        email: user.email,
        total_products,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<SettingsRequest>,
) -> ApiResult<Json<SettingsResponse>> {
    let user = load_user(&state, user_id).await?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(%user_id, "settings change with wrong current password");
        return Err(ApiError::unauthorized("Current password is incorrect."));
    }

    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email address."));
    }
    if email != user.email {
        if let Some(other) = User::find_by_email(&state.db, &email).await? {
            if other.id != user.id {
                return Err(ApiError::conflict("Email address is already in use."));
            }
        }
    }

    let password_hash = match payload.new_password.as_deref().filter(|p| !p.is_empty()) {
        Some(new_password) => {
            check_new_password(new_password, payload.confirm_password.as_deref())?;
            hash_password(new_password)?
        }
        None => user.password_hash.clone(),
    };

    let updated = User::update_credentials(&state.db, user.id, &email, &password_hash).await?;
    let total_products = warranty_repo::count_by_user(&state.db, user_id).await?;
    info!(%user_id, email_changed = updated.email != user.email, "settings updated");

    Ok(Json(SettingsResponse {
        account_age_days: account_age_days(updated.created_at, OffsetDateTime::now_utc()),
        email: updated.email,
        total_products,
    }))
}

fn account_age_days(created_at: OffsetDateTime, now: OffsetDateTime) -> i64 {
    (now - created_at).whole_days().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn public_user_serialization_omits_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: datetime!(2025-01-02 03:04:05 UTC),
        };
        let json = serde_json::to_string(&public(user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("2025-01-02T03:04:05Z"));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn account_age_counts_whole_days() {
        let created = datetime!(2025-01-01 12:00 UTC);
        assert_eq!(account_age_days(created, datetime!(2025-01-11 11:59 UTC)), 9);
        assert_eq!(account_age_days(created, datetime!(2025-01-11 12:00 UTC)), 10);
        assert_eq!(account_age_days(created, datetime!(2024-12-31 00:00 UTC)), 0);
    }

    #[tokio::test]
    async fn issued_tokens_verify_for_the_same_user() {
        let state = AppState::fake();
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.io".into(),
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        let id = user.id;
        let resp = issue_tokens(&state, user).unwrap();
        let keys = JwtKeys::from_ref(&state);
        assert_eq!(keys.verify(&resp.access_token).unwrap().sub, id);
        assert_eq!(keys.verify_refresh(&resp.refresh_token).unwrap().sub, id);
        assert_eq!(resp.user.id, id);
    }
}
