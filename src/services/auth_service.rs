use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;

use crate::{
    dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest, UserDto},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
    store::NewUser,
};

pub const TOKEN_TTL_HOURS: i64 = 24;

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<UserDto>> {
    let name = payload.name.trim().to_string();
    let email = payload.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(AppError::InvalidArgument("name must not be empty".into()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::InvalidArgument("a valid email is required".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::InvalidArgument("password must not be empty".into()));
    }

    if state.users.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::InvalidArgument("email already registered".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .users
        .create_user(NewUser {
            name,
            email,
            password_hash,
            role: "user".into(),
        })
        .await?;

    Ok(ApiResponse::success(
        "Signup successful",
        UserDto::from(&user),
        None,
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();

    // Same rejection for unknown email and wrong password; logins must not
    // disclose which accounts exist.
    let user = state
        .users
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid email or password".into()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("stored password hash is invalid")))?;
    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthorized("invalid email or password".into()));
    }

    let token = issue_token(state, &user)?;
    Ok(ApiResponse::success(
        "Login successful",
        LoginResponse {
            token,
            user: UserDto::from(&user),
        },
        Some(Meta::empty()),
    ))
}

pub async fn current_user(state: &AppState, auth: &AuthUser) -> AppResult<ApiResponse<UserDto>> {
    let user = state
        .users
        .find_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("user no longer exists".into()))?;
    Ok(ApiResponse::success("OK", UserDto::from(&user), None))
}

pub fn issue_token(state: &AppState, user: &User) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to compute token expiry")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    Ok(token)
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}
