//! Authentication handlers for the staff and civilian portals

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use shared::{ApiResponse, Guard, Portal, CIVILIAN_PORTAL};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::auth::{
    AuthResponse, AuthSession, ForgotPasswordInput, LoginInput, RegisterCivilianInput,
    ResetPasswordInput, SessionUser,
};
use crate::services::user::{ProfileInput, UserView};
use crate::services::{AuthService, UserService};
use crate::AppState;

pub const REFRESH_COOKIE: &str = "refreshToken";
const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

fn refresh_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(config.cookie.secure)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .build()
}

fn expired_refresh_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(REFRESH_COOKIE, "");
    cookie.set_path(REFRESH_COOKIE_PATH);
    cookie
}

fn with_session(
    jar: CookieJar,
    session: AuthSession,
    config: &Config,
) -> (CookieJar, Json<ApiResponse<AuthResponse>>) {
    let jar = jar.add(refresh_cookie(session.refresh_token, config));
    (jar, Json(ApiResponse::ok("Login successful", session.response)))
}

/// Staff portal login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<LoginInput>,
) -> AppResult<(CookieJar, Json<ApiResponse<AuthResponse>>)> {
    let service = AuthService::new(state.db.clone(), &state.config);
    let session = service.login(Portal::Staff, input).await?;
    Ok(with_session(jar, session, &state.config))
}

/// Civilian portal login
pub async fn civilian_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<LoginInput>,
) -> AppResult<(CookieJar, Json<ApiResponse<AuthResponse>>)> {
    let service = AuthService::new(state.db.clone(), &state.config);
    let session = service.login(Portal::Civilian, input).await?;
    Ok(with_session(jar, session, &state.config))
}

pub async fn civilian_register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<RegisterCivilianInput>,
) -> AppResult<(StatusCode, CookieJar, Json<ApiResponse<AuthResponse>>)> {
    let service = AuthService::new(state.db.clone(), &state.config);
    let session = service.register_civilian(input).await?;
    let jar = jar.add(refresh_cookie(session.refresh_token, &state.config));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiResponse::ok("Registration successful", session.response)),
    ))
}

/// Rotate the refresh cookie and mint a new access token
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<ApiResponse<AuthResponse>>)> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("Refresh token missing".to_string()))?;

    let service = AuthService::new(state.db.clone(), &state.config);
    let session = service.refresh(&presented).await?;
    let jar = jar.add(refresh_cookie(session.refresh_token, &state.config));
    Ok((jar, Json(ApiResponse::ok("Token refreshed", session.response))))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<ApiResponse<()>>)> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        let service = AuthService::new(state.db.clone(), &state.config);
        service.logout(cookie.value()).await?;
    }
    let jar = jar.remove(expired_refresh_cookie());
    Ok((jar, Json(ApiResponse::message("Logged out"))))
}

/// Always answers the same way, whether or not the address is known
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordInput>,
) -> AppResult<Json<ApiResponse<()>>> {
    let service = AuthService::new(state.db.clone(), &state.config);
    service.forgot_password(input).await?;
    Ok(Json(ApiResponse::message(
        "If an account exists for this email, a reset link has been sent",
    )))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordInput>,
) -> AppResult<Json<ApiResponse<()>>> {
    let service = AuthService::new(state.db.clone(), &state.config);
    service.reset_password(input).await?;
    Ok(Json(ApiResponse::message("Password has been reset")))
}

pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<ApiResponse<SessionUser>>> {
    let service = AuthService::new(state.db.clone(), &state.config);
    let profile = service.me(user.user_id, user.user_type).await?;
    Ok(Json(ApiResponse::ok("Current user", profile)))
}

pub async fn get_civilian_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<ApiResponse<UserView>>> {
    user.authorize(&[Guard::Permission(CIVILIAN_PORTAL)])?;

    let profile = UserService::new(state.db.clone()).get_profile(user.user_id).await?;
    Ok(Json(ApiResponse::ok("Profile retrieved", profile)))
}

pub async fn update_civilian_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<ProfileInput>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    user.authorize(&[Guard::Permission(CIVILIAN_PORTAL)])?;

    let profile = UserService::new(state.db.clone())
        .update_profile(user.user_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Profile updated", profile)))
}
