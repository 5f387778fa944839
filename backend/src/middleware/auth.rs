//! Authentication middleware
//!
//! JWT authentication and role/permission guard evaluation

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use shared::{
    evaluate_guards, has_permission, resolve_permissions, role_names, user_level, Guard,
    PermissionSet, Role, RoleName, UserAccessTier, UserType,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorResponse};
use crate::services::token::{AccessClaims, TokenService};
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub user_type: UserType,
    pub roles: Vec<Role>,
    pub permissions: PermissionSet,
}

impl AuthUser {
    pub fn new(user_id: Uuid, user_type: UserType, roles: Vec<Role>) -> Self {
        let permissions = resolve_permissions(&roles);
        Self {
            user_id,
            user_type,
            roles,
            permissions,
        }
    }

    pub fn from_claims(claims: AccessClaims) -> AppResult<Self> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
        Ok(Self::new(user_id, claims.user_type, claims.roles))
    }

    /// Check if user has a specific permission
    pub fn has_permission(&self, permission: &str) -> bool {
        has_permission(&self.permissions, permission)
    }

    /// Highest role level held
    pub fn level(&self) -> i32 {
        user_level(&self.roles)
    }

    pub fn role_names(&self) -> Vec<RoleName> {
        role_names(&self.roles)
    }

    pub fn access_tier(&self) -> UserAccessTier {
        UserAccessTier::for_roles(&self.roles)
    }

    /// Run a chain of guards; the first failing guard yields 403
    pub fn authorize(&self, guards: &[Guard]) -> AppResult<()> {
        evaluate_guards(guards, &self.roles, &self.permissions).map_err(|guard| {
            tracing::warn!(user_id = %self.user_id, "Forbidden: {}", guard);
            AppError::Forbidden(guard.to_string())
        })
    }
}

/// Authentication middleware that validates JWT tokens.
///
/// The decoded user is stored in the request extensions for [`CurrentUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return unauthorized_response("Missing or invalid Authorization header");
    };

    let tokens = TokenService::new(&state.config.jwt);
    let auth_user = match tokens
        .decode_access(bearer.token())
        .and_then(AuthUser::from_claims)
    {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("UNAUTHORIZED", message)),
    )
        .into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}
