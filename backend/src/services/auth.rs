//! Authentication service: staff and civilian login, refresh-token rotation
//! and password reset

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::role::{role_ids_by_name, roles_for_user};
use crate::services::token::TokenService;
use shared::{
    resolve_permissions, role_names, user_level, validate_password, PermissionSet, Portal, Role,
    RoleName, UserType,
};

const RESET_REJECTED: &str = "Invalid or expired reset token";

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    tokens: TokenService,
    frontend_url: String,
    log_reset_links: bool,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Civilian self-registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterCivilianInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordInput {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    pub password: String,
}

/// The authenticated principal as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub roles: Vec<Role>,
    pub permissions: PermissionSet,
    pub level: i32,
}

/// Body of a successful login or refresh
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: SessionUser,
}

/// Login result; the refresh token travels in a cookie, never in the body
#[derive(Debug)]
pub struct AuthSession {
    pub response: AuthResponse,
    pub refresh_token: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    is_active: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct RefreshRow {
    id: Uuid,
    user_id: Uuid,
    user_type: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ResetRow {
    reset_password_token: Option<String>,
    reset_password_expires: Option<DateTime<Utc>>,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            tokens: TokenService::new(&config.jwt),
            frontend_url: config.frontend.url.clone(),
            log_reset_links: config.is_development(),
        }
    }

    /// Credential check followed by the portal gate
    pub async fn login(&self, portal: Portal, input: LoginInput) -> AppResult<AuthSession> {
        input.validate()?;

        let user = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, is_active
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(input.email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        let valid = verify(&input.password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        // Account state is only revealed to someone who knows the password
        if !user.is_active {
            return Err(AppError::Unauthorized("Account is deactivated".to_string()));
        }

        let roles = roles_for_user(&self.db, user.id).await?;
        if let Err(rejection) = portal.admits(&role_names(&roles)) {
            tracing::warn!(user_id = %user.id, ?portal, "Login rejected at wrong portal");
            return Err(rejection.into());
        }

        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id = %user.id, ?portal, "User logged in");
        self.open_session(user, portal.user_type(), roles).await
    }

    /// Create an account holding only the civilian role, then sign it in
    pub async fn register_civilian(&self, input: RegisterCivilianInput) -> AppResult<AuthSession> {
        input.validate()?;
        validate_password(&input.password).map_err(|m| AppError::validation("password", m))?;
        if let Some(phone) = &input.phone {
            shared::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }

        let email = input.email.trim().to_lowercase();
        let taken = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&email)
            .fetch_one(&self.db)
            .await?;
        if taken {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, CredentialRow>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, first_name, last_name, is_active
            "#,
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(&input.phone)
        .fetch_one(&mut *tx)
        .await?;

        let role_ids = role_ids_by_name(&mut *tx, &[RoleName::Civilian]).await?;
        for role_id in role_ids {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(user.id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }

        let roles = roles_for_user(&mut *tx, user.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Civilian account registered");
        self.open_session(user, UserType::Civilian, roles).await
    }

    /// Exchange a refresh token for a new access token, rotating the refresh
    /// token and re-reading the user's roles
    pub async fn refresh(&self, presented: &str) -> AppResult<AuthSession> {
        let token_hash = TokenService::hash_token(presented);

        let stored = sqlx::query_as::<_, RefreshRow>(
            r#"
            SELECT id, user_id, user_type
            FROM refresh_tokens
            WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidToken)?;

        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(stored.id)
        .execute(&self.db)
        .await?;
        if revoked.rows_affected() == 0 {
            return Err(AppError::InvalidToken);
        }

        let user = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, email, password_hash, first_name, last_name, is_active FROM users WHERE id = $1",
        )
        .bind(stored.user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidToken)?;
        if !user.is_active {
            return Err(AppError::Unauthorized("Account is deactivated".to_string()));
        }

        let (portal, user_type) = match stored.user_type.as_str() {
            "civilian" => (Portal::Civilian, UserType::Civilian),
            _ => (Portal::Staff, UserType::Staff),
        };
        let roles = roles_for_user(&self.db, user.id).await?;
        portal.admits(&role_names(&roles))?;

        self.open_session(user, user_type, roles).await
    }

    /// Revoke the presented refresh token; unknown tokens are ignored
    pub async fn logout(&self, presented: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(TokenService::hash_token(presented))
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Issue a reset token for the account, if there is one.
    ///
    /// Succeeds for unknown addresses too so callers cannot probe for accounts.
    pub async fn forgot_password(&self, input: ForgotPasswordInput) -> AppResult<()> {
        input.validate()?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM users WHERE email = $1 AND is_active = TRUE",
        )
        .bind(input.email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await?;

        let Some(user_id) = user_id else {
            tracing::info!("Password reset requested for unknown address");
            return Ok(());
        };

        let (token, expires_at) = self.tokens.issue_reset_token(user_id)?;
        sqlx::query(
            r#"
            UPDATE users
            SET reset_password_token = $2, reset_password_expires = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        tracing::info!(user_id = %user_id, %expires_at, "Password reset token issued");
        if self.log_reset_links {
            tracing::info!(
                "Password reset link: {}/reset-password?token={}",
                self.frontend_url.trim_end_matches('/'),
                token
            );
        }
        Ok(())
    }

    /// Redeem a reset token. The stored copy is cleared, so a token works once.
    pub async fn reset_password(&self, input: ResetPasswordInput) -> AppResult<()> {
        input.validate()?;
        validate_password(&input.password).map_err(|m| AppError::validation("password", m))?;

        let claims = self
            .tokens
            .decode_reset(&input.token)
            .map_err(|_| AppError::BadRequest(RESET_REJECTED.to_string()))?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::BadRequest(RESET_REJECTED.to_string()))?;

        let stored = sqlx::query_as::<_, ResetRow>(
            "SELECT reset_password_token, reset_password_expires FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::BadRequest(RESET_REJECTED.to_string()))?;

        verify_reset_token(
            &input.token,
            stored.reset_password_token.as_deref(),
            stored.reset_password_expires,
            Utc::now(),
        )?;

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_password_token = NULL,
                reset_password_expires = NULL,
                updated_at = NOW()
            WHERE id = $1 AND reset_password_token = $3
            "#,
        )
        .bind(user_id)
        .bind(&password_hash)
        .bind(&input.token)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::BadRequest(RESET_REJECTED.to_string()));
        }

        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, "Password reset completed");
        Ok(())
    }

    /// Current profile of an authenticated user, with roles read fresh
    pub async fn me(&self, user_id: Uuid, user_type: UserType) -> AppResult<SessionUser> {
        let user = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, email, password_hash, first_name, last_name, is_active FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        let roles = roles_for_user(&self.db, user_id).await?;
        Ok(session_user(user, user_type, roles))
    }

    async fn open_session(
        &self,
        user: CredentialRow,
        user_type: UserType,
        roles: Vec<Role>,
    ) -> AppResult<AuthSession> {
        let access_token = self.tokens.issue_access_token(user.id, user_type, &roles)?;
        let refresh_token = TokenService::new_refresh_token();
        let expires_at = Utc::now() + Duration::seconds(self.tokens.refresh_token_expiry());

        let pruned = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE user_id = $1 AND (expires_at < NOW() OR revoked_at IS NOT NULL)
            "#,
        )
        .bind(user.id)
        .execute(&self.db)
        .await?
        .rows_affected();
        if pruned > 0 {
            tracing::debug!(user_id = %user.id, pruned, "Pruned stale refresh tokens");
        }

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, user_type, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id)
        .bind(TokenService::hash_token(&refresh_token))
        .bind(user_type.as_str())
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(AuthSession {
            response: AuthResponse {
                access_token,
                token_type: "Bearer".to_string(),
                expires_in: self.tokens.access_token_expiry(),
                user: session_user(user, user_type, roles),
            },
            refresh_token,
        })
    }
}

fn session_user(user: CredentialRow, user_type: UserType, roles: Vec<Role>) -> SessionUser {
    SessionUser {
        id: user.id,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        user_type,
        permissions: resolve_permissions(&roles),
        level: user_level(&roles),
        roles,
    }
}

/// Second check on a reset token whose signature already verified: it must
/// still be the one stored on the account, and the stored expiry must lie
/// ahead.
pub fn verify_reset_token(
    presented: &str,
    stored_token: Option<&str>,
    stored_expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    match (stored_token, stored_expiry) {
        (Some(token), Some(expiry)) if token == presented && expiry > now => Ok(()),
        _ => Err(AppError::BadRequest(RESET_REJECTED.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_stored_unexpired_token_is_accepted() {
        let now = Utc::now();
        assert_ok!(verify_reset_token("abc", Some("abc"), Some(now + Duration::minutes(30)), now));
    }

    #[test]
    fn test_mismatched_token_is_rejected() {
        let now = Utc::now();
        let result = verify_reset_token("abc", Some("xyz"), Some(now + Duration::minutes(30)), now);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let now = Utc::now();
        assert_err!(verify_reset_token("abc", Some("abc"), Some(now - Duration::seconds(1)), now));
        assert_err!(verify_reset_token("abc", Some("abc"), Some(now), now));
    }

    #[test]
    fn test_cleared_token_is_rejected() {
        let now = Utc::now();
        assert!(verify_reset_token("abc", None, None, now).is_err());
        assert!(verify_reset_token("abc", Some("abc"), None, now).is_err());
    }

    #[test]
    fn test_session_user_resolves_permissions() {
        let user = CredentialRow {
            id: Uuid::new_v4(),
            email: "a@b.co".into(),
            password_hash: String::new(),
            first_name: "A".into(),
            last_name: "B".into(),
            is_active: true,
        };
        let roles = vec![
            shared::default_role(RoleName::Firefighter),
            shared::default_role(RoleName::Volunteer),
        ];
        let session = session_user(user, UserType::Staff, roles);
        assert_eq!(session.level, 40);
        assert!(session.permissions.contains("inventory_view"));
        assert!(session.permissions.contains("training_attend"));
    }
}
