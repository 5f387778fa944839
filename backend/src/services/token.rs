//! Token minting and verification
//!
//! Access tokens carry the user's resolved roles so that guards can run
//! without a database round-trip. Refresh tokens are opaque random strings
//! stored hashed. Password-reset tokens are short-lived JWTs with a
//! `password_reset` purpose claim.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::{Role, UserType};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};

pub const RESET_PURPOSE: &str = "password_reset";

/// JWT claims of an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub user_type: UserType,
    pub roles: Vec<Role>,
    pub exp: i64,
    pub iat: i64,
}

/// JWT claims of a password-reset token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: String,
    pub purpose: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// Signs and verifies the tokens handed to clients
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
    reset_token_expiry: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
            reset_token_expiry: config.reset_token_expiry,
        }
    }

    pub fn access_token_expiry(&self) -> i64 {
        self.access_token_expiry
    }

    pub fn refresh_token_expiry(&self) -> i64 {
        self.refresh_token_expiry
    }

    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        user_type: UserType,
        roles: &[Role],
    ) -> AppResult<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            user_type,
            roles: roles.to_vec(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };
        self.encode(&claims)
    }

    pub fn decode_access(&self, token: &str) -> AppResult<AccessClaims> {
        self.decode(token)
    }

    /// Mint a reset token, returning it with its expiry instant
    pub fn issue_reset_token(&self, user_id: Uuid) -> AppResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.reset_token_expiry);
        let claims = ResetClaims {
            sub: user_id.to_string(),
            purpose: RESET_PURPOSE.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        Ok((self.encode(&claims)?, expires_at))
    }

    pub fn decode_reset(&self, token: &str) -> AppResult<ResetClaims> {
        let claims: ResetClaims = self.decode(token)?;
        if claims.purpose != RESET_PURPOSE {
            return Err(AppError::InvalidToken);
        }
        Ok(claims)
    }

    /// Opaque refresh token (simple random token)
    pub fn new_refresh_token() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    /// Hash a token for storage
    pub fn hash_token(token: &str) -> String {
        format!("{:x}", Sha256::digest(token.as_bytes()))
    }

    fn encode<T: Serialize>(&self, claims: &T) -> AppResult<String> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, token: &str) -> AppResult<T> {
        decode::<T>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{default_role, RoleName};

    fn service() -> TokenService {
        TokenService::new(&JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 3600,
            reset_token_expiry: 3600,
        })
    }

    #[test]
    fn test_access_token_round_trip_keeps_roles() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let roles = vec![default_role(RoleName::FirstClassOfficer)];
        let token = svc
            .issue_access_token(user_id, UserType::Staff, &roles)
            .unwrap();
        let claims = svc.decode_access(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.user_type, UserType::Staff);
        assert_eq!(claims.roles, roles);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = service()
            .issue_access_token(Uuid::new_v4(), UserType::Civilian, &[])
            .unwrap();
        let other = TokenService::new(&JwtConfig {
            secret: "another-secret".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 3600,
            reset_token_expiry: 3600,
        });
        assert!(matches!(other.decode_access(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_reports_expiry() {
        let svc = TokenService::new(&JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: -600,
            refresh_token_expiry: 3600,
            reset_token_expiry: 3600,
        });
        let token = svc
            .issue_access_token(Uuid::new_v4(), UserType::Staff, &[])
            .unwrap();
        assert!(matches!(svc.decode_access(&token), Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_reset_and_access_tokens_are_not_interchangeable() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let (reset, _) = svc.issue_reset_token(user_id).unwrap();
        let access = svc
            .issue_access_token(user_id, UserType::Staff, &[])
            .unwrap();
        assert!(svc.decode_access(&reset).is_err());
        assert!(svc.decode_reset(&access).is_err());
        assert_eq!(svc.decode_reset(&reset).unwrap().sub, user_id.to_string());
    }

    #[test]
    fn test_reset_tokens_are_unique() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let (a, _) = svc.issue_reset_token(user_id).unwrap();
        let (b, _) = svc.issue_reset_token(user_id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let h = TokenService::hash_token("abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, TokenService::hash_token("abc"));
        assert_ne!(h, TokenService::hash_token("abd"));
    }
}
