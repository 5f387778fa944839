//! Training attendance: QR check-in and manual entry
//!
//! A QR token is `base64url(session_id:expires_ts:nonce).base64url(hmac)`,
//! signed with HMAC-SHA256. Its hash is stored so a token must also have been
//! issued by this server and not yet expired.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::token::TokenService;
use shared::{clamp_qr_ttl, AttendanceMethod};

type HmacSha256 = Hmac<Sha256>;

const INVALID_QR: &str = "Invalid QR code";

/// Signs and checks attendance QR tokens
#[derive(Clone)]
pub struct QrSigner {
    secret: Vec<u8>,
}

/// What a verified QR token says
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl QrSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub fn sign(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> AppResult<String> {
        let payload = format!(
            "{}:{}:{}",
            session_id,
            expires_at.timestamp(),
            Uuid::new_v4().simple()
        );
        let encoded = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", encoded, signature))
    }

    /// Check signature and expiry, returning the embedded session
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> AppResult<QrPayload> {
        let invalid = || AppError::BadRequest(INVALID_QR.to_string());

        let (encoded, signature) = token.trim().split_once('.').ok_or_else(invalid)?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;

        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let payload = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| invalid())?;
        let payload = String::from_utf8(payload).map_err(|_| invalid())?;

        let mut parts = payload.splitn(3, ':');
        let session_id = parts
            .next()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(invalid)?;
        let expires_at = parts
            .next()
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .ok_or_else(invalid)?;
        if parts.next().map_or(true, str::is_empty) {
            return Err(invalid());
        }

        if expires_at <= now {
            return Err(AppError::BadRequest("QR code has expired".to_string()));
        }

        Ok(QrPayload {
            session_id,
            expires_at,
        })
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AppError::Internal("Failed to create HMAC".to_string()))
    }
}

#[derive(Clone)]
pub struct AttendanceService {
    db: PgPool,
    signer: QrSigner,
    default_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QrCode {
    pub token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub session_title: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub method: String,
    pub recorded_by: Option<Uuid>,
    pub checked_in_at: DateTime<Utc>,
}

const ATTENDANCE_SELECT: &str = r#"
    SELECT a.id, a.session_id, s.title AS session_title, a.user_id,
           (u.first_name || ' ' || u.last_name) AS user_name,
           a.method, a.recorded_by, a.checked_in_at
    FROM attendance a
    JOIN training_sessions s ON s.id = a.session_id
    JOIN users u ON u.id = a.user_id
"#;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateQrInput {
    pub ttl_minutes: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckInInput {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualAttendanceInput {
    pub user_id: Uuid,
}

#[derive(sqlx::FromRow)]
struct SessionWindow {
    ends_at: DateTime<Utc>,
    capacity: Option<i32>,
}

impl AttendanceService {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            signer: QrSigner::new(&config.qr.secret),
            default_ttl_minutes: config.qr.default_ttl_minutes,
        }
    }

    /// Mint a check-in token for a session that has not ended
    pub async fn generate_qr(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        input: GenerateQrInput,
    ) -> AppResult<QrCode> {
        let ends_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT ends_at FROM training_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Training session".to_string()))?;

        let now = Utc::now();
        if ends_at <= now {
            return Err(AppError::BadRequest("Training session has ended".to_string()));
        }

        let ttl = clamp_qr_ttl(input.ttl_minutes, self.default_ttl_minutes);
        let expires_at = now + Duration::minutes(ttl);
        let token = self.signer.sign(session_id, expires_at)?;

        let pruned = sqlx::query("DELETE FROM qr_tokens WHERE expires_at < NOW()")
            .execute(&self.db)
            .await?
            .rows_affected();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned expired attendance QR tokens");
        }

        sqlx::query(
            r#"
            INSERT INTO qr_tokens (session_id, token_hash, expires_at, created_by)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session_id)
        .bind(TokenService::hash_token(&token))
        .bind(expires_at)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        tracing::info!(session_id = %session_id, ttl_minutes = ttl, "Attendance QR issued");
        Ok(QrCode {
            token,
            session_id,
            expires_at,
        })
    }

    /// Record the caller's attendance from a scanned token
    pub async fn check_in(&self, user_id: Uuid, input: CheckInInput) -> AppResult<AttendanceRecord> {
        input.validate()?;
        let payload = self.signer.verify(&input.token, Utc::now())?;

        let mut tx = self.db.begin().await?;

        let issued = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM qr_tokens
                WHERE token_hash = $1 AND session_id = $2 AND expires_at > NOW()
            )
            "#,
        )
        .bind(TokenService::hash_token(input.token.trim()))
        .bind(payload.session_id)
        .fetch_one(&mut *tx)
        .await?;
        if !issued {
            return Err(AppError::BadRequest(INVALID_QR.to_string()));
        }

        let attendance_id = record_attendance(
            &mut tx,
            payload.session_id,
            user_id,
            AttendanceMethod::Qr,
            None,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(session_id = %payload.session_id, user_id = %user_id, "QR check-in");
        self.get(attendance_id).await
    }

    /// Officer-entered attendance for another user
    pub async fn record_manual(
        &self,
        recorder_id: Uuid,
        session_id: Uuid,
        input: ManualAttendanceInput,
    ) -> AppResult<AttendanceRecord> {
        let user_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(input.user_id)
                .fetch_one(&self.db)
                .await?;
        if !user_exists {
            return Err(AppError::NotFound("User".to_string()));
        }

        let mut tx = self.db.begin().await?;
        let attendance_id = record_attendance(
            &mut tx,
            session_id,
            input.user_id,
            AttendanceMethod::Manual,
            Some(recorder_id),
        )
        .await?;
        tx.commit().await?;

        self.get(attendance_id).await
    }

    pub async fn list_for_session(&self, session_id: Uuid) -> AppResult<Vec<AttendanceRecord>> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM training_sessions WHERE id = $1)")
                .bind(session_id)
                .fetch_one(&self.db)
                .await?;
        if !exists {
            return Err(AppError::NotFound("Training session".to_string()));
        }

        let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "{ATTENDANCE_SELECT} WHERE a.session_id = $1 ORDER BY a.checked_in_at"
        ))
        .bind(session_id)
        .fetch_all(&self.db)
        .await?;
        Ok(records)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "{ATTENDANCE_SELECT} WHERE a.user_id = $1 ORDER BY a.checked_in_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(records)
    }

    async fn get(&self, attendance_id: Uuid) -> AppResult<AttendanceRecord> {
        sqlx::query_as::<_, AttendanceRecord>(&format!("{ATTENDANCE_SELECT} WHERE a.id = $1"))
            .bind(attendance_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Attendance".to_string()))
    }
}

/// Insert one attendance row after the session, duplicate and capacity
/// checks. The session row stays locked until the caller commits.
async fn record_attendance(
    conn: &mut PgConnection,
    session_id: Uuid,
    user_id: Uuid,
    method: AttendanceMethod,
    recorded_by: Option<Uuid>,
) -> AppResult<Uuid> {
    let session = sqlx::query_as::<_, SessionWindow>(
        "SELECT ends_at, capacity FROM training_sessions WHERE id = $1 FOR UPDATE",
    )
    .bind(session_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Training session".to_string()))?;

    if method == AttendanceMethod::Qr && session.ends_at <= Utc::now() {
        return Err(AppError::BadRequest("Training session has ended".to_string()));
    }

    let already = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM attendance WHERE session_id = $1 AND user_id = $2)",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    if already {
        return Err(AppError::Conflict("Attendance already recorded".to_string()));
    }

    if let Some(capacity) = session.capacity {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(&mut *conn)
            .await?;
        if count >= i64::from(capacity) {
            return Err(AppError::BadRequest("Training session is full".to_string()));
        }
    }

    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO attendance (session_id, user_id, method, recorded_by)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(session_id)
    .bind(user_id)
    .bind(method.as_str())
    .bind(recorded_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> QrSigner {
        QrSigner::new("qr-test-secret")
    }

    #[test]
    fn test_signed_token_verifies() {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + Duration::minutes(15);
        let token = signer().sign(session_id, expires_at).unwrap();

        let payload = signer().verify(&token, now).unwrap();
        assert_eq!(payload.session_id, session_id);
        assert_eq!(payload.expires_at.timestamp(), expires_at.timestamp());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let now = Utc::now();
        let token = signer().sign(Uuid::new_v4(), now + Duration::minutes(1)).unwrap();
        let later = now + Duration::minutes(2);
        assert!(matches!(
            signer().verify(&token, later),
            Err(AppError::BadRequest(msg)) if msg.contains("expired")
        ));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let now = Utc::now();
        let token = signer().sign(Uuid::new_v4(), now + Duration::minutes(15)).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let forged_payload = format!("{}:{}:abc", Uuid::new_v4(), (now + Duration::hours(4)).timestamp());
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(forged_payload), signature);
        assert!(signer().verify(&forged, now).is_err());
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let now = Utc::now();
        let token = signer().sign(Uuid::new_v4(), now + Duration::minutes(15)).unwrap();
        let (payload, _) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", payload, URL_SAFE_NO_PAD.encode([0u8; 32]));
        assert!(signer().verify(&forged, now).is_err());
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let now = Utc::now();
        let token = QrSigner::new("other")
            .sign(Uuid::new_v4(), now + Duration::minutes(15))
            .unwrap();
        assert!(signer().verify(&token, now).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let now = Utc::now();
        assert!(signer().verify("", now).is_err());
        assert!(signer().verify("no-dot", now).is_err());
        assert!(signer().verify("!!!.???", now).is_err());
    }
}
