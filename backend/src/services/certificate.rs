//! Certificates issued to members, optionally tied to an attended session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::{PaginatedData, Pagination, CERTIFICATE_MANAGEMENT};

#[derive(Clone)]
pub struct CertificateService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Certificate {
    pub id: Uuid,
    pub certificate_number: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub session_id: Option<Uuid>,
    pub session_title: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

const CERTIFICATE_SELECT: &str = r#"
    SELECT c.id, c.certificate_number, c.user_id,
           (u.first_name || ' ' || u.last_name) AS user_name,
           c.session_id, s.title AS session_title, c.title, c.description,
           c.issued_at, c.expires_at, c.issued_by, c.created_at
    FROM certificates c
    JOIN users u ON u.id = c.user_id
    LEFT JOIN training_sessions s ON s.id = c.session_id
"#;

#[derive(Debug, Default, Deserialize)]
pub struct CertificateQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub user_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IssueCertificateInput {
    #[validate(length(min = 3, max = 50))]
    pub certificate_number: Option<String>,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// `FD-<year>-<8 hex>`
fn generate_number(issued_at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("FD-{}-{}", issued_at.format("%Y"), suffix[..8].to_uppercase())
}

impl CertificateService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn issue(&self, issuer_id: Uuid, input: IssueCertificateInput) -> AppResult<Certificate> {
        input.validate()?;

        let issued_at = input.issued_at.unwrap_or_else(Utc::now);
        if matches!(input.expires_at, Some(expiry) if expiry <= issued_at) {
            return Err(AppError::validation(
                "expires_at",
                "Expiry must be after the issue date",
            ));
        }

        let user_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(input.user_id)
                .fetch_one(&self.db)
                .await?;
        if !user_exists {
            return Err(AppError::NotFound("User".to_string()));
        }

        if let Some(session_id) = input.session_id {
            let attended = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM attendance WHERE session_id = $1 AND user_id = $2)",
            )
            .bind(session_id)
            .bind(input.user_id)
            .fetch_one(&self.db)
            .await?;
            if !attended {
                return Err(AppError::BadRequest(
                    "User has no recorded attendance for this training session".to_string(),
                ));
            }
        }

        let number = match &input.certificate_number {
            Some(n) => n.trim().to_uppercase(),
            None => generate_number(issued_at),
        };
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM certificates WHERE certificate_number = $1)",
        )
        .bind(&number)
        .fetch_one(&self.db)
        .await?;
        if taken {
            return Err(AppError::DuplicateEntry("certificate number".to_string()));
        }

        let certificate_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO certificates (
                certificate_number, user_id, session_id, title, description,
                issued_at, expires_at, issued_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&number)
        .bind(input.user_id)
        .bind(input.session_id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(issued_at)
        .bind(input.expires_at)
        .bind(issuer_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(certificate = %number, user_id = %input.user_id, "Certificate issued");
        self.fetch(certificate_id).await
    }

    pub async fn list(&self, query: CertificateQuery) -> AppResult<PaginatedData<Certificate>> {
        let pagination = Pagination {
            page: query.page.unwrap_or(1),
            limit: query.limit.unwrap_or(20),
        };
        let filter = r#"
            WHERE ($1::uuid IS NULL OR c.user_id = $1)
              AND ($2::uuid IS NULL OR c.session_id = $2)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM certificates c {filter}"))
            .bind(query.user_id)
            .bind(query.session_id)
            .fetch_one(&self.db)
            .await?;

        let items = sqlx::query_as::<_, Certificate>(&format!(
            "{CERTIFICATE_SELECT} {filter} ORDER BY c.issued_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(query.user_id)
        .bind(query.session_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedData {
            items,
            pagination: pagination.meta(total),
        })
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Certificate>> {
        let items = sqlx::query_as::<_, Certificate>(&format!(
            "{CERTIFICATE_SELECT} WHERE c.user_id = $1 ORDER BY c.issued_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(items)
    }

    /// Owners see their own certificates; managers see all
    pub async fn get(&self, requester: &AuthUser, certificate_id: Uuid) -> AppResult<Certificate> {
        let certificate = self.fetch(certificate_id).await?;
        if certificate.user_id != requester.user_id && !requester.has_permission(CERTIFICATE_MANAGEMENT) {
            return Err(AppError::Forbidden(
                "You can only view your own certificates".to_string(),
            ));
        }
        Ok(certificate)
    }

    pub async fn delete(&self, certificate_id: Uuid) -> AppResult<()> {
        let deleted = sqlx::query("DELETE FROM certificates WHERE id = $1")
            .bind(certificate_id)
            .execute(&self.db)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound("Certificate".to_string()));
        }
        tracing::info!(certificate_id = %certificate_id, "Certificate revoked");
        Ok(())
    }

    async fn fetch(&self, certificate_id: Uuid) -> AppResult<Certificate> {
        sqlx::query_as::<_, Certificate>(&format!("{CERTIFICATE_SELECT} WHERE c.id = $1"))
            .bind(certificate_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Certificate".to_string()))
    }
}
