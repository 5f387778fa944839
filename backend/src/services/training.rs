//! Training session scheduling

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use shared::{validate_time_window, PaginatedData, Pagination};

#[derive(Clone)]
pub struct TrainingService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TrainingSession {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub instructor_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub attendee_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const SESSION_SELECT: &str = r#"
    SELECT s.id, s.title, s.description, s.location, s.starts_at, s.ends_at, s.capacity,
           s.instructor_id, s.created_by,
           (SELECT COUNT(*) FROM attendance a WHERE a.session_id = s.id) AS attendee_count,
           s.created_at, s.updated_at
    FROM training_sessions s
"#;

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub upcoming: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: Option<i32>,
    pub instructor_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateSessionInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: Option<i32>,
    pub instructor_id: Option<Uuid>,
}

fn check_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> AppResult<()> {
    validate_time_window(starts_at, ends_at).map_err(|m| AppError::validation("ends_at", m))
}

impl TrainingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, query: SessionQuery) -> AppResult<PaginatedData<TrainingSession>> {
        let pagination = Pagination {
            page: query.page.unwrap_or(1),
            limit: query.limit.unwrap_or(20),
        };
        let upcoming = query.upcoming.unwrap_or(false);

        let filter = r#"
            WHERE ($1::timestamptz IS NULL OR s.starts_at >= $1)
              AND ($2::timestamptz IS NULL OR s.starts_at < $2)
              AND (NOT $3 OR s.ends_at > NOW())
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM training_sessions s {filter}"
        ))
        .bind(query.from)
        .bind(query.to)
        .bind(upcoming)
        .fetch_one(&self.db)
        .await?;

        let items = sqlx::query_as::<_, TrainingSession>(&format!(
            "{SESSION_SELECT} {filter} ORDER BY s.starts_at LIMIT $4 OFFSET $5"
        ))
        .bind(query.from)
        .bind(query.to)
        .bind(upcoming)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedData {
            items,
            pagination: pagination.meta(total),
        })
    }

    pub async fn get(&self, session_id: Uuid) -> AppResult<TrainingSession> {
        sqlx::query_as::<_, TrainingSession>(&format!("{SESSION_SELECT} WHERE s.id = $1"))
            .bind(session_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Training session".to_string()))
    }

    pub async fn create(&self, user_id: Uuid, input: CreateSessionInput) -> AppResult<TrainingSession> {
        input.validate()?;
        check_window(input.starts_at, input.ends_at)?;

        let session_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO training_sessions (
                title, description, location, starts_at, ends_at, capacity, instructor_id, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(&input.location)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.capacity)
        .bind(input.instructor_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(session_id = %session_id, "Training session scheduled");
        self.get(session_id).await
    }

    pub async fn update(&self, session_id: Uuid, input: UpdateSessionInput) -> AppResult<TrainingSession> {
        input.validate()?;

        let current = self.get(session_id).await?;
        let starts_at = input.starts_at.unwrap_or(current.starts_at);
        let ends_at = input.ends_at.unwrap_or(current.ends_at);
        check_window(starts_at, ends_at)?;

        if let Some(capacity) = input.capacity {
            if i64::from(capacity) < current.attendee_count {
                return Err(AppError::validation(
                    "capacity",
                    format!(
                        "Capacity cannot be lower than the {} recorded attendees",
                        current.attendee_count
                    ),
                ));
            }
        }

        sqlx::query(
            r#"
            UPDATE training_sessions SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                location = COALESCE($4, location),
                starts_at = $5,
                ends_at = $6,
                capacity = COALESCE($7, capacity),
                instructor_id = COALESCE($8, instructor_id),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(input.title.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(&input.location)
        .bind(starts_at)
        .bind(ends_at)
        .bind(input.capacity)
        .bind(input.instructor_id)
        .execute(&self.db)
        .await?;

        self.get(session_id).await
    }

    pub async fn delete(&self, session_id: Uuid) -> AppResult<()> {
        let deleted = sqlx::query("DELETE FROM training_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.db)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound("Training session".to_string()));
        }
        tracing::info!(session_id = %session_id, "Training session deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_window_must_end_after_start() {
        let start = Utc::now();
        assert!(check_window(start, start + Duration::hours(2)).is_ok());
        assert!(matches!(
            check_window(start, start),
            Err(AppError::Validation { field, .. }) if field == "ends_at"
        ));
    }
}
