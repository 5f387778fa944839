//! Role catalogue service
//!
//! Roles are rows so an administrator can retune permissions and levels; the
//! role name itself is one of the fixed [`RoleName`] variants.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use shared::{is_known_permission, validate_role_level, Role, RoleName, UserAccessTier};

/// Role service for the role catalogue
#[derive(Clone)]
pub struct RoleService {
    db: PgPool,
}

/// Role row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RoleRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoleRecord {
    /// The resolved form carried in access tokens
    pub fn to_role(&self) -> AppResult<Role> {
        let name = RoleName::from_str(&self.name)
            .map_err(|e| AppError::Internal(format!("Stored role is invalid: {}", e)))?;
        Ok(Role {
            name,
            level: self.level,
            permissions: self.permissions.clone(),
        })
    }
}

/// Input for creating a role
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleInput {
    pub name: RoleName,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub level: i32,
}

/// Input for updating a role
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleInput {
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub level: Option<i32>,
}

const ROLE_COLUMNS: &str = "id, name, description, permissions, level, created_at, updated_at";

impl RoleService {
    /// Create a new RoleService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// All roles visible to the requester's tier, highest level first
    pub async fn list_roles(&self, tier: UserAccessTier) -> AppResult<Vec<RoleRecord>> {
        let hidden: Vec<String> = tier
            .hidden_roles()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();

        let roles = sqlx::query_as::<_, RoleRecord>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE NOT (name = ANY($1)) ORDER BY level DESC, name"
        ))
        .bind(&hidden)
        .fetch_all(&self.db)
        .await?;

        Ok(roles)
    }

    pub async fn get_role(&self, tier: UserAccessTier, role_id: Uuid) -> AppResult<RoleRecord> {
        let role = self.find(role_id).await?;
        let name = role.to_role()?.name;
        if !tier.can_see(&[name]) {
            return Err(AppError::NotFound("Role".to_string()));
        }
        Ok(role)
    }

    pub async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleRecord> {
        input.validate()?;
        check_level(input.level)?;
        check_permissions(&input.permissions)?;

        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM roles WHERE name = $1)")
            .bind(input.name.as_str())
            .fetch_one(&self.db)
            .await?;
        if exists {
            return Err(AppError::DuplicateEntry("role name".to_string()));
        }

        let role = sqlx::query_as::<_, RoleRecord>(&format!(
            r#"
            INSERT INTO roles (name, description, permissions, level)
            VALUES ($1, $2, $3, $4)
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(input.name.as_str())
        .bind(&input.description)
        .bind(&input.permissions)
        .bind(input.level)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(role = %role.name, "Role created");
        Ok(role)
    }

    pub async fn update_role(&self, role_id: Uuid, input: UpdateRoleInput) -> AppResult<RoleRecord> {
        input.validate()?;
        if let Some(level) = input.level {
            check_level(level)?;
        }
        if let Some(permissions) = &input.permissions {
            check_permissions(permissions)?;
        }

        let role = sqlx::query_as::<_, RoleRecord>(&format!(
            r#"
            UPDATE roles SET
                description = COALESCE($2, description),
                permissions = COALESCE($3, permissions),
                level = COALESCE($4, level),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(role_id)
        .bind(&input.description)
        .bind(&input.permissions)
        .bind(input.level)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Role".to_string()))?;

        tracing::info!(role = %role.name, "Role updated");
        Ok(role)
    }

    /// Delete a role no user holds any more
    pub async fn delete_role(&self, role_id: Uuid) -> AppResult<()> {
        let role = self.find(role_id).await?;

        let holders = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_one(&self.db)
            .await?;
        if holders > 0 {
            return Err(AppError::BadRequest(format!(
                "Role '{}' is still assigned to {} user(s)",
                role.name, holders
            )));
        }

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id)
            .execute(&self.db)
            .await?;

        tracing::info!(role = %role.name, "Role deleted");
        Ok(())
    }

    async fn find(&self, role_id: Uuid) -> AppResult<RoleRecord> {
        sqlx::query_as::<_, RoleRecord>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
            .bind(role_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Role".to_string()))
    }
}

/// Resolved roles of one user
pub async fn roles_for_user<'e, E>(executor: E, user_id: Uuid) -> AppResult<Vec<Role>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, RoleRecord>(
        r#"
        SELECT r.id, r.name, r.description, r.permissions, r.level, r.created_at, r.updated_at
        FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = $1
        ORDER BY r.level DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    rows.iter().map(RoleRecord::to_role).collect()
}

/// Look up role ids by name; every name must exist
pub async fn role_ids_by_name<'e, E>(executor: E, names: &[RoleName]) -> AppResult<Vec<Uuid>>
where
    E: PgExecutor<'e>,
{
    let wanted: Vec<String> = names.iter().map(|n| n.as_str().to_string()).collect();
    let rows = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM roles WHERE name = ANY($1)")
        .bind(&wanted)
        .fetch_all(executor)
        .await?;

    if let Some(missing) = wanted.iter().find(|w| !rows.iter().any(|(_, n)| n == *w)) {
        return Err(AppError::validation(
            "role_names",
            format!("Role '{}' does not exist", missing),
        ));
    }
    Ok(rows.into_iter().map(|(id, _)| id).collect())
}

fn check_level(level: i32) -> AppResult<()> {
    validate_role_level(level).map_err(|msg| AppError::validation("level", msg))
}

fn check_permissions(permissions: &[String]) -> AppResult<()> {
    match permissions.iter().find(|p| !is_known_permission(p)) {
        Some(unknown) => Err(AppError::validation(
            "permissions",
            format!("Unknown permission '{}'", unknown),
        )),
        None => Ok(()),
    }
}
