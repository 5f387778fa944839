//! User management service
//!
//! Every operation runs through the [`UserAccessTier`] policy table: officers
//! never see or touch admin/cfo accounts, and everyone else only reaches their
//! own record. Checks that need no data run before the first query.

use std::collections::HashMap;

use bcrypt::{hash, DEFAULT_COST};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::role::{role_ids_by_name, roles_for_user, RoleRecord};
use shared::{
    role_names, validate_password, validate_phone, Address, PaginatedData, Pagination,
    PersonalInfo, ProfileCertification, Role, RoleName, UserAccessTier, UserAction,
};

/// User service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    badge_number: Option<String>,
    address: Option<Json<Address>>,
    personal_info: Option<Json<PersonalInfo>>,
    certifications: Json<Vec<ProfileCertification>>,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "u.id, u.email, u.first_name, u.last_name, u.phone, u.badge_number, \
     u.address, u.personal_info, u.certifications, u.is_active, u.last_login_at, \
     u.created_at, u.updated_at";

/// User as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub badge_number: Option<String>,
    pub address: Option<Address>,
    pub personal_info: Option<PersonalInfo>,
    pub certifications: Vec<ProfileCertification>,
    pub is_active: bool,
    pub roles: Vec<Role>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserView {
    fn from_row(row: UserRow, roles: Vec<Role>) -> Self {
        Self {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            badge_number: row.badge_number,
            address: row.address.map(|a| a.0),
            personal_info: row.personal_info.map(|p| p.0),
            certifications: row.certifications.0,
            is_active: row.is_active,
            roles,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Query string for listing users
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub role: Option<RoleName>,
    pub is_active: Option<bool>,
}

impl ListUsersQuery {
    pub fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(default.page),
            limit: self.limit.unwrap_or(default.limit),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub badge_number: Option<String>,
    pub address: Option<Address>,
    pub personal_info: Option<PersonalInfo>,
    #[serde(default)]
    pub certifications: Vec<ProfileCertification>,
    #[serde(alias = "roleNames")]
    pub role_names: Vec<RoleName>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub password: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub badge_number: Option<String>,
    pub address: Option<Address>,
    pub personal_info: Option<PersonalInfo>,
    pub certifications: Option<Vec<ProfileCertification>>,
    #[serde(alias = "roleNames")]
    pub role_names: Option<Vec<RoleName>>,
    pub is_active: Option<bool>,
}

/// What a civilian may change on their own profile
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileInput {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Page of users the requester's tier may see
    pub async fn list_users(
        &self,
        requester: &AuthUser,
        query: ListUsersQuery,
    ) -> AppResult<PaginatedData<UserView>> {
        let tier = requester.access_tier();
        tier.authorize(UserAction::List)?;

        let hidden: Vec<String> = tier
            .hidden_roles()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));
        let role = query.role.map(|r| r.as_str().to_string());
        let pagination = query.pagination();

        let filter = r#"
            WHERE NOT EXISTS (
                SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id
                WHERE ur.user_id = u.id AND r.name = ANY($1)
            )
            AND ($2::text IS NULL
                OR u.email ILIKE $2 OR u.first_name ILIKE $2
                OR u.last_name ILIKE $2 OR u.badge_number ILIKE $2)
            AND ($3::text IS NULL OR EXISTS (
                SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id
                WHERE ur.user_id = u.id AND r.name = $3
            ))
            AND ($4::bool IS NULL OR u.is_active = $4)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users u {filter}"))
            .bind(&hidden)
            .bind(&search)
            .bind(&role)
            .bind(query.is_active)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users u {filter} ORDER BY u.created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(&hidden)
        .bind(&search)
        .bind(&role)
        .bind(query.is_active)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut roles = self.roles_for_users(&ids).await?;

        let mut items: Vec<UserView> = rows
            .into_iter()
            .map(|row| {
                let user_roles = roles.remove(&row.id).unwrap_or_default();
                UserView::from_row(row, user_roles)
            })
            .collect();
        // The SQL filter already excludes hidden holders; this keeps the
        // guarantee even if a role is granted between the two queries.
        items.retain(|u| tier.can_see(&role_names(&u.roles)));

        Ok(PaginatedData {
            items,
            pagination: pagination.meta(total),
        })
    }

    pub async fn get_user(&self, requester: &AuthUser, user_id: Uuid) -> AppResult<UserView> {
        let tier = requester.access_tier();
        tier.authorize_target(UserAction::Read, requester.user_id, user_id, &[])?;

        let roles = self.target_roles(user_id).await?;
        self.check_target(requester, UserAction::Read, user_id, &roles)?;

        self.fetch_view(user_id).await
    }

    pub async fn create_user(&self, requester: &AuthUser, input: CreateUserInput) -> AppResult<UserView> {
        let tier = requester.access_tier();
        tier.authorize(UserAction::Create)?;
        tier.authorize_role_assignment(&input.role_names)?;

        input.validate()?;
        validate_password(&input.password).map_err(|m| AppError::validation("password", m))?;
        if let Some(phone) = &input.phone {
            validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }
        if input.role_names.is_empty() {
            return Err(AppError::validation("role_names", "At least one role is required"));
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (
                email, password_hash, first_name, last_name, phone, badge_number,
                address, personal_info, certifications, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(input.email.trim().to_lowercase())
        .bind(&password_hash)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(&input.phone)
        .bind(&input.badge_number)
        .bind(input.address.map(Json))
        .bind(input.personal_info.map(Json))
        .bind(Json(input.certifications))
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await?;

        replace_roles(&mut tx, user_id, &input.role_names).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, created_by = %requester.user_id, "User created");
        self.fetch_view(user_id).await
    }

    pub async fn update_user(
        &self,
        requester: &AuthUser,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> AppResult<UserView> {
        let tier = requester.access_tier();
        if let Some(names) = &input.role_names {
            tier.authorize_role_assignment(names)?;
        }
        tier.authorize_target(UserAction::Update, requester.user_id, user_id, &[])?;
        if input.is_active.is_some() && !tier.rules().access_others {
            return Err(AppError::Forbidden(
                "You do not have permission to change account status".to_string(),
            ));
        }

        let roles = self.target_roles(user_id).await?;
        self.check_target(requester, UserAction::Update, user_id, &roles)?;

        input.validate()?;
        if let Some(phone) = &input.phone {
            validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }
        if matches!(&input.role_names, Some(names) if names.is_empty()) {
            return Err(AppError::validation("role_names", "At least one role is required"));
        }
        let password_hash = match &input.password {
            Some(password) => {
                validate_password(password).map_err(|m| AppError::validation("password", m))?;
                Some(
                    hash(password, DEFAULT_COST)
                        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?,
                )
            }
            None => None,
        };

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                phone = COALESCE($6, phone),
                badge_number = COALESCE($7, badge_number),
                address = COALESCE($8, address),
                personal_info = COALESCE($9, personal_info),
                certifications = COALESCE($10, certifications),
                is_active = COALESCE($11, is_active),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(input.email.map(|e| e.trim().to_lowercase()))
        .bind(password_hash)
        .bind(input.first_name.as_deref().map(str::trim))
        .bind(input.last_name.as_deref().map(str::trim))
        .bind(&input.phone)
        .bind(&input.badge_number)
        .bind(input.address.map(Json))
        .bind(input.personal_info.map(Json))
        .bind(input.certifications.map(Json))
        .bind(input.is_active)
        .execute(&mut *tx)
        .await?;

        if let Some(names) = &input.role_names {
            replace_roles(&mut tx, user_id, names).await?;
        }

        if input.is_active == Some(false) {
            sqlx::query(
                "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(user_id = %user_id, updated_by = %requester.user_id, "User updated");
        self.fetch_view(user_id).await
    }

    pub async fn delete_user(&self, requester: &AuthUser, user_id: Uuid) -> AppResult<()> {
        let tier = requester.access_tier();
        tier.authorize_target(UserAction::Delete, requester.user_id, user_id, &[])?;

        let roles = self.target_roles(user_id).await?;
        self.check_target(requester, UserAction::Delete, user_id, &roles)?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id = %user_id, deleted_by = %requester.user_id, "User deleted");
        Ok(())
    }

    /// A user's own record, without tier checks
    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<UserView> {
        self.fetch_view(user_id).await
    }

    pub async fn update_profile(&self, user_id: Uuid, input: ProfileInput) -> AppResult<UserView> {
        input.validate()?;
        if let Some(phone) = &input.phone {
            validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(input.first_name.as_deref().map(str::trim))
        .bind(input.last_name.as_deref().map(str::trim))
        .bind(&input.phone)
        .bind(input.address.map(Json))
        .execute(&self.db)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }

        self.fetch_view(user_id).await
    }

    fn check_target(
        &self,
        requester: &AuthUser,
        action: UserAction,
        target_id: Uuid,
        target_roles: &[Role],
    ) -> AppResult<()> {
        requester
            .access_tier()
            .authorize_target(action, requester.user_id, target_id, &role_names(target_roles))
            .map_err(|denial| {
                tracing::warn!(
                    requester = %requester.user_id,
                    target = %target_id,
                    ?action,
                    "User access denied"
                );
                denial.into()
            })
    }

    /// Roles of an existing user; 404 when the user does not exist
    async fn target_roles(&self, user_id: Uuid) -> AppResult<Vec<Role>> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound("User".to_string()));
        }
        roles_for_user(&self.db, user_id).await
    }

    async fn fetch_view(&self, user_id: Uuid) -> AppResult<UserView> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        let roles = roles_for_user(&self.db, user_id).await?;
        Ok(UserView::from_row(row, roles))
    }

    async fn roles_for_users(&self, user_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<Role>>> {
        #[derive(sqlx::FromRow)]
        struct Assigned {
            user_id: Uuid,
            #[sqlx(flatten)]
            role: RoleRecord,
        }

        let rows = sqlx::query_as::<_, Assigned>(
            r#"
            SELECT ur.user_id, r.id, r.name, r.description, r.permissions, r.level,
                   r.created_at, r.updated_at
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ANY($1)
            ORDER BY r.level DESC
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.db)
        .await?;

        let mut map: HashMap<Uuid, Vec<Role>> = HashMap::new();
        for row in rows {
            map.entry(row.user_id).or_default().push(row.role.to_role()?);
        }
        Ok(map)
    }
}

async fn replace_roles(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    names: &[RoleName],
) -> AppResult<()> {
    let role_ids = role_ids_by_name(&mut **tx, names).await?;

    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    for role_id in role_ids {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(role_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
