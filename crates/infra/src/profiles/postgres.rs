use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use stockroom_auth::Role;
use stockroom_core::UserId;

use super::{Profile, ProfileChanges, ProfileStore};
use crate::store::StoreError;
use crate::store::postgres::map_sqlx_error;

const PROFILE_COLUMNS: &str = "id, email, role, created_at, updated_at";

/// Profiles in the `profiles` table. Stored role strings are resolved with
/// [`Role::resolve`] when read as [`Profile`]s.
#[derive(Debug, Clone)]
pub struct PostgresProfileStore {
    pool: PgPool,
}

impl PostgresProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PostgresProfileStore {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Profile>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_profiles", e))?;
        rows.iter().map(profile_from_row).collect()
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn get(&self, id: UserId) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_profile", e))?;
        row.as_ref().map(profile_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn raw_role(&self, id: UserId) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT role FROM profiles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("profile_role", e))
    }

    #[instrument(skip(self, email), fields(user_id = %id, role = %role))]
    async fn upsert(&self, id: UserId, email: &str, role: Role, now: DateTime<Utc>) -> Result<Profile, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO profiles ({PROFILE_COLUMNS}) VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, role = EXCLUDED.role, \
             updated_at = EXCLUDED.updated_at \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(email)
        .bind(role.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_profile", e))?;
        profile_from_row(&row)
    }

    #[instrument(skip(self, changes), fields(user_id = %id))]
    async fn update(
        &self,
        id: UserId,
        changes: ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE profiles SET email = COALESCE($2, email), role = COALESCE($3, role), updated_at = $4 \
             WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(changes.email)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_profile", e))?;
        row.as_ref().map(profile_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_profile", e))?;
        Ok(result.rows_affected() > 0)
    }
}

fn profile_from_row(row: &PgRow) -> Result<Profile, StoreError> {
    let decode = |e| map_sqlx_error("decode_profile", e);
    let role: Option<String> = row.try_get("role").map_err(decode)?;
    Ok(Profile {
        id: UserId::from_uuid(row.try_get("id").map_err(decode)?),
        email: row.try_get("email").map_err(decode)?,
        role: Role::resolve(role.as_deref()),
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}
