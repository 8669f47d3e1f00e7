use async_trait::async_trait;
use sqlx::PgPool;

use crate::filter::{Filter, Pagination, QueryOptions, SortDirection, SortTerm};

use super::models::user::{NewUser, User, USERS_TABLE, USER_FIELDS, USER_SEARCH_COLUMNS};
use super::query_builder::QueryBuilder;
use super::StoreError;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, status, created_at, updated_at, deleted_at";

/// One page of a filtered listing plus the total across all pages
#[derive(Debug, Clone)]
pub struct UserPage {
    pub items: Vec<User>,
    pub total: i64,
}

/// Storage port for the user aggregate.
///
/// Lookups without `_including_deleted` never see soft-deleted rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_username_including_deleted(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email_including_deleted(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Persist username, email, role and status of a live row
    async fn update(&self, user: &User) -> Result<User, StoreError>;

    async fn soft_delete(&self, id: i64) -> Result<(), StoreError>;

    /// Clear `deleted_at` on a soft-deleted row
    async fn restore(&self, id: i64) -> Result<User, StoreError>;

    /// Filtered, sorted page. A `search` filter in `options` is consumed here.
    async fn list(&self, page: Pagination, options: QueryOptions) -> Result<UserPage, StoreError>;
}

/// Postgres adapter for [`UserRepository`]
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str, include_deleted: bool) -> Result<Option<User>, StoreError> {
        let scope = if include_deleted { "" } else { " AND deleted_at IS NULL" };
        let query = format!(
            "SELECT {} FROM {} WHERE {} = $1{} LIMIT 1",
            USER_COLUMNS, USERS_TABLE, column, scope
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let query = format!(
            "INSERT INTO {} (username, email, password_hash, role, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USERS_TABLE, USER_COLUMNS
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS, USERS_TABLE
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one("username", username, false).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email", email, false).await
    }

    async fn find_by_username_including_deleted(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one("username", username, true).await
    }

    async fn find_by_email_including_deleted(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email", email, true).await
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let query = format!(
            "UPDATE {} SET username = $1, email = $2, role = $3, status = $4, updated_at = NOW() \
             WHERE id = $5 AND deleted_at IS NULL RETURNING {}",
            USERS_TABLE, USER_COLUMNS
        );
        let updated = sqlx::query_as::<_, User>(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(user.id)
            .fetch_one(&self.pool)
            .await?;
        Ok(updated)
    }

    async fn soft_delete(&self, id: i64) -> Result<(), StoreError> {
        let query = format!(
            "UPDATE {} SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
            USERS_TABLE
        );
        let result = sqlx::query(&query).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn restore(&self, id: i64) -> Result<User, StoreError> {
        let query = format!(
            "UPDATE {} SET deleted_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NOT NULL RETURNING {}",
            USERS_TABLE, USER_COLUMNS
        );
        let restored = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(restored)
    }

    async fn list(&self, page: Pagination, mut options: QueryOptions) -> Result<UserPage, StoreError> {
        let search = options.take_search();
        let mut filter = Filter::new(
            USERS_TABLE,
            &USER_FIELDS,
            &options,
            SortTerm::new("created_at", SortDirection::Desc),
        )?;
        if let Some(term) = search.as_deref() {
            filter = filter.search(&USER_SEARCH_COLUMNS, term);
        }

        let total = QueryBuilder::count(&self.pool, &filter.to_count_sql()?).await?;
        let items = QueryBuilder::select_all::<User>(&self.pool, &filter.to_sql(USER_COLUMNS, page)?).await?;

        Ok(UserPage { items, total })
    }
}
