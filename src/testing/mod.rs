//! In-memory adapters for the storage and counter ports.
//!
//! They follow the Postgres/Redis semantics closely enough for the crate's
//! tests and for running the API locally without a database.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::auth::PasswordHasher;
use crate::config::AppConfig;
use crate::database::models::user::{NewUser, User, UserRole, UserStatus, USER_FIELDS};
use crate::database::{StoreError, UserPage, UserRepository};
use crate::filter::{is_valid_identifier, FilterCondition, FilterOp, Pagination, QueryOptions, SortDirection, SqlParam};
use crate::middleware::rate_limit::{CounterStore, RateLimitError, RateLimiter};
use crate::router::AppState;

#[derive(Default)]
struct MemoryUsers {
    next_id: i64,
    rows: Vec<User>,
}

#[derive(Default)]
pub struct MemoryUserRepository {
    state: RwLock<MemoryUsers>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn find<'a>(rows: &'a [User], pred: impl Fn(&User) -> bool, include_deleted: bool) -> Option<&'a User> {
        rows.iter().find(|u| (include_deleted || !u.is_deleted()) && pred(u))
    }

    /// Mirrors the unique constraints, which span deleted rows too
    fn check_unique(rows: &[User], id: i64, username: &str, email: &str) -> Result<(), StoreError> {
        if rows.iter().any(|u| u.id != id && u.username == username) {
            return Err(StoreError::UsernameTaken);
        }
        if rows.iter().any(|u| u.id != id && u.email == email) {
            return Err(StoreError::EmailTaken);
        }
        Ok(())
    }
}

fn field_value(user: &User, field: &str) -> Option<SqlParam> {
    Some(match field {
        "id" => SqlParam::Integer(user.id),
        "username" => SqlParam::Text(user.username.clone()),
        "email" => SqlParam::Text(user.email.clone()),
        "role" => SqlParam::Text(user.role.as_str().to_string()),
        "status" => SqlParam::Text(user.status.as_str().to_string()),
        "created_at" => SqlParam::Timestamp(user.created_at),
        "updated_at" => SqlParam::Timestamp(user.updated_at),
        _ => return None,
    })
}

fn as_text(value: &SqlParam) -> String {
    match value {
        SqlParam::Text(s) => s.clone(),
        SqlParam::Integer(i) => i.to_string(),
        SqlParam::Timestamp(t) => t.to_rfc3339(),
    }
}

fn matches(user: &User, field: &str, condition: &FilterCondition) -> Result<bool, StoreError> {
    let (Some(kind), Some(actual)) = (USER_FIELDS.kind(field), field_value(user, field)) else {
        return Ok(true);
    };
    let parse = |raw: &str| SqlParam::parse(field, kind, raw).map_err(StoreError::from);

    Ok(match condition.op {
        FilterOp::Eq => actual == parse(&condition.value)?,
        FilterOp::Ne => actual != parse(&condition.value)?,
        FilterOp::Gt => actual > parse(&condition.value)?,
        FilterOp::Gte => actual >= parse(&condition.value)?,
        FilterOp::Lt => actual < parse(&condition.value)?,
        FilterOp::Lte => actual <= parse(&condition.value)?,
        FilterOp::Like => as_text(&actual)
            .to_lowercase()
            .contains(&condition.value.to_lowercase()),
        FilterOp::In | FilterOp::NotIn => {
            let mut found = false;
            for raw in condition.list_values() {
                if parse(raw)? == actual {
                    found = true;
                }
            }
            // An empty `nin` list is skipped, an empty `in` list matches nothing
            match condition.op {
                FilterOp::In => found,
                _ => !found,
            }
        }
    })
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        Self::check_unique(&state.rows, 0, &user.username, &user.email)?;

        state.next_id += 1;
        let now = Utc::now();
        let created = User {
            id: state.next_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            status: user.status,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.rows.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(Self::find(&state.rows, |u| u.id == id, false).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(Self::find(&state.rows, |u| u.username == username, false).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(Self::find(&state.rows, |u| u.email == email, false).cloned())
    }

    async fn find_by_username_including_deleted(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(Self::find(&state.rows, |u| u.username == username, true).cloned())
    }

    async fn find_by_email_including_deleted(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(Self::find(&state.rows, |u| u.email == email, true).cloned())
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        Self::check_unique(&state.rows, user.id, &user.username, &user.email)?;

        let row = state
            .rows
            .iter_mut()
            .find(|u| u.id == user.id && !u.is_deleted())
            .ok_or(StoreError::NotFound)?;
        row.username = user.username.clone();
        row.email = user.email.clone();
        row.role = user.role;
        row.status = user.status;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn soft_delete(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let row = state
            .rows
            .iter_mut()
            .find(|u| u.id == id && !u.is_deleted())
            .ok_or(StoreError::NotFound)?;
        row.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn restore(&self, id: i64) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        let row = state
            .rows
            .iter_mut()
            .find(|u| u.id == id && u.is_deleted())
            .ok_or(StoreError::NotFound)?;
        row.deleted_at = None;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn list(&self, page: Pagination, mut options: QueryOptions) -> Result<UserPage, StoreError> {
        let search = options.take_search().map(|s| s.to_lowercase());
        let state = self.state.read().await;

        let mut selected = Vec::new();
        for user in state.rows.iter().filter(|u| !u.is_deleted()) {
            if let Some(term) = &search {
                if !user.username.to_lowercase().contains(term) && !user.email.to_lowercase().contains(term) {
                    continue;
                }
            }
            let mut keep = true;
            for (field, condition) in options.filters() {
                if is_valid_identifier(field) && !matches(user, field, condition)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                selected.push(user.clone());
            }
        }

        let mut terms: Vec<(String, SortDirection)> = options
            .sort()
            .iter()
            .filter(|t| USER_FIELDS.contains(&t.field))
            .map(|t| (t.field.clone(), t.direction))
            .collect();
        if options.sort().is_empty() {
            terms.push(("created_at".to_string(), SortDirection::Desc));
        }
        selected.sort_by(|a, b| {
            for (field, direction) in &terms {
                let ord = field_value(a, field)
                    .partial_cmp(&field_value(b, field))
                    .unwrap_or(Ordering::Equal);
                let ord = match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let total = selected.len() as i64;
        let items = selected
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect();

        Ok(UserPage { items, total })
    }
}

/// Expiring counters; expiry is driven by the test via [`Self::expire_all`]
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryCounterStore {
    pub async fn expire_all(&self) {
        self.counters.lock().await.clear();
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn current(&self, key: &str) -> Result<u64, RateLimitError> {
        Ok(self.counters.lock().await.get(key).copied().unwrap_or(0))
    }

    async fn increment(&self, key: &str, _window: Duration) -> Result<(), RateLimitError> {
        *self.counters.lock().await.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

/// Cheap hashing parameters so tests do not spend seconds in Argon2
pub fn fast_hasher() -> PasswordHasher {
    match PasswordHasher::new(1024, 1, 1) {
        Ok(hasher) => hasher,
        Err(_) => PasswordHasher::default(),
    }
}

/// Application state over in-memory adapters, plus a handle to the store
pub fn memory_state(config: AppConfig, rate_limit: Option<u64>) -> (AppState, Arc<MemoryUserRepository>) {
    let users = Arc::new(MemoryUserRepository::new());
    let limiter = rate_limit.map(|limit| RateLimiter::new(Arc::new(MemoryCounterStore::default()), limit));
    let state = AppState::new(config, users.clone(), fast_hasher(), limiter);
    (state, users)
}

pub const MEMORY_ADMIN_USERNAME: &str = "admin";

/// Seed the SYSTEM_ADMIN account for in-memory mode. Without a password one is
/// generated; the password in use is returned so it can be shown to the operator.
pub async fn seed_admin(
    users: &dyn UserRepository,
    hasher: &PasswordHasher,
    password: Option<String>,
) -> anyhow::Result<(User, String)> {
    let password = password
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let user = seed_user(users, hasher, MEMORY_ADMIN_USERNAME, &password, UserRole::SystemAdmin).await?;
    Ok((user, password))
}

/// Insert a user directly, bypassing service validation
pub async fn seed_user(
    users: &dyn UserRepository,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
    role: UserRole,
) -> anyhow::Result<User> {
    let user = users
        .create(NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: hasher.hash(password)?,
            role,
            status: UserStatus::Active,
        })
        .await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admin_is_seeded_with_given_or_generated_password() {
        let hasher = fast_hasher();

        let store = MemoryUserRepository::new();
        let (admin, password) = seed_admin(&store, &hasher, Some("s3cret-pw".into())).await.unwrap();
        assert_eq!(password, "s3cret-pw");
        assert_eq!(admin.username, MEMORY_ADMIN_USERNAME);
        assert_eq!(admin.role, UserRole::SystemAdmin);

        let store = MemoryUserRepository::new();
        let (admin, password) = seed_admin(&store, &hasher, None).await.unwrap();
        assert_eq!(password.len(), 32);
        assert!(hasher.verify(&password, &admin.password_hash).unwrap());
        assert!(store.find_by_username("admin").await.unwrap().is_some());
    }
}
