use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{CreateUserRequest, UpdateUserRequest};
use crate::auth::PasswordHasher;
use crate::database::models::{NewUser, User, UserRole, UserStatus};
use crate::database::{UserPage, UserRepository};
use crate::error::AppError;
use crate::filter::{Pagination, QueryOptions};
use crate::middleware::response::FieldError;

use super::blocking;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 6;

/// Account management rules over the user store
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, hasher: PasswordHasher) -> Self {
        Self { users, hasher }
    }

    pub async fn create(&self, request: CreateUserRequest) -> Result<User, AppError> {
        let mut errors = Vec::new();
        check_username(&request.username, &mut errors);
        check_email(&request.email, &mut errors);
        if request.password.chars().count() < PASSWORD_MIN {
            errors.push(FieldError::new(
                "password",
                format!("must be at least {} characters", PASSWORD_MIN),
            ));
        }
        let role = match non_empty(request.role.as_deref()) {
            Some(raw) => parse_role(raw, &mut errors),
            None => Some(UserRole::User),
        };
        if !errors.is_empty() {
            return Err(AppError::validation("Validation failed", errors));
        }
        let role = role.unwrap_or(UserRole::User);

        // Deleted rows still own their identity
        if self
            .users
            .find_by_username_including_deleted(&request.username)
            .await?
            .is_some()
        {
            debug!(username = %request.username, "create user failed: username exists");
            return Err(AppError::UsernameExists);
        }
        if self
            .users
            .find_by_email_including_deleted(&request.email)
            .await?
            .is_some()
        {
            debug!(email = %request.email, "create user failed: email exists");
            return Err(AppError::EmailExists);
        }

        let hasher = self.hasher.clone();
        let password = request.password;
        let password_hash = blocking(move || hasher.hash(&password).map_err(AppError::from)).await?;

        let user = self
            .users
            .create(NewUser {
                username: request.username,
                email: request.email,
                password_hash,
                role,
                status: UserStatus::Active,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> Result<User, AppError> {
        self.users.find_by_id(id).await?.ok_or_else(|| {
            debug!(user_id = id, "get user failed: not found");
            AppError::UserNotFound
        })
    }

    /// Apply the members present in `request`; empty strings count as absent
    pub async fn update(&self, id: i64, request: UpdateUserRequest) -> Result<User, AppError> {
        let username = non_empty(request.username.as_deref());
        let email = non_empty(request.email.as_deref());

        let mut errors = Vec::new();
        if let Some(username) = username {
            check_username(username, &mut errors);
        }
        if let Some(email) = email {
            check_email(email, &mut errors);
        }
        let role = non_empty(request.role.as_deref()).and_then(|raw| parse_role(raw, &mut errors));
        let status = non_empty(request.status.as_deref()).and_then(|raw| parse_status(raw, &mut errors));
        if !errors.is_empty() {
            return Err(AppError::validation("Validation failed", errors));
        }

        let mut user = self.get(id).await?;

        if let Some(username) = username.filter(|u| *u != user.username) {
            if self.users.find_by_username_including_deleted(username).await?.is_some() {
                debug!(user_id = id, username = %username, "update user failed: username exists");
                return Err(AppError::UsernameExists);
            }
            user.username = username.to_string();
        }
        if let Some(email) = email.filter(|e| *e != user.email) {
            if self.users.find_by_email_including_deleted(email).await?.is_some() {
                debug!(user_id = id, email = %email, "update user failed: email exists");
                return Err(AppError::EmailExists);
            }
            user.email = email.to_string();
        }
        if let Some(role) = role {
            user.role = role;
        }
        if let Some(status) = status {
            user.status = status;
        }

        let updated = self.users.update(&user).await?;
        info!(user_id = id, "user updated");
        Ok(updated)
    }

    /// Soft delete; the row keeps its username and email
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.get(id).await?;
        self.users.soft_delete(id).await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    pub async fn restore(&self, id: i64) -> Result<User, AppError> {
        let user = self.users.restore(id).await?;
        info!(user_id = id, "user restored");
        Ok(user)
    }

    pub async fn list(&self, page: Pagination, options: QueryOptions) -> Result<UserPage, AppError> {
        Ok(self.users.list(page, options).await?)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn check_username(username: &str, errors: &mut Vec<FieldError>) {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        errors.push(FieldError::new(
            "username",
            format!("must be between {} and {} characters", USERNAME_MIN, USERNAME_MAX),
        ));
    }
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "must be a valid email address"));
    }
}

fn parse_role(raw: &str, errors: &mut Vec<FieldError>) -> Option<UserRole> {
    match raw.parse() {
        Ok(role) => Some(role),
        Err(_) => {
            errors.push(FieldError::new("role", "must be one of USER, ADMIN, SYSTEM_ADMIN"));
            None
        }
    }
}

fn parse_status(raw: &str, errors: &mut Vec<FieldError>) -> Option<UserStatus> {
    match raw.parse() {
        Ok(status) => Some(status),
        Err(_) => {
            errors.push(FieldError::new("status", "must be one of ACTIVE, INACTIVE"));
            None
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && email.len() <= 254
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOp;
    use crate::testing::{fast_hasher, MemoryUserRepository};

    fn service() -> UserService {
        UserService::new(Arc::new(MemoryUserRepository::new()), fast_hasher())
    }

    fn create_request(username: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "secret-pass".to_string(),
            role: None,
        }
    }

    fn field_names(err: &AppError) -> Vec<String> {
        err.to_body()
            .fields
            .unwrap_or_default()
            .into_iter()
            .map(|f| f.field)
            .collect()
    }

    #[tokio::test]
    async fn create_defaults_role_and_status() {
        let users = service();
        let user = users.create(create_request("erin")).await.unwrap();

        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert_ne!(user.password_hash, "secret-pass");
    }

    #[tokio::test]
    async fn create_reports_every_invalid_field() {
        let users = service();
        let err = users
            .create(CreateUserRequest {
                username: "ab".into(),
                email: "not-an-email".into(),
                password: "123".into(),
                role: Some("ROOT".into()),
            })
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(field_names(&err), vec!["username", "email", "password", "role"]);
    }

    #[tokio::test]
    async fn username_of_deleted_user_stays_reserved() {
        let users = service();
        let frank = users.create(create_request("frank")).await.unwrap();
        users.delete(frank.id).await.unwrap();

        let mut again = create_request("frank");
        again.email = "other@example.com".into();
        let err = users.create(again).await.unwrap_err();
        assert_eq!(err.error_code(), "USERNAME_EXISTS");

        assert!(users.create(create_request("grace")).await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let users = service();
        users.create(create_request("heidi")).await.unwrap();

        let mut clash = create_request("ivan");
        clash.email = "heidi@example.com".into();
        assert_eq!(users.create(clash).await.unwrap_err().error_code(), "EMAIL_EXISTS");
    }

    #[tokio::test]
    async fn update_applies_only_present_members() {
        let users = service();
        let judy = users.create(create_request("judy")).await.unwrap();

        let updated = users
            .update(
                judy.id,
                UpdateUserRequest {
                    username: Some(String::new()),
                    status: Some("INACTIVE".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.username, "judy");
        assert_eq!(updated.email, "judy@example.com");
        assert_eq!(updated.status, UserStatus::Inactive);
    }

    #[tokio::test]
    async fn update_to_own_username_is_not_a_clash() {
        let users = service();
        let kim = users.create(create_request("kim")).await.unwrap();
        users.create(create_request("leo")).await.unwrap();

        let same = UpdateUserRequest {
            username: Some("kim".into()),
            ..Default::default()
        };
        assert!(users.update(kim.id, same).await.is_ok());

        let taken = UpdateUserRequest {
            username: Some("leo".into()),
            ..Default::default()
        };
        assert_eq!(
            users.update(kim.id, taken).await.unwrap_err().error_code(),
            "USERNAME_EXISTS"
        );
    }

    #[tokio::test]
    async fn update_rejects_unknown_status() {
        let users = service();
        let mia = users.create(create_request("mia")).await.unwrap();
        let err = users
            .update(
                mia.id,
                UpdateUserRequest {
                    status: Some("BANNED".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(field_names(&err), vec!["status"]);
    }

    #[tokio::test]
    async fn delete_then_restore_round_trip_through_listing() {
        let users = service();
        let nick = users.create(create_request("nick")).await.unwrap();
        users.create(create_request("olga")).await.unwrap();
        let page = Pagination { offset: 0, limit: 20 };

        users.delete(nick.id).await.unwrap();
        let listed = users.list(page, QueryOptions::new()).await.unwrap();
        assert_eq!(listed.total, 1);
        assert!(listed.items.iter().all(|u| u.id != nick.id));
        assert_eq!(users.get(nick.id).await.unwrap_err().error_code(), "USER_NOT_FOUND");
        assert_eq!(users.delete(nick.id).await.unwrap_err().error_code(), "USER_NOT_FOUND");

        users.restore(nick.id).await.unwrap();
        let listed = users.list(page, QueryOptions::new()).await.unwrap();
        assert_eq!(listed.total, 2);
    }

    #[tokio::test]
    async fn restoring_a_live_user_is_not_found() {
        let users = service();
        let pat = users.create(create_request("pat")).await.unwrap();
        assert_eq!(users.restore(pat.id).await.unwrap_err().error_code(), "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn list_passes_filters_through() {
        let users = service();
        users.create(create_request("quinn")).await.unwrap();
        let mut admin = create_request("rita");
        admin.role = Some("ADMIN".into());
        users.create(admin).await.unwrap();

        let mut options = QueryOptions::new();
        options.add_filter("role", FilterOp::Eq, "ADMIN");
        let page = users
            .list(Pagination { offset: 0, limit: 20 }, options)
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].username, "rita");
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.io"));
        assert!(!is_valid_email("a@@c.io"));
        assert!(!is_valid_email("a@c.io."));
    }
}
