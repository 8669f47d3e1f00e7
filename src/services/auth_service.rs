use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{Claims, PasswordHasher, TokenKind, TokenService};
use crate::database::models::{User, UserRole, UserStatus};
use crate::database::UserRepository;
use crate::error::AppError;

use super::blocking;

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: User,
    pub tokens: TokenPair,
}

/// Credential checks and session token issuance
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: TokenService,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self { users, tokens, hasher }
    }

    /// Verify credentials and issue an access/refresh pair.
    ///
    /// An unknown username and a wrong password fail identically; the
    /// unknown case still pays for one hash verification.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AppError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            let hasher = self.hasher.clone();
            let password = password.to_string();
            blocking(move || hasher.verify_dummy(&password).map_err(AppError::from)).await?;
            debug!(username = %username, "login failed: unknown user");
            return Err(AppError::InvalidCredentials);
        };

        let hasher = self.hasher.clone();
        let candidate = password.to_string();
        let stored = user.password_hash.clone();
        let matches = blocking(move || hasher.verify(&candidate, &stored).map_err(AppError::from)).await?;
        if !matches {
            debug!(username = %username, "login failed: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        if user.status != UserStatus::Active {
            debug!(user_id = user.id, "login failed: account inactive");
            return Err(AppError::forbidden("Account is disabled"));
        }

        let tokens = self.issue_pair(user.id, &user.username, user.role)?;
        info!(user_id = user.id, username = %user.username, "user logged in");

        Ok(LoginResult { user, tokens })
    }

    pub fn issue_pair(&self, user_id: i64, username: &str, role: UserRole) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.tokens.issue(TokenKind::Access, user_id, username, role)?,
            refresh_token: self.tokens.issue(TokenKind::Refresh, user_id, username, role)?,
        })
    }

    /// Validate a refresh token and mint a fresh pair for the same identity
    pub fn refresh(&self, refresh_token: &str) -> Result<(Claims, TokenPair), AppError> {
        let claims = self.tokens.validate(refresh_token)?;
        let pair = self.issue_pair(claims.user_id, &claims.username, claims.role)?;
        Ok((claims, pair))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        Ok(self.tokens.validate(token)?)
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Re-read the caller so a deleted account stops resolving
    pub async fn current_user(&self, user_id: i64) -> Result<User, AppError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::testing::{fast_hasher, seed_user, MemoryUserRepository};

    async fn service() -> (AuthService, Arc<MemoryUserRepository>) {
        let users = Arc::new(MemoryUserRepository::new());
        let tokens = TokenService::new(&JwtConfig {
            secret: "auth-service-test-secret-0123456789".into(),
            access_expiry_minutes: 15,
            refresh_expiry_hours: 12,
        });
        let hasher = fast_hasher();
        seed_user(users.as_ref(), &hasher, "alice", "correct-horse", UserRole::Admin)
            .await
            .unwrap();
        (AuthService::new(users.clone(), tokens, hasher), users)
    }

    #[tokio::test]
    async fn login_issues_tokens_for_identity() {
        let (auth, _) = service().await;
        let result = auth.login("alice", "correct-horse").await.unwrap();

        let claims = auth.validate(&result.tokens.access_token).unwrap();
        assert_eq!(claims.user_id, result.user.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, UserRole::Admin);
        assert!(auth.validate(&result.tokens.refresh_token).is_ok());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_indistinguishable() {
        let (auth, _) = service().await;

        let wrong = auth.login("alice", "nope").await.unwrap_err();
        let unknown = auth.login("mallory", "nope").await.unwrap_err();

        assert_eq!(wrong.error_code(), "INVALID_CREDENTIALS");
        assert_eq!(wrong.error_code(), unknown.error_code());
        assert_eq!(wrong.message(), unknown.message());
        assert_eq!(wrong.status_code(), unknown.status_code());
    }

    #[tokio::test]
    async fn username_match_is_case_sensitive() {
        let (auth, _) = service().await;
        let err = auth.login("Alice", "correct-horse").await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn inactive_account_is_forbidden() {
        let (auth, users) = service().await;
        let mut alice = users.find_by_username("alice").await.unwrap().unwrap();
        alice.status = UserStatus::Inactive;
        users.update(&alice).await.unwrap();

        let err = auth.login("alice", "correct-horse").await.unwrap_err();
        assert_eq!(err.error_code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn refresh_mints_a_new_pair() {
        let (auth, _) = service().await;
        let login = auth.login("alice", "correct-horse").await.unwrap();

        let (claims, pair) = auth.refresh(&login.tokens.refresh_token).unwrap();
        assert_eq!(claims.username, "alice");
        assert_ne!(pair.refresh_token, login.tokens.refresh_token);
        assert!(auth.refresh("garbage").is_err());
    }

    #[tokio::test]
    async fn deleted_user_no_longer_resolves() {
        let (auth, users) = service().await;
        let alice = users.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(auth.current_user(alice.id).await.unwrap().username, "alice");

        users.soft_delete(alice.id).await.unwrap();
        let err = auth.current_user(alice.id).await.unwrap_err();
        assert_eq!(err.error_code(), "USER_NOT_FOUND");
    }
}
