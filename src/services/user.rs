//! User service
//!
//! Authentication and account management:
//! - first-run setup of the initial administrator
//! - login/logout with server-side sessions (opaque UUID tokens)
//! - profile and password changes for the signed-in user
//! - administrator-side user management, guarded so the intranet can never
//!   lose its last active administrator

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{
    CreateUserInput, HistoryAction, HistoryEntity, ListParams, PagedResult, Session, UpdateUserInput, User,
    UserFilter, UserRole, UserStatus,
};
use crate::services::history::HistoryService;
use crate::services::password::{check_password_policy, hash_password, verify_password};
use crate::services::validation::{is_valid_email, is_valid_username, optional_text};

const MAX_DISPLAY_NAME_LENGTH: usize = 100;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Credentials were right but the account is disabled
    #[error("Account is disabled")]
    AccountDisabled,

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or email already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found: {0}")]
    NotFound(i64),

    /// The operation would lock the caller or everyone out
    #[error("{0}")]
    Forbidden(String),

    /// First-run setup was already completed
    #[error("Setup has already been completed")]
    SetupCompleted,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    history: Arc<HistoryService>,
    session_days: i64,
    min_password_length: usize,
    /// Serialises first-run setup so only one initial admin can be created
    setup_lock: tokio::sync::Mutex<()>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        history: Arc<HistoryService>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            history,
            session_days: config.session_days,
            min_password_length: config.min_password_length,
            setup_lock: tokio::sync::Mutex::new(()),
        }
    }

    // ------------------------------------------------------------------
    // Setup and sessions
    // ------------------------------------------------------------------

    /// True until the first account exists
    pub async fn needs_setup(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Create the initial administrator and sign them in.
    ///
    /// # Errors
    /// - `SetupCompleted` once any user exists
    pub async fn setup(&self, input: SetupInput) -> Result<(User, Session), UserServiceError> {
        let guard = self.setup_lock.lock().await;
        if !self.needs_setup().await? {
            return Err(UserServiceError::SetupCompleted);
        }

        let create = CreateUserInput {
            username: input.username,
            email: input.email,
            password: input.password,
            display_name: input.display_name,
            role: Some(UserRole::Admin),
            permissions: Vec::new(),
        };
        let user = self.insert_user(create).await?;
        drop(guard);
        let session = self.create_session(user.id).await?;

        tracing::info!(user = %user.username, "Initial administrator created");
        self.history
            .record(
                Some(user.id),
                HistoryAction::Create,
                HistoryEntity::User,
                Some(user.id),
                format!("Initial administrator {} created", user.username),
            )
            .await;
        Ok((user, session))
    }

    /// Check credentials and open a session.
    ///
    /// Unknown users and wrong passwords produce the same error. The
    /// disabled check runs after the password check so it does not reveal
    /// which accounts exist.
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .find_user_by_username_or_email(input.username_or_email.trim())
            .await?
            .ok_or_else(invalid)?;

        let password_valid =
            verify_password(&input.password, &user.password_hash).context("Failed to verify password")?;
        if !password_valid {
            return Err(invalid());
        }

        if !user.is_active() {
            tracing::warn!(user = %user.username, "Login attempt on disabled account");
            return Err(UserServiceError::AccountDisabled);
        }

        let session = self.create_session(user.id).await?;
        let now = Utc::now();
        self.user_repo
            .touch_last_login(user.id, now)
            .await
            .context("Failed to record last login")?;

        tracing::info!(user = %user.username, "User logged in");
        self.history
            .record(
                Some(user.id),
                HistoryAction::Login,
                HistoryEntity::User,
                Some(user.id),
                format!("{} logged in", user.username),
            )
            .await;

        Ok((
            User {
                last_login_at: Some(now),
                ..user
            },
            session,
        ))
    }

    /// Key for the failed-login window: the account when the identifier
    /// resolves to one, so a username and its email share a lockout.
    pub async fn lockout_key(&self, username_or_email: &str) -> Result<String, UserServiceError> {
        let identifier = username_or_email.trim();
        Ok(match self.find_user_by_username_or_email(identifier).await? {
            Some(user) => format!("user:{}", user.id),
            None => identifier.to_lowercase(),
        })
    }

    /// Invalidate one session
    pub async fn logout(&self, user: &User, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;

        tracing::info!(user = %user.username, "User logged out");
        self.history
            .record(
                Some(user.id),
                HistoryAction::Logout,
                HistoryEntity::User,
                Some(user.id),
                format!("{} logged out", user.username),
            )
            .await;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown, expired and disabled-user sessions all yield `None`.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_valid(token, Utc::now())
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(User::is_active))
    }

    /// Delete expired sessions; returns how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Self-service
    // ------------------------------------------------------------------

    pub async fn update_profile(&self, user: &User, input: ProfileInput) -> Result<User, UserServiceError> {
        let mut updated = user.clone();

        if let Some(email) = input.email {
            let email = self.validate_email(&email)?;
            if email != user.email {
                self.ensure_email_free(&email, Some(user.id)).await?;
            }
            updated.email = email;
        }
        if input.display_name.is_some() {
            updated.display_name = validate_display_name(input.display_name)?;
        }

        let saved = self.save(&updated).await?;
        self.history
            .record(
                Some(user.id),
                HistoryAction::Update,
                HistoryEntity::User,
                Some(user.id),
                format!("{} updated their profile", user.username),
            )
            .await;
        Ok(saved)
    }

    /// Change the caller's password. Every other session of the user is
    /// revoked; `current_session` stays signed in.
    pub async fn change_password(
        &self,
        user: &User,
        current_session: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let valid = verify_password(current_password, &user.password_hash).context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        check_password_policy(new_password, self.min_password_length).map_err(UserServiceError::ValidationError)?;

        let mut updated = user.clone();
        updated.password_hash = hash_password(new_password).context("Failed to hash password")?;
        self.save(&updated).await?;

        let revoked = self
            .session_repo
            .delete_by_user(user.id, Some(current_session))
            .await
            .context("Failed to revoke sessions")?;

        tracing::info!(user = %user.username, revoked, "Password changed");
        self.history
            .record(
                Some(user.id),
                HistoryAction::Update,
                HistoryEntity::User,
                Some(user.id),
                format!("{} changed their password", user.username),
            )
            .await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        params: &ListParams,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let filter = UserFilter {
            search: optional_text(filter.search.clone()),
            ..filter.clone()
        };
        let (items, total) = self.user_repo.list(&filter, params).await.context("Failed to list users")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get_user(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?
            .ok_or(UserServiceError::NotFound(id))
    }

    pub async fn create_user(&self, actor: &User, input: CreateUserInput) -> Result<User, UserServiceError> {
        let user = self.insert_user(input).await?;

        tracing::info!(user = %user.username, role = %user.role, by = %actor.username, "User created");
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Create,
                HistoryEntity::User,
                Some(user.id),
                format!("Created {} account {}", user.role, user.username),
            )
            .await;
        Ok(user)
    }

    /// Administrative update.
    ///
    /// # Errors
    /// - `Forbidden` when disabling yourself, or when the change would leave
    ///   no active administrator
    pub async fn update_user(&self, actor: &User, id: i64, input: UpdateUserInput) -> Result<User, UserServiceError> {
        let existing = self.get_user(id).await?;
        let mut user = existing.clone();

        if let Some(email) = input.email {
            let email = self.validate_email(&email)?;
            if email != existing.email {
                self.ensure_email_free(&email, Some(id)).await?;
            }
            user.email = email;
        }
        if input.display_name.is_some() {
            user.display_name = validate_display_name(input.display_name)?;
        }
        let password_changed = match input.password {
            Some(password) => {
                check_password_policy(&password, self.min_password_length)
                    .map_err(UserServiceError::ValidationError)?;
                user.password_hash = hash_password(&password).context("Failed to hash password")?;
                true
            }
            None => false,
        };
        if let Some(role) = input.role {
            user.role = role;
        }
        if let Some(status) = input.status {
            if id == actor.id && status == UserStatus::Disabled {
                return Err(UserServiceError::Forbidden("You cannot disable your own account".to_string()));
            }
            user.status = status;
        }
        if let Some(permissions) = input.permissions {
            user.permissions = permissions;
        }

        let loses_admin = existing.is_admin() && existing.is_active() && !(user.is_admin() && user.is_active());
        if loses_admin {
            self.ensure_other_admin_remains().await?;
        }

        let saved = self.save(&user).await?;

        let disabled = existing.is_active() && !saved.is_active();
        if disabled || password_changed {
            let revoked = self
                .session_repo
                .delete_by_user(id, None)
                .await
                .context("Failed to revoke sessions")?;
            tracing::info!(user = %saved.username, revoked, "Sessions revoked");
        }

        tracing::info!(user = %saved.username, by = %actor.username, "User updated");
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Update,
                HistoryEntity::User,
                Some(id),
                format!("Updated account {}", saved.username),
            )
            .await;
        Ok(saved)
    }

    /// Delete an account. Its sessions go with it; content it authored is
    /// kept without an author.
    pub async fn delete_user(&self, actor: &User, id: i64) -> Result<(), UserServiceError> {
        if id == actor.id {
            return Err(UserServiceError::Forbidden("You cannot delete your own account".to_string()));
        }
        let user = self.get_user(id).await?;
        if user.is_admin() && user.is_active() {
            self.ensure_other_admin_remains().await?;
        }

        self.session_repo
            .delete_by_user(id, None)
            .await
            .context("Failed to revoke sessions")?;
        if !self.user_repo.delete(id).await.context("Failed to delete user")? {
            return Err(UserServiceError::NotFound(id));
        }

        tracing::info!(user = %user.username, by = %actor.username, "User deleted");
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Delete,
                HistoryEntity::User,
                Some(id),
                format!("Deleted account {}", user.username),
            )
            .await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Private helpers
    // ------------------------------------------------------------------

    async fn insert_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        if !is_valid_username(&username) {
            return Err(UserServiceError::ValidationError(
                "Username must be 3-50 characters of letters, digits, '.', '_' or '-'".to_string(),
            ));
        }
        let email = self.validate_email(&input.email)?;
        check_password_policy(&input.password, self.min_password_length)
            .map_err(UserServiceError::ValidationError)?;
        let display_name = validate_display_name(input.display_name)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        self.ensure_email_free(&email, None).await?;

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let mut user = User::new(username, email, password_hash, input.role.unwrap_or_default());
        user.display_name = display_name;
        user.permissions = input.permissions;

        self.user_repo.create(&user).await.map_err(map_write_error)
    }

    async fn save(&self, user: &User) -> Result<User, UserServiceError> {
        self.user_repo.update(user).await.map_err(map_write_error)
    }

    fn validate_email(&self, email: &str) -> Result<String, UserServiceError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError("Invalid email format".to_string()));
        }
        Ok(email)
    }

    async fn ensure_email_free(&self, email: &str, current_id: Option<i64>) -> Result<(), UserServiceError> {
        let existing = self.user_repo.get_by_email(email).await.context("Failed to check email")?;
        match existing {
            Some(other) if Some(other.id) != current_id => Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            ))),
            _ => Ok(()),
        }
    }

    async fn ensure_other_admin_remains(&self) -> Result<(), UserServiceError> {
        let admins = self
            .user_repo
            .count_active_admins()
            .await
            .context("Failed to count administrators")?;
        if admins <= 1 {
            return Err(UserServiceError::Forbidden(
                "The last active administrator cannot be removed, demoted or disabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Usernames are tried first, then emails
    async fn find_user_by_username_or_email(&self, username_or_email: &str) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username_or_email)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        let user = self
            .user_repo
            .get_by_email(&username_or_email.to_lowercase())
            .await
            .context("Failed to get user by email")?;
        Ok(user)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.session_days),
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }
}

fn map_write_error(err: anyhow::Error) -> UserServiceError {
    match crate::db::classify_error(&err) {
        crate::db::DbErrorKind::UniqueViolation => {
            UserServiceError::UserExists("Username or email is already taken".to_string())
        }
        _ => UserServiceError::InternalError(err),
    }
}

fn validate_display_name(display_name: Option<String>) -> Result<Option<String>, UserServiceError> {
    match optional_text(display_name) {
        Some(name) if name.chars().count() > MAX_DISPLAY_NAME_LENGTH => Err(UserServiceError::ValidationError(
            format!("Display name must be at most {} characters", MAX_DISPLAY_NAME_LENGTH),
        )),
        other => Ok(other),
    }
}

/// Input for first-run setup
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SetupInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl SetupInput {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            display_name: None,
        }
    }
}

/// Input for user login
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

/// Self-service profile changes; an empty display name clears it
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct ProfileInput {
    pub display_name: Option<String>,
    pub email: Option<String>,
}
