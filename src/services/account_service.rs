use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::error::{AppError, AppResult};
use crate::external::{Notification, Notifier};
use crate::models::*;
use crate::storage::{self, RESET_TOKENS_KEY, SESSIONS_KEY, SharedStore, USERS_KEY};
use crate::utils::*;

/// Account directory: users keyed by email, pending reset tokens and live sessions.
#[derive(Clone)]
pub struct AccountService {
    store: SharedStore,
    jwt_service: JwtService,
    notifier: Notifier,
    security: SecurityConfig,
    state: Arc<RwLock<DirectoryState>>,
}

#[derive(Default)]
struct DirectoryState {
    users: HashMap<String, User>,
    reset_tokens: HashMap<String, ResetToken>,
    sessions: HashMap<String, Session>,
}

impl DirectoryState {
    fn user_by_id(&self, user_id: &str) -> Option<&User> {
        self.users.values().find(|u| u.id == user_id)
    }

    fn user_by_id_mut(&mut self, user_id: &str) -> Option<&mut User> {
        self.users.values_mut().find(|u| u.id == user_id)
    }

    fn users_in_order(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        users
    }
}

impl AccountService {
    /// Loads the directory from `store`, seeding the demo accounts when nothing is stored yet.
    pub fn load(
        store: SharedStore,
        jwt_service: JwtService,
        notifier: Notifier,
        security: SecurityConfig,
        seed_demo: bool,
    ) -> AppResult<Self> {
        let mut state = DirectoryState::default();

        let stored_users: Option<Vec<User>> = storage::load(store.as_ref(), USERS_KEY)?;
        let users = match stored_users {
            Some(users) => users,
            None if seed_demo => demo_users(security.bcrypt_cost)?,
            None => Vec::new(),
        };
        for user in users {
            if state.users.contains_key(&user.email) {
                log::warn!("Dropping duplicate stored account for {}", user.email);
                continue;
            }
            state.users.insert(user.email.clone(), user);
        }

        state.reset_tokens = storage::load(store.as_ref(), RESET_TOKENS_KEY)?.unwrap_or_default();
        state.sessions = storage::load(store.as_ref(), SESSIONS_KEY)?.unwrap_or_default();

        storage::save(store.as_ref(), USERS_KEY, &state.users_in_order())?;
        log::info!("Account directory loaded with {} users", state.users.len());

        Ok(Self {
            store,
            jwt_service,
            notifier,
            security,
            state: Arc::new(RwLock::new(state)),
        })
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<UserResponse> {
        let username = request.username.trim().to_string();
        validate_username(&username)?;
        validate_email(&request.email)?;
        validate_password(&request.password)?;

        if self.state.read().await.users.contains_key(&request.email) {
            return Err(AppError::DuplicateAccount);
        }

        let password_hash = hash_password(&request.password, self.security.bcrypt_cost)?;
        let user = User {
            id: Uuid::new_v4().to_string(),
            username,
            email: request.email,
            password_hash,
            role: Role::User,
            created_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        // 再次检查，哈希期间可能有并发注册
        if state.users.contains_key(&user.email) {
            return Err(AppError::DuplicateAccount);
        }
        state.users.insert(user.email.clone(), user.clone());
        if let Err(e) = self.persist_users(&state) {
            state.users.remove(&user.email);
            return Err(e);
        }

        log::info!("Registered account {} ({})", user.email, user.id);
        Ok(user.into())
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let user = self
            .state
            .read()
            .await
            .users
            .get(&request.email)
            .cloned()
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            created_at: now,
            expires_at: now + Duration::seconds(self.jwt_service.get_refresh_token_expires_in()),
        };

        {
            let mut state = self.state.write().await;
            state.sessions.insert(session.id.clone(), session.clone());
            if let Err(e) = self.persist_sessions(&state) {
                state.sessions.remove(&session.id);
                return Err(e);
            }
        }

        log::info!("User {} ({}) logged in, session {}", user.id, user.role, session.id);
        self.auth_response(user, &session.id)
    }

    /// Revokes the session named by `token`, if it names one. Never fails.
    pub async fn logout(&self, token: Option<&str>) {
        let Some(claims) = token.and_then(|t| self.jwt_service.verify_token(t).ok()) else {
            return;
        };

        let mut state = self.state.write().await;
        if state.sessions.remove(&claims.sid).is_some() {
            log::info!("Session {} ended", claims.sid);
            if let Err(e) = self.persist_sessions(&state) {
                log::error!("Failed to persist logout of session {}: {e}", claims.sid);
            }
        }
    }

    /// Renews the session behind `refresh_token` and issues a fresh token pair.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self
            .jwt_service
            .verify_refresh_token(refresh_token)
            .map_err(|_| AppError::AuthError("Invalid refresh token".to_string()))?;

        let now = Utc::now();
        let user = {
            let mut state = self.state.write().await;
            let session = state
                .sessions
                .get(&claims.sid)
                .filter(|s| s.user_id == claims.sub && now <= s.expires_at)
                .cloned()
                .ok_or_else(|| AppError::AuthError("Session expired".to_string()))?;
            let user = state
                .user_by_id(&session.user_id)
                .cloned()
                .ok_or_else(|| AppError::AuthError("Session expired".to_string()))?;

            let renewed = now + Duration::seconds(self.jwt_service.get_refresh_token_expires_in());
            if let Some(s) = state.sessions.get_mut(&claims.sid) {
                s.expires_at = renewed;
            }
            if let Err(e) = self.persist_sessions(&state) {
                if let Some(s) = state.sessions.get_mut(&claims.sid) {
                    s.expires_at = session.expires_at;
                }
                return Err(e);
            }
            user
        };

        self.auth_response(user, &claims.sid)
    }

    /// Resolves an access token to a live session and the current user record.
    pub async fn authenticate(&self, access_token: &str) -> AppResult<AuthenticatedUser> {
        let claims = self
            .jwt_service
            .verify_access_token(access_token)
            .map_err(|_| AppError::AuthError("Invalid access token".to_string()))?;

        let state = self.state.read().await;
        let session = state
            .sessions
            .get(&claims.sid)
            .filter(|s| s.user_id == claims.sub && Utc::now() <= s.expires_at)
            .ok_or_else(|| AppError::AuthError("Session expired".to_string()))?;
        let user = state
            .user_by_id(&session.user_id)
            .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))?;

        Ok(AuthenticatedUser {
            user_id: user.id.clone(),
            role: user.role,
            session_id: session.id.clone(),
        })
    }

    pub async fn request_password_reset(&self, email: &str) -> AppResult<PasswordResetResponse> {
        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::seconds(self.security.reset_token_expires_in);

        {
            let mut state = self.state.write().await;
            if !state.users.contains_key(email) {
                return Err(AppError::AccountNotFound);
            }
            let previous = state.reset_tokens.insert(
                email.to_string(),
                ResetToken {
                    token_hash: hash_secret(&token),
                    expires_at,
                },
            );
            if let Err(e) = self.persist_reset_tokens(&state) {
                match previous {
                    Some(old) => state.reset_tokens.insert(email.to_string(), old),
                    None => state.reset_tokens.remove(email),
                };
                return Err(e);
            }
        }

        log::info!("Password reset token issued for {email}");
        self.notifier
            .send(Notification {
                to: email.to_string(),
                subject: "Reset your password".to_string(),
                body: format!(
                    "Use this token to reset your password: {token}. It expires at {}.",
                    expires_at.to_rfc3339()
                ),
                secret: Some(token),
            })
            .await?;

        Ok(PasswordResetResponse {
            expires_in: self.security.reset_token_expires_in,
        })
    }

    pub async fn complete_password_reset(
        &self,
        request: CompletePasswordResetRequest,
    ) -> AppResult<()> {
        {
            let state = self.state.read().await;
            check_reset_token(
                state.reset_tokens.get(&request.email),
                &request.token,
                Utc::now(),
            )?;
        }
        validate_password(&request.new_password)?;
        let password_hash = hash_password(&request.new_password, self.security.bcrypt_cost)?;

        let mut state = self.state.write().await;
        // 哈希期间令牌可能已被使用，重新校验
        check_reset_token(
            state.reset_tokens.get(&request.email),
            &request.token,
            Utc::now(),
        )?;
        let Some(user) = state.users.get_mut(&request.email) else {
            return Err(AppError::AccountNotFound);
        };
        let user_id = user.id.clone();
        let old_hash = std::mem::replace(&mut user.password_hash, password_hash);
        let token = state.reset_tokens.remove(&request.email);

        let persisted = self
            .persist_users(&state)
            .and_then(|_| self.persist_reset_tokens(&state));
        if let Err(e) = persisted {
            if let Some(user) = state.users.get_mut(&request.email) {
                user.password_hash = old_hash;
            }
            if let Some(token) = token {
                state.reset_tokens.insert(request.email.clone(), token);
            }
            if let Err(rollback) = self.persist_users(&state) {
                log::error!(
                    "Failed to roll back password reset for {}: {rollback}",
                    request.email
                );
            }
            return Err(e);
        }

        self.revoke_sessions_of(&mut state, &user_id);
        log::info!("Password reset completed for {}", request.email);
        Ok(())
    }

    pub async fn user_exists(&self, email: &str) -> bool {
        self.state.read().await.users.contains_key(email)
    }

    /// Replaces the credential of `email`. Used by the OTP reset channel.
    pub async fn set_password(&self, email: &str, new_password: &str) -> AppResult<()> {
        validate_password(new_password)?;
        let password_hash = hash_password(new_password, self.security.bcrypt_cost)?;

        let mut state = self.state.write().await;
        let Some(user) = state.users.get_mut(email) else {
            return Err(AppError::AccountNotFound);
        };
        let user_id = user.id.clone();
        let old_hash = std::mem::replace(&mut user.password_hash, password_hash);
        if let Err(e) = self.persist_users(&state) {
            if let Some(user) = state.users.get_mut(email) {
                user.password_hash = old_hash;
            }
            return Err(e);
        }
        self.revoke_sessions_of(&mut state, &user_id);
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> AppResult<UserResponse> {
        self.state
            .read()
            .await
            .user_by_id(user_id)
            .map(UserResponse::from)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
    ) -> AppResult<UserResponse> {
        let username = request.username.trim().to_string();
        validate_username(&username)?;

        let mut state = self.state.write().await;
        let user = state
            .user_by_id_mut(user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let old_username = std::mem::replace(&mut user.username, username);
        let updated = UserResponse::from(&*user);

        if let Err(e) = self.persist_users(&state) {
            if let Some(user) = state.user_by_id_mut(user_id) {
                user.username = old_username;
            }
            return Err(e);
        }
        Ok(updated)
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        request: ChangePasswordRequest,
    ) -> AppResult<()> {
        let current = self
            .state
            .read()
            .await
            .user_by_id(user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !verify_password(&request.current_password, &current.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }
        validate_password(&request.new_password)?;
        let password_hash = hash_password(&request.new_password, self.security.bcrypt_cost)?;

        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&current.email)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let old_hash = std::mem::replace(&mut user.password_hash, password_hash);
        if let Err(e) = self.persist_users(&state) {
            if let Some(user) = state.users.get_mut(&current.email) {
                user.password_hash = old_hash;
            }
            return Err(e);
        }
        log::info!("User {user_id} changed password");
        Ok(())
    }

    pub async fn list_users(&self) -> Vec<UserResponse> {
        let state = self.state.read().await;
        state.users_in_order().into_iter().map(UserResponse::from).collect()
    }

    /// Drops expired sessions and reset tokens. Returns how many entries were removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut state = self.state.write().await;
        let sessions_before = state.sessions.len();
        let tokens_before = state.reset_tokens.len();
        state.sessions.retain(|_, s| now <= s.expires_at);
        state.reset_tokens.retain(|_, t| now <= t.expires_at);

        let removed_sessions = sessions_before - state.sessions.len();
        let removed_tokens = tokens_before - state.reset_tokens.len();
        if removed_sessions > 0 {
            self.persist_sessions(&state)?;
        }
        if removed_tokens > 0 {
            self.persist_reset_tokens(&state)?;
        }
        Ok(removed_sessions + removed_tokens)
    }

    fn auth_response(&self, user: User, session_id: &str) -> AppResult<AuthResponse> {
        let access_token = self.jwt_service.generate_access_token(&user.id, session_id)?;
        let refresh_token = self.jwt_service.generate_refresh_token(&user.id, session_id)?;
        Ok(AuthResponse {
            user: user.into(),
            access_token,
            refresh_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }

    fn revoke_sessions_of(&self, state: &mut DirectoryState, user_id: &str) {
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.user_id != user_id);
        if state.sessions.len() != before
            && let Err(e) = self.persist_sessions(state)
        {
            log::error!("Failed to persist session revocation for {user_id}: {e}");
        }
    }

    fn persist_users(&self, state: &DirectoryState) -> AppResult<()> {
        storage::save(self.store.as_ref(), USERS_KEY, &state.users_in_order())
    }

    fn persist_reset_tokens(&self, state: &DirectoryState) -> AppResult<()> {
        storage::save(self.store.as_ref(), RESET_TOKENS_KEY, &state.reset_tokens)
    }

    fn persist_sessions(&self, state: &DirectoryState) -> AppResult<()> {
        storage::save(self.store.as_ref(), SESSIONS_KEY, &state.sessions)
    }
}

/// Order matters: missing, then mismatch, then expiry.
fn check_reset_token(
    stored: Option<&ResetToken>,
    token: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let stored = stored.ok_or(AppError::NoResetRequest)?;
    if stored.token_hash != hash_secret(token) {
        return Err(AppError::InvalidToken);
    }
    if now > stored.expires_at {
        return Err(AppError::ExpiredToken);
    }
    Ok(())
}

fn demo_users(cost: u32) -> AppResult<Vec<User>> {
    let seeds = [
        ("1", "admin", "admin@example.com", "admin123", Role::Admin),
        ("2", "user", "user@example.com", "user123", Role::User),
    ];
    let created_at = Utc::now();
    seeds
        .into_iter()
        .map(|(id, username, email, password, role)| {
            Ok(User {
                id: id.to_string(),
                username: username.to_string(),
                email: email.to_string(),
                password_hash: hash_password(password, cost)?,
                role,
                created_at,
            })
        })
        .collect()
}
