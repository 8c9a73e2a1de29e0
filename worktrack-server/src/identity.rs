use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};
use worktrack_shared::auth::Role;
use worktrack_shared::jwt::{self, JwtClaims, TokenKind};

use crate::error::CoreError;
use crate::storage::Store;
use crate::storage::models::User;

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL_DAYS: i64 = 7;
/// Refresh token lifetime.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Tokens handed out by a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct Identity {
    store: Store,
    jwt_secret: Arc<str>,
    bcrypt_cost: u32,
}

impl Identity {
    pub fn new(store: Store, jwt_secret: &str, bcrypt_cost: u32) -> Self {
        Self {
            store,
            jwt_secret: Arc::from(jwt_secret),
            bcrypt_cost,
        }
    }

    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Creates a user after validating the input and hashing the password.
    /// Returns the new user's id.
    pub async fn register_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<String, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("name is required"));
        }
        if !is_valid_email(email) {
            return Err(CoreError::validation("invalid email address"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self
            .store
            .get_user_by_email(email)
            .await?
            .is_some()
        {
            return Err(CoreError::DuplicateEmail);
        }

        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        let user = self.insert_user(name, email, &hash, role).await?;
        info!(user_id = %user.id, role = %role, "identity: user registered");
        Ok(user.id)
    }

    /// Creates a user from an existing bcrypt hash unless the email is
    /// already taken. Returns `true` when a row was inserted.
    pub async fn ensure_user_with_hash(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<bool, CoreError> {
        if self.store.get_user_by_email(email).await?.is_some() {
            return Ok(false);
        }
        match self.insert_user(name, email, password_hash, role).await {
            Ok(_) => Ok(true),
            Err(CoreError::DuplicateEmail) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn insert_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, CoreError> {
        self.store
            .create_user(name, email, password_hash, role)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    CoreError::DuplicateEmail
                } else {
                    CoreError::Storage(e)
                }
            })
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session, CoreError> {
        let Some(user) = self.store.get_user_by_email(email).await? else {
            warn!(email, "login: unknown email");
            return Err(CoreError::InvalidCredentials);
        };
        let password = password.to_string();
        let hash = user.password_hash.clone();
        let matches = match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await?
        {
            Ok(m) => m,
            Err(e) => {
                error!(user_id = %user.id, error = %e, "login: stored password hash is unusable");
                false
            }
        };
        if !matches {
            warn!(user_id = %user.id, "login: invalid password");
            return Err(CoreError::InvalidCredentials);
        }

        let role = user.role()?;
        let access_token = self.issue(&user, role, TokenKind::Access)?;
        let refresh_token = self.issue(&user, role, TokenKind::Refresh)?;
        Ok(Session {
            user,
            access_token,
            refresh_token,
            expires_in: Duration::days(ACCESS_TOKEN_TTL_DAYS).num_seconds(),
        })
    }

    /// Exchanges a refresh token for a new access token. Name and role are
    /// re-read from storage, so a role change takes effect on refresh.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(String, i64), CoreError> {
        let claims = jwt::decode_and_verify(refresh_token, self.jwt_secret()).map_err(|e| {
            warn!(error = %e, "refresh: token rejected");
            CoreError::InvalidRefreshToken
        })?;
        if claims.kind != TokenKind::Refresh {
            warn!(user_id = %claims.sub, "refresh: not a refresh token");
            return Err(CoreError::InvalidRefreshToken);
        }
        let Some(user) = self.store.get_user(&claims.sub).await? else {
            warn!(user_id = %claims.sub, "refresh: user no longer exists");
            return Err(CoreError::InvalidRefreshToken);
        };
        let role = user.role()?;
        let token = self.issue(&user, role, TokenKind::Access)?;
        Ok((token, Duration::days(ACCESS_TOKEN_TTL_DAYS).num_seconds()))
    }

    /// Verifies a bearer token. Refresh tokens are not accepted here.
    pub fn verify_access(&self, token: &str) -> Result<JwtClaims, CoreError> {
        let claims = jwt::decode_and_verify(token, self.jwt_secret())?;
        if claims.kind != TokenKind::Access {
            return Err(CoreError::InvalidCredentials);
        }
        Ok(claims)
    }

    fn issue(&self, user: &User, role: Role, kind: TokenKind) -> Result<String, CoreError> {
        let ttl_days = match kind {
            TokenKind::Access => ACCESS_TOKEN_TTL_DAYS,
            TokenKind::Refresh => REFRESH_TOKEN_TTL_DAYS,
        };
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user.id.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            exp: (now + Duration::days(ttl_days)).timestamp(),
            iat: now.timestamp(),
            name: user.name.clone(),
            email: user.email.clone(),
            role,
            kind,
        };
        Ok(jwt::encode(&claims, self.jwt_secret())?)
    }
}

/// Accepts `local@domain.tld`: one `@`, no whitespace, and a dotted domain
/// whose labels are all non-empty.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::is_valid_email;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("ada"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@.com"));
        assert!(!is_valid_email("ada@example."));
        assert!(!is_valid_email("ada@@example.com"));
        assert!(!is_valid_email("ada lovelace@example.com"));
    }
}
