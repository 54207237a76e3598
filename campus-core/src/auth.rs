use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use log::debug;
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::{is_valid_email, normalize_email, random_string},
    Database, DatabaseError, NewSession, NewUser, PrimaryKey, Role, SessionData, UserData,
};

/// Identity and session management: registration, login, token resolution.
pub struct Auth<Db> {
    db: Arc<Db>,
    hasher: Hasher,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Email or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("An admin account already exists")]
    AdminExists,
    #[error("{0}")]
    Validation(String),
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    Hash(String),
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    const SESSION_TTL_DAYS: i64 = 7;

    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            hasher: Hasher::default(),
        }
    }

    /// Logs in a user, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await?;

        let email = normalize_email(&credentials.email);
        let user = self.db.user_by_email(&email).await.map_err(|e| {
            if e.is_not_found() {
                AuthError::InvalidCredentials
            } else {
                AuthError::Db(e)
            }
        })?;

        let verified = self
            .hasher
            .verify(&credentials.password, &user.password_hash)
            .map_err(AuthError::Hash)?;

        if !verified {
            return Err(AuthError::InvalidCredentials);
        }

        self.start_session(user.id).await
    }

    /// Creates an account with one of the self-service roles and logs it in
    pub async fn register(&self, new_account: NewAccount) -> Result<SessionData, AuthError> {
        let role = Role::parse(&new_account.role)
            .filter(|role| *role != Role::Admin)
            .ok_or_else(|| AuthError::Validation("Invalid role selection".to_string()))?;

        let user = self.create_user(new_account, role).await?;
        self.start_session(user.id).await
    }

    /// Creates the first admin account and logs it in. Refused once any
    /// admin exists; later admins are created through the roster.
    pub async fn register_admin(&self, new_account: NewAccount) -> Result<SessionData, AuthError> {
        let has_admin = self.db.has_admin().await.map_err(AuthError::Db)?;

        if has_admin {
            return Err(AuthError::AdminExists);
        }

        let user = self.create_user(new_account, Role::Admin).await?;
        self.start_session(user.id).await
    }

    /// Returns the session behind a token, if it exists and has not expired.
    /// An expired row is removed on the spot.
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        let session = self.db.session_by_token(token).await?;

        if session.expires_at <= Utc::now() {
            debug!("Session for user {} expired, removing", session.user.id);
            self.db.delete_session_by_token(token).await?;

            return Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            });
        }

        Ok(session)
    }

    /// Deletes the associated session. Succeeds silently when the token is
    /// already gone.
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_session_by_token(token).await
    }

    async fn start_session(&self, user_id: PrimaryKey) -> Result<SessionData, AuthError> {
        let expires_at = Utc::now() + Duration::days(Self::SESSION_TTL_DAYS);

        let new_session = NewSession {
            token: random_string(32),
            user_id,
            expires_at,
        };

        self.db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)
    }

    async fn create_user(
        &self,
        new_account: NewAccount,
        role: Role,
    ) -> Result<UserData, AuthError> {
        let email = normalize_email(&new_account.email);

        if email.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Email is not valid".to_string()));
        }
        if new_account.password.len() < 8 {
            return Err(AuthError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let password_hash = self
            .hasher
            .hash(&new_account.password)
            .map_err(AuthError::Hash)?;

        self.db
            .create_user(NewUser {
                email,
                password_hash,
                role,
            })
            .await
            .map_err(AuthError::Db)
    }

    async fn clear_expired(&self) -> Result<(), AuthError> {
        self.db
            .clear_expired_sessions()
            .await
            .map_err(AuthError::Db)
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Wraps argon2 so the auth and roster paths share one configuration
pub(crate) struct Hasher {
    argon: Argon2<'static>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self {
            argon: Argon2::default(),
        }
    }
}

impl Hasher {
    pub fn hash(&self, password: &str) -> Result<String, String> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| e.to_string())
    }

    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, String> {
        let parsed = PasswordHash::parse(stored, Encoding::default()).map_err(|e| e.to_string())?;

        Ok(self
            .argon
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn test_register_then_login() {
        let (campus, ..) = testing::campus_with_roles().await;

        let session = campus
            .auth
            .register(NewAccount {
                email: "New.Learner@Campus.Test".to_string(),
                password: "correct horse".to_string(),
                role: "learner".to_string(),
            })
            .await
            .expect("registers");

        assert_eq!(session.user.email, "new.learner@campus.test");
        assert_eq!(session.user.role, Role::Learner);

        let login = campus
            .auth
            .login(Credentials {
                email: "new.learner@campus.test".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .expect("logs in");

        assert_eq!(login.user.id, session.user.id);

        let resolved = campus.auth.session(&login.token).await.expect("resolves");
        assert_eq!(resolved.user.id, session.user.id);
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let (campus, ..) = testing::campus_with_roles().await;

        campus
            .auth
            .register(NewAccount {
                email: "someone@campus.test".to_string(),
                password: "a good password".to_string(),
                role: "learner".to_string(),
            })
            .await
            .expect("registers");

        let result = campus
            .auth
            .login(Credentials {
                email: "someone@campus.test".to_string(),
                password: "a bad password".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_rejects_admin_role() {
        let (campus, ..) = testing::campus_with_roles().await;

        let result = campus
            .auth
            .register(NewAccount {
                email: "sneaky@campus.test".to_string(),
                password: "a good password".to_string(),
                role: "admin".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_admin_refused_when_admin_exists() {
        let (campus, ..) = testing::campus_with_roles().await;

        let result = campus
            .auth
            .register_admin(NewAccount {
                email: "second-admin@campus.test".to_string(),
                password: "a good password".to_string(),
                role: "admin".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::AdminExists)));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (campus, ..) = testing::campus_with_roles().await;

        let account = || NewAccount {
            email: "twice@campus.test".to_string(),
            password: "a good password".to_string(),
            role: "learner".to_string(),
        };

        campus.auth.register(account()).await.expect("registers");
        let result = campus.auth.register(account()).await;

        assert!(matches!(
            result,
            Err(AuthError::Db(DatabaseError::Conflict { .. }))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_removed_on_lookup() {
        let (campus, _, _, learner) = testing::campus_with_roles().await;
        let db = testing::database(&campus);

        let expired = db
            .create_session(NewSession {
                token: "stale-token".to_string(),
                user_id: learner.id,
                expires_at: Utc::now() - Duration::minutes(1),
            })
            .await
            .expect("creates session row");

        let result = campus.auth.session(&expired.token).await;
        assert!(matches!(result, Err(e) if e.is_not_found()));

        // The stale row is gone as well
        let row = db.session_by_token(&expired.token).await;
        assert!(matches!(row, Err(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (campus, ..) = testing::campus_with_roles().await;

        let session = campus
            .auth
            .register(NewAccount {
                email: "leaver@campus.test".to_string(),
                password: "a good password".to_string(),
                role: "learner".to_string(),
            })
            .await
            .expect("registers");

        campus.auth.logout(&session.token).await.expect("logs out");
        campus
            .auth
            .logout(&session.token)
            .await
            .expect("second logout is silent");
    }
}
