use log::warn;
use std::sync::Arc;

use crate::{
    auth::Hasher,
    util::{is_valid_email, normalize_email},
    Access, Database, DatabaseError, NewUser, PrimaryKey, Role, UserData, WorkflowError,
};

/// Admin-only user administration: creating accounts with any role,
/// deleting accounts, resetting passwords.
pub struct Roster<Db> {
    db: Arc<Db>,
    hasher: Hasher,
}

/// Input for an admin-created account
#[derive(Debug)]
pub struct RosterEntry {
    pub email: String,
    pub password: String,
    pub role: String,
}

impl<Db> Roster<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            hasher: Hasher::default(),
        }
    }

    pub async fn list_users(&self, actor: &UserData) -> Result<Vec<UserData>, WorkflowError> {
        Access::<Db>::can_manage_roster(actor).require()?;

        Ok(self.db.list_users().await?)
    }

    /// Creates an account. Unlike self-registration, any role may be
    /// assigned, admin included. The role is fixed for the account's
    /// lifetime; there is no role-change operation.
    pub async fn create_user(
        &self,
        actor: &UserData,
        entry: RosterEntry,
    ) -> Result<UserData, WorkflowError> {
        Access::<Db>::can_manage_roster(actor).require()?;

        let email = normalize_email(&entry.email);

        if email.is_empty() {
            return Err(WorkflowError::Invalid("Email is required".to_string()));
        }
        if !is_valid_email(&email) {
            return Err(WorkflowError::Invalid("Email is not valid".to_string()));
        }
        if entry.password.len() < 8 {
            return Err(WorkflowError::Invalid(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let role = Role::parse(&entry.role)
            .ok_or_else(|| WorkflowError::Invalid("Invalid role".to_string()))?;

        let password_hash = self
            .hasher
            .hash(&entry.password)
            .map_err(|e| WorkflowError::Db(DatabaseError::Internal(e.into())))?;

        let user = self
            .db
            .create_user(NewUser {
                email,
                password_hash,
                role,
            })
            .await?;

        Ok(user)
    }

    /// Deletes an account and everything hanging off it: sessions,
    /// enrollments, completions, submissions, and any owned courses with
    /// their full subtree. Deleting yourself is refused, so an admin
    /// cannot lock the roster.
    pub async fn delete_user(
        &self,
        actor: &UserData,
        user_id: PrimaryKey,
    ) -> Result<(), WorkflowError> {
        Access::<Db>::can_delete_user(actor, user_id).require()?;

        let target = self.db.user_by_id(user_id).await?;

        warn!(
            "Deleting user {} ({}) and all dependent rows",
            target.email, target.id
        );

        Ok(self.db.delete_user(user_id).await?)
    }

    pub async fn set_password(
        &self,
        actor: &UserData,
        user_id: PrimaryKey,
        password: &str,
    ) -> Result<(), WorkflowError> {
        Access::<Db>::can_manage_roster(actor).require()?;

        if password.len() < 8 {
            return Err(WorkflowError::Invalid(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        // Ensure user exists before hashing
        let _ = self.db.user_by_id(user_id).await?;

        let password_hash = self
            .hasher
            .hash(password)
            .map_err(|e| WorkflowError::Db(DatabaseError::Internal(e.into())))?;

        Ok(self.db.set_password_hash(user_id, &password_hash).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing, Credentials, DenyReason};

    #[tokio::test]
    async fn test_roster_is_admin_only() {
        let (campus, _, instructor, _) = testing::campus_with_roles().await;

        let result = campus.roster.list_users(&instructor).await;

        assert!(matches!(
            result,
            Err(WorkflowError::Denied(DenyReason::AdminOnly))
        ));
    }

    #[tokio::test]
    async fn test_create_user_validates_fields() {
        let (campus, admin, ..) = testing::campus_with_roles().await;

        let entry = |email: &str, password: &str, role: &str| RosterEntry {
            email: email.to_string(),
            password: password.to_string(),
            role: role.to_string(),
        };

        let result = campus
            .roster
            .create_user(&admin, entry("", "long enough", "learner"))
            .await;
        assert!(
            matches!(result, Err(WorkflowError::Invalid(ref m)) if m.contains("Email is required"))
        );

        let result = campus
            .roster
            .create_user(&admin, entry("new@campus.test", "short", "learner"))
            .await;
        assert!(
            matches!(result, Err(WorkflowError::Invalid(ref m)) if m.contains("at least 8"))
        );

        let result = campus
            .roster
            .create_user(&admin, entry("new@campus.test", "long enough", "wizard"))
            .await;
        assert!(
            matches!(result, Err(WorkflowError::Invalid(ref m)) if m.contains("Invalid role"))
        );
    }

    #[tokio::test]
    async fn test_create_user_hashes_and_logs_in() {
        let (campus, admin, ..) = testing::campus_with_roles().await;

        let user = campus
            .roster
            .create_user(
                &admin,
                RosterEntry {
                    email: "Fresh@Campus.Test".to_string(),
                    password: "long enough".to_string(),
                    role: "instructor".to_string(),
                },
            )
            .await
            .expect("creates user");

        assert_eq!(user.email, "fresh@campus.test");
        assert_eq!(user.role, Role::Instructor);
        assert_ne!(user.password_hash, "long enough");

        let session = campus
            .auth
            .login(Credentials {
                email: "fresh@campus.test".to_string(),
                password: "long enough".to_string(),
            })
            .await
            .expect("logs in with the assigned password");

        assert_eq!(session.user.id, user.id);
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_self() {
        let (campus, admin, ..) = testing::campus_with_roles().await;
        let db = testing::database(&campus);

        let result = campus.roster.delete_user(&admin, admin.id).await;

        assert!(matches!(
            result,
            Err(WorkflowError::Denied(DenyReason::SelfDeletion))
        ));

        // The admin row remains
        assert!(db.user_by_id(admin.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_user_cascades_owned_courses() {
        let (campus, admin, instructor, learner) = testing::campus_with_roles().await;
        let db = testing::database(&campus);

        let course = campus
            .catalog
            .create_course(
                &instructor,
                crate::CourseDraft {
                    title: "Doomed with owner".to_string(),
                    description: None,
                    published: true,
                    instructor_id: None,
                },
            )
            .await
            .unwrap();

        campus
            .progress
            .enroll(&instructor, course.id, &learner.email)
            .await
            .unwrap();

        campus
            .roster
            .delete_user(&admin, instructor.id)
            .await
            .expect("deletes instructor");

        assert!(db.user_by_id(instructor.id).await.is_err());
        assert!(db.course_by_id(course.id).await.is_err());
        assert!(db.enrollment_for(learner.id, course.id).await.is_err());

        // The learner survives
        assert!(db.user_by_id(learner.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_set_password() {
        let (campus, admin, _, learner) = testing::campus_with_roles().await;

        campus
            .roster
            .set_password(&admin, learner.id, "a new password")
            .await
            .expect("resets password");

        let session = campus
            .auth
            .login(Credentials {
                email: learner.email.clone(),
                password: "a new password".to_string(),
            })
            .await
            .expect("logs in with the new password");

        assert_eq!(session.user.id, learner.id);

        let result = campus.roster.set_password(&admin, learner.id, "short").await;
        assert!(matches!(result, Err(WorkflowError::Invalid(_))));
    }
}
