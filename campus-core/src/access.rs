use std::sync::Arc;
use thiserror::Error;

use crate::{CourseData, Database, DatabaseError, PrimaryKey, Role, UserData};

/// The outcome of an authorization check. Every gate resolves to one of
/// these before any write begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn require(self) -> Result<(), DenyReason> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(reason),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("Only admins can do this")]
    AdminOnly,
    #[error("Only instructors or admins can do this")]
    StaffOnly,
    #[error("You do not own this course")]
    NotCourseOwner,
    #[error("Not enrolled in this course")]
    NotEnrolled,
    #[error("Only learners can do this")]
    LearnerOnly,
    #[error("No access to this course")]
    NoCourseAccess,
    #[error("Cannot delete your own account")]
    SelfDeletion,
}

/// Evaluates who may do what. Checks are computed fresh against the store
/// on every call; nothing is cached between requests.
pub struct Access<Db> {
    db: Arc<Db>,
}

impl<Db> Access<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    pub fn is_admin(user: &UserData) -> bool {
        user.role == Role::Admin
    }

    pub fn is_owner(user: &UserData, course: &CourseData) -> bool {
        user.role == Role::Instructor && user.id == course.instructor_id
    }

    pub async fn is_enrolled(
        &self,
        user: &UserData,
        course_id: PrimaryKey,
    ) -> Result<bool, DatabaseError> {
        match self.db.enrollment_for(user.id, course_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Admin, owner, or an enrolled learner. Instructors who do not own the
    /// course are denied; there is no instructor-wide read access.
    pub async fn can_view_course(
        &self,
        user: &UserData,
        course: &CourseData,
    ) -> Result<Decision, DatabaseError> {
        if Self::is_admin(user) || Self::is_owner(user, course) {
            return Ok(Decision::Allow);
        }

        if user.role == Role::Learner && self.is_enrolled(user, course.id).await? {
            return Ok(Decision::Allow);
        }

        Ok(Decision::Deny(DenyReason::NoCourseAccess))
    }

    /// Structural changes: modules, content items, assignments, the course
    /// row itself
    pub fn can_edit_course(user: &UserData, course: &CourseData) -> Decision {
        if Self::is_admin(user) || Self::is_owner(user, course) {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::NotCourseOwner)
        }
    }

    /// Ownership is checked against the specific course the enrollment
    /// targets; being an instructor somewhere else is not enough.
    pub fn can_enroll_into(user: &UserData, course: &CourseData) -> Decision {
        if Self::is_admin(user) || Self::is_owner(user, course) {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::NotCourseOwner)
        }
    }

    pub async fn can_submit(
        &self,
        user: &UserData,
        course_id: PrimaryKey,
    ) -> Result<Decision, DatabaseError> {
        if user.role != Role::Learner {
            return Ok(Decision::Deny(DenyReason::LearnerOnly));
        }

        if !self.is_enrolled(user, course_id).await? {
            return Ok(Decision::Deny(DenyReason::NotEnrolled));
        }

        Ok(Decision::Allow)
    }

    /// Grading belongs to the owning instructor alone; admins are not
    /// granted grading rights.
    pub fn can_grade(user: &UserData, course: &CourseData) -> Decision {
        if Self::is_owner(user, course) {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::NotCourseOwner)
        }
    }

    pub fn can_manage_roster(user: &UserData) -> Decision {
        if Self::is_admin(user) {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::AdminOnly)
        }
    }

    /// Admins may delete anyone but themselves
    pub fn can_delete_user(actor: &UserData, target_id: PrimaryKey) -> Decision {
        if !Self::is_admin(actor) {
            return Decision::Deny(DenyReason::AdminOnly);
        }

        if actor.id == target_id {
            return Decision::Deny(DenyReason::SelfDeletion);
        }

        Decision::Allow
    }
}
