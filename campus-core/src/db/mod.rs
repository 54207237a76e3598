use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn conflict_or_any(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can fetch and mutate campus data in a store.
///
/// Uniqueness keys (email, session token, user:course, user:item,
/// assignment:user, submission grade) and cascade-on-delete edges are part of
/// this contract; implementations enforce them, callers rely on them.
#[async_trait]
pub trait Database: Send + Sync {
    async fn has_admin(&self) -> Result<bool>;
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_email(&self, email: &str) -> Result<UserData>;
    async fn list_users(&self) -> Result<Vec<UserData>>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn set_password_hash(&self, user_id: PrimaryKey, password_hash: &str) -> Result<()>;
    async fn delete_user(&self, user_id: PrimaryKey) -> Result<()>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    /// Must succeed silently when the token is already gone.
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn course_by_id(&self, course_id: PrimaryKey) -> Result<CourseData>;
    async fn list_courses(&self) -> Result<Vec<CourseData>>;
    async fn courses_by_instructor(&self, instructor_id: PrimaryKey) -> Result<Vec<CourseData>>;
    async fn courses_by_learner(&self, user_id: PrimaryKey) -> Result<Vec<CourseData>>;
    async fn create_course(&self, new_course: NewCourse) -> Result<CourseData>;
    async fn update_course(&self, updated_course: UpdatedCourse) -> Result<CourseData>;
    async fn delete_course(&self, course_id: PrimaryKey) -> Result<()>;

    async fn module_by_id(&self, module_id: PrimaryKey) -> Result<ModuleData>;
    /// Ordered by position
    async fn modules_by_course(&self, course_id: PrimaryKey) -> Result<Vec<ModuleData>>;
    /// Assigns position = max(position in course) + 1 atomically
    async fn create_module(&self, new_module: NewModule) -> Result<ModuleData>;
    async fn update_module(&self, updated_module: UpdatedModule) -> Result<ModuleData>;
    async fn delete_module(&self, module_id: PrimaryKey) -> Result<()>;

    async fn content_item_by_id(&self, item_id: PrimaryKey) -> Result<ContentItemData>;
    /// Ordered by position
    async fn content_items_by_module(&self, module_id: PrimaryKey)
        -> Result<Vec<ContentItemData>>;
    /// Assigns position = max(position in module) + 1 atomically
    async fn create_content_item(&self, new_item: NewContentItem) -> Result<ContentItemData>;
    async fn update_content_item(
        &self,
        updated_item: UpdatedContentItem,
    ) -> Result<ContentItemData>;
    async fn delete_content_item(&self, item_id: PrimaryKey) -> Result<()>;

    async fn enrollment_for(
        &self,
        user_id: PrimaryKey,
        course_id: PrimaryKey,
    ) -> Result<EnrollmentData>;
    async fn enrollments_by_course(&self, course_id: PrimaryKey) -> Result<Vec<EnrollmentData>>;
    async fn create_enrollment(&self, new_enrollment: NewEnrollment) -> Result<EnrollmentData>;

    /// Insert-or-ignore on (user, item); repeated marks are no-ops
    async fn create_completion(&self, new_completion: NewCompletion) -> Result<()>;
    async fn completed_item_ids(
        &self,
        user_id: PrimaryKey,
        course_id: PrimaryKey,
    ) -> Result<Vec<PrimaryKey>>;
    async fn completion_counts_by_course(
        &self,
        course_id: PrimaryKey,
    ) -> Result<Vec<CompletionCount>>;
    async fn count_course_items(&self, course_id: PrimaryKey) -> Result<i64>;

    async fn assignment_by_id(&self, assignment_id: PrimaryKey) -> Result<AssignmentData>;
    async fn assignments_by_course(&self, course_id: PrimaryKey) -> Result<Vec<AssignmentData>>;
    async fn create_assignment(&self, new_assignment: NewAssignment) -> Result<AssignmentData>;
    async fn update_assignment(
        &self,
        updated_assignment: UpdatedAssignment,
    ) -> Result<AssignmentData>;
    async fn delete_assignment(&self, assignment_id: PrimaryKey) -> Result<()>;

    async fn submission_by_id(&self, submission_id: PrimaryKey) -> Result<SubmissionData>;
    async fn submission_for(
        &self,
        assignment_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<SubmissionData>;
    async fn submissions_by_assignment(
        &self,
        assignment_id: PrimaryKey,
    ) -> Result<Vec<SubmissionData>>;
    /// Atomic insert-or-update on (assignment, user); refreshes text, file
    /// URL and timestamp in place on conflict
    async fn upsert_submission(&self, new_submission: NewSubmission) -> Result<SubmissionData>;

    async fn grade_by_submission(&self, submission_id: PrimaryKey) -> Result<GradeData>;
    /// One grade per submission; a second insert is a conflict
    async fn create_grade(&self, new_grade: NewGrade) -> Result<GradeData>;
}

#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    /// The owning instructor
    pub instructor_id: PrimaryKey,
    pub published: bool,
}

#[derive(Debug)]
pub struct UpdatedCourse {
    pub id: PrimaryKey,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published: Option<bool>,
}

#[derive(Debug)]
pub struct NewModule {
    pub course_id: PrimaryKey,
    pub title: String,
}

#[derive(Debug)]
pub struct UpdatedModule {
    pub id: PrimaryKey,
    pub title: String,
}

#[derive(Debug)]
pub struct NewContentItem {
    pub module_id: PrimaryKey,
    pub kind: ContentType,
    pub title: String,
    pub content: String,
}

#[derive(Debug)]
pub struct UpdatedContentItem {
    pub id: PrimaryKey,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug)]
pub struct NewEnrollment {
    pub user_id: PrimaryKey,
    pub course_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewCompletion {
    pub user_id: PrimaryKey,
    pub content_item_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewAssignment {
    pub course_id: PrimaryKey,
    pub title: String,
    pub description: String,
}

#[derive(Debug)]
pub struct UpdatedAssignment {
    pub id: PrimaryKey,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct NewSubmission {
    pub assignment_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub submission_text: Option<String>,
    pub file_url: Option<String>,
}

#[derive(Debug)]
pub struct NewGrade {
    pub submission_id: PrimaryKey,
    pub score: i32,
    /// The instructor assigning the grade
    pub graded_by: PrimaryKey,
}
