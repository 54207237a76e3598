use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt::{self, Display};

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// What a user is allowed to be. Fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Learner,
    Instructor,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "learner" => Some(Self::Learner),
            "instructor" => Some(Self::Instructor),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learner => "learner",
            Self::Instructor => "instructor",
            Self::Admin => "admin",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape of a content item. Anything outside this set is rejected at
/// creation, never coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "content_type", rename_all = "lowercase")]
pub enum ContentType {
    Page,
    Link,
}

impl ContentType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "page" => Some(Self::Page),
            "link" => Some(Self::Link),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Link => "link",
        }
    }
}

/// A campus account
#[derive(Debug, Clone, FromRow)]
pub struct UserData {
    pub id: PrimaryKey,
    /// Unique, stored lowercased
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// A course, owned by exactly one instructor
#[derive(Debug, Clone, FromRow)]
pub struct CourseData {
    pub id: PrimaryKey,
    pub title: String,
    pub description: Option<String>,
    pub instructor_id: PrimaryKey,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

/// A learner's membership in a course
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub course_id: PrimaryKey,
    pub enrolled_at: DateTime<Utc>,
}

/// An ordered section of a course
#[derive(Debug, Clone, FromRow)]
pub struct ModuleData {
    pub id: PrimaryKey,
    pub course_id: PrimaryKey,
    pub title: String,
    /// 1-based, assigned max+1 per course, never compacted
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// A page or external link inside a module
#[derive(Debug, Clone, FromRow)]
pub struct ContentItemData {
    pub id: PrimaryKey,
    pub module_id: PrimaryKey,
    #[sqlx(rename = "type")]
    pub kind: ContentType,
    pub title: String,
    /// Page body, or the URL for a link
    pub content: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// An assignment belonging to a course
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentData {
    pub id: PrimaryKey,
    pub course_id: PrimaryKey,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A learner's submission for an assignment.
/// Note: `assignment_id` and `user_id` are unique together; a resubmission
/// overwrites this row in place.
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionData {
    pub id: PrimaryKey,
    pub assignment_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub submission_text: Option<String>,
    pub file_url: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// A grade for a submission. Write-once.
#[derive(Debug, Clone, FromRow)]
pub struct GradeData {
    pub id: PrimaryKey,
    pub submission_id: PrimaryKey,
    pub score: i32,
    pub graded_by: PrimaryKey,
    pub graded_at: DateTime<Utc>,
}

/// How many items of a course a learner has completed
#[derive(Debug, Clone, FromRow)]
pub struct CompletionCount {
    pub user_id: PrimaryKey,
    pub email: String,
    pub completed: i64,
}
