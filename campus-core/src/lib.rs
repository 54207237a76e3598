mod access;
mod assignments;
mod auth;
mod catalog;
mod db;
mod progress;
mod roster;
mod util;

use std::sync::Arc;
use thiserror::Error;

pub use access::*;
pub use assignments::*;
pub use auth::*;
pub use catalog::*;
pub use db::*;
pub use progress::*;
pub use roster::*;

/// Failure of a gated workflow operation. Authorization is resolved before
/// any write begins, so a denial always means nothing was mutated.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Denied(#[from] DenyReason),
    #[error("{0}")]
    Invalid(String),
    #[error("Submission already graded")]
    AlreadyGraded,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// The campus system: identities and sessions, the course catalog,
/// enrollment and completion tracking, the assignment workflow, and roster
/// administration, all sharing one database.
pub struct Campus<Db> {
    database: Arc<Db>,

    pub auth: Auth<Db>,
    pub catalog: Catalog<Db>,
    pub progress: Progress<Db>,
    pub assignments: Assignments<Db>,
    pub roster: Roster<Db>,
}

impl<Db> Campus<Db>
where
    Db: Database,
{
    pub fn new(database: Db) -> Self {
        let database = Arc::new(database);

        Self {
            auth: Auth::new(&database),
            catalog: Catalog::new(&database),
            progress: Progress::new(&database),
            assignments: Assignments::new(&database),
            roster: Roster::new(&database),
            database,
        }
    }

    pub fn database(&self) -> &Arc<Db> {
        &self.database
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::{Campus, Database, MemoryDatabase, NewUser, Role, UserData};

    /// A campus over a fresh in-memory database, with one account per role
    pub async fn campus_with_roles() -> (Campus<MemoryDatabase>, UserData, UserData, UserData) {
        let db = MemoryDatabase::new();

        let admin = seed_user(&db, "admin@campus.test", Role::Admin).await;
        let instructor = seed_user(&db, "instructor@campus.test", Role::Instructor).await;
        let learner = seed_user(&db, "learner@campus.test", Role::Learner).await;

        (Campus::new(db), admin, instructor, learner)
    }

    pub async fn instructor(campus: &Campus<MemoryDatabase>, email: &str) -> UserData {
        seed_user(campus.database().as_ref(), email, Role::Instructor).await
    }

    pub async fn learner(campus: &Campus<MemoryDatabase>, email: &str) -> UserData {
        seed_user(campus.database().as_ref(), email, Role::Learner).await
    }

    pub fn database(campus: &Campus<MemoryDatabase>) -> Arc<MemoryDatabase> {
        campus.database().clone()
    }

    async fn seed_user(db: &MemoryDatabase, email: &str, role: Role) -> UserData {
        db.create_user(NewUser {
            email: email.to_string(),
            // Not a valid argon2 hash; tests that log in set a real one
            password_hash: "!".to_string(),
            role,
        })
        .await
        .expect("seeds user")
    }
}

#[cfg(test)]
mod tests {
    use crate::{testing, ContentItemDraft, ContentType, CourseDraft, Database, WorkflowError};

    /// The whole flow end to end: admin sets up a course for an instructor,
    /// the instructor builds it out, a learner works through it and gets
    /// graded exactly once.
    #[tokio::test]
    async fn test_course_lifecycle() {
        let (campus, admin, instructor, learner) = testing::campus_with_roles().await;

        let course = campus
            .catalog
            .create_course(
                &admin,
                CourseDraft {
                    title: "Systems Programming".to_string(),
                    description: Some("A term of Rust".to_string()),
                    published: true,
                    instructor_id: Some(instructor.id),
                },
            )
            .await
            .expect("admin creates the course");

        let module = campus
            .catalog
            .create_module(&instructor, course.id, "Week 1")
            .await
            .expect("instructor adds a module");
        assert_eq!(module.position, 1);

        let item = campus
            .catalog
            .create_content_item(
                &instructor,
                module.id,
                ContentItemDraft {
                    title: "Syllabus".to_string(),
                    kind: "page".to_string(),
                    content: "Read this first".to_string(),
                },
            )
            .await
            .expect("instructor adds content");
        assert_eq!(item.kind, ContentType::Page);
        assert_eq!(item.position, 1);

        campus
            .progress
            .enroll(&instructor, course.id, &learner.email)
            .await
            .expect("instructor enrolls the learner");

        let assignment = campus
            .assignments
            .create_assignment(&instructor, course.id, "Hello world", "")
            .await
            .expect("instructor posts an assignment");

        let submission = campus
            .assignments
            .submit(&learner, assignment.id, "hello", "")
            .await
            .expect("learner submits");
        assert_eq!(submission.submission_text.as_deref(), Some("hello"));

        let grade = campus
            .assignments
            .grade(&instructor, assignment.id, submission.id, 85)
            .await
            .expect("instructor grades");
        assert_eq!(grade.score, 85);

        let again = campus
            .assignments
            .grade(&instructor, assignment.id, submission.id, 90)
            .await;
        assert!(matches!(again, Err(WorkflowError::AlreadyGraded)));

        let db = testing::database(&campus);
        let stored = db.grade_by_submission(submission.id).await.unwrap();
        assert_eq!(stored.score, 85);
    }
}
