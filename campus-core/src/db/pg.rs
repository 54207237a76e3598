use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    error::ErrorKind, postgres::PgPoolOptions, query, query_as, query_scalar, Error as SqlxError,
    FromRow, PgPool,
};

use crate::{
    AssignmentData, CompletionCount, ContentItemData, CourseData, Database, DatabaseError,
    DatabaseResult,
    EnrollmentData, GradeData, IntoDatabaseError, ModuleData, NewAssignment, NewCompletion,
    NewContentItem, NewCourse, NewEnrollment, NewGrade, NewModule, NewSession, NewSubmission,
    NewUser, PrimaryKey, Result, SessionData, SubmissionData, UpdatedAssignment,
    UpdatedContentItem, UpdatedCourse, UpdatedModule, UserData,
};

/// The schema, applied once at startup. Every statement is idempotent, so
/// re-running on boot is safe.
const SCHEMA: &[&str] = &[
    "DO $$
    BEGIN
        IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'user_role') THEN
            CREATE TYPE user_role AS ENUM ('learner', 'instructor', 'admin');
        END IF;
    END$$",
    "DO $$
    BEGIN
        IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'content_type') THEN
            CREATE TYPE content_type AS ENUM ('page', 'link');
        END IF;
    END$$",
    "CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role user_role NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        id SERIAL PRIMARY KEY,
        token TEXT NOT NULL UNIQUE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS courses (
        id SERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        instructor_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        published BOOLEAN NOT NULL DEFAULT false,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS enrollments (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        enrolled_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (user_id, course_id)
    )",
    "CREATE TABLE IF NOT EXISTS modules (
        id SERIAL PRIMARY KEY,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        position INTEGER NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS content_items (
        id SERIAL PRIMARY KEY,
        module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
        type content_type NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        position INTEGER NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS completions (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content_item_id INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
        completed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (user_id, content_item_id)
    )",
    "CREATE TABLE IF NOT EXISTS assignments (
        id SERIAL PRIMARY KEY,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS submissions (
        id SERIAL PRIMARY KEY,
        assignment_id INTEGER NOT NULL REFERENCES assignments(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        submission_text TEXT,
        file_url TEXT,
        submitted_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (assignment_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS grades (
        id SERIAL PRIMARY KEY,
        submission_id INTEGER NOT NULL UNIQUE REFERENCES submissions(id) ON DELETE CASCADE,
        score INTEGER NOT NULL,
        graded_by INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        graded_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

/// A postgres database implementation for campus
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(FromRow)]
struct SessionRow {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    /// Applies the schema. Run once at process start, before serving.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| e.any())?;
        }

        Ok(())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn has_admin(&self) -> Result<bool> {
        let result = query("SELECT id FROM users WHERE role = 'admin' LIMIT 1")
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SqlxError::RowNotFound) => Ok(false),
            Err(e) => Err(e.any()),
        }
    }

    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        query_as::<_, UserData>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        query_as::<_, UserData>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "email"))
    }

    async fn list_users(&self) -> Result<Vec<UserData>> {
        query_as::<_, UserData>("SELECT * FROM users ORDER BY email")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_email(&new_user.email)
            .await
            .conflict_or_ok("user", "email", &new_user.email)?;

        query_as::<_, UserData>(
            "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or_any("user", "email", &new_user.email))
    }

    async fn set_password_hash(&self, user_id: PrimaryKey, password_hash: &str) -> Result<()> {
        // Ensure user exists
        let _ = self.user_by_id(user_id).await?;

        query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn delete_user(&self, user_id: PrimaryKey) -> Result<()> {
        // Ensure user exists
        let _ = self.user_by_id(user_id).await?;

        query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row = query_as::<_, SessionRow>("SELECT * FROM sessions WHERE token = $1")
            .bind(token)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("session", "token"))?;

        let user = self.user_by_id(row.user_id).await?;

        Ok(SessionData {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        let token: String = query_scalar(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3) RETURNING token",
        )
        .bind(&new_session.token)
        .bind(new_session.user_id)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.session_by_token(&token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE now() > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn course_by_id(&self, course_id: PrimaryKey) -> Result<CourseData> {
        query_as::<_, CourseData>("SELECT * FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("course", "id"))
    }

    async fn list_courses(&self) -> Result<Vec<CourseData>> {
        query_as::<_, CourseData>("SELECT * FROM courses ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn courses_by_instructor(&self, instructor_id: PrimaryKey) -> Result<Vec<CourseData>> {
        query_as::<_, CourseData>(
            "SELECT * FROM courses WHERE instructor_id = $1 ORDER BY created_at",
        )
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn courses_by_learner(&self, user_id: PrimaryKey) -> Result<Vec<CourseData>> {
        query_as::<_, CourseData>(
            "SELECT courses.* FROM courses
                INNER JOIN enrollments ON enrollments.course_id = courses.id
            WHERE enrollments.user_id = $1
            ORDER BY courses.created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_course(&self, new_course: NewCourse) -> Result<CourseData> {
        query_as::<_, CourseData>(
            "INSERT INTO courses (title, description, instructor_id, published)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(&new_course.title)
        .bind(&new_course.description)
        .bind(new_course.instructor_id)
        .bind(new_course.published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_course(&self, updated_course: UpdatedCourse) -> Result<CourseData> {
        let course = self.course_by_id(updated_course.id).await?;

        query(
            "UPDATE courses SET
                title = $1,
                description = $2,
                published = $3
            WHERE id = $4",
        )
        .bind(updated_course.title.unwrap_or(course.title))
        .bind(updated_course.description.or(course.description))
        .bind(updated_course.published.unwrap_or(course.published))
        .bind(updated_course.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.course_by_id(updated_course.id).await
    }

    async fn delete_course(&self, course_id: PrimaryKey) -> Result<()> {
        // Ensure course exists
        let _ = self.course_by_id(course_id).await?;

        query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn module_by_id(&self, module_id: PrimaryKey) -> Result<ModuleData> {
        query_as::<_, ModuleData>("SELECT * FROM modules WHERE id = $1")
            .bind(module_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("module", "id"))
    }

    async fn modules_by_course(&self, course_id: PrimaryKey) -> Result<Vec<ModuleData>> {
        query_as::<_, ModuleData>("SELECT * FROM modules WHERE course_id = $1 ORDER BY position")
            .bind(course_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_module(&self, new_module: NewModule) -> Result<ModuleData> {
        query_as::<_, ModuleData>(
            "INSERT INTO modules (course_id, title, position)
            VALUES (
                $1,
                $2,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM modules WHERE course_id = $1)
            )
            RETURNING *",
        )
        .bind(new_module.course_id)
        .bind(&new_module.title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_module(&self, updated_module: UpdatedModule) -> Result<ModuleData> {
        // Ensure module exists
        let _ = self.module_by_id(updated_module.id).await?;

        query("UPDATE modules SET title = $1 WHERE id = $2")
            .bind(&updated_module.title)
            .bind(updated_module.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.module_by_id(updated_module.id).await
    }

    async fn delete_module(&self, module_id: PrimaryKey) -> Result<()> {
        // Ensure module exists
        let _ = self.module_by_id(module_id).await?;

        query("DELETE FROM modules WHERE id = $1")
            .bind(module_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn content_item_by_id(&self, item_id: PrimaryKey) -> Result<ContentItemData> {
        query_as::<_, ContentItemData>("SELECT * FROM content_items WHERE id = $1")
            .bind(item_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("content item", "id"))
    }

    async fn content_items_by_module(
        &self,
        module_id: PrimaryKey,
    ) -> Result<Vec<ContentItemData>> {
        query_as::<_, ContentItemData>(
            "SELECT * FROM content_items WHERE module_id = $1 ORDER BY position",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_content_item(&self, new_item: NewContentItem) -> Result<ContentItemData> {
        query_as::<_, ContentItemData>(
            "INSERT INTO content_items (module_id, type, title, content, position)
            VALUES (
                $1,
                $2,
                $3,
                $4,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM content_items WHERE module_id = $1)
            )
            RETURNING *",
        )
        .bind(new_item.module_id)
        .bind(new_item.kind)
        .bind(&new_item.title)
        .bind(&new_item.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_content_item(
        &self,
        updated_item: UpdatedContentItem,
    ) -> Result<ContentItemData> {
        let item = self.content_item_by_id(updated_item.id).await?;

        query("UPDATE content_items SET title = $1, content = $2 WHERE id = $3")
            .bind(updated_item.title.unwrap_or(item.title))
            .bind(updated_item.content.unwrap_or(item.content))
            .bind(updated_item.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.content_item_by_id(updated_item.id).await
    }

    async fn delete_content_item(&self, item_id: PrimaryKey) -> Result<()> {
        // Ensure item exists
        let _ = self.content_item_by_id(item_id).await?;

        query("DELETE FROM content_items WHERE id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn enrollment_for(
        &self,
        user_id: PrimaryKey,
        course_id: PrimaryKey,
    ) -> Result<EnrollmentData> {
        query_as::<_, EnrollmentData>(
            "SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("enrollment", "user:course"))
    }

    async fn enrollments_by_course(&self, course_id: PrimaryKey) -> Result<Vec<EnrollmentData>> {
        query_as::<_, EnrollmentData>(
            "SELECT * FROM enrollments WHERE course_id = $1 ORDER BY enrolled_at",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_enrollment(&self, new_enrollment: NewEnrollment) -> Result<EnrollmentData> {
        query_as::<_, EnrollmentData>(
            "INSERT INTO enrollments (user_id, course_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(new_enrollment.user_id)
        .bind(new_enrollment.course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            e.conflict_or_any(
                "enrollment",
                "user:course",
                &format!("{}:{}", new_enrollment.user_id, new_enrollment.course_id),
            )
        })
    }

    async fn create_completion(&self, new_completion: NewCompletion) -> Result<()> {
        query(
            "INSERT INTO completions (user_id, content_item_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, content_item_id) DO NOTHING",
        )
        .bind(new_completion.user_id)
        .bind(new_completion.content_item_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn completed_item_ids(
        &self,
        user_id: PrimaryKey,
        course_id: PrimaryKey,
    ) -> Result<Vec<PrimaryKey>> {
        query_scalar(
            "SELECT completions.content_item_id FROM completions
                INNER JOIN content_items ON content_items.id = completions.content_item_id
                INNER JOIN modules ON modules.id = content_items.module_id
            WHERE completions.user_id = $1 AND modules.course_id = $2
            ORDER BY modules.position, content_items.position",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn completion_counts_by_course(
        &self,
        course_id: PrimaryKey,
    ) -> Result<Vec<CompletionCount>> {
        query_as::<_, CompletionCount>(
            "SELECT users.id AS user_id, users.email, COUNT(completions.id) AS completed
            FROM enrollments
                INNER JOIN users ON users.id = enrollments.user_id
                LEFT JOIN completions ON completions.user_id = users.id
                    AND completions.content_item_id IN (
                        SELECT content_items.id FROM content_items
                            INNER JOIN modules ON modules.id = content_items.module_id
                        WHERE modules.course_id = $1
                    )
            WHERE enrollments.course_id = $1
            GROUP BY users.id, users.email
            ORDER BY users.email",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn count_course_items(&self, course_id: PrimaryKey) -> Result<i64> {
        query_scalar(
            "SELECT COUNT(*) FROM content_items
                INNER JOIN modules ON modules.id = content_items.module_id
            WHERE modules.course_id = $1",
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn assignment_by_id(&self, assignment_id: PrimaryKey) -> Result<AssignmentData> {
        query_as::<_, AssignmentData>("SELECT * FROM assignments WHERE id = $1")
            .bind(assignment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("assignment", "id"))
    }

    async fn assignments_by_course(&self, course_id: PrimaryKey) -> Result<Vec<AssignmentData>> {
        query_as::<_, AssignmentData>(
            "SELECT * FROM assignments WHERE course_id = $1 ORDER BY created_at",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_assignment(&self, new_assignment: NewAssignment) -> Result<AssignmentData> {
        query_as::<_, AssignmentData>(
            "INSERT INTO assignments (course_id, title, description)
            VALUES ($1, $2, $3)
            RETURNING *",
        )
        .bind(new_assignment.course_id)
        .bind(&new_assignment.title)
        .bind(&new_assignment.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_assignment(
        &self,
        updated_assignment: UpdatedAssignment,
    ) -> Result<AssignmentData> {
        let assignment = self.assignment_by_id(updated_assignment.id).await?;

        query("UPDATE assignments SET title = $1, description = $2 WHERE id = $3")
            .bind(updated_assignment.title.unwrap_or(assignment.title))
            .bind(
                updated_assignment
                    .description
                    .unwrap_or(assignment.description),
            )
            .bind(updated_assignment.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.assignment_by_id(updated_assignment.id).await
    }

    async fn delete_assignment(&self, assignment_id: PrimaryKey) -> Result<()> {
        // Ensure assignment exists
        let _ = self.assignment_by_id(assignment_id).await?;

        query("DELETE FROM assignments WHERE id = $1")
            .bind(assignment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn submission_by_id(&self, submission_id: PrimaryKey) -> Result<SubmissionData> {
        query_as::<_, SubmissionData>("SELECT * FROM submissions WHERE id = $1")
            .bind(submission_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("submission", "id"))
    }

    async fn submission_for(
        &self,
        assignment_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<SubmissionData> {
        query_as::<_, SubmissionData>(
            "SELECT * FROM submissions WHERE assignment_id = $1 AND user_id = $2",
        )
        .bind(assignment_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("submission", "assignment:user"))
    }

    async fn submissions_by_assignment(
        &self,
        assignment_id: PrimaryKey,
    ) -> Result<Vec<SubmissionData>> {
        query_as::<_, SubmissionData>(
            "SELECT * FROM submissions WHERE assignment_id = $1 ORDER BY submitted_at",
        )
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn upsert_submission(&self, new_submission: NewSubmission) -> Result<SubmissionData> {
        query_as::<_, SubmissionData>(
            "INSERT INTO submissions (assignment_id, user_id, submission_text, file_url, submitted_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (assignment_id, user_id) DO UPDATE SET
                submission_text = EXCLUDED.submission_text,
                file_url = EXCLUDED.file_url,
                submitted_at = EXCLUDED.submitted_at
            RETURNING *",
        )
        .bind(new_submission.assignment_id)
        .bind(new_submission.user_id)
        .bind(&new_submission.submission_text)
        .bind(&new_submission.file_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn grade_by_submission(&self, submission_id: PrimaryKey) -> Result<GradeData> {
        query_as::<_, GradeData>("SELECT * FROM grades WHERE submission_id = $1")
            .bind(submission_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("grade", "submission_id"))
    }

    async fn create_grade(&self, new_grade: NewGrade) -> Result<GradeData> {
        query_as::<_, GradeData>(
            "INSERT INTO grades (submission_id, score, graded_by)
            VALUES ($1, $2, $3)
            RETURNING *",
        )
        .bind(new_grade.submission_id)
        .bind(new_grade.score)
        .bind(new_grade.graded_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            e.conflict_or_any(
                "grade",
                "submission_id",
                &new_grade.submission_id.to_string(),
            )
        })
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }

    fn conflict_or_any(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        match &self {
            SqlxError::Database(e) if matches!(e.kind(), ErrorKind::UniqueViolation) => {
                DatabaseError::Conflict {
                    resource,
                    field,
                    value: value.to_string(),
                }
            }
            _ => self.any(),
        }
    }
}
