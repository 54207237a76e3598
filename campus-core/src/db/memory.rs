use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    AssignmentData, CompletionCount, ContentItemData, CourseData, Database, DatabaseError,
    EnrollmentData, GradeData, ModuleData, NewAssignment, NewCompletion, NewContentItem, NewCourse,
    NewEnrollment, NewGrade, NewModule, NewSession, NewSubmission, NewUser, PrimaryKey, Result,
    Role, SessionData, SubmissionData, UpdatedAssignment, UpdatedContentItem, UpdatedCourse,
    UpdatedModule, UserData,
};

/// An in-memory implementation of [Database], enforcing the same uniqueness
/// keys and cascade edges as the postgres implementation. Backs the test
/// suite, and useful for throwaway environments.
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    last_id: PrimaryKey,
    users: Vec<UserData>,
    sessions: Vec<StoredSession>,
    courses: Vec<CourseData>,
    enrollments: Vec<EnrollmentData>,
    modules: Vec<ModuleData>,
    items: Vec<ContentItemData>,
    completions: Vec<StoredCompletion>,
    assignments: Vec<AssignmentData>,
    submissions: Vec<SubmissionData>,
    grades: Vec<GradeData>,
}

struct StoredSession {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

struct StoredCompletion {
    user_id: PrimaryKey,
    content_item_id: PrimaryKey,
}

fn not_found(resource: &'static str, identifier: &'static str) -> DatabaseError {
    DatabaseError::NotFound {
        resource,
        identifier,
    }
}

fn conflict(resource: &'static str, field: &'static str, value: String) -> DatabaseError {
    DatabaseError::Conflict {
        resource,
        field,
        value,
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn next_id(&mut self) -> PrimaryKey {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<&UserData> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| not_found("user", "id"))
    }

    fn course(&self, course_id: PrimaryKey) -> Result<&CourseData> {
        self.courses
            .iter()
            .find(|c| c.id == course_id)
            .ok_or_else(|| not_found("course", "id"))
    }

    fn module(&self, module_id: PrimaryKey) -> Result<&ModuleData> {
        self.modules
            .iter()
            .find(|m| m.id == module_id)
            .ok_or_else(|| not_found("module", "id"))
    }

    fn item(&self, item_id: PrimaryKey) -> Result<&ContentItemData> {
        self.items
            .iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| not_found("content item", "id"))
    }

    fn assignment(&self, assignment_id: PrimaryKey) -> Result<&AssignmentData> {
        self.assignments
            .iter()
            .find(|a| a.id == assignment_id)
            .ok_or_else(|| not_found("assignment", "id"))
    }

    /// Item ids belonging to a course, in module then item order
    fn course_item_ids(&self, course_id: PrimaryKey) -> Vec<PrimaryKey> {
        let mut modules: Vec<_> = self
            .modules
            .iter()
            .filter(|m| m.course_id == course_id)
            .collect();
        modules.sort_by_key(|m| m.position);

        modules
            .into_iter()
            .flat_map(|m| {
                let mut items: Vec<_> = self
                    .items
                    .iter()
                    .filter(|i| i.module_id == m.id)
                    .collect();
                items.sort_by_key(|i| i.position);
                items.into_iter().map(|i| i.id)
            })
            .collect()
    }

    fn remove_submission(&mut self, submission_id: PrimaryKey) {
        self.grades.retain(|g| g.submission_id != submission_id);
        self.submissions.retain(|s| s.id != submission_id);
    }

    fn remove_assignment(&mut self, assignment_id: PrimaryKey) {
        let submissions: Vec<_> = self
            .submissions
            .iter()
            .filter(|s| s.assignment_id == assignment_id)
            .map(|s| s.id)
            .collect();

        for id in submissions {
            self.remove_submission(id);
        }

        self.assignments.retain(|a| a.id != assignment_id);
    }

    fn remove_item(&mut self, item_id: PrimaryKey) {
        self.completions.retain(|c| c.content_item_id != item_id);
        self.items.retain(|i| i.id != item_id);
    }

    fn remove_module(&mut self, module_id: PrimaryKey) {
        let items: Vec<_> = self
            .items
            .iter()
            .filter(|i| i.module_id == module_id)
            .map(|i| i.id)
            .collect();

        for id in items {
            self.remove_item(id);
        }

        self.modules.retain(|m| m.id != module_id);
    }

    fn remove_course(&mut self, course_id: PrimaryKey) {
        let modules: Vec<_> = self
            .modules
            .iter()
            .filter(|m| m.course_id == course_id)
            .map(|m| m.id)
            .collect();

        for id in modules {
            self.remove_module(id);
        }

        let assignments: Vec<_> = self
            .assignments
            .iter()
            .filter(|a| a.course_id == course_id)
            .map(|a| a.id)
            .collect();

        for id in assignments {
            self.remove_assignment(id);
        }

        self.enrollments.retain(|e| e.course_id != course_id);
        self.courses.retain(|c| c.id != course_id);
    }

    fn remove_user(&mut self, user_id: PrimaryKey) {
        self.sessions.retain(|s| s.user_id != user_id);
        self.enrollments.retain(|e| e.user_id != user_id);
        self.completions.retain(|c| c.user_id != user_id);

        let submissions: Vec<_> = self
            .submissions
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .collect();

        for id in submissions {
            self.remove_submission(id);
        }

        self.grades.retain(|g| g.graded_by != user_id);

        let courses: Vec<_> = self
            .courses
            .iter()
            .filter(|c| c.instructor_id == user_id)
            .map(|c| c.id)
            .collect();

        for id in courses {
            self.remove_course(id);
        }

        self.users.retain(|u| u.id != user_id);
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn has_admin(&self) -> Result<bool> {
        let state = self.state.lock();
        Ok(state.users.iter().any(|u| u.role == Role::Admin))
    }

    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        let state = self.state.lock();
        state.user(user_id).cloned()
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        let state = self.state.lock();
        state
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| not_found("user", "email"))
    }

    async fn list_users(&self) -> Result<Vec<UserData>> {
        let state = self.state.lock();
        let mut users = state.users.clone();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut state = self.state.lock();

        if state.users.iter().any(|u| u.email == new_user.email) {
            return Err(conflict("user", "email", new_user.email));
        }

        let user = UserData {
            id: state.next_id(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            created_at: Utc::now(),
        };

        state.users.push(user.clone());
        Ok(user)
    }

    async fn set_password_hash(&self, user_id: PrimaryKey, password_hash: &str) -> Result<()> {
        let mut state = self.state.lock();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| not_found("user", "id"))?;

        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn delete_user(&self, user_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.user(user_id)?;
        state.remove_user(user_id);
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let state = self.state.lock();
        let session = state
            .sessions
            .iter()
            .find(|s| s.token == token)
            .ok_or_else(|| not_found("session", "token"))?;

        let user = state.user(session.user_id)?.clone();

        Ok(SessionData {
            id: session.id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let mut state = self.state.lock();

        if state.sessions.iter().any(|s| s.token == new_session.token) {
            return Err(conflict("session", "token", new_session.token));
        }

        let user = state.user(new_session.user_id)?.clone();
        let session = StoredSession {
            id: state.next_id(),
            token: new_session.token,
            user_id: new_session.user_id,
            expires_at: new_session.expires_at,
        };

        let data = SessionData {
            id: session.id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user,
        };

        state.sessions.push(session);
        Ok(data)
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.sessions.retain(|s| s.token != token);
        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let mut state = self.state.lock();
        let now = Utc::now();
        state.sessions.retain(|s| s.expires_at > now);
        Ok(())
    }

    async fn course_by_id(&self, course_id: PrimaryKey) -> Result<CourseData> {
        let state = self.state.lock();
        state.course(course_id).cloned()
    }

    async fn list_courses(&self) -> Result<Vec<CourseData>> {
        let state = self.state.lock();
        Ok(state.courses.clone())
    }

    async fn courses_by_instructor(&self, instructor_id: PrimaryKey) -> Result<Vec<CourseData>> {
        let state = self.state.lock();
        Ok(state
            .courses
            .iter()
            .filter(|c| c.instructor_id == instructor_id)
            .cloned()
            .collect())
    }

    async fn courses_by_learner(&self, user_id: PrimaryKey) -> Result<Vec<CourseData>> {
        let state = self.state.lock();
        Ok(state
            .courses
            .iter()
            .filter(|c| {
                state
                    .enrollments
                    .iter()
                    .any(|e| e.course_id == c.id && e.user_id == user_id)
            })
            .cloned()
            .collect())
    }

    async fn create_course(&self, new_course: NewCourse) -> Result<CourseData> {
        let mut state = self.state.lock();
        state.user(new_course.instructor_id)?;

        let course = CourseData {
            id: state.next_id(),
            title: new_course.title,
            description: new_course.description,
            instructor_id: new_course.instructor_id,
            published: new_course.published,
            created_at: Utc::now(),
        };

        state.courses.push(course.clone());
        Ok(course)
    }

    async fn update_course(&self, updated_course: UpdatedCourse) -> Result<CourseData> {
        let mut state = self.state.lock();
        let course = state
            .courses
            .iter_mut()
            .find(|c| c.id == updated_course.id)
            .ok_or_else(|| not_found("course", "id"))?;

        if let Some(title) = updated_course.title {
            course.title = title;
        }
        if let Some(description) = updated_course.description {
            course.description = Some(description);
        }
        if let Some(published) = updated_course.published {
            course.published = published;
        }

        Ok(course.clone())
    }

    async fn delete_course(&self, course_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.course(course_id)?;
        state.remove_course(course_id);
        Ok(())
    }

    async fn module_by_id(&self, module_id: PrimaryKey) -> Result<ModuleData> {
        let state = self.state.lock();
        state.module(module_id).cloned()
    }

    async fn modules_by_course(&self, course_id: PrimaryKey) -> Result<Vec<ModuleData>> {
        let state = self.state.lock();
        let mut modules: Vec<_> = state
            .modules
            .iter()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.position);
        Ok(modules)
    }

    async fn create_module(&self, new_module: NewModule) -> Result<ModuleData> {
        let mut state = self.state.lock();
        state.course(new_module.course_id)?;

        let position = state
            .modules
            .iter()
            .filter(|m| m.course_id == new_module.course_id)
            .map(|m| m.position)
            .max()
            .unwrap_or(0)
            + 1;

        let module = ModuleData {
            id: state.next_id(),
            course_id: new_module.course_id,
            title: new_module.title,
            position,
            created_at: Utc::now(),
        };

        state.modules.push(module.clone());
        Ok(module)
    }

    async fn update_module(&self, updated_module: UpdatedModule) -> Result<ModuleData> {
        let mut state = self.state.lock();
        let module = state
            .modules
            .iter_mut()
            .find(|m| m.id == updated_module.id)
            .ok_or_else(|| not_found("module", "id"))?;

        module.title = updated_module.title;
        Ok(module.clone())
    }

    async fn delete_module(&self, module_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.module(module_id)?;
        state.remove_module(module_id);
        Ok(())
    }

    async fn content_item_by_id(&self, item_id: PrimaryKey) -> Result<ContentItemData> {
        let state = self.state.lock();
        state.item(item_id).cloned()
    }

    async fn content_items_by_module(
        &self,
        module_id: PrimaryKey,
    ) -> Result<Vec<ContentItemData>> {
        let state = self.state.lock();
        let mut items: Vec<_> = state
            .items
            .iter()
            .filter(|i| i.module_id == module_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.position);
        Ok(items)
    }

    async fn create_content_item(&self, new_item: NewContentItem) -> Result<ContentItemData> {
        let mut state = self.state.lock();
        state.module(new_item.module_id)?;

        let position = state
            .items
            .iter()
            .filter(|i| i.module_id == new_item.module_id)
            .map(|i| i.position)
            .max()
            .unwrap_or(0)
            + 1;

        let item = ContentItemData {
            id: state.next_id(),
            module_id: new_item.module_id,
            kind: new_item.kind,
            title: new_item.title,
            content: new_item.content,
            position,
            created_at: Utc::now(),
        };

        state.items.push(item.clone());
        Ok(item)
    }

    async fn update_content_item(
        &self,
        updated_item: UpdatedContentItem,
    ) -> Result<ContentItemData> {
        let mut state = self.state.lock();
        let item = state
            .items
            .iter_mut()
            .find(|i| i.id == updated_item.id)
            .ok_or_else(|| not_found("content item", "id"))?;

        if let Some(title) = updated_item.title {
            item.title = title;
        }
        if let Some(content) = updated_item.content {
            item.content = content;
        }

        Ok(item.clone())
    }

    async fn delete_content_item(&self, item_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.item(item_id)?;
        state.remove_item(item_id);
        Ok(())
    }

    async fn enrollment_for(
        &self,
        user_id: PrimaryKey,
        course_id: PrimaryKey,
    ) -> Result<EnrollmentData> {
        let state = self.state.lock();
        state
            .enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned()
            .ok_or_else(|| not_found("enrollment", "user:course"))
    }

    async fn enrollments_by_course(&self, course_id: PrimaryKey) -> Result<Vec<EnrollmentData>> {
        let state = self.state.lock();
        Ok(state
            .enrollments
            .iter()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn create_enrollment(&self, new_enrollment: NewEnrollment) -> Result<EnrollmentData> {
        let mut state = self.state.lock();
        state.user(new_enrollment.user_id)?;
        state.course(new_enrollment.course_id)?;

        let exists = state
            .enrollments
            .iter()
            .any(|e| e.user_id == new_enrollment.user_id && e.course_id == new_enrollment.course_id);

        if exists {
            return Err(conflict(
                "enrollment",
                "user:course",
                format!("{}:{}", new_enrollment.user_id, new_enrollment.course_id),
            ));
        }

        let enrollment = EnrollmentData {
            id: state.next_id(),
            user_id: new_enrollment.user_id,
            course_id: new_enrollment.course_id,
            enrolled_at: Utc::now(),
        };

        state.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn create_completion(&self, new_completion: NewCompletion) -> Result<()> {
        let mut state = self.state.lock();
        state.user(new_completion.user_id)?;
        state.item(new_completion.content_item_id)?;

        let exists = state.completions.iter().any(|c| {
            c.user_id == new_completion.user_id
                && c.content_item_id == new_completion.content_item_id
        });

        // Insert-or-ignore
        if !exists {
            state.completions.push(StoredCompletion {
                user_id: new_completion.user_id,
                content_item_id: new_completion.content_item_id,
            });
        }

        Ok(())
    }

    async fn completed_item_ids(
        &self,
        user_id: PrimaryKey,
        course_id: PrimaryKey,
    ) -> Result<Vec<PrimaryKey>> {
        let state = self.state.lock();
        let course_items = state.course_item_ids(course_id);

        Ok(course_items
            .into_iter()
            .filter(|item_id| {
                state
                    .completions
                    .iter()
                    .any(|c| c.user_id == user_id && c.content_item_id == *item_id)
            })
            .collect())
    }

    async fn completion_counts_by_course(
        &self,
        course_id: PrimaryKey,
    ) -> Result<Vec<CompletionCount>> {
        let state = self.state.lock();
        let course_items = state.course_item_ids(course_id);

        let mut counts: Vec<_> = state
            .enrollments
            .iter()
            .filter(|e| e.course_id == course_id)
            .filter_map(|e| state.user(e.user_id).ok())
            .map(|user| CompletionCount {
                user_id: user.id,
                email: user.email.clone(),
                completed: state
                    .completions
                    .iter()
                    .filter(|c| c.user_id == user.id && course_items.contains(&c.content_item_id))
                    .count() as i64,
            })
            .collect();

        counts.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(counts)
    }

    async fn count_course_items(&self, course_id: PrimaryKey) -> Result<i64> {
        let state = self.state.lock();
        Ok(state.course_item_ids(course_id).len() as i64)
    }

    async fn assignment_by_id(&self, assignment_id: PrimaryKey) -> Result<AssignmentData> {
        let state = self.state.lock();
        state.assignment(assignment_id).cloned()
    }

    async fn assignments_by_course(&self, course_id: PrimaryKey) -> Result<Vec<AssignmentData>> {
        let state = self.state.lock();
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn create_assignment(&self, new_assignment: NewAssignment) -> Result<AssignmentData> {
        let mut state = self.state.lock();
        state.course(new_assignment.course_id)?;

        let assignment = AssignmentData {
            id: state.next_id(),
            course_id: new_assignment.course_id,
            title: new_assignment.title,
            description: new_assignment.description,
            created_at: Utc::now(),
        };

        state.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn update_assignment(
        &self,
        updated_assignment: UpdatedAssignment,
    ) -> Result<AssignmentData> {
        let mut state = self.state.lock();
        let assignment = state
            .assignments
            .iter_mut()
            .find(|a| a.id == updated_assignment.id)
            .ok_or_else(|| not_found("assignment", "id"))?;

        if let Some(title) = updated_assignment.title {
            assignment.title = title;
        }
        if let Some(description) = updated_assignment.description {
            assignment.description = description;
        }

        Ok(assignment.clone())
    }

    async fn delete_assignment(&self, assignment_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.assignment(assignment_id)?;
        state.remove_assignment(assignment_id);
        Ok(())
    }

    async fn submission_by_id(&self, submission_id: PrimaryKey) -> Result<SubmissionData> {
        let state = self.state.lock();
        state
            .submissions
            .iter()
            .find(|s| s.id == submission_id)
            .cloned()
            .ok_or_else(|| not_found("submission", "id"))
    }

    async fn submission_for(
        &self,
        assignment_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<SubmissionData> {
        let state = self.state.lock();
        state
            .submissions
            .iter()
            .find(|s| s.assignment_id == assignment_id && s.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("submission", "assignment:user"))
    }

    async fn submissions_by_assignment(
        &self,
        assignment_id: PrimaryKey,
    ) -> Result<Vec<SubmissionData>> {
        let state = self.state.lock();
        Ok(state
            .submissions
            .iter()
            .filter(|s| s.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn upsert_submission(&self, new_submission: NewSubmission) -> Result<SubmissionData> {
        let mut state = self.state.lock();
        state.assignment(new_submission.assignment_id)?;
        state.user(new_submission.user_id)?;

        let existing = state.submissions.iter_mut().find(|s| {
            s.assignment_id == new_submission.assignment_id && s.user_id == new_submission.user_id
        });

        if let Some(submission) = existing {
            submission.submission_text = new_submission.submission_text;
            submission.file_url = new_submission.file_url;
            submission.submitted_at = Utc::now();
            return Ok(submission.clone());
        }

        let submission = SubmissionData {
            id: state.next_id(),
            assignment_id: new_submission.assignment_id,
            user_id: new_submission.user_id,
            submission_text: new_submission.submission_text,
            file_url: new_submission.file_url,
            submitted_at: Utc::now(),
        };

        state.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn grade_by_submission(&self, submission_id: PrimaryKey) -> Result<GradeData> {
        let state = self.state.lock();
        state
            .grades
            .iter()
            .find(|g| g.submission_id == submission_id)
            .cloned()
            .ok_or_else(|| not_found("grade", "submission_id"))
    }

    async fn create_grade(&self, new_grade: NewGrade) -> Result<GradeData> {
        let mut state = self.state.lock();

        let exists = state
            .grades
            .iter()
            .any(|g| g.submission_id == new_grade.submission_id);

        if exists {
            return Err(conflict(
                "grade",
                "submission_id",
                new_grade.submission_id.to_string(),
            ));
        }

        let grade = GradeData {
            id: state.next_id(),
            submission_id: new_grade.submission_id,
            score: new_grade.score,
            graded_by: new_grade.graded_by,
            graded_at: Utc::now(),
        };

        state.grades.push(grade.clone());
        Ok(grade)
    }
}
