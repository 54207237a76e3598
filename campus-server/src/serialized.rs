//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use campus_core::{
    AssignmentData, AssignmentView as CoreAssignmentView, CompletionCount, ContentItemData,
    CourseData, CourseOutline as CoreCourseOutline, CourseProgress as CoreCourseProgress,
    EnrollOutcome, EnrollmentData, GradeData, ItemView as CoreItemView, ModuleData,
    ModuleOutline as CoreModuleOutline, OwnSubmission as CoreOwnSubmission, SessionData,
    SubmissionData, SubmissionReview as CoreSubmissionReview, UserData,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    id: i32,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    expires_at: DateTime<Utc>,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Course {
    id: i32,
    title: String,
    description: Option<String>,
    instructor_id: i32,
    published: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Module {
    id: i32,
    course_id: i32,
    title: String,
    position: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContentItem {
    id: i32,
    module_id: i32,
    #[serde(rename = "type")]
    kind: String,
    title: String,
    content: String,
    position: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseOutline {
    course: Course,
    modules: Vec<ModuleOutline>,
    assignments: Vec<Assignment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ModuleOutline {
    module: Module,
    items: Vec<ContentItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemView {
    module: Module,
    item: ContentItem,
    previous: Option<ContentItem>,
    next: Option<ContentItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Enrollment {
    id: i32,
    user_id: i32,
    course_id: i32,
    enrolled_at: DateTime<Utc>,
}

/// Enrollment requests are idempotent, so the response distinguishes a
/// fresh enrollment from a repeat.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollNotice {
    notice: String,
    enrollment: Option<Enrollment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LearnerProgress {
    user_id: i32,
    email: String,
    completed: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseProgress {
    total_items: i64,
    learners: Vec<LearnerProgress>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Assignment {
    id: i32,
    course_id: i32,
    title: String,
    description: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Submission {
    id: i32,
    assignment_id: i32,
    user_id: i32,
    submission_text: Option<String>,
    file_url: Option<String>,
    submitted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Grade {
    id: i32,
    submission_id: i32,
    score: i32,
    graded_by: i32,
    graded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionReview {
    submission: Submission,
    learner_email: String,
    grade: Option<Grade>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OwnSubmission {
    submission: Submission,
    grade: Option<Grade>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentView {
    assignment: Assignment,
    submissions: Vec<SubmissionReview>,
    own: Option<OwnSubmission>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            role: self.role.as_str().to_string(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            expires_at: self.expires_at,
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Course> for CourseData {
    fn to_serialized(&self) -> Course {
        Course {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            instructor_id: self.instructor_id,
            published: self.published,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Module> for ModuleData {
    fn to_serialized(&self) -> Module {
        Module {
            id: self.id,
            course_id: self.course_id,
            title: self.title.clone(),
            position: self.position,
        }
    }
}

impl ToSerialized<ContentItem> for ContentItemData {
    fn to_serialized(&self) -> ContentItem {
        ContentItem {
            id: self.id,
            module_id: self.module_id,
            kind: self.kind.as_str().to_string(),
            title: self.title.clone(),
            content: self.content.clone(),
            position: self.position,
        }
    }
}

impl ToSerialized<CourseOutline> for CoreCourseOutline {
    fn to_serialized(&self) -> CourseOutline {
        CourseOutline {
            course: self.course.to_serialized(),
            modules: self.modules.to_serialized(),
            assignments: self.assignments.to_serialized(),
        }
    }
}

impl ToSerialized<ModuleOutline> for CoreModuleOutline {
    fn to_serialized(&self) -> ModuleOutline {
        ModuleOutline {
            module: self.module.to_serialized(),
            items: self.items.to_serialized(),
        }
    }
}

impl ToSerialized<ItemView> for CoreItemView {
    fn to_serialized(&self) -> ItemView {
        ItemView {
            module: self.module.to_serialized(),
            item: self.item.to_serialized(),
            previous: self.previous.to_serialized(),
            next: self.next.to_serialized(),
        }
    }
}

impl ToSerialized<Enrollment> for EnrollmentData {
    fn to_serialized(&self) -> Enrollment {
        Enrollment {
            id: self.id,
            user_id: self.user_id,
            course_id: self.course_id,
            enrolled_at: self.enrolled_at,
        }
    }
}

impl ToSerialized<EnrollNotice> for EnrollOutcome {
    fn to_serialized(&self) -> EnrollNotice {
        match self {
            EnrollOutcome::Enrolled(enrollment) => EnrollNotice {
                notice: "Enrolled successfully".to_string(),
                enrollment: Some(enrollment.to_serialized()),
            },
            EnrollOutcome::AlreadyEnrolled => EnrollNotice {
                notice: "Already enrolled".to_string(),
                enrollment: None,
            },
        }
    }
}

impl ToSerialized<LearnerProgress> for CompletionCount {
    fn to_serialized(&self) -> LearnerProgress {
        LearnerProgress {
            user_id: self.user_id,
            email: self.email.clone(),
            completed: self.completed,
        }
    }
}

impl ToSerialized<CourseProgress> for CoreCourseProgress {
    fn to_serialized(&self) -> CourseProgress {
        CourseProgress {
            total_items: self.total_items,
            learners: self.learners.to_serialized(),
        }
    }
}

impl ToSerialized<Assignment> for AssignmentData {
    fn to_serialized(&self) -> Assignment {
        Assignment {
            id: self.id,
            course_id: self.course_id,
            title: self.title.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Submission> for SubmissionData {
    fn to_serialized(&self) -> Submission {
        Submission {
            id: self.id,
            assignment_id: self.assignment_id,
            user_id: self.user_id,
            submission_text: self.submission_text.clone(),
            file_url: self.file_url.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

impl ToSerialized<Grade> for GradeData {
    fn to_serialized(&self) -> Grade {
        Grade {
            id: self.id,
            submission_id: self.submission_id,
            score: self.score,
            graded_by: self.graded_by,
            graded_at: self.graded_at,
        }
    }
}

impl ToSerialized<SubmissionReview> for CoreSubmissionReview {
    fn to_serialized(&self) -> SubmissionReview {
        SubmissionReview {
            submission: self.submission.to_serialized(),
            learner_email: self.learner_email.clone(),
            grade: self.grade.to_serialized(),
        }
    }
}

impl ToSerialized<OwnSubmission> for CoreOwnSubmission {
    fn to_serialized(&self) -> OwnSubmission {
        OwnSubmission {
            submission: self.submission.to_serialized(),
            grade: self.grade.to_serialized(),
        }
    }
}

impl ToSerialized<AssignmentView> for CoreAssignmentView {
    fn to_serialized(&self) -> AssignmentView {
        AssignmentView {
            assignment: self.assignment.to_serialized(),
            submissions: self.submissions.to_serialized(),
            own: self.own.to_serialized(),
        }
    }
}
