use log::{debug, info};
use std::sync::Arc;

use crate::{
    Access, AssignmentData, CourseData, Database, DatabaseError, GradeData, NewAssignment,
    NewGrade, NewSubmission, PrimaryKey, Role, SubmissionData, UpdatedAssignment, UserData,
    WorkflowError,
};

/// The assignment workflow. A submission moves Unsubmitted → Submitted →
/// Graded; resubmission overwrites in place, grading happens exactly once.
pub struct Assignments<Db> {
    db: Arc<Db>,
    access: Access<Db>,
}

/// A submission as course staff reviews it
#[derive(Debug)]
pub struct SubmissionReview {
    pub submission: SubmissionData,
    pub learner_email: String,
    pub grade: Option<GradeData>,
}

/// A learner's own submission and its grade, if any
#[derive(Debug)]
pub struct OwnSubmission {
    pub submission: SubmissionData,
    pub grade: Option<GradeData>,
}

/// The role-aware assignment page: staff get the review listing, learners
/// get their own submission.
#[derive(Debug)]
pub struct AssignmentView {
    pub assignment: AssignmentData,
    pub submissions: Vec<SubmissionReview>,
    pub own: Option<OwnSubmission>,
}

impl<Db> Assignments<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            access: Access::new(db),
        }
    }

    pub async fn create_assignment(
        &self,
        actor: &UserData,
        course_id: PrimaryKey,
        title: &str,
        description: &str,
    ) -> Result<AssignmentData, WorkflowError> {
        let course = self.db.course_by_id(course_id).await?;
        Access::<Db>::can_edit_course(actor, &course).require()?;

        let title = title.trim();

        if title.is_empty() {
            return Err(WorkflowError::Invalid("Title is required".to_string()));
        }

        let assignment = self
            .db
            .create_assignment(NewAssignment {
                course_id,
                title: title.to_string(),
                description: description.trim().to_string(),
            })
            .await?;

        Ok(assignment)
    }

    pub async fn update_assignment(
        &self,
        actor: &UserData,
        update: UpdatedAssignment,
    ) -> Result<AssignmentData, WorkflowError> {
        let assignment = self.db.assignment_by_id(update.id).await?;
        self.require_edit(actor, assignment.course_id).await?;

        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(WorkflowError::Invalid("Title is required".to_string()));
            }
        }

        Ok(self.db.update_assignment(update).await?)
    }

    pub async fn delete_assignment(
        &self,
        actor: &UserData,
        assignment_id: PrimaryKey,
    ) -> Result<(), WorkflowError> {
        let assignment = self.db.assignment_by_id(assignment_id).await?;
        self.require_edit(actor, assignment.course_id).await?;

        Ok(self.db.delete_assignment(assignment_id).await?)
    }

    /// Submits, or resubmits, the acting learner's work. At least one of
    /// text and file URL is required. A resubmission overwrites the previous
    /// row and leaves any existing grade untouched.
    pub async fn submit(
        &self,
        actor: &UserData,
        assignment_id: PrimaryKey,
        text: &str,
        file_url: &str,
    ) -> Result<SubmissionData, WorkflowError> {
        let assignment = self.db.assignment_by_id(assignment_id).await?;

        self.access
            .can_submit(actor, assignment.course_id)
            .await?
            .require()?;

        let text = text.trim();
        let file_url = file_url.trim();

        if text.is_empty() && file_url.is_empty() {
            return Err(WorkflowError::Invalid(
                "Provide submission text or a file URL".to_string(),
            ));
        }

        // Fresh insert and overwrite converge on the same row; the split
        // only matters for the log line.
        let resubmission = match self.db.submission_for(assignment.id, actor.id).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e.into()),
        };

        let submission = self
            .db
            .upsert_submission(NewSubmission {
                assignment_id: assignment.id,
                user_id: actor.id,
                submission_text: (!text.is_empty()).then(|| text.to_string()),
                file_url: (!file_url.is_empty()).then(|| file_url.to_string()),
            })
            .await?;

        if resubmission {
            debug!(
                "User {} resubmitted assignment {}",
                actor.id, assignment.id
            );
        } else {
            info!("User {} submitted assignment {}", actor.id, assignment.id);
        }

        Ok(submission)
    }

    /// Grades a submission, once. The submission must belong to the stated
    /// assignment, the actor must own the course, the score must sit in
    /// 0..=100, and an existing grade rejects the attempt outright.
    pub async fn grade(
        &self,
        actor: &UserData,
        assignment_id: PrimaryKey,
        submission_id: PrimaryKey,
        score: i32,
    ) -> Result<GradeData, WorkflowError> {
        let submission = self.db.submission_by_id(submission_id).await?;

        // Guards against mixing up ids across assignments
        if submission.assignment_id != assignment_id {
            return Err(DatabaseError::NotFound {
                resource: "submission",
                identifier: "assignment",
            }
            .into());
        }

        let assignment = self.db.assignment_by_id(assignment_id).await?;
        let course = self.db.course_by_id(assignment.course_id).await?;
        Access::<Db>::can_grade(actor, &course).require()?;

        if !(0..=100).contains(&score) {
            return Err(WorkflowError::Invalid(
                "Score must be an integer between 0 and 100".to_string(),
            ));
        }

        match self.db.grade_by_submission(submission.id).await {
            Ok(_) => return Err(WorkflowError::AlreadyGraded),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let grade = self
            .db
            .create_grade(NewGrade {
                submission_id: submission.id,
                score,
                graded_by: actor.id,
            })
            .await;

        match grade {
            Ok(grade) => {
                info!(
                    "Submission {} graded {} by user {}",
                    submission.id, score, actor.id
                );
                Ok(grade)
            }
            // Two grade attempts raced; the unique key on submission_id
            // lets exactly one through.
            Err(e) if e.is_conflict() => Err(WorkflowError::AlreadyGraded),
            Err(e) => Err(e.into()),
        }
    }

    /// All submissions for an assignment, for course staff
    pub async fn submissions_for(
        &self,
        actor: &UserData,
        assignment_id: PrimaryKey,
    ) -> Result<Vec<SubmissionReview>, WorkflowError> {
        let assignment = self.db.assignment_by_id(assignment_id).await?;
        self.require_edit(actor, assignment.course_id).await?;

        self.review_listing(assignment_id).await
    }

    /// The acting learner's submission for an assignment, if any
    pub async fn own_submission(
        &self,
        actor: &UserData,
        assignment_id: PrimaryKey,
    ) -> Result<Option<OwnSubmission>, WorkflowError> {
        let assignment = self.db.assignment_by_id(assignment_id).await?;

        self.access
            .can_submit(actor, assignment.course_id)
            .await?
            .require()?;

        self.own_lookup(assignment_id, actor.id).await
    }

    /// The assignment page, shaped by who is asking. Staff see every
    /// submission; learners see their own.
    pub async fn view(
        &self,
        actor: &UserData,
        course_id: PrimaryKey,
        assignment_id: PrimaryKey,
    ) -> Result<AssignmentView, WorkflowError> {
        let assignment = self.db.assignment_by_id(assignment_id).await?;

        if assignment.course_id != course_id {
            return Err(DatabaseError::NotFound {
                resource: "assignment",
                identifier: "course",
            }
            .into());
        }

        let course = self.db.course_by_id(course_id).await?;
        self.access
            .can_view_course(actor, &course)
            .await?
            .require()?;

        let staff = Access::<Db>::can_edit_course(actor, &course).is_allowed();

        let submissions = if staff {
            self.review_listing(assignment_id).await?
        } else {
            vec![]
        };

        let own = if actor.role == Role::Learner {
            self.own_lookup(assignment_id, actor.id).await?
        } else {
            None
        };

        Ok(AssignmentView {
            assignment,
            submissions,
            own,
        })
    }

    async fn review_listing(
        &self,
        assignment_id: PrimaryKey,
    ) -> Result<Vec<SubmissionReview>, WorkflowError> {
        let mut reviews = vec![];

        for submission in self.db.submissions_by_assignment(assignment_id).await? {
            let learner = self.db.user_by_id(submission.user_id).await?;
            let grade = self.optional_grade(submission.id).await?;

            reviews.push(SubmissionReview {
                submission,
                learner_email: learner.email,
                grade,
            });
        }

        Ok(reviews)
    }

    async fn own_lookup(
        &self,
        assignment_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<Option<OwnSubmission>, WorkflowError> {
        let submission = match self.db.submission_for(assignment_id, user_id).await {
            Ok(submission) => submission,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let grade = self.optional_grade(submission.id).await?;

        Ok(Some(OwnSubmission { submission, grade }))
    }

    async fn optional_grade(
        &self,
        submission_id: PrimaryKey,
    ) -> Result<Option<GradeData>, WorkflowError> {
        match self.db.grade_by_submission(submission_id).await {
            Ok(grade) => Ok(Some(grade)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn require_edit(
        &self,
        actor: &UserData,
        course_id: PrimaryKey,
    ) -> Result<CourseData, WorkflowError> {
        let course = self.db.course_by_id(course_id).await?;
        Access::<Db>::can_edit_course(actor, &course).require()?;

        Ok(course)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing, CourseDraft, DenyReason};

    struct Fixture {
        campus: crate::Campus<crate::MemoryDatabase>,
        instructor: UserData,
        learner: UserData,
        course: crate::CourseData,
        assignment: AssignmentData,
    }

    async fn fixture() -> Fixture {
        let (campus, _, instructor, learner) = testing::campus_with_roles().await;

        let course = campus
            .catalog
            .create_course(
                &instructor,
                CourseDraft {
                    title: "Workflow".to_string(),
                    description: None,
                    published: true,
                    instructor_id: None,
                },
            )
            .await
            .unwrap();

        let assignment = campus
            .assignments
            .create_assignment(&instructor, course.id, "Essay", "Write something")
            .await
            .unwrap();

        campus
            .progress
            .enroll(&instructor, course.id, &learner.email)
            .await
            .unwrap();

        Fixture {
            campus,
            instructor,
            learner,
            course,
            assignment,
        }
    }

    #[tokio::test]
    async fn test_submit_requires_enrollment() {
        let f = fixture().await;
        let outsider = testing::learner(&f.campus, "outsider@campus.test").await;

        let result = f
            .campus
            .assignments
            .submit(&outsider, f.assignment.id, "hello", "")
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::Denied(DenyReason::NotEnrolled))
        ));
    }

    #[tokio::test]
    async fn test_submit_requires_some_content() {
        let f = fixture().await;

        let result = f
            .campus
            .assignments
            .submit(&f.learner, f.assignment.id, "  ", "")
            .await;

        assert!(matches!(result, Err(WorkflowError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_resubmission_overwrites_in_place() {
        let f = fixture().await;
        let db = testing::database(&f.campus);

        let first = f
            .campus
            .assignments
            .submit(&f.learner, f.assignment.id, "draft one", "")
            .await
            .expect("submits");

        let second = f
            .campus
            .assignments
            .submit(
                &f.learner,
                f.assignment.id,
                "draft two",
                "https://example.com/essay.pdf",
            )
            .await
            .expect("resubmits");

        assert_eq!(first.id, second.id);
        assert_eq!(second.submission_text.as_deref(), Some("draft two"));
        assert_eq!(
            second.file_url.as_deref(),
            Some("https://example.com/essay.pdf")
        );
        assert!(second.submitted_at >= first.submitted_at);

        let rows = db.submissions_by_assignment(f.assignment.id).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_grading_is_write_once() {
        let f = fixture().await;

        let submission = f
            .campus
            .assignments
            .submit(&f.learner, f.assignment.id, "hello", "")
            .await
            .unwrap();

        let grade = f
            .campus
            .assignments
            .grade(&f.instructor, f.assignment.id, submission.id, 85)
            .await
            .expect("grades");
        assert_eq!(grade.score, 85);

        let result = f
            .campus
            .assignments
            .grade(&f.instructor, f.assignment.id, submission.id, 90)
            .await;
        assert!(matches!(result, Err(WorkflowError::AlreadyGraded)));

        // The rejected attempt changed nothing
        let db = testing::database(&f.campus);
        let stored = db.grade_by_submission(submission.id).await.unwrap();
        assert_eq!(stored.score, 85);
    }

    #[tokio::test]
    async fn test_grade_rejects_id_confusion() {
        let f = fixture().await;

        let unrelated = f
            .campus
            .assignments
            .create_assignment(&f.instructor, f.course.id, "Second essay", "")
            .await
            .unwrap();

        let submission = f
            .campus
            .assignments
            .submit(&f.learner, f.assignment.id, "hello", "")
            .await
            .unwrap();

        let result = f
            .campus
            .assignments
            .grade(&f.instructor, unrelated.id, submission.id, 50)
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::Db(e)) if e.is_not_found()
        ));
    }

    #[tokio::test]
    async fn test_grading_is_owner_only() {
        let f = fixture().await;
        let admin = testing::database(&f.campus)
            .user_by_email("admin@campus.test")
            .await
            .unwrap();
        let other = testing::instructor(&f.campus, "other-instructor@campus.test").await;

        let submission = f
            .campus
            .assignments
            .submit(&f.learner, f.assignment.id, "hello", "")
            .await
            .unwrap();

        // Neither a non-owning instructor nor an admin may grade
        for actor in [&other, &admin] {
            let result = f
                .campus
                .assignments
                .grade(actor, f.assignment.id, submission.id, 70)
                .await;

            assert!(matches!(
                result,
                Err(WorkflowError::Denied(DenyReason::NotCourseOwner))
            ));
        }
    }

    #[tokio::test]
    async fn test_score_range_is_validated() {
        let f = fixture().await;

        let submission = f
            .campus
            .assignments
            .submit(&f.learner, f.assignment.id, "hello", "")
            .await
            .unwrap();

        for score in [-1, 101] {
            let result = f
                .campus
                .assignments
                .grade(&f.instructor, f.assignment.id, submission.id, score)
                .await;

            assert!(matches!(result, Err(WorkflowError::Invalid(_))));
        }
    }

    #[tokio::test]
    async fn test_view_is_role_aware() {
        let f = fixture().await;

        f.campus
            .assignments
            .submit(&f.learner, f.assignment.id, "hello", "")
            .await
            .unwrap();

        let staff_view = f
            .campus
            .assignments
            .view(&f.instructor, f.course.id, f.assignment.id)
            .await
            .expect("staff view");
        assert_eq!(staff_view.submissions.len(), 1);
        assert!(staff_view.own.is_none());

        let learner_view = f
            .campus
            .assignments
            .view(&f.learner, f.course.id, f.assignment.id)
            .await
            .expect("learner view");
        assert!(learner_view.submissions.is_empty());
        assert_eq!(
            learner_view
                .own
                .as_ref()
                .and_then(|o| o.submission.submission_text.as_deref()),
            Some("hello")
        );
    }

    #[tokio::test]
    async fn test_view_rejects_course_mismatch() {
        let f = fixture().await;

        let unrelated = f
            .campus
            .catalog
            .create_course(
                &f.instructor,
                CourseDraft {
                    title: "Unrelated".to_string(),
                    description: None,
                    published: false,
                    instructor_id: None,
                },
            )
            .await
            .unwrap();

        let result = f
            .campus
            .assignments
            .view(&f.instructor, unrelated.id, f.assignment.id)
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::Db(e)) if e.is_not_found()
        ));
    }
}
