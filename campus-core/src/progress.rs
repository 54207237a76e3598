use log::info;
use std::sync::Arc;

use crate::{
    util::normalize_email, Access, CompletionCount, Database, DenyReason, EnrollmentData,
    NewCompletion, NewEnrollment, PrimaryKey, Role, UserData, WorkflowError,
};

/// Enrollment and completion tracking. Both are idempotent sets: duplicate
/// enrolls and repeated completion marks are no-ops, not errors.
pub struct Progress<Db> {
    db: Arc<Db>,
    access: Access<Db>,
}

/// Whether an enroll call actually inserted anything
#[derive(Debug)]
pub enum EnrollOutcome {
    Enrolled(EnrollmentData),
    AlreadyEnrolled,
}

/// Per-learner completion counts for a course
#[derive(Debug)]
pub struct CourseProgress {
    pub total_items: i64,
    pub learners: Vec<CompletionCount>,
}

impl<Db> Progress<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            access: Access::new(db),
        }
    }

    /// Enrolls a learner, by email, into a course. Only admins and the
    /// owning instructor may do this; ownership is checked against the
    /// course actually named in the request.
    pub async fn enroll(
        &self,
        actor: &UserData,
        course_id: PrimaryKey,
        learner_email: &str,
    ) -> Result<EnrollOutcome, WorkflowError> {
        let course = self.db.course_by_id(course_id).await?;
        Access::<Db>::can_enroll_into(actor, &course).require()?;

        let email = normalize_email(learner_email);
        let learner = match self.db.user_by_email(&email).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                return Err(WorkflowError::Invalid(
                    "User must exist and be a learner".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        if learner.role != Role::Learner {
            return Err(WorkflowError::Invalid(
                "User must exist and be a learner".to_string(),
            ));
        }

        match self.db.enrollment_for(learner.id, course_id).await {
            Ok(_) => return Ok(EnrollOutcome::AlreadyEnrolled),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let enrollment = self
            .db
            .create_enrollment(NewEnrollment {
                user_id: learner.id,
                course_id,
            })
            .await;

        match enrollment {
            Ok(enrollment) => {
                info!("Enrolled {} into course {}", learner.email, course.id);
                Ok(EnrollOutcome::Enrolled(enrollment))
            }
            // Someone else inserted the same pair in the meantime; the
            // unique key turns the race into the benign outcome.
            Err(e) if e.is_conflict() => Ok(EnrollOutcome::AlreadyEnrolled),
            Err(e) => Err(e.into()),
        }
    }

    /// Marks a content item complete for the acting learner. Requires an
    /// active enrollment in the item's course; repeats are no-ops.
    pub async fn mark_complete(
        &self,
        actor: &UserData,
        item_id: PrimaryKey,
    ) -> Result<(), WorkflowError> {
        if actor.role != Role::Learner {
            return Err(DenyReason::LearnerOnly.into());
        }

        let item = self.db.content_item_by_id(item_id).await?;
        let module = self.db.module_by_id(item.module_id).await?;

        if !self.access.is_enrolled(actor, module.course_id).await? {
            return Err(DenyReason::NotEnrolled.into());
        }

        self.db
            .create_completion(NewCompletion {
                user_id: actor.id,
                content_item_id: item.id,
            })
            .await?;

        Ok(())
    }

    /// Completion counts per enrolled learner, for the course staff
    pub async fn course_progress(
        &self,
        actor: &UserData,
        course_id: PrimaryKey,
    ) -> Result<CourseProgress, WorkflowError> {
        let course = self.db.course_by_id(course_id).await?;
        Access::<Db>::can_edit_course(actor, &course).require()?;

        Ok(CourseProgress {
            total_items: self.db.count_course_items(course_id).await?,
            learners: self.db.completion_counts_by_course(course_id).await?,
        })
    }

    /// The acting learner's own completed items in a course
    pub async fn completed_items(
        &self,
        actor: &UserData,
        course_id: PrimaryKey,
    ) -> Result<Vec<PrimaryKey>, WorkflowError> {
        if actor.role != Role::Learner {
            return Err(DenyReason::LearnerOnly.into());
        }

        let course = self.db.course_by_id(course_id).await?;

        if !self.access.is_enrolled(actor, course.id).await? {
            return Err(DenyReason::NotEnrolled.into());
        }

        Ok(self.db.completed_item_ids(actor.id, course_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing, ContentItemDraft, CourseDraft};

    async fn seeded_course(
        campus: &crate::Campus<crate::MemoryDatabase>,
        instructor: &UserData,
    ) -> (crate::CourseData, crate::ContentItemData) {
        let course = campus
            .catalog
            .create_course(
                instructor,
                CourseDraft {
                    title: "Tracked".to_string(),
                    description: None,
                    published: true,
                    instructor_id: None,
                },
            )
            .await
            .unwrap();

        let module = campus
            .catalog
            .create_module(instructor, course.id, "M")
            .await
            .unwrap();

        let item = campus
            .catalog
            .create_content_item(
                instructor,
                module.id,
                ContentItemDraft {
                    title: "I".to_string(),
                    kind: "page".to_string(),
                    content: "body".to_string(),
                },
            )
            .await
            .unwrap();

        (course, item)
    }

    #[tokio::test]
    async fn test_enroll_is_idempotent() {
        let (campus, _, instructor, learner) = testing::campus_with_roles().await;
        let db = testing::database(&campus);
        let (course, _) = seeded_course(&campus, &instructor).await;

        let first = campus
            .progress
            .enroll(&instructor, course.id, &learner.email)
            .await
            .expect("enrolls");
        assert!(matches!(first, EnrollOutcome::Enrolled(_)));

        let second = campus
            .progress
            .enroll(&instructor, course.id, &learner.email)
            .await
            .expect("still succeeds");
        assert!(matches!(second, EnrollOutcome::AlreadyEnrolled));

        let rows = db.enrollments_by_course(course.id).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_non_owner_cannot_enroll() {
        let (campus, _, instructor, learner) = testing::campus_with_roles().await;
        let other = testing::instructor(&campus, "other-instructor@campus.test").await;
        let db = testing::database(&campus);
        let (course, _) = seeded_course(&campus, &instructor).await;

        let result = campus
            .progress
            .enroll(&other, course.id, &learner.email)
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::Denied(DenyReason::NotCourseOwner))
        ));

        let rows = db.enrollments_by_course(course.id).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_only_learners_can_be_enrolled() {
        let (campus, _, instructor, _) = testing::campus_with_roles().await;
        let other = testing::instructor(&campus, "other-instructor@campus.test").await;
        let (course, _) = seeded_course(&campus, &instructor).await;

        let result = campus
            .progress
            .enroll(&instructor, course.id, &other.email)
            .await;
        assert!(matches!(result, Err(WorkflowError::Invalid(_))));

        let result = campus
            .progress
            .enroll(&instructor, course.id, "ghost@campus.test")
            .await;
        assert!(matches!(result, Err(WorkflowError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_mark_complete_is_idempotent() {
        let (campus, _, instructor, learner) = testing::campus_with_roles().await;
        let (course, item) = seeded_course(&campus, &instructor).await;

        campus
            .progress
            .enroll(&instructor, course.id, &learner.email)
            .await
            .unwrap();

        campus
            .progress
            .mark_complete(&learner, item.id)
            .await
            .expect("marks complete");
        campus
            .progress
            .mark_complete(&learner, item.id)
            .await
            .expect("repeat is a no-op");

        let completed = campus
            .progress
            .completed_items(&learner, course.id)
            .await
            .unwrap();
        assert_eq!(completed, vec![item.id]);
    }

    #[tokio::test]
    async fn test_mark_complete_requires_enrollment() {
        let (campus, _, instructor, learner) = testing::campus_with_roles().await;
        let (_, item) = seeded_course(&campus, &instructor).await;

        let result = campus.progress.mark_complete(&learner, item.id).await;

        assert!(matches!(
            result,
            Err(WorkflowError::Denied(DenyReason::NotEnrolled))
        ));
    }

    #[tokio::test]
    async fn test_course_progress_counts() {
        let (campus, _, instructor, learner) = testing::campus_with_roles().await;
        let (course, item) = seeded_course(&campus, &instructor).await;

        campus
            .progress
            .enroll(&instructor, course.id, &learner.email)
            .await
            .unwrap();
        campus
            .progress
            .mark_complete(&learner, item.id)
            .await
            .unwrap();

        let progress = campus
            .progress
            .course_progress(&instructor, course.id)
            .await
            .expect("reads progress");

        assert_eq!(progress.total_items, 1);
        assert_eq!(progress.learners.len(), 1);
        assert_eq!(progress.learners[0].user_id, learner.id);
        assert_eq!(progress.learners[0].completed, 1);

        // Learners do not get the staff view
        let result = campus.progress.course_progress(&learner, course.id).await;
        assert!(matches!(result, Err(WorkflowError::Denied(_))));
    }
}
