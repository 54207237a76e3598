use log::{info, warn};
use std::sync::Arc;

use crate::{
    Access, AssignmentData, ContentItemData, ContentType, CourseData, Database, DatabaseError,
    DenyReason, ModuleData, NewContentItem, NewCourse, NewModule, PrimaryKey, Role,
    UpdatedContentItem, UpdatedCourse, UpdatedModule, UserData, WorkflowError,
};

/// Courses, their modules and content items: creation, editing, deletion and
/// the gated read views.
pub struct Catalog<Db> {
    db: Arc<Db>,
    access: Access<Db>,
}

/// Input for a new course. Admins must name the owning instructor;
/// instructors own what they create.
#[derive(Debug)]
pub struct CourseDraft {
    pub title: String,
    pub description: Option<String>,
    pub published: bool,
    pub instructor_id: Option<PrimaryKey>,
}

/// Input for a new content item. The kind is parsed strictly; anything but
/// `page` or `link` is rejected.
#[derive(Debug)]
pub struct ContentItemDraft {
    pub title: String,
    pub kind: String,
    pub content: String,
}

/// A course with its ordered structure
#[derive(Debug)]
pub struct CourseOutline {
    pub course: CourseData,
    pub modules: Vec<ModuleOutline>,
    pub assignments: Vec<AssignmentData>,
}

#[derive(Debug)]
pub struct ModuleOutline {
    pub module: ModuleData,
    pub items: Vec<ContentItemData>,
}

/// A single content item with its sibling navigation. `previous` and `next`
/// are by position within the same module; there is no wraparound.
#[derive(Debug)]
pub struct ItemView {
    pub module: ModuleData,
    pub item: ContentItemData,
    pub previous: Option<ContentItemData>,
    pub next: Option<ContentItemData>,
}

impl<Db> Catalog<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            access: Access::new(db),
        }
    }

    /// The courses an actor gets to see listed: admins all of them,
    /// instructors their own, learners the ones they are enrolled in.
    pub async fn courses_for(&self, actor: &UserData) -> Result<Vec<CourseData>, WorkflowError> {
        let courses = match actor.role {
            Role::Admin => self.db.list_courses().await?,
            Role::Instructor => self.db.courses_by_instructor(actor.id).await?,
            Role::Learner => self.db.courses_by_learner(actor.id).await?,
        };

        Ok(courses)
    }

    pub async fn create_course(
        &self,
        actor: &UserData,
        draft: CourseDraft,
    ) -> Result<CourseData, WorkflowError> {
        let title = draft.title.trim();

        if title.is_empty() {
            return Err(WorkflowError::Invalid("Title is required".to_string()));
        }

        let instructor_id = match actor.role {
            Role::Instructor => actor.id,
            Role::Admin => draft.instructor_id.ok_or_else(|| {
                WorkflowError::Invalid("An instructor must be assigned".to_string())
            })?,
            Role::Learner => return Err(DenyReason::StaffOnly.into()),
        };

        if actor.role == Role::Admin {
            let instructor = self.db.user_by_id(instructor_id).await?;

            if instructor.role != Role::Instructor {
                return Err(WorkflowError::Invalid(
                    "Assigned user must be an instructor".to_string(),
                ));
            }
        }

        let course = self
            .db
            .create_course(NewCourse {
                title: title.to_string(),
                description: draft.description,
                instructor_id,
                published: draft.published,
            })
            .await?;

        info!(
            "Course '{}' created for instructor {}",
            course.title, course.instructor_id
        );

        Ok(course)
    }

    pub async fn update_course(
        &self,
        actor: &UserData,
        update: UpdatedCourse,
    ) -> Result<CourseData, WorkflowError> {
        let course = self.db.course_by_id(update.id).await?;
        Access::<Db>::can_edit_course(actor, &course).require()?;

        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(WorkflowError::Invalid("Title is required".to_string()));
            }
        }

        Ok(self.db.update_course(update).await?)
    }

    /// Deletes a course and everything under it: modules, content items,
    /// assignments, submissions, grades and enrollments. Irreversible.
    pub async fn delete_course(
        &self,
        actor: &UserData,
        course_id: PrimaryKey,
    ) -> Result<(), WorkflowError> {
        let course = self.db.course_by_id(course_id).await?;
        Access::<Db>::can_edit_course(actor, &course).require()?;

        warn!(
            "Deleting course '{}' ({}) and all of its content",
            course.title, course.id
        );

        Ok(self.db.delete_course(course_id).await?)
    }

    pub async fn create_module(
        &self,
        actor: &UserData,
        course_id: PrimaryKey,
        title: &str,
    ) -> Result<ModuleData, WorkflowError> {
        let course = self.db.course_by_id(course_id).await?;
        Access::<Db>::can_edit_course(actor, &course).require()?;

        let title = title.trim();

        if title.is_empty() {
            return Err(WorkflowError::Invalid("Title is required".to_string()));
        }

        let module = self
            .db
            .create_module(NewModule {
                course_id,
                title: title.to_string(),
            })
            .await?;

        Ok(module)
    }

    pub async fn update_module(
        &self,
        actor: &UserData,
        update: UpdatedModule,
    ) -> Result<ModuleData, WorkflowError> {
        let module = self.db.module_by_id(update.id).await?;
        self.require_edit(actor, module.course_id).await?;

        if update.title.trim().is_empty() {
            return Err(WorkflowError::Invalid("Title is required".to_string()));
        }

        Ok(self.db.update_module(update).await?)
    }

    pub async fn delete_module(
        &self,
        actor: &UserData,
        module_id: PrimaryKey,
    ) -> Result<(), WorkflowError> {
        let module = self.db.module_by_id(module_id).await?;
        self.require_edit(actor, module.course_id).await?;

        Ok(self.db.delete_module(module_id).await?)
    }

    pub async fn create_content_item(
        &self,
        actor: &UserData,
        module_id: PrimaryKey,
        draft: ContentItemDraft,
    ) -> Result<ContentItemData, WorkflowError> {
        let module = self.db.module_by_id(module_id).await?;
        self.require_edit(actor, module.course_id).await?;

        let kind = ContentType::parse(&draft.kind)
            .ok_or_else(|| WorkflowError::Invalid("Invalid content type".to_string()))?;

        let title = draft.title.trim();
        let content = draft.content.trim();

        if title.is_empty() || content.is_empty() {
            return Err(WorkflowError::Invalid(
                "Title and content are required".to_string(),
            ));
        }

        let item = self
            .db
            .create_content_item(NewContentItem {
                module_id,
                kind,
                title: title.to_string(),
                content: content.to_string(),
            })
            .await?;

        Ok(item)
    }

    pub async fn update_content_item(
        &self,
        actor: &UserData,
        update: UpdatedContentItem,
    ) -> Result<ContentItemData, WorkflowError> {
        let item = self.db.content_item_by_id(update.id).await?;
        let module = self.db.module_by_id(item.module_id).await?;
        self.require_edit(actor, module.course_id).await?;

        Ok(self.db.update_content_item(update).await?)
    }

    pub async fn delete_content_item(
        &self,
        actor: &UserData,
        item_id: PrimaryKey,
    ) -> Result<(), WorkflowError> {
        let item = self.db.content_item_by_id(item_id).await?;
        let module = self.db.module_by_id(item.module_id).await?;
        self.require_edit(actor, module.course_id).await?;

        Ok(self.db.delete_content_item(item_id).await?)
    }

    /// The full structure of a course, for anyone allowed to view it
    pub async fn course_outline(
        &self,
        actor: &UserData,
        course_id: PrimaryKey,
    ) -> Result<CourseOutline, WorkflowError> {
        let course = self.db.course_by_id(course_id).await?;
        self.access
            .can_view_course(actor, &course)
            .await?
            .require()?;

        let mut modules = vec![];

        for module in self.db.modules_by_course(course_id).await? {
            let items = self.db.content_items_by_module(module.id).await?;
            modules.push(ModuleOutline { module, items });
        }

        let assignments = self.db.assignments_by_course(course_id).await?;

        Ok(CourseOutline {
            course,
            modules,
            assignments,
        })
    }

    /// A content item with prev/next navigation. The item must belong to
    /// the stated course; a mismatching pair reads as not found.
    pub async fn content_item_view(
        &self,
        actor: &UserData,
        course_id: PrimaryKey,
        item_id: PrimaryKey,
    ) -> Result<ItemView, WorkflowError> {
        let item = self.db.content_item_by_id(item_id).await?;
        let module = self.db.module_by_id(item.module_id).await?;

        if module.course_id != course_id {
            return Err(DatabaseError::NotFound {
                resource: "content item",
                identifier: "course",
            }
            .into());
        }

        let course = self.db.course_by_id(course_id).await?;
        self.access
            .can_view_course(actor, &course)
            .await?
            .require()?;

        let siblings = self.db.content_items_by_module(module.id).await?;
        let index = siblings.iter().position(|s| s.id == item.id);

        let previous = index
            .filter(|i| *i > 0)
            .and_then(|i| siblings.get(i - 1))
            .cloned();
        let next = index.and_then(|i| siblings.get(i + 1)).cloned();

        Ok(ItemView {
            module,
            item,
            previous,
            next,
        })
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
    use crate::{testing, DenyReason};

    async fn course_owned_by<Db: Database>(
        catalog: &Catalog<Db>,
        instructor: &UserData,
    ) -> CourseData {
        catalog
            .create_course(
                instructor,
                CourseDraft {
                    title: "Rust 101".to_string(),
                    description: Some("An introduction".to_string()),
                    published: true,
                    instructor_id: None,
                },
            )
            .await
            .expect("creates course")
    }

    #[tokio::test]
    async fn test_admin_assigns_instructor() {
        let (campus, admin, instructor, learner) = testing::campus_with_roles().await;

        let course = campus
            .catalog
            .create_course(
                &admin,
                CourseDraft {
                    title: "Assigned".to_string(),
                    description: None,
                    published: false,
                    instructor_id: Some(instructor.id),
                },
            )
            .await
            .expect("creates course");

        assert_eq!(course.instructor_id, instructor.id);

        // Assigning a learner as owner is a validation failure
        let result = campus
            .catalog
            .create_course(
                &admin,
                CourseDraft {
                    title: "Broken".to_string(),
                    description: None,
                    published: false,
                    instructor_id: Some(learner.id),
                },
            )
            .await;

        assert!(matches!(result, Err(WorkflowError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_learner_cannot_create_course() {
        let (campus, _, _, learner) = testing::campus_with_roles().await;

        let result = campus
            .catalog
            .create_course(
                &learner,
                CourseDraft {
                    title: "Nope".to_string(),
                    description: None,
                    published: false,
                    instructor_id: None,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::Denied(DenyReason::StaffOnly))
        ));
    }

    #[tokio::test]
    async fn test_module_ordering_is_monotonic() {
        let (campus, _, instructor, _) = testing::campus_with_roles().await;
        let course = course_owned_by(&campus.catalog, &instructor).await;

        let first = campus
            .catalog
            .create_module(&instructor, course.id, "Basics")
            .await
            .expect("creates module");

        // Interleave content creation in the first module between the
        // sibling modules; it must not disturb module positions.
        campus
            .catalog
            .create_content_item(
                &instructor,
                first.id,
                ContentItemDraft {
                    title: "Welcome".to_string(),
                    kind: "page".to_string(),
                    content: "Hello".to_string(),
                },
            )
            .await
            .expect("creates item");

        let second = campus
            .catalog
            .create_module(&instructor, course.id, "Ownership")
            .await
            .expect("creates module");

        campus
            .catalog
            .create_content_item(
                &instructor,
                second.id,
                ContentItemDraft {
                    title: "Borrowing".to_string(),
                    kind: "page".to_string(),
                    content: "...".to_string(),
                },
            )
            .await
            .expect("creates item");

        let third = campus
            .catalog
            .create_module(&instructor, course.id, "Lifetimes")
            .await
            .expect("creates module");

        assert_eq!(
            (first.position, second.position, third.position),
            (1, 2, 3)
        );
    }

    #[tokio::test]
    async fn test_item_ordering_is_scoped_to_module() {
        let (campus, _, instructor, _) = testing::campus_with_roles().await;
        let course = course_owned_by(&campus.catalog, &instructor).await;

        let module_a = campus
            .catalog
            .create_module(&instructor, course.id, "A")
            .await
            .unwrap();
        let module_b = campus
            .catalog
            .create_module(&instructor, course.id, "B")
            .await
            .unwrap();

        let draft = |title: &str| ContentItemDraft {
            title: title.to_string(),
            kind: "page".to_string(),
            content: "body".to_string(),
        };

        let a1 = campus
            .catalog
            .create_content_item(&instructor, module_a.id, draft("a1"))
            .await
            .unwrap();
        let b1 = campus
            .catalog
            .create_content_item(&instructor, module_b.id, draft("b1"))
            .await
            .unwrap();
        let a2 = campus
            .catalog
            .create_content_item(&instructor, module_a.id, draft("a2"))
            .await
            .unwrap();

        assert_eq!((a1.position, a2.position), (1, 2));
        assert_eq!(b1.position, 1);
    }

    #[tokio::test]
    async fn test_content_type_is_strict() {
        let (campus, _, instructor, _) = testing::campus_with_roles().await;
        let course = course_owned_by(&campus.catalog, &instructor).await;
        let module = campus
            .catalog
            .create_module(&instructor, course.id, "M")
            .await
            .unwrap();

        let result = campus
            .catalog
            .create_content_item(
                &instructor,
                module.id,
                ContentItemDraft {
                    title: "Video".to_string(),
                    kind: "video".to_string(),
                    content: "https://example.com".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(WorkflowError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_non_owner_cannot_edit_structure() {
        let (campus, _, instructor, _) = testing::campus_with_roles().await;
        let other = testing::instructor(&campus, "other-instructor@campus.test").await;
        let course = course_owned_by(&campus.catalog, &instructor).await;

        let result = campus
            .catalog
            .create_module(&other, course.id, "Intruding module")
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::Denied(DenyReason::NotCourseOwner))
        ));
    }

    #[tokio::test]
    async fn test_view_policy_is_strict() {
        let (campus, admin, instructor, learner) = testing::campus_with_roles().await;
        let other = testing::instructor(&campus, "other-instructor@campus.test").await;
        let course = course_owned_by(&campus.catalog, &instructor).await;

        // Owner and admin see it
        assert!(campus
            .catalog
            .course_outline(&instructor, course.id)
            .await
            .is_ok());
        assert!(campus.catalog.course_outline(&admin, course.id).await.is_ok());

        // A non-owning instructor does not
        let result = campus.catalog.course_outline(&other, course.id).await;
        assert!(matches!(
            result,
            Err(WorkflowError::Denied(DenyReason::NoCourseAccess))
        ));

        // A learner only after enrolling
        let result = campus.catalog.course_outline(&learner, course.id).await;
        assert!(matches!(result, Err(WorkflowError::Denied(_))));

        campus
            .progress
            .enroll(&instructor, course.id, &learner.email)
            .await
            .expect("enrolls");

        assert!(campus
            .catalog
            .course_outline(&learner, course.id)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_item_view_navigation() {
        let (campus, _, instructor, _) = testing::campus_with_roles().await;
        let course = course_owned_by(&campus.catalog, &instructor).await;
        let module = campus
            .catalog
            .create_module(&instructor, course.id, "M")
            .await
            .unwrap();

        let draft = |title: &str| ContentItemDraft {
            title: title.to_string(),
            kind: "page".to_string(),
            content: "body".to_string(),
        };

        let first = campus
            .catalog
            .create_content_item(&instructor, module.id, draft("first"))
            .await
            .unwrap();
        let middle = campus
            .catalog
            .create_content_item(&instructor, module.id, draft("middle"))
            .await
            .unwrap();
        let last = campus
            .catalog
            .create_content_item(&instructor, module.id, draft("last"))
            .await
            .unwrap();

        let view = campus
            .catalog
            .content_item_view(&instructor, course.id, middle.id)
            .await
            .expect("views item");

        assert_eq!(view.previous.map(|i| i.id), Some(first.id));
        assert_eq!(view.next.map(|i| i.id), Some(last.id));

        // No wraparound at the edges
        let view = campus
            .catalog
            .content_item_view(&instructor, course.id, first.id)
            .await
            .unwrap();
        assert!(view.previous.is_none());

        let view = campus
            .catalog
            .content_item_view(&instructor, course.id, last.id)
            .await
            .unwrap();
        assert!(view.next.is_none());
    }

    #[tokio::test]
    async fn test_item_view_rejects_course_mismatch() {
        let (campus, _, instructor, _) = testing::campus_with_roles().await;
        let course = course_owned_by(&campus.catalog, &instructor).await;
        let unrelated = campus
            .catalog
            .create_course(
                &instructor,
                CourseDraft {
                    title: "Unrelated".to_string(),
                    description: None,
                    published: false,
                    instructor_id: None,
                },
            )
            .await
            .unwrap();

        let module = campus
            .catalog
            .create_module(&instructor, course.id, "M")
            .await
            .unwrap();
        let item = campus
            .catalog
            .create_content_item(
                &instructor,
                module.id,
                ContentItemDraft {
                    title: "I".to_string(),
                    kind: "page".to_string(),
                    content: "body".to_string(),
                },
            )
            .await
            .unwrap();

        let result = campus
            .catalog
            .content_item_view(&instructor, unrelated.id, item.id)
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::Db(e)) if e.is_not_found()
        ));
    }

    #[tokio::test]
    async fn test_course_delete_cascades() {
        let (campus, _, instructor, learner) = testing::campus_with_roles().await;
        let db = testing::database(&campus);

        let doomed = course_owned_by(&campus.catalog, &instructor).await;
        let survivor = campus
            .catalog
            .create_course(
                &instructor,
                CourseDraft {
                    title: "Survivor".to_string(),
                    description: None,
                    published: true,
                    instructor_id: None,
                },
            )
            .await
            .unwrap();

        let module = campus
            .catalog
            .create_module(&instructor, doomed.id, "M")
            .await
            .unwrap();
        let item = campus
            .catalog
            .create_content_item(
                &instructor,
                module.id,
                ContentItemDraft {
                    title: "I".to_string(),
                    kind: "page".to_string(),
                    content: "body".to_string(),
                },
            )
            .await
            .unwrap();
        let kept_module = campus
            .catalog
            .create_module(&instructor, survivor.id, "Kept")
            .await
            .unwrap();

        campus
            .progress
            .enroll(&instructor, doomed.id, &learner.email)
            .await
            .unwrap();
        let assignment = campus
            .assignments
            .create_assignment(&instructor, doomed.id, "Essay", "")
            .await
            .unwrap();

        campus
            .catalog
            .delete_course(&instructor, doomed.id)
            .await
            .expect("deletes");

        assert!(db.course_by_id(doomed.id).await.is_err());
        assert!(db.module_by_id(module.id).await.is_err());
        assert!(db.content_item_by_id(item.id).await.is_err());
        assert!(db.assignment_by_id(assignment.id).await.is_err());
        assert!(db.enrollment_for(learner.id, doomed.id).await.is_err());

        // Unrelated rows are untouched
        assert!(db.course_by_id(survivor.id).await.is_ok());
        assert!(db.module_by_id(kept_module.id).await.is_ok());
        assert!(db.user_by_id(learner.id).await.is_ok());
    }
}
