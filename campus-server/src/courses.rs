use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post},
    Json,
};
use campus_core::{
    ContentItemDraft, CourseDraft, UpdatedContentItem, UpdatedCourse, UpdatedModule,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{
        NewContentItemSchema, NewCourseSchema, NewModuleSchema, UpdateContentItemSchema,
        UpdateCourseSchema, ValidatedJson,
    },
    serialized::{ContentItem, Course, CourseOutline, ItemView, Module, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/courses",
    tag = "courses",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Course>)
    )
)]
async fn list_courses(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Course>>> {
    let courses = context.campus.catalog.courses_for(&session.user()).await?;

    Ok(Json(courses.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/courses",
    tag = "courses",
    request_body = NewCourseSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Course)
    )
)]
async fn create_course(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewCourseSchema>,
) -> ServerResult<Json<Course>> {
    let course = context
        .campus
        .catalog
        .create_course(
            &session.user(),
            CourseDraft {
                title: body.title,
                description: body.description,
                published: body.published,
                instructor_id: body.instructor_id,
            },
        )
        .await?;

    Ok(Json(course.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/courses/{id}",
    tag = "courses",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = CourseOutline)
    )
)]
async fn course_outline(
    session: Session,
    State(context): State<ServerContext>,
    Path(course_id): Path<i32>,
) -> ServerResult<Json<CourseOutline>> {
    let outline = context
        .campus
        .catalog
        .course_outline(&session.user(), course_id)
        .await?;

    Ok(Json(outline.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/courses/{id}",
    tag = "courses",
    request_body = UpdateCourseSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Course)
    )
)]
async fn update_course(
    session: Session,
    State(context): State<ServerContext>,
    Path(course_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateCourseSchema>,
) -> ServerResult<Json<Course>> {
    let course = context
        .campus
        .catalog
        .update_course(
            &session.user(),
            UpdatedCourse {
                id: course_id,
                title: body.title,
                description: body.description,
                published: body.published,
            },
        )
        .await?;

    Ok(Json(course.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/courses/{id}",
    tag = "courses",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Course and all of its content were deleted")
    )
)]
async fn delete_course(
    session: Session,
    State(context): State<ServerContext>,
    Path(course_id): Path<i32>,
) -> ServerResult<()> {
    context
        .campus
        .catalog
        .delete_course(&session.user(), course_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/courses/{id}/modules",
    tag = "courses",
    request_body = NewModuleSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Module)
    )
)]
async fn create_module(
    session: Session,
    State(context): State<ServerContext>,
    Path(course_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<NewModuleSchema>,
) -> ServerResult<Json<Module>> {
    let module = context
        .campus
        .catalog
        .create_module(&session.user(), course_id, &body.title)
        .await?;

    Ok(Json(module.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/modules/{id}",
    tag = "courses",
    request_body = NewModuleSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Module)
    )
)]
async fn update_module(
    session: Session,
    State(context): State<ServerContext>,
    Path(module_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<NewModuleSchema>,
) -> ServerResult<Json<Module>> {
    let module = context
        .campus
        .catalog
        .update_module(
            &session.user(),
            UpdatedModule {
                id: module_id,
                title: body.title,
            },
        )
        .await?;

    Ok(Json(module.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/modules/{id}",
    tag = "courses",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Module and its content items were deleted")
    )
)]
async fn delete_module(
    session: Session,
    State(context): State<ServerContext>,
    Path(module_id): Path<i32>,
) -> ServerResult<()> {
    context
        .campus
        .catalog
        .delete_module(&session.user(), module_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/modules/{id}/items",
    tag = "courses",
    request_body = NewContentItemSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = ContentItem)
    )
)]
async fn create_content_item(
    session: Session,
    State(context): State<ServerContext>,
    Path(module_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<NewContentItemSchema>,
) -> ServerResult<Json<ContentItem>> {
    let item = context
        .campus
        .catalog
        .create_content_item(
            &session.user(),
            module_id,
            ContentItemDraft {
                title: body.title,
                kind: body.kind,
                content: body.content,
            },
        )
        .await?;

    Ok(Json(item.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/courses/{id}/items/{item_id}",
    tag = "courses",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = ItemView)
    )
)]
async fn content_item_view(
    session: Session,
    State(context): State<ServerContext>,
    Path((course_id, item_id)): Path<(i32, i32)>,
) -> ServerResult<Json<ItemView>> {
    let view = context
        .campus
        .catalog
        .content_item_view(&session.user(), course_id, item_id)
        .await?;

    Ok(Json(view.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/items/{id}",
    tag = "courses",
    request_body = UpdateContentItemSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = ContentItem)
    )
)]
async fn update_content_item(
    session: Session,
    State(context): State<ServerContext>,
    Path(item_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateContentItemSchema>,
) -> ServerResult<Json<ContentItem>> {
    let item = context
        .campus
        .catalog
        .update_content_item(
            &session.user(),
            UpdatedContentItem {
                id: item_id,
                title: body.title,
                content: body.content,
            },
        )
        .await?;

    Ok(Json(item.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/items/{id}",
    tag = "courses",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Content item was deleted")
    )
)]
async fn delete_content_item(
    session: Session,
    State(context): State<ServerContext>,
    Path(item_id): Path<i32>,
) -> ServerResult<()> {
    context
        .campus
        .catalog
        .delete_content_item(&session.user(), item_id)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses", post(create_course))
        .route("/courses/:id", get(course_outline))
        .route("/courses/:id", patch(update_course))
        .route("/courses/:id", delete(delete_course))
        .route("/courses/:id/modules", post(create_module))
        .route("/courses/:id/items/:item_id", get(content_item_view))
        .route("/modules/:id", patch(update_module))
        .route("/modules/:id", delete(delete_module))
        .route("/modules/:id/items", post(create_content_item))
        .route("/items/:id", patch(update_content_item))
        .route("/items/:id", delete(delete_content_item))
}
