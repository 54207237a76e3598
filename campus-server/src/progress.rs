use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{EnrollSchema, ValidatedJson},
    serialized::{CourseProgress, EnrollNotice, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/courses/{id}/enrollments",
    tag = "progress",
    request_body = EnrollSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The learner is enrolled; repeats are reported, not errored", body = EnrollNotice)
    )
)]
async fn enroll(
    session: Session,
    State(context): State<ServerContext>,
    Path(course_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<EnrollSchema>,
) -> ServerResult<Json<EnrollNotice>> {
    let outcome = context
        .campus
        .progress
        .enroll(&session.user(), course_id, &body.email)
        .await?;

    Ok(Json(outcome.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/courses/{id}/progress",
    tag = "progress",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = CourseProgress)
    )
)]
async fn course_progress(
    session: Session,
    State(context): State<ServerContext>,
    Path(course_id): Path<i32>,
) -> ServerResult<Json<CourseProgress>> {
    let progress = context
        .campus
        .progress
        .course_progress(&session.user(), course_id)
        .await?;

    Ok(Json(progress.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/courses/{id}/completions",
    tag = "progress",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Ids of the items the acting learner has completed", body = Vec<i32>)
    )
)]
async fn completed_items(
    session: Session,
    State(context): State<ServerContext>,
    Path(course_id): Path<i32>,
) -> ServerResult<Json<Vec<i32>>> {
    let items = context
        .campus
        .progress
        .completed_items(&session.user(), course_id)
        .await?;

    Ok(Json(items))
}

#[utoipa::path(
    post,
    path = "/v1/items/{id}/complete",
    tag = "progress",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The item is marked complete; repeats are no-ops")
    )
)]
async fn mark_complete(
    session: Session,
    State(context): State<ServerContext>,
    Path(item_id): Path<i32>,
) -> ServerResult<()> {
    context
        .campus
        .progress
        .mark_complete(&session.user(), item_id)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/courses/:id/enrollments", post(enroll))
        .route("/courses/:id/progress", get(course_progress))
        .route("/courses/:id/completions", get(completed_items))
        .route("/items/:id/complete", post(mark_complete))
}
