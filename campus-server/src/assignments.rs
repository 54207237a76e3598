use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post, put},
    Json,
};
use campus_core::UpdatedAssignment;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{
        GradeSchema, NewAssignmentSchema, SubmissionSchema, UpdateAssignmentSchema, ValidatedJson,
    },
    serialized::{Assignment, AssignmentView, Grade, Submission, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/courses/{id}/assignments",
    tag = "assignments",
    request_body = NewAssignmentSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Assignment)
    )
)]
async fn create_assignment(
    session: Session,
    State(context): State<ServerContext>,
    Path(course_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<NewAssignmentSchema>,
) -> ServerResult<Json<Assignment>> {
    let assignment = context
        .campus
        .assignments
        .create_assignment(&session.user(), course_id, &body.title, &body.description)
        .await?;

    Ok(Json(assignment.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/courses/{id}/assignments/{assignment_id}",
    tag = "assignments",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The assignment with the submissions the caller may see", body = AssignmentView)
    )
)]
async fn assignment_view(
    session: Session,
    State(context): State<ServerContext>,
    Path((course_id, assignment_id)): Path<(i32, i32)>,
) -> ServerResult<Json<AssignmentView>> {
    let view = context
        .campus
        .assignments
        .view(&session.user(), course_id, assignment_id)
        .await?;

    Ok(Json(view.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/assignments/{id}",
    tag = "assignments",
    request_body = UpdateAssignmentSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Assignment)
    )
)]
async fn update_assignment(
    session: Session,
    State(context): State<ServerContext>,
    Path(assignment_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateAssignmentSchema>,
) -> ServerResult<Json<Assignment>> {
    let assignment = context
        .campus
        .assignments
        .update_assignment(
            &session.user(),
            UpdatedAssignment {
                id: assignment_id,
                title: body.title,
                description: body.description,
            },
        )
        .await?;

    Ok(Json(assignment.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/assignments/{id}",
    tag = "assignments",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Assignment and its submissions were deleted")
    )
)]
async fn delete_assignment(
    session: Session,
    State(context): State<ServerContext>,
    Path(assignment_id): Path<i32>,
) -> ServerResult<()> {
    context
        .campus
        .assignments
        .delete_assignment(&session.user(), assignment_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    put,
    path = "/v1/assignments/{id}/submission",
    tag = "assignments",
    request_body = SubmissionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The submission was saved; a resubmission overwrites the previous one", body = Submission)
    )
)]
async fn submit(
    session: Session,
    State(context): State<ServerContext>,
    Path(assignment_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<SubmissionSchema>,
) -> ServerResult<Json<Submission>> {
    let submission = context
        .campus
        .assignments
        .submit(
            &session.user(),
            assignment_id,
            &body.submission_text,
            &body.file_url,
        )
        .await?;

    Ok(Json(submission.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/assignments/{id}/submissions/{submission_id}/grade",
    tag = "assignments",
    request_body = GradeSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Grade),
        (status = 409, description = "The submission is already graded")
    )
)]
async fn grade(
    session: Session,
    State(context): State<ServerContext>,
    Path((assignment_id, submission_id)): Path<(i32, i32)>,
    ValidatedJson(body): ValidatedJson<GradeSchema>,
) -> ServerResult<Json<Grade>> {
    let grade = context
        .campus
        .assignments
        .grade(&session.user(), assignment_id, submission_id, body.score)
        .await?;

    Ok(Json(grade.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/courses/:id/assignments", post(create_assignment))
        .route(
            "/courses/:id/assignments/:assignment_id",
            get(assignment_view),
        )
        .route("/assignments/:id", patch(update_assignment))
        .route("/assignments/:id", delete(delete_assignment))
        .route("/assignments/:id/submission", put(submit))
        .route(
            "/assignments/:id/submissions/:submission_id/grade",
            post(grade),
        )
}
