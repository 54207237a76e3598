use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json,
};
use campus_core::RosterEntry;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{PasswordSchema, RosterEntrySchema, ValidatedJson},
    serialized::{ToSerialized, User},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/roster",
    tag = "roster",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<User>)
    )
)]
async fn list_users(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<User>>> {
    let users = context.campus.roster.list_users(&session.user()).await?;

    Ok(Json(users.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/roster",
    tag = "roster",
    request_body = RosterEntrySchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn create_user(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RosterEntrySchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .campus
        .roster
        .create_user(
            &session.user(),
            RosterEntry {
                email: body.email,
                password: body.password,
                role: body.role,
            },
        )
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/roster/{id}",
    tag = "roster",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "User and everything they own were deleted"),
        (status = 403, description = "Deleting your own account is refused")
    )
)]
async fn delete_user(
    session: Session,
    State(context): State<ServerContext>,
    Path(user_id): Path<i32>,
) -> ServerResult<()> {
    context
        .campus
        .roster
        .delete_user(&session.user(), user_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    put,
    path = "/v1/roster/{id}/password",
    tag = "roster",
    request_body = PasswordSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Password was replaced")
    )
)]
async fn set_password(
    session: Session,
    State(context): State<ServerContext>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<PasswordSchema>,
) -> ServerResult<()> {
    context
        .campus
        .roster
        .set_password(&session.user(), user_id, &body.password)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/roster", get(list_users))
        .route("/roster", post(create_user))
        .route("/roster/:id", delete(delete_user))
        .route("/roster/:id/password", put(set_password))
}
