use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    routing::{get, post},
    Json,
};
use campus_core::{Credentials, NewAccount, SessionData, UserData};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{LoginSchema, RegisterSchema, ValidatedJson},
    serialized::{LoginResult, ToSerialized, User},
    Router,
};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.user.clone()
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = token.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().cloned().unwrap_or_default();

        let session = context
            .campus
            .auth
            .session(token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        Ok(Self(session))
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult)
    )
)]
async fn login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<LoginResult>> {
    let session = context
        .campus
        .auth
        .login(Credentials {
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "auth",
    request_body = RegisterSchema,
    responses(
        (status = 200, body = LoginResult)
    )
)]
async fn register(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<LoginResult>> {
    let session = context
        .campus
        .auth
        .register(NewAccount {
            email: body.email,
            password: body.password,
            role: body.role,
        })
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/admin",
    tag = "auth",
    request_body = RegisterSchema,
    responses(
        (status = 200, description = "The first admin account was created", body = LoginResult),
        (status = 409, description = "An admin already exists")
    )
)]
async fn register_admin(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<LoginResult>> {
    let session = context
        .campus
        .auth
        .register_admin(NewAccount {
            email: body.email,
            password: body.password,
            role: body.role,
        })
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Session was deleted")
    )
)]
async fn logout(session: Session, State(context): State<ServerContext>) -> ServerResult<()> {
    context.campus.auth.logout(session.token()).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/admin", post(register_admin))
        .route("/logout", post(logout))
        .route("/user", get(user))
}
