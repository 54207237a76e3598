use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use campus_core::{Campus, PgDatabase};
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod assignments;
mod auth;
mod context;
mod courses;
mod docs;
mod errors;
mod progress;
mod roster;
mod schemas;
mod serialized;

pub use context::ServerContext;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 8950;

pub type Router = axum::Router<ServerContext>;

/// Starts the campus server
pub async fn run_server(campus: Arc<Campus<PgDatabase>>) {
    let port = env::var("CAMPUS_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let context = ServerContext { campus };

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .merge(courses::router())
        .merge(progress::router())
        .merge(assignments::router())
        .merge(roster::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {}", port);

    axum::serve(
        listener,
        root_router.with_state(context).into_make_service(),
    )
    .await
    .expect("serves requests");
}
