use std::sync::Arc;

use axum::extract::FromRef;
use campus_core::{Campus, PgDatabase};

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub campus: Arc<Campus<PgDatabase>>,
}
