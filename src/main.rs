use std::{env, sync::Arc};

use campus_core::{Campus, DatabaseError, PgDatabase};
use campus_server::run_server;
use log::{error, info};
use thiserror::Error;

mod logging;

#[derive(Debug, Error)]
enum BootError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("Could not initialize database: {0}")]
    Database(DatabaseError),
}

impl BootError {
    fn hint(&self) -> String {
        match self {
            BootError::MissingDatabaseUrl => {
                "Set DATABASE_URL to a postgres connection string, for example postgres://localhost/campus.".to_string()
            }
            BootError::Database(_) => {
                "This is a database error. Make sure the postgres instance is running and reachable, then try again.".to_string()
            }
        }
    }
}

async fn boot() -> Result<(), BootError> {
    let url = env::var("DATABASE_URL").map_err(|_| BootError::MissingDatabaseUrl)?;

    info!("Connecting to database...");
    let database = PgDatabase::new(&url)
        .await
        .map_err(BootError::Database)?;

    info!("Applying schema...");
    database.migrate().await.map_err(BootError::Database)?;

    let campus = Arc::new(Campus::new(database));

    info!("Initialized successfully.");
    run_server(campus).await;

    Ok(())
}

#[tokio::main]
async fn main() {
    logging::init_logger();

    if let Err(error) = boot().await {
        error!("campus failed to start! Read the error below to troubleshoot the issue.");
        error!("{}", error);
        error!("Hint: {}", error.hint());

        std::process::exit(1);
    }
}
