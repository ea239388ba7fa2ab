pub mod models;
pub mod test_utils;

use sea_orm::{Database, DatabaseConnection, DbErr};
use std::path::Path;
use util::config;

/// Opens the configured database.
///
/// `DATABASE_PATH` may be a full DSN; anything else is treated as a SQLite
/// file path and opened in create mode.
pub async fn connect() -> Result<DatabaseConnection, DbErr> {
    // SQLite won't create intermediate dirs.
    if let Some(parent) = config::database_file().as_deref().and_then(|f| Path::new(f).parent()) {
        let _ = std::fs::create_dir_all(parent);
    }

    Database::connect(&config::database_url()).await
}
