use std::path::Path;

use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection, DbErr};
use tracing::info;

pub struct BotDatabase {
    db: DatabaseConnection,
}

impl BotDatabase {
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, DbErr> {
        let database_url = format!("sqlite://{}?mode=rwc", path.as_ref().display());
        let db = Database::connect(&database_url).await?;
        Ok(BotDatabase { db })
    }

    pub async fn new_memory() -> Result<Self, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;
        Ok(BotDatabase { db })
    }

    /// Applies every pending schema migration.
    pub async fn migrate(&self) -> Result<(), DbErr> {
        Migrator::up(&self.db, None).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    pub fn inner(&self) -> &DatabaseConnection {
        &self.db
    }
}
