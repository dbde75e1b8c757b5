use crate::config::DatabaseConfig;
use log::info;
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use std::io;
use std::path::Path;
use tokio::fs::{create_dir_all, File};

pub mod entities;
mod migration;
#[cfg(test)]
mod seed;

pub type DbResult<T> = Result<T, sea_orm::DbErr>;

/// Connects to the authoritative store, creating the backing file if it
/// doesn't exist yet and running any pending migrations
pub async fn connect(config: &DatabaseConfig) -> io::Result<DatabaseConnection> {
    info!("Connecting to database..");

    let file_path = Path::new(&config.file);
    if let Some(parent) = file_path.parent() {
        if !parent.exists() {
            create_dir_all(parent).await?;
        }
    }

    if !file_path.exists() {
        File::create(file_path).await?;
    }

    let con_str = format!("sqlite:{}", &config.file);
    let connection = sea_orm::Database::connect(&con_str).await.map_err(|err| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Unable to create database connection: {err:?}"),
        )
    })?;

    info!("Connected to database: {con_str}");

    Migrator::up(&connection, None).await.map_err(|err| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Unable to run database migrations: {err:?}"),
        )
    })?;

    Ok(connection)
}
