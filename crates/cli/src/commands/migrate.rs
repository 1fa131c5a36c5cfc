//! Database migration command.
//!
//! Applies the SQL files in `crates/storefront/migrations/` (or `--dir`) in
//! version order. Already-applied versions are skipped.

use std::path::Path;

use sqlx::migrate::Migrator;

use super::{CliError, connect};

/// Migrations shipped with the storefront crate.
pub const DEFAULT_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../storefront/migrations");

/// Run storefront database migrations from `dir`.
///
/// # Errors
///
/// Returns error if the directory can't be read, the database is unreachable,
/// or a migration fails.
pub async fn run(dir: &Path) -> Result<(), CliError> {
    let migrator = Migrator::new(dir).await?;
    tracing::info!(dir = %dir.display(), count = migrator.iter().count(), "Loaded migrations");

    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    migrator.run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
