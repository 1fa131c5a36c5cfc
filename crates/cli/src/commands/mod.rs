//! Command implementations.

pub mod migrate;
pub mod seed;
pub mod users;

use sqlx::PgPool;
use thiserror::Error;

use cartwheel_storefront::config::{ConfigError, StorefrontConfig};
use cartwheel_storefront::db::{self, RepositoryError};

/// Errors a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("seed file has {0} invalid product(s)")]
    InvalidProducts(usize),

    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error("no user with email {0}")]
    UserNotFound(String),

    #[error("refusing to delete users without --yes")]
    NotConfirmed,
}

/// Connect to the storefront database named by the environment.
async fn connect() -> Result<PgPool, CliError> {
    let database_url = StorefrontConfig::database_url_from_env()?;
    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}
