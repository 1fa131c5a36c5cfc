//! Cartwheel CLI - database migrations and store management.
//!
//! # Usage
//!
//! ```bash
//! # Apply storefront migrations
//! cartwheel migrate
//!
//! # Load catalog products from a YAML file
//! cartwheel seed products catalog.yaml
//!
//! # Grant the admin role
//! cartwheel users promote ops@example.com
//!
//! # Delete every user account (and their carts, wishlists and orders)
//! cartwheel users purge --yes
//! ```
//!
//! Every command reads `STOREFRONT_DATABASE_URL`, falling back to
//! `DATABASE_URL`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cartwheel")]
#[command(author, version, about = "Cartwheel CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        /// Migrations directory
        #[arg(long, default_value = commands::migrate::DEFAULT_DIR)]
        dir: PathBuf,
    },
    /// Load data into the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage user accounts
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert catalog products from a YAML file
    Products {
        /// YAML file with a top-level `products` list
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// Give an existing user the admin role
    Promote {
        /// Email address of the account
        email: String,
    },
    /// Delete every user account
    Purge {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate { dir } => commands::migrate::run(&dir).await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => {
                commands::seed::products(&file).await?;
            }
        },
        Commands::Users { action } => match action {
            UsersAction::Promote { email } => commands::users::promote(&email).await?,
            UsersAction::Purge { yes } => {
                commands::users::purge(yes).await?;
            }
        },
    }
    Ok(())
}
