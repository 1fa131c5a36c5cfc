//! User account management.
//!
//! Admin rights are only ever granted here; the API has no way to do it.

use cartwheel_core::{Email, UserRole};
use cartwheel_storefront::db::{RepositoryError, Stores};

use super::{CliError, connect};

/// Give the account registered under `email` the admin role.
///
/// # Errors
///
/// Returns error if the email is malformed, no such user exists, or the
/// database is unreachable.
pub async fn promote(email: &str) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(|e| CliError::InvalidEmail(e.to_string()))?;

    let stores = Stores::postgres(connect().await?);
    let user = match stores.users.set_role(&email, UserRole::Admin).await {
        Ok(user) => user,
        Err(RepositoryError::NotFound) => return Err(CliError::UserNotFound(email.to_string())),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = %user.id, email = %user.email, "User promoted to admin");
    Ok(())
}

/// Delete every user account. Carts, wishlists and orders go with them.
///
/// # Errors
///
/// Returns [`CliError::NotConfirmed`] unless `confirmed`, or a database error.
pub async fn purge(confirmed: bool) -> Result<u64, CliError> {
    if !confirmed {
        return Err(CliError::NotConfirmed);
    }

    let stores = Stores::postgres(connect().await?);
    let deleted = stores.users.delete_all().await?;

    tracing::warn!(deleted, "All user accounts deleted");
    Ok(deleted)
}
