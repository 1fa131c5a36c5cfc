//! Authentication service.
//!
//! Password accounts with Argon2id hashes and signed bearer tokens.

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, TokenError, TokenSigner};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use cartwheel_core::api::{LoginRequest, RegisterRequest, UpdateProfileRequest};
use cartwheel_core::{Email, UserId};

use crate::db::{RepositoryError, UserStore};
use crate::models::{ProfileChanges, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum name length.
const MIN_NAME_LENGTH: usize = 2;

/// Characters that satisfy the special-character rule.
const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// Authentication service.
///
/// Handles registration, login and profile changes.
pub struct AuthService<'a> {
    users: &'a dyn UserStore,
    tokens: &'a TokenSigner,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a dyn UserStore, tokens: &'a TokenSigner) -> Self {
        Self { users, tokens }
    }

    /// Register a new account and issue its first token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` for a bad name, email or password and
    /// `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<(User, String), AuthError> {
        let name = validate_name(&request.name)?;
        let email = parse_email(&request.email)?;
        validate_password(&request.password)?;

        let password_hash = hash_password(&request.password)?;

        let user = self
            .users
            .create_with_password(&name, &email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        let token = self.tokens.issue(user.id, user.role)?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok((user, token))
    }

    /// Verify credentials and issue a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<(User, String), AuthError> {
        let email = Email::parse(&request.email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&request.password, &password_hash)?;

        let token = self.tokens.issue(user.id, user.role)?;
        Ok((user, token))
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Apply a profile update. Absent or blank fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` for bad input, `AuthError::UserAlreadyExists`
    /// when the new email belongs to someone else and `AuthError::UserNotFound`
    /// when the account is gone.
    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        request: &UpdateProfileRequest,
    ) -> Result<User, AuthError> {
        let changes = ProfileChanges {
            name: non_blank(request.name.as_deref())
                .map(validate_name)
                .transpose()?,
            email: non_blank(request.email.as_deref())
                .map(parse_email)
                .transpose()?,
            password_hash: match non_blank(request.password.as_deref()) {
                Some(password) => {
                    validate_password(password)?;
                    Some(hash_password(password)?)
                }
                None => None,
            },
        };

        if changes.is_empty() {
            return self.get_user(user_id).await;
        }

        self.users
            .update_profile(user_id, &changes)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate a display name: letters and spaces, at least two characters.
fn validate_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.chars().count() < MIN_NAME_LENGTH {
        return Err(AuthError::Invalid(format!(
            "Name must be at least {MIN_NAME_LENGTH} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
    {
        return Err(AuthError::Invalid(
            "Name can only contain letters and spaces".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn parse_email(email: &str) -> Result<Email, AuthError> {
    Email::parse(email).map_err(|_| AuthError::Invalid("Invalid email format".to_string()))
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Invalid(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if !(has_lower && has_upper && has_digit && has_special) {
        return Err(AuthError::Invalid(format!(
            "Password must include uppercase, lowercase, number, and special character ({PASSWORD_SPECIALS})"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;
    use crate::db::MemoryStore;

    fn signer() -> TokenSigner {
        TokenSigner::new(
            SecretString::from("k3Y!v9#Qz2@Lm8$Rt5%Wx1^Bn7&Hc4*Pd6"),
            Duration::from_secs(60),
        )
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            password: "Analytic1!".to_string(),
        }
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Ada  ").unwrap(), "Ada");
        assert!(validate_name("A").is_err());
        assert!(validate_name("R2D2").is_err());
    }

    #[test]
    fn test_validate_password_rules() {
        assert!(validate_password("Sh0rt!").is_err());
        assert!(validate_password("alllowercase1!").is_err());
        assert!(validate_password("NoDigitsHere!").is_err());
        assert!(validate_password("NoSpecial123").is_err());
        assert!(validate_password("Analytic1!").is_ok());
    }

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("Analytic1!").unwrap();
        assert!(verify_password("Analytic1!", &hash).is_ok());
        assert!(matches!(
            verify_password("Analytic2!", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let tokens = signer();
        let auth = AuthService::new(&store, &tokens);

        let (user, token) = auth
            .register(&register_request("Ada@Example.com"))
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "ada@example.com");
        assert_eq!(tokens.verify(&token).unwrap().user.id, user.id);

        let (logged_in, _) = auth
            .login(&LoginRequest {
                email: "ada@example.com".to_string(),
                password: "Analytic1!".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let store = MemoryStore::new();
        let tokens = signer();
        let auth = AuthService::new(&store, &tokens);

        auth.register(&register_request("ada@example.com"))
            .await
            .unwrap();
        let err = auth
            .register(&register_request("ADA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let store = MemoryStore::new();
        let tokens = signer();
        let auth = AuthService::new(&store, &tokens);
        auth.register(&register_request("ada@example.com"))
            .await
            .unwrap();

        let err = auth
            .login(&LoginRequest {
                email: "ada@example.com".to_string(),
                password: "Wrong1!pass".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_update_profile_ignores_blank_fields() {
        let store = MemoryStore::new();
        let tokens = signer();
        let auth = AuthService::new(&store, &tokens);
        let (user, _) = auth
            .register(&register_request("ada@example.com"))
            .await
            .unwrap();

        let updated = auth
            .update_profile(
                user.id,
                &UpdateProfileRequest {
                    name: Some("Countess Ada".to_string()),
                    email: Some("  ".to_string()),
                    password: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Countess Ada");
        assert_eq!(updated.email.as_str(), "ada@example.com");
    }
}
