//! Sign-in, registration and sign-out
//!
//! Forms are validated before anything touches the network. With the hosted
//! backend configured the flows go through its auth service and the session
//! is kept in device storage; without it, accounts are local profiles and
//! the `is_authenticated` flag. Passwords are never written locally.

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::api::backend::{ProfileRow, SignUpMetadata};
use crate::api::{BackendClient, BackendError, Session};
use crate::models::{avatar_for, UserProfile, UserStats};
use crate::store::local::{keys, LocalStorage, StorageError};
use crate::store::stored_session;

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_BIO: &str = "Movie and TV enthusiast";

// =============================================================================
// Validation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Per-field validation messages in form order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.iter().find(|e| e.field == field).map(|e| e.message)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Loose `something@something.something` check
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"\S+@\S+\.\S+").ok())
        .as_ref()
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.add("email", "Email is invalid");
    }
}

fn check_password(errors: &mut FieldErrors, password: &str) {
    if password.is_empty() {
        errors.add("password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", "Password must be at least 6 characters");
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub country: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        if self.name.is_empty() {
            errors.add("name", "Name is required");
        } else if self.name.chars().count() < MIN_NAME_LEN {
            errors.add("name", "Name must be at least 2 characters");
        }
        check_email(&mut errors, &self.email);
        if self.country.is_empty() {
            errors.add("country", "Please select your country");
        }
        check_password(&mut errors, &self.password);
        if self.confirm_password.is_empty() {
            errors.add("confirmPassword", "Please confirm your password");
        } else if self.password != self.confirm_password {
            errors.add("confirmPassword", "Passwords do not match");
        }

        errors.into_result()
    }

    /// Profile for the new account
    fn profile(&self, id: String, today: NaiveDate) -> UserProfile {
        UserProfile {
            id,
            name: self.name.clone(),
            avatar: Some(avatar_for(&self.name)),
            email: self.email.clone(),
            country: self.country.to_uppercase(),
            joined: Some(today),
            bio: DEFAULT_BIO.to_string(),
            stats: UserStats::default(),
        }
    }
}

// =============================================================================
// Accounts
// =============================================================================

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    Invalid(FieldErrors),

    #[error("No account on this device for {0}")]
    UnknownAccount(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<FieldErrors> for AuthError {
    fn from(errors: FieldErrors) -> Self {
        AuthError::Invalid(errors)
    }
}

/// Where an account lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountMode {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    SignedIn { user_id: String, mode: AccountMode },
    SignedOut,
}

/// Account flows over device storage and the optional backend
pub struct Accounts {
    storage: LocalStorage,
    backend: Option<BackendClient>,
    events: broadcast::Sender<SessionChange>,
}

impl Accounts {
    /// `backend` is `Some` only when the hosted backend is configured
    pub fn new(storage: LocalStorage, backend: Option<BackendClient>) -> Self {
        let (events, _) = broadcast::channel(8);
        Self {
            storage,
            backend,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    pub fn mode(&self) -> AccountMode {
        if self.backend.is_some() {
            AccountMode::Remote
        } else {
            AccountMode::Local
        }
    }

    pub fn session(&self) -> Option<Session> {
        stored_session(&self.storage)
    }

    pub fn is_authenticated(&self) -> bool {
        self.storage.flag(keys::IS_AUTHENTICATED)
    }

    fn stored_profile(&self) -> Result<Option<UserProfile>, StorageError> {
        match self.storage.get_json::<UserProfile>(keys::USER_DATA) {
            Err(StorageError::InvalidValue { .. }) => Ok(None),
            other => other,
        }
    }

    fn signed_in(&self, session: Option<&Session>, user_id: String) -> Result<(), AuthError> {
        if let Some(session) = session {
            self.storage.set_json(keys::AUTH_SESSION, session)?;
        }
        self.storage.set_flag(keys::IS_AUTHENTICATED, true)?;
        let mode = self.mode();
        info!(user = %user_id, ?mode, "signed in");
        let _ = self.events.send(SessionChange::SignedIn { user_id, mode });
        Ok(())
    }

    /// Sign in; returns the user id
    pub async fn login(&self, form: &LoginForm) -> Result<String, AuthError> {
        form.validate()?;

        if let Some(client) = &self.backend {
            let session = client.sign_in(&form.email, &form.password).await?;
            let user_id = session.user.id.clone();
            self.signed_in(Some(&session), user_id.clone())?;
            return Ok(user_id);
        }

        match self.stored_profile()? {
            Some(profile) if profile.email.eq_ignore_ascii_case(&form.email) => {
                self.signed_in(None, profile.id.clone())?;
                Ok(profile.id)
            }
            _ => Err(AuthError::UnknownAccount(form.email.clone())),
        }
    }

    /// Create an account and sign in to it
    ///
    /// Locally this rewrites the device profile in place, keeping its id so
    /// the watch data stays attached.
    pub async fn register(&self, form: &RegisterForm, today: NaiveDate) -> Result<UserProfile, AuthError> {
        form.validate()?;

        if let Some(client) = &self.backend {
            let metadata = SignUpMetadata {
                full_name: form.name.clone(),
                country: form.country.to_uppercase(),
            };
            let session = client.sign_up(&form.email, &form.password, &metadata).await?;
            let profile = form.profile(session.user.id.clone(), today);
            client
                .upsert_profile(&session, &ProfileRow::from_profile(&profile))
                .await?;
            self.signed_in(Some(&session), profile.id.clone())?;
            return Ok(profile);
        }

        let existing = self.stored_profile()?;
        let id = existing
            .as_ref()
            .map(|p| p.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut profile = form.profile(id, today);
        if let Some(existing) = existing {
            profile.stats = existing.stats;
        }
        self.storage.set_json(keys::USER_DATA, &profile)?;
        self.signed_in(None, profile.id.clone())?;
        Ok(profile)
    }

    /// Sign out, keeping all watch data on the device
    pub async fn logout(&self) -> Result<(), AuthError> {
        if let (Some(client), Some(session)) = (&self.backend, self.session()) {
            if let Err(e) = client.sign_out(&session).await {
                warn!(error = %e, "remote sign-out failed; clearing session anyway");
            }
        }
        self.storage
            .remove_items(&[keys::AUTH_SESSION, keys::IS_AUTHENTICATED])?;
        info!("signed out");
        let _ = self.events.send(SessionChange::SignedOut);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_form() -> RegisterForm {
        RegisterForm {
            name: "Dimitra".into(),
            email: "dimitra@example.com".into(),
            country: "gr".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("plainaddress"));
    }

    #[test]
    fn test_login_messages() {
        let errors = LoginForm::default().validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(errors.get("password"), Some("Password is required"));

        let errors = LoginForm {
            email: "nope".into(),
            password: "123".into(),
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.get("email"), Some("Email is invalid"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters")
        );
    }

    #[test]
    fn test_register_messages() {
        assert!(register_form().validate().is_ok());

        let form = RegisterForm {
            name: "D".into(),
            country: String::new(),
            confirm_password: "other".into(),
            ..register_form()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("name"), Some("Name must be at least 2 characters"));
        assert_eq!(errors.get("country"), Some("Please select your country"));
        assert_eq!(errors.get("confirmPassword"), Some("Passwords do not match"));
        assert_eq!(errors.get("email"), None);

        let errors = RegisterForm::default().validate().unwrap_err();
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(
            errors.get("confirmPassword"),
            Some("Please confirm your password")
        );
        assert_eq!(errors.iter().count(), 5);
    }

    #[tokio::test]
    async fn test_local_register_login_logout() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("storage.json"));
        let accounts = Accounts::new(storage.clone(), None);
        let mut events = accounts.subscribe();

        let profile = accounts.register(&register_form(), today()).await.unwrap();
        assert_eq!(profile.country, "GR");
        assert_eq!(profile.joined, Some(today()));
        assert!(accounts.is_authenticated());
        assert!(matches!(events.try_recv(), Ok(SessionChange::SignedIn { .. })));
        assert!(!storage.get_item(keys::USER_DATA).unwrap().unwrap().contains("secret1"));

        accounts.logout().await.unwrap();
        assert!(!accounts.is_authenticated());
        assert_eq!(events.try_recv(), Ok(SessionChange::SignedOut));

        let login = LoginForm {
            email: "DIMITRA@example.com".into(),
            password: "whatever".into(),
        };
        assert_eq!(accounts.login(&login).await.unwrap(), profile.id);

        let stranger = LoginForm {
            email: "someone@example.com".into(),
            password: "whatever".into(),
        };
        assert!(matches!(
            accounts.login(&stranger).await,
            Err(AuthError::UnknownAccount(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_backend() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("storage.json"));
        // Unroutable backend: any request would fail with RequestFailed
        let accounts = Accounts::new(storage, Some(BackendClient::new("http://127.0.0.1:1", "anon")));
        assert!(matches!(
            accounts.login(&LoginForm::default()).await,
            Err(AuthError::Invalid(_))
        ));
    }
}
