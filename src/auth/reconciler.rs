//! Decides whether an incoming credential (local or OAuth) maps to an
//! existing account, enforces uniqueness, and produces a new or updated
//! account. Holds no state of its own; the store is the only shared
//! resource, and its constraints are the real race-safety mechanism —
//! the pre-checks below exist for stable error precedence, not correctness.

use tracing::{debug, info, warn};

use crate::auth::error::AuthError;
use crate::auth::oauth::ProviderProfile;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::{Account, AccountStore, AuthProvider, NewAccount};

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub enrollment_number: Option<String>,
    pub username: Option<String>,
}

/// What an OAuth upsert did, so callers (and tests) can tell a fresh
/// account from a photo refresh from a pure no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    PhotoRefreshed,
    Unchanged,
}

/// Local registration. Conflict checks run in fixed precedence:
/// email, then enrollment number, then username.
pub async fn register(store: &dyn AccountStore, reg: Registration) -> Result<Account, AuthError> {
    if store.email_exists(&reg.email).await? {
        warn!(email = %reg.email, "registration email already taken");
        return Err(AuthError::EmailTaken);
    }
    if let Some(enrollment) = &reg.enrollment_number {
        if store.enrollment_exists(enrollment).await? {
            warn!(enrollment = %enrollment, "registration enrollment already taken");
            return Err(AuthError::EnrollmentTaken);
        }
    }
    if let Some(username) = &reg.username {
        if store.username_exists(username).await? {
            warn!(username = %username, "registration username already taken");
            return Err(AuthError::UsernameTaken);
        }
    }

    let password_hash = hash_password(&reg.password)?;

    // A concurrent writer may still win between the checks above and this
    // insert; the store surfaces the same error kinds on constraint hits.
    let account = store
        .insert(NewAccount {
            email: reg.email,
            username: reg.username,
            enrollment_number: reg.enrollment_number,
            password_hash: Some(password_hash),
            auth_provider: AuthProvider::Local,
            profile_photo_url: None,
            full_name: None,
        })
        .await?;

    info!(account_id = %account.id, email = %account.email, "account registered");
    Ok(account)
}

/// Maps an `(email, password)` pair to its account. OAuth-only accounts
/// have no password hash and never match.
pub async fn authenticate(
    store: &dyn AccountStore,
    email: &str,
    password: &str,
) -> Result<Account, AuthError> {
    let account = store
        .find_by_email(email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let hash = account
        .password_hash
        .as_deref()
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(password, hash) {
        warn!(email = %email, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    debug!(account_id = %account.id, "credentials verified");
    Ok(account)
}

/// Write-once enrollment assignment.
pub async fn assign_enrollment(
    store: &dyn AccountStore,
    account: &Account,
    enrollment_number: &str,
) -> Result<Account, AuthError> {
    if account.enrollment_number.is_some() {
        return Err(AuthError::EnrollmentAlreadySet);
    }
    if store.enrollment_exists(enrollment_number).await? {
        return Err(AuthError::EnrollmentTaken);
    }

    // Conditional write in the store re-checks both invariants atomically.
    let updated = store.assign_enrollment(account.id, enrollment_number).await?;
    info!(account_id = %updated.id, "enrollment number assigned");
    Ok(updated)
}

/// OAuth upsert keyed by email. Creating via this path cannot hit a
/// uniqueness conflict other than the email lookup itself; repeated logins
/// with an unchanged photo perform no write.
pub async fn upsert_from_provider(
    store: &dyn AccountStore,
    profile: ProviderProfile,
) -> Result<(Account, UpsertOutcome), AuthError> {
    if let Some(account) = store.find_by_email(&profile.email).await? {
        match profile.picture.as_deref() {
            Some(picture)
                if !picture.is_empty()
                    && account.profile_photo_url.as_deref() != Some(picture) =>
            {
                let updated = store.update_photo(account.id, picture).await?;
                info!(account_id = %updated.id, "profile photo refreshed");
                Ok((updated, UpsertOutcome::PhotoRefreshed))
            }
            _ => {
                debug!(account_id = %account.id, "provider login, nothing to update");
                Ok((account, UpsertOutcome::Unchanged))
            }
        }
    } else {
        let account = store
            .insert(NewAccount {
                email: profile.email,
                username: None,
                enrollment_number: None,
                password_hash: None,
                auth_provider: AuthProvider::Google,
                profile_photo_url: profile.picture,
                full_name: profile.full_name,
            })
            .await?;
        info!(account_id = %account.id, email = %account.email, "account created from provider");
        Ok((account, UpsertOutcome::Created))
    }
}
