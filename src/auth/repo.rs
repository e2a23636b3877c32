use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::error::AuthError;

/// Which path created the account's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
}

/// Account record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub enrollment_number: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // None for OAuth-only accounts
    pub auth_provider: AuthProvider,
    pub profile_photo_url: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

/// Fields supplied when creating an account. `id` and `created_at` are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: Option<String>,
    pub enrollment_number: Option<String>,
    pub password_hash: Option<String>,
    pub auth_provider: AuthProvider,
    pub profile_photo_url: Option<String>,
    pub full_name: Option<String>,
}

/// Persistence seam for accounts. The Postgres implementation is the real
/// store; tests substitute an in-memory one with the same atomicity rules.
///
/// Uniqueness of email, enrollment number and username is enforced HERE, not
/// in the reconciler: its pre-checks only exist for friendly error precedence,
/// and a concurrent writer losing the race must still get the same error kind
/// out of `insert` / `assign_enrollment`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Account>>;
    async fn email_exists(&self, email: &str) -> anyhow::Result<bool>;
    async fn enrollment_exists(&self, enrollment_number: &str) -> anyhow::Result<bool>;
    async fn username_exists(&self, username: &str) -> anyhow::Result<bool>;
    async fn insert(&self, new: NewAccount) -> Result<Account, AuthError>;
    /// Sets the enrollment number only if it is currently null.
    async fn assign_enrollment(
        &self,
        id: Uuid,
        enrollment_number: &str,
    ) -> Result<Account, AuthError>;
    async fn update_photo(&self, id: Uuid, url: &str) -> anyhow::Result<Account>;
}

const ACCOUNT_COLUMNS: &str = "id, email, username, enrollment_number, password_hash, \
     auth_provider, profile_photo_url, full_name, department, role, bio, \
     is_active, created_at";

/// `AccountStore` backed by Postgres.
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Maps a unique-constraint violation to its domain error; anything else
/// stays internal.
fn map_unique_violation(e: sqlx::Error) -> AuthError {
    let mapped = match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            match db_err.constraint() {
                Some("accounts_email_key") => Some(AuthError::EmailTaken),
                Some("accounts_enrollment_number_key") => Some(AuthError::EnrollmentTaken),
                Some("accounts_username_key") => Some(AuthError::UsernameTaken),
                _ => None,
            }
        }
        _ => None,
    };
    mapped.unwrap_or_else(|| AuthError::Internal(e.into()))
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn email_exists(&self, email: &str) -> anyhow::Result<bool> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.db)
                .await?;
        Ok(exists.0)
    }

    async fn enrollment_exists(&self, enrollment_number: &str) -> anyhow::Result<bool> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM accounts WHERE enrollment_number = $1)")
                .bind(enrollment_number)
                .fetch_one(&self.db)
                .await?;
        Ok(exists.0)
    }

    async fn username_exists(&self, username: &str) -> anyhow::Result<bool> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM accounts WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.db)
                .await?;
        Ok(exists.0)
    }

    async fn insert(&self, new: NewAccount) -> Result<Account, AuthError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts
                (email, username, enrollment_number, password_hash, auth_provider,
                 profile_photo_url, full_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.enrollment_number)
        .bind(&new.password_hash)
        .bind(new.auth_provider)
        .bind(&new.profile_photo_url)
        .bind(&new.full_name)
        .fetch_one(&self.db)
        .await
        .map_err(map_unique_violation)?;
        Ok(account)
    }

    async fn assign_enrollment(
        &self,
        id: Uuid,
        enrollment_number: &str,
    ) -> Result<Account, AuthError> {
        // Conditional write keeps write-once atomic against concurrent calls.
        let updated = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET enrollment_number = $2
            WHERE id = $1 AND enrollment_number IS NULL
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(enrollment_number)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique_violation)?;

        updated.ok_or(AuthError::EnrollmentAlreadySet)
    }

    async fn update_photo(&self, id: Uuid, url: &str) -> anyhow::Result<Account> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET profile_photo_url = $2
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(url)
        .fetch_one(&self.db)
        .await?;
        Ok(account)
    }
}


#[cfg(test)]
mod tests {
    //! The store itself must reject a writer that slipped past the
    //! reconciler's pre-checks, with the same error kinds.

    use super::memory::MemoryStore;
    use super::*;

    fn new_account(email: &str, enrollment: Option<&str>, username: Option<&str>) -> NewAccount {
        NewAccount {
            email: email.into(),
            username: username.map(Into::into),
            enrollment_number: enrollment.map(Into::into),
            password_hash: Some("$argon2id$fake".into()),
            auth_provider: AuthProvider::Local,
            profile_photo_url: None,
            full_name: None,
        }
    }

    #[tokio::test]
    async fn insert_enforces_uniqueness_without_prechecks() {
        let store = MemoryStore::new();
        store
            .insert(new_account("alice@x.com", Some("E1"), Some("alice")))
            .await
            .expect("first insert");

        let err = store
            .insert(new_account("alice@x.com", Some("E2"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));

        let err = store
            .insert(new_account("bob@x.com", Some("E1"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EnrollmentTaken));

        let err = store
            .insert(new_account("bob@x.com", Some("E2"), Some("alice")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken));
    }

    #[tokio::test]
    async fn assign_enrollment_is_conditional_on_null() {
        let store = MemoryStore::new();
        let alice = store
            .insert(new_account("alice@x.com", None, None))
            .await
            .expect("alice");
        let bob = store
            .insert(new_account("bob@x.com", None, None))
            .await
            .expect("bob");

        let updated = store.assign_enrollment(alice.id, "E1").await.expect("assign");
        assert_eq!(updated.enrollment_number.as_deref(), Some("E1"));

        let err = store.assign_enrollment(alice.id, "E2").await.unwrap_err();
        assert!(matches!(err, AuthError::EnrollmentAlreadySet));

        let err = store.assign_enrollment(bob.id, "E1").await.unwrap_err();
        assert!(matches!(err, AuthError::EnrollmentTaken));
    }
}
