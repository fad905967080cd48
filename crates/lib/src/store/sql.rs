//! SQL credential store for SQLite and PostgreSQL.
//!
//! Uses sqlx's `AnyPool` so one implementation serves both databases. The
//! unique constraint on `identities.email` is what makes `insert` atomic.
//!
//! ## Schema
//!
//! The schema is created on connect and stamped in a `schema_version` table.
//! A database stamped with any other version is refused rather than
//! modified.

use std::any::Any;

use async_trait::async_trait;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

use super::{CredentialStore, Identity, StoreError};
use crate::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// SQL statements to create the schema tables.
///
/// Each statement uses portable SQL that works on both SQLite and PostgreSQL.
pub const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version BIGINT PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS identities (
        email TEXT PRIMARY KEY NOT NULL,
        password_hash TEXT NOT NULL
    )",
];

/// Extension trait for sqlx Result types to simplify error handling.
pub(crate) trait SqlxResultExt<T> {
    /// Convert sqlx error to StoreError with context message.
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            StoreError::SqlxError {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// Database backend kind for SQL dialect selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Sqlite,
    Postgres,
}

/// Credential store on a SQL database.
pub struct SqlxCredentialStore {
    pool: AnyPool,
    kind: DbKind,
}

impl SqlxCredentialStore {
    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Get the database kind.
    pub fn db_kind(&self) -> DbKind {
        self.kind
    }

    /// Connect to a SQLite database using a connection URL
    /// (e.g. `sqlite:glimpse.db?mode=rwc`).
    #[cfg(feature = "sqlite")]
    pub async fn connect_sqlite(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();

        // A shared-cache in-memory database vanishes with its last connection.
        let is_in_memory = url.contains("mode=memory");
        let options = if is_in_memory {
            AnyPoolOptions::new()
                .max_connections(5)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            AnyPoolOptions::new().max_connections(5)
        };
        let pool = options
            .connect(url)
            .await
            .sql_context("Failed to connect to SQLite")?;

        sqlx::query("PRAGMA busy_timeout = 5000;")
            .execute(&pool)
            .await
            .sql_context("Failed to configure SQLite")?;

        let store = Self {
            pool,
            kind: DbKind::Sqlite,
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Create a private in-memory SQLite database. Useful for testing.
    #[cfg(feature = "sqlite")]
    pub async fn sqlite_in_memory() -> Result<Self> {
        let unique_id = uuid::Uuid::new_v4();
        let url = format!("sqlite:file:mem_{unique_id}?mode=memory&cache=shared");
        Self::connect_sqlite(&url).await
    }

    /// Connect to a PostgreSQL database using a connection URL.
    #[cfg(feature = "postgres")]
    pub async fn connect_postgres(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .sql_context("Failed to connect to PostgreSQL")?;

        let store = Self {
            pool,
            kind: DbKind::Postgres,
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Create tables if they don't exist and check the schema version.
    async fn initialize(&self) -> Result<()> {
        for statement in CREATE_TABLES {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .sql_context(&format!("Schema creation failed - SQL: {statement}"))?;
        }

        let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM schema_version")
            .fetch_optional(&self.pool)
            .await
            .sql_context("Failed to check schema version")?;

        match row {
            None => {
                sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
                    .bind(SCHEMA_VERSION)
                    .execute(&self.pool)
                    .await
                    .sql_context("Failed to initialize schema version")?;
            }
            Some((SCHEMA_VERSION,)) => {}
            Some((found,)) => {
                return Err(StoreError::SqlxError {
                    reason: format!(
                        "Unsupported credential schema v{found}, expected v{SCHEMA_VERSION}"
                    ),
                    source: None,
                }
                .into());
            }
        }
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl CredentialStore for SqlxCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT email, password_hash FROM identities WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .sql_context("Failed to look up identity")?;

        Ok(row.map(|(email, password_hash)| Identity {
            email,
            password_hash,
        }))
    }

    async fn insert(&self, identity: Identity) -> Result<()> {
        let result = sqlx::query("INSERT INTO identities (email, password_hash) VALUES ($1, $2)")
            .bind(identity.email.as_str())
            .bind(identity.password_hash.as_str())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateEmail {
                email: identity.email,
            }
            .into()),
            Err(e) => Err(e).sql_context("Failed to insert identity"),
        }
    }

    async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await
            .sql_context("Failed to count identities")?;
        Ok(count.max(0) as usize)
    }

    fn kind(&self) -> &'static str {
        match self.kind {
            DbKind::Sqlite => "sqlite",
            DbKind::Postgres => "postgres",
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
