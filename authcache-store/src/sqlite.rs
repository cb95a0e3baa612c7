// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed key-value store.
use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqliteExecutor, migrate, query, query_as};
use thiserror::Error;
use tracing::trace;

use crate::traits::{Command, KvStore};

/// Create SQLite database if it doesn't already exist.
pub async fn create_database(url: &str) -> Result<(), SqliteError> {
    if !Sqlite::database_exists(url).await? {
        Sqlite::create_database(url).await?
    }
    Ok(())
}

/// Get migrations from folder without running them.
pub fn migrations() -> Migrator {
    migrate!()
}

/// Run any pending database migrations from inside the application.
pub async fn run_pending_migrations(pool: &sqlx::SqlitePool) -> Result<(), SqliteError> {
    migrations().run(pool).await?;
    Ok(())
}

pub struct SqliteStoreBuilder {
    url: String,
    max_connections: u32,
    run_migrations: bool,
    create_database: bool,
}

impl Default for SqliteStoreBuilder {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".into(),
            max_connections: 16,
            create_database: true,
            run_migrations: true,
        }
    }
}

impl SqliteStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn random_memory_url(mut self) -> Self {
        // Every temporary database gets a different, random name to keep tests isolated from
        // each other.
        //
        // See related issue: https://github.com/launchbadge/sqlx/issues/2510
        self.url = format!(
            "sqlite://dbmem{}?mode=memory&cache=private",
            rand::random::<u32>()
        );
        self
    }

    pub fn database_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn create_database(mut self, create_database: bool) -> Self {
        self.create_database = create_database;
        self
    }

    pub fn run_default_migrations(mut self, run_migrations: bool) -> Self {
        self.run_migrations = run_migrations;
        self
    }

    pub async fn build(self) -> Result<SqliteStore, SqliteError> {
        if self.create_database {
            create_database(&self.url).await?;
        }

        let pool: sqlx::SqlitePool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.url)
            .await?;

        if self.run_migrations {
            run_pending_migrations(&pool).await?;
        }

        Ok(SqliteStore::new(pool))
    }
}

/// SQLite database holding string values and sets.
///
/// This struct can be cloned and used in multiple places in the application. Every cloned
/// instance re-uses the same connection pool.
///
/// Reads are executed directly against the pool. Writes passed to `exec` are executed inside one
/// SQL transaction which is only committed when every command succeeded; an uncommitted
/// transaction is rolled back when it gets dropped.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: sqlx::SqlitePool,
}

impl SqliteStore {
    pub(crate) fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Shortcut building an in-memory SQLite database with a randomised name for testing purposes.
    #[cfg(any(test, feature = "test_utils"))]
    pub async fn temporary() -> Self {
        SqliteStoreBuilder::new()
            .random_memory_url()
            .max_connections(1)
            .build()
            .await
            .expect("migrations succeeded")
    }

    async fn exec_command(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        command: &Command,
    ) -> Result<(), SqliteError> {
        match command {
            Command::Multi => (),
            Command::Set { key, value } => {
                query("DELETE FROM kv_sets WHERE key = ?")
                    .bind(key)
                    .execute(&mut **tx)
                    .await?;

                query(
                    "
                    INSERT INTO
                        kv_values (key, value)
                    VALUES
                        (?, ?)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value
                    ",
                )
                .bind(key)
                .bind(value)
                .execute(&mut **tx)
                .await?;
            }
            Command::Del { key } => {
                query("DELETE FROM kv_values WHERE key = ?")
                    .bind(key)
                    .execute(&mut **tx)
                    .await?;

                query("DELETE FROM kv_sets WHERE key = ?")
                    .bind(key)
                    .execute(&mut **tx)
                    .await?;
            }
            Command::Sadd { set, member } => {
                ensure_not_value(&mut **tx, set).await?;

                query(
                    "
                    INSERT OR IGNORE
                    INTO
                        kv_sets (key, member)
                    VALUES
                        (?, ?)
                    ",
                )
                .bind(set)
                .bind(member)
                .execute(&mut **tx)
                .await?;
            }
            Command::Srem { set, member } => {
                ensure_not_value(&mut **tx, set).await?;

                query("DELETE FROM kv_sets WHERE key = ? AND member = ?")
                    .bind(set)
                    .bind(member)
                    .execute(&mut **tx)
                    .await?;
            }
        }

        Ok(())
    }
}

impl KvStore for SqliteStore {
    type Error = SqliteError;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let (is_set,): (bool,) =
            query_as("SELECT EXISTS (SELECT 1 FROM kv_sets WHERE key = ?)")
                .bind(key)
                .fetch_one(&self.pool)
                .await?;
        if is_set {
            return Err(SqliteError::WrongType(key.to_string()));
        }

        let row: Option<(String,)> = query_as(
            "
            SELECT
                value
            FROM
                kv_values
            WHERE
                key = ?
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn sismember(&self, set: &str, member: &str) -> Result<bool, Self::Error> {
        ensure_not_value(&self.pool, set).await?;

        let row: Option<(i64,)> =
            query_as("SELECT 1 FROM kv_sets WHERE key = ? AND member = ?")
                .bind(set)
                .bind(member)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    async fn scard(&self, set: &str) -> Result<usize, Self::Error> {
        ensure_not_value(&self.pool, set).await?;

        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM kv_sets WHERE key = ?")
            .bind(set)
            .fetch_one(&self.pool)
            .await?;

        usize::try_from(count).map_err(|_| SqliteError::InvalidCount(count))
    }

    async fn exec(&self, commands: &[Command]) -> Result<(), Self::Error> {
        let mut tx = self.pool.begin().await?;

        for command in commands {
            trace!(%command, "execute command");
            // Returning early drops the transaction which rolls back every write done so far.
            Self::exec_command(&mut tx, command).await?;
        }

        tx.commit().await?;

        Ok(())
    }
}

/// Set operations against a key holding a string value fail.
async fn ensure_not_value<'e>(
    executor: impl SqliteExecutor<'e>,
    key: &str,
) -> Result<(), SqliteError> {
    let (is_value,): (bool,) =
        query_as("SELECT EXISTS (SELECT 1 FROM kv_values WHERE key = ?)")
            .bind(key)
            .fetch_one(executor)
            .await?;

    if is_value {
        return Err(SqliteError::WrongType(key.to_string()));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database and connection error.
    #[error(transparent)]
    Sqlite(#[from] sqlx::Error),

    /// SQL table schema migration error.
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A set operation was issued against a string value or vice versa.
    #[error("operation against key '{0}' holding the wrong kind of value")]
    WrongType(String),

    /// Invalid, corrupted data was found in the database. This is a critical error.
    #[error("database returned invalid set cardinality {0}")]
    InvalidCount(i64),
}

#[cfg(test)]
mod tests {
    use crate::sqlite::{SqliteError, SqliteStore, SqliteStoreBuilder};
    use crate::traits::{Command, KvStore};

    #[tokio::test]
    async fn migrations_create_tables() {
        let store = SqliteStoreBuilder::new()
            .random_memory_url()
            .max_connections(1)
            .build()
            .await
            .unwrap();

        store.set("/account/bmc", "1a940615").await.unwrap();
        assert_eq!(
            store.get("/account/bmc").await.unwrap().as_deref(),
            Some("1a940615")
        );
    }

    #[tokio::test]
    async fn failed_command_rolls_back() {
        let store = SqliteStore::temporary().await;
        store.set("/account/bmc", "1a940615").await.unwrap();

        // The first two writes succeed inside the transaction, the set operation against the
        // string value fails.
        let result = store
            .exec(&[
                Command::Multi,
                Command::set("/uuid/1a940615", "{}"),
                Command::del("/account/bmc"),
                Command::set("/account/bmc", "930896af"),
                Command::sadd("/account/bmc", "1a940615"),
            ])
            .await;
        assert!(matches!(result, Err(SqliteError::WrongType(key)) if key == "/account/bmc"));

        assert_eq!(store.get("/uuid/1a940615").await.unwrap(), None);
        assert_eq!(
            store.get("/account/bmc").await.unwrap().as_deref(),
            Some("1a940615")
        );
    }

    #[tokio::test]
    async fn missing_tables() {
        let store = SqliteStoreBuilder::new()
            .random_memory_url()
            .max_connections(1)
            .run_default_migrations(false)
            .build()
            .await
            .unwrap();

        let result = store
            .exec(&[Command::Multi, Command::set("/account/bmc", "1a940615")])
            .await;
        assert!(matches!(result, Err(SqliteError::Sqlite(_))));
    }

    #[tokio::test]
    async fn reads_check_kind_of_value() {
        let store = SqliteStore::temporary().await;
        store.set("/account/bmc", "1a940615").await.unwrap();
        store.sadd("/set/accounts", "1a940615").await.unwrap();

        assert!(matches!(
            store.scard("/account/bmc").await,
            Err(SqliteError::WrongType(_))
        ));
        assert!(matches!(
            store.sismember("/account/bmc", "1a940615").await,
            Err(SqliteError::WrongType(_))
        ));
        assert!(matches!(
            store.get("/set/accounts").await,
            Err(SqliteError::WrongType(_))
        ));
    }

    #[tokio::test]
    async fn set_replaces_set() {
        let store = SqliteStore::temporary().await;

        store.sadd("/set/accounts", "1a940615").await.unwrap();
        store.set("/set/accounts", "plain").await.unwrap();

        // The key holds a string value now, the set is gone.
        assert!(matches!(
            store.scard("/set/accounts").await,
            Err(SqliteError::WrongType(_))
        ));
        assert_eq!(
            store.get("/set/accounts").await.unwrap().as_deref(),
            Some("plain")
        );
    }
}
