//! `SQLite` storage for normalized tweet data.
//!
//! Owns the connection, the pragmas and the fixed relational schema. Row
//! writes for a record live in [`crate::loader`], which borrows the
//! connection from here.

use crate::doctor::{CheckStatus, HealthCheck};
use crate::error::LoaderError;
use crate::format_number;
use crate::model::TableCounts;
use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use std::path::Path;
use tracing::{debug, info};

/// Version of the schema created by [`Storage::create_schema`].
pub const SCHEMA_VERSION: i32 = 1;

/// `SQLite` storage manager
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).with_context(|| {
            format!("Failed to open database at {}", db_path.as_ref().display())
        })?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// Get a reference to the underlying database connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Mutable access to the connection, needed to open transactions.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version();

        if current_version > SCHEMA_VERSION {
            return Err(LoaderError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: current_version,
            }
            .into());
        }

        if current_version < SCHEMA_VERSION {
            info!(
                "Migrating database from version {} to {}",
                current_version, SCHEMA_VERSION
            );
            self.create_schema()?;
            self.set_schema_version(SCHEMA_VERSION)?;
        } else {
            debug!("Database schema at version {}", current_version);
        }

        Ok(())
    }

    /// Stored schema version, 0 for a fresh database.
    #[must_use]
    pub fn schema_version(&self) -> i32 {
        let result: rusqlite::Result<i32> = self.conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| {
                let value: String = row.get(0)?;
                Ok(value.parse().unwrap_or(0))
            },
        );

        // Treat missing meta table as version 0.
        result.unwrap_or_default()
    }

    fn set_schema_version(&self, version: i32) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
            params![version.to_string()],
        )?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS urls (
                id_urls INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE
            );

            -- Every column except the id may be NULL: unhydrated users are
            -- created from mentions and replies before their profile is seen.
            CREATE TABLE IF NOT EXISTS users (
                id_users INTEGER PRIMARY KEY,
                created_at TEXT,
                updated_at TEXT,
                id_urls INTEGER REFERENCES urls(id_urls),
                friends_count INTEGER,
                listed_count INTEGER,
                favourites_count INTEGER,
                statuses_count INTEGER,
                protected INTEGER,
                verified INTEGER,
                screen_name TEXT,
                name TEXT,
                location TEXT,
                description TEXT,
                withheld_in_countries TEXT
            );

            CREATE TABLE IF NOT EXISTS tweets (
                id_tweets INTEGER PRIMARY KEY,
                id_users INTEGER NOT NULL REFERENCES users(id_users),
                created_at TEXT NOT NULL,
                in_reply_to_status_id INTEGER,
                in_reply_to_user_id INTEGER REFERENCES users(id_users),
                quoted_status_id INTEGER,
                retweet_count INTEGER,
                favorite_count INTEGER,
                quote_count INTEGER,
                withheld_copyright INTEGER,
                withheld_in_countries TEXT,
                source TEXT,
                text TEXT NOT NULL,
                country_code TEXT,
                state_code TEXT,
                lang TEXT,
                place_name TEXT,
                geo TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tweets_id_users ON tweets(id_users);
            CREATE INDEX IF NOT EXISTS idx_tweets_created_at ON tweets(created_at);
            CREATE INDEX IF NOT EXISTS idx_tweets_in_reply_to_user ON tweets(in_reply_to_user_id);

            CREATE TABLE IF NOT EXISTS tweet_urls (
                id_tweets INTEGER NOT NULL REFERENCES tweets(id_tweets),
                id_urls INTEGER NOT NULL REFERENCES urls(id_urls),
                PRIMARY KEY (id_tweets, id_urls)
            );

            CREATE TABLE IF NOT EXISTS tweet_mentions (
                id_tweets INTEGER NOT NULL REFERENCES tweets(id_tweets),
                id_users INTEGER NOT NULL REFERENCES users(id_users),
                PRIMARY KEY (id_tweets, id_users)
            );
            CREATE INDEX IF NOT EXISTS idx_tweet_mentions_id_users ON tweet_mentions(id_users);

            CREATE TABLE IF NOT EXISTS tweet_tags (
                id_tweets INTEGER NOT NULL REFERENCES tweets(id_tweets),
                tag TEXT NOT NULL,
                PRIMARY KEY (id_tweets, tag)
            );
            CREATE INDEX IF NOT EXISTS idx_tweet_tags_tag ON tweet_tags(tag);

            CREATE TABLE IF NOT EXISTS tweet_media (
                id_tweets INTEGER NOT NULL REFERENCES tweets(id_tweets),
                id_urls INTEGER NOT NULL REFERENCES urls(id_urls),
                type TEXT,
                PRIMARY KEY (id_tweets, id_urls)
            );
            ",
            )
            .context("Failed to create schema")?;

        Ok(())
    }

    /// Row counts for every table of the schema in a single query.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn table_counts(&self) -> Result<TableCounts> {
        let query = r"
            SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM tweets),
                (SELECT COUNT(*) FROM urls),
                (SELECT COUNT(*) FROM tweet_urls),
                (SELECT COUNT(*) FROM tweet_mentions),
                (SELECT COUNT(*) FROM tweet_tags),
                (SELECT COUNT(*) FROM tweet_media)
        ";

        Ok(self.conn.query_row(query, [], |row| {
            Ok(TableCounts {
                users: row.get(0)?,
                tweets: row.get(1)?,
                urls: row.get(2)?,
                tweet_urls: row.get(3)?,
                tweet_mentions: row.get(4)?,
                tweet_tags: row.get(5)?,
                tweet_media: row.get(6)?,
            })
        })?)
    }

    /// Number of users never seen as an author. Authors always carry
    /// `updated_at`; placeholders never do.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn unhydrated_user_count(&self) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE updated_at IS NULL",
                [],
                |row| row.get(0),
            )
            .context("Failed to count unhydrated users")
    }

    /// Whether a tweet id is already stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn has_tweet(&self, id_tweets: i64) -> Result<bool> {
        Ok(crate::loader::tweet_exists(&self.conn, id_tweets)?)
    }

    /// Run integrity and referential checks for `load-tweets stats --check`.
    #[must_use]
    pub fn database_health_checks(&self) -> Vec<HealthCheck> {
        vec![
            self.check_integrity(),
            self.check_schema_version(),
            self.check_foreign_keys(),
        ]
    }

    fn check_integrity(&self) -> HealthCheck {
        match self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get::<_, String>(0))
        {
            Ok(result) if result == "ok" => HealthCheck::pass("PRAGMA integrity_check", "ok"),
            Ok(result) => HealthCheck::error(
                "PRAGMA integrity_check",
                format!("Integrity check failed: {result}"),
                "Database corruption detected. Reload into a fresh database.",
            ),
            Err(err) => HealthCheck::error(
                "PRAGMA integrity_check",
                format!("Integrity check failed to run: {err}"),
                "Ensure the database file is readable.",
            ),
        }
    }

    fn check_schema_version(&self) -> HealthCheck {
        let found = self.schema_version();
        if found == SCHEMA_VERSION {
            HealthCheck::pass("Schema version", format!("v{found}"))
        } else {
            HealthCheck {
                name: "Schema version".to_string(),
                status: CheckStatus::Warning,
                message: format!("expected v{SCHEMA_VERSION}, found v{found}"),
                suggestion: Some("Load into a fresh database file.".to_string()),
            }
        }
    }

    fn check_foreign_keys(&self) -> HealthCheck {
        let violations = self.foreign_key_violations();
        match violations {
            Ok(0) => HealthCheck::pass("PRAGMA foreign_key_check", "0 violations"),
            Ok(count) => HealthCheck::error(
                "PRAGMA foreign_key_check",
                format!("{} violations", format_number(count)),
                "Rows reference users or urls that do not exist.",
            ),
            Err(err) => HealthCheck::error(
                "PRAGMA foreign_key_check",
                format!("Query failed: {err}"),
                "Ensure the database file is readable.",
            ),
        }
    }

    /// Count rows that reference a missing parent row.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be evaluated.
    pub fn foreign_key_violations(&self) -> Result<i64> {
        let mut stmt = self.conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        let mut count = 0;
        while rows.next()?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}
