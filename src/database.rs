use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// `None` once the store has been closed.
pub type DbConnection = Arc<Mutex<Option<Connection>>>;

const CREATE_ENTRIES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS entries (
        start_time TEXT,
        end_time TEXT,
        seconds_difference INTEGER
    )";

const CREATE_SUM_VIEW: &str = "
    CREATE VIEW IF NOT EXISTS entries_sum_view AS
    SELECT
        SUM(seconds_difference) AS total_seconds,
        SUM(CASE WHEN strftime('%Y', start_time) = strftime('%Y', 'now')
            THEN seconds_difference ELSE 0 END) AS seconds_this_year
    FROM entries";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("Failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    Created,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub seconds_difference: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub total_seconds: i64,
    pub seconds_this_year: i64,
}

/// Whole seconds between two instants, rounding half a second up.
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds();
    (millis + 500).div_euclid(1000)
}

fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(column: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(StoreError::Timestamp { value, source: e }),
            )
        })
}

/// Append-only log of application sessions.
///
/// Wraps one owned connection; every operation holds the lock only for its
/// own duration.
#[derive(Clone)]
pub struct SessionStore {
    conn: DbConnection,
    path: Option<PathBuf>,
}

impl SessionStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if path.exists() {
            debug!("Opening existing database at {:?}", path);
        } else {
            info!("Creating database at {:?}", path);
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = DELETE;")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }

    pub async fn ensure_schema(&self) -> Result<SchemaStatus, StoreError> {
        self.with_conn(|conn| {
            let present: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE (type = 'table' AND name = 'entries')
                    OR (type = 'view' AND name = 'entries_sum_view')",
                [],
                |row| row.get(0),
            )?;
            if present == 2 {
                debug!("Database already exists");
                return Ok(SchemaStatus::Existing);
            }

            info!("Creating session schema");
            let tx = conn.transaction()?;
            tx.execute(CREATE_ENTRIES_TABLE, [])?;
            tx.execute(CREATE_SUM_VIEW, [])?;
            tx.commit()?;

            info!("Database initialized");
            Ok(SchemaStatus::Created)
        })
        .await
    }

    /// Appends one session row. Durations are not validated: an `end` before
    /// `start` is stored with a negative difference.
    pub async fn record_session(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SessionRecord, StoreError> {
        let record = SessionRecord {
            start_time: start,
            end_time: end,
            seconds_difference: seconds_between(start, end),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO entries (start_time, end_time, seconds_difference)
                 VALUES (?1, ?2, ?3)",
                params![
                    format_timestamp(&record.start_time),
                    format_timestamp(&record.end_time),
                    record.seconds_difference,
                ],
            )?;
            Ok(())
        })
        .await?;

        info!(
            "Recorded session {} -> {} ({}s)",
            record.start_time.format("%Y-%m-%d %H:%M:%S"),
            record.end_time.format("%Y-%m-%d %H:%M:%S"),
            record.seconds_difference
        );
        Ok(record)
    }

    pub async fn read_aggregate(&self) -> Result<Aggregate, StoreError> {
        let (total, this_year): (Option<i64>, Option<i64>) = self
            .with_conn(|conn| {
                let sums = conn.query_row(
                    "SELECT total_seconds, seconds_this_year FROM entries_sum_view",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok(sums)
            })
            .await?;

        let aggregate = Aggregate {
            total_seconds: total.unwrap_or(0),
            seconds_this_year: this_year.unwrap_or(0),
        };
        debug!("Aggregate: {:?}", aggregate);
        Ok(aggregate)
    }

    pub async fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionRecord>, StoreError> {
        let sessions = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT start_time, end_time, seconds_difference
                    FROM entries
                    ORDER BY start_time DESC
                    LIMIT ?1
                    "#,
                )?;

                let sessions = stmt
                    .query_map(params![limit], |row| {
                        Ok(SessionRecord {
                            start_time: parse_timestamp(0, row.get(0)?)?,
                            end_time: parse_timestamp(1, row.get(1)?)?,
                            seconds_difference: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(sessions)
            })
            .await?;

        debug!("Found {} sessions", sessions.len());
        Ok(sessions)
    }

    /// Closes the connection for every handle sharing it. Closing twice is
    /// a no-op.
    pub async fn close(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| StoreError::Database(e))?;
            debug!("Database connection closed");
        }
        Ok(())
    }
}

/// Opens the session database at `path` and makes sure its schema exists.
///
/// When the file cannot be used the failure is logged and an in-memory store
/// takes its place, so the application keeps running without persistence.
pub async fn init_database(path: &Path) -> Result<SessionStore, StoreError> {
    info!("Database path: {:?}", path);

    let opened = match SessionStore::open(path).await {
        Ok(store) => store.ensure_schema().await.map(|_| store),
        Err(e) => Err(e),
    };

    match opened {
        Ok(store) => Ok(store),
        Err(e) => {
            error!("Failed to open database at {:?}: {}", path, e);
            init_in_memory().await
        }
    }
}

/// Like [`init_database`], for a location that may not have resolved, e.g.
/// when the per-user data directory cannot be created.
pub async fn open_session_store(
    location: anyhow::Result<PathBuf>,
) -> Result<SessionStore, StoreError> {
    match location {
        Ok(path) => init_database(&path).await,
        Err(e) => {
            error!("Failed to resolve database path: {}", e);
            init_in_memory().await
        }
    }
}

async fn init_in_memory() -> Result<SessionStore, StoreError> {
    warn!("Sessions will not be persisted for this run");
    let store = SessionStore::open_in_memory()?;
    store.ensure_schema().await?;
    Ok(store)
}
