//! Main store implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info};

use eegstream_types::ChannelId;

use crate::error::{Error, Result};
use crate::models::{NewSample, StoredSample};
use crate::queries::SampleQuery;
use crate::schema;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based append-only log of samples.
///
/// The store holds the database location rather than a connection. Each
/// operation opens its own connection and closes it when the operation
/// returns, so a `Store` is cheap to clone and share between the producer
/// task and request handlers. The database runs in WAL mode: readers see a
/// snapshot as of their transaction start and never observe a partly
/// committed batch.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_schema(path, None)
    }

    /// Open or create a database, running a bootstrap SQL script first.
    pub fn open_with_schema<P: AsRef<Path>>(path: P, script: Option<&Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let bootstrap = match script {
            Some(script) => Some(std::fs::read_to_string(script).map_err(|e| {
                Error::SchemaScript {
                    path: script.to_path_buf(),
                    source: e,
                }
            })?),
            None => None,
        };

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        // WAL is persistent in the database file, so every later connection uses it
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn, bootstrap.as_deref())?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a scoped connection to the existing database.
    ///
    /// The file must already exist; a missing database is reported as an
    /// error instead of being silently recreated empty.
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        Ok(conn)
    }
}

// Write operations
impl Store {
    /// Append a batch of samples in a single transaction.
    ///
    /// Either every sample becomes visible, with consecutive increasing ids,
    /// or none does. Returns the assigned ids in batch order.
    pub fn append(&self, batch: &[NewSample]) -> Result<Vec<i64>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let rows = batch
            .iter()
            .map(|sample| {
                if !sample.value.is_finite() {
                    return Err(Error::NonFiniteValue {
                        channel: sample.channel.to_string(),
                        value: sample.value,
                    });
                }
                Ok((
                    format_timestamp(sample.timestamp)?,
                    sample.channel.as_str(),
                    sample.value,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut ids = Vec::with_capacity(rows.len());
        {
            let mut stmt =
                tx.prepare_cached("INSERT INTO eeg_samples (ts, channel, value) VALUES (?1, ?2, ?3)")?;
            for (ts, channel, value) in &rows {
                stmt.execute(rusqlite::params![ts, channel, value])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;

        debug!("Appended {} samples, ids {:?}", ids.len(), ids);
        Ok(ids)
    }
}

// Read operations
impl Store {
    /// Query samples after a cursor, oldest first.
    pub fn query_samples(&self, query: &SampleQuery) -> Result<Vec<StoredSample>> {
        let sql = query.build_sql();
        let params = query.build_params();
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, ts, channel, value)| {
                Ok(StoredSample {
                    id,
                    timestamp: parse_timestamp(&ts)?,
                    channel: ChannelId::new(channel)
                        .map_err(|source| Error::InvalidChannel { id, source })?,
                    value,
                })
            })
            .collect()
    }

    /// Total number of samples across all channels.
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM eeg_samples", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Number of samples on one channel.
    pub fn count_channel(&self, channel: &ChannelId) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM eeg_samples WHERE channel = ?",
            [channel.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Highest id in the log, if any sample exists.
    pub fn latest_id(&self) -> Result<Option<i64>> {
        let conn = self.connect()?;
        let id: Option<i64> =
            conn.query_row("SELECT MAX(id) FROM eeg_samples", [], |row| row.get(0))?;
        Ok(id)
    }
}

fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
    ts.to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(|e| Error::InvalidTimestamp(e.to_string()))
}

fn parse_timestamp(s: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| Error::InvalidTimestamp(format!("{s}: {e}")))
}
