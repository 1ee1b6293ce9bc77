//! SQLite-backed CEP store
//!
//! One [`CepStore`] is opened at startup and handed to every operation that
//! needs it. The pool holds a single connection for the life of the process;
//! the table is created by the embedded migration when absent.

use crate::error::StoreError;
use crate::record::{Cep, Record};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, Statement, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

type StoreResult<T> = std::result::Result<T, StoreError>;

/// How long a statement waits on a locked database file before failing.
const BUSY_TIMEOUT_SECS: u64 = 30;

const UPSERT_SQL: &str = r#"
    INSERT INTO ceps (cep, logradouro, complemento, bairro, localidade, uf, ibge)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(cep) DO UPDATE SET
        logradouro = excluded.logradouro,
        complemento = excluded.complemento,
        bairro = excluded.bairro,
        localidade = excluded.localidade,
        uf = excluded.uf,
        ibge = excluded.ibge
"#;

const INSERT_SQL: &str = r#"
    INSERT INTO ceps (cep, logradouro, complemento, bairro, localidade, uf, ibge)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#;

const SELECT_COLUMNS: &str = "SELECT cep, logradouro, complemento, bairro, localidade, uf, ibge FROM ceps";

/// Handle to the `ceps` table
#[derive(Clone)]
pub struct CepStore {
    pool: SqlitePool,
}

impl CepStore {
    /// Open (or create) the database file at `path` and ensure the table exists
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

        info!(path = %path.display(), "Opening CEP store");
        Self::connect_with(options).await
    }

    /// A private in-memory store, gone when the handle is dropped
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(StoreError::Connect)?;
        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> StoreResult<Self> {
        // One connection, never recycled: an in-memory database lives and
        // dies with it, and a single writer is assumed anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StoreError::Connect)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::Migrate)?;

        Ok(Self { pool })
    }

    /// Underlying pool, for callers that need raw SQL
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Point lookup by CEP
    pub async fn read(&self, cep: &Cep) -> StoreResult<Option<Record>> {
        let row = sqlx::query_as::<_, CepRow>(&format!("{SELECT_COLUMNS} WHERE cep = ?1"))
            .bind(cep.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Record::try_from).transpose()
    }

    /// Insert one record; fails with `AlreadyExists` if the CEP is taken
    pub async fn create(&self, record: &Record) -> StoreResult<()> {
        let result = sqlx::query(INSERT_SQL)
            .bind(record.cep.as_str())
            .bind(record.street.as_deref())
            .bind(record.complement.as_deref())
            .bind(record.district.as_deref())
            .bind(record.locality.as_deref())
            .bind(record.region.as_deref())
            .bind(record.ibge_code.as_deref())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::AlreadyExists(record.cep.to_string()))
            },
            Err(source) => Err(StoreError::Exec {
                cep: record.cep.to_string(),
                source,
            }),
        }
    }

    /// Remove one record; `true` if a row was deleted
    pub async fn delete(&self, cep: &Cep) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM ceps WHERE cep = ?1")
            .bind(cep.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ceps")
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Every record ordered by CEP
    pub async fn all(&self) -> StoreResult<Vec<Record>> {
        let rows = sqlx::query_as::<_, CepRow>(&format!("{SELECT_COLUMNS} ORDER BY cep"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Record::try_from).collect()
    }

    /// Insert-or-update every record inside one transaction
    ///
    /// Records apply in input order, so a CEP listed twice ends with its last
    /// values. Any failure rolls the whole batch back; the store then holds
    /// exactly what it held before the call. Returns the number of records
    /// applied.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn upsert_all(&self, records: &[Record]) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Begin)?;

        match apply_upserts(&mut tx, records).await {
            // A failed commit leaves the transaction open; dropping it rolls back
            Ok(applied) => match tx.commit().await {
                Ok(()) => {
                    info!(applied, "Upsert transaction committed");
                    Ok(applied)
                },
                Err(source) => {
                    error!(error = %source, applied, "Upsert commit failed, transaction rolled back");
                    Err(StoreError::Commit(source))
                },
            },
            Err(err) => {
                match tx.rollback().await {
                    Ok(()) => warn!(error = %err, "Upsert transaction rolled back"),
                    Err(rollback_err) => error!(
                        error = %err,
                        rollback_error = %rollback_err,
                        "Rollback failed after upsert error"
                    ),
                }
                Err(err)
            },
        }
    }
}

async fn apply_upserts(tx: &mut Transaction<'_, Sqlite>, records: &[Record]) -> StoreResult<u64> {
    let statement = (&mut **tx)
        .prepare(UPSERT_SQL)
        .await
        .map_err(StoreError::Prepare)?;

    let mut applied = 0u64;
    for record in records {
        statement
            .query()
            .bind(record.cep.as_str())
            .bind(record.street.as_deref())
            .bind(record.complement.as_deref())
            .bind(record.district.as_deref())
            .bind(record.locality.as_deref())
            .bind(record.region.as_deref())
            .bind(record.ibge_code.as_deref())
            .execute(&mut **tx)
            .await
            .map_err(|source| StoreError::Exec {
                cep: record.cep.to_string(),
                source,
            })?;
        applied += 1;
    }

    debug!(applied, "All records applied, ready to commit");
    Ok(applied)
}

/// Row shape of the `ceps` table
#[derive(Debug, sqlx::FromRow)]
struct CepRow {
    cep: String,
    logradouro: Option<String>,
    complemento: Option<String>,
    bairro: Option<String>,
    localidade: Option<String>,
    uf: Option<String>,
    ibge: Option<String>,
}

impl TryFrom<CepRow> for Record {
    type Error = StoreError;

    fn try_from(row: CepRow) -> StoreResult<Self> {
        let cep = Cep::parse(&row.cep).map_err(|_| StoreError::InvalidRow { cep: row.cep.clone() })?;
        Ok(Record {
            cep,
            street: row.logradouro,
            complement: row.complemento,
            district: row.bairro,
            locality: row.localidade,
            region: row.uf,
            ibge_code: row.ibge,
        })
    }
}
