use async_trait::async_trait;
use jiff::Timestamp;
use slugline_core::error::Result;
use slugline_core::{ExpiryPolicy, Reactivation, RecordStore, ShortenedUrl, Slug, StorageError};
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{MySql, MySqlPool, Row, Transaction};
use tracing::trace;

/// MySQL implementation of the record store contract.
///
/// One row per slug (`token` is the primary key, binary collation so slugs
/// stay case-sensitive). Timestamps are stored as microseconds since the
/// Unix epoch. Expiry is classified in Rust through [`ExpiryPolicy`]; SQL
/// only narrows the candidate rows.
///
/// Every write runs in a transaction that locks the slug's row with
/// `SELECT ... FOR UPDATE` before deciding, so the check and the mutation
/// are one step for concurrent writers. Two creates of a missing slug both
/// take the gap lock and InnoDB aborts one of them; that loser sees
/// [`StorageError::Conflict`] like any other lost create.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `shortened_urls` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn lock_token(
        tx: &mut Transaction<'_, MySql>,
        token: &Slug,
        on_error: impl FnOnce(sqlx::Error) -> StorageError,
    ) -> Result<Option<ShortenedUrl>> {
        let row = sqlx::query(
            r#"
            SELECT token, url, expires_at, created_at
            FROM shortened_urls
            WHERE token = ?
            FOR UPDATE
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(on_error)?;

        row.as_ref().map(parse_row).transpose()
    }

    async fn write_record(
        tx: &mut Transaction<'_, MySql>,
        record: &ShortenedUrl,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE shortened_urls
            SET url = ?, expires_at = ?, created_at = ?
            WHERE token = ?
            "#,
        )
        .bind(record.url.as_str())
        .bind(record.expires_at.map(to_micros))
        .bind(to_micros(record.created_at))
        .bind(record.token.as_str())
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

const SCHEMA: &str = include_str!("../ddl/mysql/shortened_urls.sql");

fn to_micros(ts: Timestamp) -> i64 {
    ts.as_microsecond()
}

fn from_micros(column: &str, micros: i64) -> Result<Timestamp> {
    Timestamp::from_microsecond(micros).map_err(|e| {
        StorageError::InvalidData(format!("invalid {} timestamp '{}': {e}", column, micros))
    })
}

fn parse_row(row: &MySqlRow) -> Result<ShortenedUrl> {
    let token: String = row.try_get("token").map_err(map_sqlx_error)?;
    let url: String = row.try_get("url").map_err(map_sqlx_error)?;
    let expires_at: Option<i64> = row.try_get("expires_at").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    Ok(ShortenedUrl {
        token: Slug::new_unchecked(token),
        url,
        expires_at: expires_at
            .map(|micros| from_micros("expires_at", micros))
            .transpose()?,
        created_at: from_micros("created_at", created_at)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

/// Deadlock (1213) or lock wait timeout (1205): another transaction holds
/// the slug.
fn is_lock_contention(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
        .is_some_and(|db| matches!(db.number(), ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT))
}

fn map_create_error(token: &Slug, err: sqlx::Error) -> StorageError {
    if is_unique_violation(&err) || is_lock_contention(&err) {
        trace!(slug = %token, error = %err, "create lost to a concurrent writer");
        return StorageError::Conflict(token.to_string());
    }
    map_sqlx_error(err)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl RecordStore for MySqlRepository {
    async fn find_by_token(&self, token: &Slug) -> Result<Option<ShortenedUrl>> {
        let row = sqlx::query(
            r#"
            SELECT token, url, expires_at, created_at
            FROM shortened_urls
            WHERE token = ?
            LIMIT 1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(parse_row).transpose()
    }

    async fn find_by_url(&self, url: &str) -> Result<Vec<ShortenedUrl>> {
        let rows = sqlx::query(
            r#"
            SELECT token, url, expires_at, created_at
            FROM shortened_urls
            WHERE url = ?
            ORDER BY created_at, token
            "#,
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(parse_row).collect()
    }

    async fn create(&self, record: ShortenedUrl, now: Timestamp) -> Result<ShortenedUrl> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let locked = Self::lock_token(&mut tx, &record.token, |err| {
            map_create_error(&record.token, err)
        })
        .await?;

        match locked {
            Some(existing) if ExpiryPolicy::is_live(&existing, now) => {
                return Err(StorageError::Conflict(record.token.to_string()));
            }
            Some(_) => {
                trace!(slug = %record.token, "overwriting expired row");
                Self::write_record(&mut tx, &record).await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO shortened_urls (token, url, expires_at, created_at)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(record.token.as_str())
                .bind(record.url.as_str())
                .bind(record.expires_at.map(to_micros))
                .bind(to_micros(record.created_at))
                .execute(&mut *tx)
                .await
                .map_err(|err| map_create_error(&record.token, err))?;
            }
        }

        tx.commit()
            .await
            .map_err(|err| map_create_error(&record.token, err))?;
        Ok(record)
    }

    async fn reactivate(
        &self,
        token: &Slug,
        reactivation: Reactivation<'_>,
        now: Timestamp,
    ) -> Result<Option<ShortenedUrl>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let Some(mut record) = Self::lock_token(&mut tx, token, map_sqlx_error).await? else {
            return Ok(None);
        };
        if ExpiryPolicy::is_live(&record, now) || !reactivation.applies_to(&record) {
            return Ok(None);
        }

        reactivation.apply(&mut record);
        Self::write_record(&mut tx, &record).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(Some(record))
    }

    async fn expire(&self, token: &Slug, now: Timestamp) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let Some(mut record) = Self::lock_token(&mut tx, token, map_sqlx_error).await? else {
            return Ok(false);
        };
        if ExpiryPolicy::is_expired(&record, now) {
            return Ok(false);
        }

        record.expires_at = Some(now);
        Self::write_record(&mut tx, &record).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(true)
    }
}
