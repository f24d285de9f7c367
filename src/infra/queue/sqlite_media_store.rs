// SQLite-backed media store for the moderation queue.
//
// One row per submission in `pending_media`. Insertion order is the rowid,
// which is what `list` orders by. A decision is a single UPDATE guarded by
// `status = 'pending'`, so two concurrent decisions serialize inside the
// database and exactly one of them applies.

use crate::core::queue::{ItemStatus, MediaKind, MediaStore, PendingItem, QueueError, QueueStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteMediaStore {
    pool: Pool<Sqlite>,
}

impl SqliteMediaStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_media (
                id TEXT PRIMARY KEY,
                submitter_id INTEGER NOT NULL,
                media_ref TEXT NOT NULL,
                media_kind TEXT NOT NULL,
                caption TEXT,
                submitted_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                decided_by INTEGER,
                decided_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_pending_media_status
                ON pending_media(status);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }
}

fn storage_err(e: sqlx::Error) -> QueueError {
    QueueError::Storage(e.to_string())
}

/// Decode one durable row. A failure on any column means the record is
/// corrupt; the error carries the id so the operator can find it. SQLite's
/// flexible typing can hand back a mistyped value for any column, so every
/// read goes through `try_get`.
fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<PendingItem, QueueError> {
    fn decode_err(id: &str, column: &str, e: impl std::fmt::Display) -> QueueError {
        QueueError::Storage(format!("item {id}: bad {column}: {e}"))
    }

    let id: String = row
        .try_get("id")
        .map_err(|e| QueueError::Storage(format!("queue record: bad id: {e}")))?;

    let status_raw: String = row
        .try_get("status")
        .map_err(|e| decode_err(&id, "status", e))?;
    let status = ItemStatus::parse(&status_raw).ok_or_else(|| {
        QueueError::Storage(format!("item {id}: unknown status '{status_raw}'"))
    })?;

    let submitted_raw: String = row
        .try_get("submitted_at")
        .map_err(|e| decode_err(&id, "submitted_at", e))?;
    let submitted_at = DateTime::parse_from_rfc3339(&submitted_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_err(&id, "submitted_at", e))?;

    let decided_at = match row
        .try_get::<Option<String>, _>("decided_at")
        .map_err(|e| decode_err(&id, "decided_at", e))?
    {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| decode_err(&id, "decided_at", e))?,
        ),
        None => None,
    };

    Ok(PendingItem {
        media_kind: MediaKind::parse(
            &row.try_get::<String, _>("media_kind")
                .map_err(|e| decode_err(&id, "media_kind", e))?,
        ),
        submitter_id: row
            .try_get::<i64, _>("submitter_id")
            .map_err(|e| decode_err(&id, "submitter_id", e))? as u64,
        media_ref: row
            .try_get("media_ref")
            .map_err(|e| decode_err(&id, "media_ref", e))?,
        caption: row
            .try_get("caption")
            .map_err(|e| decode_err(&id, "caption", e))?,
        decided_by: row
            .try_get::<Option<i64>, _>("decided_by")
            .map_err(|e| decode_err(&id, "decided_by", e))?
            .map(|v| v as u64),
        id,
        submitted_at,
        status,
        decided_at,
    })
}

#[async_trait]
impl MediaStore for SqliteMediaStore {
    async fn insert(&self, item: &PendingItem) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            INSERT INTO pending_media
                (id, submitter_id, media_ref, media_kind, caption, submitted_at, status, decided_by, decided_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(item.submitter_id as i64)
        .bind(&item.media_ref)
        .bind(item.media_kind.as_str())
        .bind(&item.caption)
        .bind(item.submitted_at.to_rfc3339())
        .bind(item.status.as_str())
        .bind(item.decided_by.map(|v| v as i64))
        .bind(item.decided_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PendingItem>, QueueError> {
        let row = sqlx::query("SELECT * FROM pending_media WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn try_decide(
        &self,
        id: &str,
        status: ItemStatus,
        decided_by: u64,
        decided_at: DateTime<Utc>,
    ) -> Result<PendingItem, QueueError> {
        // The WHERE clause is the whole trick: only a still-pending row can
        // take the decision, so concurrent callers cannot both win.
        let result = sqlx::query(
            r#"
            UPDATE pending_media
            SET status = ?, decided_by = ?, decided_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(decided_by as i64)
        .bind(decided_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 1 {
            return self
                .get(id)
                .await?
                .ok_or_else(|| QueueError::Storage(format!("item {id} vanished mid-decision")));
        }

        // Nothing updated: either the id is unknown or someone else decided
        // first.
        match self.get(id).await? {
            None => Err(QueueError::NotFound(id.to_string())),
            Some(_) => Err(QueueError::AlreadyDecided(id.to_string())),
        }
    }

    async fn list(&self, status: Option<ItemStatus>) -> Result<Vec<PendingItem>, QueueError> {
        let rows = match status {
            Some(status) => {
                sqlx::query("SELECT * FROM pending_media WHERE status = ? ORDER BY rowid")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM pending_media ORDER BY rowid")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(storage_err)?;

        // A corrupt record is skipped, not fatal: one bad row must not take
        // the whole queue down with it (especially during startup reload).
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            match row_to_item(row) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!("skipping corrupt queue record: {e}"),
            }
        }
        Ok(items)
    }

    async fn count_pending(&self) -> Result<u64, QueueError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM pending_media WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.try_get::<i64, _>("n").map_err(storage_err)? as u64)
    }

    async fn count_pending_for(&self, submitter_id: u64) -> Result<u64, QueueError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM pending_media WHERE status = 'pending' AND submitter_id = ?",
        )
        .bind(submitter_id as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.try_get::<i64, _>("n").map_err(storage_err)? as u64)
    }

    async fn delete_terminal(&self, id: &str) -> Result<bool, QueueError> {
        let result =
            sqlx::query("DELETE FROM pending_media WHERE id = ? AND status != 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            DELETE FROM pending_media
            WHERE status != 'pending' AND decided_at IS NOT NULL AND decided_at < ?
            "#,
        )
        .bind(cutoff.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let mut stats = QueueStats::default();

        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM pending_media GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        for row in rows {
            let n = row.try_get::<i64, _>("n").map_err(storage_err)? as u64;
            stats.total += n;
            // A corrupt status groups under no bucket but still counts.
            let status: Option<String> = row.try_get("status").ok();
            match status.as_deref().and_then(ItemStatus::parse) {
                Some(ItemStatus::Pending) => stats.pending = n,
                Some(ItemStatus::Approved) => stats.approved = n,
                Some(ItemStatus::Rejected) => stats.rejected = n,
                None => {}
            }
        }

        let rows = sqlx::query(
            "SELECT media_kind, COUNT(*) AS n FROM pending_media GROUP BY media_kind ORDER BY media_kind",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        for row in rows {
            let Ok(kind) = row.try_get::<String, _>("media_kind") else {
                continue;
            };
            stats.by_kind.push((
                MediaKind::parse(&kind),
                row.try_get::<i64, _>("n").map_err(storage_err)? as u64,
            ));
        }

        let row = sqlx::query(
            "SELECT MIN(submitted_at) AS oldest FROM pending_media WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        stats.oldest_pending = row
            .try_get::<Option<String>, _>("oldest")
            .ok()
            .flatten()
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(stats)
    }
}
