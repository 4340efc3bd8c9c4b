use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{NewNotification, Notification};
use crate::error::{AppError, AppResult};

/// Typed persistence for notifications.
///
/// Claiming due retries uses the same atomic single-statement
/// `UPDATE ... WHERE id = (SELECT id ... LIMIT 1) RETURNING ...` pattern as
/// the rest of this crate's repositories: it avoids a long-lived transaction
/// and gives SQLite's single-writer model the same guarantee
/// `SELECT ... FOR UPDATE SKIP LOCKED` gives a multi-writer database.
pub struct NotificationRepository;

const COLUMNS: &str = r#"
    id, client_id, channel, recipient, subject, body, status, priority,
    retry_count, max_retries, next_retry_at, error_code, error_message,
    provider_message_id, idempotency_key, callback_url, metadata,
    created_at, updated_at, sent_at, expires_at
"#;

impl NotificationRepository {
    /// Inserts a new row in `PENDING`. Idempotency is enforced by a partial
    /// unique index on `idempotency_key`; a unique-violation here means a
    /// concurrent request won the race and the caller should re-read via
    /// `find_by_idempotency_key`.
    pub async fn insert(pool: &SqlitePool, new: NewNotification) -> AppResult<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (
                id, client_id, channel, recipient, subject, body, status, priority,
                retry_count, max_retries, next_retry_at, error_code, error_message,
                provider_message_id, idempotency_key, callback_url, metadata,
                created_at, updated_at, sent_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, 'PENDING', ?, 0, ?, NULL, NULL, NULL, NULL, ?, ?, ?, ?, ?, NULL, ?)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(new.client_id)
        .bind(new.channel.as_str())
        .bind(new.recipient)
        .bind(new.subject)
        .bind(new.body)
        .bind(new.priority.as_str())
        .bind(new.max_retries)
        .bind(new.idempotency_key)
        .bind(new.callback_url)
        .bind(new.metadata)
        .bind(now)
        .bind(now)
        .bind(new.expires_at)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_idempotency_key(
        pool: &SqlitePool,
        key: &str,
    ) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE idempotency_key = ?"
        ))
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Leases this row for delivery: `PENDING -> SENDING`.
    pub async fn lease_for_send(pool: &SqlitePool, id: &str) -> AppResult<Option<Notification>> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET status = 'SENDING', updated_at = ?
            WHERE id = ? AND status = 'PENDING'
            RETURNING {COLUMNS}
            "#
        ))
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn mark_sent(
        pool: &SqlitePool,
        id: &str,
        provider_message_id: Option<String>,
    ) -> AppResult<Notification> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET status = 'SENT', sent_at = ?, provider_message_id = COALESCE(?, provider_message_id),
                next_retry_at = NULL, updated_at = ?
            WHERE id = ?
            RETURNING {COLUMNS}
            "#
        ))
        .bind(now)
        .bind(provider_message_id)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn mark_failed(
        pool: &SqlitePool,
        id: &str,
        error_code: &str,
        error_message: &str,
    ) -> AppResult<Notification> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET status = 'FAILED', error_code = ?, error_message = ?,
                next_retry_at = NULL, updated_at = ?
            WHERE id = ?
            RETURNING {COLUMNS}
            "#
        ))
        .bind(error_code)
        .bind(error_message)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Atomically sets `status = PENDING`, `retry_count`, `next_retry_at` and
    /// the last observed error, per `spec.md` §4.1's `schedule_retry`.
    pub async fn schedule_retry(
        pool: &SqlitePool,
        id: &str,
        new_retry_count: i64,
        next_retry_at: DateTime<Utc>,
        error_code: &str,
        error_message: &str,
    ) -> AppResult<Notification> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET status = 'PENDING', retry_count = ?, next_retry_at = ?,
                error_code = ?, error_message = ?, updated_at = ?
            WHERE id = ?
            RETURNING {COLUMNS}
            "#
        ))
        .bind(new_retry_count)
        .bind(next_retry_at)
        .bind(error_code)
        .bind(error_message)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Claims up to `limit` due rows, ordered `priority DESC, next_retry_at ASC`,
    /// atomically marking each `SENDING` so two concurrent sweepers never pick
    /// the same row.
    pub async fn lease_due_retries(
        pool: &SqlitePool,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        let mut leased = Vec::new();
        if limit <= 0 {
            return Ok(leased);
        }

        for _ in 0..limit {
            let row = sqlx::query_as::<_, Notification>(&format!(
                r#"
                UPDATE notifications
                SET status = 'SENDING', updated_at = ?
                WHERE id = (
                    SELECT id FROM notifications
                    WHERE status = 'PENDING'
                      AND next_retry_at IS NOT NULL
                      AND next_retry_at <= ?
                      AND expires_at > ?
                    ORDER BY
                        CASE priority WHEN 'HIGH' THEN 0 WHEN 'NORMAL' THEN 1 ELSE 2 END ASC,
                        next_retry_at ASC
                    LIMIT 1
                )
                RETURNING {COLUMNS}
                "#
            ))
            .bind(now)
            .bind(now)
            .bind(now)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

            match row {
                Some(r) => leased.push(r),
                None => break,
            }
        }

        Ok(leased)
    }

    /// Reclaims rows stuck in `SENDING` past the configured lease timeout
    /// back to `PENDING` so the scheduler re-picks them (`spec.md` §5).
    pub async fn reclaim_expired_leases(
        pool: &SqlitePool,
        now: DateTime<Utc>,
        lease_timeout_s: i64,
    ) -> AppResult<u64> {
        let cutoff = now - chrono::Duration::seconds(lease_timeout_s);
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'PENDING', next_retry_at = ?, updated_at = ?
            WHERE status = 'SENDING' AND updated_at <= ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(cutoff)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Sweeps `PENDING`/`SENDING` rows whose `expires_at` has passed into
    /// `EXPIRED`. Returns the rows that were transitioned so the caller can
    /// fire webhooks for them.
    pub async fn expire_due(pool: &SqlitePool, now: DateTime<Utc>) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET status = 'EXPIRED', next_retry_at = NULL, error_code = 'EXPIRED',
                error_message = 'notification expired before delivery', updated_at = ?
            WHERE status IN ('PENDING', 'SENDING') AND expires_at <= ?
            RETURNING {COLUMNS}
            "#
        ))
        .bind(now)
        .bind(now)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// Administrative escape hatch (P5): resets a terminal row back to
    /// `PENDING` with `retry_count = 0`. Never invoked by the Dispatcher or
    /// Scheduler themselves.
    pub async fn force_retry(pool: &SqlitePool, id: &str) -> AppResult<Notification> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET status = 'PENDING', retry_count = 0, next_retry_at = ?,
                error_code = NULL, error_message = NULL, updated_at = ?
            WHERE id = ?
            RETURNING {COLUMNS}
            "#
        ))
        .bind(now)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }
}
