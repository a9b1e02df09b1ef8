//! 동기화 이력 저장소.
//!
//! 실행 시작 시 `IN_PROGRESS` 행을 만들고, 종료 시 정확히 한 번 종료 상태로 갱신합니다.

use crate::error::{DataError, Result};
use crate::storage::Database;
use chrono::DateTime;
use kstock_core::{SharedClock, SyncCompletion, SyncHistoryRecord, SyncStatus, SyncType};
use sqlx::FromRow;
use tracing::{debug, info};

#[derive(FromRow)]
struct HistoryRow {
    id: i64,
    sync_type: String,
    status: String,
    stock_count: i64,
    analysis_count: i64,
    error_message: Option<String>,
    duration_ms: i64,
    synced_at: i64,
}

impl TryFrom<HistoryRow> for SyncHistoryRecord {
    type Error = DataError;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(SyncHistoryRecord {
            id: row.id,
            sync_type: SyncType::parse(&row.sync_type)
                .ok_or_else(|| DataError::InvalidData(format!("sync_type '{}'", row.sync_type)))?,
            status: SyncStatus::parse(&row.status)
                .ok_or_else(|| DataError::InvalidData(format!("status '{}'", row.status)))?,
            stock_count: row.stock_count,
            analysis_count: row.analysis_count,
            error_message: row.error_message,
            duration_ms: row.duration_ms,
            synced_at: DateTime::from_timestamp_millis(row.synced_at)
                .ok_or_else(|| DataError::InvalidData(format!("synced_at {}", row.synced_at)))?,
        })
    }
}

pub struct SyncHistoryRepository {
    db: Database,
    clock: SharedClock,
}

impl SyncHistoryRepository {
    pub fn new(db: Database, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    /// 진행 중 이력 생성, id 반환.
    pub async fn start(&self, sync_type: SyncType) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO sync_history (sync_type, status, synced_at) VALUES (?, ?, ?)",
        )
        .bind(sync_type.as_str())
        .bind(SyncStatus::InProgress.as_str())
        .bind(self.clock.now_millis())
        .execute(self.db.pool())
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, sync_type = %sync_type, "Sync history started");
        Ok(id)
    }

    /// 종료 상태 기록. 이미 종료된 이력은 거부합니다.
    pub async fn complete(&self, id: i64, completion: &SyncCompletion) -> Result<()> {
        if !completion.status.is_terminal() {
            return Err(DataError::InvalidState(format!(
                "sync history {} must complete with a terminal status",
                id
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE sync_history
            SET status = ?, stock_count = ?, analysis_count = ?, error_message = ?, duration_ms = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(completion.status.as_str())
        .bind(completion.stock_count)
        .bind(completion.analysis_count)
        .bind(&completion.error_message)
        .bind(completion.duration_ms)
        .bind(id)
        .bind(SyncStatus::InProgress.as_str())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return match self.find(id).await? {
                Some(record) => Err(DataError::InvalidState(format!(
                    "sync history {} already completed as {}",
                    id, record.status
                ))),
                None => Err(DataError::NotFound(format!("sync history {}", id))),
            };
        }

        info!(id, status = %completion.status, "Sync history completed");
        Ok(())
    }

    /// 남아 있는 진행 중 이력을 실패로 종료 (중단된 실행 정리).
    pub async fn mark_interrupted(&self, message: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sync_history SET status = ?, error_message = ? WHERE status = ?",
        )
        .bind(SyncStatus::Failed.as_str())
        .bind(message)
        .bind(SyncStatus::InProgress.as_str())
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find(&self, id: i64) -> Result<Option<SyncHistoryRecord>> {
        let row: Option<HistoryRow> = sqlx::query_as("SELECT * FROM sync_history WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(SyncHistoryRecord::try_from).transpose()
    }

    /// 최근 이력 (최신순).
    pub async fn recent(&self, limit: usize) -> Result<Vec<SyncHistoryRecord>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT * FROM sync_history ORDER BY synced_at DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;
        rows.into_iter().map(SyncHistoryRecord::try_from).collect()
    }

    /// 최근 `keep`개만 남기고 삭제. 삭제한 행 수를 반환합니다.
    pub async fn trim(&self, keep: usize) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM sync_history WHERE id NOT IN (
                SELECT id FROM sync_history ORDER BY synced_at DESC, id DESC LIMIT ?
            )
            "#,
        )
        .bind(keep as i64)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
