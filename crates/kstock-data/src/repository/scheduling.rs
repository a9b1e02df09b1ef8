//! 일일 동기화 스케줄 설정 (단일 행).

use crate::error::{DataError, Result};
use crate::storage::Database;
use chrono::{DateTime, Utc};
use kstock_core::{is_valid_time_of_day, SchedulingConfig, SharedClock};
use sqlx::FromRow;
use tracing::info;

#[derive(FromRow)]
struct ConfigRow {
    is_enabled: bool,
    sync_hour: i64,
    sync_minute: i64,
    last_sync_at: Option<i64>,
    last_sync_status: Option<String>,
    last_sync_message: Option<String>,
}

impl From<ConfigRow> for SchedulingConfig {
    fn from(row: ConfigRow) -> Self {
        SchedulingConfig {
            is_enabled: row.is_enabled,
            sync_hour: row.sync_hour as u32,
            sync_minute: row.sync_minute as u32,
            last_sync_at: row.last_sync_at.and_then(DateTime::from_timestamp_millis),
            last_sync_status: row.last_sync_status,
            last_sync_message: row.last_sync_message,
        }
    }
}

pub struct SchedulingConfigRepository {
    db: Database,
    clock: SharedClock,
}

impl SchedulingConfigRepository {
    pub fn new(db: Database, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    async fn ensure_row(&self) -> Result<()> {
        let defaults = SchedulingConfig::default();
        sqlx::query(
            "INSERT OR IGNORE INTO scheduling_config (id, is_enabled, sync_hour, sync_minute) VALUES (1, ?, ?, ?)",
        )
        .bind(defaults.is_enabled)
        .bind(defaults.sync_hour as i64)
        .bind(defaults.sync_minute as i64)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// 설정 조회. 행이 없으면 기본값으로 생성합니다.
    pub async fn get(&self) -> Result<SchedulingConfig> {
        self.ensure_row().await?;
        let row: ConfigRow = sqlx::query_as(
            r#"
            SELECT is_enabled, sync_hour, sync_minute, last_sync_at, last_sync_status, last_sync_message
            FROM scheduling_config WHERE id = 1
            "#,
        )
        .fetch_one(self.db.pool())
        .await?;
        Ok(row.into())
    }

    /// 실행 여부와 시각 변경.
    pub async fn set_schedule(&self, enabled: bool, hour: u32, minute: u32) -> Result<SchedulingConfig> {
        if !is_valid_time_of_day(hour, minute) {
            return Err(DataError::InvalidData(format!(
                "잘못된 실행 시각: {:02}:{:02}",
                hour, minute
            )));
        }

        self.ensure_row().await?;
        sqlx::query(
            "UPDATE scheduling_config SET is_enabled = ?, sync_hour = ?, sync_minute = ? WHERE id = 1",
        )
        .bind(enabled)
        .bind(hour as i64)
        .bind(minute as i64)
        .execute(self.db.pool())
        .await?;

        info!(enabled, hour, minute, "Sync schedule updated");
        self.get().await
    }

    /// 마지막 실행 결과 기록.
    pub async fn record_result(
        &self,
        status: &str,
        message: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_row().await?;
        sqlx::query(
            "UPDATE scheduling_config SET last_sync_at = ?, last_sync_status = ?, last_sync_message = ? WHERE id = 1",
        )
        .bind(at.timestamp_millis())
        .bind(status)
        .bind(message)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// 현재 시각으로 결과 기록.
    pub async fn record_result_now(&self, status: &str, message: Option<&str>) -> Result<()> {
        self.record_result(status, message, self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kstock_core::ManualClock;
    use std::sync::Arc;

    async fn repo() -> (ManualClock, SchedulingConfigRepository) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        let db = Database::in_memory().await.unwrap();
        (clock.clone(), SchedulingConfigRepository::new(db, Arc::new(clock)))
    }

    #[tokio::test]
    async fn test_get_creates_defaults_lazily() {
        let (_clock, repo) = repo().await;
        let config = repo.get().await.unwrap();
        assert_eq!(config, SchedulingConfig::default());

        // 다시 호출해도 행은 하나
        repo.get().await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scheduling_config")
            .fetch_one(repo.db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_set_schedule_validates() {
        let (_clock, repo) = repo().await;
        let updated = repo.set_schedule(false, 7, 30).await.unwrap();
        assert!(!updated.is_enabled);
        assert_eq!((updated.sync_hour, updated.sync_minute), (7, 30));

        assert!(matches!(
            repo.set_schedule(true, 24, 0).await,
            Err(DataError::InvalidData(_))
        ));
        assert_eq!(repo.get().await.unwrap().sync_hour, 7);
    }

    #[tokio::test]
    async fn test_record_result() {
        let (clock, repo) = repo().await;
        repo.record_result_now("PARTIAL", Some("1건 실패")).await.unwrap();

        let config = repo.get().await.unwrap();
        assert_eq!(config.last_sync_status.as_deref(), Some("PARTIAL"));
        assert_eq!(config.last_sync_message.as_deref(), Some("1건 실패"));
        assert_eq!(config.last_sync_at, Some(kstock_core::Clock::now(&clock)));
        // 스케줄 값은 그대로
        assert!(config.is_enabled);
    }
}
