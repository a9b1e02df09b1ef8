//! SQLite 저장소.
//!
//! 모든 캐시 테이블은 하나의 SQLite 파일에 있습니다. 연결은 하나만 사용하므로
//! 같은 키에 대한 동시 쓰기는 저장소 수준에서 직렬화되고 마지막 쓰기가 남습니다.

mod schema;

use crate::error::{DataError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// SQLite 연결 풀 래퍼.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// 파일 DB에 연결하고 스키마를 적용합니다.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DataError::ConnectionError(format!("{}: {}", parent.display(), e))
                })?;
            }
        }

        info!(path = %path.display(), "Opening SQLite database");

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| DataError::ConnectionError(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// 메모리 DB (테스트, 일회성 실행용).
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        // 연결이 닫히면 메모리 DB가 사라지므로 연결을 계속 유지한다
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// 스키마 생성 (멱등).
    pub async fn migrate(&self) -> Result<()> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DataError::MigrationError(e.to_string()))?;
        }
        debug!(statements = schema::STATEMENTS.len(), "Schema applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 연결 상태 확인.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_schema() {
        let db = Database::in_memory().await.unwrap();
        db.health_check().await.unwrap();
        // 두 번 적용해도 안전
        db.migrate().await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for expected in [
            "analysis_rows",
            "cache_entries",
            "etf_collection_history",
            "etf_constituents",
            "scheduling_config",
            "stocks",
            "sync_history",
        ] {
            assert!(names.contains(&expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_file_database() {
        let dir = std::env::temp_dir().join(format!("kstock-db-test-{}", std::process::id()));
        let path = dir.join("nested").join("kstock.db");

        let db = Database::connect(&path).await.unwrap();
        db.health_check().await.unwrap();
        assert!(path.exists());

        drop(db);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
