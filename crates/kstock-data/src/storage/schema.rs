//! 테이블 정의.
//!
//! 시각 컬럼은 epoch 밀리초 정수, 거래일 컬럼은 `YYYY-MM-DD` 문자열입니다.

pub(super) const STATEMENTS: &[&str] = &[
    // 범용 키-값 캐시 (지표, 시장 지표, 조건식, ETF 목록)
    r#"
    CREATE TABLE IF NOT EXISTS cache_entries (
        domain     TEXT    NOT NULL,
        cache_key  TEXT    NOT NULL,
        payload    TEXT    NOT NULL,
        cached_at  INTEGER NOT NULL,
        PRIMARY KEY (domain, cache_key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stocks (
        ticker     TEXT    PRIMARY KEY,
        name       TEXT    NOT NULL,
        market     TEXT    NOT NULL,
        cached_at  INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_stocks_cached_at ON stocks (cached_at)",
    r#"
    CREATE TABLE IF NOT EXISTS analysis_rows (
        ticker     TEXT    NOT NULL,
        trade_date TEXT    NOT NULL,
        payload    TEXT    NOT NULL,
        cached_at  INTEGER NOT NULL,
        PRIMARY KEY (ticker, trade_date)
    )
    "#,
    // 종목별로 원격에서 받아 둔 가장 이른 시작일
    r#"
    CREATE TABLE IF NOT EXISTS analysis_coverage (
        ticker       TEXT PRIMARY KEY,
        covered_from TEXT NOT NULL
    )
    "#,
    // 전체 동기화 시각 (단건 조회로 갱신되지 않음)
    r#"
    CREATE TABLE IF NOT EXISTS sync_markers (
        name      TEXT    PRIMARY KEY,
        synced_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS etf_constituents (
        etf_ticker   TEXT    NOT NULL,
        base_date    TEXT    NOT NULL,
        stock_ticker TEXT    NOT NULL,
        stock_name   TEXT    NOT NULL,
        weight       TEXT    NOT NULL,
        shares       INTEGER,
        amount       INTEGER,
        cached_at    INTEGER NOT NULL,
        PRIMARY KEY (etf_ticker, base_date, stock_ticker)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS etf_collection_history (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        status        TEXT    NOT NULL,
        total_count   INTEGER NOT NULL,
        success_count INTEGER NOT NULL,
        failed_count  INTEGER NOT NULL,
        error_message TEXT,
        started_at    INTEGER NOT NULL,
        finished_at   INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_history (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        sync_type      TEXT    NOT NULL,
        status         TEXT    NOT NULL,
        stock_count    INTEGER NOT NULL DEFAULT 0,
        analysis_count INTEGER NOT NULL DEFAULT 0,
        error_message  TEXT,
        duration_ms    INTEGER NOT NULL DEFAULT 0,
        synced_at      INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scheduling_config (
        id                INTEGER PRIMARY KEY CHECK (id = 1),
        is_enabled        INTEGER NOT NULL,
        sync_hour         INTEGER NOT NULL,
        sync_minute       INTEGER NOT NULL,
        last_sync_at      INTEGER,
        last_sync_status  TEXT,
        last_sync_message TEXT
    )
    "#,
];
