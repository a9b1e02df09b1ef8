//! 종목 마스터 타입.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 상장 시장.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    /// 유가증권시장
    #[serde(rename = "KOSPI")]
    Kospi,
    /// 코스닥
    #[serde(rename = "KOSDAQ")]
    Kosdaq,
    /// 코넥스
    #[serde(rename = "KONEX")]
    Konex,
    /// 기타 (ETF/ETN 전용 시장 코드 등)
    #[serde(other, rename = "OTHER")]
    Other,
}

impl Market {
    /// 정렬 우선순위 (작을수록 먼저).
    pub fn priority(&self) -> u8 {
        match self {
            Market::Kospi => 0,
            Market::Kosdaq => 1,
            Market::Konex => 2,
            Market::Other => 3,
        }
    }

    /// DB 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Kospi => "KOSPI",
            Market::Kosdaq => "KOSDAQ",
            Market::Konex => "KONEX",
            Market::Other => "OTHER",
        }
    }

    /// 문자열에서 파싱 (알 수 없는 값은 `Other`).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "KOSPI" | "STK" => Market::Kospi,
            "KOSDAQ" | "KSQ" => Market::Kosdaq,
            "KONEX" | "KNX" => Market::Konex,
            _ => Market::Other,
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 종목 기본 정보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInfo {
    /// 종목코드 (6자리)
    pub ticker: String,
    /// 종목명
    pub name: String,
    /// 상장 시장
    pub market: Market,
}

impl StockInfo {
    pub fn new(ticker: impl Into<String>, name: impl Into<String>, market: Market) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
            market,
        }
    }

    /// 저장 우선순위 비교: 시장 우선순위 → 종목명 → 종목코드.
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        self.market
            .priority()
            .cmp(&other.market.priority())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.ticker.cmp(&other.ticker))
    }
}

/// 우선순위로 정렬한 뒤 `cap`개로 자릅니다.
///
/// 같은 종목코드가 중복되면 첫 번째 항목만 남깁니다.
pub fn prioritize_stocks(mut stocks: Vec<StockInfo>, cap: usize) -> Vec<StockInfo> {
    stocks.sort_by(|a, b| a.priority_cmp(b));
    let mut seen = std::collections::HashSet::new();
    stocks.retain(|s| seen.insert(s.ticker.clone()));
    stocks.truncate(cap);
    stocks
}

/// 6자리 종목코드 형식인지 확인 (영숫자 우선주 코드 포함).
pub fn is_valid_ticker(ticker: &str) -> bool {
    ticker.len() == 6 && ticker.chars().all(|c| c.is_ascii_alphanumeric())
}
