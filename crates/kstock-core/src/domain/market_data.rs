//! 분석 엔진이 반환하는 시장 데이터 타입.
//!
//! 지표 계산 알고리즘은 분석 엔진 내부에 있으며, 여기서는 결과 형태만 정의합니다.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 일자별 투자자 수급.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySupplyDemand {
    /// 거래일
    pub date: NaiveDate,
    /// 종가 (원)
    pub close_price: i64,
    /// 거래량
    pub volume: i64,
    /// 시가총액 (원)
    #[serde(default)]
    pub market_cap: Option<i64>,
    /// 외국인 순매수 금액 (원)
    pub foreign_net_buy: i64,
    /// 기관 순매수 금액 (원)
    pub institution_net_buy: i64,
    /// 개인 순매수 금액 (원)
    #[serde(default)]
    pub individual_net_buy: i64,
}

/// 종목 수급 분석 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAnalysis {
    /// 종목코드
    pub ticker: String,
    /// 종목명
    #[serde(default)]
    pub name: Option<String>,
    /// 일자별 수급 (오래된 순)
    pub rows: Vec<DailySupplyDemand>,
}

impl StockAnalysis {
    /// 가장 최근 거래일.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.date).max()
    }
}

/// 기술적 지표 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    /// 추세 신호
    Trend,
    /// 엘더 레이
    Elder,
    /// 디마크
    Demark,
    Rsi,
    Macd,
    /// 볼린저 밴드
    Bollinger,
}

impl IndicatorKind {
    /// 브릿지 호출 및 캐시 키에 사용하는 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Trend => "trend",
            IndicatorKind::Elder => "elder",
            IndicatorKind::Demark => "demark",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Macd => "macd",
            IndicatorKind::Bollinger => "bollinger",
        }
    }
}

impl std::str::FromStr for IndicatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trend" => Ok(IndicatorKind::Trend),
            "elder" => Ok(IndicatorKind::Elder),
            "demark" => Ok(IndicatorKind::Demark),
            "rsi" => Ok(IndicatorKind::Rsi),
            "macd" => Ok(IndicatorKind::Macd),
            "bollinger" => Ok(IndicatorKind::Bollinger),
            _ => Err(format!("Unknown indicator: {}", s)),
        }
    }
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 지표 값 한 점.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    /// 지표별 시리즈 이름 → 값 (예: "macd", "signal", "histogram")
    pub values: BTreeMap<String, f64>,
}

/// 종목별 지표 시계열.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub ticker: String,
    pub kind: IndicatorKind,
    pub points: Vec<IndicatorPoint>,
}

/// 시장 지표 한 행 (고객예탁금, 신용잔고 등).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndicatorRow {
    pub date: NaiveDate,
    /// 지수 종가
    #[serde(default)]
    pub index_close: Option<f64>,
    /// 고객예탁금 (억원)
    #[serde(default)]
    pub customer_deposit: Option<i64>,
    /// 신용잔고 (억원)
    #[serde(default)]
    pub credit_balance: Option<i64>,
}

/// 시장 지표 묶음.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndicators {
    /// 대상 시장 ("KOSPI", "KOSDAQ")
    pub market: String,
    pub rows: Vec<MarketIndicatorRow>,
}

/// 조건검색식.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionItem {
    /// 조건식 번호
    pub index: i32,
    /// 조건식 이름
    pub name: String,
}

/// 조건검색 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionResult {
    pub condition: ConditionItem,
    /// 조건을 만족하는 종목코드
    pub tickers: Vec<String>,
}

/// ETF 기본 정보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtfInfo {
    pub ticker: String,
    pub name: String,
    /// 운용사
    #[serde(default)]
    pub issuer: Option<String>,
}

/// ETF 구성종목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfConstituent {
    /// 구성종목 코드
    pub stock_ticker: String,
    /// 구성종목명
    pub stock_name: String,
    /// 편입 비중 (%)
    pub weight: Decimal,
    /// 보유 수량
    #[serde(default)]
    pub shares: Option<i64>,
    /// 평가 금액 (원)
    #[serde(default)]
    pub amount: Option<i64>,
}
