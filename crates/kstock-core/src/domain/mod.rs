//! 도메인 모델.

pub mod collection;
pub mod credential;
pub mod market_data;
pub mod stock;
pub mod sync;

pub use collection::{CollectionProgress, CollectionResult, CollectionStatus, ItemOutcome};
pub use credential::Credential;
pub use market_data::{
    ConditionItem, ConditionResult, DailySupplyDemand, EtfConstituent, EtfInfo, IndicatorKind,
    IndicatorPoint, IndicatorSeries, MarketIndicatorRow, MarketIndicators, StockAnalysis,
};
pub use stock::{is_valid_ticker, prioritize_stocks, Market, StockInfo};
pub use sync::{
    is_valid_time_of_day, SchedulingConfig, SyncCompletion, SyncHistoryRecord, SyncStatus,
    SyncType,
};
