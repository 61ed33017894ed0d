pub mod analysis;
pub mod candles;
pub mod events;
pub mod indicators;
pub mod ledger;
pub mod llm;
pub mod pattern;
pub mod prediction;
pub mod scheduler;
pub mod summary;
pub mod trend;

pub use analysis::{AnalysisRunner, AnalysisSettings, AnalysisSnapshot, PredictionJob};
pub use candles::{CandleFeed, CsvCandleFeed, FeedSession, MemoryCandleFeed};
pub use events::EconomicCalendar;
pub use indicators::{compute_frame, IndicatorConfig, IndicatorFrame, IndicatorKind};
pub use ledger::{AccountLedger, AccountTelemetry};
pub use llm::{ChatModel, LlmClient, LlmConfig, LlmProvider};
pub use pattern::{analyze_frame, analyze_pattern, PatternReport};
pub use prediction::{parse_reply, PredictionStore};
pub use scheduler::{Job, Schedule, Scheduler, SchedulerConfig};
pub use summary::{summarize, IndicatorSummary};
pub use trend::TrendScorer;
