use crate::services::indicators::IndicatorConfig;
use crate::services::llm::{LlmConfig, LlmProvider};
use crate::services::scheduler::{ExecutionWindow, RetryPolicy, SchedulerConfig};
use crate::types::Timeframe;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Filesystem locations for served and recorded data.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory of `ppx_re_*.json` prediction files.
    pub prediction_dir: PathBuf,
    /// File prefix for predictions.
    pub prediction_prefix: String,
    /// Directory of per-language ticker analyses.
    pub ticker_dir: PathBuf,
    /// Root of the per-account CSV ledger.
    pub ledger_dir: PathBuf,
    /// Directory of exported `{SYMBOL}_{TF}.csv` candle files.
    pub candle_dir: PathBuf,
    /// Optional directory of news text files fed into prompts.
    pub news_dir: Option<PathBuf>,
    /// Optional economic calendar JSON overriding the bundled table.
    pub calendar_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prediction_dir: PathBuf::from("ppx"),
            prediction_prefix: "ppx_re_".to_string(),
            ticker_dir: PathBuf::from("json"),
            ledger_dir: PathBuf::from("account"),
            candle_dir: PathBuf::from("candles"),
            news_dir: None,
            calendar_path: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Instrument analyzed by the scheduled job.
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Candles fetched per analysis run.
    pub candle_count: usize,
    pub storage: StorageConfig,
    pub indicators: IndicatorConfig,
    pub llm: LlmConfig,
    pub scheduler: SchedulerConfig,
}

fn parse_hours(s: &str) -> Vec<u32> {
    s.split(',')
        .filter_map(|h| h.trim().parse().ok())
        .filter(|h| *h < 24)
        .collect()
}

fn flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut indicators = IndicatorConfig::default();
        if let Ok(selection) = env::var("INDICATORS") {
            indicators.selected = IndicatorConfig::parse_selection(&selection);
        }
        if let Some(multiplier) = env::var("SUPERTREND_MULTIPLIER").ok().and_then(|v| v.parse().ok()) {
            indicators.supertrend.multiplier = multiplier;
        }

        let provider = env::var("LLM_PROVIDER")
            .ok()
            .and_then(|p| LlmProvider::from_str(&p))
            .unwrap_or_default();
        let api_key = match provider {
            LlmProvider::OpenAi => env::var("OPENAI_API_KEY").ok(),
            LlmProvider::Perplexity => env::var("PERPLEXITY_API_KEY").ok(),
        };
        let llm = LlmConfig {
            provider,
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: env::var("LLM_BASE_URL").ok(),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| provider.default_model().to_string()),
            max_tokens: env::var("LLM_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            temperature: env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            timeout: Duration::from_secs(
                env::var("LLM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(120),
            ),
        };

        let scheduler = SchedulerConfig {
            enabled: flag("SCHEDULER_ENABLED", false),
            minute: env::var("SCHEDULE_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|m: &u32| *m < 60)
                .unwrap_or(16),
            window: ExecutionWindow {
                skip_weekends: flag("SCHEDULE_SKIP_WEEKENDS", true),
                blackout_hours: env::var("SCHEDULE_BLACKOUT_HOURS")
                    .map(|v| parse_hours(&v))
                    .unwrap_or_else(|_| vec![0]),
            },
            retry: RetryPolicy {
                max_attempts: env::var("JOB_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3),
                backoff: Duration::from_secs(
                    env::var("JOB_RETRY_BACKOFF_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(60),
                ),
            },
            history_capacity: env::var("JOB_HISTORY_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
        };

        let defaults = StorageConfig::default();
        let storage = StorageConfig {
            prediction_dir: env::var("PREDICTION_DIR").map(PathBuf::from).unwrap_or(defaults.prediction_dir),
            prediction_prefix: env::var("PREDICTION_PREFIX").unwrap_or(defaults.prediction_prefix),
            ticker_dir: env::var("TICKER_DIR").map(PathBuf::from).unwrap_or(defaults.ticker_dir),
            ledger_dir: env::var("LEDGER_DIR").map(PathBuf::from).unwrap_or(defaults.ledger_dir),
            candle_dir: env::var("CANDLE_DIR").map(PathBuf::from).unwrap_or(defaults.candle_dir),
            news_dir: env::var("NEWS_DIR").ok().map(PathBuf::from),
            calendar_path: env::var("ECONOMIC_CALENDAR_PATH").ok().map(PathBuf::from),
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            symbol: env::var("SYMBOL")
                .map(|s| s.to_uppercase())
                .unwrap_or_else(|_| "XAUUSD".to_string()),
            timeframe: env::var("TIMEFRAME")
                .ok()
                .and_then(|t| Timeframe::from_str(&t))
                .unwrap_or_default(),
            candle_count: env::var("CANDLE_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            storage,
            indicators,
            llm,
            scheduler,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            symbol: "XAUUSD".to_string(),
            timeframe: Timeframe::default(),
            candle_count: 100,
            storage: StorageConfig::default(),
            indicators: IndicatorConfig::default(),
            llm: LlmConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3001);
        assert_eq!(config.symbol, "XAUUSD");
        assert_eq!(config.timeframe, Timeframe::H2);
        assert_eq!(config.storage.prediction_prefix, "ppx_re_");
        assert_eq!(config.scheduler.minute, 16);
        assert_eq!(config.scheduler.retry.max_attempts, 3);
        assert!(!config.scheduler.enabled);
    }

    #[test]
    fn test_parse_hours() {
        assert_eq!(parse_hours("0, 1,23"), vec![0, 1, 23]);
        assert_eq!(parse_hours("24,x,5"), vec![5]);
        assert!(parse_hours("").is_empty());
    }
}
