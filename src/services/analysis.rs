//! One analysis run: candles in, verdict, pattern, summary and optional
//! model prediction out.

use crate::error::{AppError, Result};
use crate::services::candles::{latest_complete_candle, CandleFeed, FeedSession};
use crate::services::indicators::{compute_frame, IndicatorConfig, IndicatorKind, IndicatorStatus};
use crate::services::llm::{ChatModel, PromptContext, SYSTEM_PROMPT};
use crate::services::pattern::{analyze_frame, PatternReport};
use crate::services::prediction::{parse_reply, PredictionStore};
use crate::services::scheduler::Job;
use crate::services::summary::{summarize, IndicatorSummary};
use crate::services::trend::TrendScorer;
use crate::types::{PredictionRecord, Timeframe, TrendVerdict};
use chrono::{DateTime, Local, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// What to analyze and where predictions go.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candle_count: usize,
    pub prediction_prefix: String,
    pub news_dir: Option<PathBuf>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            symbol: "XAUUSD".to_string(),
            timeframe: Timeframe::H2,
            candle_count: 100,
            prediction_prefix: "ppx_re_".to_string(),
            news_dir: None,
        }
    }
}

/// Technical state at the latest complete candle.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSnapshot {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candle_time: DateTime<Utc>,
    pub candles: usize,
    pub verdict: TrendVerdict,
    pub pattern: Option<PatternReport>,
    pub summary: IndicatorSummary,
    pub statuses: BTreeMap<IndicatorKind, IndicatorStatus>,
}

impl AnalysisSnapshot {
    fn prompt(&self, news: Option<String>) -> PromptContext {
        PromptContext {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.name().to_string(),
            candle_time: self.candle_time.format("%Y-%m-%d %H:%M UTC").to_string(),
            trend: self.verdict.to_string(),
            pattern: self
                .pattern
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "Not enough candles for pattern analysis".to_string()),
            indicators: self.summary.render(),
            news,
        }
    }
}

/// A stored model prediction and the snapshot it was made from.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutcome {
    pub snapshot: AnalysisSnapshot,
    pub record: PredictionRecord,
    pub path: PathBuf,
}

pub struct AnalysisRunner {
    feed: Arc<dyn CandleFeed>,
    indicators: IndicatorConfig,
    settings: AnalysisSettings,
    model: Option<Arc<dyn ChatModel>>,
    store: PredictionStore,
}

impl AnalysisRunner {
    pub fn new(
        feed: Arc<dyn CandleFeed>,
        indicators: IndicatorConfig,
        settings: AnalysisSettings,
        store: PredictionStore,
    ) -> Self {
        Self {
            feed,
            indicators,
            settings,
            model: None,
            store,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Compute the technical snapshot as of `now`.
    pub fn analyze(&self, now: DateTime<Utc>) -> Result<AnalysisSnapshot> {
        let s = &self.settings;
        let until = latest_complete_candle(s.timeframe, now);

        let candles = {
            let session = FeedSession::open(self.feed.as_ref())?;
            session.fetch(&s.symbol, s.timeframe, until.timestamp(), s.candle_count)?
        };

        let frame = compute_frame(&candles, &self.indicators);
        let index = frame.len() - 1;

        let scorer = TrendScorer::from_ema(&self.indicators.ema);
        let verdict = scorer.score(&frame)?;

        let pattern = match analyze_frame(&frame, index) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Pattern analysis skipped: {}", e);
                None
            }
        };

        let summary = summarize(&frame, index, scorer.fast_ema, scorer.slow_ema);
        let candle_time = frame.candles()[index].datetime().unwrap_or(until);

        info!("{} {} at {}: {}", s.symbol, s.timeframe, candle_time, verdict);

        Ok(AnalysisSnapshot {
            symbol: s.symbol.clone(),
            timeframe: s.timeframe,
            candle_time,
            candles: frame.len(),
            verdict,
            pattern,
            summary,
            statuses: frame.statuses().clone(),
        })
    }

    /// Analyze, ask the model, parse the reply and persist the record.
    pub async fn predict(&self, now: DateTime<Utc>) -> Result<PredictionOutcome> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("no language model configured".to_string()))?;

        let snapshot = self.analyze(now)?;
        let news = self.settings.news_dir.as_deref().and_then(latest_news);
        let prompt = snapshot.prompt(news).render();

        let reply = model.complete(SYSTEM_PROMPT, &prompt).await?;
        let record = parse_reply(&reply)?;

        let local = now.with_timezone(&Local).naive_local();
        let path = self.store.save(&self.settings.prediction_prefix, &record, local)?;

        info!(
            "Prediction {} ({}%) saved to {}",
            record.next_candle_trend.name(),
            record.confidence_level,
            path.display()
        );

        Ok(PredictionOutcome { snapshot, record, path })
    }
}

/// Text of the most recently modified `*.txt` file in `dir`.
fn latest_news(dir: &Path) -> Option<String> {
    let newest = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "txt"))
        .filter_map(|entry| Some((entry.metadata().ok()?.modified().ok()?, entry.path())))
        .max()?;

    match std::fs::read_to_string(&newest.1) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to read news file {}: {}", newest.1.display(), e);
            None
        }
    }
}

/// Scheduled prediction run.
pub struct PredictionJob {
    name: String,
    runner: Arc<AnalysisRunner>,
}

impl PredictionJob {
    pub fn new(runner: Arc<AnalysisRunner>) -> Self {
        let s = runner.settings();
        let name = format!("predict_{}_{}", s.symbol.to_lowercase(), s.timeframe.name().to_lowercase());
        Self { name, runner }
    }
}

impl Job for PredictionJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.runner.predict(Utc::now()).await.map(|_| ()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::candles::MemoryCandleFeed;
    use crate::types::{Candle, TrendCall};
    use chrono::TimeZone;

    struct CannedModel(&'static str);

    impl ChatModel for CannedModel {
        fn complete<'a>(&'a self, _system: &'a str, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
            assert!(prompt.contains("XAUUSD"));
            Box::pin(async move { Ok(self.0.to_string()) })
        }
    }

    fn rising(n: usize, end: DateTime<Utc>) -> Vec<Candle> {
        let step = Timeframe::H2.seconds();
        let start = end.timestamp() - step * (n as i64 - 1);
        (0..n)
            .map(|i| {
                let open = 2600.0 + i as f64 * 1.5 + (i % 3) as f64 * 0.4;
                let close = open + if i % 4 == 3 { -0.8 } else { 1.2 };
                Candle::new(start + step * i as i64, open, open.max(close) + 0.6, open.min(close) - 0.5, close)
            })
            .collect()
    }

    fn runner(feed: Arc<MemoryCandleFeed>, dir: &Path) -> AnalysisRunner {
        AnalysisRunner::new(
            feed,
            IndicatorConfig::default(),
            AnalysisSettings::default(),
            PredictionStore::new(dir),
        )
    }

    #[test]
    fn test_analyze_rising_market() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 13, 16, 0).unwrap();
        let last = latest_complete_candle(Timeframe::H2, now);
        let feed = Arc::new(MemoryCandleFeed::new());
        feed.insert("XAUUSD", Timeframe::H2, rising(100, last));

        let dir = tempfile::tempdir().unwrap();
        let snapshot = runner(Arc::clone(&feed), dir.path()).analyze(now).unwrap();

        assert_eq!(snapshot.candles, 100);
        assert_eq!(snapshot.candle_time, last);
        assert!(snapshot.verdict.score > 0.0);
        assert!(snapshot.pattern.is_some());
        assert_eq!(feed.sessions_closed(), 1);
    }

    #[test]
    fn test_empty_feed_is_upstream_unavailable() {
        let feed = Arc::new(MemoryCandleFeed::new());
        let dir = tempfile::tempdir().unwrap();
        let err = runner(Arc::clone(&feed), dir.path()).analyze(Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        assert_eq!(feed.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_predict_persists_record() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 13, 16, 0).unwrap();
        let feed = Arc::new(MemoryCandleFeed::new());
        feed.insert("XAUUSD", Timeframe::H2, rising(100, latest_complete_candle(Timeframe::H2, now)));

        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(CannedModel(
            "<think>weighing</think>\n1. Next candle trend: buy\n2. Confidence level: 72%\n3. Key factors: trend intact",
        ));
        let outcome = runner(feed, dir.path()).with_model(model).predict(now).await.unwrap();

        assert_eq!(outcome.record.next_candle_trend, TrendCall::Buy);
        assert!(outcome.path.exists());
        let stored = PredictionStore::new(dir.path()).load_latest("ppx_re_").unwrap().unwrap();
        assert_eq!(stored["confidence_level"], 72);
    }

    #[tokio::test]
    async fn test_predict_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner(Arc::new(MemoryCandleFeed::new()), dir.path())
            .predict(Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
