//! Indicator frame: candles plus the derived columns computed over them.

use super::series::Column;
use super::IndicatorKind;
use crate::error::IndicatorError;
use crate::types::Candle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SuperTrend crossover signal for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendSignal {
    Buy,
    Sell,
    Hold,
}

impl TrendSignal {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }
}

/// Outcome of one indicator in a frame computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum IndicatorStatus {
    Computed,
    Failed(String),
    NotRequested,
}

/// Columns produced by a single indicator.
#[derive(Debug, Clone, Default)]
pub struct IndicatorOutput {
    pub columns: Vec<(String, Column)>,
    pub signals: Vec<(String, Vec<Option<TrendSignal>>)>,
}

impl IndicatorOutput {
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.push((name.into(), column));
        self
    }

    pub fn with_signals(mut self, name: impl Into<String>, signals: Vec<Option<TrendSignal>>) -> Self {
        self.signals.push((name.into(), signals));
        self
    }
}

/// Candles plus named derived columns, all aligned to the candle index.
#[derive(Debug, Clone, Default)]
pub struct IndicatorFrame {
    candles: Vec<Candle>,
    columns: BTreeMap<String, Column>,
    signals: BTreeMap<String, Vec<Option<TrendSignal>>>,
    statuses: BTreeMap<IndicatorKind, IndicatorStatus>,
    /// Index of each column's first computed value, taken before gap filling.
    first_defined: BTreeMap<String, usize>,
}

impl IndicatorFrame {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn signal_column(&self, name: &str) -> Option<&[Option<TrendSignal>]> {
        self.signals.get(name).map(Vec::as_slice)
    }

    pub fn status(&self, kind: IndicatorKind) -> Option<&IndicatorStatus> {
        self.statuses.get(&kind)
    }

    pub fn statuses(&self) -> &BTreeMap<IndicatorKind, IndicatorStatus> {
        &self.statuses
    }

    pub(crate) fn set_status(&mut self, kind: IndicatorKind, status: IndicatorStatus) {
        self.statuses.insert(kind, status);
    }

    /// Add an indicator's columns. Existing columns with the same name are replaced.
    pub(crate) fn merge(&mut self, output: IndicatorOutput) {
        for (name, column) in output.columns {
            self.columns.insert(name, column);
        }
        for (name, signals) in output.signals {
            self.signals.insert(name, signals);
        }
    }

    /// Fill undefined cells so every row is readable.
    ///
    /// Leading gaps take the first defined value. Any later gap takes the
    /// previous value, which covers the trailing rows of the displaced
    /// chikou span. Warm-up rows stay recognizable through
    /// [`FrameRow::is_warm`].
    pub fn fill_gaps(&mut self) {
        for (name, column) in self.columns.iter_mut() {
            if let Some(first) = column.iter().position(Option::is_some) {
                self.first_defined.entry(name.clone()).or_insert(first);
            }
            fill_column(column);
        }
        for signals in self.signals.values_mut() {
            for s in signals.iter_mut() {
                if s.is_none() {
                    *s = Some(TrendSignal::Hold);
                }
            }
        }
    }

    /// Read-only view of one row.
    pub fn row(&self, index: usize) -> Option<FrameRow<'_>> {
        if index < self.candles.len() {
            Some(FrameRow { frame: self, index })
        } else {
            None
        }
    }

    /// Previous and current rows at the end of the frame.
    pub fn latest_pair(&self) -> Option<(FrameRow<'_>, FrameRow<'_>)> {
        let len = self.candles.len();
        if len < 2 {
            return None;
        }
        Some((self.row(len - 2)?, self.row(len - 1)?))
    }
}

fn fill_column(column: &mut Column) {
    let Some(first) = column.iter().flatten().next().copied() else {
        return;
    };

    let mut last = first;
    for cell in column.iter_mut() {
        match cell {
            Some(v) => last = *v,
            None => *cell = Some(last),
        }
    }
}

/// A single row of an [`IndicatorFrame`].
#[derive(Debug, Clone, Copy)]
pub struct FrameRow<'a> {
    frame: &'a IndicatorFrame,
    index: usize,
}

impl<'a> FrameRow<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn candle(&self) -> &'a Candle {
        &self.frame.candles[self.index]
    }

    pub fn close(&self) -> f64 {
        self.candle().close
    }

    /// Value of a column at this row, if the column exists and is defined.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.frame
            .columns
            .get(name)
            .and_then(|c| c.get(self.index).copied().flatten())
    }

    /// Value of the first candidate column that is defined at this row.
    pub fn probe(&self, candidates: &[&str]) -> Result<f64, IndicatorError> {
        candidates
            .iter()
            .find_map(|name| self.get(name))
            .ok_or_else(|| IndicatorError::MissingColumn {
                candidates: candidates.iter().map(|s| s.to_string()).collect(),
            })
    }

    /// True when this row precedes the column's first computed value, i.e.
    /// the cell holds a back-filled warm-up copy.
    pub fn is_warm(&self, name: &str) -> bool {
        self.frame
            .first_defined
            .get(name)
            .is_some_and(|&first| self.index < first)
    }

    /// Like [`probe`](Self::probe), but rejects back-filled warm-up cells.
    pub fn settled(&self, candidates: &[&str]) -> Result<f64, IndicatorError> {
        let (name, value) = candidates
            .iter()
            .find_map(|name| self.get(name).map(|v| (*name, v)))
            .ok_or_else(|| IndicatorError::MissingColumn {
                candidates: candidates.iter().map(|s| s.to_string()).collect(),
            })?;

        if self.is_warm(name) {
            return Err(IndicatorError::WarmUp {
                column: name.to_string(),
                index: self.index,
            });
        }
        Ok(value)
    }

    pub fn signal(&self, name: &str) -> Option<TrendSignal> {
        self.frame
            .signals
            .get(name)
            .and_then(|c| c.get(self.index).copied().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(column: Column) -> IndicatorFrame {
        let candles = (0..column.len())
            .map(|i| Candle::new(i as i64, 1.0, 1.0, 1.0, 1.0))
            .collect();
        let mut frame = IndicatorFrame::new(candles);
        frame.merge(IndicatorOutput::default().with_column("x", column));
        frame
    }

    #[test]
    fn test_fill_gaps_leading_and_trailing() {
        let mut frame = frame_with(vec![None, None, Some(2.0), Some(3.0), None]);
        frame.fill_gaps();
        let filled = frame.column("x").unwrap();
        assert_eq!(filled, &vec![Some(2.0), Some(2.0), Some(2.0), Some(3.0), Some(3.0)]);
    }

    #[test]
    fn test_probe_fallback_names() {
        let frame = frame_with(vec![Some(1.0), Some(5.0)]);
        let row = frame.row(1).unwrap();
        assert_eq!(row.probe(&["missing", "x"]), Ok(5.0));

        let err = row.probe(&["a", "b"]).unwrap_err();
        assert_eq!(
            err,
            IndicatorError::MissingColumn {
                candidates: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[test]
    fn test_warm_up_rows_survive_filling() {
        let mut frame = frame_with(vec![None, None, Some(2.0), Some(3.0), None]);
        frame.fill_gaps();

        let warm = frame.row(1).unwrap();
        assert!(warm.is_warm("x"));
        assert_eq!(warm.probe(&["x"]), Ok(2.0));
        assert_eq!(
            warm.settled(&["x"]),
            Err(IndicatorError::WarmUp {
                column: "x".to_string(),
                index: 1
            })
        );

        // Forward-filled trailing rows are not warm-up
        let tail = frame.row(4).unwrap();
        assert!(!tail.is_warm("x"));
        assert_eq!(tail.settled(&["x"]), Ok(3.0));
        assert_eq!(frame.row(2).unwrap().settled(&["x"]), Ok(2.0));
    }

    #[test]
    fn test_latest_pair() {
        let frame = frame_with(vec![Some(1.0), Some(2.0), Some(3.0)]);
        let (prev, current) = frame.latest_pair().unwrap();
        assert_eq!(prev.index(), 1);
        assert_eq!(current.index(), 2);
        assert!(frame_with(vec![Some(1.0)]).latest_pair().is_none());
    }
}
