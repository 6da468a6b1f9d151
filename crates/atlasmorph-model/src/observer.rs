//! Decode hooks.
//!
//! The model counts decodes and reports each one to an injected
//! [`DecodeObserver`]; nothing is printed by the library itself.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use atlasmorph_core::DiffeoError;

use crate::config::AnchoringMode;

/// Summary of one decode call.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeInfo {
    /// 1-based index of this decode since the model was built.
    pub decode_index: usize,
    pub batch_size: usize,
    pub anchoring: AnchoringMode,
    pub isometry: bool,
    /// Largest absolute velocity component, when statistics were requested.
    pub max_velocity: Option<f64>,
    /// Largest absolute displacement of the diffeomorphism from the identity.
    pub max_displacement: Option<f64>,
    pub elapsed: Duration,
}

/// Observer notified after every decode.
pub trait DecodeObserver: Send + Sync {
    /// Called after a successful decode.
    fn on_decode(&self, info: &DecodeInfo);

    /// Whether the model should compute the (non-free) field statistics.
    fn wants_statistics(&self) -> bool {
        false
    }

    /// Called when a decode aborts.
    fn on_error(&self, _decode_index: usize, _error: &DiffeoError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DecodeObserver for NoopObserver {
    fn on_decode(&self, _info: &DecodeInfo) {}
}

/// Observer that logs through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Log every n-th decode.
    pub log_interval: usize,
    pub statistics: bool,
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self {
            log_interval: 1,
            statistics: true,
        }
    }
}

impl TracingObserver {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
            ..Self::default()
        }
    }

    /// Skip the field statistics.
    pub fn without_statistics(mut self) -> Self {
        self.statistics = false;
        self
    }
}

impl DecodeObserver for TracingObserver {
    fn on_decode(&self, info: &DecodeInfo) {
        if info.decode_index % self.log_interval != 0 {
            return;
        }
        let fmt = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string());
        tracing::debug!(
            "Decode #{} | batch {} | {:?} | isometry {} | max |v| {} | max |u| {} | {:.2}ms",
            info.decode_index,
            info.batch_size,
            info.anchoring,
            info.isometry,
            fmt(info.max_velocity),
            fmt(info.max_displacement),
            info.elapsed.as_secs_f64() * 1e3
        );
    }

    fn wants_statistics(&self) -> bool {
        self.statistics
    }

    fn on_error(&self, decode_index: usize, error: &DiffeoError) {
        tracing::error!("Decode #{} failed: {}", decode_index, error);
    }
}

/// Observer that records every decode, for tests and offline inspection.
#[derive(Debug, Clone, Default)]
pub struct HistoryObserver {
    history: Arc<Mutex<Vec<DecodeInfo>>>,
    errors: Arc<Mutex<Vec<String>>>,
    statistics: bool,
}

impl HistoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request field statistics with every record.
    pub fn with_statistics(mut self, statistics: bool) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn history(&self) -> Vec<DecodeInfo> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DecodeObserver for HistoryObserver {
    fn on_decode(&self, info: &DecodeInfo) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(info.clone());
    }

    fn wants_statistics(&self) -> bool {
        self.statistics
    }

    fn on_error(&self, decode_index: usize, error: &DiffeoError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("#{}: {}", decode_index, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(index: usize) -> DecodeInfo {
        DecodeInfo {
            decode_index: index,
            batch_size: 2,
            anchoring: AnchoringMode::Referential,
            isometry: false,
            max_velocity: None,
            max_displacement: None,
            elapsed: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_history_records_and_clears() {
        let observer = HistoryObserver::new();
        let shared = observer.clone();
        observer.on_decode(&info(1));
        observer.on_decode(&info(2));
        observer.on_error(3, &DiffeoError::numerical_instability("velocity", "1 NaN value(s)"));

        assert_eq!(shared.history().len(), 2);
        assert_eq!(shared.history()[1].decode_index, 2);
        assert_eq!(shared.errors().len(), 1);
        assert!(shared.errors()[0].starts_with("#3"));

        shared.clear();
        assert!(observer.history().is_empty());
        assert!(observer.errors().is_empty());
    }

    #[test]
    fn test_statistics_flags() {
        assert!(!NoopObserver.wants_statistics());
        assert!(TracingObserver::default().wants_statistics());
        assert!(!TracingObserver::new(10).without_statistics().wants_statistics());
        assert!(HistoryObserver::new().with_statistics(true).wants_statistics());
        assert_eq!(TracingObserver::new(0).log_interval, 1);
    }
}
