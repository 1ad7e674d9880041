/// Per-indexer counters for the /metrics endpoint
///
/// Tracks search volume, failure classes and session churn for each
/// configured indexer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerMetrics {
    pub indexer: String,
    pub searches: u64,
    pub failed_searches: u64,
    pub results_returned: u64,
    pub session_renewals: u64,
    pub expired_sessions: u64,
    pub rate_limit_hits: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub average_search_ms: f64,
    total_search_ms: u64,
}

impl IndexerMetrics {
    fn new(indexer: &str) -> Self {
        Self {
            indexer: indexer.to_string(),
            searches: 0,
            failed_searches: 0,
            results_returned: 0,
            session_renewals: 0,
            expired_sessions: 0,
            rate_limit_hits: 0,
            last_success: None,
            last_failure: None,
            last_error: None,
            average_search_ms: 0.0,
            total_search_ms: 0,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.searches == 0 {
            0.0
        } else {
            ((self.searches - self.failed_searches) as f64 / self.searches as f64) * 100.0
        }
    }
}

/// Thread-safe metrics registry shared across handlers
#[derive(Clone)]
pub struct MetricsTracker {
    metrics: Arc<Mutex<HashMap<String, IndexerMetrics>>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn with_entry<F: FnOnce(&mut IndexerMetrics)>(&self, indexer: &str, f: F) {
        let mut metrics = self.metrics.lock().unwrap();
        let entry = metrics
            .entry(indexer.to_string())
            .or_insert_with(|| IndexerMetrics::new(indexer));
        f(entry);
    }

    pub fn record_search(&self, indexer: &str, duration: Duration, results: usize) {
        self.with_entry(indexer, |m| {
            m.searches += 1;
            m.results_returned += results as u64;
            m.last_success = Some(Utc::now());
            m.total_search_ms += duration.as_millis() as u64;
            let successful = m.searches - m.failed_searches;
            if successful > 0 {
                m.average_search_ms = m.total_search_ms as f64 / successful as f64;
            }
        });
    }

    pub fn record_failure(&self, indexer: &str, error: &str) {
        self.with_entry(indexer, |m| {
            m.searches += 1;
            m.failed_searches += 1;
            m.last_failure = Some(Utc::now());
            m.last_error = Some(error.to_string());
            if error.to_lowercase().contains("rate limited") {
                m.rate_limit_hits += 1;
            }
        });
    }

    pub fn record_renewal(&self, indexer: &str) {
        self.with_entry(indexer, |m| m.session_renewals += 1);
    }

    pub fn record_expired_session(&self, indexer: &str) {
        self.with_entry(indexer, |m| m.expired_sessions += 1);
    }

    pub fn snapshot(&self) -> Vec<IndexerMetrics> {
        let metrics = self.metrics.lock().unwrap();
        let mut all: Vec<_> = metrics.values().cloned().collect();
        all.sort_by(|a, b| a.indexer.cmp(&b.indexer));
        all
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}
