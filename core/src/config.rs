use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tunable ranking parameters for the weighted sum
/// `(w_r*relevance + w_p*popularity + w_f*freshness) * category_boost`,
/// plus the knobs for pool sizing, A/B traffic split and LTR routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Weight for the normalized base relevance score.
    pub relevance_weight: f64,
    /// Weight for click-derived popularity.
    pub popularity_weight: f64,
    /// Weight for publish-date freshness.
    pub freshness_weight: f64,
    /// Multiplier applied when an article matches the category filter.
    pub category_match_boost: f64,
    /// Freshness half-life control: higher means slower decay.
    pub freshness_decay_days: f64,
    /// Candidates fetched from retrieval before re-ranking. Larger than the
    /// page size so re-ranking can surface documents from beyond the first
    /// page of raw retrieval.
    pub rerank_pool_size: usize,
    /// Fraction of traffic routed to variant B.
    pub b_traffic_fraction: f64,
    /// Route variant B through the LTR model instead of the weighted sum.
    pub ltr_enabled: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            relevance_weight: 1.0,
            popularity_weight: 0.3,
            freshness_weight: 0.2,
            category_match_boost: 1.5,
            freshness_decay_days: 30.0,
            rerank_pool_size: 100,
            b_traffic_fraction: 0.10,
            ltr_enabled: false,
        }
    }
}

/// Process-wide config handle. The config itself is an immutable snapshot
/// behind an `Arc`; admin updates swap the whole snapshot, so a request that
/// took a snapshot never observes a half-applied update.
#[derive(Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<RankingConfig>>>,
}

impl SharedConfig {
    pub fn new(config: RankingConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Take one consistent view. Call once per request and read fields from
    /// the returned snapshot, not from the handle.
    pub fn snapshot(&self) -> Arc<RankingConfig> {
        self.inner.read().clone()
    }

    pub fn replace(&self, config: RankingConfig) {
        *self.inner.write() = Arc::new(config);
    }

    /// Copy-modify-swap update; readers see either the old or new snapshot.
    pub fn update(&self, apply: impl FnOnce(&mut RankingConfig)) {
        let mut guard = self.inner.write();
        let mut next = (**guard).clone();
        apply(&mut next);
        *guard = Arc::new(next);
    }
}
