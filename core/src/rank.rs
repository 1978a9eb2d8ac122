use std::cmp::Ordering;
use time::Date;

use crate::article::Article;
use crate::config::RankingConfig;

/// Number of features the pipeline produces and the LTR model consumes.
pub const FEATURE_COUNT: usize = 4;

/// Freshness assigned to articles with no publish date.
const MISSING_DATE_FRESHNESS: f64 = 0.1;

/// Fixed-order feature vector. The order must match the order the LTR
/// model's weights were trained with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    pub relevance: f64,
    pub popularity: f64,
    pub freshness: f64,
    pub category_boost: f64,
}

impl Features {
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.relevance,
            self.popularity,
            self.freshness,
            self.category_boost,
        ]
    }
}

/// A retrieval result awaiting re-ranking: article snapshot plus the base
/// relevance score from the upstream retriever (built-in TF-IDF or an
/// external backend).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub article: Article,
    pub base_score: f32,
}

/// Re-ranked candidate with its computed features and final score.
#[derive(Debug, Clone)]
pub struct RankedArticle {
    pub article: Article,
    pub features: Features,
    pub final_score: f64,
}

/// Log-scaled click popularity in [0, 1]: `ln(1+clicks) / ln(1+max_clicks)`.
/// The log keeps viral articles from dominating; `max_clicks` is floored at
/// 1 to avoid dividing by zero.
pub fn popularity_score(clicks: u64, max_clicks: u64) -> f64 {
    let max_clicks = max_clicks.max(1);
    (1.0 + clicks as f64).ln() / (1.0 + max_clicks as f64).ln()
}

/// Freshness in (0, 1]: `1 / (1 + age_days / decay_days)`. Future dates are
/// treated as today; a missing date yields a fixed low default.
pub fn freshness_score(publish_date: Option<Date>, today: Date, decay_days: f64) -> f64 {
    let Some(date) = publish_date else {
        return MISSING_DATE_FRESHNESS;
    };
    let age_days = (today - date).whole_days().max(0) as f64;
    1.0 / (1.0 + age_days / decay_days)
}

/// Boost multiplier when the article's category matches the filter
/// (case-insensitive), else 1.0. No filter means no boost.
pub fn category_boost(category: Option<&str>, filter: Option<&str>, boost: f64) -> f64 {
    match (category, filter) {
        (Some(category), Some(filter))
            if !filter.is_empty() && category.eq_ignore_ascii_case(filter) =>
        {
            boost
        }
        _ => 1.0,
    }
}

/// Pure weighted-sum score:
/// `(w_r*relevance + w_p*popularity + w_f*freshness) * category_boost`.
pub fn weighted_score(features: &Features, config: &RankingConfig) -> f64 {
    (config.relevance_weight * features.relevance
        + config.popularity_weight * features.popularity
        + config.freshness_weight * features.freshness)
        * features.category_boost
}

/// Compute one feature vector per candidate, normalizing against the pool.
///
/// Popularity is normalized against the max click count of this candidate
/// pool, so the same article can score differently in pools of different
/// sizes; base scores are min-max normalized against the pool (a pool of
/// equal scores degenerates to relevance 0 for every candidate, the
/// denominator defaulting to 1).
pub fn extract_pool_features(
    candidates: &[Candidate],
    category_filter: Option<&str>,
    today: Date,
    config: &RankingConfig,
) -> Vec<Features> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut min_base = f32::INFINITY;
    let mut max_base = f32::NEG_INFINITY;
    for candidate in candidates {
        min_base = min_base.min(candidate.base_score);
        max_base = max_base.max(candidate.base_score);
    }
    let mut base_range = (max_base - min_base) as f64;
    if base_range == 0.0 {
        base_range = 1.0;
    }

    let max_clicks = candidates
        .iter()
        .map(|c| c.article.click_count)
        .max()
        .unwrap_or(0);

    candidates
        .iter()
        .map(|candidate| Features {
            relevance: (candidate.base_score - min_base) as f64 / base_range,
            popularity: popularity_score(candidate.article.click_count, max_clicks),
            freshness: freshness_score(
                candidate.article.publish_date,
                today,
                config.freshness_decay_days,
            ),
            category_boost: category_boost(
                candidate.article.category.as_deref(),
                category_filter,
                config.category_match_boost,
            ),
        })
        .collect()
}

/// Weighted re-rank of a candidate pool: extract features, score each
/// candidate with the weighted sum, stable-sort descending. Ties keep their
/// prior relative order. Callers slice the requested page out of the
/// returned pool.
pub fn re_rank(
    candidates: Vec<Candidate>,
    category_filter: Option<&str>,
    today: Date,
    config: &RankingConfig,
) -> Vec<RankedArticle> {
    let features = extract_pool_features(&candidates, category_filter, today, config);
    let mut ranked: Vec<RankedArticle> = candidates
        .into_iter()
        .zip(features)
        .map(|(candidate, features)| RankedArticle {
            final_score: weighted_score(&features, config),
            article: candidate.article,
            features,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn article(id: &str, category: Option<&str>, date: Option<Date>, clicks: u64) -> Article {
        Article {
            id: id.to_string(),
            category: category.map(str::to_string),
            headline: String::new(),
            authors: None,
            link: None,
            short_description: String::new(),
            publish_date: date,
            click_count: clicks,
        }
    }

    fn candidate(id: &str, base_score: f32, clicks: u64) -> Candidate {
        Candidate {
            article: article(id, None, Some(date!(2026 - 08 - 25)), clicks),
            base_score,
        }
    }

    #[test]
    fn popularity_endpoints() {
        // clicks=0 in a pool with max 10 -> ln(1)/ln(11) = 0
        assert_eq!(popularity_score(0, 10), 0.0);
        // clicks=10 with max 10 -> 1.0
        assert!((popularity_score(10, 10) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn popularity_survives_zero_max() {
        assert_eq!(popularity_score(0, 0), 0.0);
    }

    #[test]
    fn freshness_decays_with_age() {
        let today = date!(2026 - 08 - 25);
        let fresh = freshness_score(Some(today), today, 30.0);
        assert!((fresh - 1.0).abs() < 1e-12);
        let month_old = freshness_score(Some(date!(2026 - 07 - 26)), today, 30.0);
        assert!((month_old - 0.5).abs() < 1e-12);
        // Future dates are treated as today.
        let future = freshness_score(Some(date!(2026 - 09 - 25)), today, 30.0);
        assert!((future - 1.0).abs() < 1e-12);
        assert_eq!(freshness_score(None, today, 30.0), 0.1);
    }

    #[test]
    fn category_boost_is_case_insensitive() {
        assert_eq!(category_boost(Some("Tech"), Some("TECH"), 1.5), 1.5);
        assert_eq!(category_boost(Some("Tech"), Some("sports"), 1.5), 1.0);
        assert_eq!(category_boost(Some("Tech"), None, 1.5), 1.0);
        assert_eq!(category_boost(None, Some("TECH"), 1.5), 1.0);
        assert_eq!(category_boost(Some("Tech"), Some(""), 1.5), 1.0);
    }

    #[test]
    fn relevance_only_weights_sort_by_base_score() {
        let config = RankingConfig {
            relevance_weight: 1.0,
            popularity_weight: 0.0,
            freshness_weight: 0.0,
            category_match_boost: 1.0,
            ..RankingConfig::default()
        };
        let candidates = vec![
            candidate("low", 0.2, 500),
            candidate("high", 0.9, 0),
            candidate("mid", 0.5, 100),
        ];
        let ranked = re_rank(candidates, None, date!(2026 - 08 - 25), &config);
        let ids: Vec<&str> = ranked.iter().map(|r| r.article.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
    }

    #[test]
    fn rerank_order_is_input_order_independent() {
        let config = RankingConfig::default();
        let today = date!(2026 - 08 - 25);
        let mut candidates = vec![
            candidate("a", 0.1, 3),
            candidate("b", 0.8, 40),
            candidate("c", 0.5, 7),
            candidate("d", 0.3, 90),
        ];
        let forward = re_rank(candidates.clone(), None, today, &config);
        candidates.reverse();
        let reversed = re_rank(candidates, None, today, &config);
        let forward_ids: Vec<_> = forward.iter().map(|r| r.article.id.clone()).collect();
        let reversed_ids: Vec<_> = reversed.iter().map(|r| r.article.id.clone()).collect();
        assert_eq!(forward_ids, reversed_ids);
    }

    #[test]
    fn equal_base_scores_use_unit_denominator() {
        let config = RankingConfig::default();
        let candidates = vec![candidate("a", 0.7, 1), candidate("b", 0.7, 1)];
        let features =
            extract_pool_features(&candidates, None, date!(2026 - 08 - 25), &config);
        assert_eq!(features[0].relevance, 0.0);
        assert_eq!(features[1].relevance, 0.0);
    }

    #[test]
    fn matching_category_outranks_on_ties() {
        let config = RankingConfig::default();
        let today = date!(2026 - 08 - 25);
        let mut boosted = candidate("boosted", 0.5, 10);
        boosted.article.category = Some("TECH".into());
        let mut plain = candidate("plain", 0.5, 10);
        plain.article.category = Some("SPORTS".into());
        let ranked = re_rank(vec![plain, boosted], Some("tech"), today, &config);
        assert_eq!(ranked[0].article.id, "boosted");
        assert_eq!(ranked[0].features.category_boost, 1.5);
        assert_eq!(ranked[1].features.category_boost, 1.0);
    }

    #[test]
    fn empty_pool_reranks_to_empty() {
        let config = RankingConfig::default();
        assert!(re_rank(Vec::new(), None, date!(2026 - 08 - 25), &config).is_empty());
    }
}
