use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;

use crate::ab::Variant;
use crate::events::{ClickEvent, EventStore, SearchEvent};

/// Search-quality metrics for one A/B variant over a time window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VariantMetrics {
    pub total_searches: usize,
    pub total_clicks: usize,
    /// Clicks per search.
    pub ctr: f64,
    /// Share of sessions that searched but never clicked.
    pub no_click_rate: f64,
    pub avg_time_to_click_ms: f64,
    /// Click counts keyed by 1-indexed result position.
    pub clicks_by_position: HashMap<u32, u64>,
}

/// Per-query search/click counts, for spotting relevance problems.
#[derive(Debug, Clone, Serialize)]
pub struct QueryStats {
    pub query: String,
    pub search_count: u64,
    pub click_count: u64,
    pub ctr: f64,
}

/// A (query, shown document) pair labeled by whether a click followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledView {
    pub query: String,
    pub article_id: String,
    /// 1 = clicked for this query, 0 = shown but not clicked.
    pub label: u8,
}

/// Compute metrics per variant over `[since, until]`.
pub fn variant_metrics(
    store: &dyn EventStore,
    since: OffsetDateTime,
    until: OffsetDateTime,
) -> HashMap<Variant, VariantMetrics> {
    let searches = store.searches_between(since, until);
    let clicks = store.clicks_between(since, until);

    let mut results = HashMap::new();
    for variant in [Variant::A, Variant::B] {
        let variant_searches: Vec<&SearchEvent> =
            searches.iter().filter(|s| s.variant == variant).collect();
        let variant_clicks: Vec<&ClickEvent> =
            clicks.iter().filter(|c| c.variant == variant).collect();
        results.insert(variant, compute_metrics(&variant_searches, &variant_clicks));
    }
    results
}

fn compute_metrics(searches: &[&SearchEvent], clicks: &[&ClickEvent]) -> VariantMetrics {
    if searches.is_empty() {
        return VariantMetrics::default();
    }

    let total_searches = searches.len();
    let total_clicks = clicks.len();
    let ctr = total_clicks as f64 / total_searches as f64;

    let searched_sessions: HashSet<&str> = searches
        .iter()
        .filter_map(|s| s.session_id.as_deref())
        .collect();
    let clicked_sessions: HashSet<&str> = clicks
        .iter()
        .filter_map(|c| c.session_id.as_deref())
        .collect();
    let no_click_sessions = searched_sessions
        .iter()
        .filter(|s| !clicked_sessions.contains(*s))
        .count();
    let no_click_rate = if searched_sessions.is_empty() {
        0.0
    } else {
        no_click_sessions as f64 / searched_sessions.len() as f64
    };

    let times: Vec<u64> = clicks.iter().filter_map(|c| c.time_to_click_ms).collect();
    let avg_time_to_click_ms = if times.is_empty() {
        0.0
    } else {
        times.iter().sum::<u64>() as f64 / times.len() as f64
    };

    let mut clicks_by_position: HashMap<u32, u64> = HashMap::new();
    for click in clicks {
        if let Some(position) = click.position {
            *clicks_by_position.entry(position).or_insert(0) += 1;
        }
    }

    VariantMetrics {
        total_searches,
        total_clicks,
        ctr,
        no_click_rate,
        avg_time_to_click_ms,
        clicks_by_position,
    }
}

/// Queries with enough traffic and the lowest CTR, ascending.
pub fn low_ctr_queries(
    store: &dyn EventStore,
    since: OffsetDateTime,
    until: OffsetDateTime,
    min_searches: u64,
    limit: usize,
) -> Vec<QueryStats> {
    let searches = store.searches_between(since, until);
    let clicks = store.clicks_between(since, until);

    let mut search_counts: HashMap<&str, u64> = HashMap::new();
    for search in &searches {
        *search_counts.entry(search.query.as_str()).or_insert(0) += 1;
    }
    let mut click_counts: HashMap<&str, u64> = HashMap::new();
    for click in &clicks {
        *click_counts.entry(click.query.as_str()).or_insert(0) += 1;
    }

    let mut stats: Vec<QueryStats> = search_counts
        .into_iter()
        .filter(|(_, count)| *count >= min_searches)
        .map(|(query, search_count)| {
            let click_count = click_counts.get(query).copied().unwrap_or(0);
            QueryStats {
                query: query.to_string(),
                search_count,
                click_count,
                ctr: click_count as f64 / search_count as f64,
            }
        })
        .collect();
    stats.sort_by(|a, b| {
        a.ctr
            .partial_cmp(&b.ctr)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.query.cmp(&b.query))
    });
    stats.truncate(limit);
    stats
}

/// Join the full click log against the search log by query: every shown
/// result id becomes a labeled view, positive iff any click for the same
/// query landed on that article.
pub fn training_views(store: &dyn EventStore) -> Vec<LabeledView> {
    let clicks = store.all_clicks();
    let mut clicked_by_query: HashMap<&str, HashSet<&str>> = HashMap::new();
    for click in &clicks {
        clicked_by_query
            .entry(click.query.as_str())
            .or_default()
            .insert(click.article_id.as_str());
    }

    let mut views = Vec::new();
    for search in &store.all_searches() {
        let clicked = clicked_by_query.get(search.query.as_str());
        for article_id in &search.result_ids {
            let label = u8::from(
                clicked.is_some_and(|set| set.contains(article_id.as_str())),
            );
            views.push(LabeledView {
                query: search.query.clone(),
                article_id: article_id.clone(),
                label,
            });
        }
    }
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventStore;
    use time::Duration;

    fn search(session: &str, query: &str, results: &[&str], variant: Variant) -> SearchEvent {
        SearchEvent {
            session_id: Some(session.to_string()),
            query: query.to_string(),
            category_filter: None,
            result_ids: results.iter().map(|r| r.to_string()).collect(),
            result_count: results.len(),
            response_time_ms: 5,
            variant,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    fn click(session: &str, query: &str, article: &str, variant: Variant) -> ClickEvent {
        ClickEvent {
            session_id: Some(session.to_string()),
            query: query.to_string(),
            article_id: article.to_string(),
            position: Some(1),
            variant,
            time_to_click_ms: Some(800),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn metrics_are_split_by_variant() {
        let store = MemoryEventStore::new();
        store.record_search(search("s1", "rust", &["a"], Variant::A));
        store.record_search(search("s2", "rust", &["a"], Variant::B));
        store.record_click(click("s2", "rust", "a", Variant::B));

        let now = OffsetDateTime::now_utc();
        let metrics = variant_metrics(&store, now - Duration::hours(1), now);
        let a = &metrics[&Variant::A];
        let b = &metrics[&Variant::B];
        assert_eq!(a.total_searches, 1);
        assert_eq!(a.total_clicks, 0);
        assert_eq!(a.no_click_rate, 1.0);
        assert_eq!(b.total_searches, 1);
        assert_eq!(b.total_clicks, 1);
        assert_eq!(b.ctr, 1.0);
        assert_eq!(b.no_click_rate, 0.0);
        assert_eq!(b.avg_time_to_click_ms, 800.0);
        assert_eq!(b.clicks_by_position[&1], 1);
    }

    #[test]
    fn low_ctr_queries_sorted_ascending() {
        let store = MemoryEventStore::new();
        for _ in 0..3 {
            store.record_search(search("s1", "good", &["a"], Variant::A));
            store.record_search(search("s1", "bad", &["b"], Variant::A));
        }
        store.record_click(click("s1", "good", "a", Variant::A));

        let now = OffsetDateTime::now_utc();
        let stats = low_ctr_queries(&store, now - Duration::hours(1), now, 3, 10);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].query, "bad");
        assert_eq!(stats[0].ctr, 0.0);
        assert_eq!(stats[1].query, "good");
    }

    #[test]
    fn low_traffic_queries_are_dropped() {
        let store = MemoryEventStore::new();
        store.record_search(search("s1", "rare", &["a"], Variant::A));
        let now = OffsetDateTime::now_utc();
        assert!(low_ctr_queries(&store, now - Duration::hours(1), now, 3, 10).is_empty());
    }

    #[test]
    fn training_views_label_clicked_results() {
        let store = MemoryEventStore::new();
        store.record_search(search("s1", "rust", &["a", "b", "c"], Variant::B));
        store.record_click(click("s1", "rust", "b", Variant::B));

        let views = training_views(&store);
        assert_eq!(views.len(), 3);
        let label_of = |id: &str| views.iter().find(|v| v.article_id == id).unwrap().label;
        assert_eq!(label_of("a"), 0);
        assert_eq!(label_of("b"), 1);
        assert_eq!(label_of("c"), 0);
    }

    #[test]
    fn clicks_join_on_query_not_session() {
        let store = MemoryEventStore::new();
        store.record_search(search("s1", "rust", &["a"], Variant::B));
        store.record_click(click("s2", "rust", "a", Variant::B));
        let views = training_views(&store);
        assert_eq!(views[0].label, 1);
    }
}
