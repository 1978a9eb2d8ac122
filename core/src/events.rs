use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ab::Variant;

/// One executed search: what was asked, what was shown, under which variant.
/// The result ids recorded here are the impressions that later become
/// negative training labels when no click follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEvent {
    pub session_id: Option<String>,
    pub query: String,
    pub category_filter: Option<String>,
    /// Top result ids shown to the user.
    pub result_ids: Vec<String>,
    pub result_count: usize,
    pub response_time_ms: u64,
    pub variant: Variant,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// One click on a search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub session_id: Option<String>,
    /// The query that led to this click.
    pub query: String,
    pub article_id: String,
    /// 1-indexed rank position in the result list.
    pub position: Option<u32>,
    pub variant: Variant,
    /// Time from search to click, an engagement signal.
    pub time_to_click_ms: Option<u64>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Event log boundary: append events, query them back by time range or in
/// full for training.
pub trait EventStore: Send + Sync {
    fn record_search(&self, event: SearchEvent);
    fn record_click(&self, event: ClickEvent);
    fn searches_between(&self, since: OffsetDateTime, until: OffsetDateTime) -> Vec<SearchEvent>;
    fn clicks_between(&self, since: OffsetDateTime, until: OffsetDateTime) -> Vec<ClickEvent>;
    fn all_searches(&self) -> Vec<SearchEvent>;
    fn all_clicks(&self) -> Vec<ClickEvent>;
}

#[derive(Default)]
pub struct MemoryEventStore {
    searches: RwLock<Vec<SearchEvent>>,
    clicks: RwLock<Vec<ClickEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn record_search(&self, event: SearchEvent) {
        self.searches.write().push(event);
    }

    fn record_click(&self, event: ClickEvent) {
        self.clicks.write().push(event);
    }

    fn searches_between(&self, since: OffsetDateTime, until: OffsetDateTime) -> Vec<SearchEvent> {
        self.searches
            .read()
            .iter()
            .filter(|e| e.timestamp >= since && e.timestamp <= until)
            .cloned()
            .collect()
    }

    fn clicks_between(&self, since: OffsetDateTime, until: OffsetDateTime) -> Vec<ClickEvent> {
        self.clicks
            .read()
            .iter()
            .filter(|e| e.timestamp >= since && e.timestamp <= until)
            .cloned()
            .collect()
    }

    fn all_searches(&self) -> Vec<SearchEvent> {
        self.searches.read().clone()
    }

    fn all_clicks(&self) -> Vec<ClickEvent> {
        self.clicks.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn search_at(ts: OffsetDateTime) -> SearchEvent {
        SearchEvent {
            session_id: Some("s1".into()),
            query: "rust".into(),
            category_filter: None,
            result_ids: vec!["a".into()],
            result_count: 1,
            response_time_ms: 3,
            variant: Variant::A,
            timestamp: ts,
        }
    }

    #[test]
    fn time_range_query_is_inclusive() {
        let store = MemoryEventStore::new();
        let now = OffsetDateTime::now_utc();
        store.record_search(search_at(now - Duration::hours(2)));
        store.record_search(search_at(now - Duration::minutes(10)));
        store.record_search(search_at(now));

        let recent = store.searches_between(now - Duration::hours(1), now);
        assert_eq!(recent.len(), 2);
        assert_eq!(store.all_searches().len(), 3);
    }

    #[test]
    fn clicks_are_recorded_independently() {
        let store = MemoryEventStore::new();
        let now = OffsetDateTime::now_utc();
        store.record_click(ClickEvent {
            session_id: None,
            query: "rust".into(),
            article_id: "a".into(),
            position: Some(1),
            variant: Variant::B,
            time_to_click_ms: Some(1200),
            timestamp: now,
        });
        assert_eq!(store.all_clicks().len(), 1);
        assert!(store.all_searches().is_empty());
    }
}
