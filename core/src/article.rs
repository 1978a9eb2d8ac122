use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::Date;

/// Snapshot of a news article as stored by the document collaborator.
/// Field names match the news JSONL dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Dataset lines may omit the id; loaders assign one before indexing.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub category: Option<String>,
    pub headline: String,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub short_description: String,
    #[serde(default, rename = "date")]
    pub publish_date: Option<Date>,
    #[serde(default)]
    pub click_count: u64,
}

/// Document store boundary. The ranking core only reads article snapshots;
/// the one mutation it requests is a click-count increment.
pub trait ArticleStore: Send + Sync {
    fn find(&self, id: &str) -> Option<Article>;
    fn all(&self) -> Vec<Article>;
    /// Returns false when the id is unknown.
    fn increment_clicks(&self, id: &str) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct MemoryArticleStore {
    articles: RwLock<HashMap<String, Article>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_articles(articles: Vec<Article>) -> Self {
        let store = Self::new();
        for article in articles {
            store.insert(article);
        }
        store
    }

    pub fn insert(&self, article: Article) {
        self.articles.write().insert(article.id.clone(), article);
    }
}

impl ArticleStore for MemoryArticleStore {
    fn find(&self, id: &str) -> Option<Article> {
        self.articles.read().get(id).cloned()
    }

    fn all(&self) -> Vec<Article> {
        let mut all: Vec<Article> = self.articles.read().values().cloned().collect();
        // Deterministic ordering for index builds.
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    fn increment_clicks(&self, id: &str) -> bool {
        let mut articles = self.articles.write();
        match articles.get_mut(id) {
            Some(article) => {
                article.click_count += 1;
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.articles.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str) -> Article {
        Article {
            id: id.to_string(),
            category: Some("TECH".into()),
            headline: "headline".into(),
            authors: None,
            link: None,
            short_description: String::new(),
            publish_date: None,
            click_count: 0,
        }
    }

    #[test]
    fn increments_clicks_for_known_ids_only() {
        let store = MemoryArticleStore::from_articles(vec![article("a")]);
        assert!(store.increment_clicks("a"));
        assert!(!store.increment_clicks("missing"));
        assert_eq!(store.find("a").unwrap().click_count, 1);
    }

    #[test]
    fn parses_dataset_line() {
        let line = r#"{"id":"n1","category":"SPORTS","headline":"Big Game","authors":"A. Writer","link":"https://example.com/1","short_description":"A close match.","date":"2024-06-01"}"#;
        let article: Article = serde_json::from_str(line).unwrap();
        assert_eq!(article.id, "n1");
        assert_eq!(article.publish_date.unwrap().to_string(), "2024-06-01");
        assert_eq!(article.click_count, 0);
    }
}
