use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use time::{Date, OffsetDateTime};

use crate::ab::{assign_variant, Variant};
use crate::analytics;
use crate::article::{Article, ArticleStore};
use crate::config::{RankingConfig, SharedConfig};
use crate::error::RankError;
use crate::events::{ClickEvent, EventStore, SearchEvent};
use crate::index::{DocId, InvertedIndex};
use crate::ltr::{self, LtrModel, TrainingPair};
use crate::rank::{self, Candidate, Features, RankedArticle};
use crate::scorer;

/// Result ids to keep on a search event; impressions beyond this are not
/// used as training negatives.
const LOGGED_RESULT_IDS: usize = 20;

#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub category: Option<&'a str>,
    pub session_id: Option<&'a str>,
    /// 0-indexed page into the (re-)ranked results.
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub article: Article,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub variant: Variant,
    /// Matches found before the page window was sliced out.
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
}

/// Outcome of a training request. `NoTrainingData` and empty joins surface
/// here as an unsuccessful outcome rather than an error.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub success: bool,
    pub message: String,
}

/// Ties the pipeline together: builds the index over the article store,
/// routes each query through A/B assignment to plain TF-IDF or the
/// re-ranking path, records events, and orchestrates LTR training.
pub struct SearchEngine {
    index: InvertedIndex,
    article_ids: HashMap<DocId, String>,
    articles: Arc<dyn ArticleStore>,
    config: SharedConfig,
    model: LtrModel,
    events: Arc<dyn EventStore>,
}

impl SearchEngine {
    /// Build the engine and its index from the article store. Indexing is
    /// single-writer; construct the engine before serving traffic.
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        config: SharedConfig,
        model: LtrModel,
        events: Arc<dyn EventStore>,
    ) -> Self {
        let mut index = InvertedIndex::new();
        let mut article_ids = HashMap::new();
        for (doc_id, article) in articles.all().into_iter().enumerate() {
            let doc_id = doc_id as DocId;
            let text = format!("{} {}", article.headline, article.short_description);
            index.add_document(doc_id, &text);
            article_ids.insert(doc_id, article.id);
        }
        tracing::info!(docs = index.document_count(), "search index built");
        Self {
            index,
            article_ids,
            articles,
            config,
            model,
            events,
        }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn events(&self) -> &dyn EventStore {
        self.events.as_ref()
    }

    pub fn document_count(&self) -> u32 {
        self.index.document_count()
    }

    /// AB-routed search. The variant is pinned by the session key; the
    /// search event is recorded before returning (logging problems must not
    /// break search, so unknown ids are skipped, not errors).
    pub fn search(&self, request: &SearchRequest<'_>) -> SearchOutcome {
        let started = Instant::now();
        let config = self.config.snapshot();
        let variant = assign_variant(request.session_id, config.b_traffic_fraction);
        let page_size = request.page_size.max(1);

        let (total_hits, hits) = if variant.uses_reranking() {
            self.search_reranked(request, &config, page_size)
        } else {
            self.search_plain(request, page_size)
        };

        self.events.record_search(SearchEvent {
            session_id: request.session_id.map(str::to_string),
            query: request.query.to_string(),
            category_filter: request.category.map(str::to_string),
            result_ids: hits
                .iter()
                .take(LOGGED_RESULT_IDS)
                .map(|h| h.article.id.clone())
                .collect(),
            result_count: hits.len(),
            response_time_ms: started.elapsed().as_millis() as u64,
            variant,
            timestamp: OffsetDateTime::now_utc(),
        });

        SearchOutcome {
            variant,
            total_hits,
            hits,
        }
    }

    /// Variant A: raw TF-IDF ordering, paged directly. All matches are
    /// scored so `total_hits` counts the full match set, the same meaning
    /// the field has on the re-ranked path. A page past the end is empty,
    /// not an error.
    fn search_plain(
        &self,
        request: &SearchRequest<'_>,
        page_size: usize,
    ) -> (usize, Vec<SearchHit>) {
        let scored = scorer::search(
            &self.index,
            request.query,
            self.index.document_count() as usize,
        );
        let total = scored.len();
        let hits = scored
            .into_iter()
            .skip(request.page.saturating_mul(page_size))
            .take(page_size)
            .filter_map(|(doc_id, score)| {
                self.article(doc_id).map(|article| SearchHit {
                    article,
                    score: f64::from(score),
                })
            })
            .collect();
        (total, hits)
    }

    /// Variant B: retrieve a pool larger than the page, re-rank it with the
    /// weighted sum (or the LTR model when enabled), then slice the page.
    fn search_reranked(
        &self,
        request: &SearchRequest<'_>,
        config: &RankingConfig,
        page_size: usize,
    ) -> (usize, Vec<SearchHit>) {
        let pool = scorer::search(&self.index, request.query, config.rerank_pool_size.max(1));
        let mut candidates: Vec<Candidate> = pool
            .into_iter()
            .filter_map(|(doc_id, score)| {
                self.article(doc_id).map(|article| Candidate {
                    article,
                    base_score: score,
                })
            })
            .collect();

        // Category acts as a retrieval filter here, mirroring the upstream
        // backend; re-ranking still applies the boost for callers that pass
        // unfiltered candidate pools.
        if let Some(filter) = request.category.filter(|f| !f.is_empty()) {
            candidates.retain(|c| {
                c.article
                    .category
                    .as_deref()
                    .is_some_and(|category| category.eq_ignore_ascii_case(filter))
            });
        }

        let today = OffsetDateTime::now_utc().date();
        let ranked = if config.ltr_enabled {
            self.rank_with_model(candidates, request.category, today, config)
        } else {
            rank::re_rank(candidates, request.category, today, config)
        };

        let total = ranked.len();
        let start = request.page.saturating_mul(page_size);
        let hits = ranked
            .into_iter()
            .skip(start)
            .take(page_size)
            .map(|r| SearchHit {
                article: r.article,
                score: r.final_score,
            })
            .collect();
        (total, hits)
    }

    /// LTR path: score each candidate with the model's click probability.
    /// A shape error cannot unwind ranking; it falls back to the weighted
    /// sum for that candidate.
    fn rank_with_model(
        &self,
        candidates: Vec<Candidate>,
        category_filter: Option<&str>,
        today: Date,
        config: &RankingConfig,
    ) -> Vec<RankedArticle> {
        let features = rank::extract_pool_features(&candidates, category_filter, today, config);
        let mut ranked: Vec<RankedArticle> = candidates
            .into_iter()
            .zip(features)
            .map(|(candidate, features)| {
                let final_score = match self.model.predict(&features.as_array()) {
                    Ok(probability) => probability,
                    Err(err) => {
                        tracing::warn!(error = %err, "LTR predict failed, using weighted score");
                        rank::weighted_score(&features, config)
                    }
                };
                RankedArticle {
                    article: candidate.article,
                    features,
                    final_score,
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(Ordering::Equal)
        });
        ranked
    }

    /// Record a click: bump the article's click count in the store and
    /// append a click event. Failures are logged, never propagated.
    pub fn record_click(
        &self,
        session_id: Option<&str>,
        query: &str,
        article_id: &str,
        position: Option<u32>,
        variant: Variant,
        time_to_click_ms: Option<u64>,
    ) {
        if !self.articles.increment_clicks(article_id) {
            tracing::warn!(article_id, "click recorded for unknown article");
        }
        self.events.record_click(ClickEvent {
            session_id: session_id.map(str::to_string),
            query: query.to_string(),
            article_id: article_id.to_string(),
            position,
            variant,
            time_to_click_ms,
            timestamp: OffsetDateTime::now_utc(),
        });
    }

    /// Train the LTR model from the event log: label shown results by
    /// whether they were clicked for the same query, extract features,
    /// balance classes, run gradient descent.
    ///
    /// The base retrieval score is not stored on events, so the relevance
    /// feature uses a fixed 0.5 placeholder; popularity is normalized
    /// against the global max click count.
    pub fn train_model(&self, epochs: usize) -> TrainingOutcome {
        let views = analytics::training_views(self.events.as_ref());
        if views.is_empty() {
            return TrainingOutcome {
                success: false,
                message: "no training data: record some searches and clicks first".into(),
            };
        }

        let config = self.config.snapshot();
        let today = OffsetDateTime::now_utc().date();
        let max_clicks = self
            .articles
            .all()
            .iter()
            .map(|a| a.click_count)
            .max()
            .unwrap_or(0);

        let mut pairs = Vec::with_capacity(views.len());
        for view in views {
            let Some(article) = self.articles.find(&view.article_id) else {
                continue;
            };
            let features = Features {
                relevance: 0.5,
                popularity: rank::popularity_score(article.click_count, max_clicks),
                freshness: rank::freshness_score(
                    article.publish_date,
                    today,
                    config.freshness_decay_days,
                ),
                // The filter used at search time is not stored on events.
                category_boost: 1.0,
            };
            pairs.push(TrainingPair {
                features: features.as_array().to_vec(),
                label: view.label,
            });
        }

        if pairs.is_empty() {
            return TrainingOutcome {
                success: false,
                message: "could not build training pairs: no event article ids match the store"
                    .into(),
            };
        }

        let raw_count = pairs.len();
        let balanced = ltr::balance_examples(&pairs);
        match self.model.train(&balanced, epochs) {
            Ok(report) => TrainingOutcome {
                success: true,
                message: format!(
                    "trained on {} examples ({} after balancing), avg loss {:.4}{}",
                    raw_count,
                    report.examples,
                    report.avg_loss,
                    if report.persisted {
                        ""
                    } else {
                        "; weights are live but were not persisted"
                    }
                ),
            },
            Err(err) => TrainingOutcome {
                success: false,
                message: err.to_string(),
            },
        }
    }

    pub fn model_weights(&self) -> (Vec<f64>, f64) {
        self.model.weights()
    }

    /// Passthrough to the model; the boolean reports persistence success.
    pub fn set_model_weights(&self, weights: Vec<f64>, bias: f64) -> Result<bool, RankError> {
        self.model.set_weights(weights, bias)
    }

    fn article(&self, doc_id: DocId) -> Option<Article> {
        self.article_ids
            .get(&doc_id)
            .and_then(|id| self.articles.find(id))
    }
}
