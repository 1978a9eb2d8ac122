//! Ranking core for the news search engine: an in-memory positional inverted
//! index with TF-IDF retrieval, a feature-based weighted re-ranker, an
//! online-trained logistic-regression LTR model, and deterministic A/B
//! variant assignment.

pub mod ab;
pub mod analytics;
pub mod article;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod index;
pub mod ltr;
pub mod persist;
pub mod rank;
pub mod scorer;
pub mod tokenizer;

pub use ab::{assign_variant, Variant};
pub use article::{Article, ArticleStore, MemoryArticleStore};
pub use config::{RankingConfig, SharedConfig};
pub use engine::{SearchEngine, SearchHit, SearchOutcome, SearchRequest, TrainingOutcome};
pub use error::RankError;
pub use events::{ClickEvent, EventStore, MemoryEventStore, SearchEvent};
pub use index::{DocId, InvertedIndex, Posting};
pub use ltr::{LtrModel, TrainingPair, TrainingReport};
pub use persist::{FileModelStore, MemoryModelStore, ModelState, ModelStore};
pub use rank::{Candidate, Features, RankedArticle};
