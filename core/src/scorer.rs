use std::cmp::Ordering;
use std::collections::HashMap;

use crate::index::{DocId, InvertedIndex};
use crate::tokenizer::tokenize;

/// TF-IDF search over a built index: returns the top-k `(doc, score)` pairs
/// in descending score order, ties broken by ascending doc id.
///
/// Per query token (duplicates kept) with non-zero document frequency:
/// `idf = ln((N + 1) / (df + 1))`, and each posting contributes
/// `(1 + ln(tf)) * idf` to its document's running score. Documents matching
/// no query term are excluded, so an empty index or query returns nothing.
pub fn search(index: &InvertedIndex, query: &str, k: usize) -> Vec<(DocId, f32)> {
    let n = index.document_count() as f32;
    let mut scores: HashMap<DocId, f32> = HashMap::new();

    for term in tokenize(query) {
        let df = index.document_frequency(&term);
        if df == 0 {
            continue;
        }
        let idf = ((n + 1.0) / (df as f32 + 1.0)).ln();
        for posting in index.postings(&term) {
            // tf >= 1 whenever a posting exists, so ln(tf) is defined.
            let tf = posting.term_frequency() as f32;
            let weight = (1.0 + tf.ln()) * idf;
            *scores.entry(posting.doc_id).or_insert(0.0) += weight;
        }
    }

    let mut scored: Vec<(DocId, f32)> = scores.into_iter().collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_doc_index() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        index.add_document(0, "cats are great pets");
        index.add_document(1, "dogs are loyal companions");
        index
    }

    #[test]
    fn unique_term_returns_only_its_document() {
        let index = two_doc_index();
        let hits = search(&index, "cats", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 0);
        // (1 + ln(1)) * ln((2 + 1) / (1 + 1)) = ln(1.5)
        assert!((hits[0].1 - 1.5f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn shared_term_matches_both_documents() {
        let index = two_doc_index();
        let hits = search(&index, "are", 10);
        assert_eq!(hits.len(), 2);
        // Equal scores, tie broken by doc id.
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 1);
        assert!((hits[0].1 - hits[1].1).abs() < 1e-9);
    }

    #[test]
    fn repeated_query_terms_accumulate() {
        let index = two_doc_index();
        let once = search(&index, "cats", 10)[0].1;
        let twice = search(&index, "cats cats", 10)[0].1;
        assert!((twice - 2.0 * once).abs() < 1e-6);
    }

    #[test]
    fn truncates_to_k() {
        let index = two_doc_index();
        let hits = search(&index, "are", 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn unmatched_query_and_empty_index_return_empty() {
        let index = two_doc_index();
        assert!(search(&index, "ferrets", 10).is_empty());
        assert!(search(&index, "", 10).is_empty());
        let empty = InvertedIndex::new();
        assert!(search(&empty, "cats", 10).is_empty());
    }

    #[test]
    fn higher_tf_scores_higher() {
        let mut index = InvertedIndex::new();
        index.add_document(0, "rust rust rust systems");
        index.add_document(1, "rust systems");
        let hits = search(&index, "rust", 10);
        assert_eq!(hits[0].0, 0);
        assert!(hits[0].1 > hits[1].1);
    }
}
