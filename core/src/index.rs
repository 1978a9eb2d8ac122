use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::tokenizer::tokenize;

pub type DocId = u32;

/// One term's occurrences in one document: 0-based token positions in token
/// order. Built in a single pass when the document is indexed and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub positions: Vec<u32>,
}

impl Posting {
    /// Term frequency within the document.
    pub fn term_frequency(&self) -> usize {
        self.positions.len()
    }
}

/// Append-only positional inverted index. Built once per corpus load by a
/// single writer, then read-only; concurrent lookups need no locking.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<Posting>>,
    doc_lengths: HashMap<DocId, u32>,
    num_docs: u32,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenize `text` and merge one posting per distinct term into the
    /// index. Posting lists stay in document insertion order.
    ///
    /// Callers must not add the same id twice: re-adding is not deduplicated
    /// and would skew document-frequency and length statistics.
    pub fn add_document(&mut self, id: DocId, text: &str) {
        let tokens = tokenize(text);
        let mut positions_by_term: HashMap<&str, Vec<u32>> = HashMap::new();
        for (pos, term) in tokens.iter().enumerate() {
            positions_by_term
                .entry(term.as_str())
                .or_default()
                .push(pos as u32);
        }
        for (term, positions) in positions_by_term {
            self.postings
                .entry(term.to_string())
                .or_default()
                .push(Posting { doc_id: id, positions });
        }
        self.doc_lengths.insert(id, tokens.len() as u32);
        self.num_docs += 1;
    }

    /// Posting list for a term, empty if the term was never seen.
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of documents containing the term.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    /// Token count of a document, 0 if the id is unknown.
    pub fn document_length(&self, id: DocId) -> u32 {
        self.doc_lengths.get(&id).copied().unwrap_or(0)
    }

    pub fn document_count(&self) -> u32 {
        self.num_docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_positions_in_token_order() {
        let mut index = InvertedIndex::new();
        index.add_document(0, "to be or not to be");
        let postings = index.postings("to");
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].positions, vec![0, 4]);
        assert_eq!(index.postings("be")[0].positions, vec![1, 5]);
    }

    #[test]
    fn one_posting_per_term_and_document() {
        let mut index = InvertedIndex::new();
        index.add_document(0, "rust rust rust");
        index.add_document(1, "rust lang");
        assert_eq!(index.document_frequency("rust"), 2);
        assert_eq!(index.postings("rust")[0].term_frequency(), 3);
        assert_eq!(index.postings("rust")[1].doc_id, 1);
    }

    #[test]
    fn position_counts_sum_to_doc_length() {
        let mut index = InvertedIndex::new();
        index.add_document(7, "cats are great pets, great cats!");
        let total: usize = ["cats", "are", "great", "pets"]
            .iter()
            .flat_map(|t| index.postings(t))
            .filter(|p| p.doc_id == 7)
            .map(Posting::term_frequency)
            .sum();
        assert_eq!(total as u32, index.document_length(7));
        assert_eq!(index.document_length(7), 6);
    }

    #[test]
    fn unknown_lookups_are_empty() {
        let index = InvertedIndex::new();
        assert!(index.postings("ghost").is_empty());
        assert_eq!(index.document_frequency("ghost"), 0);
        assert_eq!(index.document_length(99), 0);
        assert_eq!(index.document_count(), 0);
    }
}
