use search_core::tokenizer::tokenize;

#[test]
fn it_lowercases_and_splits() {
    let toks = tokenize("Cats are GREAT pets!");
    assert_eq!(toks, vec!["cats", "are", "great", "pets"]);
}

#[test]
fn it_keeps_digits_with_letters() {
    let toks = tokenize("Rust 1.80 beats v2");
    assert_eq!(toks, vec!["rust", "1", "80", "beats", "v2"]);
}

#[test]
fn it_matches_at_index_and_query_time() {
    // The same function serves both sides, so matching stays symmetric.
    let indexed = tokenize("Dogs: loyal companions?");
    let queried = tokenize("DOGS");
    assert!(indexed.contains(&queried[0]));
}
