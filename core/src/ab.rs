use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A/B ranking variant. A = raw retrieval ordering, B = custom re-ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub fn uses_reranking(self) -> bool {
        matches!(self, Variant::B)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::A => write!(f, "A"),
            Variant::B => write!(f, "B"),
        }
    }
}

/// Assign a request to a ranking variant.
///
/// With a session key the assignment is deterministic: the key hashes to a
/// stable bucket in [0, 100) and the request goes to B iff
/// `bucket / 100 < b_fraction`, so a session sticks to its variant for a
/// fixed traffic split. Anonymous requests draw uniformly at random.
pub fn assign_variant(session_key: Option<&str>, b_fraction: f64) -> Variant {
    match session_key {
        Some(key) if !key.is_empty() => {
            if (session_bucket(key) as f64) / 100.0 < b_fraction {
                Variant::B
            } else {
                Variant::A
            }
        }
        _ => {
            if rand::thread_rng().gen::<f64>() < b_fraction {
                Variant::B
            } else {
                Variant::A
            }
        }
    }
}

/// Stable bucket in [0, 100) for a session key. `DefaultHasher::new()` is
/// SipHash with fixed keys, so buckets survive process restarts.
pub fn session_bucket(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() % 100
}
