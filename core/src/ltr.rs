use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::RankError;
use crate::persist::{ModelState, ModelStore};
use crate::rank::FEATURE_COUNT;

/// Hand-tuned fallback weights, in feature order
/// [relevance, popularity, freshness, category_boost].
pub const DEFAULT_WEIGHTS: [f64; FEATURE_COUNT] = [1.0, 0.3, 0.2, 0.5];

const LEARNING_RATE: f64 = 0.01;
const BALANCE_SEED: u64 = 42;
const LOSS_EPSILON: f64 = 1e-10;

/// One labeled example: feature vector plus click label (1 = clicked,
/// 0 = shown but not clicked).
#[derive(Debug, Clone)]
pub struct TrainingPair {
    pub features: Vec<f64>,
    pub label: u8,
}

/// Summary of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub examples: usize,
    pub epochs: usize,
    /// Average log loss over the final epoch.
    pub avg_loss: f64,
    pub weights: Vec<f64>,
    pub bias: f64,
    /// False when the new weights are live in memory but could not be
    /// persisted.
    pub persisted: bool,
}

/// Logistic-regression learning-to-rank model: a single linear classifier
/// with sigmoid output over the fixed 4-feature vector.
///
/// Concurrent `predict` calls share the weights read-only; `train` works on
/// a private copy and swaps the whole state in only after the full run
/// completes, so readers never observe a half-updated vector. A separate
/// mutex serializes training runs.
pub struct LtrModel {
    state: RwLock<ModelState>,
    train_lock: Mutex<()>,
    store: Box<dyn ModelStore>,
}

impl LtrModel {
    /// Load persisted weights from the store, falling back to the built-in
    /// defaults when nothing was persisted or the stored state is unusable.
    pub fn new(store: Box<dyn ModelStore>) -> Self {
        let state = match store.load() {
            Ok(Some(state)) if state.weights.len() == FEATURE_COUNT => {
                tracing::info!(bias = state.bias, "loaded persisted model weights");
                state
            }
            Ok(Some(state)) => {
                tracing::warn!(
                    arity = state.weights.len(),
                    "persisted model has wrong arity, using defaults"
                );
                Self::default_state()
            }
            Ok(None) => {
                tracing::info!("no persisted model found, using default weights");
                Self::default_state()
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load model, using default weights");
                Self::default_state()
            }
        };
        Self {
            state: RwLock::new(state),
            train_lock: Mutex::new(()),
            store,
        }
    }

    fn default_state() -> ModelState {
        ModelState {
            weights: DEFAULT_WEIGHTS.to_vec(),
            bias: 0.0,
        }
    }

    /// Predicted click probability `sigmoid(bias + w · features)`.
    /// Idempotent for a fixed weight vector.
    pub fn predict(&self, features: &[f64]) -> Result<f64, RankError> {
        predict_with(&self.state.read(), features)
    }

    /// Snapshot of the current weights and bias.
    pub fn weights(&self) -> (Vec<f64>, f64) {
        let state = self.state.read();
        (state.weights.clone(), state.bias)
    }

    /// Direct weight override for manual tuning. Arity-checked, applied
    /// in memory, then persisted; returns whether persistence succeeded.
    pub fn set_weights(&self, weights: Vec<f64>, bias: f64) -> Result<bool, RankError> {
        if weights.len() != FEATURE_COUNT {
            return Err(RankError::ShapeMismatch {
                expected: FEATURE_COUNT,
                got: weights.len(),
            });
        }
        let next = ModelState { weights, bias };
        *self.state.write() = next.clone();
        Ok(self.persist(&next))
    }

    /// Per-example gradient descent on log loss for `epochs` passes.
    ///
    /// Trains on a private copy of the weights; the shared state is replaced
    /// atomically after the run, then persisted. A failed persist is
    /// reported through the report, not as an error, since the in-memory
    /// update already took effect.
    pub fn train(
        &self,
        examples: &[TrainingPair],
        epochs: usize,
    ) -> Result<TrainingReport, RankError> {
        if examples.is_empty() {
            return Err(RankError::NoTrainingData);
        }

        let _training = self.train_lock.lock();
        let mut state = self.state.read().clone();
        tracing::info!(examples = examples.len(), epochs, "training LTR model");

        let mut epoch_loss = 0.0;
        for epoch in 0..epochs {
            epoch_loss = 0.0;
            for example in examples {
                let prediction = predict_with(&state, &example.features)?;
                let label = f64::from(example.label);

                epoch_loss += -label * (prediction + LOSS_EPSILON).ln()
                    - (1.0 - label) * (1.0 - prediction + LOSS_EPSILON).ln();

                let error = prediction - label;
                for (weight, feature) in state.weights.iter_mut().zip(&example.features) {
                    *weight -= LEARNING_RATE * error * feature;
                }
                state.bias -= LEARNING_RATE * error;
            }
            if epoch % 10 == 0 {
                tracing::debug!(
                    epoch,
                    avg_loss = epoch_loss / examples.len() as f64,
                    "training progress"
                );
            }
        }
        let avg_loss = epoch_loss / examples.len() as f64;

        *self.state.write() = state.clone();
        let persisted = self.persist(&state);
        tracing::info!(avg_loss, persisted, "training complete");

        Ok(TrainingReport {
            examples: examples.len(),
            epochs,
            avg_loss,
            weights: state.weights,
            bias: state.bias,
            persisted,
        })
    }

    fn persist(&self, state: &ModelState) -> bool {
        match self.store.save(state) {
            Ok(()) => true,
            Err(err) => {
                let err = RankError::Persistence(err);
                tracing::warn!(error = %err, "keeping in-memory weights");
                false
            }
        }
    }
}

fn predict_with(state: &ModelState, features: &[f64]) -> Result<f64, RankError> {
    if features.len() != state.weights.len() {
        return Err(RankError::ShapeMismatch {
            expected: state.weights.len(),
            got: features.len(),
        });
    }
    let z = state.bias
        + state
            .weights
            .iter()
            .zip(features)
            .map(|(w, f)| w * f)
            .sum::<f64>();
    Ok(1.0 / (1.0 + (-z).exp()))
}

/// Upsample the minority class with replacement until both classes reach
/// the majority size, then shuffle. Seeded, so a training run over the same
/// input is reproducible. Single-class input is returned unchanged.
pub fn balance_examples(examples: &[TrainingPair]) -> Vec<TrainingPair> {
    let (positives, negatives): (Vec<TrainingPair>, Vec<TrainingPair>) =
        examples.iter().cloned().partition(|e| e.label == 1);
    if positives.is_empty() || negatives.is_empty() {
        return examples.to_vec();
    }

    let target = positives.len().max(negatives.len());
    let mut rng = StdRng::seed_from_u64(BALANCE_SEED);
    let mut balanced = Vec::with_capacity(target * 2);
    while balanced.len() < target {
        balanced.push(positives[rng.gen_range(0..positives.len())].clone());
    }
    while balanced.len() < target * 2 {
        balanced.push(negatives[rng.gen_range(0..negatives.len())].clone());
    }
    balanced.shuffle(&mut rng);
    balanced
}
