/// Neural transition predictor — a small feed-forward classifier mapping
/// (previous element, previous context, previous duration) to a
/// distribution over the next base element.
///
/// Architecture: element embedding ‖ one-hot context ‖ duration →
/// dense ReLU hidden layer → dense output → softmax. Trained with
/// categorical cross-entropy and Adam for a fixed number of epochs.

use ndarray::{s, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::PredictorConfig;
use crate::core::transitions::Categorical;
use crate::core::vocabulary::Vocabulary;
use crate::schema::scene::{Context, Corpus};

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("element '{0}' is not in the trained vocabulary")]
    UnknownElement(String),
    #[error("element '{0}' has no recorded transitions")]
    NoTransitions(String),
    #[error("predictor produced no usable probability mass")]
    DegenerateOutput,
}

/// Number of non-embedding input features: one-hot context plus duration.
const EXTRA_FEATURES: usize = 4;

/// One (previous scene → next element) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub element: usize,
    pub context: Context,
    pub duration: f32,
    pub target: usize,
}

/// Build training examples from every adjacent scene pair of every trailer.
/// Pairs whose elements are missing from `vocab` are skipped.
pub fn training_examples(corpus: &Corpus, vocab: &Vocabulary) -> Vec<TrainingExample> {
    let mut examples = Vec::new();
    for trailer in &corpus.trailers {
        for pair in trailer.scenes.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let (Some(element), Some(target)) = (
                vocab.index_of(prev.base_element()),
                vocab.index_of(next.base_element()),
            ) else {
                continue;
            };
            examples.push(TrainingExample {
                element,
                context: prev.context,
                duration: prev.duration as f32,
                target,
            });
        }
    }
    examples
}

// ----------------------------------------
// Adam
// ----------------------------------------

#[derive(Debug, Clone)]
struct Adam {
    beta1: f32,
    beta2: f32,
    eps: f32,
    t: usize,
    m: Array2<f32>,
    v: Array2<f32>,
}

impl Adam {
    fn new(shape: (usize, usize)) -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-7,
            t: 0,
            m: Array2::zeros(shape),
            v: Array2::zeros(shape),
        }
    }

    fn step(&mut self, params: &mut Array2<f32>, grads: &Array2<f32>, lr: f32) {
        if params.raw_dim() != grads.raw_dim() {
            return;
        }
        self.t = self.t.saturating_add(1);

        self.m = &self.m * self.beta1 + grads * (1.0 - self.beta1);
        self.v = &self.v * self.beta2 + grads.mapv(|g| g * g) * (1.0 - self.beta2);

        let t = self.t as f32;
        let m_scale = 1.0 / (1.0 - self.beta1.powf(t)).max(1e-12);
        let v_scale = 1.0 / (1.0 - self.beta2.powf(t)).max(1e-12);

        let eps = self.eps;
        ndarray::Zip::from(params)
            .and(&self.m)
            .and(&self.v)
            .for_each(|p, &m, &v| {
                *p -= lr * (m * m_scale) / ((v * v_scale).sqrt() + eps);
            });
    }
}

// ----------------------------------------
// Predictor
// ----------------------------------------

/// Intermediate activations kept for the backward pass.
struct ForwardCache {
    input: Array2<f32>,
    hidden_pre: Array2<f32>,
    hidden: Array2<f32>,
    probs: Array2<f32>,
}

#[derive(Debug, Clone)]
pub struct TransitionPredictor {
    vocab: Vocabulary,
    embedding: Array2<f32>,
    w1: Array2<f32>,
    b1: Array2<f32>,
    w2: Array2<f32>,
    b2: Array2<f32>,
    last_loss: Option<f32>,
}

impl TransitionPredictor {
    /// Create an untrained predictor over `vocab` with randomly initialized
    /// weights drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(vocab: Vocabulary, config: &PredictorConfig, rng: &mut R) -> Self {
        let v = vocab.len();
        let e = config.embedding_dim;
        let h = config.hidden_dim;
        let input_dim = e + EXTRA_FEATURES;

        Self {
            vocab,
            embedding: Array2::from_shape_fn((v, e), |_| rng.gen_range(-0.05f32..0.05)),
            w1: he_normal((input_dim, h), rng),
            b1: Array2::zeros((1, h)),
            w2: he_normal((h, v), rng),
            b2: Array2::zeros((1, v)),
            last_loss: None,
        }
    }

    /// Build and train a predictor on every adjacent scene pair of `corpus`.
    pub fn train<R: Rng + ?Sized>(
        corpus: &Corpus,
        vocab: &Vocabulary,
        config: &PredictorConfig,
        rng: &mut R,
    ) -> TransitionPredictor {
        let mut predictor = Self::new(vocab.clone(), config, rng);
        let examples = training_examples(corpus, vocab);
        if examples.is_empty() {
            warn!("no adjacent scene pairs in corpus; predictor left untrained");
            return predictor;
        }
        predictor.fit(&examples, config, rng);
        predictor
    }

    /// Run `config.epochs` passes of mini-batch Adam over `examples`.
    pub fn fit<R: Rng + ?Sized>(
        &mut self,
        examples: &[TrainingExample],
        config: &PredictorConfig,
        rng: &mut R,
    ) {
        let mut opt_embedding = Adam::new(self.embedding.dim());
        let mut opt_w1 = Adam::new(self.w1.dim());
        let mut opt_b1 = Adam::new(self.b1.dim());
        let mut opt_w2 = Adam::new(self.w2.dim());
        let mut opt_b2 = Adam::new(self.b2.dim());

        let lr = config.learning_rate;
        let mut order: Vec<usize> = (0..examples.len()).collect();

        for epoch in 0..config.epochs {
            order.shuffle(rng);
            let mut epoch_loss = 0.0f32;

            for chunk in order.chunks(config.batch_size.max(1)) {
                let batch: Vec<&TrainingExample> = chunk.iter().map(|&i| &examples[i]).collect();
                let cache = self.forward_batch(
                    batch.iter().map(|ex| (ex.element, ex.context, ex.duration)),
                );

                let n = batch.len() as f32;
                let mut grad_logits = cache.probs.clone();
                for (row, ex) in batch.iter().enumerate() {
                    epoch_loss -= cache.probs[[row, ex.target]].max(1e-12).ln();
                    grad_logits[[row, ex.target]] -= 1.0;
                }
                grad_logits.mapv_inplace(|g| g / n);

                let grad_w2 = cache.hidden.t().dot(&grad_logits);
                let grad_b2 = grad_logits.sum_axis(Axis(0)).insert_axis(Axis(0));

                let grad_hidden = grad_logits.dot(&self.w2.t());
                let relu_grad = cache.hidden_pre.mapv(|x| if x > 0.0 { 1.0f32 } else { 0.0 });
                let grad_hidden_pre = grad_hidden * relu_grad;

                let grad_w1 = cache.input.t().dot(&grad_hidden_pre);
                let grad_b1 = grad_hidden_pre.sum_axis(Axis(0)).insert_axis(Axis(0));
                let grad_input = grad_hidden_pre.dot(&self.w1.t());

                let e = self.embedding.ncols();
                let mut grad_embedding: Array2<f32> = Array2::zeros(self.embedding.raw_dim());
                for (row, ex) in batch.iter().enumerate() {
                    let mut target = grad_embedding.row_mut(ex.element);
                    target += &grad_input.slice(s![row, ..e]);
                }

                opt_w2.step(&mut self.w2, &grad_w2, lr);
                opt_b2.step(&mut self.b2, &grad_b2, lr);
                opt_w1.step(&mut self.w1, &grad_w1, lr);
                opt_b1.step(&mut self.b1, &grad_b1, lr);
                opt_embedding.step(&mut self.embedding, &grad_embedding, lr);
            }

            let mean_loss = epoch_loss / examples.len() as f32;
            debug!(epoch, loss = mean_loss, "predictor epoch finished");
            self.last_loss = Some(mean_loss);
        }

        info!(
            examples = examples.len(),
            epochs = config.epochs,
            loss = ?self.last_loss,
            "transition predictor trained"
        );
    }

    /// Probability distribution over vocabulary indices for the next
    /// element. Fails if `element` is outside the trained vocabulary.
    pub fn predict(
        &self,
        element: &str,
        context: Context,
        duration: f64,
    ) -> Result<Vec<f32>, PredictorError> {
        let index = self
            .vocab
            .index_of(element)
            .ok_or_else(|| PredictorError::UnknownElement(element.to_string()))?;
        let cache = self.forward_batch(std::iter::once((index, context, duration as f32)));
        Ok(cache.probs.row(0).to_vec())
    }

    /// Predict and sample the next base element categorically.
    pub fn sample_next<R: Rng + ?Sized>(
        &self,
        element: &str,
        context: Context,
        duration: f64,
        rng: &mut R,
    ) -> Result<String, PredictorError> {
        let probs = self.predict(element, context, duration)?;
        let dist = Categorical::from_weights(
            probs.iter().enumerate().map(|(i, &p)| (i, p as f64)),
        )
        .ok_or(PredictorError::DegenerateOutput)?;
        let index = dist.sample(rng).ok_or(PredictorError::DegenerateOutput)?;
        self.vocab
            .element(index)
            .map(str::to_string)
            .ok_or(PredictorError::DegenerateOutput)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Mean cross-entropy of the final training epoch.
    pub fn last_loss(&self) -> Option<f32> {
        self.last_loss
    }

    /// Mean cross-entropy over `examples` without updating weights.
    pub fn loss(&self, examples: &[TrainingExample]) -> f32 {
        if examples.is_empty() {
            return 0.0;
        }
        let cache =
            self.forward_batch(examples.iter().map(|ex| (ex.element, ex.context, ex.duration)));
        let total: f32 = examples
            .iter()
            .enumerate()
            .map(|(row, ex)| -cache.probs[[row, ex.target]].max(1e-12).ln())
            .sum();
        total / examples.len() as f32
    }

    fn forward_batch<I>(&self, rows: I) -> ForwardCache
    where
        I: ExactSizeIterator<Item = (usize, Context, f32)>,
    {
        let e = self.embedding.ncols();
        let mut input: Array2<f32> = Array2::zeros((rows.len(), e + EXTRA_FEATURES));
        for (row, (element, context, duration)) in rows.enumerate() {
            input
                .slice_mut(s![row, ..e])
                .assign(&self.embedding.row(element));
            input[[row, e + context.index()]] = 1.0;
            input[[row, e + 3]] = duration;
        }

        let hidden_pre = input.dot(&self.w1) + &self.b1;
        let hidden = hidden_pre.mapv(|x| x.max(0.0));
        let mut probs = hidden.dot(&self.w2) + &self.b2;
        for mut row in probs.rows_mut() {
            let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
            row.mapv_inplace(|x| (x - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|x| x / sum);
        }

        ForwardCache {
            input,
            hidden_pre,
            hidden,
            probs,
        }
    }
}

/// He-normal initialization.
fn he_normal<R: Rng + ?Sized>(shape: (usize, usize), rng: &mut R) -> Array2<f32> {
    let std = (2.0 / (shape.0 as f32).max(1.0)).sqrt();
    match Normal::new(0.0f32, std) {
        Ok(normal) => Array2::from_shape_fn(shape, |_| normal.sample(rng)),
        Err(_) => Array2::zeros(shape),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::scene::{SceneRecord, Trailer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn chain_corpus() -> Corpus {
        // A always leads to B, B always to C, C always to A.
        let trailer = Trailer::new(vec![
            SceneRecord::new("A", Context::Low, 2.0, "NV1"),
            SceneRecord::new("B", Context::Medium, 3.0, "NV1"),
            SceneRecord::new("C", Context::High, 1.5, "NV2"),
            SceneRecord::new("A", Context::Low, 2.0, "NV1"),
            SceneRecord::new("B", Context::Medium, 3.0, "NV1"),
            SceneRecord::new("C", Context::High, 1.5, "NV2"),
        ]);
        Corpus::new(vec![trailer.clone(), trailer])
    }

    fn small_config() -> PredictorConfig {
        PredictorConfig {
            embedding_dim: 4,
            hidden_dim: 16,
            epochs: 150,
            batch_size: 4,
            learning_rate: 0.02,
        }
    }

    #[test]
    fn examples_cover_adjacent_pairs() {
        let corpus = chain_corpus();
        let vocab = Vocabulary::build(&corpus).unwrap();
        let examples = training_examples(&corpus, &vocab);
        assert_eq!(examples.len(), 10);
        assert_eq!(examples[0].element, vocab.index_of("A").unwrap());
        assert_eq!(examples[0].target, vocab.index_of("B").unwrap());
        assert_eq!(examples[0].context, Context::Low);
        assert_eq!(examples[0].duration, 2.0);
    }

    #[test]
    fn output_is_a_distribution() {
        let corpus = chain_corpus();
        let vocab = Vocabulary::build(&corpus).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let predictor = TransitionPredictor::new(vocab, &small_config(), &mut rng);
        let probs = predictor.predict("A", Context::Low, 2.0).unwrap();
        assert_eq!(probs.len(), 3);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(probs.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn training_reduces_loss() {
        let corpus = chain_corpus();
        let vocab = Vocabulary::build(&corpus).unwrap();
        let examples = training_examples(&corpus, &vocab);
        let mut rng = StdRng::seed_from_u64(2);
        let mut predictor = TransitionPredictor::new(vocab, &small_config(), &mut rng);
        let before = predictor.loss(&examples);
        predictor.fit(&examples, &small_config(), &mut rng);
        let after = predictor.loss(&examples);
        assert!(after < before, "loss did not drop: {} -> {}", before, after);
        assert!(predictor.last_loss().is_some());
    }

    #[test]
    fn learns_deterministic_chain() {
        let corpus = chain_corpus();
        let vocab = Vocabulary::build(&corpus).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let predictor = TransitionPredictor::train(&corpus, &vocab, &small_config(), &mut rng);
        let probs = predictor.predict("A", Context::Low, 2.0).unwrap();
        let b = vocab.index_of("B").unwrap();
        assert!(probs[b] > 0.8, "P(B|A) = {}", probs[b]);
    }

    #[test]
    fn unknown_element_is_a_lookup_error() {
        let corpus = chain_corpus();
        let vocab = Vocabulary::build(&corpus).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let predictor = TransitionPredictor::new(vocab, &small_config(), &mut rng);
        assert!(matches!(
            predictor.predict("Z", Context::Low, 1.0),
            Err(PredictorError::UnknownElement(e)) if e == "Z"
        ));
        assert!(predictor
            .sample_next("A_R", Context::Low, 1.0, &mut rng)
            .is_err());
    }

    #[test]
    fn sample_next_stays_in_vocabulary() {
        let corpus = chain_corpus();
        let vocab = Vocabulary::build(&corpus).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let predictor = TransitionPredictor::train(&corpus, &vocab, &small_config(), &mut rng);
        for _ in 0..50 {
            let next = predictor
                .sample_next("B", Context::Medium, 3.0, &mut rng)
                .unwrap();
            assert!(vocab.contains(&next));
        }
    }

    #[test]
    fn training_is_reproducible() {
        let corpus = chain_corpus();
        let vocab = Vocabulary::build(&corpus).unwrap();
        let mut rng1 = StdRng::seed_from_u64(6);
        let mut rng2 = StdRng::seed_from_u64(6);
        let p1 = TransitionPredictor::train(&corpus, &vocab, &small_config(), &mut rng1);
        let p2 = TransitionPredictor::train(&corpus, &vocab, &small_config(), &mut rng2);
        assert_eq!(
            p1.predict("C", Context::High, 1.5).unwrap(),
            p2.predict("C", Context::High, 1.5).unwrap()
        );
    }
}
