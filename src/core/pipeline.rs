/// The generation pipeline: corpus → trained model → scene sequence.
///
/// Wires together the statistics pass, the duration and level samplers,
/// the repetition policy and the transition predictor, and drives the
/// scene-by-scene generation loop.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::{ConfigError, EngineConfig, TransitionSource};
use crate::core::duration::DurationModel;
use crate::core::level::{LevelError, LevelSampler};
use crate::core::predictor::{PredictorError, TransitionPredictor};
use crate::core::repetition::RepetitionPolicy;
use crate::core::stats::{CorpusStatistics, StatsError};
use crate::core::timecode::Timecode;
use crate::core::vocabulary::{Vocabulary, VocabularyError};
use crate::schema::generated::{GeneratedScene, GeneratedTrailer};
use crate::schema::scene::{element_type, mark_repeat, Context, Corpus, CorpusError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("data error: {0}")]
    Data(String),
    #[error("data error: engine has not been trained")]
    NotTrained,
    #[error("scene count must be positive, got {0}")]
    InvalidSceneCount(usize),
    #[error("vocabulary error: {0}")]
    Vocabulary(#[from] VocabularyError),
    #[error("statistics error: {0}")]
    Stats(#[from] StatsError),
    #[error("level sampling error: {0}")]
    Level(#[from] LevelError),
    #[error("predictor error: {0}")]
    Predictor(#[from] PredictorError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),
}

impl EngineError {
    /// True for missing or unusable training data, including generation
    /// before training.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::Data(_) | Self::NotTrained | Self::Vocabulary(_) | Self::Stats(_)
        )
    }
}

/// Every trained artifact, read-only once built.
#[derive(Debug, Clone)]
pub struct TrailerModel {
    vocab: Vocabulary,
    stats: CorpusStatistics,
    durations: DurationModel,
    levels: LevelSampler,
    repetition: RepetitionPolicy,
    predictor: TransitionPredictor,
    config: EngineConfig,
}

impl TrailerModel {
    /// Run the statistics pass, fit the samplers and train the predictor.
    pub fn train<R: Rng + ?Sized>(
        corpus: &Corpus,
        config: &EngineConfig,
        rng: &mut R,
    ) -> Result<TrailerModel, EngineError> {
        config.validate()?;
        if let Some(ref metadata) = corpus.metadata {
            debug!(%metadata, "corpus metadata");
        }

        let vocab = Vocabulary::build(corpus)?;
        let stats = CorpusStatistics::build(corpus, rng)?;
        let durations = DurationModel::fit(&stats.durations, &config.sampling);
        let levels = LevelSampler::fit(&stats.levels, &config.sampling);
        let repetition = RepetitionPolicy::new(stats.repeat_probability.clone());
        let predictor = TransitionPredictor::train(corpus, &vocab, &config.predictor, rng);

        info!(
            trailers = corpus.trailers.len(),
            scenes = corpus.scene_count(),
            elements = vocab.len(),
            inconsistencies = stats.inconsistencies.len(),
            "trailer model trained"
        );

        Ok(TrailerModel {
            vocab,
            stats,
            durations,
            levels,
            repetition,
            predictor,
            config: config.clone(),
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn statistics(&self) -> &CorpusStatistics {
        &self.stats
    }

    pub fn durations(&self) -> &DurationModel {
        &self.durations
    }

    pub fn predictor(&self) -> &TransitionPredictor {
        &self.predictor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generate up to `count` scenes.
    ///
    /// Fails before emitting anything if the initial element or initial
    /// context distribution is missing. A lookup failure mid-run stops the
    /// loop and returns the scenes produced so far, with the reason in
    /// `GeneratedTrailer::halted`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<GeneratedTrailer, EngineError> {
        if count == 0 {
            return Err(EngineError::InvalidSceneCount(count));
        }
        let initial_element = self.stats.initial_element.as_ref().ok_or_else(|| {
            EngineError::Data("no initial element: corpus had no first-scene statistics".into())
        })?;
        let initial_contexts = self.stats.initial_contexts.as_ref().ok_or_else(|| {
            EngineError::Data("no initial context distribution: corpus had no first scenes".into())
        })?;

        let sampling = &self.config.sampling;
        let mut timecode = Timecode::new(sampling.frame_rate);
        let mut trailer = GeneratedTrailer::default();

        let context = initial_contexts.sample(rng).ok_or_else(|| {
            EngineError::Data("initial context distribution has no probability mass".into())
        })?;
        let first = self.emit(initial_element.clone(), None, context, initial_element, 1, &timecode, rng)?;
        timecode.advance(first.duration);
        trailer.scenes.push(first);

        while trailer.scenes.len() < count {
            let Some(prev) = trailer.scenes.last() else {
                break;
            };
            let order = trailer.scenes.len() + 1;
            let base = prev.base_element().to_string();

            let scene = if self.repetition.should_repeat(&base, rng) {
                let marked = mark_repeat(&base);
                let key = if sampling.repeat_uses_base_statistics {
                    base.clone()
                } else {
                    marked.clone()
                };
                self.emit(marked, Some(base), prev.context, &key, order, &timecode, rng)?
            } else {
                let next = match self.next_element(prev, rng) {
                    Ok(next) => next,
                    Err(e) => {
                        warn!(error = %e, generated = trailer.scenes.len(), "generation halted early");
                        trailer.halted = Some(e.to_string());
                        break;
                    }
                };
                let context = self.next_context(prev.context, rng);
                self.emit(next.clone(), None, context, &next, order, &timecode, rng)?
            };

            timecode.advance(scene.duration);
            trailer.scenes.push(scene);
        }

        debug!(
            scenes = trailer.scenes.len(),
            requested = count,
            runtime = timecode.elapsed(),
            "trailer generated"
        );
        Ok(trailer)
    }

    fn next_element<R: Rng + ?Sized>(
        &self,
        prev: &GeneratedScene,
        rng: &mut R,
    ) -> Result<String, PredictorError> {
        let base = prev.base_element();
        match self.config.transition_source {
            TransitionSource::Neural => {
                self.predictor
                    .sample_next(base, prev.context, prev.duration, rng)
            }
            TransitionSource::Markov => self
                .stats
                .element_transitions
                .sample(&base.to_string(), rng)
                .ok_or_else(|| PredictorError::NoTransitions(base.to_string())),
        }
    }

    /// Advance the context chain; a row with no mass holds the context.
    fn next_context<R: Rng + ?Sized>(&self, prev: Context, rng: &mut R) -> Context {
        self.stats
            .context_transitions
            .sample(&prev, rng)
            .unwrap_or(prev)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit<R: Rng + ?Sized>(
        &self,
        element: String,
        repeated_base: Option<String>,
        context: Context,
        sample_key: &str,
        order: usize,
        timecode: &Timecode,
        rng: &mut R,
    ) -> Result<GeneratedScene, LevelError> {
        let duration = round2(self.durations.sample(sample_key, rng));
        let level = self.levels.sample(sample_key, rng)?;
        Ok(GeneratedScene {
            timestamp: timecode.format(),
            element_type: element_type(&element),
            element,
            context,
            duration,
            is_repeat: repeated_base.is_some(),
            repeated_base,
            order,
            level,
        })
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Lifecycle of the engine's trained artifacts.
#[derive(Debug, Clone, Default)]
pub enum EngineState {
    #[default]
    Untrained,
    Trained(Box<TrailerModel>),
}

/// The top-level engine. Built via `TrailerEngine::builder()`.
pub struct TrailerEngine {
    config: EngineConfig,
    state: EngineState,
    rng: StdRng,
    seed: u64,
    generation_count: u64,
}

/// Builder for constructing a `TrailerEngine`.
pub struct TrailerEngineBuilder {
    seed: u64,
    config_path: Option<String>,
    corpus_path: Option<String>,
    /// Directly provided config (for testing without files).
    config: Option<EngineConfig>,
    /// Directly provided corpus (for testing without files).
    corpus: Option<Corpus>,
}

impl TrailerEngine {
    pub fn builder() -> TrailerEngineBuilder {
        TrailerEngineBuilder {
            seed: 0,
            config_path: None,
            corpus_path: None,
            config: None,
            corpus: None,
        }
    }

    /// Train on `corpus`, replacing any previously trained model.
    pub fn train(&mut self, corpus: &Corpus) -> Result<(), EngineError> {
        let model = TrailerModel::train(corpus, &self.config, &mut self.rng)?;
        self.state = EngineState::Trained(Box::new(model));
        Ok(())
    }

    /// Generate a trailer of `count` scenes from the trained model.
    pub fn generate(&mut self, count: usize) -> Result<GeneratedTrailer, EngineError> {
        let EngineState::Trained(ref model) = self.state else {
            return Err(EngineError::NotTrained);
        };
        let trailer = model.generate(count, &mut self.rng)?;
        self.generation_count += 1;
        Ok(trailer)
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.state, EngineState::Trained(_))
    }

    pub fn model(&self) -> Option<&TrailerModel> {
        match self.state {
            EngineState::Trained(ref model) => Some(&**model),
            EngineState::Untrained => None,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of successful `generate` calls.
    pub fn generation_count(&self) -> u64 {
        self.generation_count
    }
}

impl TrailerEngineBuilder {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn config_path(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    pub fn corpus_path(mut self, path: &str) -> Self {
        self.corpus_path = Some(path.to_string());
        self
    }

    /// Provide config directly (for testing without files).
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Provide a corpus directly; the engine is trained during `build`.
    pub fn with_corpus(mut self, corpus: Corpus) -> Self {
        self.corpus = Some(corpus);
        self
    }

    pub fn build(self) -> Result<TrailerEngine, EngineError> {
        // A config file overrides a directly provided config
        let config = match self.config_path {
            Some(ref path) => EngineConfig::load_from_ron(Path::new(path))?,
            None => self.config.unwrap_or_default(),
        };
        config.validate()?;

        let corpus = match self.corpus_path {
            Some(ref path) => Some(Corpus::load_json(Path::new(path))?),
            None => self.corpus,
        };

        let mut engine = TrailerEngine {
            config,
            state: EngineState::Untrained,
            rng: StdRng::seed_from_u64(self.seed),
            seed: self.seed,
            generation_count: 0,
        };

        if let Some(ref corpus) = corpus {
            engine.train(corpus)?;
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PredictorConfig;
    use crate::core::timecode::format_centiseconds;
    use crate::schema::scene::{SceneRecord, Trailer};

    fn quick_config() -> EngineConfig {
        EngineConfig {
            predictor: PredictorConfig {
                embedding_dim: 4,
                hidden_dim: 16,
                epochs: 20,
                batch_size: 8,
                learning_rate: 0.01,
            },
            ..EngineConfig::default()
        }
    }

    fn abc_corpus() -> Corpus {
        use Context::*;
        Corpus::new(vec![
            Trailer::new(vec![
                SceneRecord::new("A", Low, 1.0, "NV1"),
                SceneRecord::new("B", Medium, 2.0, "NV2"),
                SceneRecord::new("C", High, 3.0, "NV1"),
            ]),
            Trailer::new(vec![
                SceneRecord::new("A", Low, 1.0, "NV1"),
                SceneRecord::new("C", High, 2.0, "NV1"),
                SceneRecord::new("B", Medium, 3.0, "NV2"),
            ]),
        ])
    }

    fn repeat_corpus() -> Corpus {
        use Context::*;
        Corpus::new(vec![Trailer::new(vec![
            SceneRecord::new("A", Low, 2.0, "NV1"),
            SceneRecord::new("A_R", Low, 2.0, "NV1"),
            SceneRecord::new("A_R", Low, 2.0, "NV1"),
            SceneRecord::new("A_R", Low, 2.0, "NV1"),
        ])])
    }

    fn engine(corpus: Corpus, config: EngineConfig, seed: u64) -> TrailerEngine {
        TrailerEngine::builder()
            .seed(seed)
            .with_config(config)
            .with_corpus(corpus)
            .build()
            .unwrap()
    }

    #[test]
    fn generate_before_training_is_a_data_error() {
        let mut engine = TrailerEngine::builder().seed(1).build().unwrap();
        assert!(!engine.is_trained());
        let err = engine.generate(5).unwrap_err();
        assert!(matches!(err, EngineError::NotTrained));
        assert!(err.is_data_error());
        assert_eq!(engine.generation_count(), 0);
    }

    #[test]
    fn zero_scene_count_is_rejected() {
        let mut engine = engine(abc_corpus(), quick_config(), 1);
        assert!(matches!(
            engine.generate(0),
            Err(EngineError::InvalidSceneCount(0))
        ));
    }

    #[test]
    fn first_scene_starts_at_zero_with_initial_element() {
        for seed in 0..10 {
            let mut engine = engine(abc_corpus(), quick_config(), seed);
            let trailer = engine.generate(3).unwrap();
            assert_eq!(trailer.len(), 3);
            let first = &trailer.scenes[0];
            assert_eq!(first.element, "A");
            assert_eq!(first.timestamp, "00:00:00:00");
            assert_eq!(first.context, Context::Low);
            assert_eq!(first.order, 1);
            // A never appears after position 0, so it samples the defaults
            assert!((first.duration - 3.0).abs() < 1.0, "duration {}", first.duration);
            assert_eq!(first.level, "NV1");
        }
    }

    #[test]
    fn orders_and_timecodes_are_consistent() {
        let mut engine = engine(abc_corpus(), quick_config(), 7);
        let trailer = engine.generate(25).unwrap();
        assert_eq!(trailer.len(), 25);
        assert!(trailer.is_complete());

        let mut centis = 0u64;
        for (i, scene) in trailer.scenes.iter().enumerate() {
            assert_eq!(scene.order, i + 1);
            assert_eq!(scene.timestamp, format_centiseconds(centis, 24));
            assert!(scene.duration >= 1.0);
            assert!(["A", "B", "C"].contains(&scene.base_element()));
            centis += (scene.duration * 100.0).round() as u64;
        }
    }

    #[test]
    fn same_seed_same_trailer() {
        let mut e1 = engine(abc_corpus(), quick_config(), 99);
        let mut e2 = engine(abc_corpus(), quick_config(), 99);
        assert_eq!(e1.generate(10).unwrap(), e2.generate(10).unwrap());
    }

    #[test]
    fn certain_repeat_keeps_context_and_marks_element() {
        let mut engine = engine(repeat_corpus(), quick_config(), 3);
        let model = engine.model().unwrap();
        assert_eq!(model.statistics().repeat_probability["A"], 1.0);

        let trailer = engine.generate(4).unwrap();
        assert_eq!(trailer.len(), 4);
        for scene in &trailer.scenes[1..] {
            assert!(scene.is_repeat);
            assert_eq!(scene.element, "A_R");
            assert_eq!(scene.repeated_base.as_deref(), Some("A"));
            assert_eq!(scene.element_type, "A");
            assert_eq!(scene.context, trailer.scenes[0].context);
        }
    }

    #[test]
    fn repeats_use_marked_identity_defaults() {
        let mut engine = engine(repeat_corpus(), quick_config(), 4);
        let trailer = engine.generate(6).unwrap();
        // "A_R" has no statistics of its own: default level, default-mean duration
        for scene in &trailer.scenes[1..] {
            assert_eq!(scene.level, "NV1");
            assert!((scene.duration - 3.0).abs() < 1.0);
        }
    }

    #[test]
    fn repeats_can_use_base_statistics() {
        let mut config = quick_config();
        config.sampling.repeat_uses_base_statistics = true;
        let mut engine = engine(repeat_corpus(), config, 4);
        let trailer = engine.generate(6).unwrap();
        for scene in &trailer.scenes[1..] {
            // "A" was observed at 2.0s every time
            assert!((scene.duration - 2.0).abs() < 0.5);
        }
    }

    #[test]
    fn lookup_error_returns_partial_sequence() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut model = TrailerModel::train(&abc_corpus(), &quick_config(), &mut rng).unwrap();
        // A predictor that has never seen the initial element
        let mut vocab = Vocabulary::default();
        vocab.insert("B");
        model.predictor = TransitionPredictor::new(vocab, &quick_config().predictor, &mut rng);

        let trailer = model.generate(5, &mut rng).unwrap();
        assert_eq!(trailer.len(), 1);
        assert_eq!(trailer.scenes[0].element, "A");
        assert!(trailer.halted.as_deref().unwrap().contains("'A'"));
    }

    #[test]
    fn markov_source_halts_at_dead_end() {
        use Context::*;
        let corpus = Corpus::new(vec![Trailer::new(vec![
            SceneRecord::new("A", Low, 2.0, "NV1"),
            SceneRecord::new("B", Medium, 2.0, "NV1"),
            SceneRecord::new("C", High, 2.0, "NV1"),
        ])]);
        let mut config = quick_config();
        config.transition_source = TransitionSource::Markov;
        let mut engine = engine(corpus, config, 8);
        let trailer = engine.generate(10).unwrap();
        let elements: Vec<&str> = trailer.scenes.iter().map(|s| s.element.as_str()).collect();
        assert_eq!(elements, vec!["A", "B", "C"]);
        assert_eq!(
            trailer.scenes.iter().map(|s| s.context).collect::<Vec<_>>(),
            vec![Low, Medium, High]
        );
        assert!(!trailer.is_complete());
    }

    #[test]
    fn context_holds_when_row_is_empty() {
        use Context::*;
        let corpus = Corpus::new(vec![Trailer::new(vec![
            SceneRecord::new("A", High, 2.0, "NV1"),
            SceneRecord::new("A", High, 2.0, "NV1"),
        ])]);
        let mut rng = StdRng::seed_from_u64(2);
        let model = TrailerModel::train(&corpus, &quick_config(), &mut rng).unwrap();
        assert_eq!(model.next_context(Low, &mut rng), Low);
        assert_eq!(model.next_context(High, &mut rng), High);
    }

    #[test]
    fn missing_initial_element_is_a_data_error() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut model = TrailerModel::train(&abc_corpus(), &quick_config(), &mut rng).unwrap();
        model.stats.initial_element = None;
        let err = model.generate(3, &mut rng).unwrap_err();
        assert!(err.is_data_error());
        assert!(err.to_string().contains("initial element"));
    }

    #[test]
    fn massless_initial_contexts_are_a_data_error() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut model = TrailerModel::train(&abc_corpus(), &quick_config(), &mut rng).unwrap();
        model.stats.initial_contexts = Some(ron::from_str("(outcomes: [])").unwrap());
        let err = model.generate(3, &mut rng).unwrap_err();
        assert!(err.is_data_error());
        assert!(err.to_string().contains("initial context"));
    }

    #[test]
    fn zero_epochs_are_rejected_at_build() {
        let mut config = quick_config();
        config.predictor.epochs = 0;
        let result = TrailerEngine::builder()
            .with_config(config)
            .with_corpus(abc_corpus())
            .build();
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn empty_corpus_fails_training() {
        let mut engine = TrailerEngine::builder().build().unwrap();
        let err = engine.train(&Corpus::default()).unwrap_err();
        assert!(err.is_data_error());
        assert!(!engine.is_trained());
    }
}
