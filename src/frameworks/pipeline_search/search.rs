//! Evolutionary search over pipelines, scored by k-fold cross-validation.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::adapter::{Candidate, Estimator, EstimatorVariant, SearchEngine};
use crate::{BenchError, BenchResult};

use super::models::{FittedPipeline, Learner, PipelineSpec, Preprocessor};
use super::scoring;

const VAR_SMOOTHING: &[f64] = &[1e-9, 1e-7, 1e-5, 1e-3];
const ALPHAS: &[f64] = &[0.0, 0.001, 0.01, 0.1, 1.0, 10.0];
const MAX_NEIGHBORS: usize = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub generations: usize,
    pub population_size: usize,
    pub cv: usize,
    /// Share of offspring produced by mutation; the rest by crossover.
    pub mutation_rate: f64,
    pub max_time_mins: f64,
    pub scoring: &'static str,
    pub random_state: u64,
    pub n_jobs: usize,
    pub verbosity: u8,
}

impl SearchSettings {
    /// Budgets too large for a `Duration` saturate to `Duration::MAX`.
    pub fn max_time(&self) -> Duration {
        Duration::try_from_secs_f64((self.max_time_mins * 60.0).max(0.0)).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedIndividual {
    pub spec: PipelineSpec,
    pub generation: usize,
    /// Mean CV score, `None` when any fold failed.
    pub fitness: Option<f64>,
}

pub struct PipelineSearch {
    variant: EstimatorVariant,
    n_classes: Option<usize>,
    settings: SearchSettings,
    evaluated: BTreeMap<String, EvaluatedIndividual>,
    pareto_front: Vec<String>,
    fitted: Option<FittedPipeline>,
}

impl PipelineSearch {
    pub fn new(variant: EstimatorVariant, n_classes: Option<usize>, settings: SearchSettings) -> Self {
        PipelineSearch {
            variant,
            n_classes,
            settings,
            evaluated: BTreeMap::new(),
            pareto_front: Vec::new(),
            fitted: None,
        }
    }

    /// Every pipeline evaluated so far, keyed by its display form.
    pub fn evaluated_individuals(&self) -> &BTreeMap<String, EvaluatedIndividual> {
        &self.evaluated
    }

    fn fitness_of(&self, key: &str) -> f64 {
        self.evaluated
            .get(key)
            .and_then(|e| e.fitness)
            .unwrap_or(f64::NEG_INFINITY)
    }

    fn evolve(&self, population: &[PipelineSpec], space: &SearchSpace, rng: &mut StdRng) -> Vec<PipelineSpec> {
        let mut ranked: Vec<&PipelineSpec> = population.iter().collect();
        ranked.sort_by(|a, b| {
            self.fitness_of(&b.to_string())
                .total_cmp(&self.fitness_of(&a.to_string()))
                .then(a.complexity().cmp(&b.complexity()))
        });
        ranked.dedup();
        let elite: Vec<PipelineSpec> = ranked
            .into_iter()
            .take((population.len() / 2).max(1))
            .cloned()
            .collect();

        let mut next = elite.clone();
        while next.len() < self.settings.population_size {
            let Some(parent) = elite.choose(rng) else { break };
            let child = if rng.gen_bool(self.settings.mutation_rate.clamp(0.0, 1.0)) {
                space.mutate(parent, rng)
            } else {
                let other = elite.choose(rng).unwrap_or(parent);
                PipelineSpec {
                    preprocessor: other.preprocessor,
                    learner: parent.learner.clone(),
                }
            };
            next.push(child);
        }
        next
    }

    /// Pareto front over (fitness, complexity), best fitness first.
    fn compute_pareto_front(&self) -> Vec<String> {
        let mut valid: Vec<(&String, f64, usize)> = self
            .evaluated
            .iter()
            .filter_map(|(k, e)| e.fitness.map(|f| (k, f, e.spec.complexity())))
            .collect();
        valid.sort_by(|a, b| a.2.cmp(&b.2).then(b.1.total_cmp(&a.1)).then(a.0.cmp(b.0)));

        let mut front: Vec<String> = Vec::new();
        let mut best = f64::NEG_INFINITY;
        for (key, fitness, _) in valid {
            if fitness > best {
                best = fitness;
                front.push(key.clone());
            }
        }
        front.reverse();
        front
    }
}

impl SearchEngine for PipelineSearch {
    type Model = FittedPipeline;

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> BenchResult<()> {
        if x.len() < 2 || x.len() != y.len() {
            return Err(BenchError::Engine(format!(
                "need at least two training rows with targets, got {} rows and {} targets",
                x.len(),
                y.len()
            )));
        }
        if self.variant.is_classification() && self.n_classes.is_none() {
            return Err(BenchError::Engine("classifier search requires a class count".into()));
        }

        let mut rng = StdRng::seed_from_u64(self.settings.random_state);
        let folds = k_folds(x.len(), self.settings.cv, &mut rng);
        let smallest_fold_train = x.len() - folds.iter().map(Vec::len).max().unwrap_or(0);
        let space = SearchSpace {
            variant: self.variant,
            max_neighbors: smallest_fold_train.clamp(1, MAX_NEIGHBORS),
        };
        let data = CvData {
            x,
            y,
            folds: &folds,
            n_classes: self.n_classes,
            scoring: self.settings.scoring,
        };

        // `None` when the budget lies beyond what `Instant` can represent.
        let deadline = Instant::now().checked_add(self.settings.max_time());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.n_jobs.max(1))
            .build()
            .map_err(|e| BenchError::Engine(format!("failed to start {} evaluation threads: {e}", self.settings.n_jobs)))?;
        let mut population: Vec<PipelineSpec> =
            (0..self.settings.population_size.max(1)).map(|_| space.random(&mut rng)).collect();

        for generation in 0..self.settings.generations.max(1) {
            let mut pending: Vec<PipelineSpec> = Vec::new();
            for spec in &population {
                let key = spec.to_string();
                if !self.evaluated.contains_key(&key) && !pending.iter().any(|p| p.to_string() == key) {
                    pending.push(spec.clone());
                }
            }
            let scores = evaluate_all(&pending, &data, &pool);
            for (spec, fitness) in pending.into_iter().zip(scores) {
                self.evaluated.insert(
                    spec.to_string(),
                    EvaluatedIndividual {
                        spec,
                        generation,
                        fitness,
                    },
                );
            }

            let best = population
                .iter()
                .map(|s| self.fitness_of(&s.to_string()))
                .fold(f64::NEG_INFINITY, f64::max);
            if self.settings.verbosity > 0 {
                info!(generation, best, evaluated = self.evaluated.len(), "generation done");
            } else {
                debug!(generation, best, evaluated = self.evaluated.len(), "generation done");
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("time budget of {:.2} minutes reached after generation {generation}", self.settings.max_time_mins);
                break;
            }
            population = self.evolve(&population, &space, &mut rng);
        }

        self.pareto_front = self.compute_pareto_front();
        let best = self
            .evaluated
            .values()
            .filter_map(|e| e.fitness.map(|f| (e, f)))
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.spec.complexity().cmp(&a.0.spec.complexity())))
            .map(|(e, _)| e.spec.clone())
            .ok_or_else(|| {
                BenchError::Engine(format!(
                    "none of the {} evaluated pipelines could be scored with {}",
                    self.evaluated.len(),
                    self.settings.scoring
                ))
            })?;
        info!("Best pipeline: {best}");
        self.fitted = Some(FittedPipeline::fit(&best, x, y, self.n_classes)?);
        Ok(())
    }

    fn fitted(&self) -> BenchResult<&FittedPipeline> {
        self.fitted
            .as_ref()
            .ok_or_else(|| BenchError::Engine("search has not been fitted".into()))
    }

    fn models_count(&self) -> usize {
        self.evaluated_individuals().len()
    }

    fn candidates(&self) -> BenchResult<Vec<Candidate>> {
        if self.fitted.is_none() {
            return Err(BenchError::Engine("no pareto front before fit".into()));
        }
        self.pareto_front
            .iter()
            .map(|key| {
                let entry = self
                    .evaluated
                    .get(key)
                    .ok_or_else(|| BenchError::Engine(format!("pareto front entry {key} missing")))?;
                Ok(Candidate {
                    fitness: format!(
                        "({}, {})",
                        entry.spec.complexity(),
                        entry.fitness.unwrap_or(f64::NEG_INFINITY)
                    ),
                    model: key.clone(),
                    pipeline: serde_json::to_string(&entry.spec)?,
                })
            })
            .collect()
    }
}

struct SearchSpace {
    variant: EstimatorVariant,
    max_neighbors: usize,
}

impl SearchSpace {
    fn random(&self, rng: &mut StdRng) -> PipelineSpec {
        PipelineSpec {
            preprocessor: self.random_preprocessor(rng),
            learner: self.random_learner(rng),
        }
    }

    fn random_preprocessor(&self, rng: &mut StdRng) -> Option<Preprocessor> {
        match rng.gen_range(0..3) {
            0 => None,
            1 => Some(Preprocessor::StandardScaler),
            _ => Some(Preprocessor::MinMaxScaler),
        }
    }

    fn random_neighbors(&self, rng: &mut StdRng) -> usize {
        rng.gen_range(1..=self.max_neighbors)
    }

    fn random_learner(&self, rng: &mut StdRng) -> Learner {
        match (self.variant, rng.gen_range(0..3)) {
            (EstimatorVariant::Classifier, 0) => Learner::GaussianNB {
                var_smoothing: *VAR_SMOOTHING.choose(rng).unwrap_or(&1e-9),
            },
            (EstimatorVariant::Classifier, 1) => Learner::KNeighborsClassifier {
                n_neighbors: self.random_neighbors(rng),
            },
            (EstimatorVariant::Classifier, _) => Learner::NearestCentroid,
            (EstimatorVariant::Regressor, 0) => Learner::LinearRegression {
                alpha: *ALPHAS.choose(rng).unwrap_or(&0.0),
            },
            (EstimatorVariant::Regressor, 1) => Learner::KNeighborsRegressor {
                n_neighbors: self.random_neighbors(rng),
            },
            (EstimatorVariant::Regressor, _) => Learner::DummyRegressor,
        }
    }

    fn mutate(&self, spec: &PipelineSpec, rng: &mut StdRng) -> PipelineSpec {
        let mut child = spec.clone();
        match rng.gen_range(0..3) {
            0 => child.preprocessor = self.random_preprocessor(rng),
            1 => {
                child.learner = match &spec.learner {
                    Learner::GaussianNB { .. } => Learner::GaussianNB {
                        var_smoothing: *VAR_SMOOTHING.choose(rng).unwrap_or(&1e-9),
                    },
                    Learner::KNeighborsClassifier { .. } => Learner::KNeighborsClassifier {
                        n_neighbors: self.random_neighbors(rng),
                    },
                    Learner::KNeighborsRegressor { .. } => Learner::KNeighborsRegressor {
                        n_neighbors: self.random_neighbors(rng),
                    },
                    Learner::LinearRegression { .. } => Learner::LinearRegression {
                        alpha: *ALPHAS.choose(rng).unwrap_or(&0.0),
                    },
                    other => other.clone(),
                }
            }
            _ => child.learner = self.random_learner(rng),
        }
        child
    }
}

/// Shuffled k-fold split; returns the held-out indices of each fold.
fn k_folds(n: usize, k: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    let k = k.clamp(2, n);
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(rng);
    let mut folds = vec![Vec::new(); k];
    for (i, row) in idx.into_iter().enumerate() {
        folds[i % k].push(row);
    }
    folds
}

struct CvData<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    folds: &'a [Vec<usize>],
    n_classes: Option<usize>,
    scoring: &'static str,
}

fn evaluate(spec: &PipelineSpec, data: &CvData<'_>) -> Option<f64> {
    let mut total = 0.0;
    for held_out in data.folds {
        let mut in_test = vec![false; data.x.len()];
        for i in held_out {
            in_test[*i] = true;
        }
        let (mut train_x, mut train_y, mut test_x, mut test_y) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for (i, (row, t)) in data.x.iter().zip(data.y).enumerate() {
            if in_test[i] {
                test_x.push(row.clone());
                test_y.push(*t);
            } else {
                train_x.push(row.clone());
                train_y.push(*t);
            }
        }
        let fold_score = FittedPipeline::fit(spec, &train_x, &train_y, data.n_classes).and_then(|model| {
            let pred = model.predict(&test_x)?;
            let proba = if scoring::needs_probabilities(data.scoring) {
                Some(model.predict_proba(&test_x)?)
            } else {
                None
            };
            scoring::score(data.scoring, &test_y, &pred, proba.as_deref())
        });
        match fold_score {
            Ok(s) if s.is_finite() => total += s,
            Ok(s) => {
                debug!(pipeline = %spec, score = s, "non-finite fold score");
                return None;
            }
            Err(e) => {
                debug!(pipeline = %spec, error = %e, "pipeline evaluation failed");
                return None;
            }
        }
    }
    Some(total / data.folds.len() as f64)
}

/// Evaluate `specs` on the `n_jobs` pool; scores keep the order of `specs`.
fn evaluate_all(specs: &[PipelineSpec], data: &CvData<'_>, pool: &rayon::ThreadPool) -> Vec<Option<f64>> {
    pool.install(|| specs.par_iter().map(|s| evaluate(s, data)).collect())
}
