//! Pipeline building blocks: an optional scaler followed by one learner.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::adapter::Estimator;
use crate::core::Matrix;
use crate::{BenchError, BenchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preprocessor {
    StandardScaler,
    MinMaxScaler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "estimator")]
pub enum Learner {
    GaussianNB { var_smoothing: f64 },
    KNeighborsClassifier { n_neighbors: usize },
    /// No probability output.
    NearestCentroid,
    /// Ridge-regularised least squares; `alpha = 0` is ordinary least squares.
    LinearRegression { alpha: f64 },
    KNeighborsRegressor { n_neighbors: usize },
    DummyRegressor,
}

impl Learner {
    pub fn name(&self) -> &'static str {
        match self {
            Learner::GaussianNB { .. } => "GaussianNB",
            Learner::KNeighborsClassifier { .. } => "KNeighborsClassifier",
            Learner::NearestCentroid => "NearestCentroid",
            Learner::LinearRegression { .. } => "LinearRegression",
            Learner::KNeighborsRegressor { .. } => "KNeighborsRegressor",
            Learner::DummyRegressor => "DummyRegressor",
        }
    }

    pub fn is_classifier(&self) -> bool {
        matches!(
            self,
            Learner::GaussianNB { .. } | Learner::KNeighborsClassifier { .. } | Learner::NearestCentroid
        )
    }

    fn params(&self) -> Option<String> {
        match self {
            Learner::GaussianNB { var_smoothing } => Some(format!("var_smoothing={var_smoothing:e}")),
            Learner::KNeighborsClassifier { n_neighbors } | Learner::KNeighborsRegressor { n_neighbors } => {
                Some(format!("n_neighbors={n_neighbors}"))
            }
            Learner::LinearRegression { alpha } => Some(format!("alpha={alpha}")),
            Learner::NearestCentroid | Learner::DummyRegressor => None,
        }
    }
}

/// Unfitted pipeline as explored by the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub preprocessor: Option<Preprocessor>,
    pub learner: Learner,
}

impl PipelineSpec {
    /// Number of steps; the search prefers fewer at equal fitness.
    pub fn complexity(&self) -> usize {
        1 + usize::from(self.preprocessor.is_some())
    }
}

/// Renders as nested calls, e.g. `GaussianNB(StandardScaler(input_matrix), var_smoothing=1e-9)`.
impl fmt::Display for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let input = match self.preprocessor {
            Some(p) => format!("{p:?}(input_matrix)"),
            None => "input_matrix".to_string(),
        };
        match self.learner.params() {
            Some(params) => write!(f, "{}({input}, {params})", self.learner.name()),
            None => write!(f, "{}({input})", self.learner.name()),
        }
    }
}

/// `x' = (x - offset) / scale` per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedScaler {
    offset: Vec<f64>,
    scale: Vec<f64>,
}

impl FittedScaler {
    fn fit(kind: Preprocessor, x: &[Vec<f64>]) -> Self {
        let d = x.first().map(Vec::len).unwrap_or(0);
        let n = x.len() as f64;
        let (offset, scale): (Vec<f64>, Vec<f64>) = (0..d)
            .map(|j| {
                let col = x.iter().map(|row| row[j]);
                match kind {
                    Preprocessor::StandardScaler => {
                        let mean = col.clone().sum::<f64>() / n;
                        let var = col.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                        (mean, non_zero(var.sqrt()))
                    }
                    Preprocessor::MinMaxScaler => {
                        let min = col.clone().fold(f64::INFINITY, f64::min);
                        let max = col.fold(f64::NEG_INFINITY, f64::max);
                        (min, non_zero(max - min))
                    }
                }
            })
            .unzip();
        FittedScaler { offset, scale }
    }

    fn transform(&self, x: &[Vec<f64>]) -> Matrix {
        x.iter()
            .map(|row| {
                row.iter()
                    .zip(self.offset.iter().zip(&self.scale))
                    .map(|(v, (o, s))| (v - o) / s)
                    .collect()
            })
            .collect()
    }
}

fn non_zero(v: f64) -> f64 {
    if v.abs() < f64::EPSILON { 1.0 } else { v }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
enum FittedLearner {
    GaussianNB {
        /// Indexed by class; zero for classes absent from the training rows.
        priors: Vec<f64>,
        means: Matrix,
        variances: Matrix,
    },
    KNeighbors {
        n_neighbors: usize,
        x: Matrix,
        y: Vec<f64>,
        /// `Some` for classification.
        n_classes: Option<usize>,
    },
    NearestCentroid {
        centroids: Vec<Option<Vec<f64>>>,
    },
    Linear {
        weights: Vec<f64>,
        intercept: f64,
    },
    Dummy {
        mean: f64,
    },
}

/// Pipeline fitted on training data; this is what gets persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub spec: PipelineSpec,
    n_features: usize,
    scaler: Option<FittedScaler>,
    learner: FittedLearner,
}

impl FittedPipeline {
    pub fn fit(spec: &PipelineSpec, x: &[Vec<f64>], y: &[f64], n_classes: Option<usize>) -> BenchResult<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(BenchError::Engine(format!(
                "cannot fit {spec} on {} rows with {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        let scaler = spec.preprocessor.map(|p| FittedScaler::fit(p, x));
        let scaled;
        let xs: &[Vec<f64>] = match &scaler {
            Some(s) => {
                scaled = s.transform(x);
                &scaled
            }
            None => x,
        };

        let classes = || {
            n_classes.ok_or_else(|| BenchError::Engine(format!("{} requires a class count", spec.learner.name())))
        };
        let learner = match &spec.learner {
            Learner::GaussianNB { var_smoothing } => fit_gaussian_nb(xs, y, classes()?, *var_smoothing),
            Learner::KNeighborsClassifier { n_neighbors } => FittedLearner::KNeighbors {
                n_neighbors: *n_neighbors,
                x: xs.to_vec(),
                y: y.to_vec(),
                n_classes: Some(classes()?),
            },
            Learner::NearestCentroid => fit_nearest_centroid(xs, y, classes()?),
            Learner::LinearRegression { alpha } => fit_linear(xs, y, *alpha)?,
            Learner::KNeighborsRegressor { n_neighbors } => FittedLearner::KNeighbors {
                n_neighbors: *n_neighbors,
                x: xs.to_vec(),
                y: y.to_vec(),
                n_classes: None,
            },
            Learner::DummyRegressor => FittedLearner::Dummy {
                mean: y.iter().sum::<f64>() / y.len() as f64,
            },
        };

        Ok(FittedPipeline {
            spec: spec.clone(),
            n_features,
            scaler,
            learner,
        })
    }

    fn prepare(&self, x: &[Vec<f64>]) -> BenchResult<Matrix> {
        if let Some(row) = x.iter().find(|row| row.len() != self.n_features) {
            return Err(BenchError::Engine(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        Ok(match &self.scaler {
            Some(s) => s.transform(x),
            None => x.to_vec(),
        })
    }
}

impl Estimator for FittedPipeline {
    fn predict(&self, x: &[Vec<f64>]) -> BenchResult<Vec<f64>> {
        let xs = self.prepare(x)?;
        let out = match &self.learner {
            FittedLearner::GaussianNB { .. } | FittedLearner::KNeighbors { n_classes: Some(_), .. } => {
                self.predict_proba(x)?.iter().map(|row| argmax(row) as f64).collect()
            }
            FittedLearner::KNeighbors { n_neighbors, x: train_x, y, n_classes: None } => xs
                .iter()
                .map(|row| {
                    let idx = nearest(train_x, row, *n_neighbors);
                    idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64
                })
                .collect(),
            FittedLearner::NearestCentroid { centroids } => xs
                .iter()
                .map(|row| {
                    centroids
                        .iter()
                        .enumerate()
                        .filter_map(|(c, centroid)| centroid.as_ref().map(|m| (c, sq_dist(m, row))))
                        .min_by(|a, b| a.1.total_cmp(&b.1))
                        .map(|(c, _)| c as f64)
                        .unwrap_or(0.0)
                })
                .collect(),
            FittedLearner::Linear { weights, intercept } => xs
                .iter()
                .map(|row| intercept + row.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>())
                .collect(),
            FittedLearner::Dummy { mean } => vec![*mean; xs.len()],
        };
        Ok(out)
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> BenchResult<Vec<Vec<f64>>> {
        let xs = self.prepare(x)?;
        match &self.learner {
            FittedLearner::GaussianNB { priors, means, variances } => Ok(xs
                .iter()
                .map(|row| {
                    let joint: Vec<f64> = priors
                        .iter()
                        .enumerate()
                        .map(|(c, prior)| {
                            if *prior <= 0.0 {
                                return f64::NEG_INFINITY;
                            }
                            prior.ln()
                                + row
                                    .iter()
                                    .zip(means[c].iter().zip(&variances[c]))
                                    .map(|(v, (m, var))| {
                                        -0.5 * (2.0 * std::f64::consts::PI * var).ln() - (v - m).powi(2) / (2.0 * var)
                                    })
                                    .sum::<f64>()
                        })
                        .collect();
                    softmax(&joint)
                })
                .collect()),
            FittedLearner::KNeighbors { n_neighbors, x: train_x, y, n_classes: Some(k) } => Ok(xs
                .iter()
                .map(|row| {
                    let idx = nearest(train_x, row, *n_neighbors);
                    let mut votes = vec![0.0; *k];
                    for i in &idx {
                        let c = y[*i].round() as usize;
                        if c < *k {
                            votes[c] += 1.0;
                        }
                    }
                    votes.iter().map(|v| v / idx.len() as f64).collect()
                })
                .collect()),
            _ => Err(BenchError::ProbabilityUnsupported(format!(
                "{} does not implement predict_proba",
                self.spec.learner.name()
            ))),
        }
    }
}

fn fit_gaussian_nb(x: &[Vec<f64>], y: &[f64], n_classes: usize, var_smoothing: f64) -> FittedLearner {
    let d = x[0].len();
    let n = x.len() as f64;
    let max_var = (0..d)
        .map(|j| {
            let mean = x.iter().map(|r| r[j]).sum::<f64>() / n;
            x.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n
        })
        .fold(0.0, f64::max);
    let epsilon = (var_smoothing * max_var).max(1e-12);

    let mut priors = vec![0.0; n_classes];
    let mut means = vec![vec![0.0; d]; n_classes];
    let mut variances = vec![vec![1.0; d]; n_classes];
    for c in 0..n_classes {
        let rows: Vec<&Vec<f64>> = x
            .iter()
            .zip(y)
            .filter(|(_, t)| t.round() as usize == c)
            .map(|(r, _)| r)
            .collect();
        if rows.is_empty() {
            continue;
        }
        let count = rows.len() as f64;
        priors[c] = count / n;
        for j in 0..d {
            let mean = rows.iter().map(|r| r[j]).sum::<f64>() / count;
            means[c][j] = mean;
            variances[c][j] = rows.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / count + epsilon;
        }
    }
    FittedLearner::GaussianNB { priors, means, variances }
}

fn fit_nearest_centroid(x: &[Vec<f64>], y: &[f64], n_classes: usize) -> FittedLearner {
    let d = x[0].len();
    let mut sums = vec![vec![0.0; d]; n_classes];
    let mut counts = vec![0usize; n_classes];
    for (row, t) in x.iter().zip(y) {
        let c = t.round() as usize;
        if c >= n_classes {
            continue;
        }
        counts[c] += 1;
        for (s, v) in sums[c].iter_mut().zip(row) {
            *s += v;
        }
    }
    let centroids = sums
        .into_iter()
        .zip(counts)
        .map(|(s, count)| (count > 0).then(|| s.into_iter().map(|v| v / count as f64).collect()))
        .collect();
    FittedLearner::NearestCentroid { centroids }
}

fn fit_linear(x: &[Vec<f64>], y: &[f64], alpha: f64) -> BenchResult<FittedLearner> {
    let n = x.len() as f64;
    let d = x[0].len();
    let x_mean: Vec<f64> = (0..d).map(|j| x.iter().map(|r| r[j]).sum::<f64>() / n).collect();
    let y_mean = y.iter().sum::<f64>() / n;

    // Normal equations on centred data: (XᵀX + αI) w = Xᵀy
    let mut a = vec![vec![0.0; d]; d];
    let mut b = vec![0.0; d];
    for (row, t) in x.iter().zip(y) {
        let centred: Vec<f64> = row.iter().zip(&x_mean).map(|(v, m)| v - m).collect();
        for i in 0..d {
            b[i] += centred[i] * (t - y_mean);
            for j in 0..d {
                a[i][j] += centred[i] * centred[j];
            }
        }
    }
    for (i, row) in a.iter_mut().enumerate() {
        row[i] += alpha.max(1e-10);
    }
    let weights = solve(a, b).ok_or_else(|| BenchError::Engine("singular design matrix".into()))?;
    let intercept = y_mean - weights.iter().zip(&x_mean).map(|(w, m)| w * m).sum::<f64>();
    Ok(FittedLearner::Linear { weights, intercept })
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut w = vec![0.0; n];
    for i in (0..n).rev() {
        let tail: f64 = (i + 1..n).map(|k| a[i][k] * w[k]).sum();
        w[i] = (b[i] - tail) / a[i][i];
    }
    Some(w)
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Indices of the `k` training rows closest to `row`, ties broken by index.
fn nearest(train: &[Vec<f64>], row: &[f64], k: usize) -> Vec<usize> {
    let mut dists: Vec<(f64, usize)> = train.iter().enumerate().map(|(i, t)| (sq_dist(t, row), i)).collect();
    dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    dists.into_iter().take(k.clamp(1, train.len())).map(|(_, i)| i).collect()
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![1.0 / logits.len() as f64; logits.len()];
    }
    let exp: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / total).collect()
}

/// First index of the maximum.
fn argmax(row: &[f64]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if *v > best.1 { (i, *v) } else { best })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Matrix, Vec<f64>) {
        let x = vec![
            vec![0.0, 0.1],
            vec![0.2, 0.0],
            vec![0.1, 0.3],
            vec![5.0, 5.1],
            vec![5.2, 4.9],
            vec![4.8, 5.0],
        ];
        (x, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0])
    }

    #[test]
    fn test_display_matches_nested_form() {
        let spec = PipelineSpec {
            preprocessor: Some(Preprocessor::StandardScaler),
            learner: Learner::KNeighborsClassifier { n_neighbors: 5 },
        };
        assert_eq!(spec.to_string(), "KNeighborsClassifier(StandardScaler(input_matrix), n_neighbors=5)");
        assert_eq!(spec.complexity(), 2);
        let spec = PipelineSpec { preprocessor: None, learner: Learner::NearestCentroid };
        assert_eq!(spec.to_string(), "NearestCentroid(input_matrix)");
    }

    #[test]
    fn test_gaussian_nb_separates_blobs() {
        let (x, y) = blobs();
        let spec = PipelineSpec { preprocessor: None, learner: Learner::GaussianNB { var_smoothing: 1e-9 } };
        let model = FittedPipeline::fit(&spec, &x, &y, Some(2)).unwrap();
        assert_eq!(model.predict(&[vec![0.1, 0.1], vec![5.0, 5.0]]).unwrap(), vec![0.0, 1.0]);
        let proba = model.predict_proba(&[vec![0.1, 0.1]]).unwrap();
        assert!((proba[0].iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(proba[0][0] > 0.99);
    }

    #[test]
    fn test_knn_votes() {
        let (x, y) = blobs();
        let spec = PipelineSpec {
            preprocessor: Some(Preprocessor::MinMaxScaler),
            learner: Learner::KNeighborsClassifier { n_neighbors: 3 },
        };
        let model = FittedPipeline::fit(&spec, &x, &y, Some(2)).unwrap();
        assert_eq!(model.predict_proba(&[vec![4.9, 5.0]]).unwrap(), vec![vec![0.0, 1.0]]);
    }

    #[test]
    fn test_nearest_centroid_has_no_probabilities() {
        let (x, y) = blobs();
        let spec = PipelineSpec { preprocessor: None, learner: Learner::NearestCentroid };
        let model = FittedPipeline::fit(&spec, &x, &y, Some(2)).unwrap();
        assert_eq!(model.predict(&[vec![5.0, 5.0]]).unwrap(), vec![1.0]);
        assert!(matches!(
            model.predict_proba(&[vec![5.0, 5.0]]),
            Err(BenchError::ProbabilityUnsupported(_))
        ));
    }

    #[test]
    fn test_linear_regression_recovers_line() {
        let x: Matrix = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| 3.0 * i as f64 + 2.0).collect();
        let spec = PipelineSpec { preprocessor: None, learner: Learner::LinearRegression { alpha: 0.0 } };
        let model = FittedPipeline::fit(&spec, &x, &y, None).unwrap();
        let pred = model.predict(&[vec![20.0]]).unwrap();
        assert!((pred[0] - 62.0).abs() < 1e-6);
    }

    #[test]
    fn test_feature_count_checked() {
        let (x, y) = blobs();
        let spec = PipelineSpec { preprocessor: None, learner: Learner::KNeighborsClassifier { n_neighbors: 1 } };
        let model = FittedPipeline::fit(&spec, &x, &y, Some(2)).unwrap();
        assert!(model.predict(&[vec![1.0]]).is_err());
    }

    #[test]
    fn test_classifier_needs_class_count() {
        let (x, y) = blobs();
        let spec = PipelineSpec { preprocessor: None, learner: Learner::NearestCentroid };
        assert!(FittedPipeline::fit(&spec, &x, &y, None).is_err());
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let (x, y) = blobs();
        let spec = PipelineSpec {
            preprocessor: Some(Preprocessor::StandardScaler),
            learner: Learner::GaussianNB { var_smoothing: 1e-9 },
        };
        let model = FittedPipeline::fit(&spec, &x, &y, Some(2)).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: FittedPipeline = serde_json::from_str(&json).unwrap();
        let probe = vec![vec![2.5, 2.5], vec![0.0, 0.0]];
        assert_eq!(back.predict(&probe).unwrap(), model.predict(&probe).unwrap());
    }
}
