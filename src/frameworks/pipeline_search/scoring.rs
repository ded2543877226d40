//! Scoring functions addressed by their scikit-learn style identifiers.
//!
//! Every scorer is "greater is better"; losses are negated.

use crate::{BenchError, BenchResult};

pub const ACCURACY: &str = "accuracy";
pub const ROC_AUC: &str = "roc_auc";
pub const F1: &str = "f1";
pub const NEG_LOG_LOSS: &str = "neg_log_loss";
pub const NEG_MAE: &str = "neg_mean_absolute_error";
pub const NEG_MSE: &str = "neg_mean_squared_error";
pub const NEG_MSLE: &str = "neg_mean_squared_log_error";
pub const R2: &str = "r2";

const LOG_LOSS_EPS: f64 = 1e-15;

/// Scorers computed from class probabilities rather than labels.
pub fn needs_probabilities(scoring: &str) -> bool {
    matches!(scoring, ROC_AUC | NEG_LOG_LOSS)
}

pub fn score(scoring: &str, y_true: &[f64], y_pred: &[f64], proba: Option<&[Vec<f64>]>) -> BenchResult<f64> {
    if y_true.is_empty() {
        return Err(BenchError::Engine("cannot score an empty fold".into()));
    }
    let n = y_true.len() as f64;
    let require_proba = || proba.ok_or_else(|| BenchError::Engine(format!("{scoring} requires probabilities")));
    match scoring {
        ACCURACY => Ok(y_true.iter().zip(y_pred).filter(|(t, p)| same_class(**t, **p)).count() as f64 / n),
        F1 => Ok(f1_binary(y_true, y_pred)),
        ROC_AUC => roc_auc(y_true, require_proba()?),
        NEG_LOG_LOSS => Ok(-log_loss(y_true, require_proba()?)),
        NEG_MAE => Ok(-y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / n),
        NEG_MSE => Ok(-y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum::<f64>() / n),
        NEG_MSLE => {
            if y_true.iter().chain(y_pred).any(|v| *v < 0.0) {
                return Err(BenchError::Engine(
                    "mean squared log error cannot be used with negative values".into(),
                ));
            }
            Ok(-y_true
                .iter()
                .zip(y_pred)
                .map(|(t, p)| (t.ln_1p() - p.ln_1p()).powi(2))
                .sum::<f64>()
                / n)
        }
        R2 => {
            let mean = y_true.iter().sum::<f64>() / n;
            let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
            let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
            if ss_tot == 0.0 {
                Ok(if ss_res == 0.0 { 1.0 } else { 0.0 })
            } else {
                Ok(1.0 - ss_res / ss_tot)
            }
        }
        other => Err(BenchError::Engine(format!("unknown scoring function: {other}"))),
    }
}

fn same_class(a: f64, b: f64) -> bool {
    a.round() == b.round()
}

/// F1 of the positive class `1`.
fn f1_binary(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let (mut tp, mut fp, mut fn_) = (0.0, 0.0, 0.0);
    for (t, p) in y_true.iter().zip(y_pred) {
        match (same_class(*t, 1.0), same_class(*p, 1.0)) {
            (true, true) => tp += 1.0,
            (false, true) => fp += 1.0,
            (true, false) => fn_ += 1.0,
            (false, false) => {}
        }
    }
    let denom = 2.0 * tp + fp + fn_;
    if denom == 0.0 { 0.0 } else { 2.0 * tp / denom }
}

fn log_loss(y_true: &[f64], proba: &[Vec<f64>]) -> f64 {
    let total: f64 = y_true
        .iter()
        .zip(proba)
        .map(|(t, row)| {
            let p = row.get(t.round() as usize).copied().unwrap_or(0.0);
            -p.clamp(LOG_LOSS_EPS, 1.0).ln()
        })
        .sum();
    total / y_true.len() as f64
}

/// Binary AUC on the positive-class column, macro one-vs-rest for more classes.
fn roc_auc(y_true: &[f64], proba: &[Vec<f64>]) -> BenchResult<f64> {
    let k = proba.first().map(Vec::len).unwrap_or(0);
    if k < 2 {
        return Err(BenchError::Engine("roc_auc needs at least two probability columns".into()));
    }
    let classes: Vec<usize> = if k == 2 { vec![1] } else { (0..k).collect() };
    let aucs: Vec<f64> = classes
        .into_iter()
        .filter_map(|c| {
            let scores: Vec<f64> = proba.iter().map(|row| row[c]).collect();
            let positive: Vec<bool> = y_true.iter().map(|t| t.round() as usize == c).collect();
            binary_auc(&scores, &positive)
        })
        .collect();
    if aucs.is_empty() {
        return Err(BenchError::Engine(
            "only one class present in y_true, roc_auc is not defined".into(),
        ));
    }
    Ok(aucs.iter().sum::<f64>() / aucs.len() as f64)
}

/// Mann-Whitney U with average ranks for ties; `None` when a side is empty.
fn binary_auc(scores: &[f64], positive: &[bool]) -> Option<f64> {
    let n_pos = positive.iter().filter(|p| **p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for idx in &order[i..=j] {
            ranks[*idx] = avg;
        }
        i = j + 1;
    }
    let rank_sum: f64 = ranks.iter().zip(positive).filter(|(_, p)| **p).map(|(r, _)| r).sum();
    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}
