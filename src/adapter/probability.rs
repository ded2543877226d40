use tracing::info;

use crate::core::Probabilities;
use crate::{BenchError, BenchResult};

use super::traits::Estimator;

/// Class probabilities for `x`, `None` for regression.
///
/// A model that lacks probability output yields the `"predictions"` sentinel.
/// Only `ProbabilityUnsupported` is treated that way; any other failure of the
/// probability call is fatal for the run.
pub fn resolve_probabilities<E: Estimator + ?Sized>(
    estimator: &E,
    x: &[Vec<f64>],
    is_classification: bool,
) -> BenchResult<Option<Probabilities>> {
    if !is_classification {
        return Ok(None);
    }
    match estimator.predict_proba(x) {
        Ok(matrix) => Ok(Some(Probabilities::Matrix(matrix))),
        Err(BenchError::ProbabilityUnsupported(reason)) => {
            info!(%reason, "model has no probability output, deriving from predictions");
            Ok(Some(Probabilities::FromPredictions))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Proba {
        Native,
        Unsupported,
        Broken,
    }

    struct Stub(Proba);

    impl Estimator for Stub {
        fn predict(&self, x: &[Vec<f64>]) -> BenchResult<Vec<f64>> {
            Ok(vec![0.0; x.len()])
        }

        fn predict_proba(&self, x: &[Vec<f64>]) -> BenchResult<Vec<Vec<f64>>> {
            match self.0 {
                Proba::Native => Ok(vec![vec![1.0, 0.0]; x.len()]),
                Proba::Unsupported => Err(BenchError::ProbabilityUnsupported("stub".into())),
                Proba::Broken => Err(BenchError::Engine("numeric overflow".into())),
            }
        }
    }

    #[test]
    fn test_regression_has_no_probabilities() {
        let out = resolve_probabilities(&Stub(Proba::Native), &[vec![1.0]], false).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_native_probabilities() {
        let out = resolve_probabilities(&Stub(Proba::Native), &[vec![1.0]], true).unwrap();
        assert_eq!(out, Some(Probabilities::Matrix(vec![vec![1.0, 0.0]])));
    }

    #[test]
    fn test_capability_failure_yields_sentinel() {
        let out = resolve_probabilities(&Stub(Proba::Unsupported), &[vec![1.0]], true).unwrap();
        assert_eq!(out, Some(Probabilities::FromPredictions));
    }

    #[test]
    fn test_other_failure_propagates() {
        let err = resolve_probabilities(&Stub(Proba::Broken), &[vec![1.0]], true).unwrap_err();
        assert!(matches!(err, BenchError::Engine(_)));
    }
}
