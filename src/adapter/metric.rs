//! Benchmark metric to engine scoring identifier mapping.

use crate::{BenchError, BenchResult};

/// Fixed lookup table owned by one framework.
#[derive(Debug, Clone, Copy)]
pub struct MetricMapper {
    framework: &'static str,
    table: &'static [(&'static str, &'static str)],
}

impl MetricMapper {
    pub const fn new(framework: &'static str, table: &'static [(&'static str, &'static str)]) -> Self {
        MetricMapper { framework, table }
    }

    /// Engine identifier for `metric`, or `UnsupportedMetric`.
    pub fn map(&self, metric: &str) -> BenchResult<&'static str> {
        self.table
            .iter()
            .find(|(benchmark, _)| *benchmark == metric)
            .map(|(_, engine)| *engine)
            .ok_or_else(|| BenchError::UnsupportedMetric {
                framework: self.framework.to_string(),
                metric: metric.to_string(),
            })
    }

    pub fn entries(&self) -> &'static [(&'static str, &'static str)] {
        self.table
    }
}
