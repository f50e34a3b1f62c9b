use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    error::{Result, SegmentationError},
    metrics::metric::{Evaluation, Metric, MetricValue},
};

/// `Σ(value·weight) / Σ(weight)`, failing on empty input or zero total weight
pub fn weighted_mean<I>(values: I) -> Result<f64>
where
    I: IntoIterator<Item = (f64, u64)>,
{
    let mut weighted_sum = 0.0;
    let mut total_weight = 0u64;
    let mut seen = 0usize;

    for (value, weight) in values {
        weighted_sum += value * weight as f64;
        total_weight += weight;
        seen += 1;
    }

    if seen == 0 {
        return Err(SegmentationError::EmptyInput("no values to average".to_string()));
    }
    if total_weight == 0 {
        return Err(SegmentationError::EmptyInput(format!(
            "all {seen} weights are zero"
        )));
    }
    Ok(weighted_sum / total_weight as f64)
}

/// Weighted mean over [`MetricValue`]s of any single metric
pub fn weighted_mean_of<'a, I>(values: I) -> Result<f64>
where
    I: IntoIterator<Item = &'a MetricValue>,
{
    weighted_mean(values.into_iter().map(|v| (v.value, v.weight)))
}

/// Batch-level statistics, each metric averaged by image pixel count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchSummary {
    pub images: usize,
    pub total_pixels: u64,
    pub means: BTreeMap<Metric, f64>,
}

impl BatchSummary {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.means.get(&metric).copied()
    }
}

/// Collects per-image evaluations of a batch
#[derive(Debug, Clone, Default)]
pub struct BatchAggregator {
    evaluations: Vec<(String, Evaluation)>,
}

impl BatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, image_id: impl Into<String>, evaluation: Evaluation) {
        self.evaluations.push((image_id.into(), evaluation));
    }

    pub fn len(&self) -> usize {
        self.evaluations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluations.is_empty()
    }

    pub fn evaluations(&self) -> impl Iterator<Item = (&str, &Evaluation)> + '_ {
        self.evaluations.iter().map(|(id, e)| (id.as_str(), e))
    }

    /// Weighted mean of one metric across the batch
    pub fn mean(&self, metric: Metric) -> Result<f64> {
        weighted_mean(
            self.evaluations
                .iter()
                .map(|(_, e)| (e.get(metric), e.weight())),
        )
    }

    pub fn summary(&self) -> Result<BatchSummary> {
        let means = Metric::iter()
            .map(|metric| Ok((metric, self.mean(metric)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(BatchSummary {
            images: self.evaluations.len(),
            total_pixels: self.evaluations.iter().map(|(_, e)| e.weight()).sum(),
            means,
        })
    }
}
