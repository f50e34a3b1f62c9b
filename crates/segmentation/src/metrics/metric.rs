use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr, VariantNames};

use crate::{
    error::Result,
    metrics::confusion::ConfusionCounts,
    types::{GroundTruthMap, SegmentationMap},
};

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash, PartialOrd, Ord
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    /// Foreground intersection over union
    Iou,
    /// Mean of foreground and background IoU
    MeanIou,
    /// Share of correctly classified pixels
    PixelAccuracy,
    Precision,
    Recall,
    /// Correlation between prediction and truth, in [-1, 1]
    MatthewsCorrelationCoefficient,
}

impl Metric {
    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Iou => "IoU",
            Self::MeanIou => "MIoU",
            Self::PixelAccuracy => "Accuracy",
            Self::Precision => "Precision",
            Self::Recall => "Recall",
            Self::MatthewsCorrelationCoefficient => "Matthews Correlation Coefficient",
        }
    }

    /// Evaluate the metric. Zero denominators resolve to fixed defaults
    /// rather than errors: 1.0 for IoU, 0.0 for precision, recall and MCC.
    pub fn compute(&self, counts: &ConfusionCounts) -> f64 {
        match self {
            Self::Iou => iou(counts),
            Self::MeanIou => (iou(counts) + iou(&counts.complement())) / 2.0,
            Self::PixelAccuracy => ratio(
                counts.true_positive + counts.true_negative,
                counts.total(),
                1.0,
            ),
            Self::Precision => ratio(
                counts.true_positive,
                counts.true_positive + counts.false_positive,
                0.0,
            ),
            Self::Recall => ratio(
                counts.true_positive,
                counts.true_positive + counts.false_negative,
                0.0,
            ),
            Self::MatthewsCorrelationCoefficient => mcc(counts),
        }
    }
}

fn ratio(numerator: u64, denominator: u64, default: f64) -> f64 {
    if denominator == 0 {
        default
    } else {
        numerator as f64 / denominator as f64
    }
}

fn iou(counts: &ConfusionCounts) -> f64 {
    ratio(
        counts.true_positive,
        counts.true_positive + counts.false_positive + counts.false_negative,
        1.0,
    )
}

fn mcc(counts: &ConfusionCounts) -> f64 {
    let tp = counts.true_positive as f64;
    let tn = counts.true_negative as f64;
    let fp = counts.false_positive as f64;
    let fn_ = counts.false_negative as f64;

    // Products of pixel counts overflow u64 on large images.
    let denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    (tp * tn - fp * fn_) / denominator
}

/// One metric result with the pixel area of the image it came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricValue {
    pub metric: Metric,
    pub value: f64,
    pub weight: u64,
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.4}", self.metric.label(), self.value)
    }
}

/// All metrics for one (segmentation, ground truth) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Evaluation {
    pub counts: ConfusionCounts,
    pub values: Vec<MetricValue>,
}

impl Evaluation {
    pub fn from_counts(counts: ConfusionCounts) -> Self {
        let weight = counts.total();
        let values = Metric::iter()
            .map(|metric| MetricValue {
                metric,
                value: metric.compute(&counts),
                weight,
            })
            .collect();
        Self { counts, values }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.values
            .iter()
            .find(|v| v.metric == metric)
            .map(|v| v.value)
            .unwrap_or_else(|| metric.compute(&self.counts))
    }

    /// Pixel area the evaluation covers
    pub fn weight(&self) -> u64 {
        self.counts.total()
    }
}

/// Compute every metric of `segmentation` against `ground_truth`
pub fn evaluate(segmentation: &SegmentationMap, ground_truth: &GroundTruthMap) -> Result<Evaluation> {
    let counts = ConfusionCounts::from_maps(segmentation, ground_truth)?;
    Ok(Evaluation::from_counts(counts))
}
