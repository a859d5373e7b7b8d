//! Plot handlers: binary classification curves and confusion matrices.
//!
//! ## Kinds
//!
//! | Name               | Input (labels, predictions)  | Rows written                     |
//! |--------------------|------------------------------|----------------------------------|
//! | `roc`              | numbers, scores              | `fpr`, `tpr`, `threshold`        |
//! | `precision_recall` | numbers, scores              | `precision`, `recall`, `threshold` |
//! | `confusion_matrix` | any two series               | `actual`, `predicted`            |
//!
//! Each plot keeps only its most recent dump in `plots/<name>.json`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};

use crate::data::DataHandler;
use crate::error::Result;
use crate::models::{PlotOptions, Series};
use crate::storage;

/// Closed set of plot kinds, looked up by the name passed to `log_plot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    Roc,
    PrecisionRecall,
    ConfusionMatrix,
}

impl PlotKind {
    pub const ALL: [PlotKind; 3] = [
        PlotKind::Roc,
        PlotKind::PrecisionRecall,
        PlotKind::ConfusionMatrix,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlotKind::Roc => "roc",
            PlotKind::PrecisionRecall => "precision_recall",
            PlotKind::ConfusionMatrix => "confusion_matrix",
        }
    }

    pub fn could_log(&self, value: &PlotInput) -> bool {
        let PlotInput {
            labels,
            predictions,
        } = value;
        if labels.is_empty() || labels.len() != predictions.len() {
            return false;
        }
        match self {
            PlotKind::Roc | PlotKind::PrecisionRecall => {
                labels.as_numbers().is_some() && predictions.as_numbers().is_some()
            }
            PlotKind::ConfusionMatrix => true,
        }
    }

    fn render(&self, value: &PlotInput, options: &PlotOptions) -> Value {
        match self {
            PlotKind::Roc => {
                let curve = roc_curve(value, options);
                json!({ "roc": curve })
            }
            PlotKind::PrecisionRecall => {
                let curve = precision_recall_curve(value, options);
                json!({ "precision_recall": curve })
            }
            PlotKind::ConfusionMatrix => {
                let rows: Vec<ConfusionRow> = value
                    .labels
                    .labels()
                    .into_iter()
                    .zip(value.predictions.labels())
                    .map(|(actual, predicted)| ConfusionRow { actual, predicted })
                    .collect();
                json!({ "confusion_matrix": rows })
            }
        }
    }
}

/// Ground truth and predictions for one plot dump.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotInput {
    pub labels: Series,
    pub predictions: Series,
}

impl PlotInput {
    pub fn new(labels: impl Into<Series>, predictions: impl Into<Series>) -> Self {
        Self {
            labels: labels.into(),
            predictions: predictions.into(),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "({} x{}, {} x{})",
            self.labels.type_name(),
            self.labels.len(),
            self.predictions.type_name(),
            self.predictions.len()
        )
    }
}

#[derive(Debug)]
pub struct Plot {
    kind: PlotKind,
    output_path: PathBuf,
    val: Option<PlotInput>,
    options: PlotOptions,
    step: Option<u64>,
}

impl Plot {
    pub const SUBFOLDER: &'static str = "plots";

    pub fn new(kind: PlotKind, root: &Path) -> Self {
        Self {
            kind,
            output_path: root
                .join(Self::SUBFOLDER)
                .join(format!("{}.json", kind.name())),
            val: None,
            options: PlotOptions::default(),
            step: None,
        }
    }

    pub fn kind(&self) -> PlotKind {
        self.kind
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn step(&self) -> Option<u64> {
        self.step
    }

    /// Dump with caller-supplied options; later re-dumps reuse them.
    pub fn dump_with(&mut self, value: PlotInput, step: Option<u64>, options: PlotOptions) -> Result<()> {
        self.options = options;
        self.dump(value, step)
    }
}

impl DataHandler for Plot {
    type Value = PlotInput;

    fn name(&self) -> &str {
        self.kind.name()
    }

    fn dump(&mut self, value: PlotInput, step: Option<u64>) -> Result<()> {
        let doc = self.kind.render(&value, &self.options);
        storage::save_json(&self.output_path, &doc)?;
        self.val = Some(value);
        self.step = step;
        Ok(())
    }

    fn redump(&mut self, step: u64) -> Result<()> {
        match self.val.clone() {
            Some(val) => self.dump(val, Some(step)),
            None => Ok(()),
        }
    }
}

// ─── Curves ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecisionRecallPoint {
    pub precision: f64,
    pub recall: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ConfusionRow {
    actual: String,
    predicted: String,
}

/// Cumulative true/false positives at each distinct score, highest score first.
struct BinaryCounts {
    fps: Vec<f64>,
    tps: Vec<f64>,
    thresholds: Vec<f64>,
}

fn binary_counts(value: &PlotInput, pos_label: f64) -> BinaryCounts {
    let labels = value.labels.as_numbers().unwrap_or_default();
    let scores = value.predictions.as_numbers().unwrap_or_default();

    let mut order: Vec<usize> = (0..scores.len().min(labels.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut counts = BinaryCounts {
        fps: vec![],
        tps: vec![],
        thresholds: vec![],
    };
    let mut tp = 0.0;
    for (pos, &idx) in order.iter().enumerate() {
        if labels[idx] == pos_label {
            tp += 1.0;
        }
        let last_of_run = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_run {
            counts.tps.push(tp);
            counts.fps.push((pos + 1) as f64 - tp);
            counts.thresholds.push(scores[idx]);
        }
    }
    counts
}

pub fn roc_curve(value: &PlotInput, options: &PlotOptions) -> Vec<RocPoint> {
    let BinaryCounts {
        mut fps,
        mut tps,
        mut thresholds,
    } = binary_counts(value, options.pos_label);

    if options.drop_intermediate && fps.len() > 2 {
        // Keep endpoints and every point where the curve changes direction.
        let keep: Vec<usize> = (0..fps.len())
            .filter(|&i| {
                i == 0
                    || i == fps.len() - 1
                    || fps[i + 1] - 2.0 * fps[i] + fps[i - 1] != 0.0
                    || tps[i + 1] - 2.0 * tps[i] + tps[i - 1] != 0.0
            })
            .collect();
        fps = keep.iter().map(|&i| fps[i]).collect();
        tps = keep.iter().map(|&i| tps[i]).collect();
        thresholds = keep.iter().map(|&i| thresholds[i]).collect();
    }

    let first_threshold = thresholds.first().map_or(1.0, |t| t + 1.0);
    fps.insert(0, 0.0);
    tps.insert(0, 0.0);
    thresholds.insert(0, first_threshold);

    let total_fp = fps.last().copied().unwrap_or(0.0);
    let total_tp = tps.last().copied().unwrap_or(0.0);
    fps.iter()
        .zip(&tps)
        .zip(&thresholds)
        .map(|((fp, tp), threshold)| RocPoint {
            fpr: fp / total_fp,
            tpr: tp / total_tp,
            threshold: *threshold,
        })
        .collect()
}

/// One point per threshold, from the lowest threshold reaching full recall
/// up to the highest score.
pub fn precision_recall_curve(value: &PlotInput, options: &PlotOptions) -> Vec<PrecisionRecallPoint> {
    let BinaryCounts {
        fps,
        tps,
        thresholds,
    } = binary_counts(value, options.pos_label);
    let Some(&total_tp) = tps.last() else {
        return vec![];
    };

    let last_ind = tps.iter().position(|&tp| tp >= total_tp).unwrap_or(0);
    (0..=last_ind)
        .rev()
        .map(|i| {
            let predicted = tps[i] + fps[i];
            let precision = if predicted > 0.0 { tps[i] / predicted } else { 0.0 };
            PrecisionRecallPoint {
                precision,
                recall: tps[i] / total_tp,
                threshold: thresholds[i],
            }
        })
        .collect()
}
