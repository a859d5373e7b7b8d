//! Data models for livelog: run configuration and the values callers log.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Directory used when neither the caller nor the environment names one.
pub const DEFAULT_DIR: &str = "dvclive";

/// Configuration for a single live session.
///
/// Built by the caller, then merged once with the process environment
/// (see [`crate::env::resolve`]) before the session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Root directory for run artifacts. `None` falls back to [`DEFAULT_DIR`].
    pub path: Option<PathBuf>,
    /// Continue from the step recorded in the summary instead of purging.
    pub resume: bool,
    /// Keep `<path>.json` in sync with the latest scalar values.
    pub summary: bool,
    /// Render `<path>_dvc_plots/index.html` on every step advance.
    pub html: bool,
    /// Invoke the checkpoint hook on every step advance.
    pub checkpoint: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            path: None,
            resume: false,
            summary: true,
            html: true,
            checkpoint: false,
        }
    }
}

impl LiveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_summary(mut self, summary: bool) -> Self {
        self.summary = summary;
        self
    }

    pub fn with_html(mut self, html: bool) -> Self {
        self.html = html;
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: bool) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    /// The effective root directory.
    pub fn dir(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(DEFAULT_DIR))
    }
}

/// A single scalar candidate: supports float, int, bool or string.
///
/// Only numeric variants are loggable as scalars; the others exist so that
/// a mistyped value surfaces as [`crate::LiveError::InvalidDataType`]
/// instead of a compile error deep inside a generic training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl MetricValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricValue::Float(_) => "float",
            MetricValue::Int(_) => "int",
            MetricValue::Bool(_) => "bool",
            MetricValue::Text(_) => "string",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Float(f) => Some(*f),
            MetricValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetricValue::Float(f) => serde_json::json!(f),
            MetricValue::Int(i) => serde_json::json!(i),
            MetricValue::Bool(b) => serde_json::json!(b),
            MetricValue::Text(s) => serde_json::json!(s),
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Debug keeps `1.0` distinct from the integer `1` in history files.
            MetricValue::Float(v) => write!(f, "{:?}", v),
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Bool(v) => write!(f, "{}", v),
            MetricValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}
impl From<f32> for MetricValue {
    fn from(v: f32) -> Self {
        MetricValue::Float(v as f64)
    }
}
impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}
impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Int(v as i64)
    }
}
impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Int(v as i64)
    }
}
impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Int(v as i64)
    }
}
impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Bool(v)
    }
}
impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}
impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

/// An image to log: either already decoded, or a raw interleaved 8-bit buffer.
#[derive(Debug, Clone)]
pub enum ImageValue {
    Decoded(DynamicImage),
    Pixels {
        width: u32,
        height: u32,
        /// 1 (luma), 3 (RGB) or 4 (RGBA).
        channels: u8,
        data: Vec<u8>,
    },
}

impl ImageValue {
    pub fn pixels(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Self {
        ImageValue::Pixels {
            width,
            height,
            channels,
            data,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ImageValue::Decoded(img) => format!("image {}x{}", img.width(), img.height()),
            ImageValue::Pixels {
                width,
                height,
                channels,
                data,
            } => format!(
                "pixel buffer of {} bytes for {}x{}x{}",
                data.len(),
                width,
                height,
                channels
            ),
        }
    }
}

impl From<DynamicImage> for ImageValue {
    fn from(v: DynamicImage) -> Self {
        ImageValue::Decoded(v)
    }
}
impl From<image::RgbImage> for ImageValue {
    fn from(v: image::RgbImage) -> Self {
        ImageValue::Decoded(DynamicImage::ImageRgb8(v))
    }
}
impl From<image::RgbaImage> for ImageValue {
    fn from(v: image::RgbaImage) -> Self {
        ImageValue::Decoded(DynamicImage::ImageRgba8(v))
    }
}
impl From<image::GrayImage> for ImageValue {
    fn from(v: image::GrayImage) -> Self {
        ImageValue::Decoded(DynamicImage::ImageLuma8(v))
    }
}

/// One side of a plot input (ground truth or predictions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Series {
    Numbers(Vec<f64>),
    Classes(Vec<String>),
}

impl Series {
    pub fn len(&self) -> usize {
        match self {
            Series::Numbers(v) => v.len(),
            Series::Classes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numbers(&self) -> Option<&[f64]> {
        match self {
            Series::Numbers(v) => Some(v),
            Series::Classes(_) => None,
        }
    }

    /// Every element rendered as a class label (`1.0` prints as `1`).
    pub fn labels(&self) -> Vec<String> {
        match self {
            Series::Numbers(v) => v.iter().map(|x| x.to_string()).collect(),
            Series::Classes(v) => v.clone(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Series::Numbers(_) => "numbers",
            Series::Classes(_) => "classes",
        }
    }
}

impl From<Vec<f64>> for Series {
    fn from(v: Vec<f64>) -> Self {
        Series::Numbers(v)
    }
}
impl From<&[f64]> for Series {
    fn from(v: &[f64]) -> Self {
        Series::Numbers(v.to_vec())
    }
}
impl From<Vec<f32>> for Series {
    fn from(v: Vec<f32>) -> Self {
        Series::Numbers(v.into_iter().map(f64::from).collect())
    }
}
impl From<Vec<i64>> for Series {
    fn from(v: Vec<i64>) -> Self {
        Series::Numbers(v.into_iter().map(|x| x as f64).collect())
    }
}
impl From<Vec<i32>> for Series {
    fn from(v: Vec<i32>) -> Self {
        Series::Numbers(v.into_iter().map(f64::from).collect())
    }
}
impl From<Vec<String>> for Series {
    fn from(v: Vec<String>) -> Self {
        Series::Classes(v)
    }
}
impl From<Vec<&str>> for Series {
    fn from(v: Vec<&str>) -> Self {
        Series::Classes(v.into_iter().map(str::to_string).collect())
    }
}

/// Rendering options forwarded to plot handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotOptions {
    /// Label treated as the positive class by `roc` and `precision_recall`.
    pub pos_label: f64,
    /// Drop ROC points that lie on a straight segment between their neighbours.
    pub drop_intermediate: bool,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            pos_label: 1.0,
            drop_intermediate: true,
        }
    }
}

impl PlotOptions {
    pub fn with_pos_label(mut self, pos_label: f64) -> Self {
        self.pos_label = pos_label;
        self
    }

    pub fn with_drop_intermediate(mut self, drop_intermediate: bool) -> Self {
        self.drop_intermediate = drop_intermediate;
        self
    }
}
