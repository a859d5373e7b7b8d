//! Static HTML report rebuilt from the run directory on every step.
//!
//! The report only reads what the handlers already wrote (summary, TSV
//! histories, images, plot JSON), so it can also be regenerated offline.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use serde_json::Value;
use tracing::debug;

use crate::error::{LiveError, Result};
use crate::images::{Image, SUFFIXES};
use crate::plots::{Plot, PlotKind};
use crate::scalars::Scalar;
use crate::storage;
use crate::summary;

/// Hook fired on every step advance while HTML output is enabled.
pub trait HtmlRenderer {
    fn render(&mut self) -> Result<()>;
}

impl<F> HtmlRenderer for F
where
    F: FnMut() -> Result<()>,
{
    fn render(&mut self) -> Result<()> {
        self()
    }
}

const CHART_SIZE: (u32, u32) = (480, 240);

/// Default renderer writing `index.html` next to the run directory.
#[derive(Debug, Clone)]
pub struct HtmlReport {
    root: PathBuf,
    summary_path: PathBuf,
    html_path: PathBuf,
}

impl HtmlReport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            summary_path: storage::with_suffix(&root, ".json"),
            html_path: storage::with_suffix(&root, "_dvc_plots/index.html"),
            root,
        }
    }

    pub fn html_path(&self) -> &Path {
        &self.html_path
    }

    /// Build the full document without writing it.
    pub fn build(&self) -> Result<String> {
        let mut body = String::new();
        self.summary_section(&mut body)?;
        self.scalars_section(&mut body)?;
        self.images_section(&mut body)?;
        self.plots_section(&mut body)?;

        let title = escape(&self.root.display().to_string());
        Ok(format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
             <style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n"
        ))
    }

    fn summary_section(&self, out: &mut String) -> Result<()> {
        let latest = summary::read_latest(&self.summary_path)?;
        let rows = summary::flatten(&latest);
        out.push_str("<section><h2>Summary</h2>\n");
        if rows.is_empty() {
            out.push_str("<p class=\"empty\">No metrics yet.</p>\n");
        } else {
            out.push_str("<table><tr><th>Metric</th><th>Value</th></tr>\n");
            for (name, value) in rows {
                let _ = writeln!(
                    out,
                    "<tr><td>{}</td><td>{}</td></tr>",
                    escape(&name),
                    escape(&value.to_string())
                );
            }
            out.push_str("</table>\n");
        }
        out.push_str("</section>\n");
        Ok(())
    }

    fn scalars_section(&self, out: &mut String) -> Result<()> {
        let files = storage::list_scalar_files(&self.root.join(Scalar::SUBFOLDER))?;
        if files.is_empty() {
            return Ok(());
        }
        out.push_str("<section><h2>Scalars</h2>\n");
        for (name, path) in files {
            let points: Vec<(f64, f64)> = storage::read_scalar_rows(&path)?
                .into_iter()
                .filter_map(|row| Some((row.step.unwrap_or(0) as f64, row.value.as_f64()?)))
                .collect();
            let _ = writeln!(
                out,
                "<figure><figcaption>{}</figcaption>{}</figure>",
                escape(&name),
                line_chart(&points)?
            );
        }
        out.push_str("</section>\n");
        Ok(())
    }

    fn images_section(&self, out: &mut String) -> Result<()> {
        let images_dir = self.root.join(Image::SUBFOLDER);
        let Some((step, dir)) = latest_image_dir(&images_dir)? else {
            return Ok(());
        };
        let mut files = vec![];
        collect_images(&dir, &dir, &mut files)?;
        if files.is_empty() {
            return Ok(());
        }
        files.sort();

        let root_name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let step_part = step.map(|s| format!("/{}", s)).unwrap_or_default();
        out.push_str("<section><h2>Images</h2>\n");
        for name in files {
            let src = format!("../{}/{}{}/{}", root_name, Image::SUBFOLDER, step_part, name);
            let _ = writeln!(
                out,
                "<figure><figcaption>{}</figcaption><img src=\"{}\" alt=\"{}\"></figure>",
                escape(&name),
                escape(&src),
                escape(&name)
            );
        }
        out.push_str("</section>\n");
        Ok(())
    }

    fn plots_section(&self, out: &mut String) -> Result<()> {
        let plots_dir = self.root.join(Plot::SUBFOLDER);
        let mut rendered = String::new();
        for kind in PlotKind::ALL {
            let path = plots_dir.join(format!("{}.json", kind.name()));
            if !path.exists() {
                continue;
            }
            let doc = storage::load_json(&path)?;
            let rows = doc
                .get(kind.name())
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let body = match kind {
                PlotKind::Roc => line_chart(&xy(&rows, "fpr", "tpr"))?,
                PlotKind::PrecisionRecall => line_chart(&xy(&rows, "recall", "precision"))?,
                PlotKind::ConfusionMatrix => confusion_table(&rows),
            };
            let _ = writeln!(
                rendered,
                "<figure><figcaption>{}</figcaption>{}</figure>",
                kind.name(),
                body
            );
        }
        if !rendered.is_empty() {
            out.push_str("<section><h2>Plots</h2>\n");
            out.push_str(&rendered);
            out.push_str("</section>\n");
        }
        Ok(())
    }
}

impl HtmlRenderer for HtmlReport {
    fn render(&mut self) -> Result<()> {
        let html = self.build()?;
        storage::ensure_parent(&self.html_path)?;
        fs::write(&self.html_path, html)?;
        debug!(path = %self.html_path.display(), "HTML report written");
        Ok(())
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse}td,th{border:1px solid #ccc;padding:4px 8px}\
figure{display:inline-block;margin:1em}svg{background:#fafafa;border:1px solid #ddd}\
.empty{color:#888}";

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn xy(rows: &[Value], x: &str, y: &str) -> Vec<(f64, f64)> {
    rows.iter()
        .filter_map(|row| Some((row.get(x)?.as_f64()?, row.get(y)?.as_f64()?)))
        .collect()
}

/// Inline SVG line chart over the data's bounding box.
fn line_chart(points: &[(f64, f64)]) -> Result<String> {
    let finite: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if finite.is_empty() {
        return Ok("<p class=\"empty\">No data.</p>".to_string());
    }
    let x_range = axis_range(finite.iter().map(|(x, _)| *x));
    let y_range = axis_range(finite.iter().map(|(_, y)| *y));

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(x_range, y_range)
            .map_err(chart_error)?;

        chart
            .configure_mesh()
            .x_labels(5)
            .y_labels(5)
            .draw()
            .map_err(chart_error)?;

        chart
            .draw_series(LineSeries::new(finite, &BLUE))
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}

/// Min..max of the values, widened around a single value.
fn axis_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
        (min.min(v), max.max(v))
    });
    if max > min {
        min..max
    } else {
        (min - 0.5)..(max + 0.5)
    }
}

fn chart_error(e: impl std::fmt::Display) -> LiveError {
    LiveError::Chart(e.to_string())
}

fn confusion_table(rows: &[Value]) -> String {
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut classes: Vec<String> = vec![];
    for row in rows {
        let (Some(actual), Some(predicted)) = (
            row.get("actual").and_then(Value::as_str),
            row.get("predicted").and_then(Value::as_str),
        ) else {
            continue;
        };
        for class in [actual, predicted] {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
        }
        *counts
            .entry((actual.to_string(), predicted.to_string()))
            .or_default() += 1;
    }
    classes.sort();

    let mut table = String::from("<table><tr><th>actual \\ predicted</th>");
    for class in &classes {
        let _ = write!(table, "<th>{}</th>", escape(class));
    }
    table.push_str("</tr>");
    for actual in &classes {
        let _ = write!(table, "<tr><th>{}</th>", escape(actual));
        for predicted in &classes {
            let n = counts
                .get(&(actual.clone(), predicted.clone()))
                .copied()
                .unwrap_or(0);
            let _ = write!(table, "<td>{}</td>", n);
        }
        table.push_str("</tr>");
    }
    table.push_str("</table>");
    table
}

/// Highest numbered step folder under `images/`, or the folder itself when
/// images were only logged before any step.
fn latest_image_dir(images_dir: &Path) -> Result<Option<(Option<u64>, PathBuf)>> {
    if !images_dir.is_dir() {
        return Ok(None);
    }
    let mut latest: Option<u64> = None;
    for entry in fs::read_dir(images_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(step) = entry.file_name().to_str().and_then(|n| n.parse::<u64>().ok()) {
            latest = Some(latest.map_or(step, |l| l.max(step)));
        }
    }
    Ok(Some(match latest {
        Some(step) => (Some(step), images_dir.join(step.to_string())),
        None => (None, images_dir.to_path_buf()),
    }))
}

fn collect_images(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            // Step folders are siblings, not nested image names.
            if root == dir && path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.parse::<u64>().is_ok()) {
                continue;
            }
            collect_images(root, &path, out)?;
        } else {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase)
                .unwrap_or_default();
            if SUFFIXES.contains(&ext.as_str()) {
                let rel = path.strip_prefix(root).unwrap_or(&path);
                let name = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(name);
            }
        }
    }
    Ok(())
}
