//! Scalar handler: one TSV history per metric plus a latest-value view.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};

use crate::data::DataHandler;
use crate::error::Result;
use crate::models::MetricValue;
use crate::storage::{self, ScalarRow};

#[derive(Debug)]
pub struct Scalar {
    name: String,
    output_path: PathBuf,
    val: Option<MetricValue>,
    step: Option<u64>,
    /// History as on disk; loaded on first dump so resumed runs keep prior rows.
    rows: Option<Vec<ScalarRow>>,
}

impl Scalar {
    pub const SUBFOLDER: &'static str = "scalars";

    pub fn new(name: &str, root: &Path) -> Self {
        let mut output_path = storage::join_name(&root.join(Self::SUBFOLDER), name);
        let mut file_name = output_path.file_name().unwrap_or_default().to_os_string();
        file_name.push(".tsv");
        output_path.set_file_name(file_name);
        Self {
            name: name.to_string(),
            output_path,
            val: None,
            step: None,
            rows: None,
        }
    }

    /// Ints and floats only.
    pub fn could_log(value: &MetricValue) -> bool {
        matches!(value, MetricValue::Float(_) | MetricValue::Int(_))
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn latest(&self) -> Option<&MetricValue> {
        self.val.as_ref()
    }

    pub fn step(&self) -> Option<u64> {
        self.step
    }

    /// Latest value nested by the `/` segments of the name:
    /// `train/loss = 0.5` becomes `{"train": {"loss": 0.5}}`.
    pub fn summary(&self) -> Value {
        let Some(val) = &self.val else {
            return Value::Object(Map::new());
        };
        let mut parts: Vec<&str> = self.name.split('/').filter(|p| !p.is_empty()).collect();
        let leaf = parts.pop().unwrap_or(self.name.as_str());
        let mut node = Map::new();
        node.insert(leaf.to_string(), val.to_json());
        for part in parts.into_iter().rev() {
            let mut parent = Map::new();
            parent.insert(part.to_string(), Value::Object(node));
            node = parent;
        }
        Value::Object(node)
    }

    fn append_row(&self, row: &ScalarRow) -> Result<()> {
        storage::ensure_parent(&self.output_path)?;
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)?;
        let step = row.step.map(|s| s.to_string()).unwrap_or_default();
        writeln!(f, "{}\t{}\t{}", row.timestamp, step, row.value)?;
        Ok(())
    }
}

/// Rows logged before any step was set belong to step 0.
fn same_step(a: Option<u64>, b: Option<u64>) -> bool {
    a.unwrap_or(0) == b.unwrap_or(0)
}

impl DataHandler for Scalar {
    type Value = MetricValue;

    fn name(&self) -> &str {
        &self.name
    }

    fn dump(&mut self, value: MetricValue, step: Option<u64>) -> Result<()> {
        let row = ScalarRow {
            timestamp: Utc::now().timestamp_millis(),
            step,
            value: value.clone(),
        };

        let mut rows = match self.rows.take() {
            Some(rows) => rows,
            None => storage::read_scalar_rows(&self.output_path)?,
        };
        let fresh_file = !self.output_path.exists();
        let before = rows.len();
        rows.retain(|r| !same_step(r.step, step));
        let replaced = rows.len() != before;
        rows.push(row.clone());

        let result = if fresh_file || replaced {
            storage::write_scalar_rows(&self.output_path, &self.name, &rows)
        } else {
            self.append_row(&row)
        };
        self.rows = Some(rows);
        result?;

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
