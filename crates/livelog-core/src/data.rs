//! Typed data handlers and the per-kind registry that owns them.
//!
//! Each kind (scalar, image, plot) persists into its own subfolder of the
//! run directory. A handler is created the first time a name is logged and
//! then reused for the rest of the session, so it can keep its own file state.

use std::collections::HashMap;

use crate::error::Result;
use crate::images::Image;
use crate::plots::Plot;
use crate::scalars::Scalar;

/// Subfolders owned by the data kinds, purged on a clean start.
pub const SUBFOLDERS: [&str; 3] = [Scalar::SUBFOLDER, Image::SUBFOLDER, Plot::SUBFOLDER];

/// Capability shared by every data kind.
///
/// Validation lives on the concrete types (`Scalar::could_log`, ...) because
/// what is acceptable depends on the kind and, for plots, on the plot name.
pub trait DataHandler {
    type Value;

    /// Metric name, `/`-separated for nested metrics.
    fn name(&self) -> &str;

    /// Persist `value` for `step`. Re-dumping the same step overwrites it.
    fn dump(&mut self, value: Self::Value, step: Option<u64>) -> Result<()>;

    /// Persist the last dumped value again under `step`. No-op if nothing was dumped.
    fn redump(&mut self, step: u64) -> Result<()>;
}

/// Insertion-ordered map from metric name to handler.
#[derive(Debug)]
pub struct Registry<H> {
    handlers: Vec<H>,
    index: HashMap<String, usize>,
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<H: DataHandler> Registry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handler registered under `name`, creating it with `make` first if needed.
    pub fn get_or_insert_with(&mut self, name: &str, make: impl FnOnce() -> H) -> &mut H {
        let idx = match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                self.handlers.push(make());
                let idx = self.handlers.len() - 1;
                self.index.insert(name.to_string(), idx);
                idx
            }
        };
        &mut self.handlers[idx]
    }

    pub fn get(&self, name: &str) -> Option<&H> {
        self.index.get(name).map(|&idx| &self.handlers[idx])
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &H> {
        self.handlers.iter()
    }

    /// Re-dump every registered handler at `step`.
    pub fn redump_all(&mut self, step: u64) -> Result<()> {
        for handler in self.handlers.iter_mut() {
            handler.redump(step)?;
        }
        Ok(())
    }
}
