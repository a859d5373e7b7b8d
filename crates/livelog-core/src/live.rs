//! Live session: the heart of livelog.
//!
//! `Live` tracks the current step, owns one handler registry per data kind,
//! and keeps `<dir>.json` in step with the latest scalar values. Everything
//! runs synchronously on the caller's thread; there is one writer per run
//! directory.
//!
//! ## Step lifecycle
//!
//! A fresh session starts with no step. Values logged in that state belong
//! implicitly to step 0. The first `set_step` / `next_step` creates the run
//! directories, writes the summary, re-dumps every value logged so far at
//! step 0, fires the hooks and only then moves to the requested step.
//!
//! The summary is rewritten after every scalar `log`, using the step active at
//! that moment. A step advance does not rewrite it (except the very first one),
//! so right after `next_step()` the summary still shows the previous step until
//! the next scalar is logged.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::checkpoint::{Checkpointer, SignalFileCheckpoint};
use crate::data::{DataHandler, Registry, SUBFOLDERS};
use crate::env::{self, EnvSnapshot};
use crate::error::{LiveError, Result};
use crate::images::Image;
use crate::models::{ImageValue, LiveConfig, MetricValue, PlotOptions, Series};
use crate::plots::{Plot, PlotInput, PlotKind};
use crate::report::{HtmlRenderer, HtmlReport};
use crate::scalars::Scalar;
use crate::storage;
use crate::summary;

pub struct Live {
    config: LiveConfig,
    dir: PathBuf,
    summary_path: PathBuf,
    html_path: PathBuf,
    /// `None` until the first step advance of this run.
    step: Option<u64>,
    scalars: Registry<Scalar>,
    images: Registry<Image>,
    plots: Registry<Plot>,
    html_renderer: Box<dyn HtmlRenderer>,
    checkpointer: Box<dyn Checkpointer>,
}

impl std::fmt::Debug for Live {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Live")
            .field("config", &self.config)
            .field("step", &self.step)
            .field("scalars", &self.scalars.len())
            .field("images", &self.images.len())
            .field("plots", &self.plots.len())
            .finish_non_exhaustive()
    }
}

impl Live {
    /// Create a session, merging overrides from the process environment.
    pub fn new(config: LiveConfig) -> Result<Self> {
        Self::with_env(config, &EnvSnapshot::capture())
    }

    /// Create a session against an explicit environment snapshot.
    ///
    /// With `resume` the step recorded in the summary is picked up (advanced
    /// by one, since that step was already completed); otherwise every
    /// artifact of a previous run at the same path is removed first.
    pub fn with_env(config: LiveConfig, env: &EnvSnapshot) -> Result<Self> {
        let config = env::resolve(config, env)?;
        let dir = config.dir().to_path_buf();

        let mut live = Self {
            summary_path: storage::with_suffix(&dir, ".json"),
            html_path: storage::with_suffix(&dir, "_dvc_plots/index.html"),
            step: None,
            scalars: Registry::new(),
            images: Registry::new(),
            plots: Registry::new(),
            html_renderer: Box::new(HtmlReport::new(&dir)),
            checkpointer: Box::new(SignalFileCheckpoint::discover(env)),
            dir,
            config,
        };

        if live.config.resume {
            // A recorded step of 0 means the previous run never advanced.
            live.step = match live.read_step()? {
                0 => None,
                step => Some(step + 1),
            };
        } else {
            live.cleanup()?;
            live.init_paths()?;
        }

        info!(
            path = %live.dir.display(),
            resume = live.config.resume,
            step = live.get_step(),
            "Live session initialized"
        );
        Ok(live)
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn resume(&self) -> bool {
        self.config.resume
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    pub fn html_path(&self) -> &Path {
        &self.html_path
    }

    /// Current step, `0` before the first advance.
    pub fn get_step(&self) -> u64 {
        self.step.unwrap_or(0)
    }

    /// Current step, `None` before the first advance.
    pub fn step(&self) -> Option<u64> {
        self.step
    }

    pub fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.scalars.get(name)
    }

    pub fn image(&self, name: &str) -> Option<&Image> {
        self.images.get(name)
    }

    pub fn plot(&self, name: &str) -> Option<&Plot> {
        self.plots.get(name)
    }

    /// Replace the hook fired on each step advance while HTML is enabled.
    pub fn set_html_renderer(&mut self, renderer: impl HtmlRenderer + 'static) {
        self.html_renderer = Box::new(renderer);
    }

    /// Replace the hook fired on each step advance while checkpointing is enabled.
    pub fn set_checkpointer(&mut self, checkpointer: impl Checkpointer + 'static) {
        self.checkpointer = Box::new(checkpointer);
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    fn cleanup(&self) -> Result<()> {
        for subfolder in SUBFOLDERS {
            storage::remove_dir_if_exists(&self.dir.join(subfolder))?;
        }
        storage::remove_file_if_exists(&self.summary_path)?;
        if let Some(html_dir) = self.html_path.parent() {
            storage::remove_dir_if_exists(html_dir)?;
        }
        debug!(path = %self.dir.display(), "Previous run artifacts removed");
        Ok(())
    }

    fn init_paths(&self) -> Result<()> {
        if self.step.is_some() {
            storage::ensure_dir(&self.dir)?;
            if self.config.html {
                storage::ensure_parent(&self.html_path)?;
            }
        }
        if self.config.summary {
            self.make_summary()?;
        }
        Ok(())
    }

    /// Move to `step`. No ordering is enforced; callers may jump anywhere.
    pub fn set_step(&mut self, step: u64) -> Result<()> {
        if self.step.is_none() {
            self.step = Some(0);
            self.init_paths()?;
            self.scalars.redump_all(0)?;
            self.images.redump_all(0)?;
            self.plots.redump_all(0)?;
            if self.config.summary {
                self.make_summary()?;
            }
            debug!(path = %self.dir.display(), "Run initialized at step 0");
        }

        if self.config.html {
            self.html_renderer.render()?;
        }
        if self.config.checkpoint {
            self.checkpointer.checkpoint()?;
        }

        self.step = Some(step);
        Ok(())
    }

    pub fn next_step(&mut self) -> Result<()> {
        self.set_step(self.get_step() + 1)
    }

    // ─── Logging ─────────────────────────────────────────────────────────────

    /// Log a scalar, then refresh the summary if enabled.
    pub fn log(&mut self, name: &str, value: impl Into<MetricValue>) -> Result<()> {
        let value = value.into();
        if !Scalar::could_log(&value) {
            return Err(LiveError::invalid_data(name, value.type_name()));
        }
        check_name(name)?;

        let step = self.step;
        let dir = &self.dir;
        let scalar = self
            .scalars
            .get_or_insert_with(name, || Scalar::new(name, dir));
        scalar.dump(value, step)?;

        if self.config.summary {
            self.make_summary()?;
        }
        Ok(())
    }

    /// Log an image under `images/<step>/<name>`. `name` carries the file extension.
    pub fn log_image(&mut self, name: &str, value: impl Into<ImageValue>) -> Result<()> {
        let value = value.into();
        if !Image::could_log(name, &value) {
            return Err(LiveError::invalid_data(name, Image::describe(name, &value)));
        }
        check_name(name)?;

        let step = self.step;
        let dir = &self.dir;
        let image = self.images.get_or_insert_with(name, || Image::new(name, dir));
        image.dump(value, step)
    }

    /// Log a plot. `name` selects the plot kind (`roc`, `precision_recall`,
    /// `confusion_matrix`).
    pub fn log_plot(
        &mut self,
        name: &str,
        labels: impl Into<Series>,
        predictions: impl Into<Series>,
        options: PlotOptions,
    ) -> Result<()> {
        let kind = PlotKind::from_name(name)
            .ok_or_else(|| LiveError::InvalidPlotType(name.to_string()))?;
        let value = PlotInput::new(labels, predictions);
        if !kind.could_log(&value) {
            return Err(LiveError::invalid_data(name, value.describe()));
        }

        let step = self.step;
        let dir = &self.dir;
        let plot = self.plots.get_or_insert_with(name, || Plot::new(kind, dir));
        plot.dump_with(value, step, options)
    }

    // ─── Summary ─────────────────────────────────────────────────────────────

    /// Rewrite `<dir>.json` from the current step and every scalar's latest value.
    pub fn make_summary(&self) -> Result<()> {
        let views: Vec<Value> = self.scalars.iter().map(Scalar::summary).collect();
        let doc = summary::build(self.step, &views);
        summary::write_summary(&self.summary_path, &doc)
    }

    pub fn read_step(&self) -> Result<u64> {
        summary::read_step(&self.summary_path)
    }

    pub fn read_latest(&self) -> Result<Value> {
        summary::read_latest(&self.summary_path)
    }
}

/// A name made only of empty, `.` or `..` segments has no file to write to.
fn check_name(name: &str) -> Result<()> {
    if storage::join_name(Path::new(""), name).as_os_str().is_empty() {
        return Err(LiveError::invalid_data(name, "empty name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn live_in(tmp: &TempDir) -> Live {
        let config = LiveConfig::new()
            .with_path(tmp.path().join("run"))
            .with_html(false);
        Live::with_env(config, &EnvSnapshot::default()).unwrap()
    }

    #[test]
    fn fresh_session_has_no_step() {
        let tmp = TempDir::new().unwrap();
        let live = live_in(&tmp);
        assert_eq!(live.step(), None);
        assert_eq!(live.get_step(), 0);
        assert!(!live.exists());
    }

    #[test]
    fn first_advance_creates_dirs_and_redumps_at_zero() {
        let tmp = TempDir::new().unwrap();
        let mut live = live_in(&tmp);
        live.log("loss", 1.0).unwrap();
        assert_eq!(live.scalar("loss").unwrap().step(), None);

        live.next_step().unwrap();
        assert!(live.exists());
        assert_eq!(live.scalar("loss").unwrap().step(), Some(0));
        assert_eq!(live.step(), Some(1));
    }

    #[test]
    fn hooks_fire_on_every_advance_when_enabled() {
        let tmp = TempDir::new().unwrap();
        let config = LiveConfig::new()
            .with_path(tmp.path().join("run"))
            .with_checkpoint(true);
        let mut live = Live::with_env(config, &EnvSnapshot::default()).unwrap();

        let renders = Rc::new(Cell::new(0));
        let checkpoints = Rc::new(Cell::new(0));
        let r = renders.clone();
        live.set_html_renderer(move || -> Result<()> {
            r.set(r.get() + 1);
            Ok(())
        });
        let c = checkpoints.clone();
        live.set_checkpointer(move || -> Result<()> {
            c.set(c.get() + 1);
            Ok(())
        });

        live.next_step().unwrap();
        live.set_step(10).unwrap();
        assert_eq!(renders.get(), 2);
        assert_eq!(checkpoints.get(), 2);
        assert_eq!(live.get_step(), 10);
    }

    #[test]
    fn hooks_stay_quiet_when_disabled() {
        let tmp = TempDir::new().unwrap();
        let mut live = live_in(&tmp);
        live.set_html_renderer(|| -> Result<()> { panic!("html is disabled") });
        live.set_checkpointer(|| -> Result<()> { panic!("checkpoint is disabled") });
        live.next_step().unwrap();
    }

    #[test]
    fn hook_errors_propagate_and_leave_step_unchanged() {
        let tmp = TempDir::new().unwrap();
        let config = LiveConfig::new().with_path(tmp.path().join("run"));
        let mut live = Live::with_env(config, &EnvSnapshot::default()).unwrap();
        live.set_html_renderer(|| -> Result<()> {
            Err(std::io::Error::other("render failed").into())
        });

        assert!(live.set_step(4).is_err());
        assert_eq!(live.step(), Some(0));
    }

    #[test]
    fn set_step_accepts_any_order() {
        let tmp = TempDir::new().unwrap();
        let mut live = live_in(&tmp);
        live.set_step(5).unwrap();
        live.set_step(2).unwrap();
        assert_eq!(live.get_step(), 2);
    }
}
