//! livelog-core: step lifecycle, typed data handlers and summary writer for livelog.
//!
//! The central object is [`Live`]: callers log scalars, images and plots
//! during a training loop and advance the step; the session persists one
//! history per metric under the run directory and keeps `<dir>.json` holding
//! the latest value of every scalar.

pub mod checkpoint;
pub mod data;
pub mod env;
pub mod error;
pub mod images;
pub mod live;
pub mod models;
pub mod plots;
pub mod report;
pub mod scalars;
pub mod storage;
pub mod summary;

pub use checkpoint::{Checkpointer, SignalFileCheckpoint};
pub use data::DataHandler;
pub use env::EnvSnapshot;
pub use error::{LiveError, Result};
pub use live::Live;
pub use models::{ImageValue, LiveConfig, MetricValue, PlotOptions, Series, DEFAULT_DIR};
pub use plots::{PlotInput, PlotKind};
pub use report::{HtmlRenderer, HtmlReport};
