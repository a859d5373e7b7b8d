//! livelog: lightweight experiment logging.
//!
//! ```no_run
//! use livelog::{Live, LiveConfig};
//!
//! let mut live = Live::new(LiveConfig::new().with_path("run1"))?;
//! for epoch in 0..3 {
//!     live.log("loss", 1.0 / (epoch + 1) as f64)?;
//!     live.next_step()?;
//! }
//! # Ok::<(), livelog::LiveError>(())
//! ```

pub use livelog_core::*;
