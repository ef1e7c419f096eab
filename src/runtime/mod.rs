//! Runtime Module
//!
//! Drives a table in real (or virtual) time. Unlike `core/` and `game/`,
//! this layer reads a clock and runs on tokio.
//!
//! ## Module Structure
//!
//! - `sink`: Render sink trait and implementations
//! - `driver`: Tick loop, command channel, event broadcast

pub mod driver;
pub mod sink;

pub use driver::{spawn_table, DriverError, TableClient, TableHandle};
pub use sink::{dispatch, NullSink, RenderSink, TracingSink};
