//! ncseries - multi-file series over netCDF-style gridded arrays
//!
//! Reads an ordered list of self-describing array files that share one schema as a single
//! dataset that grows along the growable (unlimited) dimension, and provides in-memory
//! slabs for cheap repeated slicing of data already read.
//!
//! # Features
//!
//! - Row-major coordinate arithmetic and sub-region copies over in-memory slabs
//! - Prefix-sum partitioning of growable-axis ranges into per-file fragments
//! - Ordered reassembly of per-file reads, aborting on the first failure
//! - Atomic rebuilds when the file list or a file's contents change
//! - Pluggable single-file engines (implement [`ArrayEngine`]), with in-memory and
//!   snapshot-file engines included
//!
//! # Example
//!
//! ```rust,ignore
//! use ncseries::{SeriesHandle, SeriesOptions, SnapshotEngine};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let series = SeriesHandle::open(
//!     Arc::new(SnapshotEngine::new()),
//!     ["/data/run-2001.ncs", "/data/run-2002.ncs"],
//!     SeriesOptions::default(),
//! )
//! .await?;
//!
//! let tas = series.variable("tas").ok_or("no tas variable")?;
//! let first_week = tas.read_slab(&[0, 0, 0], &[7, 90, 180]).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod dimension;
pub mod document;
pub mod engine;
pub mod error;
pub mod memory;
pub mod series;
pub mod slab;
pub mod snapshot;
pub mod types;
pub mod utils;
pub mod variable;

// Re-exports
pub use codec::Codec;
pub use config::{CompatibilityMode, SeriesOptions};
pub use dimension::{Fragment, SeriesDimension};
pub use document::SeriesDocument;
pub use engine::{ArrayEngine, DataFile, FileHandle, FileSchema, Location};
pub use error::{NcError, Result};
pub use memory::{MemoryEngine, MemoryFile};
pub use series::SeriesHandle;
pub use slab::Slab;
pub use snapshot::SnapshotEngine;
pub use types::{Attribute, AttributeValues, DataType, Dimension, Element, Value, VariableSchema};
pub use variable::SeriesVariable;

/// Version of the ncseries crate
pub const NCSERIES_VERSION: &str = env!("CARGO_PKG_VERSION");
