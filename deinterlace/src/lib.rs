//! # Deinterlace
//!
//! Batch deinterlacer: give it a directory, and every interlaced movie
//! beneath it becomes a progressive copy at doubled frame rate, with all
//! other tracks preserved. Movies are processed in parallel under a
//! bounded admission limit with aggregate progress and cooperative
//! cancellation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deinterlace::{scan_inputs, Batch, BatchConfig, MovieIoRegistry};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! fn main() -> deinterlace::Result<()> {
//!     let registry = Arc::new(MovieIoRegistry::bundled());
//!     let movies = scan_inputs(Path::new("tapes/"), None, &registry)?;
//!
//!     let mut batch = Batch::new(movies, registry, BatchConfig::default());
//!     let report = batch.run(|progress| {
//!         println!("{:.0}%", progress.progress * 100.0);
//!     });
//!     println!("{}/{} succeeded", report.succeeded, report.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several crates:
//! - `deinterlace-core`: pixel buffers, pools, rational timestamps
//! - `deinterlace-fields`: the field separation kernel
//! - `deinterlace-media`: reader/writer contracts and container backends
//! - `deinterlace-pipeline`: per-track pipelines and movie orchestration
//!
//! This crate adds input scanning and the batch scheduler, and re-exports
//! the commonly used types.

pub mod error;
pub mod scan;
pub mod scheduler;

pub use error::{BatchError, Result};
pub use scan::{default_output_root, is_movie_path, scan_inputs, ScannedMovie, MOVIE_EXTENSIONS};
pub use scheduler::{
    default_concurrency, Batch, BatchConfig, BatchProgress, BatchReport, MovieJob,
};

// Re-export the layers callers typically touch alongside the scheduler.
pub use deinterlace_core::{PixelBuffer, PixelFormat, Rational, TimeBase, Timestamp};
pub use deinterlace_media::{MovieIo, MovieIoRegistry};
pub use deinterlace_pipeline::{MovieOrchestrator, MovieStatus, TrackMode};
