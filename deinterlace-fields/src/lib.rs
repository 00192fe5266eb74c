//! # Deinterlace Fields
//!
//! Field separation and vertical interpolation for interlaced video.
//!
//! An interlaced frame carries two temporally distinct half-resolution
//! fields woven into alternating lines. This crate turns one such frame
//! into two full-height progressive frames, one per field, doubling the
//! frame rate of the material.
//!
//! The reconstruction is purely spatial and single-frame: kept lines are
//! copied, missing lines are the truncated average of their vertical
//! neighbors. That keeps the kernel stateless and cheap enough to run at
//! field rate inside every video track pipeline.
//!
//! ```no_run
//! use deinterlace_core::{PixelBuffer, PixelFormat, SharedPixelBufferPool};
//! use deinterlace_fields::{FieldOrder, FieldSeparator};
//!
//! let pool = SharedPixelBufferPool::new(720, 480, PixelFormat::Uyvy422, 6)?;
//! let separator = FieldSeparator::new(pool, FieldOrder::TopFieldFirst);
//!
//! let frame = PixelBuffer::new(720, 480, PixelFormat::Uyvy422);
//! let (earlier, later) = separator.make_progressive_pair(&frame)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod separate;

pub use error::{FieldsError, Result};
pub use separate::{FieldOrder, FieldSeparator};
