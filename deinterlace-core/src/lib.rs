//! # Deinterlace Core
//!
//! Core types for the deinterlace batch tool.
//!
//! This crate provides the building blocks shared by every component:
//! - Error handling types
//! - Rational numbers and timestamp management
//! - Pixel buffer abstractions for interleaved 4:2:2 video
//! - Opaque sample payloads for pass-through tracks
//! - Pixel buffer pool implementations

pub mod error;
pub mod pixel;
pub mod pool;
pub mod rational;
pub mod sample;
pub mod timestamp;

pub use error::{CoreError, Result};
pub use pixel::{PixelBuffer, PixelFormat};
pub use pool::{PixelBufferPool, SharedPixelBufferPool};
pub use rational::Rational;
pub use sample::Sample;
pub use timestamp::{Duration, TimeBase, Timestamp};
