//! # Deinterlace Pipeline
//!
//! Per-track pipelines and per-movie orchestration.
//!
//! A movie is processed as a set of concurrent track pipelines feeding one
//! writer. Interlaced video tracks are split into progressive field pairs
//! at doubled frame rate; ProRes and non-video tracks are copied. The
//! orchestrator owns the pipelines, joins on their completion, and settles
//! the movie's shared status.
//!
//! Each pipeline pumps on its own thread, gated by the writer's
//! back-pressure; ordering within a track is strict presentation order,
//! and the writer multiplexes across tracks by timestamp.

pub mod error;
pub mod join;
pub mod movie;
pub mod status;
pub mod track;

pub use error::{PipelineError, Result};
pub use join::JoinGroup;
pub use movie::{MovieOrchestrator, MOVIE_TIME_SCALE};
pub use status::{MovieStatus, ProgressCell};
pub use track::{TrackMode, TrackOutcome, TrackPipeline};
