//! Movie reader and writer contracts.
//!
//! The container demuxer/muxer and codec stack live behind these traits.
//! Readers hand each track's samples out in presentation order, decoded to
//! pixel buffers for video the caller will reprocess; writers accept
//! samples or pixel buffers per track, multiplex by presentation time, and
//! apply back-pressure through `is_ready_for_more`/`wait_ready`.

use crate::descriptor::{TrackDescriptor, TrackKind};
use crate::error::{MediaError, Result};
use deinterlace_core::{PixelBuffer, Rational, Sample, SharedPixelBufferPool, Timestamp};
use std::path::Path;
use std::sync::Arc;

/// One unit read from a track.
#[derive(Debug, Clone)]
pub enum TrackSample {
    /// A decoded video frame with its presentation time.
    Frame {
        /// The decoded pixels.
        buffer: PixelBuffer,
        /// Presentation timestamp of the frame.
        pts: Timestamp,
    },
    /// An opaque payload passed through without reinterpretation.
    Data(Sample),
}

impl TrackSample {
    /// Presentation timestamp of this sample.
    pub fn pts(&self) -> Timestamp {
        match self {
            TrackSample::Frame { pts, .. } => *pts,
            TrackSample::Data(sample) => sample.pts,
        }
    }
}

/// Per-track sample source.
pub trait TrackReader: Send {
    /// The descriptor of the track being read.
    fn descriptor(&self) -> &TrackDescriptor;

    /// Read the next sample in presentation order.
    ///
    /// Returns `Ok(None)` once the track is drained.
    fn next_sample(&mut self) -> Result<Option<TrackSample>>;
}

/// A movie opened for reading.
pub trait MovieReader: Send {
    /// Descriptors for every track in the movie.
    fn tracks(&self) -> &[TrackDescriptor];

    /// Open an independent reader for one track.
    ///
    /// Each track is pumped from its own thread, so the returned reader
    /// owns everything it needs.
    fn open_track(&mut self, index: usize) -> Result<Box<dyn TrackReader>>;

    /// Stop producing samples; subsequent reads may return end-of-track.
    fn cancel_reading(&mut self) {}
}

/// Output treatment for one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEncoding {
    /// Re-encode appended pixel buffers as ProRes 422.
    ProRes422,
    /// Copy appended samples verbatim.
    PassThrough,
}

/// Everything a writer needs to configure one output track.
#[derive(Debug, Clone)]
pub struct TrackSettings {
    /// Media kind of the track.
    pub kind: TrackKind,
    /// Output treatment.
    pub encoding: TrackEncoding,
    /// Video dimensions, for video tracks.
    pub dimensions: Option<(u32, u32)>,
    /// Output nominal frame rate, for video tracks.
    pub frame_rate: Option<Rational>,
    /// The track's timescale in the output movie.
    pub time_scale: i64,
}

/// Per-track sink inside a writing session.
pub trait TrackWriter: Send {
    /// Whether the track can accept more data right now.
    fn is_ready_for_more(&self) -> bool;

    /// Block until the track can accept more data.
    ///
    /// Returns an error if the writing session failed or was cancelled.
    fn wait_ready(&self) -> Result<()>;

    /// Append an opaque sample verbatim.
    fn append_sample(&mut self, sample: Sample) -> Result<()>;

    /// Append a decoded frame at the given presentation time.
    fn append_frame(&mut self, frame: PixelBuffer, pts: Timestamp) -> Result<()>;

    /// Signal that no more data will be appended to this track.
    fn mark_finished(&mut self);

    /// The writer's own pixel buffer pool for this track, if it has one.
    ///
    /// Some writers only surface their pool after the session starts, and
    /// some never do; callers fall back to a pool of their own making.
    fn pixel_buffer_pool(&self) -> Option<SharedPixelBufferPool> {
        None
    }
}

/// A movie opened for writing.
pub trait MovieWriter: Send {
    /// Add an output track before the session starts.
    fn add_track(&mut self, settings: TrackSettings) -> Result<Box<dyn TrackWriter>>;

    /// Set the movie timescale.
    ///
    /// Must be large enough to express every track's natural timescale
    /// without loss.
    fn set_movie_time_scale(&mut self, time_scale: i64);

    /// Begin the writing session.
    fn start_writing(&mut self) -> Result<()>;

    /// Start the session timeline at the given source time.
    fn start_session(&mut self, at: Timestamp) -> Result<()>;

    /// Flush everything and finalize the output; blocks until done.
    fn finish_writing(&mut self) -> Result<()>;

    /// Abandon the session and discard pending output.
    fn cancel_writing(&mut self) -> Result<()>;
}

/// A container backend: opens movies for reading and creates them for
/// writing, keyed by file extension.
pub trait MovieIo: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Whether this backend handles the given (lowercase) extension.
    fn handles_extension(&self, extension: &str) -> bool;

    /// The extension this backend writes.
    fn output_extension(&self) -> &str;

    /// Open an existing movie for reading.
    fn open(&self, path: &Path) -> Result<Box<dyn MovieReader>>;

    /// Create a movie for writing, replacing any existing file.
    fn create(&self, path: &Path) -> Result<Box<dyn MovieWriter>>;
}

/// Registry of container backends.
#[derive(Clone, Default)]
pub struct MovieIoRegistry {
    providers: Vec<Arc<dyn MovieIo>>,
}

impl MovieIoRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled backends registered.
    pub fn bundled() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::y4m::Y4mIo));
        registry
    }

    /// Register a backend.
    pub fn register(&mut self, provider: Arc<dyn MovieIo>) {
        self.providers.push(provider);
    }

    /// Whether any backend claims the given extension.
    pub fn handles_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.providers.iter().any(|p| p.handles_extension(&extension))
    }

    /// Find the backend for a path, by extension.
    pub fn for_path(&self, path: &Path) -> Result<Arc<dyn MovieIo>> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        self.providers
            .iter()
            .find(|p| p.handles_extension(&extension))
            .cloned()
            .ok_or(MediaError::UnsupportedContainer { extension })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolution() {
        let registry = MovieIoRegistry::bundled();
        assert!(registry.for_path(Path::new("/clips/tape_01.y4m")).is_ok());
        assert!(registry.for_path(Path::new("/clips/TAPE_02.Y4M")).is_ok());

        let result = registry.for_path(Path::new("/clips/tape_03.mov"));
        assert!(matches!(result, Err(MediaError::UnsupportedContainer { .. })));
    }

    #[test]
    fn test_track_sample_pts() {
        use deinterlace_core::{TimeBase, Timestamp};
        let sample = TrackSample::Data(Sample::new(
            vec![0u8; 4],
            Timestamp::new(42, TimeBase::MOVIE),
        ));
        assert_eq!(sample.pts().value, 42);
    }
}
