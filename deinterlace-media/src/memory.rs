//! In-memory movie container.
//!
//! A complete implementation of the reader/writer contracts over plain
//! vectors: movies are built in memory, written movies land in an
//! inspectable sink. This is the reference implementation of the traits
//! and the fixture every crate's tests share. Fault injection hooks allow
//! reader and writer failures to be staged deterministically.

use crate::descriptor::TrackDescriptor;
use crate::error::{MediaError, Result};
use crate::traits::{
    MovieIo, MovieReader, MovieWriter, TrackReader, TrackSample, TrackSettings, TrackWriter,
};
use deinterlace_core::{PixelBuffer, PixelFormat, Sample, SharedPixelBufferPool, Timestamp};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// One track of an in-memory movie.
#[derive(Clone)]
pub struct MemoryTrack {
    /// The track's descriptor.
    pub descriptor: TrackDescriptor,
    /// Samples in presentation order.
    pub samples: Vec<TrackSample>,
    /// Fail the read of sample N instead of returning it.
    pub fail_after: Option<usize>,
}

impl MemoryTrack {
    /// Create a track with the given samples.
    pub fn new(descriptor: TrackDescriptor, samples: Vec<TrackSample>) -> Self {
        Self {
            descriptor,
            samples,
            fail_after: None,
        }
    }

    /// Inject a read failure at sample index `n`.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

/// An in-memory movie: a set of tracks with their samples.
#[derive(Clone, Default)]
pub struct MemoryMovie {
    tracks: Vec<MemoryTrack>,
}

impl MemoryMovie {
    /// Create an empty movie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track.
    pub fn push_track(&mut self, track: MemoryTrack) -> &mut Self {
        self.tracks.push(track);
        self
    }

    /// Open the movie for reading.
    pub fn into_reader(self) -> MemoryMovieReader {
        let descriptors = self.tracks.iter().map(|t| t.descriptor.clone()).collect();
        MemoryMovieReader {
            descriptors,
            tracks: self.tracks.into_iter().map(Arc::new).collect(),
        }
    }
}

/// Reader over an in-memory movie.
pub struct MemoryMovieReader {
    descriptors: Vec<TrackDescriptor>,
    tracks: Vec<Arc<MemoryTrack>>,
}

impl MovieReader for MemoryMovieReader {
    fn tracks(&self) -> &[TrackDescriptor] {
        &self.descriptors
    }

    fn open_track(&mut self, index: usize) -> Result<Box<dyn TrackReader>> {
        let track = self
            .tracks
            .get(index)
            .cloned()
            .ok_or(MediaError::TrackNotFound(index))?;
        Ok(Box::new(MemoryTrackReader { track, cursor: 0 }))
    }
}

struct MemoryTrackReader {
    track: Arc<MemoryTrack>,
    cursor: usize,
}

impl TrackReader for MemoryTrackReader {
    fn descriptor(&self) -> &TrackDescriptor {
        &self.track.descriptor
    }

    fn next_sample(&mut self) -> Result<Option<TrackSample>> {
        if self.track.fail_after == Some(self.cursor) {
            return Err(MediaError::invalid_data("staged read failure"));
        }
        let sample = self.track.samples.get(self.cursor).cloned();
        if sample.is_some() {
            self.cursor += 1;
        }
        Ok(sample)
    }
}

/// One output appended to a written track.
#[derive(Clone)]
pub enum WrittenSample {
    /// A pixel frame with its presentation time.
    Frame {
        /// The appended pixels.
        buffer: PixelBuffer,
        /// Presentation timestamp.
        pts: Timestamp,
    },
    /// An opaque payload.
    Data(Sample),
}

impl WrittenSample {
    /// Presentation timestamp of this output.
    pub fn pts(&self) -> Timestamp {
        match self {
            WrittenSample::Frame { pts, .. } => *pts,
            WrittenSample::Data(sample) => sample.pts,
        }
    }
}

/// A track accumulated by the memory writer.
#[derive(Clone)]
pub struct WrittenTrack {
    /// The settings the track was added with.
    pub settings: TrackSettings,
    /// Everything appended, in append order.
    pub content: Vec<WrittenSample>,
    /// Whether the track was marked finished.
    pub finished: bool,
    fail_after: Option<usize>,
}

struct SinkState {
    started: bool,
    session_at: Option<Timestamp>,
    finished: bool,
    cancelled: bool,
    movie_time_scale: i64,
    tracks: Vec<WrittenTrack>,
}

/// Inspectable handle onto everything a memory writer produced.
#[derive(Clone)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

impl MemorySink {
    /// Whether `finish_writing` completed.
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Whether the session was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// The source time the session was started at, if any.
    pub fn session_start(&self) -> Option<Timestamp> {
        self.state.lock().session_at
    }

    /// The movie timescale that was set.
    pub fn movie_time_scale(&self) -> i64 {
        self.state.lock().movie_time_scale
    }

    /// Number of output tracks.
    pub fn track_count(&self) -> usize {
        self.state.lock().tracks.len()
    }

    /// Snapshot of one written track.
    pub fn track(&self, index: usize) -> WrittenTrack {
        self.state.lock().tracks[index].clone()
    }

    /// Presentation timestamps appended to one track, in append order.
    pub fn pts_of(&self, index: usize) -> Vec<Timestamp> {
        self.state.lock().tracks[index]
            .content
            .iter()
            .map(|s| s.pts())
            .collect()
    }
}

/// Writer accumulating a movie in memory.
pub struct MemoryMovieWriter {
    state: Arc<Mutex<SinkState>>,
    provide_pools: bool,
    throttle: Option<StdDuration>,
}

impl Default for MemoryMovieWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMovieWriter {
    /// Create a writer; it provides per-track pixel buffer pools.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                started: false,
                session_at: None,
                finished: false,
                cancelled: false,
                movie_time_scale: 0,
                tracks: Vec::new(),
            })),
            provide_pools: true,
            throttle: None,
        }
    }

    /// Create a writer that exposes no pixel buffer pool, forcing callers
    /// onto their fallback pools.
    pub fn without_pools() -> Self {
        Self {
            provide_pools: false,
            ..Self::new()
        }
    }

    /// Sleep this long inside every append, to hold movies in flight while
    /// a test cancels them.
    pub fn with_throttle(mut self, throttle: StdDuration) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Fail the Nth append on the given track.
    pub fn inject_append_failure(&self, track: usize, after: usize) {
        self.state.lock().tracks[track].fail_after = Some(after);
    }

    /// Handle for inspecting the written output.
    pub fn sink(&self) -> MemorySink {
        MemorySink {
            state: Arc::clone(&self.state),
        }
    }
}

impl MovieWriter for MemoryMovieWriter {
    fn add_track(&mut self, settings: TrackSettings) -> Result<Box<dyn TrackWriter>> {
        let mut state = self.state.lock();
        if state.started {
            return Err(MediaError::writer_state(
                "cannot add tracks after start_writing",
            ));
        }
        let index = state.tracks.len();
        let pool = if self.provide_pools {
            settings
                .dimensions
                .map(|(w, h)| SharedPixelBufferPool::new(w, h, PixelFormat::Uyvy422, 6))
                .transpose()?
        } else {
            None
        };
        state.tracks.push(WrittenTrack {
            settings,
            content: Vec::new(),
            finished: false,
            fail_after: None,
        });
        Ok(Box::new(MemoryTrackWriter {
            state: Arc::clone(&self.state),
            index,
            pool,
            throttle: self.throttle,
        }))
    }

    fn set_movie_time_scale(&mut self, time_scale: i64) {
        self.state.lock().movie_time_scale = time_scale;
    }

    fn start_writing(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.started {
            return Err(MediaError::writer_state("start_writing called twice"));
        }
        state.started = true;
        Ok(())
    }

    fn start_session(&mut self, at: Timestamp) -> Result<()> {
        let mut state = self.state.lock();
        if !state.started {
            return Err(MediaError::writer_state("session before start_writing"));
        }
        state.session_at = Some(at);
        Ok(())
    }

    fn finish_writing(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.cancelled {
            return Err(MediaError::WriterCancelled);
        }
        if !state.started {
            return Err(MediaError::writer_state("finish before start_writing"));
        }
        state.finished = true;
        Ok(())
    }

    fn cancel_writing(&mut self) -> Result<()> {
        self.state.lock().cancelled = true;
        Ok(())
    }
}

struct MemoryTrackWriter {
    state: Arc<Mutex<SinkState>>,
    index: usize,
    pool: Option<SharedPixelBufferPool>,
    throttle: Option<StdDuration>,
}

impl MemoryTrackWriter {
    fn append(&mut self, sample: WrittenSample) -> Result<()> {
        if let Some(pause) = self.throttle {
            std::thread::sleep(pause);
        }
        let mut state = self.state.lock();
        if state.cancelled {
            return Err(MediaError::WriterCancelled);
        }
        if !state.started {
            return Err(MediaError::writer_state("append before start_writing"));
        }
        let track = &mut state.tracks[self.index];
        if track.finished {
            return Err(MediaError::writer_state("append after mark_finished"));
        }
        if track.fail_after == Some(track.content.len()) {
            return Err(MediaError::writer_state("staged append failure"));
        }
        // The writer multiplexes by presentation time; within a track the
        // appends themselves must already be monotonic.
        if let Some(last) = track.content.last() {
            if sample.pts() <= last.pts() {
                return Err(MediaError::writer_state(format!(
                    "non-monotonic append: {} after {}",
                    sample.pts(),
                    last.pts()
                )));
            }
        }
        track.content.push(sample);
        Ok(())
    }
}

impl TrackWriter for MemoryTrackWriter {
    fn is_ready_for_more(&self) -> bool {
        let state = self.state.lock();
        !state.cancelled && !state.tracks[self.index].finished
    }

    fn wait_ready(&self) -> Result<()> {
        if self.state.lock().cancelled {
            return Err(MediaError::WriterCancelled);
        }
        Ok(())
    }

    fn append_sample(&mut self, sample: Sample) -> Result<()> {
        self.append(WrittenSample::Data(sample))
    }

    fn append_frame(&mut self, frame: PixelBuffer, pts: Timestamp) -> Result<()> {
        self.append(WrittenSample::Frame { buffer: frame, pts })
    }

    fn mark_finished(&mut self) {
        let mut state = self.state.lock();
        state.tracks[self.index].finished = true;
    }

    fn pixel_buffer_pool(&self) -> Option<SharedPixelBufferPool> {
        self.pool.clone()
    }
}

/// A `MovieIo` backend over in-memory movies keyed by path.
///
/// Reads resolve against movies staged with [`MemoryIo::stage`]; writes
/// record their sink under the output path. Lets the orchestrator and
/// scheduler run end-to-end without container files.
pub struct MemoryIo {
    movies: Mutex<HashMap<PathBuf, MemoryMovie>>,
    sinks: Mutex<HashMap<PathBuf, MemorySink>>,
    extension: String,
    throttle: Option<StdDuration>,
}

impl MemoryIo {
    /// Create a backend claiming the given extension.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            movies: Mutex::new(HashMap::new()),
            sinks: Mutex::new(HashMap::new()),
            extension: extension.into().to_ascii_lowercase(),
            throttle: None,
        }
    }

    /// Throttle every writer this backend creates.
    pub fn with_throttle(mut self, throttle: StdDuration) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Stage a movie under a path.
    pub fn stage(&self, path: impl Into<PathBuf>, movie: MemoryMovie) {
        self.movies.lock().insert(path.into(), movie);
    }

    /// The sink recorded for an output path, if a writer was created.
    pub fn sink_for(&self, path: &Path) -> Option<MemorySink> {
        self.sinks.lock().get(path).cloned()
    }
}

impl MovieIo for MemoryIo {
    fn name(&self) -> &str {
        "memory"
    }

    fn handles_extension(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case(&self.extension)
    }

    fn output_extension(&self) -> &str {
        &self.extension
    }

    fn open(&self, path: &Path) -> Result<Box<dyn MovieReader>> {
        let movie = self
            .movies
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| MediaError::invalid_data(format!("no staged movie at {}", path.display())))?;
        Ok(Box::new(movie.into_reader()))
    }

    fn create(&self, path: &Path) -> Result<Box<dyn MovieWriter>> {
        let mut writer = MemoryMovieWriter::new();
        if let Some(throttle) = self.throttle {
            writer = writer.with_throttle(throttle);
        }
        self.sinks
            .lock()
            .insert(path.to_path_buf(), writer.sink());
        Ok(Box::new(writer))
    }
}
