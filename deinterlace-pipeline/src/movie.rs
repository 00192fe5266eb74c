//! Per-movie orchestration.
//!
//! One orchestrator per movie job: open the reader, create the writer,
//! build a pipeline per track, run them concurrently against the one
//! writer, and settle the movie's status when the join group empties.

use crate::error::{PipelineError, Result};
use crate::join::JoinGroup;
use crate::status::MovieStatus;
use crate::track::{TrackOutcome, TrackPipeline};
use deinterlace_core::{TimeBase, Timestamp};
use deinterlace_media::MovieIo;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Output movie timescale: expresses 1/60000 and 1/120000 field times
/// without loss.
pub const MOVIE_TIME_SCALE: i64 = 120_000;

/// Orchestrates the processing of one movie.
pub struct MovieOrchestrator {
    input: PathBuf,
    output: PathBuf,
    provider: Arc<dyn MovieIo>,
    status: Arc<MovieStatus>,
    cancel: Arc<AtomicBool>,
}

impl MovieOrchestrator {
    /// Create an orchestrator for one input/output pair.
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        provider: Arc<dyn MovieIo>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            provider,
            status: Arc::new(MovieStatus::new()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The shared status of this movie.
    pub fn status(&self) -> Arc<MovieStatus> {
        Arc::clone(&self.status)
    }

    /// Request cancellation; every pipeline observes it on its next pump
    /// iteration.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Start processing on a background thread.
    ///
    /// A second call on a started movie is a no-op; returns whether this
    /// call claimed the start.
    pub fn start(&self) -> bool {
        if !self.status.mark_started() {
            return false;
        }

        let input = self.input.clone();
        let output = self.output.clone();
        let provider = Arc::clone(&self.provider);
        let status = Arc::clone(&self.status);
        let cancel = Arc::clone(&self.cancel);

        let spawned = thread::Builder::new()
            .name(format!(
                "movie-{}",
                input.file_name().unwrap_or_default().to_string_lossy()
            ))
            .spawn(move || {
                match run_movie(&input, &output, provider.as_ref(), &status, &cancel) {
                    Ok(success) => {
                        info!(
                            input = %input.display(),
                            output = %output.display(),
                            success,
                            "movie finished"
                        );
                        status.complete(success);
                    }
                    Err(error) => {
                        if cancel.load(Ordering::Relaxed) {
                            info!(input = %input.display(), "movie cancelled");
                        } else {
                            warn!(input = %input.display(), %error, "movie failed");
                        }
                        status.complete(false);
                    }
                }
            });
        if let Err(error) = spawned {
            warn!(%error, "could not spawn movie thread");
            self.status.complete(false);
        }
        true
    }
}

/// Run one movie start to finish; returns whether every pipeline drained
/// cleanly.
fn run_movie(
    input: &Path,
    output: &Path,
    provider: &dyn MovieIo,
    status: &MovieStatus,
    cancel: &Arc<AtomicBool>,
) -> Result<bool> {
    let mut reader = provider.open(input)?;
    let tracks = reader.tracks().to_vec();
    if tracks.is_empty() {
        return Err(PipelineError::NoTracks);
    }

    let mut writer = provider.create(output)?;
    writer.set_movie_time_scale(MOVIE_TIME_SCALE);

    let mut pipelines = Vec::new();
    for descriptor in &tracks {
        if descriptor.format.is_none() {
            warn!(
                input = %input.display(),
                track = descriptor.index,
                "track has no format descriptor; skipping"
            );
            continue;
        }
        let cell = status.add_track_cell();
        let pipeline = TrackPipeline::setup(
            descriptor,
            reader.as_mut(),
            writer.as_mut(),
            Arc::clone(cancel),
            cell,
        )?;
        pipelines.push(pipeline);
    }
    debug!(
        input = %input.display(),
        tracks = tracks.len(),
        pipelines = pipelines.len(),
        "movie set up"
    );

    writer.start_writing()?;
    writer.start_session(Timestamp::zero(TimeBase::MOVIE))?;
    for pipeline in &mut pipelines {
        pipeline.post_writer_start();
    }

    let join = JoinGroup::new();
    let failed = Arc::new(AtomicBool::new(false));
    let mut workers = Vec::with_capacity(pipelines.len());
    for pipeline in pipelines {
        join.enter();
        let join = join.clone();
        let failed = Arc::clone(&failed);
        workers.push(thread::spawn(move || {
            if matches!(pipeline.run(), TrackOutcome::Failed(_)) {
                failed.store(true, Ordering::Relaxed);
            }
            join.leave();
        }));
    }

    join.wait();
    for worker in workers {
        let _ = worker.join();
    }

    reader.cancel_reading();
    if cancel.load(Ordering::Relaxed) {
        writer.cancel_writing()?;
        Ok(false)
    } else {
        writer.finish_writing()?;
        Ok(!failed.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deinterlace_core::{
        PixelBuffer, PixelFormat, Rational, Sample, TimeBase, Timestamp,
    };
    use deinterlace_media::descriptor::{
        FieldDetail, FormatDescriptor, FourCc, TrackDescriptor, TrackKind,
    };
    use deinterlace_media::memory::{MemoryIo, MemoryMovie, MemoryTrack};
    use deinterlace_media::TrackSample;
    use std::time::Duration as StdDuration;

    fn interlaced_track(frames: usize) -> MemoryTrack {
        let descriptor = TrackDescriptor {
            index: 0,
            kind: TrackKind::Video,
            format: Some(FormatDescriptor {
                codec: FourCc::RAW_422,
                dimensions: Some((8, 4)),
                field_count: 2,
                field_detail: FieldDetail::TemporalTopFirst,
                nominal_frame_rate: 29.97,
                frame_rate: Some(Rational::new(30000, 1001)),
            }),
            natural_time_scale: 30000,
            end_time: Timestamp::new(frames as i64 * 1001, TimeBase::new(1, 30000)),
        };
        let samples = (0..frames)
            .map(|i| {
                let mut buffer = PixelBuffer::new(8, 4, PixelFormat::Uyvy422);
                buffer.fill(0x40 + i as u8);
                TrackSample::Frame {
                    buffer,
                    pts: Timestamp::new(i as i64 * 1001, TimeBase::new(1, 30000)),
                }
            })
            .collect();
        MemoryTrack::new(descriptor, samples)
    }

    fn data_track(index: usize, kind: TrackKind, payloads: usize) -> MemoryTrack {
        let tb = TimeBase::new(1, 48000);
        let descriptor = TrackDescriptor {
            index,
            kind,
            format: Some(FormatDescriptor {
                codec: FourCc(*b"lpcm"),
                dimensions: None,
                field_count: 1,
                field_detail: FieldDetail::Unknown,
                nominal_frame_rate: 0.0,
                frame_rate: None,
            }),
            natural_time_scale: 48000,
            end_time: Timestamp::new(payloads as i64 * 1024, tb),
        };
        let samples = (0..payloads)
            .map(|i| {
                TrackSample::Data(Sample::new(
                    vec![index as u8; 8],
                    Timestamp::new(i as i64 * 1024, tb),
                ))
            })
            .collect();
        MemoryTrack::new(descriptor, samples)
    }

    fn wait_terminal(status: &MovieStatus) {
        let deadline = std::time::Instant::now() + StdDuration::from_secs(5);
        while !status.has_completed() {
            assert!(std::time::Instant::now() < deadline, "movie never completed");
            thread::sleep(StdDuration::from_millis(2));
        }
    }

    #[test]
    fn test_mixed_track_movie() {
        let io = Arc::new(MemoryIo::new("mov"));
        let mut movie = MemoryMovie::new();
        movie.push_track(interlaced_track(3));
        let mut audio = data_track(1, TrackKind::Audio, 4);
        audio.descriptor.index = 1;
        movie.push_track(audio);
        let mut timecode = data_track(2, TrackKind::Timecode, 1);
        timecode.descriptor.index = 2;
        movie.push_track(timecode);
        io.stage("/in/mixed.mov", movie);

        let orchestrator =
            MovieOrchestrator::new("/in/mixed.mov", "/out/mixed.mov", io.clone());
        let status = orchestrator.status();
        assert!(orchestrator.start());
        wait_terminal(&status);

        assert!(status.succeeded());
        assert_eq!(status.progress(), 1.0);

        let sink = io.sink_for(Path::new("/out/mixed.mov")).unwrap();
        assert!(sink.is_finished());
        assert_eq!(sink.movie_time_scale(), MOVIE_TIME_SCALE);
        assert_eq!(sink.track_count(), 3);
        // Video doubled, audio and timecode copied one-for-one.
        assert_eq!(sink.pts_of(0).len(), 6);
        assert_eq!(sink.pts_of(1).len(), 4);
        assert_eq!(sink.pts_of(2).len(), 1);
    }

    #[test]
    fn test_start_is_single_shot() {
        let io = Arc::new(MemoryIo::new("mov"));
        let mut movie = MemoryMovie::new();
        movie.push_track(interlaced_track(1));
        io.stage("/in/a.mov", movie);

        let orchestrator = MovieOrchestrator::new("/in/a.mov", "/out/a.mov", io);
        assert!(orchestrator.start());
        assert!(!orchestrator.start());
        wait_terminal(&orchestrator.status());
    }

    #[test]
    fn test_missing_input_fails_movie() {
        let io = Arc::new(MemoryIo::new("mov"));
        let orchestrator = MovieOrchestrator::new("/in/nope.mov", "/out/nope.mov", io);
        let status = orchestrator.status();
        orchestrator.start();
        wait_terminal(&status);
        assert!(!status.succeeded());
    }

    #[test]
    fn test_empty_movie_fails() {
        let io = Arc::new(MemoryIo::new("mov"));
        io.stage("/in/empty.mov", MemoryMovie::new());

        let orchestrator = MovieOrchestrator::new("/in/empty.mov", "/out/empty.mov", io);
        let status = orchestrator.status();
        orchestrator.start();
        wait_terminal(&status);
        assert!(!status.succeeded());
    }

    #[test]
    fn test_track_read_failure_fails_movie_but_finishes() {
        let io = Arc::new(MemoryIo::new("mov"));
        let mut movie = MemoryMovie::new();
        movie.push_track(interlaced_track(3));
        let mut audio = data_track(1, TrackKind::Audio, 3);
        audio.descriptor.index = 1;
        audio.fail_after = Some(1);
        movie.push_track(audio);
        io.stage("/in/bad.mov", movie);

        let orchestrator = MovieOrchestrator::new("/in/bad.mov", "/out/bad.mov", io.clone());
        let status = orchestrator.status();
        orchestrator.start();
        wait_terminal(&status);

        assert!(!status.succeeded());
        // The healthy video track still drained before the join settled.
        let sink = io.sink_for(Path::new("/out/bad.mov")).unwrap();
        assert_eq!(sink.pts_of(0).len(), 6);
    }

    #[test]
    fn test_formatless_track_is_skipped() {
        let io = Arc::new(MemoryIo::new("mov"));
        let mut movie = MemoryMovie::new();
        movie.push_track(interlaced_track(2));
        let mut bare = data_track(1, TrackKind::Other, 2);
        bare.descriptor.index = 1;
        bare.descriptor.format = None;
        movie.push_track(bare);
        io.stage("/in/skip.mov", movie);

        let orchestrator = MovieOrchestrator::new("/in/skip.mov", "/out/skip.mov", io.clone());
        let status = orchestrator.status();
        orchestrator.start();
        wait_terminal(&status);

        assert!(status.succeeded());
        let sink = io.sink_for(Path::new("/out/skip.mov")).unwrap();
        // Only the video track got a pipeline and an output track.
        assert_eq!(sink.track_count(), 1);
        assert_eq!(sink.pts_of(0).len(), 4);
    }

    #[test]
    fn test_cancel_reaches_terminal_with_failure_status() {
        let io = Arc::new(
            MemoryIo::new("mov").with_throttle(StdDuration::from_millis(5)),
        );
        let mut movie = MemoryMovie::new();
        movie.push_track(interlaced_track(200));
        io.stage("/in/slow.mov", movie);

        let orchestrator =
            MovieOrchestrator::new("/in/slow.mov", "/out/slow.mov", io.clone());
        let status = orchestrator.status();
        orchestrator.start();

        thread::sleep(StdDuration::from_millis(20));
        orchestrator.cancel();
        wait_terminal(&status);

        assert!(!status.succeeded());
        let sink = io.sink_for(Path::new("/out/slow.mov")).unwrap();
        assert!(sink.is_cancelled());
        assert!(!sink.is_finished());
        // The pump stopped before draining all 200 frames.
        assert!(sink.pts_of(0).len() < 400);
    }

    #[test]
    fn test_progress_is_monotone() {
        let io = Arc::new(
            MemoryIo::new("mov").with_throttle(StdDuration::from_millis(1)),
        );
        let mut movie = MemoryMovie::new();
        movie.push_track(interlaced_track(40));
        io.stage("/in/mono.mov", movie);

        let orchestrator = MovieOrchestrator::new("/in/mono.mov", "/out/mono.mov", io);
        let status = orchestrator.status();
        orchestrator.start();

        let mut last = 0.0;
        while !status.has_completed() {
            let now = status.progress();
            assert!(now >= last, "progress went backwards: {now} < {last}");
            last = now;
            thread::sleep(StdDuration::from_millis(3));
        }
        assert_eq!(status.progress(), 1.0);
    }
}
