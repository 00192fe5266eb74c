//! Per-track pipelines.
//!
//! Each track of a movie gets one pipeline: classify the track, pull its
//! samples, transform or pass them through, and push to the writer under
//! the writer's back-pressure. Interlaced video is split into progressive
//! field pairs; everything else is copied.

use crate::error::{PipelineError, Result};
use crate::status::ProgressCell;
use deinterlace_core::{Duration, PixelBuffer, PixelFormat, SharedPixelBufferPool, Timestamp};
use deinterlace_fields::{FieldOrder, FieldSeparator};
use deinterlace_media::{
    FormatDescriptor, MovieReader, MovieWriter, TrackDescriptor, TrackEncoding, TrackKind,
    TrackReader, TrackSample, TrackSettings, TrackWriter,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Buffers retained by a pipeline's fallback pool: two outputs per frame
/// plus slack for buffers still held by the writer.
const FALLBACK_POOL_DEPTH: usize = 6;

/// How a track is treated on its way to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackMode {
    /// Split interlaced frames into field pairs and re-encode.
    DeinterlaceAndRecompress,
    /// Progressive non-ProRes video that should be re-encoded.
    ///
    /// The recompress path is not implemented; this mode currently pumps
    /// through the pass-through loop with the input codec kept.
    RecompressOnly,
    /// Copy samples verbatim.
    PassThrough,
}

impl TrackMode {
    /// Classify a track from its kind and format.
    pub fn classify(kind: TrackKind, format: &FormatDescriptor) -> TrackMode {
        if !kind.is_video() {
            return TrackMode::PassThrough;
        }
        if format.has_fields() {
            TrackMode::DeinterlaceAndRecompress
        } else if format.is_any_prores() {
            TrackMode::PassThrough
        } else {
            TrackMode::RecompressOnly
        }
    }

    /// Whether this mode pumps through the pass-through loop.
    pub fn is_pass_through(&self) -> bool {
        !matches!(self, TrackMode::DeinterlaceAndRecompress)
    }
}

/// How a pipeline's pump ended.
#[derive(Debug)]
pub enum TrackOutcome {
    /// The track drained to end of stream.
    Finished,
    /// The pump observed a cancellation request.
    Cancelled,
    /// Reader, writer, or kernel failure.
    Failed(PipelineError),
}

/// One track's producer-consumer loop.
pub struct TrackPipeline {
    descriptor: TrackDescriptor,
    mode: TrackMode,
    reader: Box<dyn TrackReader>,
    writer: Box<dyn TrackWriter>,
    /// Pool created at setup; replaced by the writer's own pool after the
    /// session starts, when the writer has one.
    local_pool: Option<SharedPixelBufferPool>,
    separator: Option<FieldSeparator>,
    /// The second progressive frame of the current pair, held until the
    /// writer asks for more data.
    pending: Option<(PixelBuffer, Timestamp)>,
    field_duration: Duration,
    progress: Arc<ProgressCell>,
    cancel: Arc<AtomicBool>,
    frames_written: u64,
}

impl TrackPipeline {
    /// Classify a track and wire its reader and writer endpoints.
    pub fn setup(
        descriptor: &TrackDescriptor,
        reader: &mut dyn MovieReader,
        writer: &mut dyn MovieWriter,
        cancel: Arc<AtomicBool>,
        progress: Arc<ProgressCell>,
    ) -> Result<TrackPipeline> {
        let format = descriptor.format.as_ref().ok_or_else(|| {
            PipelineError::invalid_track(descriptor.index, "no format descriptor")
        })?;
        let mode = TrackMode::classify(descriptor.kind, format);
        debug!(track = descriptor.index, ?mode, codec = %format.codec, "classified track");

        let mut local_pool = None;
        let mut field_duration = Duration::zero();
        let settings = match mode {
            TrackMode::DeinterlaceAndRecompress => {
                let (width, height) = descriptor.dimensions().ok_or_else(|| {
                    PipelineError::invalid_track(descriptor.index, "video track has no dimensions")
                })?;
                field_duration = format.field_duration().ok_or_else(|| {
                    PipelineError::invalid_track(
                        descriptor.index,
                        format!(
                            "no field duration for nominal rate {}",
                            format.nominal_frame_rate
                        ),
                    )
                })?;
                local_pool = Some(SharedPixelBufferPool::new(
                    width,
                    height,
                    PixelFormat::Uyvy422,
                    FALLBACK_POOL_DEPTH,
                )?);
                TrackSettings {
                    kind: descriptor.kind,
                    encoding: TrackEncoding::ProRes422,
                    dimensions: Some((width, height)),
                    frame_rate: format.doubled_frame_rate(),
                    time_scale: field_duration.time_base.as_rational().den,
                }
            }
            TrackMode::RecompressOnly | TrackMode::PassThrough => TrackSettings {
                kind: descriptor.kind,
                encoding: TrackEncoding::PassThrough,
                dimensions: format.dimensions,
                frame_rate: format.frame_rate,
                time_scale: descriptor.natural_time_scale,
            },
        };

        let track_writer = writer.add_track(settings)?;
        let track_reader = reader.open_track(descriptor.index)?;

        Ok(TrackPipeline {
            descriptor: descriptor.clone(),
            mode,
            reader: track_reader,
            writer: track_writer,
            local_pool,
            separator: None,
            pending: None,
            field_duration,
            progress,
            cancel,
            frames_written: 0,
        })
    }

    /// Bind the pixel buffer pool and instantiate the field separator.
    ///
    /// Some writers only expose their pool after the session starts, and
    /// some never do; the setup-time pool covers the latter.
    pub fn post_writer_start(&mut self) {
        let Some(local) = self.local_pool.clone() else {
            return;
        };
        let pool = match self.writer.pixel_buffer_pool() {
            Some(pool) => pool,
            None => {
                debug!(
                    track = self.descriptor.index,
                    "writer exposes no pixel buffer pool; using own"
                );
                local
            }
        };
        let top_field_first = self
            .descriptor
            .format
            .as_ref()
            .map(FormatDescriptor::top_field_first)
            .unwrap_or(false);
        self.separator = Some(FieldSeparator::new(
            pool,
            FieldOrder::from_top_field_first(top_field_first),
        ));
    }

    /// Drive the pump to its end and report how it finished.
    ///
    /// Always leaves the writer endpoint marked finished.
    pub fn run(mut self) -> TrackOutcome {
        match self.pump() {
            Ok(()) => TrackOutcome::Finished,
            Err(PipelineError::Cancelled) => TrackOutcome::Cancelled,
            Err(error) => {
                warn!(track = self.descriptor.index, %error, "pipeline failed");
                self.writer.mark_finished();
                TrackOutcome::Failed(error)
            }
        }
    }

    fn pump(&mut self) -> Result<()> {
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                self.writer.mark_finished();
                return Err(PipelineError::Cancelled);
            }
            self.writer.wait_ready()?;

            let more = if self.mode.is_pass_through() {
                self.pump_pass_through()?
            } else {
                self.pump_deinterlace()?
            };
            if !more {
                self.writer.mark_finished();
                self.progress.set(1.0);
                debug!(
                    track = self.descriptor.index,
                    mode = ?self.mode,
                    frames = self.frames_written,
                    "track drained"
                );
                return Ok(());
            }
        }
    }

    /// One deinterlacing pump iteration; false once the reader drained.
    fn pump_deinterlace(&mut self) -> Result<bool> {
        if let Some((frame, pts)) = self.pending.take() {
            self.writer.append_frame(frame, pts)?;
            self.frames_written += 1;
            return Ok(true);
        }

        let Some(sample) = self.reader.next_sample()? else {
            return Ok(false);
        };
        let TrackSample::Frame { buffer, pts } = sample else {
            return Err(PipelineError::invalid_track(
                self.descriptor.index,
                "expected decoded frames on an interlaced video track",
            ));
        };

        let separator = self.separator.as_ref().ok_or_else(|| {
            PipelineError::invalid_track(self.descriptor.index, "pump before post_writer_start")
        })?;
        let (first, second) = separator.make_progressive_pair(&buffer)?;

        self.writer.append_frame(first, pts)?;
        self.frames_written += 1;
        self.pending = Some((second, pts + self.field_duration));
        self.update_progress(pts);
        Ok(true)
    }

    /// One pass-through pump iteration; false once the reader drained.
    fn pump_pass_through(&mut self) -> Result<bool> {
        let Some(sample) = self.reader.next_sample()? else {
            return Ok(false);
        };
        if self.descriptor.kind.is_video() {
            self.update_progress(sample.pts());
        }
        match sample {
            TrackSample::Data(sample) => self.writer.append_sample(sample)?,
            TrackSample::Frame { buffer, pts } => self.writer.append_frame(buffer, pts)?,
        }
        self.frames_written += 1;
        Ok(true)
    }

    fn update_progress(&self, pts: Timestamp) {
        if let (Some(position), Some(end)) =
            (pts.to_seconds(), self.descriptor.end_time.to_seconds())
        {
            if end > 0.0 {
                self.progress.set(position / end);
            }
        }
    }
}
