//! YUV4MPEG2 container backend.
//!
//! The stream format used for uncompressed video interchange: a one-line
//! plain-text header, then `FRAME` markers each followed by planar pixel
//! data. The `I` header parameter carries exactly the interlacing facts
//! the track descriptor needs (`It` top field first, `Ib` bottom field
//! first, `Ip` progressive), and `C422` matches the working pixel layout
//! up to a planar/interleaved repack.
//!
//! Only the 4:2:2 colorspace is accepted; compressed containers belong to
//! external backends.

use crate::descriptor::{
    FieldDetail, FormatDescriptor, FourCc, TrackDescriptor, TrackKind,
};
use crate::error::{MediaError, Result};
use crate::traits::{
    MovieIo, MovieReader, MovieWriter, TrackReader, TrackSample, TrackSettings, TrackWriter,
};
use deinterlace_core::{
    PixelBuffer, PixelFormat, Rational, Sample, TimeBase, Timestamp,
};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const MAGIC: &str = "YUV4MPEG2";
const FRAME_MARKER: &str = "FRAME";

/// Parsed stream parameters.
#[derive(Debug, Clone)]
struct StreamParams {
    width: u32,
    height: u32,
    frame_rate: Rational,
    interlacing: Interlacing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interlacing {
    Progressive,
    TopFieldFirst,
    BottomFieldFirst,
}

impl StreamParams {
    fn parse(header: &str) -> Result<Self> {
        let mut tokens = header.trim_end().split(' ');
        if tokens.next() != Some(MAGIC) {
            return Err(MediaError::invalid_data("missing YUV4MPEG2 magic"));
        }

        let mut width = None;
        let mut height = None;
        let mut frame_rate = None;
        let mut interlacing = Interlacing::Progressive;

        for token in tokens {
            if token.is_empty() || !token.is_ascii() {
                continue;
            }
            let (tag, value) = token.split_at(1);
            match tag {
                "W" => width = Some(parse_number(value, "width")?),
                "H" => height = Some(parse_number(value, "height")?),
                "F" => {
                    let (num, den) = value
                        .split_once(':')
                        .ok_or_else(|| MediaError::invalid_data("malformed frame rate"))?;
                    let num = parse_number(num, "frame rate numerator")?;
                    let den = parse_number(den, "frame rate denominator")?;
                    if num <= 0 || den <= 0 {
                        return Err(MediaError::invalid_data("non-positive frame rate"));
                    }
                    frame_rate = Some(Rational::new(num, den));
                }
                "I" => {
                    interlacing = match value {
                        "t" => Interlacing::TopFieldFirst,
                        "b" => Interlacing::BottomFieldFirst,
                        _ => Interlacing::Progressive,
                    };
                }
                "C" => {
                    if value != "422" {
                        return Err(MediaError::invalid_data(format!(
                            "unsupported colorspace C{value}, only C422 is handled"
                        )));
                    }
                }
                // A (aspect) and X (extensions) are irrelevant here.
                _ => {}
            }
        }

        let width = width.ok_or_else(|| MediaError::invalid_data("header missing width"))?;
        let height = height.ok_or_else(|| MediaError::invalid_data("header missing height"))?;
        let frame_rate =
            frame_rate.ok_or_else(|| MediaError::invalid_data("header missing frame rate"))?;
        if width <= 0 || width % 2 != 0 || height <= 0 {
            return Err(MediaError::invalid_data(format!(
                "unusable 4:2:2 dimensions {width}x{height}"
            )));
        }

        Ok(Self {
            width: width as u32,
            height: height as u32,
            frame_rate,
            interlacing,
        })
    }

    /// Bytes of planar pixel data per frame (Y + Cb + Cr at 4:2:2).
    fn frame_bytes(&self) -> u64 {
        let luma = self.width as u64 * self.height as u64;
        luma * 2
    }

    fn descriptor(&self, frame_count: i64) -> TrackDescriptor {
        let time_scale = self.frame_rate.num;
        let frame_duration = self.frame_rate.den;
        TrackDescriptor {
            index: 0,
            kind: TrackKind::Video,
            format: Some(FormatDescriptor {
                codec: FourCc::RAW_422,
                dimensions: Some((self.width, self.height)),
                field_count: match self.interlacing {
                    Interlacing::Progressive => 1,
                    _ => 2,
                },
                field_detail: match self.interlacing {
                    Interlacing::Progressive => FieldDetail::Unknown,
                    Interlacing::TopFieldFirst => FieldDetail::TemporalTopFirst,
                    Interlacing::BottomFieldFirst => FieldDetail::TemporalBottomFirst,
                },
                nominal_frame_rate: self.frame_rate.to_f64(),
                frame_rate: Some(self.frame_rate),
            }),
            natural_time_scale: time_scale,
            end_time: Timestamp::new(
                frame_count * frame_duration,
                TimeBase::new(1, time_scale),
            ),
        }
    }
}

fn parse_number(text: &str, what: &str) -> Result<i64> {
    text.parse()
        .map_err(|_| MediaError::invalid_data(format!("malformed {what}: '{text}'")))
}

/// Reader over a YUV4MPEG2 stream.
pub struct Y4mMovieReader {
    descriptors: Vec<TrackDescriptor>,
    track: Option<Y4mTrackReader>,
}

impl Y4mMovieReader {
    /// Open a stream and parse its header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut input = BufReader::new(file);

        let mut header = Vec::new();
        input.read_until(b'\n', &mut header)?;
        let header_len = header.len() as u64;
        let header = String::from_utf8(header)
            .map_err(|_| MediaError::invalid_data("header is not ASCII"))?;
        let params = StreamParams::parse(&header)?;

        // Frame count from the payload size, assuming bare FRAME markers;
        // markers with parameters make this an estimate, which only the
        // progress display consumes.
        let block = FRAME_MARKER.len() as u64 + 1 + params.frame_bytes();
        let frame_count = (file_len.saturating_sub(header_len) / block) as i64;
        debug!(
            path = %path.display(),
            width = params.width,
            height = params.height,
            frames = frame_count,
            "opened y4m stream"
        );

        let descriptor = params.descriptor(frame_count);
        Ok(Self {
            descriptors: vec![descriptor.clone()],
            track: Some(Y4mTrackReader {
                descriptor,
                params,
                input,
                frame_index: 0,
            }),
        })
    }
}

impl MovieReader for Y4mMovieReader {
    fn tracks(&self) -> &[TrackDescriptor] {
        &self.descriptors
    }

    fn open_track(&mut self, index: usize) -> Result<Box<dyn TrackReader>> {
        if index != 0 {
            return Err(MediaError::TrackNotFound(index));
        }
        let track = self
            .track
            .take()
            .ok_or_else(|| MediaError::invalid_data("y4m track already opened"))?;
        Ok(Box::new(track))
    }
}

struct Y4mTrackReader {
    descriptor: TrackDescriptor,
    params: StreamParams,
    input: BufReader<File>,
    frame_index: i64,
}

impl TrackReader for Y4mTrackReader {
    fn descriptor(&self) -> &TrackDescriptor {
        &self.descriptor
    }

    fn next_sample(&mut self) -> Result<Option<TrackSample>> {
        let mut marker = Vec::new();
        let read = self.input.read_until(b'\n', &mut marker)?;
        if read == 0 {
            return Ok(None);
        }
        if !marker.starts_with(FRAME_MARKER.as_bytes()) {
            return Err(MediaError::invalid_data("expected FRAME marker"));
        }

        let (width, height) = (self.params.width as usize, self.params.height as usize);
        let mut y = vec![0u8; width * height];
        let mut cb = vec![0u8; width / 2 * height];
        let mut cr = vec![0u8; width / 2 * height];
        self.input.read_exact(&mut y)?;
        self.input.read_exact(&mut cb)?;
        self.input.read_exact(&mut cr)?;

        let buffer = pack_planar_422(&y, &cb, &cr, self.params.width, self.params.height);
        let pts = Timestamp::new(
            self.frame_index * self.params.frame_rate.den,
            TimeBase::new(1, self.params.frame_rate.num),
        );
        self.frame_index += 1;
        Ok(Some(TrackSample::Frame { buffer, pts }))
    }
}

/// Interleave planar 4:2:2 into the Cb Y'0 Cr Y'1 working layout.
fn pack_planar_422(y: &[u8], cb: &[u8], cr: &[u8], width: u32, height: u32) -> PixelBuffer {
    let mut buffer = PixelBuffer::new(width, height, PixelFormat::Uyvy422);
    let (width, height) = (width as usize, height as usize);
    let chroma_width = width / 2;

    for line in 0..height {
        let y_row = &y[line * width..(line + 1) * width];
        let cb_row = &cb[line * chroma_width..(line + 1) * chroma_width];
        let cr_row = &cr[line * chroma_width..(line + 1) * chroma_width];
        let out = buffer.row_mut(line);
        for pair in 0..chroma_width {
            out[pair * 4] = cb_row[pair];
            out[pair * 4 + 1] = y_row[pair * 2];
            out[pair * 4 + 2] = cr_row[pair];
            out[pair * 4 + 3] = y_row[pair * 2 + 1];
        }
    }
    buffer
}

/// Split the interleaved working layout back into planar 4:2:2 rows.
fn unpack_row_422(row: &[u8], width: usize, y: &mut Vec<u8>, cb: &mut Vec<u8>, cr: &mut Vec<u8>) {
    for pair in 0..width / 2 {
        cb.push(row[pair * 4]);
        y.push(row[pair * 4 + 1]);
        cr.push(row[pair * 4 + 2]);
        y.push(row[pair * 4 + 3]);
    }
}

struct Y4mWriterState {
    path: PathBuf,
    output: Option<BufWriter<File>>,
    settings: Option<TrackSettings>,
    started: bool,
    cancelled: bool,
}

/// Writer producing a progressive YUV4MPEG2 stream.
pub struct Y4mMovieWriter {
    state: Arc<Mutex<Y4mWriterState>>,
}

impl Y4mMovieWriter {
    /// Create the output file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            state: Arc::new(Mutex::new(Y4mWriterState {
                path: path.to_path_buf(),
                output: Some(BufWriter::new(file)),
                settings: None,
                started: false,
                cancelled: false,
            })),
        })
    }
}

impl MovieWriter for Y4mMovieWriter {
    fn add_track(&mut self, settings: TrackSettings) -> Result<Box<dyn TrackWriter>> {
        let mut state = self.state.lock();
        if state.settings.is_some() {
            return Err(MediaError::writer_state("y4m holds a single video track"));
        }
        if settings.kind != TrackKind::Video {
            return Err(MediaError::writer_state("y4m holds video only"));
        }
        if settings.dimensions.is_none() || settings.frame_rate.is_none() {
            return Err(MediaError::writer_state(
                "y4m needs dimensions and a frame rate",
            ));
        }
        state.settings = Some(settings);
        Ok(Box::new(Y4mTrackWriter {
            state: Arc::clone(&self.state),
        }))
    }

    fn set_movie_time_scale(&mut self, _time_scale: i64) {
        // The stream header carries only the frame rate.
    }

    fn start_writing(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        let settings = state
            .settings
            .clone()
            .ok_or_else(|| MediaError::writer_state("no track added"))?;
        if state.started {
            return Err(MediaError::writer_state("start_writing called twice"));
        }
        let (width, height) = settings
            .dimensions
            .ok_or_else(|| MediaError::writer_state("track has no dimensions"))?;
        let rate = settings
            .frame_rate
            .ok_or_else(|| MediaError::writer_state("track has no frame rate"))?;
        let output = state
            .output
            .as_mut()
            .ok_or_else(|| MediaError::writer_state("writer already closed"))?;
        writeln!(
            output,
            "{MAGIC} W{width} H{height} F{}:{} Ip A1:1 C422",
            rate.num, rate.den
        )?;
        state.started = true;
        Ok(())
    }

    fn start_session(&mut self, _at: Timestamp) -> Result<()> {
        if !self.state.lock().started {
            return Err(MediaError::writer_state("session before start_writing"));
        }
        Ok(())
    }

    fn finish_writing(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.cancelled {
            return Err(MediaError::WriterCancelled);
        }
        if let Some(mut output) = state.output.take() {
            output.flush()?;
        }
        Ok(())
    }

    fn cancel_writing(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.cancelled = true;
        state.output = None;
        // Discard the partial output file.
        let _ = std::fs::remove_file(&state.path);
        Ok(())
    }
}

struct Y4mTrackWriter {
    state: Arc<Mutex<Y4mWriterState>>,
}

impl TrackWriter for Y4mTrackWriter {
    fn is_ready_for_more(&self) -> bool {
        let state = self.state.lock();
        state.started && !state.cancelled && state.output.is_some()
    }

    fn wait_ready(&self) -> Result<()> {
        if self.state.lock().cancelled {
            return Err(MediaError::WriterCancelled);
        }
        Ok(())
    }

    fn append_sample(&mut self, _sample: Sample) -> Result<()> {
        Err(MediaError::writer_state(
            "y4m accepts pixel frames, not opaque samples",
        ))
    }

    fn append_frame(&mut self, frame: PixelBuffer, _pts: Timestamp) -> Result<()> {
        let mut state = self.state.lock();
        if state.cancelled {
            return Err(MediaError::WriterCancelled);
        }
        let settings = state
            .settings
            .clone()
            .ok_or_else(|| MediaError::writer_state("no track added"))?;
        if !state.started {
            return Err(MediaError::writer_state("append before start_writing"));
        }
        let (width, height) = settings
            .dimensions
            .ok_or_else(|| MediaError::writer_state("track has no dimensions"))?;
        if (frame.width(), frame.height()) != (width, height) {
            return Err(MediaError::invalid_data(format!(
                "frame geometry {}x{} does not match track {}x{}",
                frame.width(),
                frame.height(),
                width,
                height
            )));
        }

        let (width, height) = (width as usize, height as usize);
        let mut y = Vec::with_capacity(width * height);
        let mut cb = Vec::with_capacity(width / 2 * height);
        let mut cr = Vec::with_capacity(width / 2 * height);
        for line in 0..height {
            unpack_row_422(frame.row(line), width, &mut y, &mut cb, &mut cr);
        }

        let output = state
            .output
            .as_mut()
            .ok_or_else(|| MediaError::writer_state("writer already closed"))?;
        writeln!(output, "{FRAME_MARKER}")?;
        output.write_all(&y)?;
        output.write_all(&cb)?;
        output.write_all(&cr)?;
        Ok(())
    }

    fn mark_finished(&mut self) {
        // Nothing track-scoped to finalize in a single-track stream.
    }
}

/// The YUV4MPEG2 backend.
pub struct Y4mIo;

impl MovieIo for Y4mIo {
    fn name(&self) -> &str {
        "y4m"
    }

    fn handles_extension(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("y4m")
    }

    fn output_extension(&self) -> &str {
        "y4m"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn MovieReader>> {
        Ok(Box::new(Y4mMovieReader::open(path)?))
    }

    fn create(&self, path: &Path) -> Result<Box<dyn MovieWriter>> {
        Ok(Box::new(Y4mMovieWriter::create(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TrackEncoding;

    fn write_test_stream(path: &Path, interlacing: &str, frames: usize) {
        let mut file = File::create(path).unwrap();
        writeln!(file, "YUV4MPEG2 W8 H4 F30000:1001 I{interlacing} A1:1 C422").unwrap();
        for i in 0..frames {
            writeln!(file, "FRAME").unwrap();
            file.write_all(&vec![i as u8; 8 * 4]).unwrap(); // Y
            file.write_all(&vec![0x80; 4 * 4]).unwrap(); // Cb
            file.write_all(&vec![0x80; 4 * 4]).unwrap(); // Cr
        }
    }

    #[test]
    fn test_header_parsing() {
        let params =
            StreamParams::parse("YUV4MPEG2 W720 H480 F30000:1001 Ib A4:3 C422\n").unwrap();
        assert_eq!(params.width, 720);
        assert_eq!(params.height, 480);
        assert_eq!(params.frame_rate, Rational::new(30000, 1001));
        assert_eq!(params.interlacing, Interlacing::BottomFieldFirst);
    }

    #[test]
    fn test_rejects_unsupported_colorspace() {
        let err = StreamParams::parse("YUV4MPEG2 W720 H480 F25:1 Ip C420jpeg\n").unwrap_err();
        assert!(err.to_string().contains("C420jpeg"));
    }

    #[test]
    fn test_interlaced_descriptor() {
        let dir = std::env::temp_dir().join("deinterlace-y4m-descriptor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("clip.y4m");
        write_test_stream(&path, "t", 3);

        let reader = Y4mMovieReader::open(&path).unwrap();
        let desc = &reader.tracks()[0];
        let format = desc.format.as_ref().unwrap();
        assert!(format.has_fields());
        assert!(format.top_field_first());
        assert_eq!(desc.natural_time_scale, 30000);
        assert_eq!(desc.end_time.value, 3 * 1001);
    }

    #[test]
    fn test_read_frames_in_order() {
        let dir = std::env::temp_dir().join("deinterlace-y4m-read");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("clip.y4m");
        write_test_stream(&path, "b", 2);

        let mut reader = Y4mMovieReader::open(&path).unwrap();
        let mut track = reader.open_track(0).unwrap();

        let first = track.next_sample().unwrap().unwrap();
        assert_eq!(first.pts().value, 0);
        if let TrackSample::Frame { buffer, .. } = first {
            // Luma of frame 0 is all zero, chroma mid-gray.
            assert_eq!(buffer.row(0)[0], 0x80);
            assert_eq!(buffer.row(0)[1], 0x00);
        } else {
            panic!("expected a frame");
        }

        let second = track.next_sample().unwrap().unwrap();
        assert_eq!(second.pts().value, 1001);
        assert!(track.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let y: Vec<u8> = (0..32).collect();
        let cb = vec![0x11; 16];
        let cr = vec![0x22; 16];
        let buffer = pack_planar_422(&y, &cb, &cr, 8, 4);

        let mut y2 = Vec::new();
        let mut cb2 = Vec::new();
        let mut cr2 = Vec::new();
        for line in 0..4 {
            unpack_row_422(buffer.row(line), 8, &mut y2, &mut cb2, &mut cr2);
        }
        assert_eq!(y, y2);
        assert_eq!(cb, cb2);
        assert_eq!(cr, cr2);
    }

    #[test]
    fn test_writer_produces_readable_stream() {
        let dir = std::env::temp_dir().join("deinterlace-y4m-write");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.y4m");

        let mut writer = Y4mMovieWriter::create(&path).unwrap();
        let mut track = writer
            .add_track(TrackSettings {
                kind: TrackKind::Video,
                encoding: TrackEncoding::ProRes422,
                dimensions: Some((8, 4)),
                frame_rate: Some(Rational::new(60000, 1001)),
                time_scale: 60000,
            })
            .unwrap();
        writer.set_movie_time_scale(120000);
        writer.start_writing().unwrap();
        writer
            .start_session(Timestamp::zero(TimeBase::MOVIE))
            .unwrap();

        let mut frame = PixelBuffer::new(8, 4, PixelFormat::Uyvy422);
        frame.fill(0x55);
        track
            .append_frame(frame, Timestamp::new(0, TimeBase::new(1, 60000)))
            .unwrap();
        track.mark_finished();
        writer.finish_writing().unwrap();

        let mut reader = Y4mMovieReader::open(&path).unwrap();
        let format = reader.tracks()[0].format.clone().unwrap();
        assert!(!format.has_fields());
        assert!((format.nominal_frame_rate - 59.94).abs() < 0.01);

        let mut track = reader.open_track(0).unwrap();
        let sample = track.next_sample().unwrap().unwrap();
        if let TrackSample::Frame { buffer, .. } = sample {
            assert!(buffer.row(0)[..16].iter().all(|&b| b == 0x55));
        } else {
            panic!("expected a frame");
        }
        assert!(track.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_cancel_removes_partial_output() {
        let dir = std::env::temp_dir().join("deinterlace-y4m-cancel");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("partial.y4m");

        let mut writer = Y4mMovieWriter::create(&path).unwrap();
        writer
            .add_track(TrackSettings {
                kind: TrackKind::Video,
                encoding: TrackEncoding::ProRes422,
                dimensions: Some((8, 4)),
                frame_rate: Some(Rational::new(60000, 1001)),
                time_scale: 60000,
            })
            .unwrap();
        writer.start_writing().unwrap();
        writer.cancel_writing().unwrap();

        assert!(!path.exists());
        assert!(writer.finish_writing().is_err());
    }
}
