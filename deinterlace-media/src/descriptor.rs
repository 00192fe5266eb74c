//! Track descriptors and format introspection.
//!
//! A `TrackDescriptor` is everything the pipelines need to know about a
//! track without touching its samples: what kind of track it is, and for
//! video, how its frames are structured in time. The interlacing queries
//! are pure functions over the format descriptor.

use deinterlace_core::{Duration, Rational, TimeBase, Timestamp};
use std::fmt;

/// Four-character codec code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// ProRes 422.
    pub const PRORES_422: FourCc = FourCc(*b"apcn");
    /// ProRes 422 HQ.
    pub const PRORES_422_HQ: FourCc = FourCc(*b"apch");
    /// ProRes 422 LT.
    pub const PRORES_422_LT: FourCc = FourCc(*b"apcs");
    /// ProRes 422 Proxy.
    pub const PRORES_422_PROXY: FourCc = FourCc(*b"apco");
    /// ProRes 4444.
    pub const PRORES_4444: FourCc = FourCc(*b"ap4h");
    /// ProRes 4444 XQ.
    pub const PRORES_4444_XQ: FourCc = FourCc(*b"ap4x");
    /// DV NTSC.
    pub const DV_NTSC: FourCc = FourCc(*b"dvc ");
    /// Uncompressed interleaved 8-bit 4:2:2 Y'CbCr.
    pub const RAW_422: FourCc = FourCc(*b"2vuy");
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// Track media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// Video track.
    Video,
    /// Audio track.
    Audio,
    /// Timecode track.
    Timecode,
    /// Any other track kind.
    Other,
}

impl TrackKind {
    /// Check whether this is a video track.
    pub fn is_video(&self) -> bool {
        matches!(self, TrackKind::Video)
    }
}

/// How the two fields of an interlaced frame relate, as advertised by the
/// format descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldDetail {
    /// No field ordering advertised.
    #[default]
    Unknown,
    /// Fields are temporally distinct; the top field is earlier.
    TemporalTopFirst,
    /// Fields are temporally distinct; the bottom field is earlier.
    TemporalBottomFirst,
    /// Spatial description: the first (top) line belongs to the earlier field.
    SpatialFirstLineEarly,
    /// Spatial description: the first line belongs to the later field.
    SpatialFirstLineLate,
}

/// Format descriptor for a track.
///
/// Opaque to everything except the introspection queries below.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    /// Codec four-character code.
    pub codec: FourCc,
    /// Video dimensions, if this is a video format.
    pub dimensions: Option<(u32, u32)>,
    /// Advertised fields per frame (1 for progressive, 2 for interlaced).
    pub field_count: u32,
    /// Advertised field ordering.
    pub field_detail: FieldDetail,
    /// Nominal frame rate in frames per second.
    pub nominal_frame_rate: f64,
    /// Exact frame rate, when the container carries one.
    pub frame_rate: Option<Rational>,
}

impl FormatDescriptor {
    /// Check whether frames of this format carry two temporal fields.
    ///
    /// DV NTSC descriptors advertise a single field, but the material is
    /// always interlaced; the codec check overrides the descriptor.
    pub fn has_fields(&self) -> bool {
        self.field_count == 2 || self.codec == FourCc::DV_NTSC
    }

    /// Check whether the top field is the temporally earlier one.
    pub fn top_field_first(&self) -> bool {
        matches!(
            self.field_detail,
            FieldDetail::TemporalTopFirst | FieldDetail::SpatialFirstLineEarly
        )
    }

    /// The offset from a frame's timestamp to its second field's timestamp.
    ///
    /// Only defined for interlaced material at the NTSC frame rates; other
    /// rates return `None`.
    pub fn field_duration(&self) -> Option<Duration> {
        if !self.has_fields() {
            return None;
        }
        let fps = self.nominal_frame_rate;
        if fps > 29.95 && fps < 30.0 {
            Some(Duration::new(1001, TimeBase::new(1, 60000)))
        } else if fps > 59.90 && fps < 60.0 {
            Some(Duration::new(1001, TimeBase::new(1, 120000)))
        } else {
            None
        }
    }

    /// The doubled output frame rate implied by the field duration.
    ///
    /// One output frame per field: the reciprocal of the field duration.
    pub fn doubled_frame_rate(&self) -> Option<Rational> {
        let field = self.field_duration()?;
        let seconds = Rational::from_int(field.value) * field.time_base.as_rational();
        Some(seconds.recip())
    }

    /// Check whether the codec is any member of the ProRes family.
    pub fn is_any_prores(&self) -> bool {
        matches!(
            self.codec,
            FourCc::PRORES_422
                | FourCc::PRORES_422_HQ
                | FourCc::PRORES_422_LT
                | FourCc::PRORES_422_PROXY
                | FourCc::PRORES_4444
                | FourCc::PRORES_4444_XQ
        )
    }
}

/// Everything a pipeline needs to know about one track.
#[derive(Debug, Clone)]
pub struct TrackDescriptor {
    /// Track index within the movie.
    pub index: usize,
    /// Media kind.
    pub kind: TrackKind,
    /// Format descriptor; tracks without one cannot be piped.
    pub format: Option<FormatDescriptor>,
    /// The track's natural timescale (units per second).
    pub natural_time_scale: i64,
    /// Presentation time at which the track ends.
    pub end_time: Timestamp,
}

impl TrackDescriptor {
    /// Video dimensions, if known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.format.as_ref().and_then(|f| f.dimensions)
    }
}
