//! # Deinterlace Media
//!
//! Movie reader/writer contracts and bundled container backends.
//!
//! The container demuxer/muxer and codec stack sit behind the narrow
//! traits in [`traits`]: per-track sample iteration on the read side, a
//! back-pressured per-track sink on the write side, and a provider
//! registry keyed by file extension. Track structure is described by
//! [`descriptor::TrackDescriptor`], whose format queries answer the
//! interlacing questions the pipelines ask.
//!
//! Two backends ship in-tree:
//! - [`memory`]: complete in-memory movies, the reference implementation
//!   of the contracts and the fixture shared by tests.
//! - [`y4m`]: YUV4MPEG2 streams, the uncompressed interchange format, for
//!   real file-backed processing of raw 4:2:2 video.
//!
//! Compressed containers are external collaborators: a path whose
//! extension no registered backend claims fails to open, and the batch
//! moves on.

pub mod descriptor;
pub mod error;
pub mod memory;
pub mod traits;
pub mod y4m;

pub use descriptor::{FieldDetail, FormatDescriptor, FourCc, TrackDescriptor, TrackKind};
pub use error::{MediaError, Result};
pub use traits::{
    MovieIo, MovieIoRegistry, MovieReader, MovieWriter, TrackEncoding, TrackReader, TrackSample,
    TrackSettings, TrackWriter,
};
