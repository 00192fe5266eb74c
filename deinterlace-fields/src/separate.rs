//! Field separation kernel.
//!
//! Splits one interlaced frame into two progressive frames, one per field.
//! Each output keeps the owned field's lines verbatim and rebuilds the
//! opposite field's lines by vertical interpolation.
//!
//! # Algorithm
//!
//! For each field:
//! 1. Copy the field's own lines into the output at their original indices.
//! 2. Fill each missing interior line with the truncated per-byte average of
//!    the line above and the line below: `(a >> 1) + (b >> 1)`.
//! 3. The one missing line with a single neighbor (bottom line for the top
//!    field, top line for the bottom field) is copied from that neighbor.
//!
//! The pre-shifted average is one less than `(a + b) / 2` when the operands'
//! low bits differ; in exchange the inner loop has no widening, no carry,
//! and no branches.
//!
//! # Interpolation order
//!
//! Missing lines are produced in vertical swaths of 32, 16, and 8 bytes,
//! each swath walked top to bottom so the row loaded as "below" for line L
//! is reused as "above" for line L+2. The trailing 8-byte pass may extend
//! past the payload into stride padding; swaths own disjoint columns, so
//! those writes touch padding only.

use crate::error::{FieldsError, Result};
use deinterlace_core::{PixelBuffer, SharedPixelBufferPool};

/// Field order for interlaced content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldOrder {
    /// Top field first (TFF) - even lines are earlier in time.
    #[default]
    TopFieldFirst,
    /// Bottom field first (BFF) - odd lines are earlier in time.
    BottomFieldFirst,
}

impl FieldOrder {
    /// Map a top-field-first flag onto a field order.
    pub fn from_top_field_first(top_field_first: bool) -> Self {
        if top_field_first {
            FieldOrder::TopFieldFirst
        } else {
            FieldOrder::BottomFieldFirst
        }
    }

    /// Get the opposite field order.
    pub fn opposite(&self) -> Self {
        match self {
            FieldOrder::TopFieldFirst => FieldOrder::BottomFieldFirst,
            FieldOrder::BottomFieldFirst => FieldOrder::TopFieldFirst,
        }
    }

    /// Line parity of the temporally earlier field (0 = even lines).
    pub fn first_field_parity(&self) -> usize {
        match self {
            FieldOrder::TopFieldFirst => 0,
            FieldOrder::BottomFieldFirst => 1,
        }
    }
}

/// Field separator bound to a pixel buffer pool.
///
/// Both outputs of a frame come from the pool and share the source frame's
/// geometry; the writer releases them back once appended.
pub struct FieldSeparator {
    pool: SharedPixelBufferPool,
    field_order: FieldOrder,
}

impl FieldSeparator {
    /// Create a separator drawing output buffers from `pool`.
    pub fn new(pool: SharedPixelBufferPool, field_order: FieldOrder) -> Self {
        Self { pool, field_order }
    }

    /// Produce the two progressive frames for one interlaced frame.
    ///
    /// The first element reconstructs the temporally earlier field, the
    /// second the later one; both have the source frame's geometry.
    pub fn make_progressive_pair(
        &self,
        src: &PixelBuffer,
    ) -> Result<(PixelBuffer, PixelBuffer)> {
        self.validate(src)?;

        let first = self.field_order.first_field_parity();
        let a = self.reconstruct_field(src, first);
        let b = self.reconstruct_field(src, 1 - first);
        Ok((a, b))
    }

    /// Rebuild a full progressive frame from the field of one line parity.
    fn reconstruct_field(&self, src: &PixelBuffer, parity: usize) -> PixelBuffer {
        let mut dst = self.pool.acquire();
        let height = src.height() as usize;

        // Copy phase: the owned field's lines land at their own indices.
        for line in (parity..height).step_by(2) {
            dst.row_mut(line).copy_from_slice(src.row(line));
        }

        // The missing line with only one neighbor is a verbatim copy of it.
        if parity == 0 {
            dst.row_mut(height - 1).copy_from_slice(src.row(height - 2));
        } else {
            dst.row_mut(0).copy_from_slice(src.row(1));
        }

        interpolate_missing_lines(src, &mut dst, parity);
        dst
    }

    fn validate(&self, src: &PixelBuffer) -> Result<()> {
        let (width, height) = (src.width(), src.height());
        if height < 2 || height % 2 != 0 || width == 0 {
            return Err(FieldsError::invalid_dimensions(width, height));
        }
        if width != self.pool.width()
            || height != self.pool.height()
            || src.format() != self.pool.format()
        {
            return Err(FieldsError::geometry_mismatch(
                self.pool.width(),
                self.pool.height(),
                width,
                height,
            ));
        }
        Ok(())
    }
}

/// Interpolate every interior missing line of the given parity's opposite
/// field, in vertical swaths.
///
/// The kept lines in `dst` are verbatim copies of the same `src` rows, so
/// reading neighbors from `src` reads the reconstructed grid.
fn interpolate_missing_lines(src: &PixelBuffer, dst: &mut PixelBuffer, kept_parity: usize) {
    let packed = src.packed_row_bytes();
    let mut x = 0;

    while packed - x >= 32 {
        interpolate_swath::<32>(src, dst, kept_parity, x);
        x += 32;
    }
    if packed - x >= 16 {
        interpolate_swath::<16>(src, dst, kept_parity, x);
        x += 16;
    }
    while x < packed {
        // Tail pass; may run into stride padding, never past the row.
        interpolate_swath::<8>(src, dst, kept_parity, x);
        x += 8;
    }
}

/// Interpolate one `W`-byte-wide column swath, top to bottom.
fn interpolate_swath<const W: usize>(
    src: &PixelBuffer,
    dst: &mut PixelBuffer,
    kept_parity: usize,
    x: usize,
) {
    let height = src.height() as usize;

    // Interior missing lines only; the single-neighbor line was copied.
    let first_missing = if kept_parity == 0 { 1 } else { 2 };
    let last_missing = if kept_parity == 0 {
        height.saturating_sub(3)
    } else {
        height - 2
    };

    if first_missing > last_missing {
        return;
    }

    let mut above = [0u8; W];
    let mut below = [0u8; W];
    above.copy_from_slice(&src.row(first_missing - 1)[x..x + W]);

    let mut line = first_missing;
    while line <= last_missing {
        below.copy_from_slice(&src.row(line + 1)[x..x + W]);
        let out = &mut dst.row_mut(line)[x..x + W];
        for i in 0..W {
            out[i] = (above[i] >> 1) + (below[i] >> 1);
        }
        above = below;
        line += 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deinterlace_core::{PixelFormat, SharedPixelBufferPool};

    fn pool_for(width: u32, height: u32) -> SharedPixelBufferPool {
        SharedPixelBufferPool::new(width, height, PixelFormat::Uyvy422, 4).unwrap()
    }

    /// Frame whose every row is a single byte value: row i = `rows[i]`.
    fn frame_with_rows(width: u32, rows: &[u8]) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, rows.len() as u32, PixelFormat::Uyvy422);
        for (i, &v) in rows.iter().enumerate() {
            buf.row_mut(i).fill(v);
        }
        buf
    }

    #[test]
    fn test_field_order_opposite() {
        assert_eq!(
            FieldOrder::TopFieldFirst.opposite(),
            FieldOrder::BottomFieldFirst
        );
        assert_eq!(
            FieldOrder::BottomFieldFirst.opposite(),
            FieldOrder::TopFieldFirst
        );
    }

    #[test]
    fn test_four_line_frame_top_field_first() {
        // Rows 0x10 / 0x20 / 0x30 / 0x40, 4 px wide (8 payload bytes/row).
        let src = frame_with_rows(4, &[0x10, 0x20, 0x30, 0x40]);
        let sep = FieldSeparator::new(pool_for(4, 4), FieldOrder::TopFieldFirst);

        let (a, b) = sep.make_progressive_pair(&src).unwrap();
        let packed = src.packed_row_bytes();

        // A keeps the even lines; line 1 averages 0x10 and 0x30, line 3
        // copies line 2.
        assert!(a.row(0)[..packed].iter().all(|&v| v == 0x10));
        assert!(a.row(1)[..packed].iter().all(|&v| v == 0x20));
        assert!(a.row(2)[..packed].iter().all(|&v| v == 0x30));
        assert!(a.row(3)[..packed].iter().all(|&v| v == 0x30));

        // B keeps the odd lines; line 0 copies line 1, line 2 averages
        // 0x20 and 0x40.
        assert!(b.row(0)[..packed].iter().all(|&v| v == 0x20));
        assert!(b.row(1)[..packed].iter().all(|&v| v == 0x20));
        assert!(b.row(2)[..packed].iter().all(|&v| v == 0x30));
        assert!(b.row(3)[..packed].iter().all(|&v| v == 0x40));
    }

    #[test]
    fn test_bottom_field_first_swaps_pair_order() {
        let src = frame_with_rows(4, &[0x10, 0x20, 0x30, 0x40]);
        let tff = FieldSeparator::new(pool_for(4, 4), FieldOrder::TopFieldFirst);
        let bff = FieldSeparator::new(pool_for(4, 4), FieldOrder::BottomFieldFirst);

        let (ta, tb) = tff.make_progressive_pair(&src).unwrap();
        let (ba, bb) = bff.make_progressive_pair(&src).unwrap();

        // Same two reconstructions, opposite temporal order.
        assert_eq!(ta.data(), bb.data());
        assert_eq!(tb.data(), ba.data());
    }

    #[test]
    fn test_field_copy_identity() {
        let mut src = PixelBuffer::new(24, 8, PixelFormat::Uyvy422);
        // Deterministic non-uniform content.
        for line in 0..8 {
            for (i, b) in src.row_mut(line).iter_mut().enumerate() {
                *b = (line as u8).wrapping_mul(31).wrapping_add(i as u8);
            }
        }
        let sep = FieldSeparator::new(pool_for(24, 8), FieldOrder::TopFieldFirst);
        let (a, b) = sep.make_progressive_pair(&src).unwrap();

        let packed = src.packed_row_bytes();
        for line in (0..8).step_by(2) {
            assert_eq!(&a.row(line)[..packed], &src.row(line)[..packed]);
        }
        for line in (1..8).step_by(2) {
            assert_eq!(&b.row(line)[..packed], &src.row(line)[..packed]);
        }
    }

    #[test]
    fn test_interpolation_bounds() {
        let mut src = PixelBuffer::new(40, 16, PixelFormat::Uyvy422);
        // Pseudo-random content, fixed seed.
        let mut state = 0x243f_6a88u32;
        for byte in src.data_mut() {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            *byte = (state >> 24) as u8;
        }

        let sep = FieldSeparator::new(pool_for(40, 16), FieldOrder::TopFieldFirst);
        let (a, _b) = sep.make_progressive_pair(&src).unwrap();

        let packed = src.packed_row_bytes();
        for line in (1..13).step_by(2) {
            for i in 0..packed {
                let above = a.row(line - 1)[i];
                let below = a.row(line + 1)[i];
                let got = a.row(line)[i] as i32;
                let exact = (above as i32 + below as i32) / 2;
                assert!((got - exact).abs() <= 1, "line {line} byte {i}");
                assert!(got >= above.min(below) as i32);
                assert!(got <= above.max(below) as i32);
            }
        }
    }

    #[test]
    fn test_truncated_average_is_preshifted() {
        // 0x11 and 0x12 have differing low bits: the pre-shifted average is
        // 0x08 + 0x09 = 0x11, one less than the exact midpoint rounding up.
        let src = frame_with_rows(4, &[0x11, 0x00, 0x12, 0x00]);
        let sep = FieldSeparator::new(pool_for(4, 4), FieldOrder::TopFieldFirst);
        let (a, _) = sep.make_progressive_pair(&src).unwrap();
        assert!(a.row(1)[..8].iter().all(|&v| v == 0x11));
    }

    #[test]
    fn test_boundary_rows_copied_verbatim() {
        let src = frame_with_rows(8, &[1, 2, 3, 4, 5, 6]);
        let sep = FieldSeparator::new(pool_for(8, 6), FieldOrder::TopFieldFirst);
        let (a, b) = sep.make_progressive_pair(&src).unwrap();

        let packed = src.packed_row_bytes();
        // Even-field output: bottom line mirrors the last even line.
        assert_eq!(&a.row(5)[..packed], &a.row(4)[..packed]);
        // Odd-field output: top line mirrors the first odd line.
        assert_eq!(&b.row(0)[..packed], &b.row(1)[..packed]);
    }

    #[test]
    fn test_minimal_two_line_frame() {
        let src = frame_with_rows(4, &[0x60, 0x90]);
        let sep = FieldSeparator::new(pool_for(4, 2), FieldOrder::TopFieldFirst);
        let (a, b) = sep.make_progressive_pair(&src).unwrap();

        // No interior lines: each output is its field's line doubled.
        assert!(a.row(0)[..8].iter().all(|&v| v == 0x60));
        assert!(a.row(1)[..8].iter().all(|&v| v == 0x60));
        assert!(b.row(0)[..8].iter().all(|&v| v == 0x90));
        assert!(b.row(1)[..8].iter().all(|&v| v == 0x90));
    }

    #[test]
    fn test_swath_tail_widths() {
        // 20 px * 2 bpp = 40 payload bytes: one 32-swath, then the 8-byte
        // tail; 22 px = 44 bytes adds a padding-overrunning tail pass.
        for width in [20u32, 22, 36, 44] {
            let mut src = PixelBuffer::new(width, 6, PixelFormat::Uyvy422);
            let mut state = width;
            for byte in src.data_mut() {
                state = state.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
                *byte = (state >> 16) as u8;
            }
            let sep = FieldSeparator::new(pool_for(width, 6), FieldOrder::TopFieldFirst);
            let (a, _) = sep.make_progressive_pair(&src).unwrap();

            let packed = src.packed_row_bytes();
            for i in 0..packed {
                let expect =
                    (src.row(0)[i] >> 1) + (src.row(2)[i] >> 1);
                assert_eq!(a.row(1)[i], expect, "width {width} byte {i}");
            }
        }
    }

    #[test]
    fn test_rejects_odd_height() {
        let src = PixelBuffer::new(8, 5, PixelFormat::Uyvy422);
        let sep = FieldSeparator::new(pool_for(8, 5), FieldOrder::TopFieldFirst);
        assert!(matches!(
            sep.make_progressive_pair(&src),
            Err(FieldsError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_rejects_foreign_geometry() {
        let src = PixelBuffer::new(16, 8, PixelFormat::Uyvy422);
        let sep = FieldSeparator::new(pool_for(8, 8), FieldOrder::TopFieldFirst);
        assert!(matches!(
            sep.make_progressive_pair(&src),
            Err(FieldsError::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_outputs_are_pooled() {
        let pool = pool_for(8, 4);
        let sep = FieldSeparator::new(pool.clone(), FieldOrder::TopFieldFirst);
        let src = frame_with_rows(8, &[1, 2, 3, 4]);

        let (a, b) = sep.make_progressive_pair(&src).unwrap();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.available(), 2);

        // A second frame reuses the released buffers.
        let (a, _b) = sep.make_progressive_pair(&src).unwrap();
        assert!(a.row(0)[..16].iter().all(|&v| v == 1));
    }
}
