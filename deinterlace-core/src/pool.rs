//! Pixel buffer pool implementations.
//!
//! Deinterlacing allocates two full output frames per input frame; a pool
//! keeps those buffers recycled instead of round-tripping the allocator at
//! field rate.

use crate::error::{CoreError, Result};
use crate::pixel::{PixelBuffer, PixelFormat};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A pool of reusable pixel buffers of fixed geometry.
pub struct PixelBufferPool {
    available: VecDeque<PixelBuffer>,
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Maximum number of buffers to retain.
    max_size: usize,
    total_allocated: usize,
}

impl PixelBufferPool {
    /// Create a new pool producing buffers of the given geometry.
    ///
    /// Zero-sized geometry has no buffer to hand out and is rejected.
    pub fn new(width: u32, height: u32, format: PixelFormat, max_size: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::invalid_param(format!(
                "pixel buffer pool needs non-zero geometry, got {width}x{height}"
            )));
        }
        Ok(Self {
            available: VecDeque::with_capacity(max_size),
            width,
            height,
            format,
            max_size,
            total_allocated: 0,
        })
    }

    /// Acquire a buffer, reusing a pooled one when available.
    pub fn acquire(&mut self) -> PixelBuffer {
        if let Some(buffer) = self.available.pop_front() {
            buffer
        } else {
            self.total_allocated += 1;
            PixelBuffer::new(self.width, self.height, self.format)
        }
    }

    /// Release a buffer back to the pool.
    ///
    /// Buffers of foreign geometry, or beyond `max_size`, are dropped.
    pub fn release(&mut self, buffer: PixelBuffer) {
        if self.available.len() < self.max_size
            && buffer.width() == self.width
            && buffer.height() == self.height
            && buffer.format() == self.format
        {
            self.available.push_back(buffer);
        }
    }

    /// Width of buffers this pool produces.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of buffers this pool produces.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format of buffers this pool produces.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Number of buffers currently pooled.
    pub fn available(&self) -> usize {
        self.available.len()
    }

    /// Total buffers ever allocated by this pool.
    pub fn total_allocated(&self) -> usize {
        self.total_allocated
    }
}

/// A thread-safe pixel buffer pool, shared between the deinterlacer
/// (producer) and the writer (consumer releasing buffers after append).
pub struct SharedPixelBufferPool {
    inner: Arc<Mutex<PixelBufferPool>>,
}

impl SharedPixelBufferPool {
    /// Create a new shared pool.
    ///
    /// Rejects zero-sized geometry, like [`PixelBufferPool::new`].
    pub fn new(width: u32, height: u32, format: PixelFormat, max_size: usize) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(PixelBufferPool::new(
                width, height, format, max_size,
            )?)),
        })
    }

    /// Acquire a buffer from the pool.
    pub fn acquire(&self) -> PixelBuffer {
        self.inner.lock().acquire()
    }

    /// Release a buffer back to the pool.
    pub fn release(&self, buffer: PixelBuffer) {
        self.inner.lock().release(buffer);
    }

    /// Width of buffers this pool produces.
    pub fn width(&self) -> u32 {
        self.inner.lock().width()
    }

    /// Height of buffers this pool produces.
    pub fn height(&self) -> u32 {
        self.inner.lock().height()
    }

    /// Pixel format of buffers this pool produces.
    pub fn format(&self) -> PixelFormat {
        self.inner.lock().format()
    }

    /// Number of buffers currently pooled.
    pub fn available(&self) -> usize {
        self.inner.lock().available()
    }
}

impl Clone for SharedPixelBufferPool {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
