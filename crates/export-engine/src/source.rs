//! Frame sources and the scoped frame cache.

use std::ops::{Deref, DerefMut};

/// One rendered frame, packed RGBA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Position of the frame in the export range.
    pub number: u64,
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, row-major.
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// A black frame of the given size.
    pub fn blank(number: u64, width: u32, height: u32) -> Self {
        Self {
            number,
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }
}

/// Renders timeline frames on demand.
///
/// Rendering is deterministic for a given timeline state and may be
/// expensive. A source can keep a frame cache while an export runs; the
/// export loop brackets the run with [`acquire_cache`](Self::acquire_cache)
/// and [`release_cache`](Self::release_cache) through a [`CacheScope`].
pub trait FrameSource {
    fn render(&mut self, frame_number: u64) -> FrameBuffer;

    fn acquire_cache(&mut self, _max_frames: usize) {}

    fn release_cache(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn render(&mut self, frame_number: u64) -> FrameBuffer {
        (**self).render(frame_number)
    }

    fn acquire_cache(&mut self, max_frames: usize) {
        (**self).acquire_cache(max_frames);
    }

    fn release_cache(&mut self) {
        (**self).release_cache();
    }
}

/// Holds a source's cache for the lifetime of the guard.
///
/// The cache is released when the guard drops, on every exit path.
pub struct CacheScope<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
}

impl<'a, S: FrameSource + ?Sized> CacheScope<'a, S> {
    pub fn acquire(source: &'a mut S, max_frames: usize) -> Self {
        source.acquire_cache(max_frames);
        tracing::debug!(max_frames, "Frame cache acquired");
        Self { source }
    }
}

impl<S: FrameSource + ?Sized> Deref for CacheScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.source
    }
}

impl<S: FrameSource + ?Sized> DerefMut for CacheScope<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.source
    }
}

impl<S: FrameSource + ?Sized> Drop for CacheScope<'_, S> {
    fn drop(&mut self) {
        self.source.release_cache();
        tracing::debug!("Frame cache released");
    }
}

/// Deterministic moving color bars, for exercising sinks without a timeline.
#[derive(Debug, Clone)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    cache_limit: Option<usize>,
}

const BARS: [[u8; 3]; 7] = [
    [192, 192, 192],
    [192, 192, 0],
    [0, 192, 192],
    [0, 192, 0],
    [192, 0, 192],
    [192, 0, 0],
    [0, 0, 192],
];

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            cache_limit: None,
        }
    }

    /// Cache size currently held, if any.
    pub fn cache_limit(&self) -> Option<usize> {
        self.cache_limit
    }
}

impl FrameSource for TestPatternSource {
    fn render(&mut self, frame_number: u64) -> FrameBuffer {
        let mut frame = FrameBuffer::blank(frame_number, self.width, self.height);
        let bar_width = (self.width as usize / BARS.len()).max(1);
        let shift = frame_number as usize;
        for (i, pixel) in frame.data.chunks_exact_mut(4).enumerate() {
            let x = i % self.width as usize;
            let bar = ((x + shift) / bar_width) % BARS.len();
            pixel[..3].copy_from_slice(&BARS[bar]);
            pixel[3] = 255;
        }
        frame
    }

    fn acquire_cache(&mut self, max_frames: usize) {
        self.cache_limit = Some(max_frames);
    }

    fn release_cache(&mut self) {
        self.cache_limit = None;
    }
}
