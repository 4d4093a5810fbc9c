//! Pixel buffers produced by capturers and consumed by the window.
//!
//! A [`Frame`] owns its pixels either on the heap or inside a
//! [`SharedMemory`] segment. Once a frame is published as `Arc<Frame>`
//! it is treated as immutable by every holder.

use std::fmt;
use std::time::Instant;

use tracing::warn;

use crate::desktop::geometry::{Point, Rect, Size};
use crate::desktop::shared_memory::{SharedMemory, SharedMemoryFactory, SharedMemoryId};
use crate::error::DeskError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (DXGI default).
    #[default]
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────

enum FrameBuffer {
    Heap(Vec<u8>),
    Shared(SharedMemory),
}

impl FrameBuffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            FrameBuffer::Heap(data) => data,
            FrameBuffer::Shared(memory) => memory.as_slice(),
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            FrameBuffer::Heap(data) => data,
            FrameBuffer::Shared(memory) => memory.as_mut_slice(),
        }
    }
}

/// One captured image with its geometry.
///
/// Rows are `stride` bytes apart. A shared-memory segment may be larger
/// than `stride * height`; the extra tail is never exposed.
pub struct Frame {
    size: Size,
    format: PixelFormat,
    stride: usize,
    /// Position of the frame in virtual-desktop coordinates.
    top_left: Point,
    /// Rectangles (frame-relative) that changed since the previous capture.
    updated_region: Vec<Rect>,
    capture_time: Instant,
    buffer: FrameBuffer,
}

impl Frame {
    /// Bytes needed for a tightly packed frame of `size`, or an error if
    /// that does not fit in `usize`.
    pub fn required_len(size: Size, format: PixelFormat) -> Result<usize, DeskError> {
        Self::packed_stride(size, format)?
            .checked_mul(size.height as usize)
            .ok_or(DeskError::FrameTooLarge(size))
    }

    fn packed_stride(size: Size, format: PixelFormat) -> Result<usize, DeskError> {
        (size.width as usize)
            .checked_mul(format.bytes_per_pixel())
            .ok_or(DeskError::FrameTooLarge(size))
    }

    /// Zero-filled heap frame.
    ///
    /// # Panics
    ///
    /// If the byte length of `size` overflows `usize`. Use
    /// [`try_new`](Self::try_new) for sizes that are not known to be sane.
    pub fn new(size: Size, format: PixelFormat) -> Self {
        match Self::try_new(size, format) {
            Ok(frame) => frame,
            Err(e) => panic!("{e}"),
        }
    }

    /// Zero-filled heap frame, failing on sizes that overflow.
    pub fn try_new(size: Size, format: PixelFormat) -> Result<Self, DeskError> {
        let stride = Self::packed_stride(size, format)?;
        let len = Self::required_len(size, format)?;
        Ok(Self::with_buffer(size, format, stride, FrameBuffer::Heap(vec![0; len])))
    }

    /// Frame whose pixels live in `memory`.
    pub fn in_shared_memory(
        size: Size,
        format: PixelFormat,
        memory: SharedMemory,
    ) -> Result<Self, DeskError> {
        let needed = Self::required_len(size, format)?;
        if memory.len() < needed {
            return Err(DeskError::SharedMemory(format!(
                "segment {} holds {} bytes, frame needs {needed}",
                memory.id(),
                memory.len(),
            )));
        }
        let stride = Self::packed_stride(size, format)?;
        Ok(Self::with_buffer(size, format, stride, FrameBuffer::Shared(memory)))
    }

    /// Allocate through `factory` when one is registered, otherwise on
    /// the heap. A failing factory also falls back to the heap; only a
    /// size that overflows is an error.
    pub fn allocate(
        size: Size,
        format: PixelFormat,
        factory: Option<&dyn SharedMemoryFactory>,
    ) -> Result<Self, DeskError> {
        let len = Self::required_len(size, format)?;
        let Some(factory) = factory else {
            return Self::try_new(size, format);
        };

        let shared = factory
            .create(len)
            .and_then(|memory| Self::in_shared_memory(size, format, memory));

        match shared {
            Ok(frame) => Ok(frame),
            Err(e) => {
                warn!("shared frame allocation failed, using heap: {e}");
                Self::try_new(size, format)
            }
        }
    }

    fn with_buffer(size: Size, format: PixelFormat, stride: usize, buffer: FrameBuffer) -> Self {
        Self {
            size,
            format,
            stride,
            top_left: Point::default(),
            updated_region: Vec::new(),
            capture_time: Instant::now(),
            buffer,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row pitch in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn set_top_left(&mut self, top_left: Point) {
        self.top_left = top_left;
    }

    pub fn updated_region(&self) -> &[Rect] {
        &self.updated_region
    }

    pub fn set_updated_region(&mut self, region: Vec<Rect>) {
        self.updated_region = region;
    }

    pub fn capture_time(&self) -> Instant {
        self.capture_time
    }

    pub fn set_capture_time(&mut self, at: Instant) {
        self.capture_time = at;
    }

    /// Id of the backing segment, if the frame lives in shared memory.
    pub fn shared_memory_id(&self) -> Option<SharedMemoryId> {
        match &self.buffer {
            FrameBuffer::Shared(memory) => Some(memory.id()),
            FrameBuffer::Heap(_) => None,
        }
    }

    /// Total byte size the bitmap occupies.
    pub fn byte_len(&self) -> usize {
        self.stride * self.size.height as usize
    }

    pub fn data(&self) -> &[u8] {
        let len = self.byte_len();
        &self.buffer.as_slice()[..len]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        let len = self.byte_len();
        &mut self.buffer.as_mut_slice()[..len]
    }

    /// Returns a row slice.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data()[start..start + self.stride]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let stride = self.stride;
        &mut self.data_mut()[start..start + stride]
    }

    /// Returns the pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride + x as usize * bpp;
        &self.data()[offset..offset + bpp]
    }

    /// Copy pixels and metadata from a frame of identical size and format.
    pub fn copy_from(&mut self, other: &Frame) -> Result<(), DeskError> {
        if other.size != self.size || other.format != self.format {
            return Err(DeskError::Other(format!(
                "cannot copy {:?}/{:?} frame into {:?}/{:?} frame",
                other.size, other.format, self.size, self.format,
            )));
        }
        let row_bytes = self.size.width as usize * self.format.bytes_per_pixel();
        for y in 0..self.size.height {
            self.row_mut(y)[..row_bytes].copy_from_slice(&other.row(y)[..row_bytes]);
        }
        self.top_left = other.top_left;
        self.updated_region = other.updated_region.clone();
        self.capture_time = other.capture_time;
        Ok(())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("size", &self.size)
            .field("format", &self.format)
            .field("stride", &self.stride)
            .field("top_left", &self.top_left)
            .field("updated_region", &self.updated_region)
            .field("shared_memory_id", &self.shared_memory_id())
            .finish()
    }
}

// ── FrameFactory ─────────────────────────────────────────────────

/// Allocator the window hands to producers so decoded frames arrive in
/// buffers it can draw from.
pub trait FrameFactory: Send + Sync {
    /// # Panics
    ///
    /// Implementations may panic if the byte length of `size` overflows.
    fn allocate_frame(&self, size: Size) -> Frame;
}

/// Plain heap allocation in a fixed pixel format.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapFrameFactory {
    format: PixelFormat,
}

impl HeapFrameFactory {
    pub fn new(format: PixelFormat) -> Self {
        Self { format }
    }
}

impl FrameFactory for HeapFrameFactory {
    fn allocate_frame(&self, size: Size) -> Frame {
        Frame::new(size, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::shared_memory::MappedMemoryFactory;

    struct FailingFactory;

    impl SharedMemoryFactory for FailingFactory {
        fn create(&self, _size: usize) -> Result<SharedMemory, DeskError> {
            Err(DeskError::SharedMemory("no segments left".into()))
        }
    }

    #[test]
    fn heap_frame_geometry() {
        let frame = Frame::new(Size::new(4, 3), PixelFormat::Bgra8);
        assert_eq!(frame.stride(), 16);
        assert_eq!(frame.byte_len(), 48);
        assert_eq!(frame.data().len(), 48);
        assert_eq!(frame.shared_memory_id(), None);
    }

    #[test]
    fn allocate_uses_registered_factory() {
        let factory = MappedMemoryFactory::new();
        let frame = Frame::allocate(Size::new(8, 8), PixelFormat::Bgra8, Some(&factory)).unwrap();
        assert!(frame.shared_memory_id().is_some());
        assert_eq!(factory.live_segments(), 1);
        drop(frame);
        assert_eq!(factory.live_segments(), 0);
    }

    #[test]
    fn allocate_without_factory_uses_heap() {
        let frame = Frame::allocate(Size::new(8, 8), PixelFormat::Rgb8, None).unwrap();
        assert_eq!(frame.shared_memory_id(), None);
        assert_eq!(frame.byte_len(), 8 * 8 * 3);
    }

    #[test]
    fn failing_factory_falls_back_to_heap() {
        let frame = Frame::allocate(Size::new(2, 2), PixelFormat::Bgra8, Some(&FailingFactory)).unwrap();
        assert_eq!(frame.shared_memory_id(), None);
        assert_eq!(frame.data().len(), 16);
    }

    #[test]
    fn undersized_segment_is_rejected() {
        let factory = MappedMemoryFactory::new();
        let memory = factory.create(10).unwrap();
        let result = Frame::in_shared_memory(Size::new(4, 4), PixelFormat::Bgra8, memory);
        assert!(matches!(result, Err(DeskError::SharedMemory(_))));
    }

    #[test]
    fn copy_between_heap_and_shared() {
        let mut src = Frame::new(Size::new(2, 2), PixelFormat::Bgra8);
        src.data_mut()[5] = 0x42;
        src.set_top_left(Point::new(100, 0));

        let factory = MappedMemoryFactory::new();
        let mut dst = Frame::allocate(Size::new(2, 2), PixelFormat::Bgra8, Some(&factory)).unwrap();
        dst.copy_from(&src).unwrap();
        assert_eq!(dst.pixel(1, 0)[1], 0x42);
        assert_eq!(dst.top_left(), Point::new(100, 0));

        let mut wrong = Frame::new(Size::new(3, 2), PixelFormat::Bgra8);
        assert!(wrong.copy_from(&src).is_err());
    }

    #[test]
    fn oversized_frame_is_an_error() {
        let huge = Size::new(u32::MAX, u32::MAX);
        assert!(matches!(
            Frame::required_len(huge, PixelFormat::Bgra8),
            Err(DeskError::FrameTooLarge(size)) if size == huge
        ));
        assert!(matches!(Frame::try_new(huge, PixelFormat::Bgra8), Err(DeskError::FrameTooLarge(_))));

        let factory = MappedMemoryFactory::new();
        let result = Frame::allocate(huge, PixelFormat::Bgra8, Some(&factory));
        assert!(matches!(result, Err(DeskError::FrameTooLarge(_))));
        assert_eq!(factory.live_segments(), 0);
    }

    #[test]
    #[should_panic(expected = "does not fit in memory")]
    fn new_panics_on_oversized_frame() {
        Frame::new(Size::new(u32::MAX, u32::MAX), PixelFormat::Rgb8);
    }
}
