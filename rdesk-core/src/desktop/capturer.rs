//! The screen capturer contract.
//!
//! A capturer enumerates capturable sources, captures the selected one
//! once per cycle and classifies failures. Concrete backends keep their
//! two most recent frames in a [`FrameQueue`](crate::desktop::FrameQueue)
//! so the returned frame stays valid until the next call.
//!
//! Capturers are not meant to be shared: a single capture loop drives
//! one instance serially, which `&mut self` enforces.

use std::sync::Arc;

use crate::desktop::frame::Frame;
use crate::desktop::shared_memory::SharedMemoryFactory;
use crate::error::{CaptureError, DeskError};

/// Opaque source handle.
pub type ScreenId = isize;

/// Virtual composite of all displays. Always selectable.
pub const FULL_DESKTOP_SCREEN_ID: ScreenId = -1;

/// Never a valid selection.
pub const INVALID_SCREEN_ID: ScreenId = -2;

/// A capturable source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Screen {
    pub id: ScreenId,
    pub title: String,
}

impl Screen {
    pub fn new(id: ScreenId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// Sources in enumeration order.
pub type ScreenList = Vec<Screen>;

/// Platform screen capture backend.
pub trait ScreenCapturer: Send {
    /// Number of selectable sources right now.
    fn screen_count(&self) -> usize;

    /// Enumerate sources. On error nothing is returned.
    fn screen_list(&self) -> Result<ScreenList, DeskError>;

    /// Target `screen_id` for the following captures.
    ///
    /// Fails with [`DeskError::InvalidScreen`] when the id is not
    /// currently enumerable. [`FULL_DESKTOP_SCREEN_ID`] always succeeds.
    fn select_screen(&mut self, screen_id: ScreenId) -> Result<(), DeskError>;

    /// Run one capture cycle.
    ///
    /// The frame is borrowed from the capturer and becomes unreachable
    /// on the next call. After a [`CaptureError::Permanent`] the caller
    /// must stop using this instance; after a [`CaptureError::Temporary`]
    /// it may simply call again on the next cycle.
    fn capture_frame(&mut self) -> Result<&Frame, CaptureError>;

    /// Drop both buffered frames and any per-session state. The shared
    /// memory factory stays registered.
    fn reset(&mut self);

    /// Register (or clear) the factory captured pixels are placed in.
    /// Buffered frames are dropped; the next capture allocates from the
    /// new factory and reports a full update.
    fn set_shared_memory_factory(&mut self, factory: Option<Arc<dyn SharedMemoryFactory>>);

    fn shared_memory_factory(&self) -> Option<Arc<dyn SharedMemoryFactory>>;
}

impl<C: ScreenCapturer + ?Sized> ScreenCapturer for Box<C> {
    fn screen_count(&self) -> usize {
        (**self).screen_count()
    }

    fn screen_list(&self) -> Result<ScreenList, DeskError> {
        (**self).screen_list()
    }

    fn select_screen(&mut self, screen_id: ScreenId) -> Result<(), DeskError> {
        (**self).select_screen(screen_id)
    }

    fn capture_frame(&mut self) -> Result<&Frame, CaptureError> {
        (**self).capture_frame()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn set_shared_memory_factory(&mut self, factory: Option<Arc<dyn SharedMemoryFactory>>) {
        (**self).set_shared_memory_factory(factory)
    }

    fn shared_memory_factory(&self) -> Option<Arc<dyn SharedMemoryFactory>> {
        (**self).shared_memory_factory()
    }
}

/// Build the native capturer for the running platform.
#[cfg(target_os = "windows")]
pub fn platform_capturer() -> Result<Box<dyn ScreenCapturer>, DeskError> {
    Ok(Box::new(crate::desktop::dxgi::DxgiScreenCapturer::new()?))
}

/// Build the native capturer for the running platform.
#[cfg(not(target_os = "windows"))]
pub fn platform_capturer() -> Result<Box<dyn ScreenCapturer>, DeskError> {
    Err(DeskError::Unsupported(
        "no native screen capture backend for this platform",
    ))
}
