//! Deterministic in-process capturer.
//!
//! Renders a test pattern for a configurable set of virtual displays.
//! Failures can be scripted, which makes it the backend used by the
//! demo client and by the capture loop tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::desktop::capturer::{
    FULL_DESKTOP_SCREEN_ID, Screen, ScreenCapturer, ScreenId, ScreenList,
};
use crate::desktop::diff::{self, DEFAULT_BLOCK_SIZE};
use crate::desktop::frame::{Frame, PixelFormat};
use crate::desktop::frame_queue::FrameQueue;
use crate::desktop::geometry::{Rect, Size};
use crate::desktop::shared_memory::SharedMemoryFactory;
use crate::error::{CaptureError, DeskError};

/// Width of the moving bar drawn into every frame.
const BAR_WIDTH: u32 = 16;

/// One virtual display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticScreen {
    pub id: ScreenId,
    pub title: String,
    /// Placement in virtual-desktop coordinates.
    pub rect: Rect,
}

/// Capturer that paints frames instead of reading them from the OS.
pub struct SyntheticScreenCapturer {
    screens: Vec<SyntheticScreen>,
    selected: ScreenId,
    queue: FrameQueue<Frame>,
    shared_memory: Option<Arc<dyn SharedMemoryFactory>>,
    scripted_failures: VecDeque<CaptureError>,
    /// Set after a permanent failure; cleared by `reset`.
    broken: Option<String>,
    enumeration_broken: bool,
    frame_counter: u64,
}

impl SyntheticScreenCapturer {
    /// Displays placed left to right with ids `0..n`.
    pub fn new<I, S>(screens: I) -> Self
    where
        I: IntoIterator<Item = (S, Size)>,
        S: Into<String>,
    {
        let mut x = 0;
        let layout = screens
            .into_iter()
            .enumerate()
            .map(|(index, (title, size))| {
                let rect = Rect::new(x, 0, size.width, size.height);
                x += size.width as i32;
                SyntheticScreen {
                    id: index as ScreenId,
                    title: title.into(),
                    rect,
                }
            })
            .collect();
        Self::with_layout(layout)
    }

    /// Displays with explicit ids and placement.
    pub fn with_layout(screens: Vec<SyntheticScreen>) -> Self {
        Self {
            screens,
            selected: FULL_DESKTOP_SCREEN_ID,
            queue: FrameQueue::new(),
            shared_memory: None,
            scripted_failures: VecDeque::new(),
            broken: None,
            enumeration_broken: false,
            frame_counter: 0,
        }
    }

    /// Make an upcoming `capture_frame` call fail with `failure`.
    /// Failures are consumed in the order they were injected.
    pub fn inject_failure(&mut self, failure: CaptureError) {
        self.scripted_failures.push_back(failure);
    }

    /// Make `screen_list` fail until turned off again.
    pub fn set_enumeration_failure(&mut self, fail: bool) {
        self.enumeration_broken = fail;
    }

    /// Unplug a display. Returns `false` if no such display exists.
    pub fn disconnect_screen(&mut self, screen_id: ScreenId) -> bool {
        let before = self.screens.len();
        self.screens.retain(|s| s.id != screen_id);
        before != self.screens.len()
    }

    pub fn selected_screen(&self) -> ScreenId {
        self.selected
    }

    /// Successful captures since creation or the last reset.
    pub fn frames_captured(&self) -> u64 {
        self.frame_counter
    }

    fn target_rect(&self) -> Option<Rect> {
        if self.selected == FULL_DESKTOP_SCREEN_ID {
            let all = self
                .screens
                .iter()
                .fold(Rect::default(), |acc, s| acc.union(&s.rect));
            return (!all.is_empty()).then_some(all);
        }
        self.screens
            .iter()
            .find(|s| s.id == self.selected)
            .map(|s| s.rect)
    }

    /// Checkerboard in desktop coordinates plus a bar that moves with
    /// every frame, so consecutive frames differ in a few tiles only.
    fn paint(frame: &mut Frame, rect: Rect, counter: u64) {
        let bpp = frame.format().bytes_per_pixel();
        let bar_x = ((counter * BAR_WIDTH as u64) % rect.width.max(1) as u64) as u32;

        for y in 0..rect.height {
            let gy = rect.y + y as i32;
            let row = frame.row_mut(y);
            for x in 0..rect.width {
                let gx = rect.x + x as i32;
                let value = if x >= bar_x && x < bar_x + BAR_WIDTH {
                    0xFF
                } else if (gx.div_euclid(64) + gy.div_euclid(64)) % 2 == 0 {
                    0x30
                } else {
                    0x50
                };
                let px = &mut row[x as usize * bpp..(x as usize + 1) * bpp];
                px.fill(value);
                if bpp == 4 {
                    px[3] = 0xFF;
                }
            }
        }
    }
}

impl ScreenCapturer for SyntheticScreenCapturer {
    fn screen_count(&self) -> usize {
        self.screens.len()
    }

    fn screen_list(&self) -> Result<ScreenList, DeskError> {
        if self.enumeration_broken {
            return Err(DeskError::Enumeration("virtual display list unavailable".into()));
        }
        Ok(self
            .screens
            .iter()
            .map(|s| Screen::new(s.id, s.title.clone()))
            .collect())
    }

    fn select_screen(&mut self, screen_id: ScreenId) -> Result<(), DeskError> {
        if screen_id != FULL_DESKTOP_SCREEN_ID && !self.screens.iter().any(|s| s.id == screen_id) {
            return Err(DeskError::InvalidScreen(screen_id));
        }
        debug!(screen_id, "screen selected");
        self.selected = screen_id;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<&Frame, CaptureError> {
        if let Some(reason) = &self.broken {
            return Err(CaptureError::Permanent(reason.clone()));
        }
        if let Some(failure) = self.scripted_failures.pop_front() {
            if let CaptureError::Permanent(reason) = &failure {
                self.broken = Some(reason.clone());
            }
            return Err(failure);
        }

        let Some(rect) = self.target_rect() else {
            if self.selected != FULL_DESKTOP_SCREEN_ID {
                debug!(screen_id = self.selected, "selected screen is gone, using full desktop");
                self.selected = FULL_DESKTOP_SCREEN_ID;
                return Err(CaptureError::temporary("selected screen was disconnected"));
            }
            return Err(CaptureError::temporary("no displays attached"));
        };

        self.queue.move_to_next_frame();

        let reusable = matches!(self.queue.current_frame(), Some(f) if f.size() == rect.size());
        if !reusable {
            let frame = Frame::allocate(rect.size(), PixelFormat::Bgra8, self.shared_memory.as_deref())
                .map_err(|e| CaptureError::permanent(e.to_string()))?;
            self.queue.replace_current_frame(frame);
        }

        self.frame_counter += 1;
        let counter = self.frame_counter;

        let Some(frame) = self.queue.current_frame_mut() else {
            return Err(CaptureError::temporary("frame slot is empty"));
        };
        Self::paint(frame, rect, counter);
        frame.set_top_left(rect.top_left());
        frame.set_capture_time(Instant::now());

        let region = match self.queue.current_frame() {
            Some(current) => {
                diff::changed_blocks(current, self.queue.previous_frame(), DEFAULT_BLOCK_SIZE)
            }
            None => Vec::new(),
        };
        trace!(frame = counter, changed = region.len(), "synthetic frame captured");

        let frame = self
            .queue
            .current_frame_mut()
            .ok_or_else(|| CaptureError::temporary("frame slot is empty"))?;
        frame.set_updated_region(region);
        Ok(frame)
    }

    fn reset(&mut self) {
        self.queue.reset();
        self.broken = None;
        self.frame_counter = 0;
    }

    fn set_shared_memory_factory(&mut self, factory: Option<Arc<dyn SharedMemoryFactory>>) {
        // Buffered frames belong to the old placement.
        self.queue.reset();
        self.shared_memory = factory;
    }

    fn shared_memory_factory(&self) -> Option<Arc<dyn SharedMemoryFactory>> {
        self.shared_memory.clone()
    }
}
