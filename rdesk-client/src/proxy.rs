//! Thread-confined delivery to the desktop window.
//!
//! [`DesktopWindowProxy`] accepts window mutations from any thread. A
//! call made on the UI thread is forwarded immediately; a call made
//! anywhere else is packaged with its arguments and posted to the UI
//! task queue. Once the window has been detached, queued calls become
//! no-ops.
//!
//! ```text
//!  decoder / clipboard / session threads          UI thread
//!  ─────────────────────────────────────          ─────────
//!  proxy.draw_frame(f) ──post_task──────────────► task: window? ─► draw_frame(f)
//!                                                           └─ detached: drop
//!  proxy.allocate_frame(size) ─► FrameFactory (synchronous, any thread)
//! ```
//!
//! [`WindowHost`] owns the window and its proxy and performs the
//! attach/detach bracket.

use std::cell::{Ref, RefCell, RefMut, UnsafeCell};
use std::ptr::NonNull;
use std::sync::Arc;

use rdesk_core::protocol::{ClipboardEvent, ScreenList, SystemInfo, Version, VideoEncodings};
use rdesk_core::{Frame, FrameFactory, MouseCursor, Size};
use tracing::{debug, trace};

use crate::task_runner::TaskRunner;
use crate::window::{DesktopControl, DesktopWindow};

// ── WindowSlot ───────────────────────────────────────────────────

/// Back-reference to the window. Read and cleared only on the UI thread.
struct WindowSlot(UnsafeCell<Option<NonNull<RefCell<dyn DesktopWindow>>>>);

// SAFETY: the pointer is only dereferenced, and the slot only written,
// on the thread the proxy's task runner belongs to (checked before every
// access). Other threads only move the slot around inside an `Arc`.
unsafe impl Send for WindowSlot {}
unsafe impl Sync for WindowSlot {}

// ── DesktopWindowProxy ───────────────────────────────────────────

/// Cross-thread facade over a [`DesktopWindow`].
pub struct DesktopWindowProxy {
    ui_task_runner: Arc<dyn TaskRunner>,
    frame_factory: Arc<dyn FrameFactory>,
    window: WindowSlot,
}

impl DesktopWindowProxy {
    /// Attach a proxy to `window`. Prefer [`WindowHost`], which upholds
    /// the contract below.
    ///
    /// # Safety
    ///
    /// `window` must stay valid until [`detach`](Self::detach) has been
    /// called, and `ui_task_runner` must run its tasks on the thread that
    /// owns `window`.
    pub unsafe fn new(
        ui_task_runner: Arc<dyn TaskRunner>,
        window: NonNull<RefCell<dyn DesktopWindow>>,
        frame_factory: Arc<dyn FrameFactory>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ui_task_runner,
            frame_factory,
            window: WindowSlot(UnsafeCell::new(Some(window))),
        })
    }

    /// Sever the link to the window. Call once, on the UI thread, before
    /// the window is destroyed.
    ///
    /// # Panics
    ///
    /// If called off the UI thread.
    pub fn detach(&self) {
        assert!(
            self.ui_task_runner.belongs_to_current_thread(),
            "detach must run on the UI thread"
        );
        // SAFETY: slot access is confined to the UI thread.
        unsafe { *self.window.0.get() = None };
        debug!("desktop window detached");
    }

    /// Whether the window is still reachable.
    ///
    /// # Panics
    ///
    /// If called off the UI thread.
    pub fn is_attached(&self) -> bool {
        assert!(
            self.ui_task_runner.belongs_to_current_thread(),
            "is_attached must run on the UI thread"
        );
        // SAFETY: slot access is confined to the UI thread.
        unsafe { (*self.window.0.get()).is_some() }
    }

    /// Allocate a frame from the window's factory. Runs on the caller's
    /// thread and works whether or not the window is still attached.
    pub fn allocate_frame(&self, size: Size) -> Frame {
        self.frame_factory.allocate_frame(size)
    }

    pub fn config_required(self: &Arc<Self>) {
        self.dispatch("config_required", |window| window.config_required());
    }

    pub fn set_capabilities(self: &Arc<Self>, extensions: impl Into<String>, video_encodings: VideoEncodings) {
        let extensions = extensions.into();
        self.dispatch("set_capabilities", move |window| {
            window.set_capabilities(&extensions, video_encodings)
        });
    }

    pub fn set_screen_list(self: &Arc<Self>, screen_list: ScreenList) {
        self.dispatch("set_screen_list", move |window| window.set_screen_list(&screen_list));
    }

    pub fn set_system_info(self: &Arc<Self>, system_info: SystemInfo) {
        self.dispatch("set_system_info", move |window| window.set_system_info(&system_info));
    }

    pub fn show_window(self: &Arc<Self>, control: Arc<dyn DesktopControl>, peer_version: Version) {
        self.dispatch("show_window", move |window| window.show_window(control, peer_version));
    }

    pub fn draw_frame(self: &Arc<Self>, frame: Arc<Frame>) {
        self.dispatch("draw_frame", move |window| window.draw_frame(frame));
    }

    pub fn draw_mouse_cursor(self: &Arc<Self>, cursor: Arc<MouseCursor>) {
        self.dispatch("draw_mouse_cursor", move |window| window.draw_mouse_cursor(cursor));
    }

    pub fn inject_clipboard_event(self: &Arc<Self>, event: ClipboardEvent) {
        self.dispatch("inject_clipboard_event", move |window| {
            window.inject_clipboard_event(&event)
        });
    }

    /// Run `call` against the window now if we are on the UI thread,
    /// otherwise post it there.
    fn dispatch<F>(self: &Arc<Self>, name: &'static str, call: F)
    where
        F: FnOnce(&mut dyn DesktopWindow) + Send + 'static,
    {
        if self.ui_task_runner.belongs_to_current_thread() {
            self.forward(name, call);
            return;
        }

        let this = Arc::clone(self);
        self.ui_task_runner
            .post_task(Box::new(move || this.forward(name, call)));
    }

    /// A call made while the window is already borrowed (a window method
    /// calling back into the proxy) is posted behind the current task.
    fn forward<F>(self: &Arc<Self>, name: &'static str, call: F)
    where
        F: FnOnce(&mut dyn DesktopWindow) + Send + 'static,
    {
        debug_assert!(self.ui_task_runner.belongs_to_current_thread());
        // SAFETY: slot access is confined to the UI thread.
        let Some(window) = (unsafe { *self.window.0.get() }) else {
            trace!(call = name, "desktop window detached, call dropped");
            return;
        };
        // SAFETY: while the slot is filled the owner keeps the window alive,
        // and we are on the thread that owns it.
        let window = unsafe { window.as_ref() };
        let Ok(mut window) = window.try_borrow_mut() else {
            debug!(call = name, "desktop window busy, call deferred");
            let this = Arc::clone(self);
            self.ui_task_runner
                .post_task(Box::new(move || this.forward(name, call)));
            return;
        };
        trace!(call = name, "forwarding to desktop window");
        call(&mut *window);
    }
}

impl Drop for DesktopWindowProxy {
    fn drop(&mut self) {
        assert!(
            self.window.0.get_mut().is_none(),
            "DesktopWindowProxy dropped while still attached to a window"
        );
    }
}

// ── WindowHost ───────────────────────────────────────────────────

/// Owner of a desktop window and its proxy. Lives on the UI thread.
///
/// Dropping the host detaches the proxy before the window is destroyed,
/// so tasks still in flight find nothing to call.
pub struct WindowHost<W: DesktopWindow + 'static> {
    proxy: Arc<DesktopWindowProxy>,
    window: NonNull<RefCell<W>>,
}

impl<W: DesktopWindow + 'static> WindowHost<W> {
    /// Take ownership of `window` and attach a proxy to it.
    ///
    /// # Panics
    ///
    /// If called off the thread `ui_task_runner` belongs to.
    pub fn new(ui_task_runner: Arc<dyn TaskRunner>, window: W) -> Self {
        assert!(
            ui_task_runner.belongs_to_current_thread(),
            "WindowHost must be created on the UI thread"
        );
        let frame_factory = window.frame_factory();
        let window = NonNull::from(Box::leak(Box::new(RefCell::new(window))));
        let target: NonNull<RefCell<dyn DesktopWindow>> = window;
        // SAFETY: the box is only freed in `Drop`, after `detach`, and the
        // host (being !Send) stays on the runner's thread.
        let proxy = unsafe { DesktopWindowProxy::new(ui_task_runner, target, frame_factory) };
        debug!("desktop window attached");
        Self { proxy, window }
    }

    /// Cloneable handle for producer threads.
    pub fn proxy(&self) -> Arc<DesktopWindowProxy> {
        Arc::clone(&self.proxy)
    }

    pub fn window(&self) -> Ref<'_, W> {
        // SAFETY: the box lives as long as `self`.
        unsafe { self.window.as_ref() }.borrow()
    }

    pub fn window_mut(&self) -> RefMut<'_, W> {
        // SAFETY: the box lives as long as `self`.
        unsafe { self.window.as_ref() }.borrow_mut()
    }
}

impl<W: DesktopWindow + 'static> Drop for WindowHost<W> {
    fn drop(&mut self) {
        self.proxy.detach();
        // SAFETY: allocated with `Box::leak` in `new`; the proxy no longer
        // refers to it.
        drop(unsafe { Box::from_raw(self.window.as_ptr()) });
    }
}
