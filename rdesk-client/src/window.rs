//! The desktop window's mutation surface.
//!
//! A [`DesktopWindow`] lives on the UI thread and is never shared.
//! Producers on other threads reach it only through
//! [`DesktopWindowProxy`](crate::proxy::DesktopWindowProxy).

use std::sync::Arc;

use rdesk_core::protocol::{ClipboardEvent, ScreenInfo, ScreenList, SystemInfo, Version, VideoEncodings};
use rdesk_core::{Frame, FrameFactory, MouseCursor};

/// Operations the session may perform on the window.
pub trait DesktopWindow {
    /// Allocator for frames the window will later draw.
    fn frame_factory(&self) -> Arc<dyn FrameFactory>;

    /// The host asks the user to pick session settings.
    fn config_required(&mut self);

    fn set_capabilities(&mut self, extensions: &str, video_encodings: VideoEncodings);

    fn set_screen_list(&mut self, screen_list: &ScreenList);

    fn set_system_info(&mut self, system_info: &SystemInfo);

    /// Session is established: show the window and keep `control` for
    /// requests back to the host.
    fn show_window(&mut self, control: Arc<dyn DesktopControl>, peer_version: Version);

    fn draw_frame(&mut self, frame: Arc<Frame>);

    fn draw_mouse_cursor(&mut self, cursor: Arc<MouseCursor>);

    fn inject_clipboard_event(&mut self, event: &ClipboardEvent);
}

/// Requests from the window back to the host.
pub trait DesktopControl: Send + Sync {
    fn select_screen(&self, screen: &ScreenInfo);

    fn inject_clipboard_event(&self, event: &ClipboardEvent);
}
