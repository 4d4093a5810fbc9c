//! In-process host side of a session.
//!
//! Plays the part the network peer normally plays: announces
//! capabilities, screens and system info, then feeds captured frames to
//! the window through its proxy.

use std::sync::Arc;

use rdesk_core::protocol::{
    ClipboardEvent, Monitor, OperatingSystem, Processor, ScreenInfo, ScreenList, SystemInfo, Version,
    VideoEncodings,
};
use rdesk_core::{Frame, MouseCursor, Point, ScreenId, Size};
use tracing::{debug, warn};

use crate::config::ScreenConfig;
use crate::headless::LoopbackControl;
use crate::proxy::DesktopWindowProxy;

/// Extensions the loopback host advertises.
pub const EXTENSIONS: &str = "clipboard,cursor_shape,system_info";

/// Our own version, as reported to the window.
pub fn local_version() -> Version {
    Version::new(
        env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
    )
}

/// Screen list as the window sees it. Ids follow configuration order.
pub fn screen_list(screens: &[ScreenConfig], current_screen: ScreenId) -> ScreenList {
    ScreenList {
        screens: screens
            .iter()
            .enumerate()
            .map(|(index, screen)| ScreenInfo {
                id: index as ScreenId,
                title: screen.title.clone(),
                resolution: screen.size(),
            })
            .collect(),
        current_screen,
    }
}

/// What little we know about this machine without asking the OS.
pub fn local_system_info(screens: &[ScreenConfig]) -> SystemInfo {
    SystemInfo {
        computer_name: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into()),
        operating_system: OperatingSystem {
            name: std::env::consts::OS.into(),
            version: String::new(),
            arch: std::env::consts::ARCH.into(),
        },
        processor: Processor {
            threads: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            ..Default::default()
        },
        monitors: screens
            .iter()
            .map(|screen| Monitor {
                name: screen.title.clone(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// 16x16 white arrow with the hotspot at its tip.
pub fn arrow_cursor() -> Option<MouseCursor> {
    const SIDE: u32 = 16;
    let image = (0..SIDE)
        .flat_map(|y| (0..SIDE).map(move |x| if x <= y / 2 { [0xff; 4] } else { [0; 4] }))
        .flatten()
        .collect();
    MouseCursor::new(Size::new(SIDE, SIDE), Point { x: 0, y: 0 }, image)
}

/// Run the session handshake against the window.
pub fn negotiate(proxy: &Arc<DesktopWindowProxy>, screens: &[ScreenConfig], current_screen: ScreenId) {
    debug!("negotiating loopback session");
    proxy.config_required();
    proxy.set_capabilities(EXTENSIONS, VideoEncodings::ZSTD | VideoEncodings::VP8);
    proxy.set_screen_list(screen_list(screens, current_screen));
    proxy.set_system_info(local_system_info(screens));
    proxy.show_window(Arc::new(LoopbackControl::default()), local_version());
    if let Some(cursor) = arrow_cursor() {
        proxy.draw_mouse_cursor(Arc::new(cursor));
    }
    proxy.inject_clipboard_event(ClipboardEvent::text("rdesk loopback session"));
}

/// Copy a captured frame into a window-allocated frame and publish it.
///
/// The captured frame is only valid until the next capture, so its
/// pixels are copied before it is handed over.
pub fn deliver_frame(proxy: &Arc<DesktopWindowProxy>, captured: &Frame) {
    let mut frame = proxy.allocate_frame(captured.size());
    match frame.copy_from(captured) {
        Ok(()) => proxy.draw_frame(Arc::new(frame)),
        Err(e) => warn!("frame dropped: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_ids_follow_config_order() {
        let screens = [
            ScreenConfig {
                title: "A".into(),
                width: 10,
                height: 10,
            },
            ScreenConfig {
                title: "B".into(),
                width: 20,
                height: 5,
            },
        ];
        let list = screen_list(&screens, 1);
        assert_eq!(list.current_screen, 1);
        assert_eq!(list.screens[1].id, 1);
        assert_eq!(list.screens[1].resolution, Size::new(20, 5));
        assert_eq!(local_system_info(&screens).monitors.len(), 2);
    }

    #[test]
    fn arrow_cursor_is_well_formed() {
        let cursor = arrow_cursor().unwrap();
        assert_eq!(cursor.size(), Size::new(16, 16));
        assert_eq!(&cursor.image()[..4], &[0xff; 4]);
        assert_eq!(&cursor.image()[4..8], &[0; 4]);
    }
}
