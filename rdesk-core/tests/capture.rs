//! Integration tests: capturer contract, failure classification and
//! shared-memory placement through the public API.

use std::sync::Arc;

use rdesk_core::desktop::{MappedMemoryFactory, SharedMemoryFactory};
use rdesk_core::{
    CaptureError, CaptureStatus, DeskError, FULL_DESKTOP_SCREEN_ID, Rect, Screen, ScreenCapturer, Size,
    SyntheticScreenCapturer,
};

// ── Helpers ──────────────────────────────────────────────────────

fn main_and_secondary() -> SyntheticScreenCapturer {
    SyntheticScreenCapturer::new([
        ("Main", Size::new(64, 32)),
        ("Secondary", Size::new(40, 24)),
    ])
}

/// Drive the capturer through the trait object, the way a capture
/// loop holding a platform backend would.
fn status_of(capturer: &mut dyn ScreenCapturer) -> CaptureStatus {
    CaptureStatus::of(&capturer.capture_frame())
}

// ── Enumeration and selection ────────────────────────────────────

#[test]
fn selected_screen_geometry_is_captured() {
    let mut capturer = main_and_secondary();

    let screens = capturer.screen_list().unwrap();
    assert_eq!(
        screens,
        vec![Screen::new(0, "Main"), Screen::new(1, "Secondary")]
    );

    capturer.select_screen(1).unwrap();
    let frame = capturer.capture_frame().unwrap();
    assert_eq!(frame.size(), Size::new(40, 24));
    assert_eq!(frame.top_left().x, 64);
}

#[test]
fn full_desktop_is_always_selectable() {
    let mut capturer = SyntheticScreenCapturer::new(Vec::<(String, Size)>::new());
    assert_eq!(capturer.screen_count(), 0);
    assert!(capturer.select_screen(FULL_DESKTOP_SCREEN_ID).is_ok());

    // Nothing is attached yet: the capture is retryable, not fatal.
    assert_eq!(status_of(&mut capturer), CaptureStatus::Temporary);
}

#[test]
fn selection_failure_keeps_captured_frames() {
    let mut capturer = main_and_secondary();
    capturer.select_screen(0).unwrap();
    capturer.capture_frame().unwrap();

    assert!(matches!(capturer.select_screen(7), Err(DeskError::InvalidScreen(7))));

    let frame = capturer.capture_frame().unwrap();
    assert_eq!(frame.size(), Size::new(64, 32));
    assert!(frame.updated_region().iter().all(|r| r.width <= 32));
}

// ── Failure classification ───────────────────────────────────────

#[test]
fn temporary_failure_recovers_without_reset() {
    let mut capturer = main_and_secondary();
    capturer.select_screen(0).unwrap();
    capturer.capture_frame().unwrap();

    capturer.inject_failure(CaptureError::temporary("session locked"));
    assert_eq!(status_of(&mut capturer), CaptureStatus::Temporary);

    let frame = capturer.capture_frame().unwrap();
    // The pair captured before the failure is still in place, so the
    // update is a delta rather than a full frame.
    assert_eq!(frame.size(), Size::new(64, 32));
    assert_ne!(frame.updated_region(), [Rect::new(0, 0, 64, 32)]);
}

#[test]
fn permanent_failure_sticks_until_reset() {
    let mut capturer = main_and_secondary();
    capturer.inject_failure(CaptureError::permanent("display surface gone"));

    assert_eq!(status_of(&mut capturer), CaptureStatus::Permanent);
    assert_eq!(status_of(&mut capturer), CaptureStatus::Permanent);

    capturer.reset();
    assert_eq!(status_of(&mut capturer), CaptureStatus::Succeeded);
}

// ── Shared memory ────────────────────────────────────────────────

#[test]
fn shared_memory_factory_survives_reset() {
    let factory = Arc::new(MappedMemoryFactory::new());
    let mut capturer: Box<dyn ScreenCapturer> = Box::new(main_and_secondary());
    capturer.set_shared_memory_factory(Some(factory.clone() as Arc<dyn SharedMemoryFactory>));

    let id = capturer.capture_frame().unwrap().shared_memory_id();
    assert!(id.is_some());

    capturer.reset();
    assert!(capturer.shared_memory_factory().is_some());
    assert!(capturer.capture_frame().unwrap().shared_memory_id().is_some());

    capturer.set_shared_memory_factory(None);
    capturer.reset();
    assert_eq!(capturer.capture_frame().unwrap().shared_memory_id(), None);
    assert_eq!(factory.live_segments(), 0);
}
