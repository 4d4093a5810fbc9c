//! Capture-cycle driver.
//!
//! Runs a [`ScreenCapturer`] serially on the calling thread:
//!
//! 1. Select the configured screen (falling back to the full desktop).
//! 2. Each cycle, call `capture_frame` and hand the frame to a
//!    [`FrameSink`].
//! 3. Temporary failures are counted and retried on the next cycle.
//! 4. A permanent failure stops the loop and is returned to the caller,
//!    which is expected to tear the session down.
//!
//! The loop checks a shared stop flag before every cycle so another
//! thread can stop it. A stop requested before `run` starts is honoured.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::desktop::capturer::{FULL_DESKTOP_SCREEN_ID, ScreenCapturer, ScreenId};
use crate::desktop::frame::Frame;
use crate::error::{CaptureError, CaptureStatus, DeskError};

// ── FrameSink ────────────────────────────────────────────────────

/// Receiver of successfully captured frames.
///
/// The frame is only borrowed for the duration of the call; sinks that
/// keep it must copy it.
pub trait FrameSink {
    fn on_frame(&mut self, frame: &Frame);
}

impl<F: FnMut(&Frame)> FrameSink for F {
    fn on_frame(&mut self, frame: &Frame) {
        self(frame)
    }
}

// ── CaptureConfig ────────────────────────────────────────────────

/// Configuration for [`CaptureDriver`].
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target frames per second (clamped to 1..=120).
    pub target_fps: u32,
    /// Screen to capture.
    pub screen_id: ScreenId,
    /// Stop after this many successful captures.
    pub max_frames: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            screen_id: FULL_DESKTOP_SCREEN_ID,
            max_frames: None,
        }
    }
}

/// Counters reported by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Successful captures.
    pub captured: u64,
    /// Cycles that ended in a temporary failure.
    pub temporary_failures: u64,
}

// ── CaptureDriver ────────────────────────────────────────────────

/// The capture loop.
pub struct CaptureDriver<C: ScreenCapturer> {
    capturer: C,
    config: CaptureConfig,
    stop_requested: Arc<AtomicBool>,
    stats: CaptureStats,
}

impl<C: ScreenCapturer> CaptureDriver<C> {
    pub fn new(capturer: C, config: CaptureConfig) -> Self {
        Self {
            capturer,
            config,
            stop_requested: Arc::new(AtomicBool::new(false)),
            stats: CaptureStats::default(),
        }
    }

    /// A cloneable handle that can be used to stop the loop from
    /// another thread: store `true` to stop. Never cleared by the driver.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_requested)
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn capturer(&self) -> &C {
        &self.capturer
    }

    pub fn capturer_mut(&mut self) -> &mut C {
        &mut self.capturer
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn into_capturer(self) -> C {
        self.capturer
    }

    /// Select the configured screen. An unknown screen or a failed
    /// enumeration falls back to the full desktop.
    pub fn select_configured_screen(&mut self) -> ScreenId {
        match self.capturer.screen_list() {
            Ok(screens) => debug!(count = screens.len(), ?screens, "screens enumerated"),
            Err(e) => warn!("screen enumeration failed: {e}"),
        }

        let wanted = self.config.screen_id;
        match self.capturer.select_screen(wanted) {
            Ok(()) => wanted,
            Err(e) => {
                warn!("{e}; capturing the full desktop instead");
                // The composite selection is always accepted.
                let _ = self.capturer.select_screen(FULL_DESKTOP_SCREEN_ID);
                FULL_DESKTOP_SCREEN_ID
            }
        }
    }

    /// Run exactly one capture cycle.
    ///
    /// Returns `Ok(Succeeded)` or `Ok(Temporary)`; a permanent failure
    /// is returned as `Err`.
    pub fn cycle<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<CaptureStatus, DeskError> {
        match self.capturer.capture_frame() {
            Ok(frame) => {
                sink.on_frame(frame);
                self.stats.captured += 1;
                Ok(CaptureStatus::Succeeded)
            }
            Err(CaptureError::Temporary(reason)) => {
                warn!("capture skipped: {reason}");
                self.stats.temporary_failures += 1;
                Ok(CaptureStatus::Temporary)
            }
            Err(e @ CaptureError::Permanent(_)) => {
                error!("{e}");
                Err(e.into())
            }
        }
    }

    /// Run the capture loop until stopped, the frame limit is reached,
    /// or a permanent failure occurs.
    pub fn run<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<CaptureStats, DeskError> {
        let screen = self.select_configured_screen();
        let fps = self.config.target_fps.clamp(1, 120);
        let interval = Duration::from_secs_f64(1.0 / fps as f64);
        info!(screen, fps, "capture loop started");

        while !self.is_stop_requested() {
            if self
                .config
                .max_frames
                .is_some_and(|max| self.stats.captured >= max)
            {
                break;
            }

            let cycle_start = Instant::now();
            self.cycle(sink)?;
            Self::pace(cycle_start, interval);
        }

        info!(
            captured = self.stats.captured,
            temporary_failures = self.stats.temporary_failures,
            "capture loop finished"
        );
        Ok(self.stats)
    }

    /// Signal the loop to stop.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Sleep for the remainder of the frame interval.
    fn pace(cycle_start: Instant, interval: Duration) {
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::geometry::Size;
    use crate::desktop::synthetic::SyntheticScreenCapturer;

    fn capturer() -> SyntheticScreenCapturer {
        SyntheticScreenCapturer::new([("Main", Size::new(32, 16)), ("Secondary", Size::new(16, 16))])
    }

    fn fast(max_frames: u64, screen_id: ScreenId) -> CaptureConfig {
        CaptureConfig {
            target_fps: 120,
            screen_id,
            max_frames: Some(max_frames),
        }
    }

    #[test]
    fn delivers_frames_until_limit() {
        let mut driver = CaptureDriver::new(capturer(), fast(3, 1));
        let mut sizes = Vec::new();
        let stats = driver.run(&mut |frame: &Frame| sizes.push(frame.size())).unwrap();

        assert_eq!(stats.captured, 3);
        assert_eq!(sizes, vec![Size::new(16, 16); 3]);
        assert!(!driver.is_stop_requested());
    }

    #[test]
    fn unknown_screen_falls_back_to_full_desktop() {
        let mut driver = CaptureDriver::new(capturer(), fast(1, 9));
        let mut sizes = Vec::new();
        driver.run(&mut |frame: &Frame| sizes.push(frame.size())).unwrap();
        assert_eq!(sizes, vec![Size::new(48, 16)]);
    }

    #[test]
    fn temporary_failures_are_retried() {
        let mut capturer = capturer();
        capturer.inject_failure(CaptureError::temporary("display reconfiguring"));
        capturer.inject_failure(CaptureError::temporary("session locked"));

        let mut driver = CaptureDriver::new(capturer, fast(2, FULL_DESKTOP_SCREEN_ID));
        let mut count = 0;
        let stats = driver.run(&mut |_: &Frame| count += 1).unwrap();

        assert_eq!(count, 2);
        assert_eq!(stats.temporary_failures, 2);
    }

    #[test]
    fn permanent_failure_stops_the_loop() {
        let mut capturer = capturer();
        capturer.inject_failure(CaptureError::permanent("display surface gone"));

        let mut driver = CaptureDriver::new(capturer, fast(5, FULL_DESKTOP_SCREEN_ID));
        let mut count = 0;
        let result = driver.run(&mut |_: &Frame| count += 1);

        assert!(matches!(result, Err(DeskError::Capture(CaptureError::Permanent(_)))));
        assert_eq!(count, 0);
        assert_eq!(driver.stats().captured, 0);
    }

    #[test]
    fn stop_handle_ends_the_loop() {
        let mut driver = CaptureDriver::new(
            capturer(),
            CaptureConfig {
                target_fps: 120,
                ..CaptureConfig::default()
            },
        );
        let handle = driver.stop_handle();
        let stats = driver
            .run(&mut |_: &Frame| handle.store(true, Ordering::SeqCst))
            .unwrap();
        assert_eq!(stats.captured, 1);
    }

    #[test]
    fn stop_before_run_captures_nothing() {
        let mut driver = CaptureDriver::new(capturer(), fast(3, FULL_DESKTOP_SCREEN_ID));
        driver.stop();

        let mut count = 0;
        let stats = driver.run(&mut |_: &Frame| count += 1).unwrap();
        assert_eq!(count, 0);
        assert_eq!(stats.captured, 0);

        // Stays stopped; the driver never clears the request.
        assert_eq!(driver.run(&mut |_: &Frame| count += 1).unwrap().captured, 0);
    }

    #[test]
    fn stop_handle_set_from_another_thread_before_run() {
        let mut driver = CaptureDriver::new(capturer(), fast(3, FULL_DESKTOP_SCREEN_ID));
        let handle = driver.stop_handle();
        std::thread::spawn(move || handle.store(true, Ordering::SeqCst))
            .join()
            .unwrap();

        let stats = driver.run(&mut |_: &Frame| {}).unwrap();
        assert_eq!(stats.captured, 0);
    }
}
