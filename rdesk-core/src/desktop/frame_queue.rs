//! Two-slot rotation of captured frames.
//!
//! A capture cycle calls [`FrameQueue::move_to_next_frame`], stores the
//! new capture with [`FrameQueue::replace_current_frame`], then compares
//! [`current_frame`](FrameQueue::current_frame) against
//! [`previous_frame`](FrameQueue::previous_frame). The queue only tracks
//! ownership; it never looks inside the frames.

const QUEUE_LENGTH: usize = 2;

/// Owns the current and previous frame of a capturer.
#[derive(Debug)]
pub struct FrameQueue<T> {
    /// Index of the current slot.
    current: usize,
    frames: [Option<T>; QUEUE_LENGTH],
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self {
            current: 0,
            frames: [None, None],
        }
    }
}

impl<T> FrameQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current frame becomes the previous one. Slot contents are
    /// untouched; the new current slot still holds the oldest frame
    /// until it is replaced.
    pub fn move_to_next_frame(&mut self) {
        self.current = (self.current + 1) % QUEUE_LENGTH;
    }

    /// Store `frame` in the current slot, dropping whatever was there.
    pub fn replace_current_frame(&mut self, frame: T) {
        self.frames[self.current] = Some(frame);
    }

    /// Drop both frames and rewind to slot 0.
    pub fn reset(&mut self) {
        self.frames = [None, None];
        self.current = 0;
    }

    pub fn current_frame(&self) -> Option<&T> {
        self.frames[self.current].as_ref()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut T> {
        self.frames[self.current].as_mut()
    }

    pub fn previous_frame(&self) -> Option<&T> {
        self.frames[(self.current + QUEUE_LENGTH - 1) % QUEUE_LENGTH].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn empty_queue_has_no_frames() {
        let queue: FrameQueue<u32> = FrameQueue::new();
        assert!(queue.current_frame().is_none());
        assert!(queue.previous_frame().is_none());
    }

    #[test]
    fn toggle_then_replace_rotates() {
        let mut queue = FrameQueue::new();
        queue.move_to_next_frame();
        queue.replace_current_frame("first");
        assert_eq!(queue.current_frame(), Some(&"first"));
        assert_eq!(queue.previous_frame(), None);

        queue.move_to_next_frame();
        queue.replace_current_frame("second");
        assert_eq!(queue.current_frame(), Some(&"second"));
        assert_eq!(queue.previous_frame(), Some(&"first"));

        queue.move_to_next_frame();
        queue.replace_current_frame("third");
        assert_eq!(queue.current_frame(), Some(&"third"));
        assert_eq!(queue.previous_frame(), Some(&"second"));
    }

    #[test]
    fn toggle_does_not_touch_contents() {
        let mut queue = FrameQueue::new();
        queue.replace_current_frame(1);
        queue.move_to_next_frame();
        queue.replace_current_frame(2);

        queue.move_to_next_frame();
        assert_eq!(queue.current_frame(), Some(&1));
        assert_eq!(queue.previous_frame(), Some(&2));
        queue.move_to_next_frame();
        assert_eq!(queue.current_frame(), Some(&2));
        assert_eq!(queue.previous_frame(), Some(&1));
    }

    #[test]
    fn replace_drops_prior_occupant() {
        let first = Rc::new(());
        let mut queue = FrameQueue::new();
        queue.replace_current_frame(Rc::clone(&first));
        assert_eq!(Rc::strong_count(&first), 2);
        queue.replace_current_frame(Rc::new(()));
        assert_eq!(Rc::strong_count(&first), 1);
    }

    #[test]
    fn current_and_previous_are_distinct_after_two_replacements() {
        let mut queue = FrameQueue::new();
        let ops = [true, false, true, true, false, false, true, false, true, true];
        let mut replacements = 0;
        let mut next_id = 0u32;

        for toggle in ops {
            if toggle {
                queue.move_to_next_frame();
            }
            queue.replace_current_frame(Box::new(next_id));
            next_id += 1;
            replacements += 1;

            if replacements >= 2 {
                if let (Some(cur), Some(prev)) = (queue.current_frame(), queue.previous_frame()) {
                    assert!(!std::ptr::eq(cur.as_ref(), prev.as_ref()));
                    assert_ne!(cur, prev);
                }
            }
        }
    }

    #[test]
    fn reset_clears_and_rewinds() {
        let mut queue = FrameQueue::new();
        queue.move_to_next_frame();
        queue.replace_current_frame(5);
        queue.reset();
        assert!(queue.current_frame().is_none());
        assert!(queue.previous_frame().is_none());

        // Slot 0 is current again: a replace followed by a toggle puts
        // the value in the previous position.
        queue.replace_current_frame(6);
        queue.move_to_next_frame();
        assert_eq!(queue.previous_frame(), Some(&6));
    }
}
