//! Block-level comparison of two consecutive frames.
//!
//! Divides the frame into `block_size × block_size` tiles and compares
//! each tile byte-for-byte. Capturers use the result to fill
//! [`Frame::updated_region`] after rotating their [`FrameQueue`].
//!
//! [`FrameQueue`]: crate::desktop::FrameQueue

use std::cmp;

use crate::desktop::frame::Frame;
use crate::desktop::geometry::Rect;

/// Default tile edge in pixels.
pub const DEFAULT_BLOCK_SIZE: u32 = 32;

/// Tiles of `current` that differ from `previous`, in frame-relative
/// coordinates.
///
/// Without a comparable previous frame (none, or a different size or
/// format) the whole frame is reported as changed.
pub fn changed_blocks(current: &Frame, previous: Option<&Frame>, block_size: u32) -> Vec<Rect> {
    let full = vec![Rect::from_size(current.size())];

    let Some(previous) = previous else {
        return full;
    };
    if previous.size() != current.size() || previous.format() != current.format() {
        return full;
    }

    let bs = block_size.max(1) as usize;
    let w = current.size().width as usize;
    let h = current.size().height as usize;
    let blocks_x = w.div_ceil(bs);
    let blocks_y = h.div_ceil(bs);

    let mut changed = Vec::new();

    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let start_x = bx * bs;
            let start_y = by * bs;
            let end_x = cmp::min(start_x + bs, w);
            let end_y = cmp::min(start_y + bs, h);

            if block_differs(current, previous, start_x, start_y, end_x, end_y) {
                changed.push(Rect::new(
                    start_x as i32,
                    start_y as i32,
                    (end_x - start_x) as u32,
                    (end_y - start_y) as u32,
                ));
            }
        }
    }

    changed
}

/// Row-by-row byte comparison for a rectangular tile.
fn block_differs(
    current: &Frame,
    previous: &Frame,
    start_x: usize,
    start_y: usize,
    end_x: usize,
    end_y: usize,
) -> bool {
    let bpp = current.format().bytes_per_pixel();
    let left = start_x * bpp;
    let right = end_x * bpp;

    (start_y..end_y).any(|y| {
        let y = y as u32;
        current.row(y)[left..right] != previous.row(y)[left..right]
    })
}
