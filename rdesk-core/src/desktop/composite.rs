//! Result of a capture cycle that composes several outputs.

use crate::error::CaptureError;

/// What one output contributed to a composed capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputUpdate {
    /// A new image arrived this cycle.
    Fresh,
    /// Nothing new within the acquire window. The last image still stands.
    Unchanged,
}

/// A composed cycle yields a frame as long as one output produced a new
/// image. Idle outputs keep their previous pixels and never fail the
/// cycle on their own.
pub fn composite_status(updates: &[OutputUpdate]) -> Result<(), CaptureError> {
    if updates.contains(&OutputUpdate::Fresh) {
        Ok(())
    } else {
        Err(CaptureError::temporary("no new desktop frame"))
    }
}
