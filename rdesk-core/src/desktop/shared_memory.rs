//! Shared memory segments that captured pixels can be written into.
//!
//! A transport that exposes its buffers to another process registers a
//! [`SharedMemoryFactory`] on the capturer. Frames allocated through the
//! factory carry the segment id, so the peer can locate the pixels
//! without a copy.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use memmap2::MmapMut;
use tracing::trace;

use crate::error::DeskError;

/// Identifier of a registered segment.
pub type SharedMemoryId = u32;

type ReleaseHook = Box<dyn FnOnce(SharedMemoryId) + Send + Sync>;

// ── SharedMemory ─────────────────────────────────────────────────

/// One mapped segment. Unregisters itself from its factory on drop.
pub struct SharedMemory {
    id: SharedMemoryId,
    map: MmapMut,
    release: Option<ReleaseHook>,
}

impl SharedMemory {
    /// Wrap an existing mapping. `release` runs once when the segment
    /// is dropped.
    pub fn new(id: SharedMemoryId, map: MmapMut, release: Option<ReleaseHook>) -> Self {
        Self { id, map, release }
    }

    pub fn id(&self) -> SharedMemoryId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.map
    }
}

impl fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMemory")
            .field("id", &self.id)
            .field("len", &self.map.len())
            .finish()
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
        }
    }
}

// ── SharedMemoryFactory ──────────────────────────────────────────

/// Source of pre-registered segments for zero-copy frames.
pub trait SharedMemoryFactory: Send + Sync {
    /// Create a segment of at least `size` bytes.
    fn create(&self, size: usize) -> Result<SharedMemory, DeskError>;
}

// ── MappedMemoryFactory ──────────────────────────────────────────

/// Factory backed by anonymous memory mappings.
///
/// Keeps a registry of live segments (id → size) so a transport can
/// tell which ids are still valid.
#[derive(Default)]
pub struct MappedMemoryFactory {
    next_id: AtomicU32,
    live: Arc<Mutex<HashMap<SharedMemoryId, usize>>>,
}

impl MappedMemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of segments that have not been dropped yet.
    pub fn live_segments(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    /// Size of a live segment.
    pub fn segment_size(&self, id: SharedMemoryId) -> Option<usize> {
        self.live.lock().ok()?.get(&id).copied()
    }
}

impl SharedMemoryFactory for MappedMemoryFactory {
    fn create(&self, size: usize) -> Result<SharedMemory, DeskError> {
        if size == 0 {
            return Err(DeskError::SharedMemory("zero-length segment".into()));
        }

        let map = MmapMut::map_anon(size)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.live
            .lock()
            .map_err(|_| DeskError::SharedMemory("segment registry poisoned".into()))?
            .insert(id, size);
        trace!(id, size, "shared memory segment created");

        let live = Arc::clone(&self.live);
        let release: ReleaseHook = Box::new(move |id| {
            if let Ok(mut live) = live.lock() {
                live.remove(&id);
            }
            trace!(id, "shared memory segment released");
        });

        Ok(SharedMemory::new(id, map, Some(release)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_register_and_release() {
        let factory = MappedMemoryFactory::new();
        let a = factory.create(4096).unwrap();
        let b = factory.create(128).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(factory.live_segments(), 2);
        assert_eq!(factory.segment_size(b.id()), Some(128));

        drop(a);
        assert_eq!(factory.live_segments(), 1);
        drop(b);
        assert_eq!(factory.live_segments(), 0);
    }

    #[test]
    fn segment_is_writable() {
        let factory = MappedMemoryFactory::new();
        let mut seg = factory.create(16).unwrap();
        seg.as_mut_slice()[3] = 0xAB;
        assert_eq!(seg.as_slice()[3], 0xAB);
        assert_eq!(seg.len(), 16);
    }

    #[test]
    fn zero_length_is_rejected() {
        let factory = MappedMemoryFactory::new();
        assert!(matches!(factory.create(0), Err(DeskError::SharedMemory(_))));
    }
}
