//! The currently mounted archive, and hot replacement of it.
//!
//! Each successful mount creates a new generation. Requests pin the current
//! generation through an [`ArchiveHandle`] for as long as they read from it,
//! including while the response body streams. Replacing the archive only
//! swaps the pointer; the previous generation is closed by whichever of
//! `replace` or the last handle drop finds it demoted and idle.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{OpenError, ServeError};
use crate::store::ArchiveStore;
use crate::zip::ZipArchive;

/// One generation of the mounted archive.
pub struct MountedArchive {
    generation: u64,
    store: Arc<dyn ArchiveStore>,
    in_flight: AtomicUsize,
    current: AtomicBool,
    closed: AtomicBool,
}

impl MountedArchive {
    fn new(generation: u64, store: Arc<dyn ArchiveStore>) -> Self {
        Self {
            generation,
            store,
            in_flight: AtomicUsize::new(0),
            current: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn release(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.retire_if_idle();
        }
    }

    fn demote(&self) {
        self.current.store(false, Ordering::SeqCst);
        self.retire_if_idle();
    }

    fn retire_if_idle(&self) {
        if self.current.load(Ordering::SeqCst) || self.in_flight.load(Ordering::SeqCst) != 0 {
            return;
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.store.close();
        tracing::info!(
            generation = self.generation,
            source = self.store.source(),
            "archive released"
        );
    }
}

/// A request's reference to one generation. Dropping it releases the reference.
pub struct ArchiveHandle {
    mounted: Arc<MountedArchive>,
}

impl ArchiveHandle {
    pub fn store(&self) -> &dyn ArchiveStore {
        self.mounted.store.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.mounted.generation
    }
}

impl Drop for ArchiveHandle {
    fn drop(&mut self) {
        self.mounted.release();
    }
}

/// Owner of the current archive generation.
pub struct MountRegistry {
    current: RwLock<Option<Arc<MountedArchive>>>,
    last_generation: AtomicU64,
}

impl Default for MountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MountRegistry {
    /// A registry with nothing mounted; requests answer 503 until a mount.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            last_generation: AtomicU64::new(0),
        }
    }

    pub fn with_store(store: Arc<dyn ArchiveStore>) -> Self {
        let registry = Self::new();
        registry.replace(store);
        registry
    }

    /// Pin the current generation for the duration of one request.
    pub fn current(&self) -> Result<ArchiveHandle, ServeError> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        let mounted = guard.as_ref().ok_or(ServeError::ArchiveUnavailable)?;
        // Counted while the pointer is still read-locked, so a concurrent
        // replace either sees this reader or was never visible to it.
        mounted.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(ArchiveHandle {
            mounted: Arc::clone(mounted),
        })
    }

    /// Install `store` as the new current generation and return its number.
    ///
    /// Never waits for readers of the previous generation.
    pub fn replace(&self, store: Arc<dyn ArchiveStore>) -> u64 {
        let source = store.source().to_string();

        // Numbered under the write lock so installation order matches numbering.
        let (generation, previous) = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let generation = self.last_generation.fetch_add(1, Ordering::SeqCst) + 1;
            let previous = guard.replace(Arc::new(MountedArchive::new(generation, store)));
            (generation, previous)
        };

        tracing::info!(generation, source = %source, "archive mounted");

        if let Some(previous) = previous {
            tracing::debug!(
                generation = previous.generation,
                in_flight = previous.in_flight(),
                "archive demoted"
            );
            previous.demote();
        }
        generation
    }

    /// Open the archive at `location` and mount it. On failure the current
    /// mount is left untouched.
    pub async fn mount(&self, location: &str) -> Result<u64, OpenError> {
        match ZipArchive::open(location).await {
            Ok(archive) => Ok(self.replace(Arc::new(archive))),
            Err(err) => {
                tracing::warn!(location, "mount failed: {}", err);
                Err(err)
            }
        }
    }

    /// Generation number of the current mount, if any.
    pub fn generation(&self) -> Option<u64> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|m| m.generation)
    }

    /// The current generation record itself, for inspection.
    pub fn mounted(&self) -> Option<Arc<MountedArchive>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
