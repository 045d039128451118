#![warn(missing_docs)]
//! # damage-scope-slots
//!
//! ## Purpose
//! Holds the fixed-size set of user-selected files for the multi-image
//! workflow and tracks whether every slot is filled.
//!
//! ## Responsibilities
//! - (Re)generate between [`MIN_SLOT_COUNT`] and [`MAX_SLOT_COUNT`] slots.
//! - Store one file per slot and recheck completeness on every change.
//! - Hand out copies of the selected files, in slot order, for submission.
//!
//! ## Ownership and lifetimes
//! The store exclusively owns its files until submission; [`MediaSlotStore::files_for_submission`]
//! clones them into the outgoing request.
//!
//! ## Error model
//! Out-of-range counts and indices return [`SlotError`] and leave the store
//! untouched. The store performs no I/O.
//!
//! ## Example
//! ```rust
//! use damage_scope_core::MediaFile;
//! use damage_scope_slots::MediaSlotStore;
//!
//! let mut store = MediaSlotStore::new();
//! store.configure(2).unwrap();
//! store.set_file(0, MediaFile::new("a.jpg", vec![1])).unwrap();
//! assert!(!store.is_complete());
//! store.set_file(1, MediaFile::new("b.jpg", vec![2])).unwrap();
//! assert!(store.is_complete());
//! ```

use damage_scope_core::{MAX_SLOT_COUNT, MIN_SLOT_COUNT, MediaFile};
use thiserror::Error;

/// Callback invoked with the new completeness flag after every recheck.
pub type CompletenessObserver = Box<dyn FnMut(bool) + Send>;

/// One position in the upload grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSlot {
    /// Zero-based slot index.
    pub index: usize,
    /// Selected file, if any.
    pub file: Option<MediaFile>,
}

impl MediaSlot {
    fn empty(index: usize) -> Self {
        Self { index, file: None }
    }

    /// Returns `true` when a file has been selected.
    pub fn is_filled(&self) -> bool {
        self.file.is_some()
    }

    /// Response key for this slot (`"Image <n>"`).
    pub fn key(&self) -> String {
        damage_scope_core::slot_key(self.index)
    }
}

/// Fixed-size slot set with completeness tracking.
pub struct MediaSlotStore {
    slots: Vec<MediaSlot>,
    observer: Option<CompletenessObserver>,
}

impl MediaSlotStore {
    /// Creates an unconfigured store (zero slots).
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            observer: None,
        }
    }

    /// Registers the completeness callback that enables or disables submission.
    pub fn on_completeness_change(&mut self, observer: impl FnMut(bool) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Discards every slot and creates `count` empty ones.
    ///
    /// # Errors
    /// Returns [`SlotError::InvalidCount`] when `count` is outside
    /// `1..=5`; prior configuration is kept.
    pub fn configure(&mut self, count: usize) -> Result<(), SlotError> {
        if !(MIN_SLOT_COUNT..=MAX_SLOT_COUNT).contains(&count) {
            return Err(SlotError::InvalidCount {
                requested: count,
                min: MIN_SLOT_COUNT,
                max: MAX_SLOT_COUNT,
            });
        }

        self.slots = (0..count).map(MediaSlot::empty).collect();
        self.recheck();
        Ok(())
    }

    /// Stores `file` in slot `index`, replacing any earlier selection.
    ///
    /// # Returns
    /// The completeness flag after the recheck.
    ///
    /// # Errors
    /// Returns [`SlotError::IndexOutOfRange`] when `index` is not a configured
    /// slot.
    pub fn set_file(&mut self, index: usize, file: MediaFile) -> Result<bool, SlotError> {
        let configured = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SlotError::IndexOutOfRange { index, configured })?;
        slot.file = Some(file);
        Ok(self.recheck())
    }

    /// Returns `true` iff at least one slot is configured and every slot is filled.
    pub fn is_complete(&self) -> bool {
        !self.slots.is_empty() && self.slots.iter().all(MediaSlot::is_filled)
    }

    /// Number of configured slots.
    pub fn required_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of filled slots.
    pub fn selected_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_filled()).count()
    }

    /// Read-only view of the configured slots.
    pub fn slots(&self) -> &[MediaSlot] {
        &self.slots
    }

    /// Copies every selected file in slot order.
    ///
    /// # Errors
    /// Returns [`SlotError::Incomplete`] when any slot is still empty.
    pub fn files_for_submission(&self) -> Result<Vec<MediaFile>, SlotError> {
        if !self.is_complete() {
            return Err(SlotError::Incomplete {
                selected: self.selected_count(),
                required: self.required_count(),
            });
        }

        Ok(self
            .slots
            .iter()
            .filter_map(|slot| slot.file.clone())
            .collect())
    }

    fn recheck(&mut self) -> bool {
        let complete = self.is_complete();
        if let Some(observer) = self.observer.as_mut() {
            observer(complete);
        }
        complete
    }
}

impl Default for MediaSlotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MediaSlotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSlotStore")
            .field("slots", &self.slots)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Slot store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// Requested slot count is outside the allowed range.
    #[error("invalid slot count {requested}: choose between {min} and {max} images")]
    InvalidCount {
        /// Requested count.
        requested: usize,
        /// Smallest allowed count.
        min: usize,
        /// Largest allowed count.
        max: usize,
    },
    /// Slot index is not currently configured.
    #[error("slot index {index} out of range ({configured} slots configured)")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of configured slots.
        configured: usize,
    },
    /// Not every slot has a file.
    #[error("{selected} of {required} images selected")]
    Incomplete {
        /// Filled slots.
        selected: usize,
        /// Configured slots.
        required: usize,
    },
}
