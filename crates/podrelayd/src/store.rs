//! Latest-value staging slots shared by every client session.
//!
//! One slot per [`NotificationCategory`]. The device event pump overwrites
//! slots with [`NotificationStore::set`]; push legs drain them with
//! [`NotificationStore::take_all`]. There is no queueing: a record that is
//! overwritten before anyone drains it is gone.
//!
//! Draining clears the slot for everyone. With several clients connected,
//! whichever push leg drains first delivers a given record and the others
//! never see it. Sessions that need every update must not share a store.
//!
//! # Wake-ups
//!
//! Every `set` bumps a version counter on a `watch` channel. A push leg that
//! found the store empty awaits `changed()` instead of spinning.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::trace;

use podrelay_core::{NotificationCategory, NotificationRecord};

type Slots = [Option<NotificationRecord>; NotificationCategory::COUNT];

/// Shared set of single-slot mailboxes, one per notification category.
#[derive(Debug)]
pub struct NotificationStore {
    slots: Mutex<Slots>,
    version: watch::Sender<u64>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            slots: Mutex::new(Default::default()),
            version,
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        // Slots hold plain data, a panic mid-update cannot leave them torn
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Overwrites the slot for the record's category.
    ///
    /// Never waits on readers. Returns the undelivered record it replaced.
    pub fn set(&self, record: NotificationRecord) -> Option<NotificationRecord> {
        let category = record.category();
        let replaced = {
            let mut slots = self.slots();
            slots
                .get_mut(category.index())
                .and_then(|slot| slot.replace(record))
        };

        if replaced.is_some() {
            trace!(category = %category, "Overwrote undelivered record");
        }

        self.bump();
        replaced
    }

    /// Puts a record back only if its slot is still empty.
    ///
    /// Used when a push leg drained a record it could not deliver. A newer
    /// record that arrived meanwhile wins. Returns true if the record was
    /// restored.
    pub fn restore(&self, record: NotificationRecord) -> bool {
        let restored = {
            let mut slots = self.slots();
            match slots.get_mut(record.category().index()) {
                Some(slot) if slot.is_none() => {
                    *slot = Some(record);
                    true
                }
                _ => false,
            }
        };

        if restored {
            self.bump();
        }
        restored
    }

    /// Atomically removes and returns every pending record, in category order.
    pub fn take_all(&self) -> Vec<(NotificationCategory, NotificationRecord)> {
        let mut slots = self.slots();
        slots
            .iter_mut()
            .zip(NotificationCategory::ALL)
            .filter_map(|(slot, category)| slot.take().map(|record| (category, record)))
            .collect()
    }

    /// Returns the pending record for a category without draining it.
    pub fn peek(&self, category: NotificationCategory) -> Option<NotificationRecord> {
        self.slots()
            .get(category.index())
            .and_then(|slot| slot.clone())
    }

    /// Number of categories with a pending record.
    pub fn pending(&self) -> usize {
        self.slots().iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Subscribes to change notifications.
    ///
    /// The receiver's `changed()` resolves after any `set` or `restore`
    /// that happened since the last observed change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump(&self) {
        self.version.send_modify(|version| *version = version.wrapping_add(1));
    }
}
