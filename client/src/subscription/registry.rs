use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, warn};

use pvproxy_shared::ChannelId;

use crate::transport::{Transport, TransportStatus};

use super::handler::SubscriptionHandle;

type Entry = Arc<Mutex<Vec<SubscriptionHandle>>>;

/// Tracks the live subscriptions of every channel.
///
/// Each channel's list sits behind its own lock; the outer map lock is only
/// held long enough to find or retire an entry. Cancelling a subscription
/// issues the transport unsubscribe after every lock has been released.
pub struct SubscriptionRegistry {
    transport: Arc<dyn Transport>,
    entries: RwLock<HashMap<ChannelId, Entry>>,
}

impl SubscriptionRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Records a live subscription. Returns false if it was already known.
    pub fn add(&self, handle: SubscriptionHandle) -> bool {
        {
            let entries = self.read_entries();
            if let Some(entry) = entries.get(&handle.channel()) {
                return push_unique(&mut lock_entry(entry), handle);
            }
        }

        let mut entries = self.write_entries();
        let entry = entries.entry(handle.channel()).or_default();
        let added = push_unique(&mut lock_entry(entry), handle);
        added
    }

    /// Cancels one subscription. Unknown handles are a no-op returning false.
    pub fn remove(&self, handle: SubscriptionHandle) -> Result<bool, TransportStatus> {
        let (found, now_empty) = {
            let entries = self.read_entries();
            let Some(entry) = entries.get(&handle.channel()) else {
                return Ok(false);
            };
            let mut handles = lock_entry(entry);
            let Some(position) = handles.iter().position(|h| *h == handle) else {
                return Ok(false);
            };
            handles.remove(position);
            (true, handles.is_empty())
        };

        if now_empty {
            self.retire_if_empty(handle.channel());
        }

        debug!("Cancelling subscription {} on {}", handle.id(), handle.channel());
        self.transport.unsubscribe(handle.id())?;
        Ok(found)
    }

    /// Cancels every subscription on `channel`, returning how many there
    /// were. All of them are attempted; the first transport failure is
    /// reported afterwards.
    pub fn remove_all_for(&self, channel: ChannelId) -> Result<usize, TransportStatus> {
        let entry = self.write_entries().remove(&channel);
        let Some(entry) = entry else {
            return Ok(0);
        };
        let removed = std::mem::take(&mut *lock_entry(&entry));

        self.cancel(removed)
    }

    /// Cancels everything. Safe to call repeatedly and on an empty registry.
    pub fn remove_all(&self) -> Result<usize, TransportStatus> {
        let drained: Vec<Entry> = self
            .write_entries()
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        let removed = drained
            .iter()
            .flat_map(|entry| std::mem::take(&mut *lock_entry(entry)))
            .collect();

        self.cancel(removed)
    }

    pub fn contains(&self, handle: SubscriptionHandle) -> bool {
        self.read_entries()
            .get(&handle.channel())
            .is_some_and(|entry| lock_entry(entry).contains(&handle))
    }

    pub fn subscriptions_for(&self, channel: ChannelId) -> Vec<SubscriptionHandle> {
        self.read_entries()
            .get(&channel)
            .map(|entry| lock_entry(entry).clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.read_entries()
            .values()
            .map(|entry| lock_entry(entry).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cancel(&self, handles: Vec<SubscriptionHandle>) -> Result<usize, TransportStatus> {
        let count = handles.len();
        let mut first_error = None;

        for handle in handles {
            debug!("Cancelling subscription {} on {}", handle.id(), handle.channel());
            if let Err(status) = self.transport.unsubscribe(handle.id()) {
                warn!(
                    "Failed to cancel subscription {} on {}: {}",
                    handle.id(),
                    handle.channel(),
                    status
                );
                first_error.get_or_insert(status);
            }
        }

        match first_error {
            Some(status) => Err(status),
            None => Ok(count),
        }
    }

    fn retire_if_empty(&self, channel: ChannelId) {
        let mut entries = self.write_entries();
        let empty = entries
            .get(&channel)
            .is_some_and(|entry| lock_entry(entry).is_empty());
        if empty {
            entries.remove(&channel);
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<ChannelId, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<ChannelId, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock_entry(entry: &Entry) -> MutexGuard<'_, Vec<SubscriptionHandle>> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn push_unique(handles: &mut Vec<SubscriptionHandle>, handle: SubscriptionHandle) -> bool {
    if handles.contains(&handle) {
        return false;
    }
    handles.push(handle);
    true
}
