//! Per-client conversation memory with idle eviction.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use crate::dialogue::states::Step;
use crate::domain::client::ClientId;

pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

#[derive(Clone, Debug)]
struct SessionEntry {
    step: Step,
    touched_at: DateTime<Utc>,
}

pub struct SessionStore {
    entries: Mutex<HashMap<ClientId, SessionEntry>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS))
    }
}

impl SessionStore {
    pub fn new(idle_timeout: std::time::Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_timeout: Duration::from_std(idle_timeout).unwrap_or_else(|_| Duration::days(365)),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ClientId, SessionEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_idle(&self, entry: &SessionEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.touched_at) > self.idle_timeout
    }

    /// Current step, or `None` when absent or idle past the timeout.
    pub fn load(&self, client: ClientId, now: DateTime<Utc>) -> Option<Step> {
        let mut entries = self.entries();
        let idle = entries.get(&client).map(|entry| self.is_idle(entry, now))?;
        if idle {
            entries.remove(&client);
            return None;
        }
        entries.get(&client).map(|entry| entry.step.clone())
    }

    pub fn save(&self, client: ClientId, step: Step, now: DateTime<Utc>) {
        self.entries().insert(client, SessionEntry { step, touched_at: now });
    }

    pub fn clear(&self, client: ClientId) {
        self.entries().remove(&client);
    }

    /// Drops every idle session and returns how many were evicted.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_idle(entry, now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
