//! CSRF state store
//!
//! Correlates the `state` parameter of a provider redirect with the provider
//! that issued it. Entries are single use and live in process memory only.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use tracing::debug;

/// Random bytes per state value
const STATE_BYTES: usize = 16;

/// Lookup failure; unknown, replayed and purged states look the same
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("invalid oauth state")]
    InvalidState,
}

#[derive(Debug, Clone)]
struct PendingLogin {
    provider: String,
    issued_at: Instant,
}

/// Single-use correlation table for login redirects
#[derive(Debug, Default)]
pub struct StateStore {
    pending: Mutex<HashMap<String, PendingLogin>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingLogin>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a new pending login and return its state value
    pub fn issue(&self, provider: &str) -> String {
        let mut pending = self.lock();
        loop {
            let state = random_state();
            if pending.contains_key(&state) {
                continue;
            }
            pending.insert(
                state.clone(),
                PendingLogin {
                    provider: provider.to_string(),
                    issued_at: Instant::now(),
                },
            );
            return state;
        }
    }

    /// Look up and remove a state value, returning the provider name
    pub fn consume(&self, state: &str) -> Result<String, StateError> {
        self.lock()
            .remove(state)
            .map(|login| login.provider)
            .ok_or(StateError::InvalidState)
    }

    /// Drop entries issued more than `age` ago, returning how many went
    pub fn purge_older_than(&self, age: Duration) -> usize {
        let now = Instant::now();
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, login| now.saturating_duration_since(login.issued_at) <= age);
        let purged = before - pending.len();
        if purged > 0 {
            debug!(purged, "Purged stale login states");
        }
        purged
    }

    /// Number of outstanding logins
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
