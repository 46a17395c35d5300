// src/protocol/registry.rs
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{Monitor, Protocol};
use crate::domain::SessionId;

pub type SharedMonitor<P> = Arc<Mutex<Monitor<P>>>;

/// What to do with a session whose monitor already reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorPolicy {
    /// Swap in a fresh monitor so the next cycle can start.
    #[default]
    Reset,
    /// Keep the finished monitor; further events are violations.
    Strict,
}

impl MonitorPolicy {
    pub fn is_strict(&self) -> bool {
        matches!(self, MonitorPolicy::Strict)
    }

    /// A request asking for strict checking overrides a resetting default.
    pub fn for_request(self, strict: bool) -> Self {
        if strict {
            MonitorPolicy::Strict
        } else {
            self
        }
    }
}

impl FromStr for MonitorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reset" => Ok(MonitorPolicy::Reset),
            "strict" => Ok(MonitorPolicy::Strict),
            _ => Err(format!("Unknown monitor policy: {}", s)),
        }
    }
}

/// Live monitors keyed by session id. Entries are never evicted.
pub struct SessionRegistry<P: Protocol> {
    sessions: Mutex<HashMap<SessionId, SharedMonitor<P>>>,
}

impl<P: Protocol> SessionRegistry<P> {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Lookup and create-or-reset happen under one lock.
    ///
    /// A monitor that is currently locked by another request is mid-cycle and
    /// is returned untouched, so the registry lock is never held while waiting
    /// on a session.
    pub fn get_or_create(&self, session_id: &str, strict: bool) -> SharedMonitor<P> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = sessions.get(session_id) {
            let finished = match existing.try_lock() {
                Ok(monitor) => monitor.is_done(),
                Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_done(),
                Err(std::sync::TryLockError::WouldBlock) => false,
            };
            if !finished || strict {
                return Arc::clone(existing);
            }
            debug!("{}: session {} finished, starting a new run", P::NAME, session_id);
        }

        let fresh = Arc::new(Mutex::new(Monitor::new()));
        sessions.insert(session_id.to_string(), Arc::clone(&fresh));
        fresh
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P: Protocol> Default for SessionRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
