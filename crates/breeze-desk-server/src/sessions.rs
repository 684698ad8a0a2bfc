use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use breeze_desk_broker::broker::BrokerSession;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle a caller presents to reuse a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

struct Entry {
    session: BrokerSession,
    opened_at: Instant,
}

/// In-memory sessions keyed by `SessionId`. Entries expire after `ttl`.
pub struct SessionRegistry {
    ttl: Duration,
    entries: RwLock<HashMap<SessionId, Entry>>,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly opened session under a new id.
    pub fn open(&self, session: BrokerSession) -> SessionId {
        let id = SessionId::new();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.opened_at.elapsed() < self.ttl);
        entries.insert(
            id,
            Entry {
                session,
                opened_at: Instant::now(),
            },
        );
        id
    }

    pub fn get(&self, id: &SessionId) -> Option<BrokerSession> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(id) {
                Some(entry) if entry.opened_at.elapsed() < self.ttl => {
                    return Some(entry.session.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        self.close(id);
        None
    }

    /// Look up a session by its textual id; malformed ids find nothing.
    pub fn lookup(&self, raw: &str) -> Option<BrokerSession> {
        raw.parse::<SessionId>().ok().and_then(|id| self.get(&id))
    }

    pub fn close(&self, id: &SessionId) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    /// Number of entries, expired ones included until they are next touched.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
