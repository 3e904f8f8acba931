//! Core types shared by the queue and the watch pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for a queued item.
///
/// The nil value is a sentinel meaning "not yet assigned"; `enqueue` replaces
/// it with a freshly generated id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generate a fresh globally unique id.
    pub fn generate() -> Self {
        ItemId(Uuid::new_v4())
    }

    /// The unassigned sentinel.
    pub fn nil() -> Self {
        ItemId(Uuid::nil())
    }

    /// Whether this id is the unassigned sentinel.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        ItemId::nil()
    }
}

impl From<Uuid> for ItemId {
    fn from(id: Uuid) -> Self {
        ItemId(id)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a queued item sits in its lifecycle.
///
/// Stored verbatim as `"Waiting"` / `"Processing"`; backends and dashboards
/// rely on these exact strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueState {
    /// Eligible to be claimed by a consumer.
    Waiting,
    /// Claimed; the lease runs until completion or the staleness threshold.
    Processing,
}

impl Default for QueueState {
    fn default() -> Self {
        QueueState::Waiting
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueState::Waiting => write!(f, "Waiting"),
            QueueState::Processing => write!(f, "Processing"),
        }
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }

    /// This timestamp moved `window` into the past, saturating at zero.
    pub fn minus(self, window: Duration) -> Self {
        Timestamp(self.0.saturating_sub(window.as_micros() as i64))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Implemented by payloads stored in a `PersistedQueue`.
///
/// The queue owns these three fields and rewrites them as the item moves
/// through its lifecycle; callers should treat them as opaque bookkeeping
/// and only read them for diagnostics.
pub trait Queueable {
    fn id(&self) -> ItemId;
    fn set_id(&mut self, id: ItemId);

    fn state(&self) -> QueueState;
    fn set_state(&mut self, state: QueueState);

    fn last_state_changed(&self) -> Timestamp;
    fn set_last_state_changed(&mut self, at: Timestamp);
}

/// Creation and modification bookkeeping stamped by repositories.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub created_at: Timestamp,
    pub created_by: String,
    pub modified_at: Timestamp,
    pub modified_by: String,
}

/// Implemented by entities stored in a `Repository`.
///
/// An empty id means "not yet assigned"; `add` fills it in. Audit fields are
/// stamped by the repository on every write.
pub trait Storable {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    fn audit(&self) -> &AuditStamp;
    fn audit_mut(&mut self) -> &mut AuditStamp;
}
