//! Task grouping keys.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Opaque identifier grouping related tasks for bulk lookup and cancellation.
///
/// Every task carries exactly one key. Tasks that are never re-keyed share
/// [`TaskKey::DEFAULT`]. Bind everything that belongs to one subject (a
/// connected player, an NPC, a minigame instance) to the same key so the whole
/// group can be torn down with a single [`TaskManager::cancel`] call.
///
/// [`TaskManager::cancel`]: crate::core::TaskManager::cancel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKey {
    /// The process-wide default key.
    Default,
    /// Numeric identifier, e.g. a player or entity index.
    Id(u64),
    /// Named identifier, e.g. `player:zezima` or `minigame:pest-control`.
    Named(Arc<str>),
    /// Freshly generated unique identifier.
    Unique(Uuid),
}

impl TaskKey {
    /// The key assigned to every task at construction.
    pub const DEFAULT: Self = Self::Default;

    /// Key for a numeric subject.
    #[must_use]
    pub const fn id(id: u64) -> Self {
        Self::Id(id)
    }

    /// Key for a named subject.
    pub fn named(name: impl AsRef<str>) -> Self {
        Self::Named(Arc::from(name.as_ref()))
    }

    /// A new key no other subject shares.
    #[must_use]
    pub fn unique() -> Self {
        Self::Unique(Uuid::new_v4())
    }

    /// Whether this is the default key.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl Default for TaskKey {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("<default>"),
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Named(name) => write!(f, "{name}"),
            Self::Unique(uuid) => write!(f, "{uuid}"),
        }
    }
}

impl From<u64> for TaskKey {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for TaskKey {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for TaskKey {
    fn from(name: String) -> Self {
        Self::Named(Arc::from(name))
    }
}

impl From<Uuid> for TaskKey {
    fn from(uuid: Uuid) -> Self {
        Self::Unique(uuid)
    }
}
