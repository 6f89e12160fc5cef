use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Process-unique actor handle.
///
/// Identity is the numeric value alone; the type name is carried for
/// reporting. Ids are assigned by the runtime in creation order, so sorting
/// by id gives a stable order for building schedule points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorId {
    value: u64,
    name: String,
}

impl ActorId {
    pub fn new(value: u64, name: impl Into<String>) -> Self {
        ActorId {
            value,
            name: name.into(),
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// The actor's type name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for ActorId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for ActorId {}

impl Hash for ActorId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for ActorId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.value)
    }
}
