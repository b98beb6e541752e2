use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use uuid::Uuid;

new_key_type! {
    /// Identifies a producer node (crafter, pattern container) in a network.
    pub struct NodeId;

    /// Identifies a crafting task owned by a scheduler.
    pub struct TaskId;
}

/// Identifies a resource kind (an item or fluid type). Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KindId(pub u32);

/// Identifies a family of interchangeable kinds for fuzzy matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FamilyId(pub u32);

/// Stable identity of a storage disk. The nil UUID is the "null" id and is
/// rejected by registry mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiskId(pub Uuid);

impl DiskId {
    /// The null disk id.
    pub const NIL: DiskId = DiskId(Uuid::nil());

    /// Generate a fresh random id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parse a hyphenated UUID string. Returns `None` for malformed input.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
