/// Records whether the pattern index is stale.
///
/// Any node change (added, removed, toggled) invalidates the whole index,
/// since rebuilds are not incremental. Call
/// [`mark_clean`](DirtyTracker::mark_clean) after rebuilding.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    topology_dirty: bool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the network topology, or a node's offered patterns, as changed.
    pub fn mark_topology(&mut self) {
        self.topology_dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.topology_dirty
    }

    pub fn mark_clean(&mut self) {
        self.topology_dirty = false;
    }
}
