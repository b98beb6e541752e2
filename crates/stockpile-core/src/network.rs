//! One storage network: pooled disks, producer nodes and the scheduler.
//!
//! [`Network::step`] is the cycle driver:
//!
//! 1. Rebuild the pattern index if any node changed.
//! 2. Run one scheduler cycle.
//! 3. Tick every producer node and import what it finished: insert into
//!    storage, then offer the accepted quantity to the scheduler's `track`.
//!
//! Nodes only tick while the network is powered.

use crate::config::SchedulerConfig;
use crate::dirty::DirtyTracker;
use crate::disk::{DiskFactoryRegistry, DiskType, StorageDisk};
use crate::disk_registry::{DiskRegistryError, StorageDiskRegistry};
use crate::id::{DiskId, NodeId, TaskId};
use crate::node::{NodeSet, PatternContainer};
use crate::scheduler::CraftingScheduler;
use crate::stack::{CompareFlags, ResourceStack};
use crate::storage::{NetworkStorage, StorageNetwork};
use crate::task::{TaskContext, TaskFactoryRegistry};
use log::warn;
use serde_json::Value;
use slotmap::SlotMap;

#[derive(Debug)]
pub struct Network {
    storage: NetworkStorage,
    nodes: NodeSet,
    scheduler: CraftingScheduler,
    dirty: DirtyTracker,
    powered: bool,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Network {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_parts(
            StorageDiskRegistry::new(),
            CraftingScheduler::new(config, TaskFactoryRegistry::with_defaults()),
        )
    }

    pub fn with_parts(registry: StorageDiskRegistry, scheduler: CraftingScheduler) -> Self {
        Self {
            storage: NetworkStorage::new(registry),
            nodes: SlotMap::with_key(),
            scheduler,
            dirty: DirtyTracker::new(),
            powered: true,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn storage(&self) -> &NetworkStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut NetworkStorage {
        &mut self.storage
    }

    pub fn scheduler(&self) -> &CraftingScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut CraftingScheduler {
        &mut self.scheduler
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// An unpowered network only rehydrates persisted tasks; everything
    /// else waits.
    pub fn set_powered(&mut self, powered: bool) {
        self.powered = powered;
    }

    // -----------------------------------------------------------------------
    // Topology
    // -----------------------------------------------------------------------

    pub fn add_node(&mut self, node: Box<dyn PatternContainer>) -> NodeId {
        let id = self.nodes.insert(node);
        self.dirty.mark_topology();
        id
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<Box<dyn PatternContainer>> {
        let removed = self.nodes.remove(id);
        if removed.is_some() {
            self.dirty.mark_topology();
        }
        removed
    }

    /// Mutable access to a node. The node is assumed to change, so the
    /// pattern index is rebuilt at the next step.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Box<dyn PatternContainer>> {
        let node = self.nodes.get_mut(id)?;
        self.dirty.mark_topology();
        Some(node)
    }

    pub fn mark_topology_changed(&mut self) {
        self.dirty.mark_topology();
    }

    // -----------------------------------------------------------------------
    // Storage
    // -----------------------------------------------------------------------

    /// Register a fresh disk under a new id and mount it.
    pub fn add_disk(&mut self, disk: StorageDisk) -> Result<DiskId, DiskRegistryError> {
        let id = DiskId::new_v4();
        self.storage.registry_mut().set(id, disk)?;
        self.storage.mount(id);
        Ok(id)
    }

    /// Mount a disk that is already in the registry.
    pub fn mount_disk(&mut self, id: DiskId) -> bool {
        self.storage.mount(id)
    }

    pub fn insert(
        &mut self,
        disk_type: DiskType,
        stack: ResourceStack,
        simulate: bool,
    ) -> Option<ResourceStack> {
        self.storage.insert(disk_type, stack, simulate)
    }

    pub fn extract(
        &mut self,
        disk_type: DiskType,
        stack: &ResourceStack,
        amount: u32,
        flags: CompareFlags,
        simulate: bool,
    ) -> Option<ResourceStack> {
        self.storage.extract(disk_type, stack, amount, flags, simulate)
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Schedule production against the current item view.
    pub fn schedule(
        &mut self,
        request: &ResourceStack,
        quantity: u32,
        flags: CompareFlags,
    ) -> Option<TaskId> {
        if self.dirty.is_dirty() {
            self.rebuild();
        }
        let items = self.storage.list(DiskType::Items);
        self.scheduler.schedule(request, quantity, flags, items)
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.scheduler.cancel(id)
    }

    fn rebuild(&mut self) {
        self.scheduler.rebuild(&self.nodes);
        self.dirty.mark_clean();
    }

    /// Advance the network by one cycle.
    pub fn step(&mut self) {
        if self.dirty.is_dirty() {
            self.rebuild();
        }

        let mut ctx = TaskContext {
            storage: &mut self.storage,
            nodes: &mut self.nodes,
            cycle: self.scheduler.cycle(),
        };
        self.scheduler.update(&mut ctx, self.powered);

        if !self.powered {
            return;
        }
        let mut finished = Vec::new();
        for (_, node) in self.nodes.iter_mut() {
            finished.extend(node.tick());
        }
        for stack in finished {
            let offered = stack.quantity;
            let remainder = self.storage.insert(DiskType::Items, stack.clone(), false);
            let left = remainder.as_ref().map_or(0, |r| r.quantity);
            if offered > left {
                self.scheduler.track(&stack, offered - left);
            }
            if left > 0 {
                warn!(
                    "Network storage full, {} of kind {:?} lost",
                    left, stack.kind
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    pub fn write_disks(&self) -> Value {
        self.storage.registry().write()
    }

    /// Load disks and refresh the storage view. Returns the number loaded.
    pub fn read_disks(&mut self, doc: &Value, factories: &DiskFactoryRegistry) -> usize {
        let loaded = self.storage.registry_mut().read(doc, factories);
        self.storage.refresh();
        loaded
    }

    pub fn write_tasks(&self) -> Value {
        self.scheduler.write()
    }

    /// Queue task documents; they become tasks at the next step.
    pub fn read_tasks(&mut self, doc: &Value) -> usize {
        self.scheduler.read(doc)
    }
}
