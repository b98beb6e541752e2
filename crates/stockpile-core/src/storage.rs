//! The storage network view that tasks pull from and push to.
//!
//! [`StorageNetwork`] is the seam between the scheduler and whatever backs
//! the network's contents. [`NetworkStorage`] is the disk-backed
//! implementation: it owns the [`StorageDiskRegistry`], the list of disks
//! currently mounted in the network, and one aggregated [`StackList`] per
//! [`DiskType`] for fast lookups.

use crate::disk::DiskType;
use crate::disk_registry::StorageDiskRegistry;
use crate::id::DiskId;
use crate::stack::{CompareFlags, ResourceStack, StackList};

/// Insert/extract/list over the network's pooled storage.
pub trait StorageNetwork {
    /// Insert a stack. Returns the remainder that did not fit, if any.
    fn insert(
        &mut self,
        disk_type: DiskType,
        stack: ResourceStack,
        simulate: bool,
    ) -> Option<ResourceStack>;

    /// Extract up to `amount` of resources matching `stack` under `flags`.
    fn extract(
        &mut self,
        disk_type: DiskType,
        stack: &ResourceStack,
        amount: u32,
        flags: CompareFlags,
        simulate: bool,
    ) -> Option<ResourceStack>;

    /// Aggregated view of everything stored for `disk_type`.
    fn list(&self, disk_type: DiskType) -> &StackList;
}

/// Disk-backed storage for one network.
#[derive(Debug, Default)]
pub struct NetworkStorage {
    registry: StorageDiskRegistry,
    /// Mount order is priority order for insert and extract.
    mounted: Vec<DiskId>,
    items: StackList,
    fluids: StackList,
}

impl NetworkStorage {
    pub fn new(registry: StorageDiskRegistry) -> Self {
        let mut storage = Self {
            registry,
            ..Self::default()
        };
        storage.refresh();
        storage
    }

    pub fn registry(&self) -> &StorageDiskRegistry {
        &self.registry
    }

    /// Direct registry access. Call [`refresh`](Self::refresh) afterwards if
    /// mounted disk contents were changed.
    pub fn registry_mut(&mut self) -> &mut StorageDiskRegistry {
        &mut self.registry
    }

    pub fn mounted(&self) -> &[DiskId] {
        &self.mounted
    }

    /// Mount a registered disk. Returns `false` if the id is unknown or
    /// already mounted.
    pub fn mount(&mut self, id: DiskId) -> bool {
        if !self.registry.contains(id) || self.mounted.contains(&id) {
            return false;
        }
        self.mounted.push(id);
        self.refresh();
        true
    }

    /// Unmount a disk. The disk stays in the registry.
    pub fn unmount(&mut self, id: DiskId) -> bool {
        let before = self.mounted.len();
        self.mounted.retain(|m| *m != id);
        let changed = self.mounted.len() != before;
        if changed {
            self.refresh();
        }
        changed
    }

    /// Rebuild the aggregated lists from the mounted disks. Mounts whose
    /// disk has left the registry are dropped.
    pub fn refresh(&mut self) {
        let registry = &self.registry;
        self.mounted.retain(|id| registry.contains(*id));

        self.items.clear();
        self.fluids.clear();
        for id in &self.mounted {
            let Some(disk) = self.registry.get(*id) else {
                continue;
            };
            let target = match disk.disk_type() {
                DiskType::Items => &mut self.items,
                DiskType::Fluids => &mut self.fluids,
            };
            for stack in disk.contents().iter() {
                target.add(stack.clone());
            }
        }
    }

    fn mounted_of(&self, disk_type: DiskType) -> Vec<DiskId> {
        self.mounted
            .iter()
            .copied()
            .filter(|id| {
                self.registry
                    .get(*id)
                    .is_some_and(|d| d.disk_type() == disk_type)
            })
            .collect()
    }

    fn cache_mut(&mut self, disk_type: DiskType) -> &mut StackList {
        match disk_type {
            DiskType::Items => &mut self.items,
            DiskType::Fluids => &mut self.fluids,
        }
    }
}

impl StorageNetwork for NetworkStorage {
    fn insert(
        &mut self,
        disk_type: DiskType,
        stack: ResourceStack,
        simulate: bool,
    ) -> Option<ResourceStack> {
        if stack.quantity == 0 {
            return None;
        }
        let mut remainder = Some(stack.clone());
        for id in self.mounted_of(disk_type) {
            let Some(current) = remainder.take() else {
                break;
            };
            if let Some(disk) = self.registry.get_mut(id) {
                remainder = disk.insert(current, simulate);
            } else {
                remainder = Some(current);
            }
        }

        if !simulate {
            let left = remainder.as_ref().map_or(0, |r| r.quantity);
            let accepted = stack.quantity - left;
            if accepted > 0 {
                self.cache_mut(disk_type).add(stack.copy_with_quantity(accepted));
                self.registry.mark_for_saving();
            }
        }
        remainder
    }

    fn extract(
        &mut self,
        disk_type: DiskType,
        stack: &ResourceStack,
        amount: u32,
        flags: CompareFlags,
        simulate: bool,
    ) -> Option<ResourceStack> {
        let mut result: Option<ResourceStack> = None;
        for id in self.mounted_of(disk_type) {
            let taken_so_far = result.as_ref().map_or(0, |r| r.quantity);
            if taken_so_far >= amount {
                break;
            }
            let Some(disk) = self.registry.get_mut(id) else {
                continue;
            };
            // Once the first disk has decided the identity, later disks must
            // supply the same resource.
            let (target, target_flags) = match &result {
                Some(found) => (found, CompareFlags::VARIANT | CompareFlags::METADATA),
                None => (stack, flags),
            };
            let Some(took) = disk.extract(target, amount - taken_so_far, target_flags, simulate)
            else {
                continue;
            };
            match result.as_mut() {
                Some(found) => found.quantity += took.quantity,
                None => result = Some(took),
            }
        }

        if !simulate && let Some(found) = &result {
            let removed = self.cache_mut(disk_type).remove(
                found,
                found.quantity,
                CompareFlags::VARIANT | CompareFlags::METADATA,
            );
            debug_assert_eq!(removed, found.quantity);
            self.registry.mark_for_saving();
        }
        result
    }

    fn list(&self, disk_type: DiskType) -> &StackList {
        match disk_type {
            DiskType::Items => &self.items,
            DiskType::Fluids => &self.fluids,
        }
    }
}
