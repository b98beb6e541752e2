//! Identity-keyed registry of every storage disk in the world.
//!
//! The registry is the canonical owner of [`StorageDisk`] records. Outside
//! code refers to disks by [`DiskId`]; physical disk items are resolved to
//! records through a [`DiskProvider`] registered for the item's kind.
//!
//! # Persistence
//!
//! [`write`](StorageDiskRegistry::write) produces
//! `{"Disks": [{"Id", "Type", "Data"}, ...]}`. The registry never clears
//! its dirty flag on its own; the persistence driver calls
//! [`mark_saved`](StorageDiskRegistry::mark_saved) after a successful flush.

use crate::disk::{DiskFactoryRegistry, StorageDisk};
use crate::id::{DiskId, KindId};
use crate::stack::ResourceStack;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const DOC_DISKS: &str = "Disks";

/// Metadata key under which a physical disk item stores its disk id.
pub const DISK_ID_TAG: &str = "disk_id";

#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    #[serde(rename = "Id")]
    id: DiskId,
    #[serde(rename = "Type")]
    factory: String,
    #[serde(rename = "Data", default)]
    data: Value,
}

/// Caller-contract violations on registry mutation.
#[derive(Debug, thiserror::Error)]
pub enum DiskRegistryError {
    #[error("disk id cannot be nil")]
    InvalidId,
    #[error("registry already contains disk id '{0}'")]
    DuplicateId(DiskId),
}

// ---------------------------------------------------------------------------
// Disk providers
// ---------------------------------------------------------------------------

/// Capability of a resource kind whose stacks stand for storage disks.
pub trait DiskProvider: fmt::Debug {
    /// Whether `stack` is an initialized disk reference.
    fn is_valid(&self, stack: &ResourceStack) -> bool;

    /// The disk id carried by `stack`, if any.
    fn disk_id(&self, stack: &ResourceStack) -> Option<DiskId>;
}

/// Provider for disk items that carry their id in [`DISK_ID_TAG`] metadata.
#[derive(Debug, Clone)]
pub struct DiskItemProvider {
    kind: KindId,
}

impl DiskItemProvider {
    pub fn new(kind: KindId) -> Self {
        Self { kind }
    }

    /// The physical item representing disk `id`.
    pub fn stack_for(&self, id: DiskId) -> ResourceStack {
        ResourceStack::new(self.kind, 1).with_metadata(DISK_ID_TAG, &id.to_string())
    }
}

impl DiskProvider for DiskItemProvider {
    fn is_valid(&self, stack: &ResourceStack) -> bool {
        stack.kind == self.kind && self.disk_id(stack).is_some_and(|id| !id.is_nil())
    }

    fn disk_id(&self, stack: &ResourceStack) -> Option<DiskId> {
        stack.metadata.get(DISK_ID_TAG).and_then(|s| DiskId::parse(s))
    }
}

// ---------------------------------------------------------------------------
// StorageDiskRegistry
// ---------------------------------------------------------------------------

/// Identity-keyed store of storage disks.
#[derive(Debug, Default)]
pub struct StorageDiskRegistry {
    /// Ordered by id so that iteration (and therefore `write`) is stable.
    disks: BTreeMap<DiskId, StorageDisk>,
    providers: HashMap<KindId, Box<dyn DiskProvider>>,
    dirty: bool,
}

impl StorageDiskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: DiskId) -> Option<&StorageDisk> {
        self.disks.get(&id)
    }

    /// Mutable access to a disk. Callers that change the disk must also
    /// call [`mark_for_saving`](Self::mark_for_saving).
    pub fn get_mut(&mut self, id: DiskId) -> Option<&mut StorageDisk> {
        self.disks.get_mut(&id)
    }

    pub fn contains(&self, id: DiskId) -> bool {
        self.disks.contains_key(&id)
    }

    /// All disks in id order.
    pub fn all(&self) -> impl Iterator<Item = (DiskId, &StorageDisk)> {
        self.disks.iter().map(|(id, disk)| (*id, disk))
    }

    pub fn len(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    /// Register the provider that recognizes disk items of `kind`.
    pub fn register_provider(&mut self, kind: KindId, provider: Box<dyn DiskProvider>) {
        self.providers.insert(kind, provider);
    }

    /// Resolve a physical disk item to its record.
    ///
    /// Returns `None` if no provider handles the stack's kind, the stack is
    /// not a valid initialized reference, or the id is unknown.
    pub fn get_by_stack(&self, stack: &ResourceStack) -> Option<&StorageDisk> {
        let provider = self.providers.get(&stack.kind)?;
        if !provider.is_valid(stack) {
            return None;
        }
        self.get(provider.disk_id(stack)?)
    }

    /// Register a disk under `id`. Fails without mutating on a nil or
    /// already-present id.
    pub fn set(&mut self, id: DiskId, disk: StorageDisk) -> Result<(), DiskRegistryError> {
        if id.is_nil() {
            return Err(DiskRegistryError::InvalidId);
        }
        if self.disks.contains_key(&id) {
            return Err(DiskRegistryError::DuplicateId(id));
        }
        self.disks.insert(id, disk);
        self.mark_for_saving();
        Ok(())
    }

    /// Remove the disk under `id`. Removing an unregistered id is tolerated.
    pub fn remove(&mut self, id: DiskId) -> Result<Option<StorageDisk>, DiskRegistryError> {
        if id.is_nil() {
            return Err(DiskRegistryError::InvalidId);
        }
        let removed = self.disks.remove(&id);
        self.mark_for_saving();
        Ok(removed)
    }

    pub fn mark_for_saving(&mut self) {
        self.dirty = true;
    }

    pub fn is_marked_for_saving(&self) -> bool {
        self.dirty
    }

    /// Called by the persistence driver after a successful flush.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Serialize every disk as `{"Disks": [{"Id", "Type", "Data"}, ...]}`.
    pub fn write(&self) -> Value {
        let entries: Vec<Value> = self
            .disks
            .iter()
            .filter_map(|(id, disk)| {
                let entry = DiskEntry {
                    id: *id,
                    factory: disk.factory_id().to_string(),
                    data: disk.write(),
                };
                serde_json::to_value(entry).ok()
            })
            .collect();

        let mut doc = Map::new();
        doc.insert(DOC_DISKS.to_string(), Value::Array(entries));
        Value::Object(doc)
    }

    /// Load disks from a document produced by [`write`](Self::write).
    ///
    /// Entries with an unknown factory, a nil id, or undecodable data are
    /// skipped with a warning. A missing `Disks` key means no data. Loaded
    /// entries replace any disk already present under the same id.
    /// Returns the number of disks loaded.
    pub fn read(&mut self, doc: &Value, factories: &DiskFactoryRegistry) -> usize {
        let Some(entries) = doc.get(DOC_DISKS).and_then(Value::as_array) else {
            return 0;
        };

        let mut loaded = 0;
        let mut skipped = 0;
        for raw in entries {
            let entry: DiskEntry = match serde_json::from_value(raw.clone()) {
                Ok(entry) => entry,
                Err(error) => {
                    warn!("Unable to parse disk entry, {}", error);
                    skipped += 1;
                    continue;
                }
            };
            if entry.id.is_nil() {
                warn!("Skipping disk entry with nil id");
                skipped += 1;
                continue;
            }
            let Some(constructor) = factories.get(&entry.factory) else {
                warn!(
                    "Skipping disk {}, factory '{}' is not registered",
                    entry.id, entry.factory
                );
                skipped += 1;
                continue;
            };
            match constructor(&entry.data) {
                Ok(disk) => {
                    self.disks.insert(entry.id, disk);
                    loaded += 1;
                }
                Err(error) => {
                    warn!("Unable to load disk {}, {}", entry.id, error);
                    skipped += 1;
                }
            }
        }

        info!("Load disks: {} loaded, {} skipped", loaded, skipped);
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{DiskType, ITEM_DISK_FACTORY};
    use crate::stack::CompareFlags;
    use serde_json::json;

    fn filled_disk(quantity: u32) -> StorageDisk {
        let mut disk = StorageDisk::items(Some(1000));
        let _ = disk.insert(ResourceStack::new(KindId(1), quantity), false);
        disk
    }

    #[test]
    fn set_then_get() {
        let mut registry = StorageDiskRegistry::new();
        let id = DiskId::new_v4();
        registry.set(id, filled_disk(5)).unwrap();
        assert_eq!(registry.get(id), Some(&filled_disk(5)));
    }

    #[test]
    fn duplicate_set_fails_without_mutation() {
        let mut registry = StorageDiskRegistry::new();
        let id = DiskId::new_v4();
        registry.set(id, filled_disk(5)).unwrap();

        let result = registry.set(id, filled_disk(99));
        assert!(matches!(result, Err(DiskRegistryError::DuplicateId(dup)) if dup == id));
        assert_eq!(registry.get(id).unwrap().stored(), 5);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn nil_id_is_rejected() {
        let mut registry = StorageDiskRegistry::new();
        assert!(matches!(
            registry.set(DiskId::NIL, filled_disk(1)),
            Err(DiskRegistryError::InvalidId)
        ));
        assert!(matches!(
            registry.remove(DiskId::NIL),
            Err(DiskRegistryError::InvalidId)
        ));
        assert!(registry.is_empty());
        assert!(!registry.is_marked_for_saving());
    }

    #[test]
    fn remove_absent_id_is_tolerated() {
        let mut registry = StorageDiskRegistry::new();
        let removed = registry.remove(DiskId::new_v4()).unwrap();
        assert!(removed.is_none());
    }

    #[test]
    fn mutations_mark_dirty_and_only_driver_clears() {
        let mut registry = StorageDiskRegistry::new();
        assert!(!registry.is_marked_for_saving());

        let id = DiskId::new_v4();
        registry.set(id, filled_disk(1)).unwrap();
        assert!(registry.is_marked_for_saving());

        let _ = registry.write();
        assert!(registry.is_marked_for_saving());

        registry.mark_saved();
        assert!(!registry.is_marked_for_saving());

        registry.remove(id).unwrap();
        assert!(registry.is_marked_for_saving());

        registry.mark_for_saving();
        registry.mark_for_saving();
        assert!(registry.is_marked_for_saving());
    }

    #[test]
    fn write_read_round_trip() {
        let mut registry = StorageDiskRegistry::new();
        let a = DiskId::new_v4();
        let b = DiskId::new_v4();
        registry.set(a, filled_disk(10)).unwrap();
        registry.set(b, StorageDisk::fluids(None)).unwrap();

        let doc = registry.write();
        let mut restored = StorageDiskRegistry::new();
        let loaded = restored.read(&doc, &DiskFactoryRegistry::with_defaults());

        assert_eq!(loaded, 2);
        assert_eq!(restored.get(a), registry.get(a));
        assert_eq!(restored.get(b).unwrap().disk_type(), DiskType::Fluids);
    }

    #[test]
    fn write_order_is_stable() {
        let mut registry = StorageDiskRegistry::new();
        for _ in 0..8 {
            registry.set(DiskId::new_v4(), filled_disk(1)).unwrap();
        }
        assert_eq!(registry.write(), registry.write());
    }

    #[test]
    fn unknown_factory_is_skipped() {
        let known = DiskId::new_v4();
        let doc = json!({
            "Disks": [
                { "Id": DiskId::new_v4(), "Type": "acme:quantum_disk", "Data": {} },
                { "Id": known, "Type": ITEM_DISK_FACTORY, "Data": { "capacity": 8 } },
            ]
        });
        let mut registry = StorageDiskRegistry::new();
        let loaded = registry.read(&doc, &DiskFactoryRegistry::with_defaults());
        assert_eq!(loaded, 1);
        assert_eq!(registry.get(known).unwrap().capacity(), Some(8));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let doc = json!({
            "Disks": [
                { "Type": ITEM_DISK_FACTORY },
                { "Id": DiskId::NIL, "Type": ITEM_DISK_FACTORY, "Data": {} },
                { "Id": DiskId::new_v4(), "Type": ITEM_DISK_FACTORY, "Data": { "stacks": 4 } },
                "garbage",
            ]
        });
        let mut registry = StorageDiskRegistry::new();
        assert_eq!(registry.read(&doc, &DiskFactoryRegistry::with_defaults()), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_top_level_key_means_no_data() {
        let mut registry = StorageDiskRegistry::new();
        assert_eq!(registry.read(&json!({}), &DiskFactoryRegistry::with_defaults()), 0);
    }

    #[test]
    fn get_by_stack_resolves_valid_disk_items_only() {
        let disk_kind = KindId(50);
        let provider = DiskItemProvider::new(disk_kind);
        let mut registry = StorageDiskRegistry::new();
        registry.register_provider(disk_kind, Box::new(provider.clone()));

        let id = DiskId::new_v4();
        registry.set(id, filled_disk(3)).unwrap();

        let item = provider.stack_for(id);
        assert_eq!(registry.get_by_stack(&item).unwrap().stored(), 3);

        // Uninitialized disk item.
        assert!(registry.get_by_stack(&ResourceStack::new(disk_kind, 1)).is_none());
        // Malformed id tag.
        let bad = ResourceStack::new(disk_kind, 1).with_metadata(DISK_ID_TAG, "???");
        assert!(registry.get_by_stack(&bad).is_none());
        // Nil id tag.
        assert!(registry.get_by_stack(&provider.stack_for(DiskId::NIL)).is_none());
        // Not a disk kind at all.
        let plain = ResourceStack::new(KindId(1), 1).with_metadata(DISK_ID_TAG, &id.to_string());
        assert!(registry.get_by_stack(&plain).is_none());
        // Valid item for an unregistered disk.
        assert!(registry.get_by_stack(&provider.stack_for(DiskId::new_v4())).is_none());
    }

    #[test]
    fn get_mut_allows_network_mutation() {
        let mut registry = StorageDiskRegistry::new();
        let id = DiskId::new_v4();
        registry.set(id, filled_disk(4)).unwrap();
        let disk = registry.get_mut(id).unwrap();
        let taken = disk.extract(&ResourceStack::new(KindId(1), 1), 4, CompareFlags::default(), false);
        assert_eq!(taken.unwrap().quantity, 4);
        assert_eq!(registry.get(id).unwrap().stored(), 0);
    }
}
