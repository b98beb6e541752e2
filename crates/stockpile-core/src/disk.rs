//! Storage disks and the factories that reconstruct them from documents.
//!
//! A [`StorageDisk`] is a capacity-limited [`StackList`] tagged with the
//! kind of resource it holds. Disks are rebuilt from persisted documents by
//! a constructor looked up in the [`DiskFactoryRegistry`] under the disk's
//! factory id, so new disk kinds can be added without touching the
//! registry code.

use crate::stack::{CompareFlags, ResourceStack, StackList};
use crate::task::to_document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Factory id of the built-in item disk.
pub const ITEM_DISK_FACTORY: &str = "stockpile:item_disk";

/// Factory id of the built-in fluid disk.
pub const FLUID_DISK_FACTORY: &str = "stockpile:fluid_disk";

/// What a disk (or a storage view) holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiskType {
    Items,
    Fluids,
}

/// Errors raised while decoding a disk document.
#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    #[error("malformed disk data: {0}")]
    Decode(String),
}

/// On-document shape of a disk's `Data` payload.
#[derive(Debug, Serialize, Deserialize)]
struct DiskData {
    #[serde(default)]
    capacity: Option<u32>,
    #[serde(default)]
    stacks: StackList,
}

/// A single persisted container of resource stacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDisk {
    disk_type: DiskType,
    /// `None` means unbounded.
    capacity: Option<u32>,
    contents: StackList,
    factory_id: String,
}

impl StorageDisk {
    pub fn new(disk_type: DiskType, capacity: Option<u32>, factory_id: &str) -> Self {
        Self {
            disk_type,
            capacity,
            contents: StackList::new(),
            factory_id: factory_id.to_string(),
        }
    }

    /// A fresh, empty item disk from the built-in factory.
    pub fn items(capacity: Option<u32>) -> Self {
        Self::new(DiskType::Items, capacity, ITEM_DISK_FACTORY)
    }

    /// A fresh, empty fluid disk from the built-in factory.
    pub fn fluids(capacity: Option<u32>) -> Self {
        Self::new(DiskType::Fluids, capacity, FLUID_DISK_FACTORY)
    }

    pub fn disk_type(&self) -> DiskType {
        self.disk_type
    }

    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    pub fn factory_id(&self) -> &str {
        &self.factory_id
    }

    pub fn contents(&self) -> &StackList {
        &self.contents
    }

    /// Total quantity stored across all stacks.
    pub fn stored(&self) -> u64 {
        self.contents.total()
    }

    /// Remaining room, or `None` if unbounded.
    pub fn free_space(&self) -> Option<u64> {
        self.capacity
            .map(|cap| (cap as u64).saturating_sub(self.stored()))
    }

    /// Insert a stack. Returns the part that did not fit, if any.
    #[must_use = "the remainder holds resources that did not fit"]
    pub fn insert(&mut self, stack: ResourceStack, simulate: bool) -> Option<ResourceStack> {
        let accepted = match self.free_space() {
            Some(space) => (stack.quantity as u64).min(space) as u32,
            None => stack.quantity,
        };
        let overflow = stack.quantity - accepted;

        if !simulate && accepted > 0 {
            self.contents.add(stack.copy_with_quantity(accepted));
        }

        (overflow > 0).then(|| stack.copy_with_quantity(overflow))
    }

    /// Extract up to `amount` of resources matching `stack` under `flags`.
    ///
    /// The first matching entry decides the identity; only that resource is
    /// taken, even when `flags` would match several kinds of one family.
    /// Returns `None` if nothing matched.
    pub fn extract(
        &mut self,
        stack: &ResourceStack,
        amount: u32,
        flags: CompareFlags,
        simulate: bool,
    ) -> Option<ResourceStack> {
        let first = self.contents.get(stack, flags)?.clone();
        let exact = CompareFlags::VARIANT | CompareFlags::METADATA;
        let taken = amount.min(self.contents.count(&first, exact));
        if taken == 0 {
            return None;
        }
        if !simulate {
            let removed = self.contents.remove(&first, taken, exact);
            debug_assert_eq!(removed, taken);
        }
        Some(first.copy_with_quantity(taken))
    }

    /// Serialize the disk's `Data` payload.
    pub fn write(&self) -> Value {
        let data = DiskData {
            capacity: self.capacity,
            stacks: self.contents.clone(),
        };
        to_document("disk data", &data)
    }

    /// Decode a `Data` payload into a disk of the given type and factory.
    pub fn from_document(
        disk_type: DiskType,
        factory_id: &str,
        data: &Value,
    ) -> Result<Self, DiskError> {
        let data: DiskData =
            serde_json::from_value(data.clone()).map_err(|e| DiskError::Decode(e.to_string()))?;
        Ok(Self {
            disk_type,
            capacity: data.capacity,
            contents: data.stacks,
            factory_id: factory_id.to_string(),
        })
    }
}

/// Constructor that rebuilds a disk from its `Data` payload.
pub type DiskConstructor = Box<dyn Fn(&Value) -> Result<StorageDisk, DiskError>>;

/// Maps factory ids to disk constructors.
pub struct DiskFactoryRegistry {
    factories: HashMap<String, DiskConstructor>,
}

impl Default for DiskFactoryRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for DiskFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("DiskFactoryRegistry")
            .field("factories", &ids)
            .finish()
    }
}

impl DiskFactoryRegistry {
    /// An empty registry. Every disk document will be skipped on read.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the built-in item and fluid disk factories.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ITEM_DISK_FACTORY, |data| {
            StorageDisk::from_document(DiskType::Items, ITEM_DISK_FACTORY, data)
        });
        registry.register(FLUID_DISK_FACTORY, |data| {
            StorageDisk::from_document(DiskType::Fluids, FLUID_DISK_FACTORY, data)
        });
        registry
    }

    /// Register (or replace) the constructor for `id`.
    pub fn register<F>(&mut self, id: &str, constructor: F)
    where
        F: Fn(&Value) -> Result<StorageDisk, DiskError> + 'static,
    {
        self.factories.insert(id.to_string(), Box::new(constructor));
    }

    pub fn get(&self, id: &str) -> Option<&DiskConstructor> {
        self.factories.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
