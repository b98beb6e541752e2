//! Resource stacks and the multiset list used for quantity bookkeeping.
//!
//! A [`ResourceStack`] is a value: a kind, a quantity, and the identity
//! attributes (variant, family, metadata) that [`CompareFlags`] select
//! between when two stacks are compared. A [`StackList`] is an ordered
//! multiset of stacks; entries with the same identity are merged.

use crate::id::{FamilyId, KindId};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

bitflags! {
    /// Which stack attributes must match for two stacks to be interchangeable.
    ///
    /// Kind equality is always required unless a [`FUZZY`](Self::FUZZY)
    /// family match applies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CompareFlags: u32 {
        /// Variant (damage) must match.
        const VARIANT = 1;
        /// Opaque metadata must match.
        const METADATA = 1 << 1;
        /// Stacks sharing a family tag match regardless of kind and variant.
        const FUZZY = 1 << 2;
    }
}

impl Default for CompareFlags {
    fn default() -> Self {
        CompareFlags::VARIANT | CompareFlags::METADATA
    }
}

/// A quantity of one resource kind with its identity attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStack {
    pub kind: KindId,
    pub quantity: u32,
    /// Damage or variant index within the kind.
    #[serde(default)]
    pub variant: u32,
    /// Fuzzy-match family, if the kind belongs to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<FamilyId>,
    /// Opaque per-stack tags. Compared as a whole under `METADATA`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ResourceStack {
    pub fn new(kind: KindId, quantity: u32) -> Self {
        Self {
            kind,
            quantity,
            variant: 0,
            family: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_variant(mut self, variant: u32) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_family(mut self, family: FamilyId) -> Self {
        self.family = Some(family);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Copy of this stack with a different quantity.
    pub fn copy_with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }

    /// Compare two stacks under `flags`. Quantity is never compared.
    pub fn matches(&self, other: &ResourceStack, flags: CompareFlags) -> bool {
        if flags.contains(CompareFlags::FUZZY) {
            if let (Some(a), Some(b)) = (self.family, other.family) {
                if a == b {
                    return true;
                }
            }
        }
        if self.kind != other.kind {
            return false;
        }
        if flags.contains(CompareFlags::VARIANT) && self.variant != other.variant {
            return false;
        }
        if flags.contains(CompareFlags::METADATA) && self.metadata != other.metadata {
            return false;
        }
        true
    }

    /// Exact identity: kind, variant, family and metadata all equal.
    pub fn same_identity(&self, other: &ResourceStack) -> bool {
        self.family == other.family
            && self.matches(other, CompareFlags::VARIANT | CompareFlags::METADATA)
    }
}

/// Ordered multiset of resource stacks.
///
/// Insertion order is preserved so that lookups ("first matching entry")
/// are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackList {
    stacks: Vec<ResourceStack>,
}

impl StackList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stack, merging into an entry with the same identity.
    pub fn add(&mut self, stack: ResourceStack) {
        if stack.quantity == 0 {
            return;
        }
        if let Some(existing) = self.stacks.iter_mut().find(|s| s.same_identity(&stack)) {
            existing.quantity = existing.quantity.saturating_add(stack.quantity);
        } else {
            self.stacks.push(stack);
        }
    }

    /// Remove up to `quantity` of entries matching `stack` under `flags`,
    /// draining entries in insertion order. Returns the amount removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, stack: &ResourceStack, quantity: u32, flags: CompareFlags) -> u32 {
        let mut remaining = quantity;
        for entry in self.stacks.iter_mut() {
            if remaining == 0 {
                break;
            }
            if entry.matches(stack, flags) {
                let taken = remaining.min(entry.quantity);
                entry.quantity -= taken;
                remaining -= taken;
            }
        }
        self.stacks.retain(|s| s.quantity > 0);
        quantity - remaining
    }

    /// First entry matching `stack` under `flags`.
    pub fn get(&self, stack: &ResourceStack, flags: CompareFlags) -> Option<&ResourceStack> {
        self.stacks.iter().find(|s| s.matches(stack, flags))
    }

    /// Total quantity over all entries matching `stack` under `flags`.
    pub fn count(&self, stack: &ResourceStack, flags: CompareFlags) -> u32 {
        self.stacks
            .iter()
            .filter(|s| s.matches(stack, flags))
            .fold(0u32, |acc, s| acc.saturating_add(s.quantity))
    }

    /// Total quantity across all entries.
    pub fn total(&self) -> u64 {
        self.stacks.iter().map(|s| s.quantity as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceStack> {
        self.stacks.iter()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }
}

impl FromIterator<ResourceStack> for StackList {
    fn from_iter<I: IntoIterator<Item = ResourceStack>>(iter: I) -> Self {
        let mut list = StackList::new();
        for stack in iter {
            list.add(stack);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cobble() -> KindId {
        KindId(0)
    }

    fn plank() -> KindId {
        KindId(1)
    }

    #[test]
    fn kind_must_match_without_fuzzy() {
        let a = ResourceStack::new(cobble(), 1);
        let b = ResourceStack::new(plank(), 1);
        assert!(!a.matches(&b, CompareFlags::empty()));
        assert!(a.matches(&a.copy_with_quantity(40), CompareFlags::default()));
    }

    #[test]
    fn variant_flag_controls_variant_comparison() {
        let a = ResourceStack::new(plank(), 1).with_variant(0);
        let b = ResourceStack::new(plank(), 1).with_variant(3);
        assert!(a.matches(&b, CompareFlags::empty()));
        assert!(!a.matches(&b, CompareFlags::VARIANT));
    }

    #[test]
    fn metadata_flag_controls_metadata_comparison() {
        let a = ResourceStack::new(plank(), 1).with_metadata("ench", "1");
        let b = ResourceStack::new(plank(), 1);
        assert!(a.matches(&b, CompareFlags::VARIANT));
        assert!(!a.matches(&b, CompareFlags::METADATA));
    }

    #[test]
    fn fuzzy_matches_across_kinds_in_family() {
        let logs = FamilyId(7);
        let oak = ResourceStack::new(KindId(10), 1).with_family(logs);
        let birch = ResourceStack::new(KindId(11), 1).with_variant(2).with_family(logs);
        assert!(!oak.matches(&birch, CompareFlags::default()));
        assert!(oak.matches(&birch, CompareFlags::default() | CompareFlags::FUZZY));
    }

    #[test]
    fn fuzzy_without_family_falls_back_to_kind() {
        let a = ResourceStack::new(cobble(), 1);
        let b = ResourceStack::new(cobble(), 1);
        assert!(a.matches(&b, CompareFlags::FUZZY));
        assert!(!a.matches(&ResourceStack::new(plank(), 1), CompareFlags::FUZZY));
    }

    #[test]
    fn list_merges_same_identity() {
        let mut list = StackList::new();
        list.add(ResourceStack::new(cobble(), 10));
        list.add(ResourceStack::new(cobble(), 5));
        list.add(ResourceStack::new(cobble(), 5).with_variant(1));
        assert_eq!(list.len(), 2);
        assert_eq!(list.count(&ResourceStack::new(cobble(), 1), CompareFlags::empty()), 20);
        assert_eq!(list.count(&ResourceStack::new(cobble(), 1), CompareFlags::VARIANT), 15);
    }

    #[test]
    fn list_ignores_empty_stacks() {
        let mut list = StackList::new();
        list.add(ResourceStack::new(cobble(), 0));
        assert!(list.is_empty());
    }

    #[test]
    fn list_remove_spans_entries_and_drops_empties() {
        let mut list = StackList::new();
        list.add(ResourceStack::new(cobble(), 3));
        list.add(ResourceStack::new(cobble(), 4).with_variant(1));
        let removed = list.remove(&ResourceStack::new(cobble(), 1), 5, CompareFlags::empty());
        assert_eq!(removed, 5);
        assert_eq!(list.len(), 1);
        assert_eq!(list.total(), 2);
    }

    #[test]
    fn list_remove_more_than_available() {
        let mut list = StackList::new();
        list.add(ResourceStack::new(cobble(), 3));
        let removed = list.remove(&ResourceStack::new(cobble(), 1), 10, CompareFlags::default());
        assert_eq!(removed, 3);
        assert!(list.is_empty());
    }

    #[test]
    fn list_get_returns_first_match_in_insertion_order() {
        let mut list = StackList::new();
        list.add(ResourceStack::new(cobble(), 3).with_variant(1));
        list.add(ResourceStack::new(cobble(), 9));
        let first = list.get(&ResourceStack::new(cobble(), 1), CompareFlags::empty()).unwrap();
        assert_eq!(first.quantity, 3);
        let exact = list.get(&ResourceStack::new(cobble(), 1), CompareFlags::VARIANT).unwrap();
        assert_eq!(exact.quantity, 9);
    }

    #[test]
    fn list_serializes_as_array() {
        let list: StackList = vec![ResourceStack::new(cobble(), 2)].into_iter().collect();
        let json = serde_json::to_value(&list).unwrap();
        assert!(json.is_array());
        let back: StackList = serde_json::from_value(json).unwrap();
        assert_eq!(back, list);
    }
}
