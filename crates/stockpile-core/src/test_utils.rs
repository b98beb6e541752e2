//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::config::SchedulerConfig;
use crate::disk::{DiskType, StorageDisk};
use crate::fixed::Fixed64;
use crate::id::*;
use crate::network::Network;
use crate::node::Crafter;
use crate::pattern::CraftingPattern;
use crate::stack::{CompareFlags, ResourceStack};
use crate::storage::StorageNetwork;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Resource kinds
// ===========================================================================

pub fn iron_plate() -> KindId {
    KindId(1)
}
pub fn copper_wire() -> KindId {
    KindId(2)
}
pub fn circuit() -> KindId {
    KindId(3)
}
pub fn copper_plate() -> KindId {
    KindId(4)
}
pub fn gear() -> KindId {
    KindId(5)
}
pub fn water() -> KindId {
    KindId(20)
}
pub fn disk_item() -> KindId {
    KindId(100)
}

pub fn stack(kind: KindId, quantity: u32) -> ResourceStack {
    ResourceStack::new(kind, quantity)
}

// ===========================================================================
// Patterns
// ===========================================================================

/// 4 iron plate + 1 copper wire -> 2 circuits.
pub fn circuit_pattern() -> CraftingPattern {
    CraftingPattern::new(
        vec![stack(iron_plate(), 4), stack(copper_wire(), 1)],
        vec![stack(circuit(), 2)],
    )
}

/// 1 copper plate -> 2 copper wire.
pub fn wire_pattern() -> CraftingPattern {
    CraftingPattern::new(vec![stack(copper_plate(), 1)], vec![stack(copper_wire(), 2)])
}

/// 2 iron plate -> 1 gear.
pub fn gear_pattern() -> CraftingPattern {
    CraftingPattern::new(vec![stack(iron_plate(), 2)], vec![stack(gear(), 1)])
}

// ===========================================================================
// Network builders
// ===========================================================================

/// A powered network with one unbounded item disk holding `stock`.
pub fn network_with_stock(config: SchedulerConfig, stock: &[ResourceStack]) -> Network {
    let mut network = Network::new(config);
    network
        .add_disk(StorageDisk::items(None))
        .expect("empty registry accepts a fresh disk");
    for s in stock {
        let rest = network.insert(DiskType::Items, s.clone(), false);
        assert!(rest.is_none(), "unbounded disk refused stock");
    }
    network
}

/// Add a crafter offering `patterns` with the given speed and job duration.
pub fn add_crafter(
    network: &mut Network,
    patterns: Vec<CraftingPattern>,
    speed: u32,
    duration: u32,
) -> NodeId {
    network.add_node(Box::new(Crafter::new(patterns, speed, duration)))
}

pub fn run_cycles(network: &mut Network, cycles: u32) {
    for _ in 0..cycles {
        network.step();
    }
}

/// Stored quantity of `kind` under default flags.
pub fn stored(network: &Network, kind: KindId) -> u32 {
    network
        .storage()
        .list(DiskType::Items)
        .count(&stack(kind, 1), CompareFlags::default())
}
