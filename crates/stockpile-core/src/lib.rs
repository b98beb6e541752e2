//! Stockpile Core -- pooled disk storage and an automated crafting scheduler.
//!
//! This crate provides the storage disk registry that backs a resource
//! network, the index of crafting patterns offered by producer nodes, and
//! the scheduler that plans, throttles and persists crafting tasks.
//!
//! # Cycle Pipeline
//!
//! Each call to [`network::Network::step`] advances a network by one cycle:
//!
//! 1. **Rebuild** -- Re-index patterns if any node was added, removed or changed.
//! 2. **Rehydrate** -- Turn task documents read since the last cycle into tasks.
//! 3. **Cancel** -- Run queued cancellations.
//! 4. **Promote** -- Make newly added tasks live, dropping invalid ones.
//! 5. **Execute** -- On every `update_interval`-th cycle, update live tasks.
//! 6. **Import** -- Tick producer nodes; insert and track their outputs.
//!
//! Phases 3 to 6 only run while the network is powered.
//!
//! # Scheduling
//!
//! ```rust,ignore
//! let task = network.schedule(&ResourceStack::new(circuit, 1), 10, CompareFlags::default());
//! // Inactive until the next step promotes it.
//! network.step();
//! ```
//!
//! # Key Types
//!
//! - [`disk_registry::StorageDiskRegistry`] -- Identity-keyed, persistent
//!   store of [`disk::StorageDisk`]s.
//! - [`storage::StorageNetwork`] -- Insert/extract/list over pooled storage.
//! - [`pattern::CraftingPatternRegistry`] -- Rebuildable pattern index with
//!   stock-based disambiguation.
//! - [`scheduler::CraftingScheduler`] -- Task list, throttled update loop,
//!   deduplication, cancellation and persistence.
//! - [`task::CraftingTask`] -- Poll-style task state machine; the default
//!   implementation is [`processing::ProcessingTask`].
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for probabilities.

pub mod config;
pub mod dirty;
pub mod disk;
pub mod disk_registry;
pub mod event;
pub mod fixed;
pub mod id;
pub mod network;
pub mod node;
pub mod pattern;
pub mod processing;
pub mod rng;
pub mod scheduler;
pub mod stack;
pub mod storage;
pub mod task;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
