//! Serde data file structs for network definitions.
//!
//! These structs define the on-disk format for resource kinds, crafting
//! patterns, crafters, storage disks and scheduler configuration. They are
//! deserialized from RON, JSON, or TOML data files and then resolved into
//! core types by the loader.

use serde::Deserialize;
use std::collections::BTreeMap;

// ===========================================================================
// Kinds
// ===========================================================================

/// A resource kind definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct KindData {
    pub name: String,
    /// Optional family name; kinds sharing a family match under fuzzy
    /// comparison.
    #[serde(default)]
    pub family: Option<String>,
}

// ===========================================================================
// Stacks and patterns
// ===========================================================================

/// A stack entry, supporting both short tuple form and full form with
/// variant and metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StackData {
    /// Short form: `("kind_name", quantity)`.
    Short(String, u32),
    Full {
        kind: String,
        quantity: u32,
        #[serde(default)]
        variant: u32,
        #[serde(default)]
        metadata: BTreeMap<String, String>,
    },
}

impl StackData {
    pub fn kind_name(&self) -> &str {
        match self {
            StackData::Short(kind, _) => kind,
            StackData::Full { kind, .. } => kind,
        }
    }
}

/// A crafting pattern definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternData {
    pub name: String,
    pub inputs: Vec<StackData>,
    pub outputs: Vec<StackData>,
    #[serde(default)]
    pub byproducts: Vec<StackData>,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default)]
    pub fuzzy: bool,
    /// Task factory id; the processing task when absent.
    #[serde(default)]
    pub task: Option<String>,
}

// ===========================================================================
// Crafters
// ===========================================================================

fn default_one() -> u32 {
    1
}

/// A crafter node definition: which patterns it offers and how fast.
#[derive(Debug, Clone, Deserialize)]
pub struct CrafterData {
    pub name: String,
    pub patterns: Vec<String>,
    #[serde(default = "default_one")]
    pub speed: u32,
    #[serde(default = "default_one")]
    pub duration: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

// ===========================================================================
// Disks
// ===========================================================================

/// Which view a disk stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskTypeData {
    Items,
    Fluids,
}

/// A storage disk to create and mount, with its initial contents.
#[derive(Debug, Clone, Deserialize)]
pub struct DiskData {
    #[serde(rename = "type")]
    pub disk_type: DiskTypeData,
    /// Unbounded when absent.
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub contents: Vec<StackData>,
}

// ===========================================================================
// Scheduler configuration
// ===========================================================================

/// Scheduler tuning. Missing fields fall back to the core defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerData {
    #[serde(default)]
    pub update_interval: Option<u64>,
    #[serde(default)]
    pub retry_interval: Option<u64>,
    /// Probability in `[0, 1]`; converted to fixed-point on load.
    #[serde(default)]
    pub retry_probability: Option<f64>,
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

// ===========================================================================
// TOML wrappers
// ===========================================================================

/// Wrapper for a list of kinds in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlKinds {
    pub kinds: Vec<KindData>,
}

/// Wrapper for a list of patterns in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlPatterns {
    pub patterns: Vec<PatternData>,
}

// ===========================================================================
// Tests
// ===========================================================================
