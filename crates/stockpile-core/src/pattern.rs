//! Crafting patterns and the rebuildable index of patterns in a network.

use crate::id::NodeId;
use crate::node::NodeSet;
use crate::stack::{CompareFlags, ResourceStack, StackList};
use serde::{Deserialize, Serialize};

/// Task factory id of the built-in processing task.
pub const PROCESSING_TASK_ID: &str = "stockpile:processing";

fn default_task_id() -> String {
    PROCESSING_TASK_ID.to_string()
}

/// A transformation a producer node can perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftingPattern {
    /// Id of the task factory that executes this pattern.
    #[serde(default = "default_task_id")]
    pub id: String,
    pub inputs: Vec<ResourceStack>,
    pub outputs: Vec<ResourceStack>,
    #[serde(default)]
    pub byproducts: Vec<ResourceStack>,
    /// While a task for a blocking pattern is live, no further task may be
    /// scheduled for its outputs.
    #[serde(default)]
    pub blocking: bool,
    /// Inputs may be satisfied by any kind in the same family.
    #[serde(default)]
    pub fuzzy: bool,
    /// The node that executes this pattern. Assigned on registry rebuild.
    #[serde(default)]
    pub container: NodeId,
}

impl CraftingPattern {
    pub fn new(inputs: Vec<ResourceStack>, outputs: Vec<ResourceStack>) -> Self {
        Self {
            id: default_task_id(),
            inputs,
            outputs,
            byproducts: Vec::new(),
            blocking: false,
            fuzzy: false,
            container: NodeId::default(),
        }
    }

    pub fn with_byproducts(mut self, byproducts: Vec<ResourceStack>) -> Self {
        self.byproducts = byproducts;
        self
    }

    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn with_task_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_container(mut self, container: NodeId) -> Self {
        self.container = container;
        self
    }

    /// Flags used when looking up this pattern's inputs in storage.
    pub fn input_flags(&self) -> CompareFlags {
        let mut flags = CompareFlags::VARIANT | CompareFlags::METADATA;
        if self.fuzzy {
            flags |= CompareFlags::FUZZY;
        }
        flags
    }

    /// First declared output matching `request` under `flags`.
    pub fn output_for(&self, request: &ResourceStack, flags: CompareFlags) -> Option<&ResourceStack> {
        self.outputs.iter().find(|o| o.matches(request, flags))
    }

    /// How many units of `request` one run produces. Falls back to the
    /// first output when nothing matches by kind.
    pub fn output_quantity_for(&self, request: &ResourceStack) -> u32 {
        let flags = if self.fuzzy {
            CompareFlags::FUZZY
        } else {
            CompareFlags::empty()
        };
        self.output_for(request, flags)
            .or_else(|| self.outputs.first())
            .map_or(1, |o| o.quantity.max(1))
    }

    /// Same transformation, ignoring which node runs it.
    pub fn same_recipe(&self, other: &CraftingPattern) -> bool {
        self.id == other.id
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.byproducts == other.byproducts
            && self.blocking == other.blocking
            && self.fuzzy == other.fuzzy
    }
}

/// Index of every pattern offered by an operative node in the network.
#[derive(Debug, Clone, Default)]
pub struct CraftingPatternRegistry {
    patterns: Vec<CraftingPattern>,
}

impl CraftingPatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the index and collect patterns from every node that reports
    /// `can_update`, stamping each with its container.
    pub fn rebuild(&mut self, nodes: &NodeSet) {
        self.patterns.clear();
        for (id, node) in nodes.iter() {
            if !node.can_update() {
                continue;
            }
            for pattern in node.patterns() {
                self.patterns.push(pattern.clone().with_container(id));
            }
        }
    }

    pub fn all(&self) -> &[CraftingPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every pattern with an output matching `request`, in discovery order.
    pub fn get_patterns(&self, request: &ResourceStack, flags: CompareFlags) -> Vec<&CraftingPattern> {
        self.patterns
            .iter()
            .filter(|p| p.output_for(request, flags).is_some())
            .collect()
    }

    /// Choose a pattern for `request`.
    ///
    /// With several candidates, each is scored by the stored quantity of its
    /// direct inputs (first matching entry of `items`). The highest score
    /// wins and ties keep the earlier candidate.
    pub fn get_pattern(
        &self,
        request: &ResourceStack,
        flags: CompareFlags,
        items: &StackList,
    ) -> Option<&CraftingPattern> {
        let candidates = self.get_patterns(request, flags);
        if candidates.len() <= 1 {
            return candidates.into_iter().next();
        }

        let mut best: Option<(&CraftingPattern, u64)> = None;
        for pattern in candidates {
            let score = stock_score(pattern, items);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((pattern, score)),
            }
        }
        best.map(|(pattern, _)| pattern)
    }
}

fn stock_score(pattern: &CraftingPattern, items: &StackList) -> u64 {
    let flags = pattern.input_flags();
    pattern
        .inputs
        .iter()
        .filter_map(|input| items.get(input, flags))
        .map(|stored| stored.quantity as u64)
        .sum()
}
