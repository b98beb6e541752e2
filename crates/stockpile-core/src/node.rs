//! Producer nodes that execute crafting patterns.
//!
//! The scheduler only sees nodes through the [`PatternContainer`] trait.
//! [`Crafter`] is the stock implementation: a machine with a fixed set of
//! patterns, a per-cycle throughput and a FIFO job queue.

use crate::id::NodeId;
use crate::pattern::CraftingPattern;
use crate::stack::ResourceStack;
use slotmap::SlotMap;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;

/// All producer nodes in a network.
pub type NodeSet = SlotMap<NodeId, Box<dyn PatternContainer>>;

/// A node that offers crafting patterns to the network.
pub trait PatternContainer: fmt::Debug {
    /// Patterns this node declares. The container id is assigned by the
    /// pattern registry.
    fn patterns(&self) -> &[CraftingPattern];

    /// Whether the node is currently operative.
    fn can_update(&self) -> bool;

    /// How many pattern runs may be started on this node per cycle.
    fn speed(&self) -> u32;

    /// Hand over the inputs for one run of `pattern`.
    ///
    /// On refusal the inputs are given back untouched.
    fn accept(
        &mut self,
        pattern: &CraftingPattern,
        inputs: Vec<ResourceStack>,
    ) -> Result<(), Vec<ResourceStack>>;

    /// Advance one cycle. Returns everything that finished this cycle.
    fn tick(&mut self) -> Vec<ResourceStack>;

    /// Downcast to `&dyn Any` for access to the concrete node type.
    fn as_any(&self) -> &dyn Any;

    /// Downcast to `&mut dyn Any` for mutable access to the concrete node type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[derive(Debug, Clone)]
struct CrafterJob {
    results: Vec<ResourceStack>,
    remaining: u32,
}

/// A machine that runs one of its patterns per accepted job.
#[derive(Debug, Clone)]
pub struct Crafter {
    patterns: Vec<CraftingPattern>,
    enabled: bool,
    speed: u32,
    /// Cycles each job takes. Zero is treated as one.
    duration: u32,
    jobs: VecDeque<CrafterJob>,
}

impl Crafter {
    pub fn new(patterns: Vec<CraftingPattern>, speed: u32, duration: u32) -> Self {
        Self {
            patterns,
            enabled: true,
            speed,
            duration,
            jobs: VecDeque::new(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of accepted jobs that have not finished yet.
    pub fn queued(&self) -> usize {
        self.jobs.len()
    }
}

impl PatternContainer for Crafter {
    fn patterns(&self) -> &[CraftingPattern] {
        &self.patterns
    }

    fn can_update(&self) -> bool {
        self.enabled
    }

    fn speed(&self) -> u32 {
        self.speed
    }

    fn accept(
        &mut self,
        pattern: &CraftingPattern,
        inputs: Vec<ResourceStack>,
    ) -> Result<(), Vec<ResourceStack>> {
        if !self.enabled || !self.patterns.iter().any(|p| p.same_recipe(pattern)) {
            return Err(inputs);
        }
        let results = pattern
            .outputs
            .iter()
            .chain(pattern.byproducts.iter())
            .cloned()
            .collect();
        self.jobs.push_back(CrafterJob {
            results,
            remaining: self.duration.max(1),
        });
        Ok(())
    }

    fn tick(&mut self) -> Vec<ResourceStack> {
        if !self.enabled {
            return Vec::new();
        }
        // Up to `speed` jobs at the head of the queue progress in parallel.
        for job in self.jobs.iter_mut().take(self.speed.max(1) as usize) {
            job.remaining = job.remaining.saturating_sub(1);
        }
        let mut finished = Vec::new();
        while self.jobs.front().is_some_and(|job| job.remaining == 0) {
            if let Some(job) = self.jobs.pop_front() {
                finished.extend(job.results);
            }
        }
        finished
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
