//! Crafting tasks: the unit of scheduled production.
//!
//! A task is created for a pattern and a requested quantity, planned once
//! with [`calculate`](CraftingTask::calculate), then polled by the scheduler
//! with [`update`](CraftingTask::update) until it reports
//! [`TaskPoll::Completed`]. Concrete task kinds are created through a
//! [`TaskFactory`] registered under the pattern's task id, which is also how
//! persisted task documents are turned back into tasks.

use crate::fixed::Cycles;
use crate::id::NodeId;
use crate::node::NodeSet;
use crate::pattern::{CraftingPattern, CraftingPatternRegistry};
use crate::stack::{CompareFlags, ResourceStack, StackList};
use crate::storage::StorageNetwork;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Keys the scheduler reads before handing a document to a task factory.
pub const DOC_PATTERN_ID: &str = "PatternId";
pub const DOC_CONTAINER: &str = "Container";

/// Serialize a persisted payload. A value that cannot be represented as JSON
/// is logged and written as `null`, which readers skip.
pub fn to_document<T: Serialize>(what: &str, value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("could not serialize {what}: {e}");
            Value::Null
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a persisted task document cannot become a task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task document has no '{0}' entry")]
    MissingField(&'static str),
    #[error("no task factory registered for '{0}'")]
    UnknownFactory(String),
    #[error("container {0:?} is no longer part of the network")]
    MissingContainer(NodeId),
    #[error("malformed task document: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Poll state and steps
// ---------------------------------------------------------------------------

/// Result of one [`CraftingTask::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPoll {
    /// Progress was made or is pending; poll again.
    Running,
    /// Every step is done. The scheduler removes the task.
    Completed,
    /// Waiting on missing inputs.
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    /// Inputs not yet handed to the container.
    Pending,
    /// Running in the container; waiting for these outputs to come back.
    Started { awaiting: StackList },
    Done,
}

/// One run of a pattern within a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftingStep {
    pub pattern: CraftingPattern,
    pub state: StepState,
}

impl CraftingStep {
    pub fn new(pattern: CraftingPattern) -> Self {
        Self {
            pattern,
            state: StepState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, StepState::Pending)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, StepState::Done)
    }

    /// Mark the step as handed to its container.
    pub fn start(&mut self) {
        self.state = StepState::Started {
            awaiting: self.pattern.outputs.iter().cloned().collect(),
        };
    }

    /// Offer a stack that arrived in storage. Returns `true` if this step
    /// was waiting for it; the step is done once nothing is awaited.
    pub fn on_receive_output(&mut self, stack: &ResourceStack) -> bool {
        let StepState::Started { awaiting } = &mut self.state else {
            return false;
        };
        let received = awaiting.remove(stack, stack.quantity, CompareFlags::default());
        if received == 0 {
            return false;
        }
        if awaiting.is_empty() {
            self.state = StepState::Done;
        }
        true
    }

    /// Quantity of `stack` this step will still deliver.
    pub fn pending_output(&self, stack: &ResourceStack, flags: CompareFlags) -> u32 {
        match &self.state {
            StepState::Pending => self
                .pattern
                .outputs
                .iter()
                .filter(|o| o.matches(stack, flags))
                .map(|o| o.quantity)
                .sum(),
            StepState::Started { awaiting } => awaiting.count(stack, flags),
            StepState::Done => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Task context
// ---------------------------------------------------------------------------

/// Per-cycle count of runs started on each container, shared by every task
/// update in that cycle.
pub type UsedCrafters = HashMap<NodeId, u32>;

/// What a task can reach while it is being updated.
pub struct TaskContext<'a> {
    pub storage: &'a mut dyn StorageNetwork,
    pub nodes: &'a mut NodeSet,
    pub cycle: Cycles,
}

// ---------------------------------------------------------------------------
// CraftingTask
// ---------------------------------------------------------------------------

pub trait CraftingTask: fmt::Debug {
    /// Plan the task against a snapshot of the item view. Shortfalls that
    /// no pattern can cover are recorded in [`missing`](Self::missing).
    fn calculate(&mut self, patterns: &CraftingPatternRegistry, items: &StackList);

    /// Advance the task by one scheduler update.
    fn update(&mut self, ctx: &mut TaskContext<'_>, used: &mut UsedCrafters) -> TaskPoll;

    /// Called exactly once when the task is cancelled.
    fn on_cancelled(&mut self, ctx: &mut TaskContext<'_>);

    /// Whether the task can still run in the current topology.
    fn is_valid(&self, nodes: &NodeSet) -> bool;

    /// Offer a stack that was just inserted into the network.
    fn on_receive_output(&mut self, stack: &ResourceStack) -> bool;

    fn pattern(&self) -> &CraftingPattern;

    fn requested(&self) -> &ResourceStack;

    fn quantity(&self) -> u32;

    /// Number of pattern runs needed for `quantity`.
    fn runs(&self) -> u32;

    fn missing(&self) -> &StackList;

    fn missing_mut(&mut self) -> &mut StackList;

    fn steps(&self) -> &[CraftingStep];

    /// Serialize to a task document.
    fn write(&self) -> Value;

    /// Whether this task was rebuilt from a persisted document.
    fn from_persistence(&self) -> bool;
}

/// Runs needed to produce `quantity` when one run yields `per_run`.
pub fn runs_for(quantity: u32, per_run: u32) -> u32 {
    quantity.div_ceil(per_run.max(1))
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

/// Creates tasks for the patterns registered under one task id.
pub trait TaskFactory: fmt::Debug {
    fn create(
        &self,
        pattern: CraftingPattern,
        requested: ResourceStack,
        quantity: u32,
    ) -> Box<dyn CraftingTask>;

    /// Rebuild a task from a document produced by [`CraftingTask::write`].
    fn from_document(&self, doc: &Value) -> Result<Box<dyn CraftingTask>, TaskError>;
}

/// Maps task ids to their factories.
#[derive(Debug, Default)]
pub struct TaskFactoryRegistry {
    factories: HashMap<String, Box<dyn TaskFactory>>,
}

impl TaskFactoryRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the built-in processing task.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(
            crate::pattern::PROCESSING_TASK_ID,
            Box::new(crate::processing::ProcessingTaskFactory),
        );
        registry
    }

    /// Register (or replace) the factory for `id`.
    pub fn register(&mut self, id: &str, factory: Box<dyn TaskFactory>) {
        self.factories.insert(id.to_string(), factory);
    }

    pub fn get(&self, id: &str) -> Option<&dyn TaskFactory> {
        self.factories.get(id).map(|f| &**f)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::KindId;

    fn step() -> CraftingStep {
        CraftingStep::new(CraftingPattern::new(
            vec![ResourceStack::new(KindId(1), 4)],
            vec![ResourceStack::new(KindId(2), 2), ResourceStack::new(KindId(3), 1)],
        ))
    }

    #[test]
    fn pending_step_ignores_outputs() {
        let mut s = step();
        assert!(!s.on_receive_output(&ResourceStack::new(KindId(2), 2)));
        assert!(s.is_pending());
    }

    #[test]
    fn started_step_completes_when_all_outputs_arrive() {
        let mut s = step();
        s.start();
        assert!(s.on_receive_output(&ResourceStack::new(KindId(2), 1)));
        assert!(!s.is_done());
        assert!(s.on_receive_output(&ResourceStack::new(KindId(2), 5)));
        assert!(!s.is_done());
        assert!(!s.on_receive_output(&ResourceStack::new(KindId(9), 1)));
        assert!(s.on_receive_output(&ResourceStack::new(KindId(3), 1)));
        assert!(s.is_done());
        assert!(!s.on_receive_output(&ResourceStack::new(KindId(3), 1)));
    }

    #[test]
    fn pending_output_follows_state() {
        let mut s = step();
        let two = ResourceStack::new(KindId(2), 1);
        assert_eq!(s.pending_output(&two, CompareFlags::default()), 2);
        s.start();
        let _ = s.on_receive_output(&ResourceStack::new(KindId(2), 1));
        assert_eq!(s.pending_output(&two, CompareFlags::default()), 1);
    }

    #[test]
    fn runs_round_up() {
        assert_eq!(runs_for(10, 2), 5);
        assert_eq!(runs_for(11, 2), 6);
        assert_eq!(runs_for(0, 2), 0);
        assert_eq!(runs_for(3, 0), 3);
    }

    #[test]
    fn unrepresentable_document_is_written_as_null() {
        let mut by_pair = HashMap::new();
        by_pair.insert((1u32, 2u32), 3u32);
        assert_eq!(to_document("pair map", &by_pair), Value::Null);

        let stack = ResourceStack::new(KindId(4), 2);
        assert_eq!(to_document("stack", &stack)["quantity"], 2);
    }

    #[test]
    fn default_factories() {
        let registry = TaskFactoryRegistry::with_defaults();
        assert!(registry.contains(crate::pattern::PROCESSING_TASK_ID));
        assert!(registry.get("acme:unknown").is_none());
    }
}
