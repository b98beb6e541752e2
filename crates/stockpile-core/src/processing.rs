//! The built-in processing task.
//!
//! A processing task runs its pattern once per step. Planning reserves
//! inputs from a snapshot of the item view and, where stock falls short,
//! chains further patterns that produce the missing input. Sub-pattern
//! steps are placed before the steps that consume their output.

use crate::disk::DiskType;
use crate::pattern::{CraftingPattern, CraftingPatternRegistry};
use crate::stack::{CompareFlags, ResourceStack, StackList};
use crate::storage::StorageNetwork;
use crate::task::{
    CraftingStep, CraftingTask, TaskContext, TaskError, TaskFactory, TaskPoll, UsedCrafters,
    runs_for, to_document,
};
use crate::id::NodeId;
use crate::node::NodeSet;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum nesting of chained sub-patterns.
pub const MAX_CHAIN_DEPTH: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct ProcessingDocument {
    #[serde(rename = "PatternId")]
    pattern_id: String,
    #[serde(rename = "Pattern")]
    pattern: CraftingPattern,
    #[serde(rename = "Container")]
    container: NodeId,
    #[serde(rename = "Requested")]
    requested: ResourceStack,
    #[serde(rename = "Quantity")]
    quantity: u32,
    #[serde(rename = "Steps", default)]
    steps: Vec<CraftingStep>,
    #[serde(rename = "Missing", default)]
    missing: StackList,
}

#[derive(Debug, Clone)]
pub struct ProcessingTask {
    pattern: CraftingPattern,
    requested: ResourceStack,
    quantity: u32,
    runs: u32,
    steps: Vec<CraftingStep>,
    missing: StackList,
    from_persistence: bool,
}

impl ProcessingTask {
    pub fn new(pattern: CraftingPattern, requested: ResourceStack, quantity: u32) -> Self {
        let runs = runs_for(quantity, pattern.output_quantity_for(&requested));
        Self {
            pattern,
            requested,
            quantity,
            runs,
            steps: Vec::new(),
            missing: StackList::new(),
            from_persistence: false,
        }
    }

    /// Output of `stack` that steps other than `except` will still deliver.
    fn in_flight_output(&self, except: usize, stack: &ResourceStack, flags: CompareFlags) -> u32 {
        self.steps
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != except)
            .map(|(_, step)| step.pending_output(stack, flags))
            .fold(0u32, u32::saturating_add)
    }
}

/// Inputs of one run that storage cannot currently supply.
fn shortfalls(pattern: &CraftingPattern, storage: &mut dyn StorageNetwork) -> Vec<ResourceStack> {
    let flags = pattern.input_flags();
    pattern
        .inputs
        .iter()
        .filter_map(|input| {
            let available = storage
                .extract(DiskType::Items, input, input.quantity, flags, true)
                .map_or(0, |s| s.quantity);
            (available < input.quantity).then(|| input.copy_with_quantity(input.quantity - available))
        })
        .collect()
}

/// Put stacks back into storage after a refused hand-over.
fn restore(storage: &mut dyn StorageNetwork, stacks: Vec<ResourceStack>) {
    for stack in stacks {
        if let Some(lost) = storage.insert(DiskType::Items, stack, false) {
            warn!(
                "Storage full while returning inputs, {} of kind {:?} lost",
                lost.quantity, lost.kind
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

struct Planner<'a> {
    patterns: &'a CraftingPatternRegistry,
    stock: StackList,
    steps: Vec<CraftingStep>,
    missing: StackList,
    /// Patterns currently being expanded, outermost first.
    chain: Vec<CraftingPattern>,
}

impl Planner<'_> {
    fn plan(&mut self, pattern: &CraftingPattern, runs: u32) {
        let flags = pattern.input_flags();
        for input in &pattern.inputs {
            let need = input.quantity.saturating_mul(runs);
            let taken = self.stock.remove(input, need, flags);
            if taken < need {
                self.cover(input, need - taken, flags);
            }
        }
        for _ in 0..runs {
            self.steps.push(CraftingStep::new(pattern.clone()));
        }
    }

    fn cover(&mut self, input: &ResourceStack, short: u32, flags: CompareFlags) {
        let patterns = self.patterns;
        let sub = if self.chain.len() < MAX_CHAIN_DEPTH {
            patterns
                .get_pattern(input, flags, &self.stock)
                .filter(|candidate| !self.chain.contains(candidate))
                .cloned()
        } else {
            None
        };
        let Some(sub) = sub else {
            self.missing.add(input.copy_with_quantity(short));
            return;
        };

        let per_run = sub.output_for(input, flags).map_or(1, |o| o.quantity.max(1));
        let sub_runs = runs_for(short, per_run);
        self.chain.push(sub.clone());
        self.plan(&sub, sub_runs);
        self.chain.pop();

        // Surplus output and byproducts stay available to later inputs.
        for produced in sub.outputs.iter().chain(sub.byproducts.iter()) {
            self.stock
                .add(produced.copy_with_quantity(produced.quantity.saturating_mul(sub_runs)));
        }
        let _ = self.stock.remove(input, short, flags);
    }
}

// ---------------------------------------------------------------------------
// CraftingTask
// ---------------------------------------------------------------------------

impl CraftingTask for ProcessingTask {
    fn calculate(&mut self, patterns: &CraftingPatternRegistry, items: &StackList) {
        let mut planner = Planner {
            patterns,
            stock: items.clone(),
            steps: Vec::new(),
            missing: StackList::new(),
            chain: vec![self.pattern.clone()],
        };
        let root = self.pattern.clone();
        planner.plan(&root, self.runs);
        self.steps = planner.steps;
        self.missing = planner.missing;
        debug!(
            "Planned {} x{:?}: {} runs, {} steps, {} missing",
            self.quantity,
            self.requested.kind,
            self.runs,
            self.steps.len(),
            self.missing.len()
        );
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>, used: &mut UsedCrafters) -> TaskPoll {
        if !self.missing.is_empty() {
            return TaskPoll::Blocked;
        }
        if self.steps.iter().all(CraftingStep::is_done) {
            return TaskPoll::Completed;
        }

        for index in 0..self.steps.len() {
            if !self.steps[index].is_pending() {
                continue;
            }
            let pattern = self.steps[index].pattern.clone();
            let container = pattern.container;
            let Some(node) = ctx.nodes.get(container) else {
                continue;
            };
            let started = used.get(&container).copied().unwrap_or(0);
            if !node.can_update() || started >= node.speed() {
                continue;
            }

            let flags = pattern.input_flags();
            let short = shortfalls(&pattern, ctx.storage);
            if !short.is_empty() {
                for stack in short {
                    let covered = self.in_flight_output(index, &stack, flags);
                    if covered < stack.quantity {
                        self.missing.add(stack.copy_with_quantity(stack.quantity - covered));
                    }
                }
                continue;
            }

            let mut inputs = Vec::with_capacity(pattern.inputs.len());
            let mut complete = true;
            for input in &pattern.inputs {
                match ctx
                    .storage
                    .extract(DiskType::Items, input, input.quantity, flags, false)
                {
                    Some(got) => {
                        complete &= got.quantity == input.quantity;
                        inputs.push(got);
                    }
                    None => complete = false,
                }
            }
            if !complete {
                restore(ctx.storage, inputs);
                continue;
            }

            let Some(node) = ctx.nodes.get_mut(container) else {
                restore(ctx.storage, inputs);
                continue;
            };
            match node.accept(&pattern, inputs) {
                Ok(()) => {
                    *used.entry(container).or_insert(0) += 1;
                    self.steps[index].start();
                    debug!("Started step {} of {:?} on {:?}", index, self.requested.kind, container);
                }
                Err(returned) => restore(ctx.storage, returned),
            }
        }

        if self.missing.is_empty() {
            TaskPoll::Running
        } else {
            TaskPoll::Blocked
        }
    }

    fn on_cancelled(&mut self, ctx: &mut TaskContext<'_>) {
        let started = self.steps.iter().filter(|s| !s.is_pending()).count();
        debug!(
            "Cancelled task for {:?} at cycle {}: {} of {} steps had started",
            self.requested.kind,
            ctx.cycle,
            started,
            self.steps.len()
        );
        self.steps.retain(|s| !s.is_pending());
        self.missing.clear();
    }

    fn is_valid(&self, nodes: &NodeSet) -> bool {
        nodes.contains_key(self.pattern.container)
            && self
                .steps
                .iter()
                .all(|s| s.is_done() || nodes.contains_key(s.pattern.container))
    }

    fn on_receive_output(&mut self, stack: &ResourceStack) -> bool {
        self.steps.iter_mut().any(|s| s.on_receive_output(stack))
    }

    fn pattern(&self) -> &CraftingPattern {
        &self.pattern
    }

    fn requested(&self) -> &ResourceStack {
        &self.requested
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }

    fn runs(&self) -> u32 {
        self.runs
    }

    fn missing(&self) -> &StackList {
        &self.missing
    }

    fn missing_mut(&mut self) -> &mut StackList {
        &mut self.missing
    }

    fn steps(&self) -> &[CraftingStep] {
        &self.steps
    }

    fn write(&self) -> Value {
        let doc = ProcessingDocument {
            pattern_id: self.pattern.id.clone(),
            pattern: self.pattern.clone(),
            container: self.pattern.container,
            requested: self.requested.clone(),
            quantity: self.quantity,
            steps: self.steps.clone(),
            missing: self.missing.clone(),
        };
        to_document("processing task", &doc)
    }

    fn from_persistence(&self) -> bool {
        self.from_persistence
    }
}

/// Factory for [`ProcessingTask`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessingTaskFactory;

impl TaskFactory for ProcessingTaskFactory {
    fn create(
        &self,
        pattern: CraftingPattern,
        requested: ResourceStack,
        quantity: u32,
    ) -> Box<dyn CraftingTask> {
        Box::new(ProcessingTask::new(pattern, requested, quantity))
    }

    fn from_document(&self, doc: &Value) -> Result<Box<dyn CraftingTask>, TaskError> {
        let doc: ProcessingDocument =
            serde_json::from_value(doc.clone()).map_err(|e| TaskError::Decode(e.to_string()))?;
        let pattern = doc.pattern.with_container(doc.container);
        let mut task = ProcessingTask::new(pattern, doc.requested, doc.quantity);
        task.steps = doc.steps;
        task.missing = doc.missing;
        task.from_persistence = true;
        Ok(Box::new(task))
    }
}
