//! The crafting task scheduler.
//!
//! # Cycle order
//!
//! Each call to [`CraftingScheduler::update`] is one cycle:
//!
//! 1. **Rehydrate** - task documents read since the last cycle become tasks
//!    and are queued with [`add`](CraftingScheduler::add).
//! 2. **Cancel** - queued cancellations run `on_cancelled` once and remove
//!    the task.
//! 3. **Promote** - pending tasks that are still valid become live, in
//!    insertion order. Invalid ones are dropped.
//! 4. **Execute** - on cycles divisible by the update interval every live
//!    task is updated with a shared [`UsedCrafters`] map. Completed tasks
//!    are removed. Blocked tasks may have their missing set cleared on
//!    retry cycles.
//!
//! Steps 2 to 4 only run while the network can run; the cycle counter only
//! advances with them.

use crate::config::SchedulerConfig;
use crate::event::{DropReason, SchedulerEvent};
use crate::fixed::Cycles;
use crate::id::{NodeId, TaskId};
use crate::node::NodeSet;
use crate::pattern::{CraftingPattern, CraftingPatternRegistry};
use crate::rng::SimRng;
use crate::stack::{CompareFlags, ResourceStack, StackList};
use crate::task::{
    CraftingTask, DOC_CONTAINER, DOC_PATTERN_ID, TaskContext, TaskError, TaskFactoryRegistry,
    TaskPoll, UsedCrafters,
};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use slotmap::SlotMap;

pub const DOC_CRAFTING_TASKS: &str = "CraftingTasks";

#[derive(Debug)]
pub struct CraftingScheduler {
    tasks: SlotMap<TaskId, Box<dyn CraftingTask>>,
    /// Live tasks in promotion order.
    live: Vec<TaskId>,
    /// Added but not yet promoted.
    pending: Vec<TaskId>,
    to_cancel: Vec<TaskId>,
    /// Task documents waiting for the next cycle.
    to_read: Vec<Value>,
    cycle: Cycles,
    rng: SimRng,
    config: SchedulerConfig,
    patterns: CraftingPatternRegistry,
    factories: TaskFactoryRegistry,
    monitor_dirty: bool,
    events: Vec<SchedulerEvent>,
}

impl Default for CraftingScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default(), TaskFactoryRegistry::with_defaults())
    }
}

impl CraftingScheduler {
    pub fn new(config: SchedulerConfig, factories: TaskFactoryRegistry) -> Self {
        let config = config.normalized();
        Self {
            tasks: SlotMap::with_key(),
            live: Vec::new(),
            pending: Vec::new(),
            to_cancel: Vec::new(),
            to_read: Vec::new(),
            cycle: 0,
            rng: SimRng::new(config.rng_seed),
            config,
            patterns: CraftingPatternRegistry::new(),
            factories,
            monitor_dirty: false,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of cycles that have run.
    pub fn cycle(&self) -> Cycles {
        self.cycle
    }

    pub fn patterns(&self) -> &CraftingPatternRegistry {
        &self.patterns
    }

    pub fn factories_mut(&mut self) -> &mut TaskFactoryRegistry {
        &mut self.factories
    }

    pub fn task(&self, id: TaskId) -> Option<&dyn CraftingTask> {
        self.tasks.get(id).map(|t| &**t)
    }

    /// Live tasks in promotion order.
    pub fn live_tasks(&self) -> &[TaskId] {
        &self.live
    }

    /// Tasks added but not yet promoted.
    pub fn pending_tasks(&self) -> &[TaskId] {
        &self.pending
    }

    /// Number of tasks owned, live and pending.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_monitor_dirty(&self) -> bool {
        self.monitor_dirty
    }

    /// Called by the crafting monitor once it has refreshed.
    pub fn mark_monitor_clean(&mut self) {
        self.monitor_dirty = false;
    }

    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Patterns
    // -----------------------------------------------------------------------

    /// Re-index patterns from every operative node.
    pub fn rebuild(&mut self, nodes: &NodeSet) {
        self.patterns.rebuild(nodes);
        debug!("Rebuilt pattern index: {} patterns", self.patterns.len());
    }

    pub fn get_pattern(
        &self,
        request: &ResourceStack,
        flags: CompareFlags,
        items: &StackList,
    ) -> Option<&CraftingPattern> {
        self.patterns.get_pattern(request, flags, items)
    }

    // -----------------------------------------------------------------------
    // Task lifecycle
    // -----------------------------------------------------------------------

    /// Create a task for `pattern` through the factory registered under its
    /// task id. The task is not queued.
    pub fn create(
        &self,
        pattern: CraftingPattern,
        requested: ResourceStack,
        quantity: u32,
    ) -> Option<Box<dyn CraftingTask>> {
        let Some(factory) = self.factories.get(&pattern.id) else {
            warn!("No task factory registered for '{}'", pattern.id);
            return None;
        };
        Some(factory.create(pattern, requested, quantity))
    }

    /// Queue a task. It becomes live at the next cycle's promotion.
    pub fn add(&mut self, task: Box<dyn CraftingTask>) -> TaskId {
        let id = self.tasks.insert(task);
        self.pending.push(id);
        self.monitor_dirty = true;
        id
    }

    /// Queue `id` for cancellation at the next cycle. Returns `false` for
    /// unknown or already queued tasks.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        if !self.tasks.contains_key(id) || self.to_cancel.contains(&id) {
            return false;
        }
        self.to_cancel.push(id);
        true
    }

    /// Schedule production of `quantity` units of `request`.
    ///
    /// Demand already promised by live tasks is subtracted first. Returns
    /// `None` if a live blocking pattern already produces the request, if
    /// the demand is covered, or if no pattern produces it.
    pub fn schedule(
        &mut self,
        request: &ResourceStack,
        quantity: u32,
        flags: CompareFlags,
        items: &StackList,
    ) -> Option<TaskId> {
        let mut remaining = quantity as i64;
        for id in &self.live {
            let Some(task) = self.tasks.get(*id) else {
                continue;
            };
            let pattern = task.pattern();
            for output in pattern.outputs.iter().filter(|o| o.matches(request, flags)) {
                if pattern.blocking {
                    return None;
                }
                remaining -= output.quantity as i64 * task.runs() as i64;
            }
        }
        if remaining <= 0 {
            return None;
        }
        let remaining = remaining as u32;

        let pattern = self.patterns.get_pattern(request, flags, items)?.clone();
        let mut task = self.create(pattern, request.copy_with_quantity(remaining), remaining)?;
        task.calculate(&self.patterns, items);
        task.missing_mut().clear();

        let id = self.add(task);
        debug!("Scheduled {} x{:?} as {:?}", remaining, request.kind, id);
        self.events.push(SchedulerEvent::Scheduled {
            task: id,
            quantity: remaining,
            cycle: self.cycle,
        });
        Some(id)
    }

    /// Offer `quantity` of `stack` to the live tasks in order. Returns
    /// `true` once a task accepts it.
    pub fn track(&mut self, stack: &ResourceStack, quantity: u32) -> bool {
        let offered = stack.copy_with_quantity(quantity);
        for id in &self.live {
            if let Some(task) = self.tasks.get_mut(*id)
                && task.on_receive_output(&offered)
            {
                return true;
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Cycle
    // -----------------------------------------------------------------------

    /// Run one cycle.
    pub fn update(&mut self, ctx: &mut TaskContext<'_>, can_run: bool) {
        self.rehydrate(ctx.nodes);
        if !can_run {
            return;
        }
        ctx.cycle = self.cycle;
        let mut changed = false;

        for id in std::mem::take(&mut self.to_cancel) {
            let Some(mut task) = self.tasks.remove(id) else {
                continue;
            };
            task.on_cancelled(ctx);
            self.live.retain(|t| *t != id);
            self.pending.retain(|t| *t != id);
            self.events.push(SchedulerEvent::Cancelled {
                task: id,
                cycle: self.cycle,
            });
            changed = true;
        }

        for id in std::mem::take(&mut self.pending) {
            let valid = self.tasks.get(id).is_some_and(|t| t.is_valid(ctx.nodes));
            if valid {
                self.live.push(id);
                self.events.push(SchedulerEvent::Promoted {
                    task: id,
                    cycle: self.cycle,
                });
            } else {
                self.tasks.remove(id);
                debug!("Dropped invalid task {:?}", id);
                self.events.push(SchedulerEvent::Dropped {
                    task: Some(id),
                    reason: DropReason::Invalid,
                    cycle: self.cycle,
                });
            }
            changed = true;
        }

        if self.config.is_update_cycle(self.cycle) {
            let retry = self.config.is_retry_cycle(self.cycle);
            let mut used = UsedCrafters::new();
            let mut finished = Vec::new();
            for id in &self.live {
                let Some(task) = self.tasks.get_mut(*id) else {
                    continue;
                };
                match task.update(ctx, &mut used) {
                    TaskPoll::Completed => finished.push(*id),
                    _ if retry && !task.missing().is_empty() => {
                        if self.rng.chance(self.config.retry_probability) {
                            task.missing_mut().clear();
                            self.events.push(SchedulerEvent::MissingCleared {
                                task: *id,
                                cycle: self.cycle,
                            });
                            changed = true;
                        }
                    }
                    _ => {}
                }
            }
            for id in finished {
                self.tasks.remove(id);
                self.live.retain(|t| *t != id);
                debug!("Completed task {:?}", id);
                self.events.push(SchedulerEvent::Completed {
                    task: id,
                    cycle: self.cycle,
                });
                changed = true;
            }
        }

        self.cycle += 1;
        if changed {
            self.monitor_dirty = true;
        }
    }

    fn rehydrate(&mut self, nodes: &NodeSet) {
        if self.to_read.is_empty() {
            return;
        }
        for doc in std::mem::take(&mut self.to_read) {
            match self.read_task(&doc, nodes) {
                Ok(task) => {
                    self.add(task);
                }
                Err(error) => {
                    warn!("Dropping persisted crafting task, {}", error);
                    self.events.push(SchedulerEvent::Dropped {
                        task: None,
                        reason: DropReason::Unreadable,
                        cycle: self.cycle,
                    });
                }
            }
        }
    }

    fn read_task(&self, doc: &Value, nodes: &NodeSet) -> Result<Box<dyn CraftingTask>, TaskError> {
        let pattern_id = doc
            .get(DOC_PATTERN_ID)
            .and_then(Value::as_str)
            .ok_or(TaskError::MissingField(DOC_PATTERN_ID))?;
        let container = doc
            .get(DOC_CONTAINER)
            .ok_or(TaskError::MissingField(DOC_CONTAINER))?;
        let container: NodeId = serde_json::from_value(container.clone())
            .map_err(|e| TaskError::Decode(e.to_string()))?;
        if !nodes.contains_key(container) {
            return Err(TaskError::MissingContainer(container));
        }
        let factory = self
            .factories
            .get(pattern_id)
            .ok_or_else(|| TaskError::UnknownFactory(pattern_id.to_string()))?;
        factory.from_document(doc)
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Serialize live and pending tasks as `{"CraftingTasks": [...]}`.
    pub fn write(&self) -> Value {
        let tasks: Vec<Value> = self
            .live
            .iter()
            .chain(self.pending.iter())
            .filter_map(|id| self.tasks.get(*id))
            .map(|task| task.write())
            .collect();
        let mut doc = Map::new();
        doc.insert(DOC_CRAFTING_TASKS.to_string(), Value::Array(tasks));
        Value::Object(doc)
    }

    /// Queue task documents for rehydration at the next cycle. Returns the
    /// number queued. A missing top-level key means no data.
    pub fn read(&mut self, doc: &Value) -> usize {
        let Some(entries) = doc.get(DOC_CRAFTING_TASKS).and_then(Value::as_array) else {
            return 0;
        };
        self.to_read.extend(entries.iter().cloned());
        info!("Queued {} crafting tasks for rehydration", entries.len());
        entries.len()
    }
}
