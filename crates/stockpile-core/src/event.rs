//! Scheduler lifecycle events.
//!
//! The scheduler appends events as tasks move through their lifecycle.
//! Observers (a crafting monitor, logging, tests) take them with
//! [`CraftingScheduler::drain_events`](crate::scheduler::CraftingScheduler::drain_events).

use crate::fixed::Cycles;
use crate::id::TaskId;

/// Why a task was discarded without running to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The task failed its validity check at promotion.
    Invalid,
    /// A persisted task document could not be turned into a task.
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    Scheduled {
        task: TaskId,
        quantity: u32,
        cycle: Cycles,
    },
    Promoted {
        task: TaskId,
        cycle: Cycles,
    },
    /// `task` is `None` for documents that never became a task.
    Dropped {
        task: Option<TaskId>,
        reason: DropReason,
        cycle: Cycles,
    },
    Completed {
        task: TaskId,
        cycle: Cycles,
    },
    Cancelled {
        task: TaskId,
        cycle: Cycles,
    },
    MissingCleared {
        task: TaskId,
        cycle: Cycles,
    },
}

impl SchedulerEvent {
    /// The task this event concerns, if any.
    pub fn task(&self) -> Option<TaskId> {
        match self {
            SchedulerEvent::Scheduled { task, .. }
            | SchedulerEvent::Promoted { task, .. }
            | SchedulerEvent::Completed { task, .. }
            | SchedulerEvent::Cancelled { task, .. }
            | SchedulerEvent::MissingCleared { task, .. } => Some(*task),
            SchedulerEvent::Dropped { task, .. } => *task,
        }
    }

    pub fn cycle(&self) -> Cycles {
        match self {
            SchedulerEvent::Scheduled { cycle, .. }
            | SchedulerEvent::Promoted { cycle, .. }
            | SchedulerEvent::Dropped { cycle, .. }
            | SchedulerEvent::Completed { cycle, .. }
            | SchedulerEvent::Cancelled { cycle, .. }
            | SchedulerEvent::MissingCleared { cycle, .. } => *cycle,
        }
    }
}
