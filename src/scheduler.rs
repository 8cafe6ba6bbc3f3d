//! # Scheduler
//!
//! Picks the next task to run. Two policies, switchable at runtime:
//!
//! - **Round-robin**: one cursor walks the task table and stops at the next
//!   `Ready` task. Priority is ignored.
//! - **Priority**: the lowest priority number among `Ready` tasks wins. Each
//!   priority level keeps its own cursor, so tasks sharing the winning level
//!   take turns.
//!
//! The cursor always holds the index *after* the last pick, so a task that
//! was just chosen is the last candidate on the next scan.
//!
//! Selection never blocks. If nothing is `Ready` it returns `None`; the
//! always-ready idle task keeps that from happening on a live system.

use crate::config::NUM_PRIORITIES;
use crate::task::TaskControlBlock;

/// Scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPolicy {
    /// Strict priority, round-robin within a level.
    Priority,
    /// Plain rotation over every `Ready` task.
    RoundRobin,
}

/// Rotating cursors for both policies.
///
/// Both sets of cursors persist across policy changes, so switching back
/// and forth does not restart the rotation.
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Active policy.
    pub policy: SchedulerPolicy,

    /// Next candidate under round-robin.
    rr_cursor: usize,

    /// Next candidate per priority level.
    prio_cursors: [usize; NUM_PRIORITIES],
}

impl Scheduler {
    pub const fn new(policy: SchedulerPolicy) -> Self {
        Self {
            policy,
            rr_cursor: 0,
            prio_cursors: [0; NUM_PRIORITIES],
        }
    }

    /// Selects the index of the next task to run.
    pub fn select_next(&mut self, tasks: &[TaskControlBlock]) -> Option<usize> {
        match self.policy {
            SchedulerPolicy::RoundRobin => {
                let pick = scan(tasks, self.rr_cursor, |_| true)?;
                self.rr_cursor = (pick + 1) % tasks.len();
                Some(pick)
            }
            SchedulerPolicy::Priority => {
                let top = tasks
                    .iter()
                    .filter(|t| t.is_ready())
                    .map(|t| t.priority)
                    .min()?;
                let level = usize::from(top).min(NUM_PRIORITIES - 1);
                let pick = scan(tasks, self.prio_cursors[level], |t| t.priority == top)?;
                self.prio_cursors[level] = (pick + 1) % tasks.len();
                Some(pick)
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerPolicy::Priority)
    }
}

/// First `Ready` task accepted by `filter`, starting at `start` and
/// wrapping once around the table.
fn scan<F>(tasks: &[TaskControlBlock], start: usize, filter: F) -> Option<usize>
where
    F: Fn(&TaskControlBlock) -> bool,
{
    let len = tasks.len();
    (0..len)
        .map(|offset| (start + offset) % len)
        .find(|&i| tasks[i].is_ready() && filter(&tasks[i]))
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
