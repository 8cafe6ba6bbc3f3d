//! # Kestrel Configuration
//!
//! Compile-time limits for the kernel tables and the runtime toggles that
//! tasks may flip through system calls. All tables are fixed-size; nothing in
//! the kernel grows at runtime.

use crate::scheduler::SchedulerPolicy;

/// Maximum number of task slots. Stopped tasks keep their slot so they can
/// be restarted.
pub const MAX_TASKS: usize = 12;

/// Number of distinct priority levels. Priority 0 is the highest.
pub const NUM_PRIORITIES: usize = 16;

/// Number of kernel mutexes.
pub const MAX_MUTEXES: usize = 1;

/// Number of kernel counting semaphores.
pub const MAX_SEMAPHORES: usize = 3;

/// Capacity of every wait queue. A task waits on at most one primitive at
/// a time, so a queue sized to the task table can never overflow.
pub const MAX_WAITERS: usize = MAX_TASKS;

/// Capacity of the allocation table (task stacks plus dynamic windows).
pub const MAX_ALLOCS: usize = 12;

/// Longest task name, in bytes. Names travel to tools NUL-terminated in a
/// 16-byte field.
pub const MAX_NAME_LEN: usize = 15;

/// Width of the name field in the records copied out to tasks.
pub const NAME_FIELD_LEN: usize = MAX_NAME_LEN + 1;

/// SysTick frequency in Hz. One tick is the unit of `sleep`.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (TM4C123 PLL at 40 MHz).
pub const SYSTEM_CLOCK_HZ: u32 = 40_000_000;

/// Default length of the CPU accounting window, in ticks.
pub const ACCOUNTING_WINDOW_TICKS: u32 = 1000;

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Kernel behaviour that can change while the system runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Which scheduling policy picks the next task.
    pub policy: SchedulerPolicy,

    /// When set, every tick arms the context-switch trap. When clear, tasks
    /// run until they yield, sleep or block.
    pub preemption: bool,

    /// Recorded and reported, but lock/unlock never boost an owner's
    /// priority. Kept so tools can toggle it without an error.
    pub priority_inheritance: bool,

    /// Length of one CPU accounting window in ticks. Must be non-zero.
    pub accounting_window: u32,
}

impl KernelConfig {
    /// Configuration used at boot.
    pub const fn new() -> Self {
        Self {
            policy: SchedulerPolicy::Priority,
            preemption: true,
            priority_inheritance: false,
            accounting_window: ACCOUNTING_WINDOW_TICKS,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
