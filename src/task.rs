//! # Task Control Block
//!
//! Defines the task model for Kestrel. Every task owns exactly one stack
//! window from the region allocator, a saved stack pointer that is valid
//! while the task is not running, and the access mask the MPU driver loads
//! when the task is dispatched.
//!
//! A task is named from outside the kernel by its [`Pid`], the address of
//! its entry function. Table indices never leave the kernel.

use heapless::String;

use crate::config::{MAX_NAME_LEN, NAME_FIELD_LEN};
use crate::error::KernelError;
use crate::mpu::AccessMask;

// ---------------------------------------------------------------------------
// Task identity
// ---------------------------------------------------------------------------

/// Stable task identity: the task's entry address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(pub u32);

impl Pid {
    /// Decodes the `r0` word a name lookup returns. Zero means no such
    /// task; a status code means the lookup itself was refused.
    pub fn from_reply(word: u32) -> Option<Self> {
        match KernelError::from_status(word) {
            Ok(0) | Err(_) => None,
            Ok(pid) => Some(Pid(pid)),
        }
    }
}

impl From<extern "C" fn() -> !> for Pid {
    fn from(entry: extern "C" fn() -> !) -> Self {
        Pid(entry as usize as u32)
    }
}

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task slot.
///
/// ```text
///                 create_thread()
///   ┌─────────┐ ─────────────────► ┌─────────┐  sleep()   ┌─────────┐
///   │ Invalid │                    │  Ready  │ ─────────► │ Delayed │
///   └─────────┘                    └─────────┘ ◄───────── └─────────┘
///                                   ▲  │  ▲     tick → 0
///                   unlock()/post() │  │  │ restart_thread()
///   ┌────────────────────┐          │  │  │
///   │ BlockedOnMutex /   │ ◄────────┘  │  └──────────── ┌─────────┐
///   │ BlockedOnSemaphore │  lock/wait  │  stop_thread() │ Stopped │
///   └────────────────────┘             └──────────────► └─────────┘
/// ```
///
/// Any occupied state can move to `Stopped`. There is no separate
/// "running" state: the running task is `Ready` and recorded as current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Free slot.
    Invalid = 0,
    /// Killed; keeps its slot, name and stack size so it can be restarted.
    Stopped = 1,
    /// Runnable.
    Ready = 2,
    /// Sleeping for `sleep_ticks` more ticks.
    Delayed = 3,
    /// Queued on a mutex.
    BlockedOnMutex = 4,
    /// Queued on a semaphore.
    BlockedOnSemaphore = 5,
}

/// The primitive a blocked task is queued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Mutex(u8),
    Semaphore(u8),
}

impl Primitive {
    /// Table index of the primitive, whichever table it lives in.
    pub const fn id(self) -> u8 {
        match self {
            Primitive::Mutex(id) | Primitive::Semaphore(id) => id,
        }
    }
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// Per-task kernel record. Stored in a fixed-size table inside the kernel.
#[derive(Debug, Clone)]
pub struct TaskControlBlock {
    /// Current state. `Invalid` iff the slot is free.
    pub state: TaskState,

    /// Identity used by tools to name the task.
    pub pid: Pid,

    /// Human-readable name, unique in practice but not enforced.
    pub name: String<MAX_NAME_LEN>,

    /// First byte of the stack window.
    pub stack_base: u32,

    /// Stack window length after rounding. Restart asks for this again.
    pub stack_size: u32,

    /// Saved process stack pointer. Only meaningful while the task is not
    /// the running one.
    pub sp: u32,

    /// Priority, 0 highest.
    pub priority: u8,

    /// Subregions this task may touch while it runs.
    pub mask: AccessMask,

    /// Remaining ticks while `Delayed`.
    pub sleep_ticks: u32,

    /// Primitive the task is queued on, when blocked.
    pub blocked_on: Option<Primitive>,

    /// Ticks run, double-buffered by accounting window. The kernel picks
    /// which bucket is live.
    pub elapsed: [u32; 2],

    /// Tick count when the task was last dispatched.
    pub dispatched_at: u32,
}

impl TaskControlBlock {
    /// An unoccupied slot.
    pub const fn empty() -> Self {
        Self {
            state: TaskState::Invalid,
            pid: Pid(0),
            name: String::new(),
            stack_base: 0,
            stack_size: 0,
            sp: 0,
            priority: 0,
            mask: AccessMask::deny_all(),
            sleep_ticks: 0,
            blocked_on: None,
            elapsed: [0; 2],
            dispatched_at: 0,
        }
    }

    /// Whether the slot holds a task (stopped or not).
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.state != TaskState::Invalid
    }

    /// Whether the scheduler may pick this task.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Ready
    }

    /// One past the highest stack address.
    #[inline]
    pub fn stack_top(&self) -> u32 {
        self.stack_base + self.stack_size
    }

    /// The name as a NUL-padded fixed field.
    pub fn name_field(&self) -> [u8; NAME_FIELD_LEN] {
        let mut field = [0u8; NAME_FIELD_LEN];
        let bytes = self.name.as_bytes();
        field[..bytes.len()].copy_from_slice(bytes);
        field
    }

    /// Zeroes the accounting counters.
    pub fn reset_accounting(&mut self) {
        self.elapsed = [0; 2];
        self.dispatched_at = 0;
    }
}

impl Default for TaskControlBlock {
    fn default() -> Self {
        Self::empty()
    }
}

/// Validates a task name. Names are 1 to `MAX_NAME_LEN` bytes with no NUL.
pub fn task_name(name: &str) -> Option<String<MAX_NAME_LEN>> {
    if name.is_empty() || name.as_bytes().contains(&0) {
        return None;
    }
    let mut owned = String::new();
    owned.push_str(name).ok()?;
    Some(owned)
}

/// Builds the NUL-terminated field a name lookup reads. Input stops at its
/// first NUL. A name too long to be a task name fills the field with no
/// terminator and matches nothing.
pub fn name_key(name: &[u8]) -> [u8; NAME_FIELD_LEN] {
    let len = name
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(name.len())
        .min(NAME_FIELD_LEN);
    let mut key = [0u8; NAME_FIELD_LEN];
    key[..len].copy_from_slice(&name[..len]);
    key
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
