//! # Diagnostic Records
//!
//! Fixed-layout records the administrative system calls copy into task
//! buffers. Each is plain old data with no padding, so the kernel writes
//! its bytes as-is and the task reads them back with the same type.

use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::{MAX_ALLOCS, MAX_MUTEXES, MAX_SEMAPHORES, MAX_TASKS, MAX_WAITERS, NAME_FIELD_LEN};
use crate::task::TaskControlBlock;

/// `blocked_on` value for a task that is not blocked.
pub const NOT_BLOCKED: u8 = 0xFF;

/// `owner` value for an unowned mutex.
pub const NO_OWNER: u8 = 0xFF;

/// One row of the task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct TaskInfo {
    pub pid: u32,
    pub name: [u8; NAME_FIELD_LEN],
    pub priority: u32,
    /// Ticks run during the last complete accounting window.
    pub runtime: u32,
    /// `TaskState` discriminant.
    pub state: u8,
    /// Primitive id, or [`NOT_BLOCKED`].
    pub blocked_on: u8,
    pub _reserved: [u8; 2],
}

impl TaskInfo {
    pub fn new(tcb: &TaskControlBlock, runtime: u32) -> Self {
        Self {
            pid: tcb.pid.0,
            name: tcb.name_field(),
            priority: u32::from(tcb.priority),
            runtime,
            state: tcb.state as u8,
            blocked_on: tcb.blocked_on.map_or(NOT_BLOCKED, |p| p.id()),
            _reserved: [0; 2],
        }
    }
}

/// Semaphore snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct SemaphoreInfo {
    pub count: u32,
    pub queue_len: u8,
    /// Waiting task slots, head first. Index into `IpcsInfo::names`.
    pub queue: [u8; MAX_WAITERS],
    pub _reserved: [u8; 3],
}

/// Mutex snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct MutexInfo {
    pub locked: u8,
    /// Owning task slot, or [`NO_OWNER`].
    pub owner: u8,
    pub queue_len: u8,
    pub queue: [u8; MAX_WAITERS],
    pub _reserved: [u8; 1],
}

/// Every primitive, plus the slot names needed to print their queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct IpcsInfo {
    pub semaphores: [SemaphoreInfo; MAX_SEMAPHORES],
    pub mutexes: [MutexInfo; MAX_MUTEXES],
    /// NUL-padded name per task slot; empty for free slots.
    pub names: [[u8; NAME_FIELD_LEN]; MAX_TASKS],
}

impl Default for IpcsInfo {
    fn default() -> Self {
        Self {
            semaphores: [SemaphoreInfo::default(); MAX_SEMAPHORES],
            mutexes: [MutexInfo::default(); MAX_MUTEXES],
            names: [[0; NAME_FIELD_LEN]; MAX_TASKS],
        }
    }
}

/// One row of the memory report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct MemInfo {
    pub owner_name: [u8; NAME_FIELD_LEN],
    pub base: u32,
    pub size: u32,
    /// Peak use for stack windows, 0 for dynamic windows.
    pub usage_permille: u32,
    /// Non-zero for rows that describe a live allocation.
    pub valid: u8,
    pub _reserved: [u8; 3],
}

/// Full memory report: one row per allocation table entry.
pub type MemReport = [MemInfo; MAX_ALLOCS];

/// Full task list: one row per task slot.
pub type TaskReport = [TaskInfo; MAX_TASKS];

const_assert_eq!(core::mem::size_of::<TaskInfo>(), 32);
const_assert_eq!(core::mem::size_of::<SemaphoreInfo>(), 20);
const_assert_eq!(core::mem::size_of::<MutexInfo>(), 16);
const_assert_eq!(core::mem::size_of::<IpcsInfo>(), 268);
const_assert_eq!(core::mem::size_of::<MemInfo>(), 32);

/// The text of a NUL-padded name field.
pub fn field_str(field: &[u8]) -> &str {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    core::str::from_utf8(&field[..len]).unwrap_or("")
}

/// Copies a queue into a fixed snapshot field.
pub(crate) fn queue_field(slots: &[u8]) -> (u8, [u8; MAX_WAITERS]) {
    let mut field = [0u8; MAX_WAITERS];
    let len = slots.len().min(MAX_WAITERS);
    field[..len].copy_from_slice(&slots[..len]);
    (len as u8, field)
}
