//! # Kernel Errors
//!
//! Every fallible kernel operation reports one of these. Nothing in the
//! kernel panics on input that came from a task.
//!
//! Across the trap boundary an error travels as a status word: the
//! negative discriminant reinterpreted as `u32`. Zero means success.

/// Errors reported by kernel operations and system calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// No run of free subregions can hold the request.
    #[error("out of memory")]
    OutOfMemory,
    /// The allocation table has no free entry.
    #[error("allocation table full")]
    AllocationTableFull,
    /// Zero-byte allocation request.
    #[error("invalid allocation size")]
    InvalidSize,
    /// Every task slot is occupied.
    #[error("task table full")]
    TaskTableFull,
    /// A task with the same entry point already exists.
    #[error("duplicate task")]
    DuplicateTask,
    /// Name is empty or longer than `MAX_NAME_LEN`.
    #[error("invalid task name")]
    InvalidName,
    /// Priority is not below `NUM_PRIORITIES`.
    #[error("invalid priority")]
    InvalidPriority,
    /// No task carries this identity.
    #[error("unknown task")]
    UnknownTask,
    /// The task is already stopped.
    #[error("task already stopped")]
    AlreadyStopped,
    /// Only stopped tasks can be restarted.
    #[error("task not stopped")]
    NotStopped,
    /// Mutex or semaphore id outside its table.
    #[error("invalid mutex or semaphore")]
    InvalidPrimitive,
    /// A wait queue is full.
    #[error("wait queue full")]
    QueueFull,
    /// The address is not a dynamic window owned by the caller.
    #[error("not owner of allocation")]
    NotOwner,
    /// A buffer passed by a task lies outside the caller's memory windows.
    #[error("bad user buffer")]
    BadUserBuffer,
    /// The trap carried an opcode the dispatcher does not know.
    #[error("unknown system call {0:#04x}")]
    UnknownSyscall(u8),
    /// A system call arrived while no task was dispatched.
    #[error("no current task")]
    NoCurrentTask,
    /// The scheduler found nothing to run. The idle task is missing.
    #[error("no ready task")]
    NoReadyTask,
}

impl KernelError {
    /// Status word written back to the calling task.
    pub const fn code(self) -> u32 {
        let code: i32 = match self {
            Self::OutOfMemory => -1,
            Self::AllocationTableFull => -2,
            Self::InvalidSize => -3,
            Self::TaskTableFull => -4,
            Self::DuplicateTask => -5,
            Self::InvalidName => -6,
            Self::InvalidPriority => -7,
            Self::UnknownTask => -8,
            Self::AlreadyStopped => -9,
            Self::NotStopped => -10,
            Self::InvalidPrimitive => -11,
            Self::QueueFull => -12,
            Self::NotOwner => -13,
            Self::BadUserBuffer => -14,
            Self::UnknownSyscall(_) => -15,
            Self::NoCurrentTask => -16,
            Self::NoReadyTask => -17,
        };
        code as u32
    }
}

impl KernelError {
    /// Inverse of [`code`](Self::code), for the task side of a trap.
    /// Anything that is not a known error code is a successful result.
    pub fn from_status(word: u32) -> Result<u32, KernelError> {
        let error = match word as i32 {
            -1 => Self::OutOfMemory,
            -2 => Self::AllocationTableFull,
            -3 => Self::InvalidSize,
            -4 => Self::TaskTableFull,
            -5 => Self::DuplicateTask,
            -6 => Self::InvalidName,
            -7 => Self::InvalidPriority,
            -8 => Self::UnknownTask,
            -9 => Self::AlreadyStopped,
            -10 => Self::NotStopped,
            -11 => Self::InvalidPrimitive,
            -12 => Self::QueueFull,
            -13 => Self::NotOwner,
            -14 => Self::BadUserBuffer,
            -15 => Self::UnknownSyscall(0),
            -16 => Self::NoCurrentTask,
            -17 => Self::NoReadyTask,
            _ => return Ok(word),
        };
        Err(error)
    }
}

/// Collapses a kernel result into the status word a task sees.
pub fn status(result: Result<(), KernelError>) -> u32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_negative_and_distinct() {
        let all = [
            KernelError::OutOfMemory,
            KernelError::AllocationTableFull,
            KernelError::InvalidSize,
            KernelError::TaskTableFull,
            KernelError::DuplicateTask,
            KernelError::InvalidName,
            KernelError::InvalidPriority,
            KernelError::UnknownTask,
            KernelError::AlreadyStopped,
            KernelError::NotStopped,
            KernelError::InvalidPrimitive,
            KernelError::QueueFull,
            KernelError::NotOwner,
            KernelError::BadUserBuffer,
            KernelError::UnknownSyscall(0x42),
            KernelError::NoCurrentTask,
            KernelError::NoReadyTask,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!((a.code() as i32) < 0);
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_status_word() {
        assert_eq!(status(Ok(())), 0);
        assert_eq!(status(Err(KernelError::UnknownTask)) as i32, -8);
    }

    #[test]
    fn test_from_status() {
        assert_eq!(KernelError::from_status(0), Ok(0));
        assert_eq!(KernelError::from_status(0x2000_4000), Ok(0x2000_4000));
        assert_eq!(
            KernelError::from_status(KernelError::NotOwner.code()),
            Err(KernelError::NotOwner)
        );
        assert_eq!(
            KernelError::from_status(KernelError::UnknownSyscall(0x42).code()),
            Err(KernelError::UnknownSyscall(0))
        );
        assert_eq!(KernelError::from_status(-18i32 as u32), Ok(-18i32 as u32));
    }
}
