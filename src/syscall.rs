//! # System Call Interface
//!
//! Tasks run unprivileged and reach the kernel only through `svc`. The
//! immediate of the `svc` instruction is the opcode; `r0` and `r1` carry
//! the arguments; the status or result comes back in `r0`.
//!
//! | Opcode | Call                  | r0                 | r1      | Returns                |
//! |--------|-----------------------|--------------------|---------|------------------------|
//! | 0x00   | `start`               | -                  | -       | 0                      |
//! | 0x01   | `yield`               | -                  | -       | 0                      |
//! | 0x02   | `sleep`               | ticks              | -       | 0                      |
//! | 0x03   | `lock`                | mutex id           | -       | status                 |
//! | 0x04   | `unlock`              | mutex id           | -       | status                 |
//! | 0x05   | `wait`                | semaphore id       | -       | status                 |
//! | 0x06   | `post`                | semaphore id       | -       | status                 |
//! | 0x07   | `set_scheduler`       | 1 = priority       | -       | 0                      |
//! | 0x08   | `priority_inheritance`| on/off             | -       | 0                      |
//! | 0x09   | `preemption`          | on/off             | -       | 0                      |
//! | 0x0A   | `ps`                  | `TaskReport` ptr   | -       | slots in use or status |
//! | 0x0B   | `ipcs`                | `IpcsInfo` ptr     | -       | status                 |
//! | 0x0C   | `pidof`               | name ptr           | -       | pid or 0               |
//! | 0x0D   | `meminfo`             | `MemReport` ptr    | -       | status                 |
//! | 0x0E   | `stop_thread`         | pid                | -       | status                 |
//! | 0x0F   | `malloc`              | bytes              | -       | address or 0           |
//! | 0x10   | `restart_thread`      | pid                | -       | status                 |
//! | 0x11   | `set_priority`        | pid                | prio    | status                 |
//! | 0x12   | `kill`                | pid                | -       | status                 |
//! | 0x13   | `free`                | address            | -       | status                 |
//! | 0xFF   | `reboot`              | -                  | -       | does not return        |
//!
//! Decoding happens in two steps: [`Opcode`] recovers the call number,
//! then [`Syscall::decode`] validates the argument registers into a typed
//! request. The kernel dispatches on the typed request only.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::KernelError;
use crate::mpu::AccessMask;
use crate::scheduler::SchedulerPolicy;
use crate::task::Pid;

/// System call numbers, as carried in the `svc` immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    Start = 0x00,
    Yield = 0x01,
    Sleep = 0x02,
    Lock = 0x03,
    Unlock = 0x04,
    Wait = 0x05,
    Post = 0x06,
    SetScheduler = 0x07,
    PriorityInheritance = 0x08,
    Preemption = 0x09,
    Ps = 0x0A,
    Ipcs = 0x0B,
    Pidof = 0x0C,
    MemInfo = 0x0D,
    StopThread = 0x0E,
    Malloc = 0x0F,
    RestartThread = 0x10,
    SetPriority = 0x11,
    Kill = 0x12,
    Free = 0x13,
    Reboot = 0xFF,
}

/// Address of a buffer in the caller's memory. Checked against the
/// caller's access mask before the kernel touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserBuffer {
    pub addr: u32,
}

/// A decoded system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Start,
    Yield,
    Sleep { ticks: u32 },
    Lock { mutex: u8 },
    Unlock { mutex: u8 },
    Wait { semaphore: u8 },
    Post { semaphore: u8 },
    SetScheduler(SchedulerPolicy),
    PriorityInheritance(bool),
    Preemption(bool),
    Ps(UserBuffer),
    Ipcs(UserBuffer),
    Pidof(UserBuffer),
    MemInfo(UserBuffer),
    StopThread(Pid),
    Malloc { bytes: u32 },
    RestartThread(Pid),
    SetPriority { pid: Pid, priority: u8 },
    Free { addr: u32 },
    Reboot,
}

impl Syscall {
    /// Builds a typed request from the raw trap registers.
    pub fn decode(opcode: u8, r0: u32, r1: u32) -> Result<Self, KernelError> {
        let op = Opcode::from_u8(opcode).ok_or(KernelError::UnknownSyscall(opcode))?;
        let primitive = || u8::try_from(r0).map_err(|_| KernelError::InvalidPrimitive);
        let call = match op {
            Opcode::Start => Syscall::Start,
            Opcode::Yield => Syscall::Yield,
            Opcode::Sleep => Syscall::Sleep { ticks: r0 },
            Opcode::Lock => Syscall::Lock { mutex: primitive()? },
            Opcode::Unlock => Syscall::Unlock { mutex: primitive()? },
            Opcode::Wait => Syscall::Wait { semaphore: primitive()? },
            Opcode::Post => Syscall::Post { semaphore: primitive()? },
            Opcode::SetScheduler => Syscall::SetScheduler(if r0 != 0 {
                SchedulerPolicy::Priority
            } else {
                SchedulerPolicy::RoundRobin
            }),
            Opcode::PriorityInheritance => Syscall::PriorityInheritance(r0 != 0),
            Opcode::Preemption => Syscall::Preemption(r0 != 0),
            Opcode::Ps => Syscall::Ps(UserBuffer { addr: r0 }),
            Opcode::Ipcs => Syscall::Ipcs(UserBuffer { addr: r0 }),
            Opcode::Pidof => Syscall::Pidof(UserBuffer { addr: r0 }),
            Opcode::MemInfo => Syscall::MemInfo(UserBuffer { addr: r0 }),
            Opcode::StopThread | Opcode::Kill => Syscall::StopThread(Pid(r0)),
            Opcode::Malloc => Syscall::Malloc { bytes: r0 },
            Opcode::RestartThread => Syscall::RestartThread(Pid(r0)),
            Opcode::SetPriority => Syscall::SetPriority {
                pid: Pid(r0),
                priority: u8::try_from(r1).map_err(|_| KernelError::InvalidPriority)?,
            },
            Opcode::Free => Syscall::Free { addr: r0 },
            Opcode::Reboot => Syscall::Reboot,
        };
        Ok(call)
    }
}

/// What the trap handler must do after a call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Return to the caller.
    Resume,
    /// Pend the context-switch trap.
    Switch,
    /// Load this mask for the caller before returning to it.
    Remap(AccessMask),
    /// Reset the system.
    Reset,
}

/// Result of one trap: the caller's new `r0` plus the follow-up action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub value: u32,
    pub action: Action,
}

impl Reply {
    pub const fn resume(value: u32) -> Self {
        Self { value, action: Action::Resume }
    }

    pub const fn switch(value: u32) -> Self {
        Self { value, action: Action::Switch }
    }

    /// A failed call. The caller keeps running.
    pub const fn error(error: KernelError) -> Self {
        Self::resume(error.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(Opcode::from_u8(0x00), Some(Opcode::Start));
        assert_eq!(Opcode::from_u8(0x0A), Some(Opcode::Ps));
        assert_eq!(Opcode::from_u8(0x13), Some(Opcode::Free));
        assert_eq!(Opcode::from_u8(0xFF), Some(Opcode::Reboot));
        assert_eq!(Opcode::from_u8(0x14), None);
        assert_eq!(Opcode::from_u8(0x80), None);
    }

    #[test]
    fn test_decode_arguments() {
        assert_eq!(Syscall::decode(0x02, 250, 0), Ok(Syscall::Sleep { ticks: 250 }));
        assert_eq!(Syscall::decode(0x05, 2, 0), Ok(Syscall::Wait { semaphore: 2 }));
        assert_eq!(
            Syscall::decode(0x11, 0x1234, 7),
            Ok(Syscall::SetPriority { pid: Pid(0x1234), priority: 7 })
        );
        assert_eq!(
            Syscall::decode(0x07, 0, 0),
            Ok(Syscall::SetScheduler(SchedulerPolicy::RoundRobin))
        );
        assert_eq!(
            Syscall::decode(0x07, 1, 0),
            Ok(Syscall::SetScheduler(SchedulerPolicy::Priority))
        );
    }

    #[test]
    fn test_kill_is_stop_thread() {
        assert_eq!(Syscall::decode(0x12, 0x400, 0), Syscall::decode(0x0E, 0x400, 0));
    }

    #[test]
    fn test_decode_rejects_bad_registers() {
        assert_eq!(Syscall::decode(0x42, 0, 0), Err(KernelError::UnknownSyscall(0x42)));
        assert_eq!(Syscall::decode(0x03, 0x100, 0), Err(KernelError::InvalidPrimitive));
        assert_eq!(Syscall::decode(0x11, 0x400, 0x1_0000), Err(KernelError::InvalidPriority));
    }

    #[test]
    fn test_error_reply() {
        let reply = Reply::error(KernelError::UnknownTask);
        assert_eq!(reply.action, Action::Resume);
        assert_eq!(reply.value as i32, -8);
    }
}
