//! # Task-Side System Calls
//!
//! Thin wrappers that tasks call from unprivileged thread mode. Each one
//! issues a single `svc` with the call's opcode as the immediate and its
//! arguments in `r0`/`r1`, then turns the status word that comes back in
//! `r0` into a `Result`.
//!
//! Calls that block (`sleep`, `lock`, `wait`, and `yield_now` itself) only
//! return once the task has been scheduled again.

use core::arch::asm;

use crate::error::KernelError;
use crate::info::{IpcsInfo, MemReport, TaskReport};
use crate::scheduler::SchedulerPolicy;
use crate::syscall::Opcode;
use crate::task::{self, Pid};

macro_rules! svc {
    ($op:expr) => {
        svc!($op, 0, 0)
    };
    ($op:expr, $r0:expr) => {
        svc!($op, $r0, 0)
    };
    ($op:expr, $r0:expr, $r1:expr) => {{
        let mut r0: u32 = $r0;
        // SAFETY: the SVCall handler only reads r0/r1 and writes r0; every
        // other register is preserved across the exception.
        unsafe {
            asm!(
                "svc #{op}",
                op = const $op as u8,
                inout("r0") r0,
                in("r1") $r1,
            );
        }
        r0
    }};
}

fn check(word: u32) -> Result<(), KernelError> {
    KernelError::from_status(word).map(|_| ())
}

/// Gives up the rest of this turn.
pub fn yield_now() {
    svc!(Opcode::Yield);
}

/// Sleeps for `ticks` system ticks. Zero behaves like [`yield_now`].
pub fn sleep(ticks: u32) {
    svc!(Opcode::Sleep, ticks);
}

pub fn lock(mutex: u8) -> Result<(), KernelError> {
    check(svc!(Opcode::Lock, mutex as u32))
}

pub fn unlock(mutex: u8) -> Result<(), KernelError> {
    check(svc!(Opcode::Unlock, mutex as u32))
}

pub fn wait(semaphore: u8) -> Result<(), KernelError> {
    check(svc!(Opcode::Wait, semaphore as u32))
}

pub fn post(semaphore: u8) -> Result<(), KernelError> {
    check(svc!(Opcode::Post, semaphore as u32))
}

pub fn set_scheduler(policy: SchedulerPolicy) {
    svc!(Opcode::SetScheduler, (policy == SchedulerPolicy::Priority) as u32);
}

pub fn set_priority_inheritance(on: bool) {
    svc!(Opcode::PriorityInheritance, on as u32);
}

pub fn set_preemption(on: bool) {
    svc!(Opcode::Preemption, on as u32);
}

/// Fills `report` with one record per task slot. Returns the number of
/// occupied slots.
pub fn ps(report: &mut TaskReport) -> Result<usize, KernelError> {
    KernelError::from_status(svc!(Opcode::Ps, report.as_mut_ptr() as u32)).map(|n| n as usize)
}

pub fn ipcs(info: &mut IpcsInfo) -> Result<(), KernelError> {
    check(svc!(Opcode::Ipcs, info as *mut IpcsInfo as u32))
}

/// Looks a task up by name. `name` may be NUL-terminated.
///
/// The kernel only reads names from the caller's own windows, so the name
/// is copied onto this task's stack first. A literal in flash works.
pub fn pidof(name: &[u8]) -> Option<Pid> {
    let key = task::name_key(name);
    Pid::from_reply(svc!(Opcode::Pidof, key.as_ptr() as u32))
}

pub fn meminfo(report: &mut MemReport) -> Result<(), KernelError> {
    check(svc!(Opcode::MemInfo, report.as_mut_ptr() as u32))
}

pub fn stop_thread(pid: Pid) -> Result<(), KernelError> {
    check(svc!(Opcode::StopThread, pid.0))
}

pub fn kill(pid: Pid) -> Result<(), KernelError> {
    check(svc!(Opcode::Kill, pid.0))
}

pub fn restart_thread(pid: Pid) -> Result<(), KernelError> {
    check(svc!(Opcode::RestartThread, pid.0))
}

pub fn set_priority(pid: Pid, priority: u8) -> Result<(), KernelError> {
    check(svc!(Opcode::SetPriority, pid.0, priority as u32))
}

/// Allocates a private window of at least `bytes` and opens it to the
/// caller. `None` when the arena cannot hold it.
pub fn malloc(bytes: u32) -> Option<*mut u8> {
    match svc!(Opcode::Malloc, bytes) {
        0 => None,
        addr => Some(addr as *mut u8),
    }
}

/// Releases a window returned by [`malloc`]. The caller loses access to it.
pub fn free(ptr: *mut u8) -> Result<(), KernelError> {
    check(svc!(Opcode::Free, ptr as u32))
}

pub fn reboot() -> ! {
    svc!(Opcode::Reboot);
    loop {
        cortex_m::asm::wfi();
    }
}
