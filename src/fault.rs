//! # Fault Reports
//!
//! When a task faults, the arch layer captures the processor state into a
//! [`FaultReport`] and hands it to
//! [`Kernel::handle_fault`](crate::kernel::Kernel::handle_fault), which logs
//! it and kills the task.

use core::fmt;

use crate::context::ExceptionFrame;
use crate::task::Pid;

/// Which fault exception fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// MPU violation.
    MemManage,
    /// Bus error on a data or instruction access.
    Bus,
    /// Undefined instruction, bad state, divide by zero and friends.
    Usage,
    /// Escalated fault. Not recoverable.
    Hard,
}

/// `CFSR` bits that say a fault address register is valid.
pub mod cfsr {
    /// `MMFSR.MMARVALID`
    pub const MMAR_VALID: u32 = 1 << 7;
    /// `BFSR.BFARVALID`
    pub const BFAR_VALID: u32 = 1 << 15;
}

/// Processor state at the time of a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultReport {
    pub kind: FaultKind,
    /// Task that was running, if any.
    pub pid: Option<Pid>,
    pub psp: u32,
    pub msp: u32,
    /// Configurable fault status register.
    pub cfsr: u32,
    /// Faulting data address, when the hardware latched one.
    pub address: Option<u32>,
    /// Stacked registers of the faulting context.
    pub frame: ExceptionFrame,
}

impl FaultReport {
    /// Picks the latched address out of `MMFAR`/`BFAR` according to `cfsr`.
    pub fn latched_address(kind: FaultKind, cfsr: u32, mmfar: u32, bfar: u32) -> Option<u32> {
        match kind {
            FaultKind::MemManage if cfsr & cfsr::MMAR_VALID != 0 => Some(mmfar),
            FaultKind::Bus if cfsr & cfsr::BFAR_VALID != 0 => Some(bfar),
            _ => None,
        }
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} fault", self.kind)?;
        if let Some(pid) = self.pid {
            write!(f, " in task {:#010x}", pid.0)?;
        }
        if let Some(addr) = self.address {
            write!(f, " at {:#010x}", addr)?;
        }
        let r = &self.frame;
        write!(
            f,
            ": pc={:#010x} lr={:#010x} xpsr={:#010x} psp={:#010x} msp={:#010x} cfsr={:#010x} \
             r0={:#010x} r1={:#010x} r2={:#010x} r3={:#010x} r12={:#010x}",
            r.pc, r.lr, r.xpsr, self.psp, self.msp, self.cfsr, r.r0, r.r1, r.r2, r.r3, r.r12
        )
    }
}
