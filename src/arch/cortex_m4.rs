//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4F. Owns the one kernel
//! instance and wires it to the processor's exceptions:
//!
//! - **SVCall**: system call entry. Recovers the opcode from the `svc`
//!   instruction, runs [`Kernel::trap`] and writes the result into the
//!   caller's stacked `r0`.
//! - **PendSV**: the deferred context switch. Saves r4-r11 (and s16-s31
//!   when the task used the FPU) on the outgoing process stack, if there
//!   still is an outgoing task, asks
//!   [`Kernel::context_switch`] for the next task, loads its access mask
//!   into the MPU and returns into it unprivileged.
//! - **SysTick**: the 1 kHz tick.
//! - **MemManage / BusFault / UsageFault**: kill the faulting task.
//!
//! ## Interrupt Priorities
//!
//! ```text
//!  MemManage, BusFault, UsageFault   0x00   (may interrupt the kernel)
//!  SVCall, SysTick                   0x80   (never preempt each other)
//!  PendSV                            0xFF   (runs last, after both)
//! ```
//!
//! SVCall and SysTick share a level, so kernel entry points never nest.
//! The kernel state sits behind a `cortex_m::interrupt::Mutex` all the
//! same, so every access is through a critical section.

use core::arch::global_asm;
use core::cell::RefCell;

use cortex_m::interrupt::{self, Mutex};
use cortex_m::peripheral::scb::{Exception, SystemHandler};
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{FPU, SCB};
use cortex_m::register;
use cortex_m_rt::exception;
use log::error;

use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::context::{ExceptionFrame, PhysicalSram};
use crate::fault::{FaultKind, FaultReport};
use crate::kernel::Kernel;
use crate::mpu::Mpu;
use crate::syscall::Action;

/// Priority shared by SVCall and SysTick.
const KERNEL_PRIORITY: u8 = 0x80;

/// Priority of PendSV.
const SWITCH_PRIORITY: u8 = 0xFF;

// ---------------------------------------------------------------------------
// Kernel instance
// ---------------------------------------------------------------------------

struct Machine {
    kernel: Kernel<PhysicalSram>,
    mpu: Mpu,
}

static MACHINE: Mutex<RefCell<Option<Machine>>> = Mutex::new(RefCell::new(None));

/// Runs `f` on the kernel inside a critical section. `None` before
/// [`start`] has installed it.
fn with_machine<R>(f: impl FnOnce(&mut Machine) -> R) -> Option<R> {
    interrupt::free(|cs| MACHINE.borrow(cs).borrow_mut().as_mut().map(f))
}

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure the SysTick timer for the scheduler tick.
///
/// Sets up SysTick to fire at `TICK_HZ` frequency using the processor
/// clock.
pub fn configure_systick(syst: &mut cortex_m::peripheral::SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// PendSV trigger
// ---------------------------------------------------------------------------

/// Pend the context-switch trap.
///
/// It runs as soon as no other exception is active, so a switch requested
/// from SVCall or SysTick happens right after that handler returns.
#[inline]
pub fn trigger_pendsv() {
    SCB::set_pendsv();
}

// ---------------------------------------------------------------------------
// System handler setup
// ---------------------------------------------------------------------------

/// Puts SVCall and SysTick on one level and PendSV below both.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // SAFETY: changing handler priorities before the kernel starts cannot
    // break a priority-based critical section; none exist yet.
    unsafe {
        scb.set_priority(SystemHandler::SVCall, KERNEL_PRIORITY);
        scb.set_priority(SystemHandler::SysTick, KERNEL_PRIORITY);
        scb.set_priority(SystemHandler::PendSV, SWITCH_PRIORITY);
    }
}

/// Routes MPU, bus and usage faults to their own handlers instead of
/// escalating them to HardFault.
pub fn enable_fault_handlers(scb: &mut SCB) {
    scb.enable(Exception::MemoryManagement);
    scb.enable(Exception::BusFault);
    scb.enable(Exception::UsageFault);
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// Installs `kernel` and starts scheduling. **Does not return.**
///
/// The caller must have created at least one always-ready task.
pub fn start(mut core_peripherals: cortex_m::Peripherals, kernel: Kernel<PhysicalSram>) -> ! {
    let mut mpu = Mpu::new(core_peripherals.MPU);
    mpu.configure();

    interrupt::free(|cs| {
        MACHINE.borrow(cs).replace(Some(Machine { kernel, mpu }));
    });

    set_interrupt_priorities(&mut core_peripherals.SCB);
    enable_fault_handlers(&mut core_peripherals.SCB);
    configure_systick(&mut core_peripherals.SYST);

    // No task is current yet, so this first switch saves nothing.
    trigger_pendsv();

    loop {
        cortex_m::asm::wfi();
    }
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

// Saves the outgoing context below its PSP, switches, restores the
// incoming one and returns to thread mode unprivileged. The layout matches
// the fabricated initial frame in `context.rs`: r4-r11 then EXC_RETURN.
// With no outgoing task (boot, or the running task was just killed) the
// save is skipped and the PSP is never written through.
global_asm!(
    ".syntax unified",
    ".thumb",
    ".fpu fpv4-sp-d16",
    ".section .text.PendSV",
    ".global PendSV",
    ".type PendSV, %function",
    ".thumb_func",
    "PendSV:",
    "    push {{r4, lr}}",
    "    bl kernel_pendsv_has_outgoing",
    "    pop {{r4, lr}}",
    "    mov r1, r0",
    "    mrs r0, psp",
    "    cbz r1, 2f",
    "    tst lr, #0x10",
    "    it eq",
    "    vstmdbeq r0!, {{s16-s31}}",
    "    stmdb r0!, {{r4-r11, lr}}",
    "2:",
    "    bl kernel_pendsv_switch",
    "    ldmia r0!, {{r4-r11, lr}}",
    "    tst lr, #0x10",
    "    it eq",
    "    vldmiaeq r0!, {{s16-s31}}",
    "    msr psp, r0",
    "    mrs r1, control",
    "    orr r1, r1, #1",
    "    msr control, r1",
    "    isb",
    "    bx lr",
    ".size PendSV, . - PendSV",
);

/// `FPCCR.LSPACT`: a lazy FP save is still pending.
const FPCCR_LSPACT: u32 = 1 << 0;

/// Nonzero when PendSV has a live context to save.
#[no_mangle]
extern "C" fn kernel_pendsv_has_outgoing() -> u32 {
    let outgoing = with_machine(|m| m.kernel.has_outgoing()).unwrap_or(false);
    if !outgoing {
        // Any pending lazy FP save targets the dead task's frame.
        // SAFETY: clearing LSPACT only abandons that save.
        unsafe { (*FPU::PTR).fpccr.modify(|r| r & !FPCCR_LSPACT) };
    }
    u32::from(outgoing)
}

/// Records the outgoing stack pointer and returns the incoming one.
#[no_mangle]
extern "C" fn kernel_pendsv_switch(psp: u32) -> u32 {
    let next = with_machine(|m| match m.kernel.context_switch(psp) {
        Ok(next) => {
            m.mpu.apply(next.mask);
            Some(next.sp)
        }
        Err(e) => {
            error!("context switch failed: {}", e);
            None
        }
    });
    match next.flatten() {
        Some(sp) => sp,
        None => halt(),
    }
}

// ---------------------------------------------------------------------------
// SVCall handler (system calls)
// ---------------------------------------------------------------------------

global_asm!(
    ".syntax unified",
    ".thumb",
    ".section .text.SVCall",
    ".global SVCall",
    ".type SVCall, %function",
    ".thumb_func",
    "SVCall:",
    "    tst lr, #4",
    "    ite eq",
    "    mrseq r0, msp",
    "    mrsne r0, psp",
    "    push {{r4, lr}}",
    "    bl kernel_svcall",
    "    pop {{r4, pc}}",
    ".size SVCall, . - SVCall",
);

/// Decodes the `svc` at the stacked return address and runs the call.
///
/// # Safety
/// `frame` is the hardware exception frame of the trapping context, as
/// located by the assembly entry.
#[no_mangle]
unsafe extern "C" fn kernel_svcall(frame: *mut u32) {
    // The opcode is the immediate of the 16-bit `svc` just before the
    // return address.
    let pc = frame.add(6).read_volatile();
    let opcode = ((pc - 2) as usize as *const u8).read_volatile();
    let r0 = frame.read_volatile();
    let r1 = frame.add(1).read_volatile();

    let reply = with_machine(|m| {
        let reply = m.kernel.trap(opcode, r0, r1);
        if let Action::Remap(mask) = reply.action {
            m.mpu.apply(mask);
        }
        reply
    });
    let Some(reply) = reply else {
        return;
    };

    frame.write_volatile(reply.value);
    match reply.action {
        Action::Switch => trigger_pendsv(),
        Action::Reset => SCB::sys_reset(),
        Action::Resume | Action::Remap(_) => {}
    }
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

#[exception]
fn SysTick() {
    if with_machine(|m| m.kernel.tick()) == Some(true) {
        trigger_pendsv();
    }
}

// ---------------------------------------------------------------------------
// Fault handlers
// ---------------------------------------------------------------------------

#[exception]
fn MemoryManagement() {
    recover(FaultKind::MemManage);
}

#[exception]
fn BusFault() {
    recover(FaultKind::Bus);
}

#[exception]
fn UsageFault() {
    recover(FaultKind::Usage);
}

#[exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    error!(
        "hard fault: pc={:#010x} lr={:#010x} xpsr={:#010x}",
        ef.pc(),
        ef.lr(),
        ef.xpsr()
    );
    halt()
}

/// Captures the fault state, kills the running task and pends a switch.
fn recover(kind: FaultKind) {
    // SAFETY: read and write-one-to-clear of the fault status registers.
    let (cfsr, mmfar, bfar) = unsafe {
        let scb = &*SCB::PTR;
        let cfsr = scb.cfsr.read();
        let status = (cfsr, scb.mmfar.read(), scb.bfar.read());
        scb.cfsr.write(cfsr);
        status
    };
    let psp = register::psp::read();
    let msp = register::msp::read();

    let action = with_machine(|m| {
        let frame = ExceptionFrame::read(m.kernel.memory(), psp).unwrap_or_default();
        let pid = m.kernel.current().and_then(|slot| m.kernel.task(slot)).map(|t| t.pid);
        let report = FaultReport {
            kind,
            pid,
            psp,
            msp,
            cfsr,
            address: FaultReport::latched_address(kind, cfsr, mmfar, bfar),
            frame,
        };
        m.kernel.handle_fault(&report)
    });

    match action {
        Some(Action::Switch) => trigger_pendsv(),
        _ => SCB::sys_reset(),
    }
}
