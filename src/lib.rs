//! # Kestrel
//!
//! A small preemptive RTOS kernel for the ARM Cortex-M4F (TM4C123) that
//! isolates every task in its own slice of SRAM using the MPU.
//!
//! ## Overview
//!
//! Tasks run unprivileged on their own process stacks and reach the kernel
//! only through `svc`. Every task carries an access mask: one bit per MPU
//! subregion of the task arena. On every switch the mask is loaded into
//! the subregion-disable fields of the SRAM regions, so a task can touch
//! its stack, the windows it allocated, and nothing else. A stray write
//! raises a MemManage fault and the kernel kills the task instead of the
//! system.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    Application Tasks                    │
//! │                 user.rs (svc trampolines)               │
//! ├────────────────────────────────────────────────────────┤
//! │           Trap dispatch (kernel.rs, syscall.rs)         │
//! │   trap() · context_switch() · tick() · handle_fault()  │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Scheduler   │  Region allocator  │  Sync Primitives  │
//! │  scheduler.rs│  region.rs, mpu.rs │  sync.rs          │
//! │  ─ priority  │  ─ allocate()      │  ─ Mutex          │
//! │  ─ round-    │  ─ free()          │  ─ Semaphore      │
//! │    robin     │  ─ AccessMask      │  ─ WaitQueue      │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │        Task Model (task.rs) · Reports (info.rs)         │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │    SVCall · PendSV · SysTick · Faults · MPU registers  │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4F Hardware (Thumb-2)               │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: the kernel state is one [`kernel::Kernel`] value; all of
//!   its tables are fixed-size arrays.
//! - **Arena**: 28 KiB of SRAM above the kernel's 4 KiB, cut into 40 MPU
//!   subregions (512 B in the low 12 KiB, 1 KiB above). Task stacks and
//!   `malloc` windows are whole runs of subregions.
//! - **Host builds**: everything except `arch`, `user` and `logger` is plain
//!   data and runs under `cargo test` against
//!   [`context::SimulatedSram`].

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod context;
pub mod error;
pub mod fault;
pub mod info;
pub mod kernel;
pub mod mpu;
pub mod region;
pub mod scheduler;
pub mod sync;
pub mod syscall;
pub mod task;
pub mod arch;

#[cfg(all(target_os = "none", feature = "log-semihosting"))]
pub mod logger;
#[cfg(target_os = "none")]
pub mod user;
