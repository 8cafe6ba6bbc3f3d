//! # Architecture Abstraction Layer
//!
//! Everything that needs the real processor: exception entry, the MPU
//! registers, SysTick. The kernel proper is plain data and builds on any
//! host; this layer only exists on the device.

#[cfg(target_os = "none")]
pub mod cortex_m4;
