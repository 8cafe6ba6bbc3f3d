//! # MPU Driver
//!
//! Memory isolation for tasks. Two parts:
//!
//! - [`AccessMask`]: a 40-bit value, one bit per arena subregion, bit set =
//!   subregion inaccessible to unprivileged code. Each task carries one;
//!   granting a window clears its bits.
//! - [`Mpu`] (target only): programs the protection unit. Flash and the
//!   peripheral space are permanently open; the five arena regions are
//!   enabled with every subregion disabled, and [`Mpu::apply`] swaps in the
//!   subregion-disable bits of whichever task is about to run.
//!
//! Privileged code runs on the default memory map (`PRIVDEFENA`), so the
//! kernel can touch every byte regardless of the live mask.
//!
//! ```text
//!  region  base          size     attributes
//!  ──────  ───────────   ──────   ─────────────────────────────
//!   0..4   0x2000_1000   4/8 KiB  RW all, XN, SRD = task mask
//!   5      0x0000_0000   256 KiB  RW all, executable
//!   6      0x4000_0000   64 MiB   RW all, XN, device
//! ```

use core::ops::RangeInclusive;

use crate::region::{
    subregion_of, SramRegion, ARENA_BASE, ARENA_TOP, SRAM_REGIONS, SUBREGIONS_PER_REGION, SUBREGION_COUNT,
};
#[cfg(target_os = "none")]
use crate::region::REGION_COUNT;

// ---------------------------------------------------------------------------
// Access mask
// ---------------------------------------------------------------------------

const ALL_SUBREGIONS: u64 = (1 << SUBREGION_COUNT) - 1;

/// Per-task subregion-disable pattern. Bit `i` set = subregion `i` denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessMask(u64);

impl AccessMask {
    /// A mask granting nothing in the arena.
    pub const fn deny_all() -> Self {
        Self(ALL_SUBREGIONS)
    }

    /// Raw bits, subregion 0 in bit 0.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Opens every subregion that intersects `[base, base + size)`.
    pub fn grant_window(&mut self, base: u32, size: u32) {
        if let Some(range) = window_subregions(base, size) {
            for index in range {
                self.0 &= !(1 << index);
            }
        }
    }

    /// Closes every subregion that intersects `[base, base + size)`.
    pub fn revoke_window(&mut self, base: u32, size: u32) {
        if let Some(range) = window_subregions(base, size) {
            for index in range {
                self.0 |= 1 << index;
            }
        }
    }

    /// Whether subregion `index` is reachable.
    pub const fn is_granted(self, index: usize) -> bool {
        index < SUBREGION_COUNT && self.0 & (1 << index) == 0
    }

    /// Whether every byte of `[base, base + len)` lies in granted arena
    /// subregions.
    pub fn covers(self, base: u32, len: u32) -> bool {
        let Some(end) = base.checked_add(len) else {
            return false;
        };
        if len == 0 || base < ARENA_BASE || end > ARENA_TOP {
            return false;
        }
        match window_subregions(base, len) {
            Some(mut range) => range.all(|index| self.is_granted(index)),
            None => false,
        }
    }

    /// Subregion-disable byte for arena region `region`, in the layout of
    /// the `RASR.SRD` field.
    pub const fn region_srd(self, region: usize) -> u8 {
        (self.0 >> (region * SUBREGIONS_PER_REGION)) as u8
    }
}

/// Subregions touched by a window, clipped to the arena.
fn window_subregions(base: u32, size: u32) -> Option<RangeInclusive<usize>> {
    let start = base.max(ARENA_BASE);
    let end = base.saturating_add(size).min(ARENA_TOP);
    if start >= end {
        return None;
    }
    Some(subregion_of(start)?..=subregion_of(end - 1)?)
}

// ---------------------------------------------------------------------------
// Region attribute encoding (RASR)
// ---------------------------------------------------------------------------

/// Bits of the region attribute and size register.
pub mod rasr {
    /// Region enable.
    pub const ENABLE: u32 = 1 << 0;
    /// Subregion-disable field.
    pub const SRD_SHIFT: u32 = 8;
    pub const SRD_MASK: u32 = 0xFF << SRD_SHIFT;
    pub const BUFFERABLE: u32 = 1 << 16;
    pub const CACHEABLE: u32 = 1 << 17;
    pub const SHAREABLE: u32 = 1 << 18;
    /// Full access for privileged and unprivileged code.
    pub const AP_FULL: u32 = 0b011 << 24;
    /// Execute never.
    pub const XN: u32 = 1 << 28;

    /// `SIZE` field for a region of `2^log2` bytes.
    pub const fn size(log2: u8) -> u32 {
        ((log2 as u32 - 1) & 0x1F) << 1
    }
}

/// `MPU_CTRL` bits.
pub mod ctrl {
    pub const ENABLE: u32 = 1 << 0;
    /// Default memory map for privileged accesses.
    pub const PRIVDEFENA: u32 = 1 << 2;
}

/// One programmed MPU region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionConfig {
    pub number: u32,
    pub base: u32,
    pub attributes: u32,
}

/// Program flash, always open.
pub const FLASH_REGION: RegionConfig = RegionConfig {
    number: 5,
    base: 0x0000_0000,
    attributes: rasr::AP_FULL | rasr::CACHEABLE | rasr::size(18) | rasr::ENABLE,
};

/// Peripheral space, always open, never executable.
pub const PERIPHERAL_REGION: RegionConfig = RegionConfig {
    number: 6,
    base: 0x4000_0000,
    attributes: rasr::XN
        | rasr::AP_FULL
        | rasr::SHAREABLE
        | rasr::BUFFERABLE
        | rasr::size(26)
        | rasr::ENABLE,
};

/// Arena region `number`, with every subregion disabled.
pub const fn sram_region(number: usize) -> RegionConfig {
    let region: SramRegion = SRAM_REGIONS[number];
    RegionConfig {
        number: number as u32,
        base: region.base,
        attributes: rasr::XN
            | rasr::AP_FULL
            | rasr::SHAREABLE
            | rasr::CACHEABLE
            | rasr::SRD_MASK
            | rasr::size(region.size_log2)
            | rasr::ENABLE,
    }
}

/// `RASR` value for an arena region with `mask`'s subregion bits.
pub const fn with_srd(attributes: u32, mask: AccessMask, region: usize) -> u32 {
    (attributes & !rasr::SRD_MASK) | ((mask.region_srd(region) as u32) << rasr::SRD_SHIFT)
}

// ---------------------------------------------------------------------------
// Hardware driver
// ---------------------------------------------------------------------------

/// Owner of the MPU peripheral.
#[cfg(target_os = "none")]
pub struct Mpu {
    regs: cortex_m::peripheral::MPU,
}

#[cfg(target_os = "none")]
impl Mpu {
    pub fn new(regs: cortex_m::peripheral::MPU) -> Self {
        Self { regs }
    }

    /// Programs the fixed region set and turns the unit on.
    pub fn configure(&mut self) {
        // SAFETY: runs once at boot, before any task exists. Every value
        // written is a well-formed region descriptor.
        unsafe {
            self.regs.ctrl.write(0);
            for number in 0..REGION_COUNT {
                self.program(&sram_region(number));
            }
            self.program(&FLASH_REGION);
            self.program(&PERIPHERAL_REGION);
            self.regs.ctrl.write(ctrl::PRIVDEFENA | ctrl::ENABLE);
        }
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }

    /// Makes `mask` the live mask.
    pub fn apply(&mut self, mask: AccessMask) {
        for region in 0..REGION_COUNT {
            // SAFETY: only the SRD field of an already-programmed arena
            // region changes.
            unsafe {
                self.regs.rnr.write(region as u32);
                let attributes = self.regs.rasr.read();
                self.regs.rasr.write(with_srd(attributes, mask, region));
            }
        }
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }

    unsafe fn program(&mut self, region: &RegionConfig) {
        self.regs.rnr.write(region.number);
        self.regs.rbar.write(region.base & !0x1F);
        self.regs.rasr.write(region.attributes);
    }
}
