//! # Region Allocator
//!
//! Hands out task stacks and dynamic windows from the task arena. The arena
//! is covered by five MPU regions, each split into eight subregions:
//!
//! ```text
//!  0x2000_1000 ┌──────────────┐ region 0   4 KiB  8 × 512 B   subregions  0..8
//!              ├──────────────┤ region 1   4 KiB  8 × 512 B   subregions  8..16
//!              ├──────────────┤ region 2   4 KiB  8 × 512 B   subregions 16..24
//!  0x2000_4000 ├──────────────┤ region 3   8 KiB  8 × 1 KiB   subregions 24..32
//!              ├──────────────┤ region 4   8 KiB  8 × 1 KiB   subregions 32..40
//!  0x2000_8000 └──────────────┘
//! ```
//!
//! Regions 0–2 form the fine zone, regions 3–4 the coarse zone. A request
//! of up to 512 bytes takes one fine subregion; anything larger is rounded
//! up to whole kilobytes and takes a run of contiguous coarse subregions
//! inside a single region. First fit, lowest region and subregion first.
//!
//! A subregion is the unit the MPU can switch on and off, so every
//! allocation maps exactly onto bits of a task's
//! [`AccessMask`](crate::mpu::AccessMask).

use core::ops::Range;

use heapless::Vec;

use crate::config::MAX_ALLOCS;
use crate::error::KernelError;

// ---------------------------------------------------------------------------
// Arena layout
// ---------------------------------------------------------------------------

/// First byte of the task arena.
pub const ARENA_BASE: u32 = 0x2000_1000;

/// One past the last byte of the task arena.
pub const ARENA_TOP: u32 = 0x2000_8000;

/// Arena length in bytes.
pub const ARENA_SIZE: usize = (ARENA_TOP - ARENA_BASE) as usize;

/// Number of MPU regions covering the arena.
pub const REGION_COUNT: usize = 5;

/// Subregions per MPU region (fixed by the hardware).
pub const SUBREGIONS_PER_REGION: usize = 8;

/// Total subregions in the arena; the width of an access mask.
pub const SUBREGION_COUNT: usize = REGION_COUNT * SUBREGIONS_PER_REGION;

/// Subregion size in the fine zone.
pub const FINE_SUBREGION_SIZE: u32 = 512;

/// Subregion size in the coarse zone.
pub const COARSE_SUBREGION_SIZE: u32 = 1024;

/// Number of fine subregions (regions 0–2).
pub const FINE_SUBREGION_COUNT: usize = 24;

/// First byte of the coarse zone.
pub const COARSE_BASE: u32 = ARENA_BASE + FINE_SUBREGION_COUNT as u32 * FINE_SUBREGION_SIZE;

/// Largest request that can be satisfied: one whole coarse region.
pub const MAX_REQUEST: u32 = SUBREGIONS_PER_REGION as u32 * COARSE_SUBREGION_SIZE;

/// One MPU region over the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SramRegion {
    /// Base address, aligned to the region size.
    pub base: u32,
    /// log2 of the region size in bytes.
    pub size_log2: u8,
}

impl SramRegion {
    /// Region size in bytes.
    pub const fn size(&self) -> u32 {
        1 << self.size_log2
    }

    /// Size of each of the region's eight subregions.
    pub const fn subregion_size(&self) -> u32 {
        self.size() / SUBREGIONS_PER_REGION as u32
    }
}

/// The arena regions in address order.
pub const SRAM_REGIONS: [SramRegion; REGION_COUNT] = [
    SramRegion { base: 0x2000_1000, size_log2: 12 },
    SramRegion { base: 0x2000_2000, size_log2: 12 },
    SramRegion { base: 0x2000_3000, size_log2: 12 },
    SramRegion { base: 0x2000_4000, size_log2: 13 },
    SramRegion { base: 0x2000_6000, size_log2: 13 },
];

/// Size of global subregion `index`.
#[inline]
pub const fn subregion_size(index: usize) -> u32 {
    if index < FINE_SUBREGION_COUNT {
        FINE_SUBREGION_SIZE
    } else {
        COARSE_SUBREGION_SIZE
    }
}

/// Base address of global subregion `index`.
#[inline]
pub const fn subregion_base(index: usize) -> u32 {
    if index < FINE_SUBREGION_COUNT {
        ARENA_BASE + index as u32 * FINE_SUBREGION_SIZE
    } else {
        COARSE_BASE + (index - FINE_SUBREGION_COUNT) as u32 * COARSE_SUBREGION_SIZE
    }
}

/// Global subregion holding `addr`, if the address is inside the arena.
pub fn subregion_of(addr: u32) -> Option<usize> {
    if !(ARENA_BASE..ARENA_TOP).contains(&addr) {
        return None;
    }
    let index = if addr < COARSE_BASE {
        ((addr - ARENA_BASE) / FINE_SUBREGION_SIZE) as usize
    } else {
        FINE_SUBREGION_COUNT + ((addr - COARSE_BASE) / COARSE_SUBREGION_SIZE) as usize
    };
    Some(index)
}

/// Rounds a request to the size actually granted.
///
/// Up to 512 bytes rounds to 512; anything larger rounds up to a multiple
/// of 1024.
pub fn round_request(bytes: u32) -> Result<u32, KernelError> {
    match bytes {
        0 => Err(KernelError::InvalidSize),
        1..=FINE_SUBREGION_SIZE => Ok(FINE_SUBREGION_SIZE),
        _ if bytes > MAX_REQUEST => Err(KernelError::OutOfMemory),
        _ => Ok(bytes.div_ceil(COARSE_SUBREGION_SIZE) * COARSE_SUBREGION_SIZE),
    }
}

// ---------------------------------------------------------------------------
// Allocation table
// ---------------------------------------------------------------------------

/// One granted window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// First byte of the window.
    pub base: u32,
    /// Window length after rounding.
    pub size: u32,
    /// Task slot that owns the window.
    pub owner: usize,
}

impl Allocation {
    /// One past the last byte.
    pub const fn end(&self) -> u32 {
        self.base + self.size
    }

    /// Global subregions the window occupies.
    pub fn subregions(&self) -> Range<usize> {
        match (subregion_of(self.base), subregion_of(self.end() - 1)) {
            (Some(first), Some(last)) => first..last + 1,
            _ => 0..0,
        }
    }
}

/// Subregion bitmap plus the table of live allocations.
///
/// The table is kept compact: freeing an entry shifts the later ones down.
pub struct RegionAllocator {
    /// One byte per region, bit `n` set = subregion `n` in use. Same layout
    /// as the MPU subregion-disable field.
    in_use: [u8; REGION_COUNT],
    table: Vec<Allocation, MAX_ALLOCS>,
}

impl RegionAllocator {
    /// An empty arena.
    pub const fn new() -> Self {
        Self {
            in_use: [0; REGION_COUNT],
            table: Vec::new(),
        }
    }

    /// Claims a window of at least `bytes` bytes for task slot `owner`.
    pub fn allocate(&mut self, bytes: u32, owner: usize) -> Result<Allocation, KernelError> {
        let size = round_request(bytes)?;
        if self.table.is_full() {
            return Err(KernelError::AllocationTableFull);
        }
        let (first, count) = self.find_run(size).ok_or(KernelError::OutOfMemory)?;

        let allocation = Allocation {
            base: subregion_base(first),
            size,
            owner,
        };
        self.table
            .push(allocation)
            .map_err(|_| KernelError::AllocationTableFull)?;
        for index in first..first + count {
            self.mark(index, true);
        }

        log::debug!(
            "alloc {:#010x}+{} ({} bytes requested) -> task {}",
            allocation.base,
            size,
            bytes,
            owner
        );
        Ok(allocation)
    }

    /// Releases the window starting at `base`.
    pub fn free(&mut self, base: u32) -> Result<Allocation, KernelError> {
        let position = self
            .table
            .iter()
            .position(|a| a.base == base)
            .ok_or(KernelError::NotOwner)?;
        let allocation = self.table.remove(position);
        for index in allocation.subregions() {
            self.mark(index, false);
        }
        log::debug!("free {:#010x}+{}", allocation.base, allocation.size);
        Ok(allocation)
    }

    /// Releases every window owned by `owner`. Returns how many were freed.
    pub fn free_owned_by(&mut self, owner: usize) -> usize {
        let mut freed = 0;
        while let Some(allocation) = self.table.iter().find(|a| a.owner == owner).copied() {
            // The entry was just found, so the free cannot miss.
            if self.free(allocation.base).is_ok() {
                freed += 1;
            }
        }
        freed
    }

    /// Live allocations, oldest first.
    pub fn allocations(&self) -> &[Allocation] {
        &self.table
    }

    /// The allocation starting at `base`, if any.
    pub fn find(&self, base: u32) -> Option<&Allocation> {
        self.table.iter().find(|a| a.base == base)
    }

    /// Whether global subregion `index` is unclaimed.
    pub fn is_free(&self, index: usize) -> bool {
        let (region, bit) = (index / SUBREGIONS_PER_REGION, index % SUBREGIONS_PER_REGION);
        self.in_use[region] & (1 << bit) == 0
    }

    fn mark(&mut self, index: usize, used: bool) {
        let (region, bit) = (index / SUBREGIONS_PER_REGION, index % SUBREGIONS_PER_REGION);
        if used {
            self.in_use[region] |= 1 << bit;
        } else {
            self.in_use[region] &= !(1 << bit);
        }
    }

    /// First-fit scan. Returns the first subregion and the run length.
    ///
    /// A request equal to a subregion's size claims that subregion. Larger
    /// requests only form runs of coarse subregions, and a run never
    /// crosses a region boundary.
    fn find_run(&self, size: u32) -> Option<(usize, usize)> {
        for region in 0..REGION_COUNT {
            let mut run = 0usize;
            for sub in 0..SUBREGIONS_PER_REGION {
                let index = region * SUBREGIONS_PER_REGION + sub;
                if !self.is_free(index) {
                    run = 0;
                    continue;
                }
                run += 1;

                let granule = subregion_size(index);
                if size == granule {
                    return Some((index, 1));
                }
                if size > granule
                    && granule == COARSE_SUBREGION_SIZE
                    && run == (size / COARSE_SUBREGION_SIZE) as usize
                {
                    return Some((index + 1 - run, run));
                }
            }
        }
        None
    }
}

impl Default for RegionAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
