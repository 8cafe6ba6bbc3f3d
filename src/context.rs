//! # Task Context
//!
//! Everything that reads or writes task memory goes through this module.
//! The kernel never dereferences a task address itself; it asks a
//! [`StackMemory`] for a byte window at a physical address.
//!
//! ## Saved Context Layout
//!
//! A suspended task's stack holds, from its saved stack pointer upward:
//!
//! ```text
//!  sp + 0x00   r4 … r11           (software frame, pushed by PendSV)
//!  sp + 0x20   EXC_RETURN
//!  sp + 0x24   r0 r1 r2 r3 r12    (hardware frame, pushed on exception)
//!  sp + 0x38   lr
//!  sp + 0x3C   pc
//!  sp + 0x40   xPSR
//!  sp + 0x44   ── previous stack contents ──
//! ```
//!
//! A task that has never run gets the same layout fabricated at the top of
//! its stack, so the switch trap cannot tell it from an interrupted one.
//! Tasks that used the FPU additionally have s16-s31 below r4; the
//! `EXC_RETURN` word records which kind of frame is present.

use crate::region::{ARENA_BASE, ARENA_SIZE, ARENA_TOP};

/// Words in the software part of the frame (r4-r11 and `EXC_RETURN`).
pub const SOFTWARE_FRAME_WORDS: usize = 9;

/// Words in the hardware exception frame.
pub const HARDWARE_FRAME_WORDS: usize = 8;

/// Bytes occupied by a fabricated initial frame.
pub const INITIAL_FRAME_BYTES: u32 = ((SOFTWARE_FRAME_WORDS + HARDWARE_FRAME_WORDS) * 4) as u32;

/// Return to thread mode on the process stack, no FPU state.
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// Initial `lr`: an address that faults if a task ever returns.
pub const INITIAL_LR: u32 = 0xFFFF_FFFF;

/// Initial `xPSR`: only the Thumb bit.
pub const INITIAL_XPSR: u32 = 0x0100_0000;

/// Byte used to paint fresh stacks so usage can be measured.
pub const STACK_PAINT: u8 = 0xA5;

// ---------------------------------------------------------------------------
// Memory access
// ---------------------------------------------------------------------------

/// Byte-level access to the task arena by physical address.
///
/// Both methods return `None` when the window is not entirely inside the
/// arena.
pub trait StackMemory {
    fn window(&self, base: u32, len: usize) -> Option<&[u8]>;
    fn window_mut(&mut self, base: u32, len: usize) -> Option<&mut [u8]>;

    fn read_word(&self, addr: u32) -> Option<u32> {
        let bytes = self.window(addr, 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn write_word(&mut self, addr: u32, value: u32) -> Option<()> {
        self.window_mut(addr, 4)?.copy_from_slice(&value.to_le_bytes());
        Some(())
    }
}

/// Offset of `[base, base + len)` inside the arena.
fn arena_offset(base: u32, len: usize) -> Option<usize> {
    let end = u64::from(base) + len as u64;
    if base < ARENA_BASE || end > u64::from(ARENA_TOP) {
        return None;
    }
    Some((base - ARENA_BASE) as usize)
}

/// The arena as a byte array. Used by host tests and the simulation.
pub struct SimulatedSram {
    bytes: [u8; ARENA_SIZE],
}

impl SimulatedSram {
    pub const fn new() -> Self {
        Self {
            bytes: [0; ARENA_SIZE],
        }
    }
}

impl Default for SimulatedSram {
    fn default() -> Self {
        Self::new()
    }
}

impl StackMemory for SimulatedSram {
    fn window(&self, base: u32, len: usize) -> Option<&[u8]> {
        let start = arena_offset(base, len)?;
        self.bytes.get(start..start + len)
    }

    fn window_mut(&mut self, base: u32, len: usize) -> Option<&mut [u8]> {
        let start = arena_offset(base, len)?;
        self.bytes.get_mut(start..start + len)
    }
}

/// The real arena.
#[cfg(target_os = "none")]
pub struct PhysicalSram {
    _private: (),
}

#[cfg(target_os = "none")]
impl PhysicalSram {
    /// # Safety
    /// The arena must not be part of the linked RAM image, and only one
    /// instance may exist. The kernel is then the only privileged user of
    /// those addresses.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_os = "none")]
impl StackMemory for PhysicalSram {
    fn window(&self, base: u32, len: usize) -> Option<&[u8]> {
        arena_offset(base, len)?;
        // SAFETY: the range is inside the arena, which is reserved for
        // kernel-managed task memory.
        Some(unsafe { core::slice::from_raw_parts(base as usize as *const u8, len) })
    }

    fn window_mut(&mut self, base: u32, len: usize) -> Option<&mut [u8]> {
        arena_offset(base, len)?;
        // SAFETY: as above; `&mut self` keeps the borrow exclusive.
        Some(unsafe { core::slice::from_raw_parts_mut(base as usize as *mut u8, len) })
    }
}

// ---------------------------------------------------------------------------
// Frame construction
// ---------------------------------------------------------------------------

/// Paints the stack window and fabricates an initial frame at its top.
/// Returns the saved stack pointer.
pub fn build_initial_frame<M: StackMemory + ?Sized>(
    memory: &mut M,
    stack_base: u32,
    stack_size: u32,
    entry: u32,
) -> Option<u32> {
    if stack_size < INITIAL_FRAME_BYTES {
        return None;
    }
    memory
        .window_mut(stack_base, stack_size as usize)?
        .fill(STACK_PAINT);

    let sp = stack_base + stack_size - INITIAL_FRAME_BYTES;
    let mut words = [0u32; SOFTWARE_FRAME_WORDS + HARDWARE_FRAME_WORDS];
    words[8] = EXC_RETURN_THREAD_PSP;
    // r0-r3 and r12 stay zero.
    words[14] = INITIAL_LR;
    words[15] = entry & !1;
    words[16] = INITIAL_XPSR;

    for (i, word) in words.iter().enumerate() {
        memory.write_word(sp + 4 * i as u32, *word)?;
    }
    Some(sp)
}

/// The hardware-stacked part of an exception frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ExceptionFrame {
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
}

impl ExceptionFrame {
    /// Reads a hardware frame starting at `addr`.
    pub fn read<M: StackMemory + ?Sized>(memory: &M, addr: u32) -> Option<Self> {
        let word = |i: u32| memory.read_word(addr + 4 * i);
        Some(Self {
            r0: word(0)?,
            r1: word(1)?,
            r2: word(2)?,
            r3: word(3)?,
            r12: word(4)?,
            lr: word(5)?,
            pc: word(6)?,
            xpsr: word(7)?,
        })
    }

    /// Reads the hardware frame of a task suspended at `sp`.
    pub fn of_saved_task<M: StackMemory + ?Sized>(memory: &M, sp: u32) -> Option<Self> {
        Self::read(memory, sp + 4 * SOFTWARE_FRAME_WORDS as u32)
    }
}

/// Peak stack use in permille, judged by how much paint is left at the
/// bottom of the window.
pub fn stack_usage_permille<M: StackMemory + ?Sized>(memory: &M, base: u32, size: u32) -> u32 {
    let Some(bytes) = memory.window(base, size as usize) else {
        return 0;
    };
    let untouched = bytes.iter().take_while(|&&b| b == STACK_PAINT).count() as u32;
    (size - untouched) * 1000 / size.max(1)
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
