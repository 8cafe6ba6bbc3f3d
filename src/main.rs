//! # Kestrel Example Firmware
//!
//! Brings up the kernel with a task set that exercises every service:
//!
//! | Task | Priority | Stack | Behavior |
//! |------|----------|-------|----------|
//! | `idle` | 15 | 512 | Always ready. Spins briefly and yields |
//! | `lengthy_fn` | 12 | 1024 | Holds the shared mutex through a long loop over a 5000-byte `malloc` window |
//! | `flash_4hz` | 8 | 512 | Sleeps 125 ticks at a time |
//! | `oneshot` | 4 | 1536 | Waits on `FLASH_REQ`, then sleeps a second |
//! | `read_keys` | 12 | 1024 | Posts `FLASH_REQ`, stops and restarts `flash_4hz` |
//! | `debounce` | 12 | 1024 | Hands `KEY_PRESSED` back as `KEY_RELEASED` after 100 ticks |
//! | `important` | 0 | 1024 | Takes the mutex, sleeps a second holding it |
//! | `uncooperative` | 12 | 1024 | Busy-loops; only preemption takes the CPU away |
//! | `errant` | 12 | 512 | Writes kernel RAM after a while and gets killed by its MemManage fault |
//! | `monitor` | 12 | 2048 | Pulls `ps`, `ipcs`, `meminfo` and `pidof` snapshots into its stack |
//!
//! Tasks only ever touch their own stack and the windows they allocate.
//! Firmware statics live in kernel RAM and are out of their reach.
//!
//! On a host build the binary instead runs the kernel against simulated
//! SRAM for a few hundred ticks and prints the dispatch trace.

#![cfg_attr(target_os = "none", no_std, no_main)]

/// Mutex shared by `lengthy_fn` and `important`.
const RESOURCE: u8 = 0;

/// Semaphores and their boot counts.
const KEY_PRESSED: u8 = 0;
const KEY_RELEASED: u8 = 1;
const FLASH_REQ: u8 = 2;

#[cfg(target_os = "none")]
mod firmware {
    use core::hint::black_box;

    use cortex_m_rt::entry;
    use log::error;
    use panic_halt as _;

    use kestrel::arch::cortex_m4;
    use kestrel::config::KernelConfig;
    use kestrel::context::PhysicalSram;
    use kestrel::error::KernelError;
    use kestrel::info::{IpcsInfo, MemInfo, MemReport, TaskInfo, TaskReport};
    use kestrel::kernel::Kernel;
    use kestrel::task::Pid;
    use kestrel::user;

    use super::{FLASH_REQ, KEY_PRESSED, KEY_RELEASED, RESOURCE};

    type Entry = extern "C" fn() -> !;

    fn pid(entry: Entry) -> Pid {
        Pid::from(entry)
    }

    fn spin(iterations: u32) {
        for i in 0..iterations {
            black_box(i);
        }
    }

    // -----------------------------------------------------------------------
    // Task entry points
    // -----------------------------------------------------------------------

    /// One task must be ready at all times or the scheduler has nothing
    /// to pick.
    extern "C" fn idle() -> ! {
        loop {
            spin(1000);
            user::yield_now();
        }
    }

    extern "C" fn lengthy_fn() -> ! {
        let Some(mem) = user::malloc(5000) else {
            loop {
                user::sleep(1000);
            }
        };
        loop {
            let _ = user::lock(RESOURCE);
            for i in 0..5000u32 {
                spin(990);
                user::yield_now();
                // SAFETY: `mem` is a private window of at least 5000 bytes.
                unsafe { mem.add(i as usize).write_volatile((i % 256) as u8) };
            }
            let _ = user::unlock(RESOURCE);
        }
    }

    extern "C" fn flash_4hz() -> ! {
        let mut toggles = 0u32;
        loop {
            toggles = black_box(toggles.wrapping_add(1));
            user::sleep(125);
        }
    }

    extern "C" fn oneshot() -> ! {
        loop {
            let _ = user::wait(FLASH_REQ);
            user::sleep(1000);
        }
    }

    /// Stands in for the push-button reader: every "press" posts a flash
    /// request and cycles `flash_4hz` through stop and restart.
    extern "C" fn read_keys() -> ! {
        let flasher = pid(flash_4hz);
        let mut presses = 0u32;
        loop {
            let _ = user::wait(KEY_RELEASED);
            user::sleep(2000);
            let _ = user::post(KEY_PRESSED);
            let _ = user::post(FLASH_REQ);
            match presses % 4 {
                1 => {
                    let _ = user::stop_thread(flasher);
                }
                3 => {
                    let _ = user::restart_thread(flasher);
                }
                _ => {}
            }
            presses = presses.wrapping_add(1);
        }
    }

    extern "C" fn debounce() -> ! {
        loop {
            let _ = user::wait(KEY_PRESSED);
            for _ in 0..10 {
                user::sleep(10);
            }
            let _ = user::post(KEY_RELEASED);
        }
    }

    extern "C" fn important() -> ! {
        loop {
            let _ = user::lock(RESOURCE);
            user::sleep(1000);
            let _ = user::unlock(RESOURCE);
        }
    }

    extern "C" fn uncooperative() -> ! {
        let mut n = 0u32;
        loop {
            while n < 400_000 {
                n = black_box(n + 1);
            }
            n = 0;
            user::yield_now();
        }
    }

    extern "C" fn errant() -> ! {
        let p = 0x2000_0000 as *mut u32;
        user::sleep(5000);
        loop {
            // SAFETY: not safe at all. Kernel RAM is closed to tasks; the
            // MPU stops this store and the kernel kills the task.
            unsafe { p.write_volatile(0) };
            user::yield_now();
        }
    }

    extern "C" fn monitor() -> ! {
        let mut tasks: TaskReport = [TaskInfo::default(); kestrel::config::MAX_TASKS];
        let mut ipcs = IpcsInfo::default();
        let mut mem: MemReport = [MemInfo::default(); kestrel::config::MAX_ALLOCS];
        loop {
            let running = user::ps(&mut tasks).unwrap_or(0);
            let _ = user::ipcs(&mut ipcs);
            let _ = user::meminfo(&mut mem);
            let idle_pid = user::pidof(b"Idle\0");
            black_box((running, &tasks, &ipcs, &mem, idle_pid));

            if let Some(window) = user::malloc(512) {
                // SAFETY: fresh private window of at least 512 bytes.
                unsafe { window.write_bytes(0, 512) };
                let _ = user::free(window);
            }
            user::sleep(1000);
        }
    }

    // -----------------------------------------------------------------------
    // Entry point
    // -----------------------------------------------------------------------

    fn build() -> Result<Kernel<PhysicalSram>, KernelError> {
        // SAFETY: the arena is outside the linked RAM image (memory.x) and
        // this is the only instance.
        let sram = unsafe { PhysicalSram::new() };
        let mut kernel = Kernel::new(sram, KernelConfig::default());

        kernel.init_mutex(usize::from(RESOURCE))?;
        kernel.init_semaphore(usize::from(KEY_PRESSED), 1)?;
        kernel.init_semaphore(usize::from(KEY_RELEASED), 0)?;
        kernel.init_semaphore(usize::from(FLASH_REQ), 5)?;

        let tasks: [(Entry, &str, u8, u32); 10] = [
            (idle, "Idle", 15, 512),
            (lengthy_fn, "LengthyFn", 12, 1024),
            (flash_4hz, "Flash4Hz", 8, 512),
            (oneshot, "OneShot", 4, 1536),
            (read_keys, "ReadKeys", 12, 1024),
            (debounce, "Debounce", 12, 1024),
            (important, "Important", 0, 1024),
            (uncooperative, "Uncoop", 12, 1024),
            (errant, "Errant", 12, 512),
            (monitor, "Monitor", 12, 2048),
        ];
        for (entry, name, priority, stack) in tasks {
            kernel.create_thread(pid(entry), name, priority, stack)?;
        }
        Ok(kernel)
    }

    #[entry]
    fn main() -> ! {
        #[cfg(feature = "log-semihosting")]
        let _ = kestrel::logger::init(log::LevelFilter::Info);

        let Some(cp) = cortex_m::Peripherals::take() else {
            halt();
        };
        match build() {
            Ok(kernel) => cortex_m4::start(cp, kernel),
            Err(e) => {
                error!("kernel setup failed: {}", e);
                halt()
            }
        }
    }

    fn halt() -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }
}

// ---------------------------------------------------------------------------
// Host simulation
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "none"))]
fn setup(
    kernel: &mut kestrel::kernel::Kernel<kestrel::context::SimulatedSram>,
) -> Result<(), kestrel::error::KernelError> {
    use kestrel::task::Pid;

    kernel.init_mutex(usize::from(RESOURCE))?;
    kernel.init_semaphore(usize::from(KEY_PRESSED), 1)?;
    kernel.init_semaphore(usize::from(KEY_RELEASED), 0)?;
    kernel.init_semaphore(usize::from(FLASH_REQ), 0)?;
    kernel.create_thread(Pid(0x0000_1001), "Idle", 15, 512)?;
    kernel.create_thread(Pid(0x0000_1101), "Flash4Hz", 8, 512)?;
    kernel.create_thread(Pid(0x0000_1201), "OneShot", 4, 1536)?;
    kernel.create_thread(Pid(0x0000_1301), "Important", 0, 1024)?;
    kernel.create_thread(Pid(0x0000_1401), "LengthyFn", 12, 1024)?;
    Ok(())
}

#[cfg(not(target_os = "none"))]
fn main() {
    use kestrel::config::KernelConfig;
    use kestrel::context::SimulatedSram;
    use kestrel::kernel::Kernel;
    use kestrel::syscall::Opcode;

    let mut kernel = Kernel::new(SimulatedSram::new(), KernelConfig::default());
    if let Err(e) = setup(&mut kernel) {
        eprintln!("setup failed: {}", e);
        std::process::exit(1);
    }

    // Every dispatched task makes one blocking call, chosen by its name.
    let mut psp = 0;
    let mut trace = Vec::new();
    for tick in 0..300u32 {
        let next = match kernel.context_switch(psp) {
            Ok(next) => next,
            Err(e) => {
                eprintln!("tick {}: {}", tick, e);
                std::process::exit(1);
            }
        };
        let name = kernel.task(next.task).map(|t| t.name.clone()).unwrap_or_default();
        trace.push(format!("{:>4} {}", kernel.ticks(), name));

        match name.as_str() {
            "Flash4Hz" => kernel.trap(Opcode::Sleep as u8, 125, 0),
            "OneShot" => kernel.trap(Opcode::Wait as u8, u32::from(FLASH_REQ), 0),
            "Important" => {
                kernel.trap(Opcode::Lock as u8, u32::from(RESOURCE), 0);
                kernel.trap(Opcode::Unlock as u8, u32::from(RESOURCE), 0);
                kernel.trap(Opcode::Sleep as u8, 100, 0)
            }
            "LengthyFn" if tick % 50 == 0 => {
                kernel.trap(Opcode::Post as u8, u32::from(FLASH_REQ), 0);
                kernel.trap(Opcode::Yield as u8, 0, 0)
            }
            _ => kernel.trap(Opcode::Yield as u8, 0, 0),
        };
        psp = next.sp;
        kernel.tick();
    }

    for line in trace.iter().filter(|l| !l.ends_with("Idle")) {
        println!("{}", line);
    }
    println!("{} ticks, {} dispatches", kernel.ticks(), trace.len());
}
