//! End-to-end kernel scenarios driven the way the trap handlers drive it:
//! `context_switch` for PendSV, `trap` for SVCall, `tick` for SysTick.

use kestrel::config::{KernelConfig, MAX_ALLOCS, MAX_SEMAPHORES, MAX_TASKS};
use kestrel::context::{
    ExceptionFrame, SimulatedSram, StackMemory, EXC_RETURN_THREAD_PSP, INITIAL_FRAME_BYTES,
    INITIAL_LR, INITIAL_XPSR,
};
use kestrel::error::KernelError;
use kestrel::fault::{FaultKind, FaultReport};
use kestrel::info::{field_str, TaskInfo};
use kestrel::kernel::Kernel;
use kestrel::mpu::AccessMask;
use kestrel::region::RegionAllocator;
use kestrel::syscall::{Action, Opcode, Reply};
use kestrel::task::{name_key, Pid, Primitive, TaskState};
use zerocopy::FromBytes;

const IDLE: Pid = Pid(0x0000_1001);

fn kernel() -> Kernel<SimulatedSram> {
    let mut k = Kernel::new(SimulatedSram::new(), KernelConfig::default());
    k.init_mutex(0).unwrap();
    for id in 0..MAX_SEMAPHORES {
        k.init_semaphore(id, 0).unwrap();
    }
    k
}

/// Runs the switch trap and returns the slot it dispatched.
fn switch(k: &mut Kernel<SimulatedSram>) -> usize {
    let psp = k.current().and_then(|c| k.task(c)).map_or(0, |t| t.sp);
    k.context_switch(psp).unwrap().task
}

fn call(k: &mut Kernel<SimulatedSram>, op: Opcode, r0: u32) -> Reply {
    k.trap(op as u8, r0, 0)
}

fn ticks(k: &mut Kernel<SimulatedSram>, n: u32) {
    for _ in 0..n {
        k.tick();
    }
}

fn state(k: &Kernel<SimulatedSram>, slot: usize) -> TaskState {
    k.task(slot).unwrap().state
}

/// A locked mutex has exactly one owner, the owner is not waiting on it,
/// and every waiter is blocked on it.
fn assert_mutex_consistent(k: &Kernel<SimulatedSram>) {
    let mutex = k.mutex(0).unwrap();
    assert_eq!(mutex.is_locked(), mutex.owner().is_some());
    if let Some(owner) = mutex.owner() {
        assert!(!mutex.queue().contains(owner));
        assert_ne!(state(k, owner), TaskState::BlockedOnMutex);
    }
    for &waiter in mutex.queue().as_slice() {
        let tcb = k.task(usize::from(waiter)).unwrap();
        assert_eq!(tcb.state, TaskState::BlockedOnMutex);
        assert_eq!(tcb.blocked_on, Some(Primitive::Mutex(0)));
    }
}

/// A semaphore never has both a positive count and waiters.
fn assert_semaphore_consistent(k: &Kernel<SimulatedSram>, id: usize) {
    let semaphore = k.semaphore(id).unwrap();
    assert!(semaphore.count() == 0 || semaphore.queue().is_empty());
    for &waiter in semaphore.queue().as_slice() {
        assert_eq!(state(k, usize::from(waiter)), TaskState::BlockedOnSemaphore);
    }
}

#[test]
fn test_mutex_hands_off_in_fifo_order() {
    let mut k = kernel();
    let idle = k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    let a = k.create_thread(Pid(0x0000_2001), "a", 1, 512).unwrap();
    let b = k.create_thread(Pid(0x0000_2101), "b", 2, 512).unwrap();
    let c = k.create_thread(Pid(0x0000_2201), "c", 3, 512).unwrap();

    assert_eq!(switch(&mut k), a);
    assert_eq!(call(&mut k, Opcode::Lock, 0), Reply::resume(0));
    assert_eq!(call(&mut k, Opcode::Sleep, 100), Reply::switch(0));

    assert_eq!(switch(&mut k), b);
    assert_eq!(call(&mut k, Opcode::Lock, 0), Reply::switch(0));
    assert_eq!(switch(&mut k), c);
    assert_eq!(call(&mut k, Opcode::Lock, 0), Reply::switch(0));
    assert_eq!(k.mutex(0).unwrap().queue().as_slice(), &[b as u8, c as u8]);
    assert_mutex_consistent(&k);

    assert_eq!(switch(&mut k), idle);
    ticks(&mut k, 100);
    assert_eq!(switch(&mut k), a);
    assert_eq!(call(&mut k, Opcode::Unlock, 0), Reply::resume(0));
    assert_eq!(k.mutex(0).unwrap().owner(), Some(b));
    assert_eq!(state(&k, b), TaskState::Ready);
    assert_eq!(state(&k, c), TaskState::BlockedOnMutex);
    assert_mutex_consistent(&k);

    call(&mut k, Opcode::Sleep, 1000);
    assert_eq!(switch(&mut k), b);
    assert_eq!(call(&mut k, Opcode::Unlock, 0), Reply::resume(0));
    assert_eq!(k.mutex(0).unwrap().owner(), Some(c));
    assert_mutex_consistent(&k);

    call(&mut k, Opcode::Sleep, 1000);
    assert_eq!(switch(&mut k), c);
    assert_eq!(call(&mut k, Opcode::Unlock, 0), Reply::resume(0));
    let mutex = k.mutex(0).unwrap();
    assert!(!mutex.is_locked());
    assert!(mutex.queue().is_empty());
}

#[test]
fn test_unlock_by_non_owner_changes_nothing() {
    let mut k = kernel();
    k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    let a = k.create_thread(Pid(0x0000_2001), "a", 1, 512).unwrap();
    let b = k.create_thread(Pid(0x0000_2101), "b", 2, 512).unwrap();

    assert_eq!(switch(&mut k), a);
    call(&mut k, Opcode::Lock, 0);
    call(&mut k, Opcode::Sleep, 10);
    assert_eq!(switch(&mut k), b);
    assert_eq!(call(&mut k, Opcode::Unlock, 0), Reply::error(KernelError::NotOwner));
    assert_eq!(k.mutex(0).unwrap().owner(), Some(a));
    assert_mutex_consistent(&k);
}

#[test]
fn test_semaphore_count_and_queue() {
    let mut k = kernel();
    let idle = k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    let p = k.create_thread(Pid(0x0000_3001), "poster", 1, 512).unwrap();
    let w1 = k.create_thread(Pid(0x0000_3101), "w1", 2, 512).unwrap();
    let w2 = k.create_thread(Pid(0x0000_3201), "w2", 3, 512).unwrap();

    assert_eq!(switch(&mut k), p);
    call(&mut k, Opcode::Sleep, 10);
    assert_eq!(switch(&mut k), w1);
    assert_eq!(call(&mut k, Opcode::Wait, 1), Reply::switch(0));
    assert_eq!(switch(&mut k), w2);
    assert_eq!(call(&mut k, Opcode::Wait, 1), Reply::switch(0));
    assert_eq!(k.task(w2).unwrap().blocked_on, Some(Primitive::Semaphore(1)));
    assert_semaphore_consistent(&k, 1);

    assert_eq!(switch(&mut k), idle);
    ticks(&mut k, 10);
    assert_eq!(switch(&mut k), p);

    // A post with waiters hands the unit straight to the head.
    assert_eq!(call(&mut k, Opcode::Post, 1), Reply::resume(0));
    assert_eq!(state(&k, w1), TaskState::Ready);
    assert_eq!(k.semaphore(1).unwrap().count(), 0);
    assert_eq!(k.semaphore(1).unwrap().queue().as_slice(), &[w2 as u8]);
    assert_semaphore_consistent(&k, 1);

    call(&mut k, Opcode::Post, 1);
    assert_eq!(state(&k, w2), TaskState::Ready);
    assert_eq!(k.semaphore(1).unwrap().count(), 0);

    call(&mut k, Opcode::Post, 1);
    assert_eq!(k.semaphore(1).unwrap().count(), 1);
    assert_semaphore_consistent(&k, 1);

    call(&mut k, Opcode::Sleep, 10);
    assert_eq!(switch(&mut k), w1);
    assert_eq!(call(&mut k, Opcode::Wait, 1), Reply::resume(0));
    assert_eq!(k.semaphore(1).unwrap().count(), 0);
}

#[test]
fn test_kill_releases_everything_the_task_held() {
    let mut k = kernel();
    let idle = k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    let a = k.create_thread(Pid(0x0000_4001), "a", 1, 512).unwrap();
    let b = k.create_thread(Pid(0x0000_4101), "b", 2, 512).unwrap();
    let c = k.create_thread(Pid(0x0000_4201), "c", 3, 512).unwrap();

    assert_eq!(switch(&mut k), a);
    call(&mut k, Opcode::Lock, 0);
    let reply = call(&mut k, Opcode::Malloc, 2048);
    assert_eq!(reply.value, 0x2000_4000);
    match reply.action {
        Action::Remap(mask) => assert!(mask.covers(0x2000_4000, 2048)),
        other => panic!("expected a remap, got {:?}", other),
    }
    call(&mut k, Opcode::Sleep, 1000);

    assert_eq!(switch(&mut k), b);
    call(&mut k, Opcode::Wait, 0);
    assert_eq!(switch(&mut k), c);
    call(&mut k, Opcode::Lock, 0);
    assert_eq!(switch(&mut k), idle);

    assert_eq!(call(&mut k, Opcode::StopThread, 0x0000_4001), Reply::resume(0));
    assert_eq!(state(&k, a), TaskState::Stopped);
    assert_eq!(k.task(a).unwrap().mask, AccessMask::deny_all());
    assert!(k.allocator().allocations().iter().all(|w| w.owner != a));
    assert!(k.allocator().is_free(24) && k.allocator().is_free(25));
    assert_eq!(k.mutex(0).unwrap().owner(), Some(c));
    assert_eq!(state(&k, c), TaskState::Ready);
    assert_mutex_consistent(&k);

    assert_eq!(call(&mut k, Opcode::Kill, 0x0000_4101), Reply::resume(0));
    assert!(k.semaphore(0).unwrap().queue().is_empty());
    assert_eq!(k.semaphore(0).unwrap().count(), 0);
    assert_eq!(k.task(b).unwrap().blocked_on, None);

    assert_eq!(
        call(&mut k, Opcode::StopThread, 0x0000_4001),
        Reply::error(KernelError::AlreadyStopped)
    );
    assert_eq!(
        call(&mut k, Opcode::StopThread, 0x0000_9999),
        Reply::error(KernelError::UnknownTask)
    );

    // The freed window is available again.
    assert_eq!(call(&mut k, Opcode::Malloc, 2048).value, 0x2000_4000);
}

#[test]
fn test_restart_runs_from_a_fresh_frame() {
    let mut k = kernel();
    let idle = k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    let t = k.create_thread(Pid(0x0000_0501), "worker", 2, 1024).unwrap();

    assert_eq!(switch(&mut k), t);
    // The task scribbles over its stack and blocks with a deep PSP.
    let base = k.task(t).unwrap().stack_base;
    for offset in (0..1024).step_by(4) {
        k.memory_mut().write_word(base + offset, 0xDEAD_BEEF).unwrap();
    }
    call(&mut k, Opcode::Wait, 2);
    assert_eq!(k.context_switch(base + 0x100).unwrap().task, idle);
    assert_eq!(k.task(t).unwrap().sp, base + 0x100);

    assert_eq!(
        call(&mut k, Opcode::RestartThread, 0x0000_0501),
        Reply::error(KernelError::NotStopped)
    );
    call(&mut k, Opcode::StopThread, 0x0000_0501);
    assert_eq!(call(&mut k, Opcode::RestartThread, 0x0000_0501), Reply::resume(0));

    let tcb = k.task(t).unwrap();
    assert_eq!(tcb.state, TaskState::Ready);
    assert_eq!(tcb.blocked_on, None);
    assert_eq!(tcb.stack_size, 1024);
    assert_eq!(tcb.sp, tcb.stack_top() - INITIAL_FRAME_BYTES);
    assert!(tcb.mask.covers(tcb.stack_base, 1024));
    assert!(k.semaphore(2).unwrap().queue().is_empty());

    let frame = ExceptionFrame::of_saved_task(k.memory(), tcb.sp).unwrap();
    assert_eq!(frame.pc, 0x0000_0500);
    assert_eq!(frame.lr, INITIAL_LR);
    assert_eq!(frame.xpsr, INITIAL_XPSR);
    assert_eq!((frame.r0, frame.r1, frame.r2, frame.r3, frame.r12), (0, 0, 0, 0, 0));
    assert_eq!(k.memory().read_word(tcb.sp + 32), Some(EXC_RETURN_THREAD_PSP));

    let owned: Vec<_> = k.allocator().allocations().iter().filter(|w| w.owner == t).collect();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].base, tcb.stack_base);
}

#[test]
fn test_priority_levels_and_rotation() {
    let mut k = kernel();
    let low = k.create_thread(Pid(0x0000_5001), "low", 5, 512).unwrap();
    let mid1 = k.create_thread(Pid(0x0000_5101), "mid1", 3, 512).unwrap();
    let top = k.create_thread(Pid(0x0000_5201), "top", 0, 512).unwrap();
    let mid2 = k.create_thread(Pid(0x0000_5301), "mid2", 3, 512).unwrap();

    assert_eq!(switch(&mut k), top);
    call(&mut k, Opcode::Sleep, 1000);

    let mut picks = Vec::new();
    for _ in 0..4 {
        picks.push(switch(&mut k));
        call(&mut k, Opcode::Yield, 0);
    }
    assert_eq!(picks, vec![mid1, mid2, mid1, mid2]);
    assert!(!picks.contains(&low));

    // Lowering one mid task lets the other run alone.
    let reply = k.trap(Opcode::SetPriority as u8, 0x0000_5301, 9);
    assert_eq!(reply, Reply::resume(0));
    assert_eq!(switch(&mut k), mid1);
    assert_eq!(switch(&mut k), mid1);
    assert_eq!(
        k.trap(Opcode::SetPriority as u8, 0x0000_5301, 16),
        Reply::error(KernelError::InvalidPriority)
    );
}

#[test]
fn test_round_robin_ignores_priority() {
    let mut k = kernel();
    let slots = [
        k.create_thread(Pid(0x0000_6001), "x", 5, 512).unwrap(),
        k.create_thread(Pid(0x0000_6101), "y", 0, 512).unwrap(),
        k.create_thread(Pid(0x0000_6201), "z", 9, 512).unwrap(),
    ];
    assert_eq!(switch(&mut k), slots[1]);
    assert_eq!(call(&mut k, Opcode::SetScheduler, 0), Reply::resume(0));

    let picks: Vec<usize> = (0..6).map(|_| switch(&mut k)).collect();
    for slot in slots {
        assert_eq!(picks.iter().filter(|&&p| p == slot).count(), 2);
    }
    assert!(picks.windows(2).all(|w| w[0] != w[1]));

    call(&mut k, Opcode::SetScheduler, 1);
    assert_eq!(switch(&mut k), slots[1]);
}

#[test]
fn test_allocator_rounds_and_returns_to_empty() {
    let mut allocator = RegionAllocator::new();
    let windows: Vec<_> = [1, 512, 513, 1024, 2048]
        .iter()
        .map(|&bytes| allocator.allocate(bytes, 0).unwrap())
        .collect();
    let sizes: Vec<u32> = windows.iter().map(|w| w.size).collect();
    assert_eq!(sizes, vec![512, 512, 1024, 1024, 2048]);
    for (i, a) in windows.iter().enumerate() {
        for b in &windows[i + 1..] {
            assert!(a.end() <= b.base || b.end() <= a.base, "{:?} overlaps {:?}", a, b);
        }
    }

    for w in &windows {
        allocator.free(w.base).unwrap();
    }
    assert!(allocator.allocations().is_empty());
    assert!((0..40).all(|i| allocator.is_free(i)));

    let mut fresh = RegionAllocator::new();
    for bytes in [1, 512, 513, 1024, 2048] {
        assert_eq!(allocator.allocate(bytes, 0), fresh.allocate(bytes, 0));
    }
}

#[test]
fn test_malloc_rounding_and_exhaustion() {
    let mut k = kernel();
    k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    switch(&mut k);

    assert_eq!(call(&mut k, Opcode::Malloc, 1).value, 0x2000_1200);
    assert_eq!(call(&mut k, Opcode::Malloc, 513).value, 0x2000_4000);
    assert_eq!(call(&mut k, Opcode::Malloc, 8192).value, 0x2000_6000);
    assert_eq!(call(&mut k, Opcode::Malloc, 8193).value, 0);
    assert_eq!(call(&mut k, Opcode::Malloc, 0).value, 0);

    let sizes: Vec<u32> = k.allocator().allocations().iter().map(|w| w.size).collect();
    assert_eq!(sizes, vec![512, 512, 1024, 8192]);

    // Fill the allocation table with small windows.
    while k.allocator().allocations().len() < MAX_ALLOCS {
        assert_ne!(call(&mut k, Opcode::Malloc, 100).value, 0);
    }
    assert_eq!(call(&mut k, Opcode::Malloc, 100).value, 0);

    // Freeing everything but the stack returns the arena to its boot shape.
    let windows: Vec<u32> = k.allocator().allocations()[1..].iter().map(|w| w.base).collect();
    for base in windows {
        assert_eq!(call(&mut k, Opcode::Free, base).value, 0);
    }
    assert_eq!(k.allocator().allocations().len(), 1);
    let mask = k.task(0).unwrap().mask;
    assert!(mask.is_granted(0));
    assert!((1..40).all(|i| !mask.is_granted(i)));
    assert_eq!(call(&mut k, Opcode::Malloc, 8192).value, 0x2000_4000);
}

#[test]
fn test_free_is_limited_to_own_windows() {
    let mut k = kernel();
    let idle = k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    let a = k.create_thread(Pid(0x0000_7001), "a", 1, 512).unwrap();

    assert_eq!(switch(&mut k), a);
    let window = call(&mut k, Opcode::Malloc, 512).value;
    call(&mut k, Opcode::Sleep, 1000);
    assert_eq!(switch(&mut k), idle);

    assert_eq!(call(&mut k, Opcode::Free, window), Reply::error(KernelError::NotOwner));
    let stack = k.task(idle).unwrap().stack_base;
    assert_eq!(call(&mut k, Opcode::Free, stack), Reply::error(KernelError::NotOwner));
    assert_eq!(call(&mut k, Opcode::Free, 0x2000_7000), Reply::error(KernelError::NotOwner));
    assert!(k.allocator().find(window).is_some());
}

#[test]
fn test_reports_land_only_in_caller_memory() {
    let mut k = kernel();
    let idle = k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    let w = k.create_thread(Pid(0x0000_8001), "worker", 4, 1024).unwrap();
    assert_eq!(switch(&mut k), w);
    call(&mut k, Opcode::Sleep, 1000);
    assert_eq!(switch(&mut k), idle);

    let buffer = k.task(idle).unwrap().stack_base;
    assert_eq!(call(&mut k, Opcode::Ps, buffer), Reply::resume(2));
    let bytes = k.memory().window(buffer, 64).unwrap();
    let row = TaskInfo::read_from_bytes(&bytes[32..64]).unwrap();
    assert_eq!(row.pid, 0x0000_8001);
    assert_eq!(field_str(&row.name), "worker");
    assert_eq!(row.state, TaskState::Delayed as u8);

    let foreign = k.task(w).unwrap().stack_base;
    assert_eq!(call(&mut k, Opcode::Ps, foreign), Reply::error(KernelError::BadUserBuffer));
    assert_eq!(call(&mut k, Opcode::Ipcs, 0x2000_0000), Reply::error(KernelError::BadUserBuffer));
    assert_eq!(call(&mut k, Opcode::MemInfo, buffer + 256), Reply::error(KernelError::BadUserBuffer));

    k.memory_mut().window_mut(buffer, 7).unwrap().copy_from_slice(b"worker\0");
    assert_eq!(call(&mut k, Opcode::Pidof, buffer), Reply::resume(0x0000_8001));
    k.memory_mut().window_mut(buffer, 6).unwrap().copy_from_slice(b"nobod\0");
    assert_eq!(call(&mut k, Opcode::Pidof, buffer), Reply::resume(0));
}

#[test]
fn test_switch_after_a_kill_never_touches_the_dead_stack() {
    let mut k = kernel();
    let idle = k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    let errant = k.create_thread(Pid(0x0000_A001), "errant", 2, 512).unwrap();
    let quitter = k.create_thread(Pid(0x0000_A101), "quitter", 3, 512).unwrap();
    assert!(!k.has_outgoing());

    assert_eq!(switch(&mut k), errant);
    assert!(k.has_outgoing());
    let stack = k.task(errant).unwrap().stack_base;
    let before = k.memory().window(stack, 512).unwrap().to_vec();

    // A stacking overflow leaves the PSP below the window.
    let report = FaultReport {
        kind: FaultKind::MemManage,
        pid: Some(Pid(0x0000_A001)),
        psp: stack - 0x20,
        msp: 0x2000_0F00,
        cfsr: 0x10,
        address: None,
        frame: ExceptionFrame::default(),
    };
    assert_eq!(k.handle_fault(&report), Action::Switch);
    assert!(!k.has_outgoing());

    let next = k.context_switch(0x2000_0FE0).unwrap();
    assert_eq!(next.task, quitter);
    assert_eq!(state(&k, errant), TaskState::Stopped);
    assert_eq!(k.task(errant).unwrap().sp, 0);
    assert_eq!(k.memory().window(stack, 512).unwrap(), &before[..]);

    // Same again for a task that stops itself.
    let stack = k.task(quitter).unwrap().stack_base;
    let before = k.memory().window(stack, 512).unwrap().to_vec();
    assert_eq!(call(&mut k, Opcode::Kill, 0x0000_A101), Reply::switch(0));
    assert!(!k.has_outgoing());

    let next = k.context_switch(stack - 4).unwrap();
    assert_eq!(next.task, idle);
    assert_eq!(k.task(quitter).unwrap().sp, 0);
    assert_eq!(k.memory().window(stack, 512).unwrap(), &before[..]);
    assert!(k.has_outgoing());
}

#[test]
fn test_pidof_from_a_stack_copy() {
    let mut k = kernel();
    let idle = k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    assert_eq!(switch(&mut k), idle);

    // A name passed straight from flash is refused, and the refusal is
    // not mistaken for a task.
    let reply = call(&mut k, Opcode::Pidof, 0x0000_4000);
    assert_eq!(reply, Reply::error(KernelError::BadUserBuffer));
    assert_eq!(Pid::from_reply(reply.value), None);

    // The same name copied onto the caller's stack resolves.
    let key = name_key(b"Idle");
    let at = k.task(idle).unwrap().stack_top() - key.len() as u32;
    k.memory_mut().window_mut(at, key.len()).unwrap().copy_from_slice(&key);
    let reply = call(&mut k, Opcode::Pidof, at);
    assert_eq!(Pid::from_reply(reply.value), Some(IDLE));

    let key = name_key(b"nobody\0");
    k.memory_mut().window_mut(at, key.len()).unwrap().copy_from_slice(&key);
    assert_eq!(Pid::from_reply(call(&mut k, Opcode::Pidof, at).value), None);
}

#[test]
fn test_idle_keeps_the_scheduler_fed() {
    let mut k = kernel();
    let idle = k.create_thread(IDLE, "Idle", 15, 512).unwrap();
    let a = k.create_thread(Pid(0x0000_9001), "a", 1, 512).unwrap();

    assert_eq!(switch(&mut k), a);
    call(&mut k, Opcode::Wait, 0);
    for _ in 0..5 {
        assert_eq!(switch(&mut k), idle);
        assert_eq!(call(&mut k, Opcode::Yield, 0), Reply::switch(0));
    }

    // Stopping idle itself leaves nothing to run.
    assert_eq!(call(&mut k, Opcode::StopThread, IDLE.0), Reply::switch(0));
    assert_eq!(k.current(), None);
    assert_eq!(k.context_switch(0), Err(KernelError::NoReadyTask));
}

#[test]
fn test_task_table_and_reboot() {
    let mut k = kernel();
    for i in 0..MAX_TASKS as u32 {
        k.create_thread(Pid(0x0001_0001 + 0x100 * i), "t", 15, 512).unwrap();
    }
    assert_eq!(
        k.create_thread(Pid(0x0002_0001), "late", 15, 512),
        Err(KernelError::TaskTableFull)
    );
    assert_eq!(
        k.trap(Opcode::Reboot as u8, 0, 0),
        Reply { value: 0, action: Action::Reset }
    );
}
