//! # Kernel
//!
//! The kernel state and every privileged operation on it. [`Kernel`] owns
//! the task table, the primitives, the region allocator and the task
//! memory; the arch layer holds the one instance and calls into it from
//! the SVCall, PendSV, SysTick and fault handlers.
//!
//! Nothing here touches hardware. Each entry point returns what the arch
//! layer must do next (return a value, pend a switch, reload the MPU), so
//! the whole state machine runs unchanged in host tests.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset (cortex-m-rt)
//!   └─► main()
//!         ├─► Kernel::new()            ← empty tables, empty arena
//!         ├─► init_mutex / init_semaphore
//!         ├─► create_thread() (×N)     ← stack window + fabricated frame
//!         └─► arch::start()            ← no return
//!               ├─► SysTick, handler priorities, fault enables, MPU
//!               └─► pend PendSV ─► context_switch() with no current task
//! ```
//!
//! ## Entry Points
//!
//! | Caller          | Method              | Result                           |
//! |-----------------|---------------------|----------------------------------|
//! | SVCall          | [`Kernel::trap`]    | [`Reply`]: `r0` and an [`Action`] |
//! | PendSV          | [`Kernel::context_switch`] | next task's SP and mask    |
//! | SysTick         | [`Kernel::tick`]    | whether to pend a switch          |
//! | fault handlers  | [`Kernel::handle_fault`] | [`Action`]                   |

use log::{debug, error, info, trace, warn};
use zerocopy::IntoBytes;

use crate::config::{
    KernelConfig, MAX_ALLOCS, MAX_MUTEXES, MAX_SEMAPHORES, MAX_TASKS, NAME_FIELD_LEN, NUM_PRIORITIES,
};
use crate::context::{self, StackMemory};
use crate::error::{status, KernelError};
use crate::fault::FaultReport;
use crate::info::{
    self, IpcsInfo, MemInfo, MemReport, MutexInfo, SemaphoreInfo, TaskInfo, TaskReport, NO_OWNER,
};
use crate::mpu::AccessMask;
use crate::region::{Allocation, RegionAllocator};
use crate::scheduler::{Scheduler, SchedulerPolicy};
use crate::sync::{LockOutcome, Mutex, PostOutcome, Semaphore, UnlockOutcome, WaitOutcome};
use crate::syscall::{Action, Reply, Syscall, UserBuffer};
use crate::task::{task_name, Pid, Primitive, TaskControlBlock, TaskState};

/// The task the switch trap should resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    /// Task slot.
    pub task: usize,
    pub pid: Pid,
    /// Saved stack pointer to restore.
    pub sp: u32,
    /// Mask to load into the MPU.
    pub mask: AccessMask,
}

/// Kernel state.
pub struct Kernel<M: StackMemory> {
    memory: M,
    config: KernelConfig,
    scheduler: Scheduler,
    tasks: [TaskControlBlock; MAX_TASKS],
    mutexes: [Mutex; MAX_MUTEXES],
    semaphores: [Semaphore; MAX_SEMAPHORES],
    allocator: RegionAllocator,

    /// Slot of the running task. `None` before the first switch and after
    /// the running task was killed.
    current: Option<usize>,

    /// Monotonic tick counter.
    ticks: u32,

    /// Ticks elapsed in the current accounting window.
    window_ticks: u32,

    /// Index of the accounting bucket being filled.
    active_bucket: usize,
}

impl<M: StackMemory> Kernel<M> {
    /// Creates a kernel with no tasks over `memory`.
    pub fn new(memory: M, config: KernelConfig) -> Self {
        Self {
            memory,
            config,
            scheduler: Scheduler::new(config.policy),
            tasks: core::array::from_fn(|_| TaskControlBlock::empty()),
            mutexes: core::array::from_fn(|_| Mutex::new()),
            semaphores: core::array::from_fn(|_| Semaphore::new(0)),
            allocator: RegionAllocator::new(),
            current: None,
            ticks: 0,
            window_ticks: 0,
            active_bucket: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    /// Resets mutex `id` to unlocked with an empty queue.
    pub fn init_mutex(&mut self, id: usize) -> Result<(), KernelError> {
        *self.mutexes.get_mut(id).ok_or(KernelError::InvalidPrimitive)? = Mutex::new();
        Ok(())
    }

    /// Resets semaphore `id` to `count` with an empty queue.
    pub fn init_semaphore(&mut self, id: usize, count: u32) -> Result<(), KernelError> {
        *self.semaphores.get_mut(id).ok_or(KernelError::InvalidPrimitive)? = Semaphore::new(count);
        Ok(())
    }

    /// Creates a `Ready` task with a fresh stack of at least `stack_bytes`.
    ///
    /// # Returns
    /// - `Ok(slot)`: the task's slot in the table.
    /// - `Err(..)`: nothing was changed.
    pub fn create_thread(
        &mut self,
        pid: Pid,
        name: &str,
        priority: u8,
        stack_bytes: u32,
    ) -> Result<usize, KernelError> {
        if usize::from(priority) >= NUM_PRIORITIES {
            return Err(KernelError::InvalidPriority);
        }
        let name = task_name(name).ok_or(KernelError::InvalidName)?;
        if self.slot_of(pid).is_some() {
            return Err(KernelError::DuplicateTask);
        }
        let slot = self
            .tasks
            .iter()
            .position(|t| !t.is_occupied())
            .ok_or(KernelError::TaskTableFull)?;

        let stack = self.allocator.allocate(stack_bytes, slot)?;
        let tcb = &mut self.tasks[slot];
        tcb.pid = pid;
        tcb.name = name;
        tcb.priority = priority;
        tcb.stack_size = stack.size;
        if let Err(e) = self.launch(slot, stack) {
            self.tasks[slot] = TaskControlBlock::empty();
            return Err(e);
        }

        info!(
            "created task {} '{}' pid {:#010x} prio {} stack {:#010x}+{}",
            slot,
            self.tasks[slot].name.as_str(),
            pid.0,
            priority,
            stack.base,
            stack.size
        );
        Ok(slot)
    }

    /// Gives `slot` the stack window `stack`, a fresh frame and a mask
    /// covering only that window, and makes it `Ready`. Frees the window
    /// on failure.
    fn launch(&mut self, slot: usize, stack: Allocation) -> Result<(), KernelError> {
        let entry = self.tasks[slot].pid.0;
        let Some(sp) = context::build_initial_frame(&mut self.memory, stack.base, stack.size, entry)
        else {
            let _ = self.allocator.free(stack.base);
            return Err(KernelError::InvalidSize);
        };

        let mut mask = AccessMask::deny_all();
        mask.grant_window(stack.base, stack.size);

        let tcb = &mut self.tasks[slot];
        tcb.state = TaskState::Ready;
        tcb.stack_base = stack.base;
        tcb.stack_size = stack.size;
        tcb.sp = sp;
        tcb.mask = mask;
        tcb.sleep_ticks = 0;
        tcb.blocked_on = None;
        tcb.reset_accounting();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Trap dispatcher
    // -----------------------------------------------------------------------

    /// Handles one `svc` from the running task.
    pub fn trap(&mut self, opcode: u8, r0: u32, r1: u32) -> Reply {
        match Syscall::decode(opcode, r0, r1) {
            Ok(call) => self.dispatch(call),
            Err(e) => {
                warn!("rejected svc {:#04x}: {}", opcode, e);
                Reply::error(e)
            }
        }
    }

    /// Performs a decoded system call on behalf of the running task.
    pub fn dispatch(&mut self, call: Syscall) -> Reply {
        trace!("syscall {:?} from {:?}", call, self.current);
        match call {
            Syscall::Start => return Reply::switch(0),
            Syscall::Reboot => {
                info!("reboot requested");
                return Reply { value: 0, action: Action::Reset };
            }
            _ => {}
        }

        let Some(caller) = self.current else {
            return Reply::error(KernelError::NoCurrentTask);
        };

        match call {
            Syscall::Start | Syscall::Reboot => Reply::resume(0),
            Syscall::Yield => Reply::switch(0),
            Syscall::Sleep { ticks } => {
                if ticks == 0 {
                    return Reply::switch(0);
                }
                let tcb = &mut self.tasks[caller];
                tcb.sleep_ticks = ticks;
                tcb.state = TaskState::Delayed;
                Reply::switch(0)
            }
            Syscall::Lock { mutex } => match self.lock(caller, usize::from(mutex)) {
                Ok(LockOutcome::Acquired) => Reply::resume(0),
                Ok(LockOutcome::Blocked) => Reply::switch(0),
                Err(e) => Reply::error(e),
            },
            Syscall::Unlock { mutex } => Reply::resume(status(self.unlock(caller, usize::from(mutex)))),
            Syscall::Wait { semaphore } => match self.wait(caller, usize::from(semaphore)) {
                Ok(WaitOutcome::Acquired) => Reply::resume(0),
                Ok(WaitOutcome::Blocked) => Reply::switch(0),
                Err(e) => Reply::error(e),
            },
            Syscall::Post { semaphore } => Reply::resume(status(self.post(usize::from(semaphore)))),
            Syscall::SetScheduler(policy) => {
                self.set_policy(policy);
                Reply::resume(0)
            }
            Syscall::PriorityInheritance(on) => {
                self.config.priority_inheritance = on;
                debug!("priority inheritance flag {} (not applied to locking)", on);
                Reply::resume(0)
            }
            Syscall::Preemption(on) => {
                self.config.preemption = on;
                debug!("preemption {}", if on { "on" } else { "off" });
                Reply::resume(0)
            }
            Syscall::Ps(buffer) => match self.ps(caller, buffer) {
                Ok(count) => Reply::resume(count),
                Err(e) => Reply::error(e),
            },
            Syscall::Ipcs(buffer) => Reply::resume(status(self.ipcs(caller, buffer))),
            Syscall::Pidof(buffer) => match self.pidof(caller, buffer) {
                Ok(pid) => Reply::resume(pid.map_or(0, |p| p.0)),
                Err(e) => Reply::error(e),
            },
            Syscall::MemInfo(buffer) => Reply::resume(status(self.meminfo(caller, buffer))),
            Syscall::StopThread(pid) => match self.stop_thread(pid) {
                Ok(slot) if slot == caller => Reply::switch(0),
                Ok(_) => Reply::resume(0),
                Err(e) => Reply::error(e),
            },
            Syscall::Malloc { bytes } => match self.malloc(caller, bytes) {
                Ok(window) => Reply {
                    value: window.base,
                    action: Action::Remap(self.tasks[caller].mask),
                },
                Err(e) => {
                    debug!("malloc of {} bytes for task {} failed: {}", bytes, caller, e);
                    Reply::resume(0)
                }
            },
            Syscall::RestartThread(pid) => Reply::resume(status(self.restart_thread(pid))),
            Syscall::SetPriority { pid, priority } => {
                Reply::resume(status(self.set_priority(pid, priority)))
            }
            Syscall::Free { addr } => match self.free(caller, addr) {
                Ok(mask) => Reply { value: 0, action: Action::Remap(mask) },
                Err(e) => Reply::error(e),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Primitives
    // -----------------------------------------------------------------------

    fn lock(&mut self, caller: usize, id: usize) -> Result<LockOutcome, KernelError> {
        let mutex = self.mutexes.get_mut(id).ok_or(KernelError::InvalidPrimitive)?;
        let outcome = mutex.lock(caller)?;
        if outcome == LockOutcome::Blocked {
            self.block(caller, Primitive::Mutex(id as u8));
        }
        Ok(outcome)
    }

    fn unlock(&mut self, caller: usize, id: usize) -> Result<(), KernelError> {
        let mutex = self.mutexes.get_mut(id).ok_or(KernelError::InvalidPrimitive)?;
        match mutex.unlock(caller) {
            Ok(UnlockOutcome::HandedOff(next)) => {
                trace!("mutex {} handed from {} to {}", id, caller, next);
                self.wake(next);
                Ok(())
            }
            Ok(UnlockOutcome::Released) => Ok(()),
            Err(e) => {
                warn!("task {} unlocked mutex {} it does not own", caller, id);
                Err(e)
            }
        }
    }

    fn wait(&mut self, caller: usize, id: usize) -> Result<WaitOutcome, KernelError> {
        let semaphore = self.semaphores.get_mut(id).ok_or(KernelError::InvalidPrimitive)?;
        let outcome = semaphore.wait(caller)?;
        if outcome == WaitOutcome::Blocked {
            self.block(caller, Primitive::Semaphore(id as u8));
        }
        Ok(outcome)
    }

    fn post(&mut self, id: usize) -> Result<(), KernelError> {
        let semaphore = self.semaphores.get_mut(id).ok_or(KernelError::InvalidPrimitive)?;
        if let PostOutcome::Woke(next) = semaphore.post() {
            trace!("semaphore {} woke {}", id, next);
            self.wake(next);
        }
        Ok(())
    }

    fn block(&mut self, slot: usize, on: Primitive) {
        let tcb = &mut self.tasks[slot];
        tcb.state = match on {
            Primitive::Mutex(_) => TaskState::BlockedOnMutex,
            Primitive::Semaphore(_) => TaskState::BlockedOnSemaphore,
        };
        tcb.blocked_on = Some(on);
    }

    fn wake(&mut self, slot: usize) {
        let tcb = &mut self.tasks[slot];
        tcb.state = TaskState::Ready;
        tcb.blocked_on = None;
    }

    // -----------------------------------------------------------------------
    // Task lifecycle
    // -----------------------------------------------------------------------

    /// Kills the task named `pid`. Returns its slot.
    ///
    /// Mutexes it owns pass to their next waiter, it leaves every wait
    /// queue, and every window it owns goes back to the allocator. The
    /// slot keeps its name, priority and stack size for a restart.
    pub fn stop_thread(&mut self, pid: Pid) -> Result<usize, KernelError> {
        let slot = self.slot_of(pid).ok_or(KernelError::UnknownTask)?;
        self.kill(slot)?;
        Ok(slot)
    }

    fn kill(&mut self, slot: usize) -> Result<(), KernelError> {
        if self.tasks[slot].state == TaskState::Stopped {
            return Err(KernelError::AlreadyStopped);
        }

        for id in 0..MAX_MUTEXES {
            if self.mutexes[id].owner() == Some(slot) {
                self.unlock(slot, id)?;
            }
            self.mutexes[id].cancel(slot);
        }
        for semaphore in self.semaphores.iter_mut() {
            semaphore.cancel(slot);
        }
        let freed = self.allocator.free_owned_by(slot);

        if self.current == Some(slot) {
            self.credit(slot);
            self.current = None;
        }

        let tcb = &mut self.tasks[slot];
        tcb.state = TaskState::Stopped;
        tcb.blocked_on = None;
        tcb.sleep_ticks = 0;
        tcb.mask = AccessMask::deny_all();
        tcb.stack_base = 0;
        tcb.sp = 0;
        info!(
            "stopped task {} '{}' ({} windows freed)",
            slot,
            tcb.name.as_str(),
            freed
        );
        Ok(())
    }

    /// Starts a stopped task again from its entry point on a new stack.
    pub fn restart_thread(&mut self, pid: Pid) -> Result<(), KernelError> {
        let slot = self.slot_of(pid).ok_or(KernelError::UnknownTask)?;
        if self.tasks[slot].state != TaskState::Stopped {
            return Err(KernelError::NotStopped);
        }
        let stack = self.allocator.allocate(self.tasks[slot].stack_size, slot)?;
        self.launch(slot, stack)?;
        info!(
            "restarted task {} '{}' stack {:#010x}+{}",
            slot,
            self.tasks[slot].name.as_str(),
            stack.base,
            stack.size
        );
        Ok(())
    }

    /// Changes the priority of the task named `pid`.
    pub fn set_priority(&mut self, pid: Pid, priority: u8) -> Result<(), KernelError> {
        if usize::from(priority) >= NUM_PRIORITIES {
            return Err(KernelError::InvalidPriority);
        }
        let slot = self.slot_of(pid).ok_or(KernelError::UnknownTask)?;
        self.tasks[slot].priority = priority;
        debug!("task {} priority -> {}", slot, priority);
        Ok(())
    }

    pub fn set_policy(&mut self, policy: SchedulerPolicy) {
        self.config.policy = policy;
        self.scheduler.policy = policy;
        debug!("scheduler policy -> {:?}", policy);
    }

    // -----------------------------------------------------------------------
    // Dynamic memory
    // -----------------------------------------------------------------------

    /// Grants `caller` a new window and opens it in the caller's mask.
    pub fn malloc(&mut self, caller: usize, bytes: u32) -> Result<Allocation, KernelError> {
        let window = self.allocator.allocate(bytes, caller)?;
        self.tasks[caller].mask.grant_window(window.base, window.size);
        Ok(window)
    }

    /// Releases a window `caller` obtained from `malloc`. Returns the
    /// caller's new mask.
    pub fn free(&mut self, caller: usize, addr: u32) -> Result<AccessMask, KernelError> {
        let window = *self.allocator.find(addr).ok_or(KernelError::NotOwner)?;
        if window.owner != caller || window.base == self.tasks[caller].stack_base {
            return Err(KernelError::NotOwner);
        }
        self.allocator.free(addr)?;
        let mask = &mut self.tasks[caller].mask;
        mask.revoke_window(window.base, window.size);
        Ok(*mask)
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Copies the task list to the caller. Returns how many slots are in use.
    fn ps(&mut self, caller: usize, buffer: UserBuffer) -> Result<u32, KernelError> {
        let mut report: TaskReport = [TaskInfo::default(); MAX_TASKS];
        let mut count = 0;
        for (slot, (row, tcb)) in report.iter_mut().zip(self.tasks.iter()).enumerate() {
            if tcb.is_occupied() {
                *row = TaskInfo::new(tcb, self.last_window_ticks(slot));
                count += 1;
            }
        }
        self.write_user(caller, buffer, report.as_bytes())?;
        Ok(count)
    }

    fn ipcs(&mut self, caller: usize, buffer: UserBuffer) -> Result<(), KernelError> {
        let mut report = IpcsInfo::default();
        for (row, semaphore) in report.semaphores.iter_mut().zip(self.semaphores.iter()) {
            let (queue_len, queue) = info::queue_field(semaphore.queue().as_slice());
            *row = SemaphoreInfo {
                count: semaphore.count(),
                queue_len,
                queue,
                _reserved: [0; 3],
            };
        }
        for (row, mutex) in report.mutexes.iter_mut().zip(self.mutexes.iter()) {
            let (queue_len, queue) = info::queue_field(mutex.queue().as_slice());
            *row = MutexInfo {
                locked: u8::from(mutex.is_locked()),
                owner: mutex.owner().map_or(NO_OWNER, |o| o as u8),
                queue_len,
                queue,
                _reserved: [0; 1],
            };
        }
        for (name, tcb) in report.names.iter_mut().zip(self.tasks.iter()) {
            if tcb.is_occupied() {
                *name = tcb.name_field();
            }
        }
        self.write_user(caller, buffer, report.as_bytes())
    }

    fn meminfo(&mut self, caller: usize, buffer: UserBuffer) -> Result<(), KernelError> {
        let mut report: MemReport = [MemInfo::default(); MAX_ALLOCS];
        for (row, window) in report.iter_mut().zip(self.allocator.allocations()) {
            let owner = &self.tasks[window.owner];
            let usage_permille = if window.base == owner.stack_base {
                context::stack_usage_permille(&self.memory, window.base, window.size)
            } else {
                0
            };
            *row = MemInfo {
                owner_name: owner.name_field(),
                base: window.base,
                size: window.size,
                usage_permille,
                valid: 1,
                _reserved: [0; 3],
            };
        }
        self.write_user(caller, buffer, report.as_bytes())
    }

    /// Resolves a NUL-terminated name in the caller's memory.
    fn pidof(&self, caller: usize, buffer: UserBuffer) -> Result<Option<Pid>, KernelError> {
        let mask = self.tasks[caller].mask;
        let mut name = [0u8; NAME_FIELD_LEN];
        let mut len = 0;
        while len < NAME_FIELD_LEN {
            let addr = buffer.addr.checked_add(len as u32).ok_or(KernelError::BadUserBuffer)?;
            if !mask.covers(addr, 1) {
                return Err(KernelError::BadUserBuffer);
            }
            let byte = self.memory.window(addr, 1).ok_or(KernelError::BadUserBuffer)?[0];
            if byte == 0 {
                break;
            }
            name[len] = byte;
            len += 1;
        }
        if len == NAME_FIELD_LEN {
            return Ok(None);
        }
        let wanted = &name[..len];
        Ok(self
            .tasks
            .iter()
            .find(|t| t.is_occupied() && t.name.as_bytes() == wanted)
            .map(|t| t.pid))
    }

    /// Copies `bytes` into the caller's memory after checking that every
    /// byte lies in a window the caller may write.
    fn write_user(&mut self, caller: usize, buffer: UserBuffer, bytes: &[u8]) -> Result<(), KernelError> {
        if !self.tasks[caller].mask.covers(buffer.addr, bytes.len() as u32) {
            warn!(
                "task {} passed bad buffer {:#010x}+{}",
                caller,
                buffer.addr,
                bytes.len()
            );
            return Err(KernelError::BadUserBuffer);
        }
        self.memory
            .window_mut(buffer.addr, bytes.len())
            .ok_or(KernelError::BadUserBuffer)?
            .copy_from_slice(bytes);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Context switch, tick, faults
    // -----------------------------------------------------------------------

    /// Whether the switch trap must save a context below the live PSP.
    ///
    /// False before the first dispatch and after the running task was
    /// killed, whether by itself, by another task's call, or by a fault.
    /// Its stack window is gone by then and the PSP may point past it.
    pub fn has_outgoing(&self) -> bool {
        self.current.is_some()
    }

    /// Saves the outgoing task's stack pointer and picks the next task.
    ///
    /// `psp` is ignored when there is no outgoing task (see
    /// [`Kernel::has_outgoing`]).
    pub fn context_switch(&mut self, psp: u32) -> Result<Dispatched, KernelError> {
        if let Some(slot) = self.current {
            self.tasks[slot].sp = psp;
            self.credit(slot);
        }

        let next = self
            .scheduler
            .select_next(&self.tasks)
            .ok_or(KernelError::NoReadyTask)?;
        self.current = Some(next);

        let tcb = &mut self.tasks[next];
        tcb.dispatched_at = self.ticks;
        trace!("dispatch task {} '{}' sp {:#010x}", next, tcb.name.as_str(), tcb.sp);
        Ok(Dispatched {
            task: next,
            pid: tcb.pid,
            sp: tcb.sp,
            mask: tcb.mask,
        })
    }

    /// One timer tick. Returns whether the switch trap should be pended.
    pub fn tick(&mut self) -> bool {
        self.ticks = self.ticks.wrapping_add(1);

        for tcb in self.tasks.iter_mut().filter(|t| t.state == TaskState::Delayed) {
            tcb.sleep_ticks = tcb.sleep_ticks.saturating_sub(1);
            if tcb.sleep_ticks == 0 {
                tcb.state = TaskState::Ready;
            }
        }

        self.window_ticks += 1;
        if self.window_ticks >= self.config.accounting_window.max(1) {
            self.window_ticks = 0;
            if let Some(slot) = self.current {
                self.credit(slot);
            }
            self.active_bucket ^= 1;
            for tcb in self.tasks.iter_mut() {
                tcb.elapsed[self.active_bucket] = 0;
            }
        }

        self.config.preemption
    }

    /// Logs a fault in the running task and kills it.
    pub fn handle_fault(&mut self, report: &FaultReport) -> Action {
        error!("{}", report);
        match self.current {
            Some(slot) => match self.kill(slot) {
                Ok(()) => Action::Switch,
                Err(e) => {
                    error!("could not stop faulting task {}: {}", slot, e);
                    Action::Reset
                }
            },
            None => Action::Reset,
        }
    }

    /// Adds the ticks since `slot` was dispatched to its live bucket.
    fn credit(&mut self, slot: usize) {
        let now = self.ticks;
        let tcb = &mut self.tasks[slot];
        let ran = now.wrapping_sub(tcb.dispatched_at);
        tcb.elapsed[self.active_bucket] = tcb.elapsed[self.active_bucket].saturating_add(ran);
        tcb.dispatched_at = now;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn tasks(&self) -> &[TaskControlBlock] {
        &self.tasks
    }

    pub fn task(&self, slot: usize) -> Option<&TaskControlBlock> {
        self.tasks.get(slot).filter(|t| t.is_occupied())
    }

    /// Slot of the running task.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Slot of the task named `pid`, stopped or not.
    pub fn slot_of(&self, pid: Pid) -> Option<usize> {
        self.tasks.iter().position(|t| t.is_occupied() && t.pid == pid)
    }

    pub fn mutex(&self, id: usize) -> Option<&Mutex> {
        self.mutexes.get(id)
    }

    pub fn semaphore(&self, id: usize) -> Option<&Semaphore> {
        self.semaphores.get(id)
    }

    pub fn allocator(&self) -> &RegionAllocator {
        &self.allocator
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Ticks `slot` ran during the last complete accounting window.
    pub fn last_window_ticks(&self, slot: usize) -> u32 {
        self.tasks[slot].elapsed[self.active_bucket ^ 1]
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
