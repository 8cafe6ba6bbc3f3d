//! # Synchronization Primitives
//!
//! Blocking mutex and counting semaphore with FIFO wait queues. These are
//! plain data structures: they decide who owns what and who waits, and the
//! kernel applies the resulting task state changes. All of it runs inside
//! the trap handler, so there is no locking here.
//!
//! Waiters are task slot indices. Releasing a primitive with a non-empty
//! queue hands it straight to the head waiter, so the primitive is never
//! observed free while someone is waiting for it.

use heapless::Vec;

use crate::config::MAX_WAITERS;
use crate::error::KernelError;

// ---------------------------------------------------------------------------
// Wait queue
// ---------------------------------------------------------------------------

/// Bounded FIFO of waiting task slots.
#[derive(Debug, Clone, Default)]
pub struct WaitQueue {
    slots: Vec<u8, MAX_WAITERS>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Appends `task` at the tail.
    pub fn push(&mut self, task: usize) -> Result<(), KernelError> {
        let slot = u8::try_from(task).map_err(|_| KernelError::QueueFull)?;
        self.slots.push(slot).map_err(|_| KernelError::QueueFull)
    }

    /// Removes and returns the head.
    pub fn pop(&mut self) -> Option<usize> {
        if self.slots.is_empty() {
            None
        } else {
            Some(usize::from(self.slots.remove(0)))
        }
    }

    /// Splices `task` out, keeping the order of the rest.
    pub fn remove(&mut self, task: usize) -> bool {
        match self.slots.iter().position(|&s| usize::from(s) == task) {
            Some(i) => {
                self.slots.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, task: usize) -> bool {
        self.slots.iter().any(|&s| usize::from(s) == task)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Waiters, head first.
    pub fn as_slice(&self) -> &[u8] {
        &self.slots
    }
}

// ---------------------------------------------------------------------------
// Mutex
// ---------------------------------------------------------------------------

/// Outcome of [`Mutex::lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The caller now owns the mutex.
    Acquired,
    /// The caller was queued and must block.
    Blocked,
}

/// Outcome of [`Mutex::unlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The mutex is free.
    Released,
    /// Ownership moved to this waiter, which must be made ready.
    HandedOff(usize),
}

/// Blocking mutex with direct hand-off.
#[derive(Debug, Clone, Default)]
pub struct Mutex {
    locked: bool,
    owner: Option<u8>,
    queue: WaitQueue,
}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            locked: false,
            owner: None,
            queue: WaitQueue::new(),
        }
    }

    /// Takes the mutex for `task`, or queues it.
    pub fn lock(&mut self, task: usize) -> Result<LockOutcome, KernelError> {
        if !self.locked {
            self.locked = true;
            self.owner = Some(slot(task)?);
            return Ok(LockOutcome::Acquired);
        }
        self.queue.push(task)?;
        Ok(LockOutcome::Blocked)
    }

    /// Releases the mutex held by `task`. Fails with `NotOwner` for anyone
    /// else, leaving the mutex untouched.
    pub fn unlock(&mut self, task: usize) -> Result<UnlockOutcome, KernelError> {
        if !self.locked || self.owner.map(usize::from) != Some(task) {
            return Err(KernelError::NotOwner);
        }
        match self.queue.pop() {
            Some(next) => {
                self.owner = Some(slot(next)?);
                Ok(UnlockOutcome::HandedOff(next))
            }
            None => {
                self.locked = false;
                self.owner = None;
                Ok(UnlockOutcome::Released)
            }
        }
    }

    /// Drops a queued `task` without touching ownership.
    pub fn cancel(&mut self, task: usize) -> bool {
        self.queue.remove(task)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn owner(&self) -> Option<usize> {
        self.owner.map(usize::from)
    }

    pub fn queue(&self) -> &WaitQueue {
        &self.queue
    }
}

// ---------------------------------------------------------------------------
// Semaphore
// ---------------------------------------------------------------------------

/// Outcome of [`Semaphore::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A unit was taken.
    Acquired,
    /// The caller was queued and must block.
    Blocked,
}

/// Outcome of [`Semaphore::post`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// The count went up.
    Incremented,
    /// The unit went to this waiter, which must be made ready.
    Woke(usize),
}

/// Counting semaphore with FIFO wake-up.
///
/// A queued waiter never holds a unit, so `count + queue.len()` only moves
/// on `wait` that succeeds immediately or `post` with nobody waiting.
#[derive(Debug, Clone, Default)]
pub struct Semaphore {
    count: u32,
    queue: WaitQueue,
}

impl Semaphore {
    pub const fn new(count: u32) -> Self {
        Self {
            count,
            queue: WaitQueue::new(),
        }
    }

    pub fn wait(&mut self, task: usize) -> Result<WaitOutcome, KernelError> {
        if self.count > 0 {
            self.count -= 1;
            return Ok(WaitOutcome::Acquired);
        }
        self.queue.push(task)?;
        Ok(WaitOutcome::Blocked)
    }

    pub fn post(&mut self) -> PostOutcome {
        match self.queue.pop() {
            Some(next) => PostOutcome::Woke(next),
            None => {
                self.count = self.count.saturating_add(1);
                PostOutcome::Incremented
            }
        }
    }

    /// Drops a queued `task`. The count is left alone since the waiter
    /// never took a unit.
    pub fn cancel(&mut self, task: usize) -> bool {
        self.queue.remove(task)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn queue(&self) -> &WaitQueue {
        &self.queue
    }
}

fn slot(task: usize) -> Result<u8, KernelError> {
    u8::try_from(task).map_err(|_| KernelError::UnknownTask)
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_fifo_and_splice() {
        let mut q = WaitQueue::new();
        for t in [4, 1, 7, 2] {
            q.push(t).unwrap();
        }
        assert!(q.remove(7));
        assert!(!q.remove(7));
        assert_eq!(q.as_slice(), &[4, 1, 2]);
        assert_eq!(q.pop(), Some(4));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_queue_capacity() {
        let mut q = WaitQueue::new();
        for t in 0..MAX_WAITERS {
            q.push(t).unwrap();
        }
        assert_eq!(q.push(0), Err(KernelError::QueueFull));
        assert_eq!(q.push(300), Err(KernelError::QueueFull));
    }

    #[test]
    fn test_mutex_uncontended() {
        let mut m = Mutex::new();
        assert_eq!(m.lock(3), Ok(LockOutcome::Acquired));
        assert_eq!(m.owner(), Some(3));
        assert_eq!(m.unlock(3), Ok(UnlockOutcome::Released));
        assert!(!m.is_locked());
        assert_eq!(m.owner(), None);
    }

    #[test]
    fn test_mutex_hand_off_in_fifo_order() {
        let mut m = Mutex::new();
        m.lock(1).unwrap();
        assert_eq!(m.lock(5), Ok(LockOutcome::Blocked));
        assert_eq!(m.lock(2), Ok(LockOutcome::Blocked));

        assert_eq!(m.unlock(1), Ok(UnlockOutcome::HandedOff(5)));
        assert!(m.is_locked());
        assert_eq!(m.owner(), Some(5));

        assert_eq!(m.unlock(5), Ok(UnlockOutcome::HandedOff(2)));
        assert_eq!(m.unlock(2), Ok(UnlockOutcome::Released));
        assert!(m.queue().is_empty());
    }

    #[test]
    fn test_mutex_unlock_by_non_owner_is_refused() {
        let mut m = Mutex::new();
        assert_eq!(m.unlock(0), Err(KernelError::NotOwner));
        m.lock(1).unwrap();
        m.lock(2).unwrap();
        assert_eq!(m.unlock(2), Err(KernelError::NotOwner));
        assert_eq!(m.owner(), Some(1));
        assert_eq!(m.queue().as_slice(), &[2]);
    }

    #[test]
    fn test_mutex_cancel_waiter() {
        let mut m = Mutex::new();
        m.lock(1).unwrap();
        m.lock(2).unwrap();
        m.lock(3).unwrap();
        assert!(m.cancel(2));
        assert_eq!(m.unlock(1), Ok(UnlockOutcome::HandedOff(3)));
    }

    #[test]
    fn test_semaphore_counts_down_then_blocks() {
        let mut s = Semaphore::new(2);
        assert_eq!(s.wait(1), Ok(WaitOutcome::Acquired));
        assert_eq!(s.wait(2), Ok(WaitOutcome::Acquired));
        assert_eq!(s.wait(3), Ok(WaitOutcome::Blocked));
        assert_eq!(s.count(), 0);
        assert_eq!(s.queue().len(), 1);
    }

    #[test]
    fn test_semaphore_post_wakes_head_without_overshoot() {
        let mut s = Semaphore::new(0);
        s.wait(4).unwrap();
        s.wait(6).unwrap();
        let before = s.count() as usize + s.queue().len();

        assert_eq!(s.post(), PostOutcome::Woke(4));
        assert_eq!(s.count(), 0);
        assert_eq!(s.post(), PostOutcome::Woke(6));
        assert_eq!(s.post(), PostOutcome::Incremented);
        assert_eq!(s.count(), 1);
        assert_eq!(before, 2);
    }

    #[test]
    fn test_semaphore_cancel_keeps_count() {
        let mut s = Semaphore::new(0);
        s.wait(1).unwrap();
        s.wait(2).unwrap();
        assert!(s.cancel(1));
        assert_eq!(s.count(), 0);
        assert_eq!(s.post(), PostOutcome::Woke(2));
    }
}
