//! The process-id table: allocation, parent/child linkage, and the
//! exit-status handoff between `exit` and `waitpid` (spec §4.1).
//!
//! `wait` destroys the target's entry before returning rather than
//! leaving it for opportunistic reuse at the next `create` — a
//! deliberate resolution of the zombie-reaping policy this subsystem
//! left as an open question, matching `pid_wait`'s own synchronous call
//! to `pid_destroy` in the kernel this was distilled from.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::marker::PhantomData;

use crate::config::{PID_BOOT, PID_INVALID, PID_MAX, PID_MIN};
use crate::errno::{ECHILD, ENPROC, ESRCH};
use crate::external::CondVar;
use crate::sync::SpinLock;
use crate::{kdebug, kinfo};

/// A process identifier. `0` and `PID_INVALID` never name a live process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl Pid {
    /// The sentinel value used by the original kernel for "no such PID".
    pub const INVALID: Pid = Pid(PID_INVALID);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifeState {
    Running,
    /// Exited with this status, awaiting a `wait` to collect it.
    Zombie(i32),
}

struct PidEntry<C: CondVar> {
    parent: Pid,
    state: LifeState,
    cv: Arc<C>,
}

/// Fixed-capacity table mapping live [`Pid`]s to their lifecycle state.
///
/// Slot `i` (for `i` in `0..PID_MAX - PID_MIN`) represents PID
/// `PID_MIN + i`; `PID_BOOT` is reserved and never allocated through
/// [`PidTable::create`].
pub struct PidTable<C: CondVar> {
    slots: SpinLock<Vec<Option<PidEntry<C>>>>,
    _cv: PhantomData<C>,
}

impl<C: CondVar> Default for PidTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CondVar> PidTable<C> {
    /// Creates an empty table. PID `PID_BOOT` is implicitly reserved for
    /// the kernel's first process and is never handed out by `create`.
    pub fn new() -> Self {
        let count = (PID_MAX - PID_MIN) as usize;
        Self {
            slots: SpinLock::new((0..count).map(|_| None).collect()),
            _cv: PhantomData,
        }
    }

    fn index_of(pid: Pid) -> Option<usize> {
        if pid.0 < PID_MIN || pid.0 >= PID_MAX {
            return None;
        }
        Some((pid.0 - PID_MIN) as usize)
    }

    /// Allocates the lowest-numbered free PID with `parent` as its
    /// parent. Returns `ENPROC` if the table is full.
    pub fn create(&self, parent: Pid) -> Result<Pid, isize> {
        let mut slots = self.slots.lock();
        let idx = slots.iter().position(Option::is_none).ok_or(ENPROC)?;
        slots[idx] = Some(PidEntry {
            parent,
            state: LifeState::Running,
            cv: Arc::new(C::default()),
        });
        let pid = Pid(idx as u32 + PID_MIN);
        kinfo!("pid {} created, parent {}", pid.0, parent.0);
        Ok(pid)
    }

    /// Records `pid` as exited with `status` and wakes anyone waiting on
    /// it. The entry becomes a zombie: it still occupies its slot until
    /// a matching `wait` collects it.
    pub fn exit(&self, pid: Pid, status: i32) -> Result<(), isize> {
        let idx = Self::index_of(pid).ok_or(ESRCH)?;
        let mut slots = self.slots.lock();
        let entry = slots.get_mut(idx).and_then(Option::as_mut).ok_or(ESRCH)?;
        entry.state = LifeState::Zombie(status);
        let cv = entry.cv.clone();
        drop(slots);
        kinfo!("pid {} exited, status {}", pid.0, status);
        cv.notify_all();
        Ok(())
    }

    /// Blocks until `target` (a child of `caller`) exits, then destroys
    /// its entry and returns its exit status. A second `wait` on the
    /// same PID, or a `wait` on a non-child, fails rather than blocking
    /// forever.
    pub fn wait(&self, target: Pid, caller: Pid) -> Result<i32, isize> {
        let idx = Self::index_of(target).ok_or(ESRCH)?;
        loop {
            let mut slots = self.slots.lock();
            let entry = slots.get(idx).and_then(Option::as_ref).ok_or(ESRCH)?;
            if entry.parent != caller {
                return Err(ECHILD);
            }
            match entry.state {
                LifeState::Zombie(status) => {
                    slots[idx] = None;
                    kdebug!("pid {} reaped by wait, status {}", target.0, status);
                    return Ok(status);
                }
                LifeState::Running => {
                    let cv = entry.cv.clone();
                    drop(slots);
                    cv.wait();
                    // Recheck from the top: the entry may have been
                    // reaped by a racing waiter, or may simply not have
                    // exited yet on a spurious wakeup.
                }
            }
        }
    }

    /// The boot process's fixed PID, for parenting the first process
    /// created via [`PidTable::create`].
    pub const fn boot_pid() -> Pid {
        Pid(PID_BOOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StdCondVar;
    use std::sync::Arc as StdArc;
    use std::thread;

    type TestTable = PidTable<StdCondVar>;

    #[test]
    fn create_allocates_lowest_free_slot() {
        let table = TestTable::new();
        let a = table.create(PidTable::<StdCondVar>::boot_pid()).unwrap();
        let b = table.create(a).unwrap();
        assert!(b.0 > a.0);
    }

    #[test]
    fn create_until_full_returns_enproc() {
        let table = TestTable::new();
        let boot = PidTable::<StdCondVar>::boot_pid();
        let capacity = (crate::config::PID_MAX - crate::config::PID_MIN) as usize;
        for _ in 0..capacity {
            table.create(boot).unwrap();
        }
        assert_eq!(table.create(boot), Err(ENPROC));
    }

    #[test]
    fn wait_on_unknown_pid_is_esrch() {
        let table = TestTable::new();
        let boot = PidTable::<StdCondVar>::boot_pid();
        assert_eq!(table.wait(Pid(crate::config::PID_MIN), boot), Err(ESRCH));
    }

    #[test]
    fn wait_on_non_child_is_echild() {
        let table = TestTable::new();
        let boot = PidTable::<StdCondVar>::boot_pid();
        let child = table.create(boot).unwrap();
        let impostor = table.create(boot).unwrap();
        assert_eq!(table.wait(child, impostor), Err(ECHILD));
    }

    #[test]
    fn exit_then_wait_returns_status_and_frees_slot() {
        let table = TestTable::new();
        let boot = PidTable::<StdCondVar>::boot_pid();
        let child = table.create(boot).unwrap();
        table.exit(child, 7).unwrap();
        assert_eq!(table.wait(child, boot), Ok(7));
        // Slot was freed: wait again now sees ESRCH, not the old zombie.
        assert_eq!(table.wait(child, boot), Err(ESRCH));
    }

    #[test]
    fn wait_blocks_until_exit_then_reaps() {
        let table = StdArc::new(TestTable::new());
        let boot = PidTable::<StdCondVar>::boot_pid();
        let child = table.create(boot).unwrap();

        let waiter_table = table.clone();
        let handle = thread::spawn(move || waiter_table.wait(child, boot));

        // Give the waiter a chance to block before we signal.
        thread::sleep(std::time::Duration::from_millis(20));
        table.exit(child, 3).unwrap();

        assert_eq!(handle.join().unwrap(), Ok(3));
    }
}
