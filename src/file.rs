//! The global, reference-counted open-file table (spec §4.2).
//!
//! One coarse lock serializes all structural changes to the table *and*
//! all I/O through it — deliberately, so a single `read`/`write` call
//! never interleaves with another on the same descriptor (spec §5).

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::config::OPEN_MAX;
use crate::errno::{EBADF, EINVAL, EMFILE, ESPIPE};
use crate::external::Vnode;
use crate::sync::SpinLock;
use crate::kdebug;

bitflags! {
    /// Raw `open` flags. The low two bits (`O_ACCMODE`) select the access
    /// mode; the rest are independent creation/behavior bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for reading only. Numerically zero, like POSIX `O_RDONLY`.
        const RDONLY = 0;
        /// Open for writing only.
        const WRONLY = 1;
        /// Open for both reading and writing.
        const RDWR = 2;
        /// Create the file if it does not exist.
        const CREATE = 0b0100;
        /// Truncate to zero length on open.
        const TRUNCATE = 0b1000;
        /// Writes always append to the end of the file.
        const APPEND = 0b1_0000;
        /// Fail if the file already exists (with `CREATE`).
        const EXCLUSIVE = 0b10_0000;
    }
}

/// Mask selecting the access-mode bits out of a raw [`OpenFlags`] value.
pub const O_ACCMODE: u32 = 0b11;

/// The access mode an [`OpenFile`] was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Reads only; writes return `EBADF`.
    ReadOnly,
    /// Writes only; reads return `EBADF`.
    WriteOnly,
    /// Both reads and writes are permitted.
    ReadWrite,
}

impl OpenFlags {
    /// Extracts the access mode from the low two bits.
    pub fn access_mode(self) -> AccessMode {
        match self.bits() & O_ACCMODE {
            0 => AccessMode::ReadOnly,
            1 => AccessMode::WriteOnly,
            _ => AccessMode::ReadWrite,
        }
    }
}

/// Whence for [`OpenFileTable::lseek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Offset is absolute.
    Set,
    /// Offset is relative to the current position.
    Cur,
    /// Offset is relative to end-of-file.
    End,
}

/// A system-wide open-file description: a vnode plus the offset and
/// access mode shared by every descriptor that references it.
struct OpenFile {
    vnode: Arc<dyn Vnode>,
    access_mode: AccessMode,
    offset: i64,
    refcount: usize,
}

/// Fixed-capacity table of [`OpenFile`] entries, indexed by the small
/// integers stored in each process's [`crate::fd_table::FdTable`].
pub struct OpenFileTable {
    slots: SpinLock<Vec<Option<OpenFile>>>,
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenFileTable {
    /// Creates an empty table of `OPEN_MAX` slots.
    pub fn new() -> Self {
        Self {
            slots: SpinLock::new((0..OPEN_MAX).map(|_| None).collect()),
        }
    }

    /// Installs a freshly opened vnode in the first empty slot with
    /// `refcount = 1`. Returns `EMFILE` if the table is full.
    pub fn open(&self, vnode: Arc<dyn Vnode>, flags: OpenFlags) -> Result<usize, isize> {
        let mut slots = self.slots.lock();
        let idx = slots.iter().position(Option::is_none).ok_or(EMFILE)?;
        slots[idx] = Some(OpenFile {
            vnode,
            access_mode: flags.access_mode(),
            offset: 0,
            refcount: 1,
        });
        kdebug!("open-file slot {idx} allocated");
        Ok(idx)
    }

    /// Bumps the refcount of the entry at `idx` by one (used by `dup2`
    /// and `fork` for every descriptor slot that comes to reference it).
    pub fn bump_refcount(&self, idx: usize) {
        let mut slots = self.slots.lock();
        if let Some(of) = slots.get_mut(idx).and_then(Option::as_mut) {
            of.refcount += 1;
        }
    }

    /// Reads into `buf` at the entry's current offset, advancing it by
    /// the number of bytes transferred.
    pub fn read(&self, idx: usize, buf: &mut [u8]) -> Result<usize, isize> {
        let mut slots = self.slots.lock();
        let of = slots.get_mut(idx).and_then(Option::as_mut).ok_or(EBADF)?;
        if of.access_mode == AccessMode::WriteOnly {
            return Err(EBADF);
        }
        let n = of.vnode.read(of.offset, buf)?;
        of.offset += n as i64;
        Ok(n)
    }

    /// Writes `buf` at the entry's current offset, advancing it by the
    /// number of bytes transferred.
    pub fn write(&self, idx: usize, buf: &[u8]) -> Result<usize, isize> {
        let mut slots = self.slots.lock();
        let of = slots.get_mut(idx).and_then(Option::as_mut).ok_or(EBADF)?;
        if of.access_mode == AccessMode::ReadOnly {
            return Err(EBADF);
        }
        let n = of.vnode.write(of.offset, buf)?;
        of.offset += n as i64;
        Ok(n)
    }

    /// Moves the entry's offset per `whence`, rejecting a negative
    /// result without mutating anything.
    pub fn lseek(&self, idx: usize, pos: i64, whence: Whence) -> Result<i64, isize> {
        let mut slots = self.slots.lock();
        let of = slots.get_mut(idx).and_then(Option::as_mut).ok_or(EBADF)?;
        if !of.vnode.is_seekable() {
            return Err(ESPIPE);
        }
        let new_offset = match whence {
            Whence::Set => pos,
            Whence::Cur => of.offset + pos,
            Whence::End => pos + of.vnode.size()?,
        };
        if new_offset < 0 {
            return Err(EINVAL);
        }
        of.offset = new_offset;
        Ok(new_offset)
    }

    /// Worker for [`OpenFileTable::close`] and `dup2`'s silent close of an
    /// already-open `newfd`, operating on an already-locked slot vector —
    /// the redesign spec §9 recommends in place of a `lock_do_i_hold`
    /// reentry check.
    fn close_locked(slots: &mut [Option<OpenFile>], idx: usize) -> Result<(), isize> {
        let slot = slots.get_mut(idx).ok_or(EBADF)?;
        let of = slot.as_mut().ok_or(EBADF)?;
        of.refcount -= 1;
        if of.refcount == 0 {
            // Dropping the slot drops the last `Arc<dyn Vnode>` reference,
            // which is this design's equivalent of `vfs_close`.
            *slot = None;
        }
        Ok(())
    }

    /// Decrements the entry's refcount, closing the vnode and freeing the
    /// slot when it reaches zero.
    pub fn close(&self, idx: usize) -> Result<(), isize> {
        let mut slots = self.slots.lock();
        Self::close_locked(&mut slots, idx)
    }

    /// Bumps `old_idx`'s refcount and, if `existing` names a slot, closes
    /// it — both under one lock acquisition, matching spec §5's "refcount
    /// bump and (possibly) nested close in `dup2`" concurrency note.
    pub fn dup2_onto(&self, old_idx: usize, existing: Option<usize>) -> Result<(), isize> {
        let mut slots = self.slots.lock();
        {
            let of = slots.get_mut(old_idx).and_then(Option::as_mut).ok_or(EBADF)?;
            of.refcount += 1;
        }
        if let Some(existing_idx) = existing {
            Self::close_locked(&mut slots, existing_idx)?;
        }
        Ok(())
    }
}
