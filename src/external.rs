//! Trait boundaries for the subsystem's external collaborators.
//!
//! Spec §1 names these as out of scope: the VFS layer, the virtual-memory
//! layer, threading primitives, and user/kernel copy routines. Each is
//! represented here as a narrow trait; [`crate::test_support`] ships an
//! in-memory implementation of each so this crate is host-testable on its
//! own, exactly as a real kernel would swap in its own implementations.
//!
//! Thread fork/join and the trapframe format are *not* modeled as traits:
//! spec §1 places them out of scope entirely, and [`crate::process::fork`]
//! only needs to produce the child's kernel-side state (PID, address
//! space, fd table) — the embedding kernel's scheduler is responsible for
//! actually running it on a new thread.

extern crate alloc;

use alloc::string::String;

/// A VFS-level handle to an open file or device (spec's "opaque `Vnode`").
pub trait Vnode: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at `offset`. Returns the
    /// number of bytes actually transferred (may be less than `buf.len()`
    /// at end-of-file).
    fn read(&self, offset: i64, buf: &mut [u8]) -> Result<usize, isize>;

    /// Writes `buf` starting at `offset`. Returns the number of bytes
    /// actually transferred.
    fn write(&self, offset: i64, buf: &[u8]) -> Result<usize, isize>;

    /// `VOP_ISSEEKABLE`: whether this vnode supports `lseek`.
    fn is_seekable(&self) -> bool;

    /// `VOP_STAT`: current size in bytes, used by `lseek(.., SEEK_END)`.
    fn size(&self) -> Result<i64, isize>;
}

/// The virtual file system: resolves a path to a freshly opened [`Vnode`].
pub trait Vfs {
    /// Opens `path` with the given raw open flags and creation mode.
    fn open(
        &self,
        path: &str,
        flags: crate::file::OpenFlags,
        mode: u32,
    ) -> Result<alloc::sync::Arc<dyn Vnode>, isize>;
}

/// A user-space virtual address, as seen by [`AddressSpace`]'s copy
/// routines. `0` is treated as the null pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserAddr(pub usize);

impl UserAddr {
    /// The null user pointer.
    pub const NULL: UserAddr = UserAddr(0);

    /// Whether this is the null pointer.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A process address space, combining the virtual-memory layer (`create`,
/// `fork`, `load_elf`, `define_stack`) and the user/kernel copy routines
/// (`copy_in_str`, `copy_out_str`, word-at-a-time copy in/out) spec §1
/// lists as two separate external collaborators. They're merged into one
/// trait here because both operate on exactly one thing: the memory of
/// whichever process currently owns this address space.
pub trait AddressSpace: Sized {
    /// Creates a fresh, empty address space (used by `execv`).
    fn create() -> Self;

    /// Duplicates this address space for `fork`. Returns `ENOMEM` if the
    /// copy cannot be allocated.
    fn fork(&self) -> Result<Self, isize>;

    /// Loads an ELF image from `vnode` into this (freshly created)
    /// address space, returning the entry point.
    fn load_elf(&mut self, vnode: &dyn Vnode) -> Result<UserAddr, isize>;

    /// Establishes the initial user stack, returning its initial
    /// (highest) stack pointer.
    fn define_stack(&mut self) -> Result<UserAddr, isize>;

    /// The address one past the highest valid user address; any user
    /// pointer `>= user_ceiling()` is `EFAULT`.
    fn user_ceiling(&self) -> usize;

    /// Copies a NUL-terminated string out of user memory at `ptr`,
    /// stopping at `max_len` bytes (`EFAULT`/`E2BIG`-shaped failures are
    /// left to the caller to map; this returns `EFAULT` for an
    /// unreadable pointer).
    fn copy_in_str(&self, ptr: UserAddr, max_len: usize) -> Result<String, isize>;

    /// Copies `buf.len()` bytes out of user memory starting at `ptr`,
    /// backing `read`'s user-facing buffer copy.
    fn copy_in_bytes(&self, ptr: UserAddr, buf: &mut [u8]) -> Result<(), isize>;

    /// Copies `buf` into user memory starting at `ptr`, backing
    /// `write`'s user-facing buffer copy.
    fn copy_out_bytes(&mut self, ptr: UserAddr, buf: &[u8]) -> Result<(), isize>;

    /// Reads one word (`WORD_SIZE` bytes, little-endian) from user memory.
    fn copy_in_word(&self, ptr: UserAddr) -> Result<usize, isize>;

    /// Writes one word at an arbitrary user address, without adjusting
    /// any stack pointer (used to write back `waitpid`'s status word).
    fn copy_out_word(&mut self, ptr: UserAddr, word: usize) -> Result<(), isize>;

    /// Pushes one word onto the stack at `sp` (i.e. `sp -= WORD_SIZE`,
    /// then writes), returning the new stack pointer.
    fn push_word(&mut self, sp: UserAddr, word: usize) -> Result<UserAddr, isize>;

    /// Pushes a NUL-terminated copy of `s` onto the stack at `sp`,
    /// returning the address of the first byte of the pushed string
    /// (the new, lower, stack pointer).
    fn copy_out_str(&mut self, sp: UserAddr, s: &str) -> Result<UserAddr, isize>;

    /// Rounds `sp` down to the given alignment (a power of two).
    fn align_down(&self, sp: UserAddr, align: usize) -> UserAddr;
}

/// A condition variable, signalled on process exit and awaited by `wait`.
/// Threading primitives are external per spec §1; this crate only needs
/// the monitor pattern (`wait`/`notify_all`), not thread creation itself.
pub trait CondVar: Default {
    /// Blocks the calling thread until [`CondVar::notify_all`] is called.
    /// Implementations must not suffer a lost wakeup if `notify_all` races
    /// with the start of `wait` (e.g. by pairing with their own internal
    /// "has this already been signalled" flag).
    fn wait(&self);

    /// Wakes every thread currently blocked in [`CondVar::wait`].
    fn notify_all(&self);
}
