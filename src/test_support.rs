//! In-memory implementations of every trait in [`crate::external`], used
//! only by this crate's own test suite to exercise the process/file
//! subsystem without a real kernel underneath it.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use std::sync::{Condvar, Mutex};

use crate::errno::{EFAULT, ENOENT};
use crate::external::{AddressSpace, CondVar as CondVarTrait, UserAddr, Vfs, Vnode};
use crate::file::OpenFlags;
use crate::sync::SpinLock;

/// A plain in-memory file: a growable byte buffer behind a lock.
pub struct RegularFileVnode {
    data: SpinLock<Vec<u8>>,
}

impl Default for RegularFileVnode {
    fn default() -> Self {
        Self::new()
    }
}

impl RegularFileVnode {
    /// Creates an empty file.
    pub fn new() -> Self {
        Self {
            data: SpinLock::new(Vec::new()),
        }
    }
}

impl Vnode for RegularFileVnode {
    fn read(&self, offset: i64, buf: &mut [u8]) -> Result<usize, isize> {
        let data = self.data.lock();
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = core::cmp::min(buf.len(), data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn write(&self, offset: i64, buf: &[u8]) -> Result<usize, isize> {
        let mut data = self.data.lock();
        let offset = offset as usize;
        if data.len() < offset + buf.len() {
            data.resize(offset + buf.len(), 0);
        }
        data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn size(&self) -> Result<i64, isize> {
        Ok(self.data.lock().len() as i64)
    }
}

/// A console device: writes are discarded, reads always report
/// end-of-file, and it is not seekable — matching the boot/exec stdio
/// target's expected shape.
pub struct ConsoleVnode;

impl Vnode for ConsoleVnode {
    fn read(&self, _offset: i64, _buf: &mut [u8]) -> Result<usize, isize> {
        Ok(0)
    }

    fn write(&self, _offset: i64, buf: &[u8]) -> Result<usize, isize> {
        Ok(buf.len())
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn size(&self) -> Result<i64, isize> {
        Ok(0)
    }
}

enum Entry {
    Console,
    Regular(Arc<RegularFileVnode>),
}

/// An in-memory virtual file system: a path-to-vnode map, pre-populated
/// with the console device, plus [`InMemoryVfs::create_regular`] for
/// tests to register additional files before `open`ing them.
pub struct InMemoryVfs {
    entries: SpinLock<BTreeMap<String, Entry>>,
}

impl Default for InMemoryVfs {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVfs {
    /// Creates a filesystem containing only the console device.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(String::from(crate::config::CONSOLE_PATH), Entry::Console);
        Self {
            entries: SpinLock::new(entries),
        }
    }

    /// Registers an empty regular file at `path`.
    pub fn create_regular(&self, path: &str) {
        self.entries
            .lock()
            .insert(String::from(path), Entry::Regular(Arc::new(RegularFileVnode::new())));
    }
}

impl Vfs for InMemoryVfs {
    fn open(&self, path: &str, _flags: OpenFlags, _mode: u32) -> Result<Arc<dyn Vnode>, isize> {
        match self.entries.lock().get(path) {
            Some(Entry::Console) => Ok(Arc::new(ConsoleVnode)),
            Some(Entry::Regular(v)) => Ok(v.clone() as Arc<dyn Vnode>),
            None => Err(ENOENT),
        }
    }
}

/// A condition variable backed by a `std::sync::Condvar`, with an
/// internal "already signaled" flag so a `notify_all` that races ahead
/// of `wait` is not lost.
pub struct StdCondVar {
    state: Mutex<bool>,
    condvar: Condvar,
}

impl Default for StdCondVar {
    fn default() -> Self {
        Self {
            state: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }
}

impl CondVarTrait for StdCondVar {
    fn wait(&self) {
        let mut signaled = self.state.lock().unwrap();
        while !*signaled {
            signaled = self.condvar.wait(signaled).unwrap();
        }
    }

    fn notify_all(&self) {
        *self.state.lock().unwrap() = true;
        self.condvar.notify_all();
    }
}

const TEST_MEMORY_SIZE: usize = 0x10000;

/// A flat, `Vec<u8>`-backed address space: addresses are plain offsets
/// into one contiguous buffer. The stack grows down from the top of
/// memory; [`TestAddressSpace::stack_pointer`] exposes the current
/// top-of-stack for tests to inspect after `execv`'s layout.
pub struct TestAddressSpace {
    memory: Vec<u8>,
    stack_ptr: usize,
}

impl TestAddressSpace {
    /// The current stack pointer, for tests to inspect after a stack
    /// push sequence (e.g. `execv`'s argv layout).
    pub fn stack_pointer(&self) -> UserAddr {
        UserAddr(self.stack_ptr)
    }

    fn check_bounds(&self, ptr: usize, len: usize) -> Result<(), isize> {
        if ptr.checked_add(len).is_none_or(|end| end > self.memory.len()) {
            return Err(EFAULT);
        }
        Ok(())
    }
}

impl AddressSpace for TestAddressSpace {
    fn create() -> Self {
        Self {
            memory: alloc::vec![0u8; TEST_MEMORY_SIZE],
            stack_ptr: TEST_MEMORY_SIZE,
        }
    }

    fn fork(&self) -> Result<Self, isize> {
        Ok(Self {
            memory: self.memory.clone(),
            stack_ptr: self.stack_ptr,
        })
    }

    fn load_elf(&mut self, _vnode: &dyn Vnode) -> Result<UserAddr, isize> {
        Ok(UserAddr(0x1000))
    }

    fn define_stack(&mut self) -> Result<UserAddr, isize> {
        self.stack_ptr = TEST_MEMORY_SIZE;
        Ok(UserAddr(self.stack_ptr))
    }

    fn user_ceiling(&self) -> usize {
        self.memory.len()
    }

    fn copy_in_str(&self, ptr: UserAddr, max_len: usize) -> Result<String, isize> {
        if ptr.is_null() {
            return Err(EFAULT);
        }
        let start = ptr.0;
        self.check_bounds(start, 0)?;
        let end = core::cmp::min(start + max_len, self.memory.len());
        let nul = self.memory[start..end]
            .iter()
            .position(|&b| b == 0)
            .map(|i| start + i)
            .unwrap_or(end);
        String::from_utf8(self.memory[start..nul].to_vec()).map_err(|_| EFAULT)
    }

    fn copy_in_bytes(&self, ptr: UserAddr, buf: &mut [u8]) -> Result<(), isize> {
        self.check_bounds(ptr.0, buf.len())?;
        buf.copy_from_slice(&self.memory[ptr.0..ptr.0 + buf.len()]);
        Ok(())
    }

    fn copy_out_bytes(&mut self, ptr: UserAddr, buf: &[u8]) -> Result<(), isize> {
        self.check_bounds(ptr.0, buf.len())?;
        self.memory[ptr.0..ptr.0 + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn copy_in_word(&self, ptr: UserAddr) -> Result<usize, isize> {
        self.check_bounds(ptr.0, crate::config::WORD_SIZE)?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.memory[ptr.0..ptr.0 + 4]);
        Ok(u32::from_le_bytes(bytes) as usize)
    }

    fn copy_out_word(&mut self, ptr: UserAddr, word: usize) -> Result<(), isize> {
        self.check_bounds(ptr.0, crate::config::WORD_SIZE)?;
        self.memory[ptr.0..ptr.0 + 4].copy_from_slice(&(word as u32).to_le_bytes());
        Ok(())
    }

    fn push_word(&mut self, sp: UserAddr, word: usize) -> Result<UserAddr, isize> {
        let new_sp = sp.0.checked_sub(crate::config::WORD_SIZE).ok_or(EFAULT)?;
        self.copy_out_word(UserAddr(new_sp), word)?;
        self.stack_ptr = new_sp;
        Ok(UserAddr(new_sp))
    }

    fn copy_out_str(&mut self, sp: UserAddr, s: &str) -> Result<UserAddr, isize> {
        let len = s.len() + 1;
        let new_sp = sp.0.checked_sub(len).ok_or(EFAULT)?;
        self.check_bounds(new_sp, len)?;
        self.memory[new_sp..new_sp + s.len()].copy_from_slice(s.as_bytes());
        self.memory[new_sp + s.len()] = 0;
        self.stack_ptr = new_sp;
        Ok(UserAddr(new_sp))
    }

    fn align_down(&self, sp: UserAddr, align: usize) -> UserAddr {
        UserAddr(sp.0 & !(align - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_file_write_then_read() {
        let vnode = RegularFileVnode::new();
        vnode.write(0, b"abc").unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(vnode.read(0, &mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn in_memory_vfs_resolves_console_and_regular_files() {
        let vfs = InMemoryVfs::new();
        assert!(vfs.open(crate::config::CONSOLE_PATH, OpenFlags::RDWR, 0).is_ok());
        assert_eq!(vfs.open("missing", OpenFlags::RDONLY, 0).unwrap_err(), ENOENT);
        vfs.create_regular("a.txt");
        assert!(vfs.open("a.txt", OpenFlags::RDONLY, 0).is_ok());
    }

    #[test]
    fn address_space_push_and_read_back_word() {
        let mut space = TestAddressSpace::create();
        let sp = space.stack_pointer();
        let new_sp = space.push_word(sp, 0xdead_beef).unwrap();
        assert_eq!(space.copy_in_word(new_sp).unwrap(), 0xdead_beef);
    }

    #[test]
    fn address_space_copy_out_str_then_copy_in_str() {
        let mut space = TestAddressSpace::create();
        let sp = space.stack_pointer();
        let addr = space.copy_out_str(sp, "hello").unwrap();
        assert_eq!(space.copy_in_str(addr, 16).unwrap(), "hello");
    }
}
