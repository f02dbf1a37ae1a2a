//! Process lifecycle: `fork`, `execv`'s argument layout, `exit`, and the
//! owning [`Kernel`] context that ties the PID table, open-file table,
//! and VFS together (spec §4.4 and §9's "kernel context, not ambient
//! globals" guidance).

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::config::{ARG_MAX, CONSOLE_PATH, WORD_SIZE};
use crate::errno::{E2BIG, ENOEXEC};
use crate::external::{AddressSpace, CondVar, UserAddr, Vfs};
use crate::fd_table::FdTable;
use crate::file::{OpenFileTable, OpenFlags};
use crate::pid_table::{Pid, PidTable};
use crate::{kdebug, kinfo};

/// A process's kernel-side state: its name, PID, parent PID, address
/// space, and descriptor table. Everything that survives a successful
/// `execv` in place (the PID, the parent) plus everything it replaces
/// (name, address space, stdio).
pub struct Process<AS: AddressSpace> {
    /// The program name last loaded into this process, for diagnostics
    /// (`ps`-style listings in the embedding kernel). Set at boot/fork
    /// and overwritten by a successful `execv`.
    pub name: String,
    /// This process's own PID.
    pub pid: Pid,
    /// The PID of the process that created this one via `fork`, or
    /// [`PidTable::boot_pid`] for the boot process. Kept alongside the
    /// `PidTable`'s own copy (which is authoritative for `waitpid`) so a
    /// process can report its own parentage without a table lookup.
    pub parent_pid: Pid,
    /// This process's address space.
    pub address_space: AS,
    /// This process's descriptor table.
    pub fd_table: FdTable,
}

/// The shared state every process's syscalls operate against: the PID
/// table, the system-wide open-file table, and the VFS. Owned by the
/// embedding kernel and passed by reference, never reached via a global.
pub struct Kernel<C: CondVar> {
    /// Process identifiers and parent/child/exit-status bookkeeping.
    pub pids: PidTable<C>,
    /// System-wide open-file descriptions.
    pub open_files: OpenFileTable,
    /// The virtual file system `open` resolves paths through.
    pub vfs: Arc<dyn Vfs>,
}

impl<C: CondVar> Kernel<C> {
    /// Creates a kernel context backed by `vfs`.
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self {
            pids: PidTable::new(),
            open_files: OpenFileTable::new(),
            vfs,
        }
    }

    /// Boots the first process: allocates its PID under the boot
    /// process, creates a fresh address space, and wires its stdio to
    /// the console.
    pub fn boot_process<AS: AddressSpace>(&self) -> Result<Process<AS>, isize> {
        let parent_pid = PidTable::<C>::boot_pid();
        let pid = self.pids.create(parent_pid)?;
        let mut fd_table = FdTable::new();
        self.init_stdio(&mut fd_table)?;
        kinfo!("boot process {} created", pid.0);
        Ok(Process {
            name: String::from("boot"),
            pid,
            parent_pid,
            address_space: AS::create(),
            fd_table,
        })
    }

    /// Opens the console three times — stdin `O_RDONLY`, stdout and
    /// stderr `O_WRONLY` — each into its own open-file entry, matching
    /// the original `file_table_init`'s three separate `file_open` calls
    /// rather than one shared `O_RDWR` entry aliased by all three
    /// descriptors. The table is empty when this is called (fresh boot,
    /// or fresh post-`execv` table), so first-fit descriptor allocation
    /// lands them in fds 0, 1, 2 in this order.
    fn init_stdio(&self, fd_table: &mut FdTable) -> Result<(), isize> {
        for flags in [OpenFlags::RDONLY, OpenFlags::WRONLY, OpenFlags::WRONLY] {
            let vnode = self.vfs.open(CONSOLE_PATH, flags, 0)?;
            let open_idx = self.open_files.open(vnode, flags)?;
            fd_table.open(open_idx).ok_or(crate::errno::EMFILE)?;
        }
        Ok(())
    }

    /// Duplicates `parent` into a new child process: a fresh PID, a
    /// copy of the address space, and a descriptor table whose entries
    /// reference the *same* open-file-table slots as the parent's, with
    /// refcounts bumped accordingly.
    ///
    /// The original kernel this was distilled from copies the
    /// descriptor table byte-for-byte without bumping the referenced
    /// open file's refcount — a bug that would let the child's `close`
    /// free a slot the parent still uses. This implementation bumps the
    /// refcount once per non-closed descriptor instead.
    pub fn fork<AS: AddressSpace>(&self, parent: &Process<AS>) -> Result<Process<AS>, isize> {
        let child_pid = self.pids.create(parent.pid)?;
        let address_space = parent.address_space.fork()?;
        let mut fd_table = parent.fd_table;
        for fd in 0..crate::config::OPEN_MAX as i32 {
            if let Ok(open_idx) = fd_table.get(fd) {
                self.open_files.bump_refcount(open_idx);
            }
        }
        kinfo!("pid {} forked from {}", child_pid.0, parent.pid.0);
        Ok(Process {
            name: parent.name.clone(),
            pid: child_pid,
            parent_pid: parent.pid,
            address_space,
            fd_table,
        })
    }

    /// Records `proc`'s exit status and wakes any waiter. Consumes
    /// `proc` by value: Rust's ownership model drops its address space
    /// and descriptor references automatically, with no manual
    /// teardown chain required for the open-file refcounts each
    /// descriptor holds to be released — those are *not* decremented
    /// here, matching the subsystem's documented exit invariant: a
    /// zombie's open files are also not closed until its fd table is
    /// actually torn down by the embedding kernel's process-destroy
    /// path, which is out of scope for this crate.
    pub fn exit<AS: AddressSpace>(&self, proc: Process<AS>, status: i32) -> Result<(), isize> {
        self.pids.exit(proc.pid, status)
    }

    /// Blocks the caller until `target` exits, then reaps it and
    /// returns its exit status.
    pub fn waitpid(&self, target: Pid, caller: Pid) -> Result<i32, isize> {
        self.pids.wait(target, caller)
    }

    /// Replaces `proc`'s address space and stdio with a freshly loaded
    /// program image, leaving its PID and the rest of its descriptor
    /// table untouched. Builds the new process's initial stack exactly
    /// as described by the argv-on-stack layout this crate's `execv`
    /// implements: copy `argv` into kernel memory first (so a later
    /// failure can't corrupt the caller), reject it outright if it's
    /// empty or would exceed `ARG_MAX`, load the ELF image, reset
    /// stdio against the console, then lay out argv on the new stack.
    pub fn exec<AS: AddressSpace>(
        &self,
        proc: &mut Process<AS>,
        progname: &str,
        args: &[String],
    ) -> Result<(), isize> {
        if progname.is_empty() {
            return Err(ENOEXEC);
        }
        let total_len: usize = args.iter().map(|a| a.len() + 1).sum();
        if total_len > ARG_MAX {
            return Err(E2BIG);
        }

        let vnode = self.vfs.open(progname, OpenFlags::RDONLY, 0)?;
        let mut address_space = AS::create();
        let entry = address_space.load_elf(&*vnode)?;
        let mut stack_ptr = address_space.define_stack()?;

        let mut fd_table = FdTable::new();
        self.init_stdio(&mut fd_table)?;

        let argv_addrs = layout_argv(&mut address_space, &mut stack_ptr, args)?;

        proc.address_space = address_space;
        proc.fd_table = fd_table;
        proc.name = String::from(progname);
        kinfo!("pid {} exec'd {}", proc.pid.0, progname);
        kdebug!("entry {:#x}, argc {}", entry.0, argv_addrs.len());
        Ok(())
    }
}

/// Lays out `args` on the user stack at `*stack_ptr`, following the
/// same algorithm as the kernel's own `execv`: push every string in
/// reverse order (so they end up in forward order in memory), align the
/// resulting pointer down to a word boundary, then push the pointer
/// array itself — also in reverse, plus a trailing NULL terminator word
/// pushed first — so that `*stack_ptr + WORD_SIZE` is the address of
/// `argv[0]`. Returns the pushed `argv` pointer array's addresses (not
/// including the NULL terminator) in forward order.
fn layout_argv<AS: AddressSpace>(
    address_space: &mut AS,
    stack_ptr: &mut UserAddr,
    args: &[String],
) -> Result<Vec<UserAddr>, isize> {
    let mut sp = *stack_ptr;

    let mut string_addrs = Vec::with_capacity(args.len());
    for arg in args.iter().rev() {
        sp = address_space.copy_out_str(sp, arg)?;
        string_addrs.push(sp);
    }
    string_addrs.reverse();

    sp = address_space.align_down(sp, WORD_SIZE);

    // NULL terminator word is pushed first, so it ends up as the last
    // (highest-addressed) entry of the argv array.
    sp = address_space.push_word(sp, 0)?;

    for &addr in string_addrs.iter().rev() {
        sp = address_space.push_word(sp, addr.0)?;
    }

    *stack_ptr = sp;
    Ok(string_addrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{InMemoryVfs, StdCondVar, TestAddressSpace};

    fn make_kernel() -> (Kernel<StdCondVar>, Arc<InMemoryVfs>) {
        let vfs = Arc::new(InMemoryVfs::new());
        (Kernel::new(vfs.clone()), vfs)
    }

    #[test]
    fn boot_process_has_stdio_wired() {
        let (kernel, _vfs) = make_kernel();
        let boot: Process<TestAddressSpace> = kernel.boot_process().unwrap();
        for fd in 0..3 {
            assert!(boot.fd_table.get(fd).is_ok());
        }
    }

    #[test]
    fn fork_inherits_name_and_records_parent_pid() {
        let (kernel, _vfs) = make_kernel();
        let parent: Process<TestAddressSpace> = kernel.boot_process().unwrap();
        let child = kernel.fork(&parent).unwrap();
        assert_eq!(child.name, parent.name);
        assert_eq!(child.parent_pid, parent.pid);
    }

    #[test]
    fn fork_shares_open_file_entry_with_parent() {
        let (kernel, vfs) = make_kernel();
        vfs.create_regular("testfile");
        let vnode = kernel.vfs.open("testfile", OpenFlags::RDWR, 0).unwrap();
        let open_idx = kernel.open_files.open(vnode, OpenFlags::RDWR).unwrap();

        let mut parent: Process<TestAddressSpace> = kernel.boot_process().unwrap();
        let fd = parent.fd_table.open(open_idx).unwrap() as i32;

        let child = kernel.fork(&parent).unwrap();
        assert_ne!(child.pid, parent.pid);
        assert_eq!(child.fd_table.get(fd), parent.fd_table.get(fd));

        // Closing the child's reference must not invalidate the
        // parent's: the fork refcount bump keeps the slot alive.
        let mut child_fd_table = child.fd_table;
        child_fd_table.close(fd).unwrap();
        kernel.open_files.close(open_idx).unwrap();
        assert_eq!(kernel.open_files.write(open_idx, b"hi").unwrap(), 2);
    }

    #[test]
    fn exit_then_waitpid_returns_status() {
        let (kernel, _vfs) = make_kernel();
        let boot: Process<TestAddressSpace> = kernel.boot_process().unwrap();
        let child = kernel.fork(&boot).unwrap();
        let child_pid = child.pid;
        kernel.exit(child, 5).unwrap();
        assert_eq!(kernel.waitpid(child_pid, boot.pid), Ok(5));
    }

    #[test]
    fn waitpid_on_non_child_is_echild() {
        let (kernel, _vfs) = make_kernel();
        let boot: Process<TestAddressSpace> = kernel.boot_process().unwrap();
        let a = kernel.fork(&boot).unwrap();
        let b = kernel.fork(&boot).unwrap();
        assert_eq!(kernel.waitpid(a.pid, b.pid), Err(crate::errno::ECHILD));
    }

    #[test]
    fn exec_resets_stdio_and_rejects_empty_progname() {
        let (kernel, _vfs) = make_kernel();
        let mut proc: Process<TestAddressSpace> = kernel.boot_process().unwrap();
        assert_eq!(kernel.exec(&mut proc, "", &[]), Err(ENOEXEC));
    }

    #[test]
    fn exec_argv_total_len_over_arg_max_is_e2big() {
        let (kernel, vfs) = make_kernel();
        vfs.create_regular("prog");
        let mut proc: Process<TestAddressSpace> = kernel.boot_process().unwrap();
        let huge = String::from("x").repeat(ARG_MAX);
        assert_eq!(kernel.exec(&mut proc, "prog", &[huge]), Err(E2BIG));
    }

    #[test]
    fn exec_lays_out_argv_pointer_array_adjacent_to_stack_pointer() {
        let (kernel, vfs) = make_kernel();
        vfs.create_regular("prog");
        let mut proc: Process<TestAddressSpace> = kernel.boot_process().unwrap();
        let args = alloc::vec![String::from("prog"), String::from("-x")];
        kernel.exec(&mut proc, "prog", &args).unwrap();
        assert_eq!(proc.name, "prog");

        let sp = proc.address_space.stack_pointer();
        let argv_ptr = UserAddr(sp.0 + WORD_SIZE);
        let argv0 = proc.address_space.copy_in_word(argv_ptr).unwrap();
        let s = proc
            .address_space
            .copy_in_str(UserAddr(argv0), crate::config::PATH_MAX)
            .unwrap();
        assert_eq!(s, "prog");
    }
}
