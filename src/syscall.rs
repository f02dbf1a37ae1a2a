//! The syscall facade: argument validation and marshaling between raw
//! user-space values and the typed operations in [`crate::process`],
//! [`crate::file`], and [`crate::pid_table`] (spec §4.4/§6).
//!
//! Every function here takes already-decoded trap arguments (the
//! trap/syscall dispatcher itself is out of scope) and returns
//! `Result<_, isize>`, where the error variant is one of the constants
//! in [`crate::errno`]. `fork` and `execv` return owned values instead
//! of a bare integer since they must hand back a whole child process or
//! replace the caller's image; everything else follows the classic
//! "zero or positive result, or an errno" syscall shape.

extern crate alloc;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::config::{
    ARG_MAX, OPEN_MAX, PATH_MAX, PID_MAX, PID_MIN, SEEK_CUR, SEEK_END, SEEK_SET, WNOHANG,
    WUNTRACED,
};
use crate::errno::{E2BIG, EBADF, EFAULT, EINVAL, ESRCH};
use crate::external::{AddressSpace, CondVar, UserAddr};
use crate::file::{OpenFlags, Whence};
use crate::pid_table::Pid;
use crate::process::{Kernel, Process};

/// Rejects a null user pointer or one at/above the address space's
/// user-space ceiling, matching the original `execv.c`'s
/// `(vaddr_t)ptr >= USERSPACETOP` check (spec §7: "`EFAULT` for user
/// pointers above the user-space ceiling or failing copy-in/out").
fn check_user_ptr<AS: AddressSpace>(address_space: &AS, ptr: UserAddr) -> Result<(), isize> {
    if ptr.is_null() || ptr.0 >= address_space.user_ceiling() {
        return Err(EFAULT);
    }
    Ok(())
}

fn whence_from_raw(raw: i32) -> Result<Whence, isize> {
    match raw {
        SEEK_SET => Ok(Whence::Set),
        SEEK_CUR => Ok(Whence::Cur),
        SEEK_END => Ok(Whence::End),
        _ => Err(EINVAL),
    }
}

/// `open(path, flags, mode)`.
pub fn sys_open<C: CondVar, AS: AddressSpace>(
    kernel: &Kernel<C>,
    proc: &mut Process<AS>,
    path_ptr: UserAddr,
    raw_flags: u32,
    mode: u32,
) -> Result<isize, isize> {
    if path_ptr.is_null() {
        return Err(EFAULT);
    }
    let path = proc.address_space.copy_in_str(path_ptr, PATH_MAX)?;
    let flags = OpenFlags::from_bits(raw_flags).ok_or(EINVAL)?;
    let vnode = kernel.vfs.open(&path, flags, mode)?;
    let open_idx = kernel.open_files.open(vnode, flags)?;
    match proc.fd_table.open(open_idx) {
        Some(fd) => Ok(fd as isize),
        None => {
            let _ = kernel.open_files.close(open_idx);
            Err(crate::errno::EMFILE)
        }
    }
}

/// `read(fd, buf, len)`.
pub fn sys_read<C: CondVar, AS: AddressSpace>(
    kernel: &Kernel<C>,
    proc: &mut Process<AS>,
    fd: i32,
    buf_ptr: UserAddr,
    len: usize,
) -> Result<isize, isize> {
    if len > 0 && buf_ptr.is_null() {
        return Err(EFAULT);
    }
    let open_idx = proc.fd_table.get(fd)?;
    let mut buf = vec![0u8; len];
    let n = kernel.open_files.read(open_idx, &mut buf)?;
    proc.address_space.copy_out_bytes(buf_ptr, &buf[..n])?;
    Ok(n as isize)
}

/// `write(fd, buf, len)`.
pub fn sys_write<C: CondVar, AS: AddressSpace>(
    kernel: &Kernel<C>,
    proc: &mut Process<AS>,
    fd: i32,
    buf_ptr: UserAddr,
    len: usize,
) -> Result<isize, isize> {
    if len > 0 && buf_ptr.is_null() {
        return Err(EFAULT);
    }
    let open_idx = proc.fd_table.get(fd)?;
    let mut buf = vec![0u8; len];
    proc.address_space.copy_in_bytes(buf_ptr, &mut buf)?;
    let n = kernel.open_files.write(open_idx, &buf)?;
    Ok(n as isize)
}

/// `close(fd)`.
pub fn sys_close<C: CondVar, AS: AddressSpace>(
    kernel: &Kernel<C>,
    proc: &mut Process<AS>,
    fd: i32,
) -> Result<isize, isize> {
    let open_idx = proc.fd_table.close(fd)?;
    kernel.open_files.close(open_idx)?;
    Ok(0)
}

/// `lseek(fd, pos, whence)`.
pub fn sys_lseek<C: CondVar, AS: AddressSpace>(
    kernel: &Kernel<C>,
    proc: &Process<AS>,
    fd: i32,
    pos: i64,
    raw_whence: i32,
) -> Result<i64, isize> {
    let open_idx = proc.fd_table.get(fd)?;
    let whence = whence_from_raw(raw_whence)?;
    kernel.open_files.lseek(open_idx, pos, whence)
}

/// `dup2(oldfd, newfd)`.
///
/// Both descriptors are range-checked, and the `oldfd == newfd`
/// short-circuit taken, before either table or any refcount is touched —
/// so an out-of-range `newfd` can never leave `oldfd`'s open-file entry
/// with a dangling extra reference. Only past that point does the
/// original ordering apply: the referenced open file's refcount is
/// bumped, and any file already at `newfd` is closed there, both before
/// `newfd`'s descriptor entry itself is overwritten.
pub fn sys_dup2<C: CondVar, AS: AddressSpace>(
    kernel: &Kernel<C>,
    proc: &mut Process<AS>,
    oldfd: i32,
    newfd: i32,
) -> Result<isize, isize> {
    if oldfd < 0 || oldfd as usize >= OPEN_MAX || newfd < 0 || newfd as usize >= OPEN_MAX {
        return Err(EBADF);
    }
    if oldfd == newfd {
        return Ok(newfd as isize);
    }
    let old_idx = proc.fd_table.get(oldfd)?;
    let existing_idx = proc.fd_table.get(newfd).ok();
    kernel.open_files.dup2_onto(old_idx, existing_idx)?;
    proc.fd_table.dup2(newfd, old_idx)?;
    Ok(newfd as isize)
}

/// `fork()`. Returns the child's full kernel-side state; the embedding
/// kernel is responsible for scheduling it on a new thread.
pub fn sys_fork<C: CondVar, AS: AddressSpace>(
    kernel: &Kernel<C>,
    parent: &Process<AS>,
) -> Result<Process<AS>, isize> {
    kernel.fork(parent)
}

fn read_argv<AS: AddressSpace>(
    address_space: &AS,
    argv_ptr: UserAddr,
) -> Result<Vec<String>, isize> {
    let mut args = Vec::new();
    let mut total_len = 0usize;
    let mut cursor = argv_ptr;
    loop {
        check_user_ptr(address_space, cursor)?;
        let entry = address_space.copy_in_word(cursor)?;
        if entry == 0 {
            break;
        }
        check_user_ptr(address_space, UserAddr(entry))?;
        let arg = address_space.copy_in_str(UserAddr(entry), PATH_MAX)?;
        total_len += arg.len() + 1;
        if total_len > ARG_MAX {
            return Err(E2BIG);
        }
        args.push(arg);
        cursor = UserAddr(cursor.0 + crate::config::WORD_SIZE);
    }
    Ok(args)
}

/// `execv(progname, argv)`. Replaces `proc`'s image in place.
pub fn sys_execv<C: CondVar, AS: AddressSpace>(
    kernel: &Kernel<C>,
    proc: &mut Process<AS>,
    progname_ptr: UserAddr,
    argv_ptr: UserAddr,
) -> Result<(), isize> {
    check_user_ptr(&proc.address_space, progname_ptr)?;
    let progname = proc.address_space.copy_in_str(progname_ptr, PATH_MAX)?;
    let args = read_argv(&proc.address_space, argv_ptr)?;
    kernel.exec(proc, &progname, &args)
}

/// `_exit(status)`. Consumes `proc`: there is no returning from this call.
pub fn sys_exit<C: CondVar, AS: AddressSpace>(
    kernel: &Kernel<C>,
    proc: Process<AS>,
    status: i32,
) -> Result<(), isize> {
    kernel.exit(proc, status)
}

/// `waitpid(pid, status, options)`. Only a concrete positive child PID
/// is accepted; `WNOHANG` is accepted (so callers compile unmodified)
/// but ignored, so this always blocks until the child exits.
pub fn sys_waitpid<C: CondVar, AS: AddressSpace>(
    kernel: &Kernel<C>,
    proc: &mut Process<AS>,
    target_pid: i32,
    status_ptr: UserAddr,
    options: i32,
) -> Result<i32, isize> {
    if target_pid < PID_MIN as i32 || target_pid > PID_MAX as i32 {
        return Err(ESRCH);
    }
    if options & !(WUNTRACED | WNOHANG) != 0 {
        return Err(EINVAL);
    }
    let status = kernel.waitpid(Pid(target_pid as u32), proc.pid)?;
    if !status_ptr.is_null() {
        proc.address_space.copy_out_word(status_ptr, status as usize)?;
    }
    Ok(status)
}

/// `getpid()`. Cannot fail.
pub fn sys_getpid<AS: AddressSpace>(proc: &Process<AS>) -> isize {
    proc.pid.0 as isize
}
