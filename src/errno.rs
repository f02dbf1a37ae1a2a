//! Classical small-positive-integer errno values (spec §7).
//!
//! Values are named `pub const isize` rather than a Rust `enum`, matching
//! both the syscall ABI (a bare result register holding 0 or a positive
//! error code) and the original `kern/errno.h` numbering. Internal helpers
//! still return `Result<T, isize>` so `?` composes; only the public
//! syscall facade flattens to a bare `isize`.

/// No such process / PID (out-of-range or empty slot).
pub const ESRCH: isize = 3;
/// Allocation failure.
pub const ENOMEM: isize = 12;
/// Bad file descriptor (out of range or closed).
pub const EBADF: isize = 9;
/// User pointer above the user-space ceiling, or a copy in/out failed.
pub const EFAULT: isize = 14;
/// Invalid argument (bad `whence`, bad `waitpid` options, negative seek).
pub const EINVAL: isize = 22;
/// `waitpid` target is not a child of the caller.
pub const ECHILD: isize = 10;
/// `lseek` on a non-seekable vnode.
pub const ESPIPE: isize = 29;
/// `execv` argument vector exceeds `ARG_MAX`.
pub const E2BIG: isize = 7;
/// `execv` program name copied in as the empty string.
pub const ENOEXEC: isize = 8;
/// File descriptor table or open-file table is full.
pub const EMFILE: isize = 24;
/// PID table is full.
pub const ENPROC: isize = 6;

// VFS pass-through errors (already in use by the teacher's own syscall
// error set); surfaced verbatim from `Vnode`/`Vfs` implementations.

/// No such file or directory.
pub const ENOENT: isize = 2;
/// I/O error.
pub const EIO: isize = 5;
/// Permission denied.
pub const EACCES: isize = 13;
/// File exists.
pub const EEXIST: isize = 17;
/// Not a directory.
pub const ENOTDIR: isize = 20;
/// Is a directory.
pub const EISDIR: isize = 21;
/// Function not implemented.
pub const ENOSYS: isize = 38;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_values_nonzero_and_positive() {
        let all = [
            ESRCH, ENOMEM, EBADF, EFAULT, EINVAL, ECHILD, ESPIPE, E2BIG, ENOEXEC, EMFILE, ENPROC,
            ENOENT, EIO, EACCES, EEXIST, ENOTDIR, EISDIR, ENOSYS,
        ];
        for e in all {
            assert!(e > 0);
        }
    }

    #[test]
    fn errno_values_unique() {
        let all = [
            ESRCH, ENOMEM, EBADF, EFAULT, EINVAL, ECHILD, ESPIPE, E2BIG, ENOEXEC, EMFILE, ENPROC,
            ENOENT, EIO, EACCES, EEXIST, ENOTDIR, EISDIR, ENOSYS,
        ];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "errno at index {i} and {j} collide");
                }
            }
        }
    }
}
