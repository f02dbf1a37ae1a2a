//! Central table of size limits and sentinel values.
//!
//! Every other module pulls its magic numbers from here rather than
//! inlining them, matching the original `kern/include/limits.h` /
//! `kern/include/kern/limits.h` split of "one file owns the numbers".

/// Maximum number of simultaneously open file-table entries, per process
/// and system-wide. Must be at least 64 per the external interface table.
pub const OPEN_MAX: usize = 64;

/// Maximum length of a path string, including the terminating NUL.
pub const PATH_MAX: usize = 1024;

/// Maximum combined length (bytes, including NUL terminators) of an
/// `execv` argument vector.
pub const ARG_MAX: usize = 64 * 1024;

/// Lowest allocatable PID. PID 0 and `PID_BOOT` (1) are reserved.
pub const PID_MIN: u32 = 2;

/// `PID_MIN`'s PID is the boot/first process, created before any `fork`.
pub const PID_BOOT: u32 = 1;

/// Highest allocatable PID.
pub const PID_MAX: u32 = 128;

/// Sentinel parent PID meaning "no parent" (the boot process, or a slot
/// that has already been reaped). Kept as the same magic value the
/// original `kern/include/pid.h` uses so a PID can never collide with it:
/// it is far outside `[PID_MIN, PID_MAX]`.
pub const PID_INVALID: u32 = 0xcafe_babe;

/// Sentinel stored in an [`crate::fd_table::FdTable`] slot that has no
/// open file.
pub const FILE_CLOSED: i32 = -1;

/// Width in bytes of a user-space pointer/word as pushed onto the stack
/// during `execv`'s argv layout. The original source targets a 32-bit
/// (MIPS-like) user ABI; this crate keeps that word size for fidelity to
/// the documented stack layout, independent of the host's pointer width.
pub const WORD_SIZE: usize = 4;

/// Console pseudo-device path used to back stdin/stdout/stderr, both at
/// boot and on every `execv` (see spec §4.3's stdio setup and §9's note
/// that `execv` always reinitializes stdio against this literal path).
pub const CONSOLE_PATH: &str = "con:";

/// `lseek` whence: position is absolute.
pub const SEEK_SET: i32 = 0;
/// `lseek` whence: position is relative to the current offset.
pub const SEEK_CUR: i32 = 1;
/// `lseek` whence: position is relative to end-of-file.
pub const SEEK_END: i32 = 2;

/// `waitpid` option: would-be job-control flag, accepted but ignored
/// (spec §1 Non-goals: no job control).
pub const WUNTRACED: i32 = 2;
/// `waitpid` option: non-blocking wait, accepted but ignored (spec §5:
/// "the non-blocking wait is *not* implemented").
pub const WNOHANG: i32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_max_meets_minimum() {
        assert!(OPEN_MAX >= 64);
    }

    #[test]
    fn pid_range_excludes_invalid_and_boot() {
        assert!(PID_MIN > PID_BOOT);
        assert!(PID_MAX >= PID_MIN);
        assert!(!(PID_MIN..=PID_MAX).contains(&PID_INVALID));
        assert!(!(PID_MIN..=PID_MAX).contains(&PID_BOOT));
    }

    #[test]
    fn seek_whence_values_distinct() {
        let values = [SEEK_SET, SEEK_CUR, SEEK_END];
        for (i, a) in values.iter().enumerate() {
            for (j, b) in values.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }

    #[test]
    fn file_closed_is_negative() {
        assert!(FILE_CLOSED < 0);
    }
}
