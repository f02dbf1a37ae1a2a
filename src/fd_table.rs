//! Per-process descriptor table: small integers mapping to slots in the
//! system-wide [`crate::file::OpenFileTable`] (spec §4.3).

use crate::config::{FILE_CLOSED, OPEN_MAX};
use crate::errno::EBADF;

/// A process's file-descriptor table: `OPEN_MAX` slots, each either
/// `FILE_CLOSED` or the index of an entry in the open-file table.
#[derive(Debug, Clone, Copy)]
pub struct FdTable {
    entries: [i32; OPEN_MAX],
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FdTable {
    /// Creates a table with every descriptor closed.
    pub fn new() -> Self {
        Self {
            entries: [FILE_CLOSED; OPEN_MAX],
        }
    }

    /// Installs `open_idx` in the lowest-numbered closed descriptor, or
    /// `None` if every descriptor is in use (the caller maps this to
    /// `EMFILE` and must free the open-file-table slot it allocated).
    pub fn open(&mut self, open_idx: usize) -> Option<usize> {
        let slot = self.entries.iter().position(|&e| e == FILE_CLOSED)?;
        self.entries[slot] = open_idx as i32;
        Some(slot)
    }

    /// Looks up the open-file-table index a descriptor names.
    pub fn get(&self, fd: i32) -> Result<usize, isize> {
        let fd = usize::try_from(fd).map_err(|_| EBADF)?;
        let slot = self.entries.get(fd).copied().ok_or(EBADF)?;
        if slot == FILE_CLOSED {
            return Err(EBADF);
        }
        Ok(slot as usize)
    }

    /// Clears a descriptor, returning the open-file-table index it named
    /// so the caller can drop its reference there.
    pub fn close(&mut self, fd: i32) -> Result<usize, isize> {
        let idx = self.get(fd)?;
        self.entries[fd as usize] = FILE_CLOSED;
        Ok(idx)
    }

    /// Points `newfd` at `open_idx`, returning the open-file-table index
    /// `newfd` previously named, if any (the caller must close it there).
    pub fn dup2(&mut self, newfd: i32, open_idx: usize) -> Result<Option<usize>, isize> {
        let newfd = usize::try_from(newfd).map_err(|_| EBADF)?;
        let slot = self.entries.get_mut(newfd).ok_or(EBADF)?;
        let previous = if *slot == FILE_CLOSED {
            None
        } else {
            Some(*slot as usize)
        };
        *slot = open_idx as i32;
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_is_all_closed() {
        let table = FdTable::new();
        assert_eq!(table.get(0), Err(EBADF));
    }

    #[test]
    fn open_allocates_lowest_closed_slot() {
        let mut table = FdTable::new();
        assert_eq!(table.open(10), Some(0));
        assert_eq!(table.open(11), Some(1));
        assert_eq!(table.get(0), Ok(10));
        assert_eq!(table.get(1), Ok(11));
    }

    #[test]
    fn open_reuses_closed_slot() {
        let mut table = FdTable::new();
        let fd = table.open(5).unwrap();
        table.close(fd as i32).unwrap();
        assert_eq!(table.open(6), Some(fd));
    }

    #[test]
    fn close_unopened_fd_is_ebadf() {
        let mut table = FdTable::new();
        assert_eq!(table.close(3), Err(EBADF));
    }

    #[test]
    fn negative_fd_is_ebadf() {
        let table = FdTable::new();
        assert_eq!(table.get(-1), Err(EBADF));
    }

    #[test]
    fn out_of_range_fd_is_ebadf() {
        let table = FdTable::new();
        assert_eq!(table.get(OPEN_MAX as i32), Err(EBADF));
    }

    #[test]
    fn dup2_points_newfd_at_existing_entry_and_reports_previous() {
        let mut table = FdTable::new();
        let a = table.open(1).unwrap();
        let b = table.open(2).unwrap();
        let previous = table.dup2(b as i32, table.get(a as i32).unwrap()).unwrap();
        assert_eq!(previous, Some(2));
        assert_eq!(table.get(b as i32), Ok(1));
    }
}
