//! System-V shared-memory gateway. The core never creates a segment — it
//! only attaches an identifier the driver already created, bounds-checks
//! against the segment's real size, and detaches.

use crate::error::ShmError;
use std::ffi::c_void;
use std::ptr;

/// An attached System-V shm segment. `Drop` detaches it.
pub struct ShmSegment {
    base: *mut c_void,
    size: usize,
}

unsafe impl Send for ShmSegment {}

impl ShmSegment {
    pub fn attach_ro(shm_id: i32) -> Result<ShmSegment, ShmError> {
        Self::attach(shm_id, libc::SHM_RDONLY)
    }

    pub fn attach_rw(shm_id: i32) -> Result<ShmSegment, ShmError> {
        Self::attach(shm_id, 0)
    }

    fn attach(shm_id: i32, shmflg: i32) -> Result<ShmSegment, ShmError> {
        let base = unsafe { libc::shmat(shm_id, ptr::null(), shmflg) };
        if base as isize == -1 {
            return Err(ShmError::Attach(std::io::Error::last_os_error()));
        }
        let mut stat: libc::shmid_ds = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::shmctl(shm_id, libc::IPC_STAT, &mut stat) };
        if rc == -1 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::shmdt(base) };
            return Err(ShmError::Stat(err));
        }
        Ok(ShmSegment {
            base,
            size: stat.shm_segsz as usize,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Reads up to `max = size - offset` bytes starting at `offset`. If
    /// `stop_on_nul`, stops at (and includes) the first zero byte.
    pub fn copy_from(&self, offset: usize, max: usize, stop_on_nul: bool) -> Box<[u8]> {
        let available = self.size.saturating_sub(offset);
        let len = max.min(available);
        let src = unsafe { std::slice::from_raw_parts((self.base as *const u8).add(offset), len) };
        let len = if stop_on_nul {
            src.iter().position(|&b| b == 0).map(|p| p + 1).unwrap_or(len)
        } else {
            len
        };
        src[..len].to_vec().into_boxed_slice()
    }

    /// Bounded copy into the segment. Fails with `OutOfBounds` if
    /// `src.len() > size - offset`.
    pub fn copy_to(&mut self, offset: usize, src: &[u8]) -> Result<(), ShmError> {
        let available = self.size.saturating_sub(offset);
        if src.len() > available {
            return Err(ShmError::OutOfBounds {
                offset,
                requested: src.len(),
                size: self.size,
            });
        }
        let dst = unsafe { std::slice::from_raw_parts_mut((self.base as *mut u8).add(offset), src.len()) };
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        unsafe {
            libc::shmdt(self.base);
        }
    }
}
