//! Memory shared with the supervisor across hypercalls.
//!
//! A hypercall only carries scalars, so everything bigger than a register is
//! exchanged through one page: two u64 header words for range announcements
//! followed by the input buffer.
//!
//! ```text
//! 0        8        16                                   CHANNEL_SZ
//! +--------+--------+------------------------------------+
//! | start  | end    | input buffer                       |
//! +--------+--------+------------------------------------+
//! ```

use nix::{
    libc::c_void,
    sys::mman::{mmap, munmap, MapFlags, ProtFlags},
};
use std::{mem::size_of, ptr, slice};
use thiserror::Error;

/// Total size of the channel.
pub const CHANNEL_SZ: usize = 4096;
/// Size of the range header.
pub const HEADER_SZ: usize = 2 * size_of::<u64>();
/// Size of the input buffer.
pub const BUF_SZ: usize = CHANNEL_SZ - HEADER_SZ;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("mmap: {0}")]
    Mmap(#[from] nix::Error),
}

pub struct WorkChannel {
    base: *mut u8,
}

impl WorkChannel {
    /// Map and zero-fill a fresh channel.
    pub fn map() -> Result<Self, ChannelError> {
        let pg = unsafe {
            mmap(
                ptr::null_mut(),
                CHANNEL_SZ,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS,
                -1,
                0,
            )?
        };
        let base = pg.cast::<u8>();
        // touch all the bits, the supervisor must never see an uncommitted page.
        unsafe { ptr::write_bytes(base, 0, CHANNEL_SZ) };
        Ok(Self { base })
    }

    /// Guest virtual address of the header words.
    pub fn header_addr(&self) -> u64 {
        self.base as u64
    }

    /// Guest virtual address of the input buffer.
    pub fn buf_addr(&self) -> u64 {
        self.buf_ptr() as u64
    }

    pub fn header(&self) -> (u64, u64) {
        let hdr = self.header_ptr();
        unsafe { (ptr::read_volatile(hdr), ptr::read_volatile(hdr.add(1))) }
    }

    pub fn set_header(&mut self, start: u64, end: u64) {
        let hdr = self.header_ptr();
        unsafe {
            ptr::write_volatile(hdr, start);
            ptr::write_volatile(hdr.add(1), end);
        }
    }

    /// The whole input buffer, including bytes not written by the last fetch.
    pub fn buf(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.buf_ptr(), BUF_SZ) }
    }

    pub fn buf_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.buf_ptr(), BUF_SZ) }
    }

    fn header_ptr(&self) -> *mut u64 {
        // page aligned.
        self.base.cast::<u64>()
    }

    fn buf_ptr(&self) -> *mut u8 {
        unsafe { self.base.add(HEADER_SZ) }
    }
}

impl Drop for WorkChannel {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.base.cast::<c_void>(), CHANNEL_SZ) } {
            log::warn!("failed to unmap work channel: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_layout() {
        let ch = WorkChannel::map().unwrap();
        assert_eq!(ch.header_addr() % 4096, 0);
        assert_eq!(ch.buf_addr(), ch.header_addr() + HEADER_SZ as u64);
        assert_eq!(ch.buf().len(), BUF_SZ);
        assert_eq!(HEADER_SZ + BUF_SZ, CHANNEL_SZ);
        assert_eq!(ch.header(), (0, 0));
        assert!(ch.buf().iter().all(|b| *b == 0));
    }

    #[test]
    fn header_isolated_from_buf() {
        let mut ch = WorkChannel::map().unwrap();
        ch.buf_mut().iter_mut().for_each(|b| *b = 0xff);
        ch.set_header(0xffff_ffff_8100_0000, 0xffff_ffff_8200_0000);
        assert_eq!(ch.header(), (0xffff_ffff_8100_0000, 0xffff_ffff_8200_0000));
        assert!(ch.buf().iter().all(|b| *b == 0xff));

        ch.buf_mut().iter_mut().for_each(|b| *b = 0);
        assert_eq!(ch.header(), (0xffff_ffff_8100_0000, 0xffff_ffff_8200_0000));
    }
}
