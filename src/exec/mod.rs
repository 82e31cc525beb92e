//! Syscall records and their execution against the running kernel.

use nix::{errno::errno, libc};

/// Allow-list of syscalls.
pub mod filter;
/// Record wire format.
pub mod serialize;

/// Number of argument slots of one record.
pub const NR_ARGS: usize = 6;
/// Max number of records in one batch.
pub const BATCH_CAPACITY: usize = 3;

/// One decoded syscall invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyscallRecord {
    nr: u16,
    args: [u64; NR_ARGS],
}

impl SyscallRecord {
    pub const fn new(nr: u16, args: [u64; NR_ARGS]) -> Self {
        Self { nr, args }
    }

    #[inline]
    pub fn nr(&self) -> u16 {
        self.nr
    }

    #[inline]
    pub fn args(&self) -> &[u64; NR_ARGS] {
        &self.args
    }
}

/// Bounded sequence of records, in input order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordBatch {
    records: [SyscallRecord; BATCH_CAPACITY],
    len: usize,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, handing it back if the batch is full.
    pub fn push(&mut self, r: SyscallRecord) -> Result<(), SyscallRecord> {
        if self.len == BATCH_CAPACITY {
            return Err(r);
        }
        self.records[self.len] = r;
        self.len += 1;
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid records only, slots past `len` are never exposed.
    #[inline]
    pub fn as_slice(&self) -> &[SyscallRecord] {
        &self.records[..self.len]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SyscallRecord> {
        self.as_slice().iter()
    }
}

impl<'a> IntoIterator for &'a RecordBatch {
    type Item = &'a SyscallRecord;
    type IntoIter = std::slice::Iter<'a, SyscallRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Execution of an accepted batch.
///
/// Implementations are allowed to take the whole process down: a wild argument
/// reaching the kernel is exactly the signal the supervisor is looking for.
pub trait Dispatch {
    /// Execute all records in order, return the aggregated result.
    fn dispatch(&mut self, batch: &RecordBatch) -> i64;
}

/// Executes records as raw syscalls of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelExecutor;

impl Dispatch for KernelExecutor {
    /// `-errno` of the first failed record, otherwise the result of the last
    /// one. 0 for an empty batch. Records after a failure still run.
    fn dispatch(&mut self, batch: &RecordBatch) -> i64 {
        let mut ret = 0;
        let mut failed = None;
        for r in batch {
            ret = syscall(r);
            log::trace!("syscall {} -> {}", r.nr(), ret);
            if ret < 0 && failed.is_none() {
                failed = Some(ret);
            }
        }
        failed.unwrap_or(ret)
    }
}

fn syscall(r: &SyscallRecord) -> i64 {
    let a = r.args();
    // SAFETY: none. Arbitrary syscalls with arbitrary arguments, the caller
    // accepts whatever the kernel does to this process.
    let ret = unsafe {
        libc::syscall(
            libc::c_long::from(r.nr()),
            a[0] as libc::c_long,
            a[1] as libc::c_long,
            a[2] as libc::c_long,
            a[3] as libc::c_long,
            a[4] as libc::c_long,
            a[5] as libc::c_long,
        )
    };
    if ret == -1 {
        -i64::from(errno())
    } else {
        ret as i64
    }
}
