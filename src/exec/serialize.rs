//! Wire format of fuzzed input, little endian:
//!
//! ```text
//! u16                 record count n
//! n * { u16 nr, [u64; NR_ARGS] args }
//! ```
//!
//! Bytes following the last record are ignored.

use super::{RecordBatch, SyscallRecord, BATCH_CAPACITY, NR_ARGS};

use bytes::{Buf, BufMut};
use std::mem::size_of;
use thiserror::Error;

/// Size of the leading record count.
pub const COUNT_SZ: usize = size_of::<u16>();
/// Size of one encoded record.
pub const RECORD_SZ: usize = size_of::<u16>() + NR_ARGS * size_of::<u64>();

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("input too short: {len} bytes, one record takes {min}")]
    TooShort { len: usize, min: usize },
    #[error("too many records: {count}, at most {max}")]
    TooManyRecords { count: usize, max: usize },
    #[error("record {index} truncated")]
    Truncated { index: usize },
}

/// Decode at most `max_records` records from `buf`.
///
/// `max_records` is capped by the batch capacity. Never reads past `buf`, and
/// never hands out a partial batch.
pub fn parse(mut buf: &[u8], max_records: usize) -> Result<RecordBatch, ParseError> {
    if buf.len() < RECORD_SZ {
        return Err(ParseError::TooShort {
            len: buf.len(),
            min: RECORD_SZ,
        });
    }
    let max = max_records.min(BATCH_CAPACITY);
    let count = buf.get_u16_le() as usize;
    if count > max {
        return Err(ParseError::TooManyRecords { count, max });
    }

    let mut batch = RecordBatch::new();
    for index in 0..count {
        let r = read_record(&mut buf).ok_or(ParseError::Truncated { index })?;
        // count <= BATCH_CAPACITY
        let _ = batch.push(r);
    }
    Ok(batch)
}

fn read_record(buf: &mut &[u8]) -> Option<SyscallRecord> {
    if buf.remaining() < RECORD_SZ {
        return None;
    }
    let nr = buf.get_u16_le();
    let mut args = [0; NR_ARGS];
    for arg in args.iter_mut() {
        *arg = buf.get_u64_le();
    }
    Some(SyscallRecord::new(nr, args))
}

/// Encode `records` in the format `parse` accepts.
pub fn encode<B: BufMut>(records: &[SyscallRecord], buf: &mut B) {
    buf.put_u16_le(records.len() as u16);
    for r in records {
        buf.put_u16_le(r.nr());
        for arg in r.args() {
            buf.put_u64_le(*arg);
        }
    }
}

/// Encoded length of `n` records.
pub const fn encoded_len(n: usize) -> usize {
    COUNT_SZ + n * RECORD_SZ
}
