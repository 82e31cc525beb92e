use super::RecordBatch;

use rustc_hash::FxHashSet;
use thiserror::Error;

/// Max number of syscalls in a filter list.
pub const FILTER_CAPACITY: usize = 10;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("too many filtered calls: {given}, at most {max}")]
    TooMany { given: usize, max: usize },
}

/// Syscall numbers allowed to execute.
///
/// An empty list allows everything. That is the intended default, not an
/// accident: running without `--filter` must fuzz every syscall.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterList {
    calls: FxHashSet<u16>,
}

impl FilterList {
    /// The allow-everything list.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calls<I: IntoIterator<Item = u16>>(calls: I) -> Result<Self, FilterError> {
        let calls = calls.into_iter().collect::<FxHashSet<_>>();
        if calls.len() > FILTER_CAPACITY {
            return Err(FilterError::TooMany {
                given: calls.len(),
                max: FILTER_CAPACITY,
            });
        }
        Ok(Self { calls })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[inline]
    pub fn contains(&self, nr: u16) -> bool {
        self.calls.contains(&nr)
    }

    /// Whether `batch` may run. All or nothing: a single disallowed record
    /// rejects the whole batch.
    pub fn permits(&self, batch: &RecordBatch) -> bool {
        self.calls.is_empty() || batch.iter().all(|r| self.calls.contains(&r.nr()))
    }

    pub fn calls(&self) -> impl Iterator<Item = u16> + '_ {
        self.calls.iter().copied()
    }
}
