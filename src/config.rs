use crate::{
    exec::{filter::FilterList, SyscallRecord, BATCH_CAPACITY, NR_ARGS},
    forksrv::HarnessMode,
    utils::parse_num,
};

use anyhow::Context;
use std::{convert::TryFrom, fs::read_to_string, path::Path};

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: HarnessMode,
    /// Allowed syscalls, empty allows all.
    pub filter: FilterList,
    /// Max records decoded from one input.
    pub max_records: usize,
    /// Decode and filter, but never execute.
    pub record_only: bool,
    /// Ticks reported with the ready announcement.
    pub ticks: u64,
    /// Address range announced after every fetch.
    pub range: Option<(u64, u64)>,
    /// Cpu to pin the harness to before each iteration.
    pub cpu: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: HarnessMode::Production,
            filter: FilterList::new(),
            max_records: BATCH_CAPACITY,
            record_only: false,
            ticks: 0,
            range: None,
            cpu: None,
        }
    }
}

impl Config {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.max_records == 0 || self.max_records > BATCH_CAPACITY {
            anyhow::bail!(
                "bad max records: {}, expected 1..={}",
                self.max_records,
                BATCH_CAPACITY
            );
        }
        if let Some((start, end)) = self.range {
            if start > end {
                anyhow::bail!("bad range: {:#x}-{:#x}", start, end);
            }
        }
        if let Some(cpu) = self.cpu {
            check_cpu(cpu)?;
        }
        Ok(())
    }
}

/// The pinned cpu must be one this process may already run on.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn check_cpu(cpu: usize) -> anyhow::Result<()> {
    use nix::{sched::sched_getaffinity, unistd::Pid};

    let allowed = sched_getaffinity(Pid::from_raw(0)).context("failed to get cpu affinity")?;
    if !allowed.is_set(cpu).unwrap_or(false) {
        anyhow::bail!("bad cpu: {}, not in the affinity mask of this process", cpu);
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn check_cpu(_cpu: usize) -> anyhow::Result<()> {
    anyhow::bail!("cpu pinning is not supported on this os")
}

/// Load syscall numbers from `path`, one per line. Blank lines and lines
/// starting with '#' are skipped.
pub fn load_filter_file(path: &Path) -> anyhow::Result<Vec<u16>> {
    let content = read_to_string(path)
        .with_context(|| format!("failed to read filter file {}", path.display()))?;
    let mut calls = Vec::new();
    for (i, l) in content.lines().map(|l| l.trim()).enumerate() {
        if l.is_empty() || l.starts_with('#') {
            continue;
        }
        let nr = parse_nr(l).with_context(|| format!("{}:{}", path.display(), i + 1))?;
        calls.push(nr);
    }
    Ok(calls)
}

pub fn parse_nr(s: &str) -> anyhow::Result<u16> {
    let n = parse_num(s).with_context(|| format!("bad syscall number: '{}'", s))?;
    u16::try_from(n).with_context(|| format!("syscall number out of range: {}", n))
}

/// Parse `START-END`, both hex or decimal.
pub fn parse_range(s: &str) -> anyhow::Result<(u64, u64)> {
    let mut parts = s.splitn(2, '-');
    let (start, end) = match (parts.next(), parts.next()) {
        (Some(start), Some(end)) => (start, end),
        _ => anyhow::bail!("bad range '{}', expected START-END", s),
    };
    let start = parse_num(start).with_context(|| format!("bad range start: '{}'", start))?;
    let end = parse_num(end).with_context(|| format!("bad range end: '{}'", end))?;
    Ok((start, end))
}

/// Parse `NR[,ARG...]` into a record, missing args are zero.
pub fn parse_record(s: &str) -> anyhow::Result<SyscallRecord> {
    let mut items = s.split(',');
    let nr = parse_nr(items.next().unwrap_or_default())?;
    let mut args = [0; NR_ARGS];
    for (i, item) in items.enumerate() {
        if i >= NR_ARGS {
            anyhow::bail!("too many args in '{}', at most {}", s, NR_ARGS);
        }
        args[i] = parse_num(item).with_context(|| format!("bad arg {}: '{}'", i, item))?;
    }
    Ok(SyscallRecord::new(nr, args))
}
