use super::{ResetError, ResetState};

use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};

/// Pins the harness thread to one cpu before every iteration, so the
/// supervisor's per-cpu tracing keeps seeing it.
#[derive(Debug, Clone)]
pub struct PinThread {
    cpu: usize,
}

impl PinThread {
    pub fn new(cpu: usize) -> Self {
        Self { cpu }
    }
}

impl ResetState for PinThread {
    fn stop_vm(&mut self) -> Result<(), ResetError> {
        // nothing runs in the background of the harness.
        Ok(())
    }

    fn set_thread(&mut self) -> Result<(), ResetError> {
        let mut set = CpuSet::new();
        set.set(self.cpu)?;
        // pid 0: the calling thread.
        sched_setaffinity(Pid::from_raw(0), &set)?;
        Ok(())
    }
}
