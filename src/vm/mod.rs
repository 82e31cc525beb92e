//! Per-iteration reset of execution state.

use thiserror::Error;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod affinity;
pub mod null;

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("set thread: {0}")]
    SetThread(#[from] nix::Error),
}

/// State reset performed before every iteration.
pub trait ResetState {
    /// Quiesce whatever the previous iteration left running.
    fn stop_vm(&mut self) -> Result<(), ResetError>;
    /// Put the executing thread where the supervisor expects it.
    fn set_thread(&mut self) -> Result<(), ResetError>;

    fn reset(&mut self) -> Result<(), ResetError> {
        self.stop_vm()?;
        self.set_thread()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Counts resets, optionally failing every one of them.
    #[derive(Debug, Default)]
    pub(crate) struct CountingReset {
        pub resets: u64,
        pub fail: bool,
    }

    impl CountingReset {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    impl ResetState for CountingReset {
        fn stop_vm(&mut self) -> Result<(), ResetError> {
            self.resets += 1;
            Ok(())
        }

        fn set_thread(&mut self) -> Result<(), ResetError> {
            if self.fail {
                return Err(ResetError::SetThread(nix::Error::Sys(nix::errno::Errno::EINVAL)));
            }
            Ok(())
        }
    }
}
