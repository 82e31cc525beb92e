use super::{ResetError, ResetState};

/// Reset that does nothing, for targets with no state to restore.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReset;

impl NullReset {
    pub fn new() -> Self {
        Self
    }
}

impl ResetState for NullReset {
    fn stop_vm(&mut self) -> Result<(), ResetError> {
        Ok(())
    }

    fn set_thread(&mut self) -> Result<(), ResetError> {
        Ok(())
    }
}
