//! The fuzzing loop.
//!
//! One iteration: reset state, fetch work, parse, filter, dispatch, announce
//! completion. Malformed and rejected inputs are dropped silently. If
//! dispatching takes the process down, nothing here is reached again: the
//! supervisor's watcher observes the crash and announces completion for us.

use crate::{
    config::Config,
    exec::{serialize::parse, serialize::ParseError, Dispatch},
    forksrv::{hypercall::Transport, ForkServer},
    vm::ResetState,
};

use std::io::Read;

/// Outcome of one iteration that did not crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Iteration {
    /// Input could not be decoded.
    Malformed(ParseError),
    /// Input decoded, but contains a call outside the filter list.
    Rejected,
    /// Accepted, not executed in record-only mode.
    Recorded,
    /// Accepted and executed with this result.
    Executed(i64),
}

pub struct Harness<T, R, D, S> {
    config: Config,
    server: ForkServer<T, R>,
    dispatcher: D,
    reset: S,
}

impl<T, R, D, S> Harness<T, R, D, S>
where
    T: Transport,
    R: Read,
    D: Dispatch,
    S: ResetState,
{
    pub fn new(config: Config, server: ForkServer<T, R>, dispatcher: D, reset: S) -> Self {
        Self {
            config,
            server,
            dispatcher,
            reset,
        }
    }

    pub fn server(&self) -> &ForkServer<T, R> {
        &self.server
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn reset_state(&self) -> &S {
        &self.reset
    }

    /// Announce readiness to the supervisor.
    pub fn start(&mut self) -> u64 {
        log::info!(
            "harness ready, mode: {:?}, filter: {:?}, max records: {}, record only: {}",
            self.server.mode(),
            self.config.filter.calls().collect::<Vec<_>>(),
            self.config.max_records,
            self.config.record_only
        );
        self.server.announce_ready(self.config.ticks)
    }

    /// Run one iteration and announce its completion.
    pub fn run_once(&mut self) -> Iteration {
        if let Err(e) = self.reset.reset() {
            log::debug!("failed to reset state: {}", e);
        }
        let ret = self.fuzz_one();
        log::debug!("iteration: {:?}", ret);
        self.server.announce_completion(0);
        ret
    }

    /// Fuzz forever. Only a crash or a signal ends the process.
    pub fn run(mut self) -> ! {
        self.start();
        loop {
            self.run_once();
        }
    }

    fn fuzz_one(&mut self) -> Iteration {
        let parsed = parse(self.server.fetch_work(), self.config.max_records);
        if let Some((start, end)) = self.config.range {
            self.server.announce_range(start, end);
        }

        let batch = match parsed {
            Ok(batch) => batch,
            Err(e) => {
                log::trace!("input dropped: {}", e);
                return Iteration::Malformed(e);
            }
        };
        if !self.config.filter.permits(&batch) {
            log::trace!("input filtered: {:?}", batch);
            return Iteration::Rejected;
        }
        if self.config.record_only {
            return Iteration::Recorded;
        }

        Iteration::Executed(self.dispatcher.dispatch(&batch))
    }
}
