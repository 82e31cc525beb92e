//! Fork server protocol spoken with the supervising fuzzer.
//!
//! Four operations, each lazily initializing the work channel first:
//! announce readiness, fetch work, announce an address range and announce
//! completion. In test mode the hypercall transport is bypassed: work is read
//! from stdin and every other operation is a no-op returning 0.

use std::io::{self, ErrorKind, Read, Stdin};

/// Memory exchanged with the supervisor.
pub mod channel;
/// Trap into the supervisor.
pub mod hypercall;

use self::{
    channel::{WorkChannel, BUF_SZ},
    hypercall::{Hypercall, Transport, OP_DONE, OP_FETCH, OP_RANGE, OP_READY},
};

/// Where the harness talks to, fixed at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessMode {
    /// Hypercalls to a supervising fuzzer.
    Production,
    /// Stdin instead of a supervisor.
    Test,
}

impl Default for HarnessMode {
    fn default() -> Self {
        HarnessMode::Production
    }
}

/// Harness side of the fork server protocol.
///
/// Sole owner of the work channel. The supervisor writes into the channel only
/// while the harness is blocked inside a hypercall, so no locking is needed.
pub struct ForkServer<T = Hypercall, R = Stdin> {
    mode: HarnessMode,
    transport: T,
    input: R,
    channel: Option<WorkChannel>,
}

impl ForkServer {
    pub fn new(mode: HarnessMode) -> Self {
        Self::with_parts(mode, Hypercall, io::stdin())
    }
}

impl<T: Transport, R: Read> ForkServer<T, R> {
    pub fn with_parts(mode: HarnessMode, transport: T, input: R) -> Self {
        Self {
            mode,
            transport,
            input,
            channel: None,
        }
    }

    pub fn mode(&self) -> HarnessMode {
        self.mode
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Map the work channel, once. Exits the process if mapping fails.
    pub fn initialize(&mut self) -> &mut WorkChannel {
        init_channel(&mut self.channel)
    }

    /// Tell the supervisor the harness is up, optionally with a tick count.
    pub fn announce_ready(&mut self, ticks: u64) -> u64 {
        init_channel(&mut self.channel);
        if self.mode == HarnessMode::Test {
            return 0;
        }
        self.transport.call(OP_READY, ticks, 0)
    }

    /// Block until the next input is available and return it.
    ///
    /// The returned bytes live in the reused channel buffer and are untrusted.
    pub fn fetch_work(&mut self) -> &[u8] {
        let ch = init_channel(&mut self.channel);
        let n = match self.mode {
            HarnessMode::Test => read_input(&mut self.input, ch.buf_mut()),
            HarnessMode::Production => {
                let n = self
                    .transport
                    .call(OP_FETCH, ch.buf_addr(), BUF_SZ as u64);
                if n > BUF_SZ as u64 {
                    log::warn!("supervisor reported {} bytes, buffer has {}", n, BUF_SZ);
                }
                n.min(BUF_SZ as u64) as usize
            }
        };
        log::trace!("fetched {} bytes", n);
        &ch.buf()[..n]
    }

    /// Announce the address range of interest for the current iteration.
    pub fn announce_range(&mut self, start: u64, end: u64) -> u64 {
        let ch = init_channel(&mut self.channel);
        if self.mode == HarnessMode::Test {
            return 0;
        }
        ch.set_header(start, end);
        self.transport.call(OP_RANGE, ch.header_addr(), 0)
    }

    /// Finish the current iteration.
    ///
    /// Must happen exactly once per iteration. If the harness dies first, the
    /// external watcher announces it instead.
    pub fn announce_completion(&mut self, status: i64) -> u64 {
        init_channel(&mut self.channel);
        if self.mode == HarnessMode::Test {
            return 0;
        }
        self.transport.call(OP_DONE, status as u64, 0)
    }
}

fn init_channel(channel: &mut Option<WorkChannel>) -> &mut WorkChannel {
    channel.get_or_insert_with(|| {
        let ch = WorkChannel::map()
            .unwrap_or_else(|e| exits!(exitcode::OSERR, "failed to map work channel: {}", e));
        log::debug!(
            "work channel mapped at {:#x}, buffer {} bytes",
            ch.header_addr(),
            BUF_SZ
        );
        ch
    })
}

fn read_input<R: Read>(input: &mut R, buf: &mut [u8]) -> usize {
    loop {
        match input.read(buf) {
            Ok(n) => return n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("failed to read input: {}", e);
                return 0;
            }
        }
    }
}
