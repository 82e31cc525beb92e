//! Hypercall into the supervising fuzzer.
//!
//! The supervisor traps a fixed instruction, reads three arguments from
//! registers and writes one result back. It may block the caller for as long
//! as it wants, or never resume it at all.

use iota::iota;

/// Fork server operation code.
///
/// Register layout of a call, op first:
///
/// | arch    | trap               | op  | arg1 | arg2 | result |
/// |---------|--------------------|-----|------|------|--------|
/// | x86_64  | `.byte 0x0f, 0x24` | rdi | rsi  | rdx  | rax    |
/// | aarch64 | `svc #0x3f`        | x0  | x1   | x2   | x0     |
pub type Op = u64;

iota! {
    pub const OP_READY: Op = 1 + iota;     // harness alive, arg1: ticks
        , OP_FETCH                          // wait for input, arg1: buf addr, arg2: buf size
        , OP_RANGE                          // range of interest, arg1: header addr
        , OP_DONE                           // iteration finished, arg1: status
}

/// Synchronous call across the privilege boundary.
pub trait Transport {
    fn call(&mut self, op: Op, arg1: u64, arg2: u64) -> u64;
}

/// Transport backed by the architecture specific trap instruction.
#[derive(Debug, Default, Clone, Copy)]
pub struct Hypercall;

impl Transport for Hypercall {
    fn call(&mut self, op: Op, arg1: u64, arg2: u64) -> u64 {
        log::trace!("hypercall: op {}, args ({:#x}, {:#x})", op, arg1, arg2);
        // SAFETY: the supervisor only touches memory owned by the work channel,
        // whose address and size are passed explicitly.
        unsafe { trap(op, arg1, arg2) }
    }
}

#[cfg(target_arch = "x86_64")]
unsafe fn trap(op: u64, arg1: u64, arg2: u64) -> u64 {
    use std::arch::asm;

    let ret: u64;
    asm!(
        ".byte 0x0f, 0x24",
        in("rdi") op,
        in("rsi") arg1,
        in("rdx") arg2,
        lateout("rax") ret,
        options(nostack),
    );
    ret
}

#[cfg(target_arch = "aarch64")]
unsafe fn trap(op: u64, arg1: u64, arg2: u64) -> u64 {
    use std::arch::asm;

    let ret: u64;
    asm!(
        "svc #0x3f",
        inlateout("x0") op => ret,
        in("x1") arg1,
        in("x2") arg2,
        options(nostack),
    );
    ret
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
unsafe fn trap(op: u64, _arg1: u64, _arg2: u64) -> u64 {
    exits!(
        exitcode::UNAVAILABLE,
        "hypercall {} unsupported on this architecture, use test mode",
        op
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// In-process stand-in for the supervisor.
    ///
    /// Records every call and serves queued inputs on `OP_FETCH` by writing
    /// into the buffer address it was handed.
    #[derive(Debug, Default)]
    pub(crate) struct FakeSupervisor {
        pub calls: Vec<(Op, u64, u64)>,
        pub inputs: VecDeque<Vec<u8>>,
        /// Bytes the supervisor claims to have written, overriding the real count.
        pub claimed: Option<u64>,
    }

    impl FakeSupervisor {
        pub fn with_inputs<I: IntoIterator<Item = Vec<u8>>>(inputs: I) -> Self {
            Self {
                inputs: inputs.into_iter().collect(),
                ..Default::default()
            }
        }

        pub fn ops(&self) -> Vec<Op> {
            self.calls.iter().map(|c| c.0).collect()
        }
    }

    impl Transport for FakeSupervisor {
        fn call(&mut self, op: Op, arg1: u64, arg2: u64) -> u64 {
            self.calls.push((op, arg1, arg2));
            if op != OP_FETCH {
                return 0;
            }
            let input = self.inputs.pop_front().unwrap_or_default();
            let n = input.len().min(arg2 as usize);
            unsafe { std::ptr::copy_nonoverlapping(input.as_ptr(), arg1 as *mut u8, n) };
            self.claimed.unwrap_or(n as u64)
        }
    }

    #[test]
    fn op_codes() {
        assert_eq!(OP_READY, 1);
        assert_eq!(OP_FETCH, 2);
        assert_eq!(OP_RANGE, 3);
        assert_eq!(OP_DONE, 4);
    }
}

#[cfg(all(test, target_arch = "x86_64", target_os = "linux"))]
mod tests {
    use super::*;
    use nix::{
        libc,
        sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal},
    };

    /// Stands in for the supervisor: the trap instruction is undefined outside
    /// of it, so the kernel delivers SIGILL with the caller's registers.
    extern "C" fn serve(_: libc::c_int, _: *mut libc::siginfo_t, ctx: *mut libc::c_void) {
        let uc = unsafe { &mut *(ctx as *mut libc::ucontext_t) };
        let regs = &mut uc.uc_mcontext.gregs;
        let op = regs[libc::REG_RDI as usize];
        let arg1 = regs[libc::REG_RSI as usize];
        let arg2 = regs[libc::REG_RDX as usize];
        regs[libc::REG_RAX as usize] = op * 100 + arg1 * 10 + arg2;
        // skip the two byte trap.
        regs[libc::REG_RIP as usize] += 2;
    }

    #[test]
    fn trap_register_layout() {
        let act = SigAction::new(
            SigHandler::SigAction(serve),
            SaFlags::SA_SIGINFO,
            SigSet::empty(),
        );
        let old = unsafe { sigaction(Signal::SIGILL, &act) }.unwrap();
        let ret = Hypercall.call(OP_RANGE, 2, 1);
        let fetched = Hypercall.call(OP_FETCH, 0, 0);
        unsafe { sigaction(Signal::SIGILL, &old) }.unwrap();

        assert_eq!(ret, 321);
        assert_eq!(fetched, 200);
    }
}
