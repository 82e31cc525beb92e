//! In-guest agent of a hypercall driven syscall fuzzer.
//!
//! The agent speaks a fork server protocol with a supervising fuzzer, decodes
//! every input into a short batch of syscall records and throws them at the
//! running kernel. Crashing is an expected outcome.

#[macro_use]
pub mod utils;
pub mod config;
pub mod exec;
pub mod forksrv;
pub mod harness;
pub mod vm;

pub use config::Config;
pub use harness::{Harness, Iteration};
