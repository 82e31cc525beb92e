use anyhow::Context;
use std::{
    io::{stdout, Write},
    path::PathBuf,
};
use structopt::StructOpt;
use sysc_agent::{
    config::{load_filter_file, parse_nr, parse_range, parse_record},
    exec::{filter::FilterList, serialize::encode, KernelExecutor, BATCH_CAPACITY},
    forksrv::{ForkServer, HarnessMode},
    utils::init_logger,
    vm::null::NullReset,
    Config, Harness,
};

#[derive(Debug, StructOpt)]
#[structopt(name = "sysc-agent", about = "Fork server agent for syscall fuzzing.")]
struct Settings {
    /// Read inputs from stdin instead of the supervisor.
    #[structopt(short = "T", long = "test")]
    test_mode: bool,
    /// Decode and filter inputs, never execute them.
    #[structopt(short = "x", long)]
    no_syscall: bool,
    /// Ask the supervisor to enable its timer.
    #[structopt(short = "t", long)]
    timer: bool,
    /// Allowed syscall number, repeatable. Nothing given allows all.
    #[structopt(short = "f", long = "filter", parse(try_from_str = parse_nr))]
    filter: Vec<u16>,
    /// File of allowed syscall numbers, one per line.
    #[structopt(long)]
    filter_file: Option<PathBuf>,
    /// Max records decoded from one input.
    #[structopt(short = "n", long, default_value = "3")]
    max_records: usize,
    /// Address range of interest, START-END, announced every iteration.
    #[structopt(short = "r", long, parse(try_from_str = parse_range))]
    range: Option<(u64, u64)>,
    /// Pin the harness to this cpu before every iteration.
    #[structopt(short = "c", long)]
    cpu: Option<usize>,
    /// Encode records given as NR[,ARG...] to stdout and exit.
    #[structopt(long, parse(try_from_str = parse_record))]
    dump: Vec<sysc_agent::exec::SyscallRecord>,
    /// Verbose logging, repeat for more.
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u64,
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::from_args();
    init_logger(settings.verbose).context("failed to init logger")?;

    if !settings.dump.is_empty() {
        return dump(&settings.dump);
    }

    let mut calls = settings.filter;
    if let Some(f) = settings.filter_file.as_ref() {
        calls.extend(load_filter_file(f)?);
    }
    let config = Config {
        mode: if settings.test_mode {
            HarnessMode::Test
        } else {
            HarnessMode::Production
        },
        filter: FilterList::with_calls(calls).context("bad filter list")?,
        max_records: settings.max_records,
        record_only: settings.no_syscall,
        ticks: settings.timer as u64,
        range: settings.range,
        cpu: settings.cpu,
    };
    config.check().context("config error")?;

    let server = ForkServer::new(config.mode);
    match config.cpu {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        Some(cpu) => {
            use sysc_agent::vm::affinity::PinThread;
            Harness::new(config, server, KernelExecutor, PinThread::new(cpu)).run()
        }
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        Some(_) => anyhow::bail!("cpu pinning is not supported on this os"),
        None => Harness::new(config, server, KernelExecutor, NullReset::new()).run(),
    }
}

fn dump(records: &[sysc_agent::exec::SyscallRecord]) -> anyhow::Result<()> {
    if records.len() > BATCH_CAPACITY {
        log::warn!(
            "{} records given, the harness accepts at most {}",
            records.len(),
            BATCH_CAPACITY
        );
    }
    let mut buf = Vec::new();
    encode(records, &mut buf);
    let mut out = stdout();
    out.write_all(&buf).context("failed to write stdout")?;
    out.flush().context("failed to flush stdout")
}
