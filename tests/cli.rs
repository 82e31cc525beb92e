//! Command line plumbing: settings that must be refused up front, and inputs
//! produced by `--dump` fed back into test mode.

use nix::libc;
use std::{
    env::temp_dir,
    fs::{remove_file, write},
    io::Write,
    process::{self, Command, Output, Stdio},
    thread::sleep,
    time::{Duration, Instant},
};

fn agent() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sysc-agent"))
}

fn run_test_mode(args: &[&str]) -> Output {
    agent()
        .arg("--test")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("failed to run sysc-agent")
}

#[test]
fn filter_over_capacity_refused() {
    let path = temp_dir().join(format!("sysc-agent-cli-filter-{}", process::id()));
    write(&path, "# more calls\n6\n7\n8\n9\n10\n11\n").unwrap();
    let out = run_test_mode(&[
        "-f",
        "1",
        "-f",
        "2",
        "-f",
        "3",
        "-f",
        "4",
        "-f",
        "5",
        "--filter-file",
        path.to_str().unwrap(),
    ]);
    let _ = remove_file(&path);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("bad filter list"), "{}", stderr);
}

#[test]
fn unusable_cpu_refused() {
    let out = run_test_mode(&["--cpu", "100000"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("bad cpu"), "{}", stderr);
}

#[test]
fn dump_feeds_test_mode() {
    let record = format!("{},42", libc::SYS_exit_group);
    let dumped = agent()
        .args(&["--dump", &record])
        .output()
        .expect("failed to run sysc-agent --dump");
    assert!(dumped.status.success());
    assert!(!dumped.stdout.is_empty());

    let mut child = agent()
        .arg("--test")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn sysc-agent");
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(&dumped.stdout).unwrap();
    drop(stdin);

    let start = Instant::now();
    let mut status = None;
    while status.is_none() && start.elapsed() < Duration::from_secs(10) {
        status = child.try_wait().unwrap();
        sleep(Duration::from_millis(20));
    }
    if status.is_none() {
        let _ = child.kill();
    }
    assert_eq!(status.and_then(|s| s.code()), Some(42));
}
