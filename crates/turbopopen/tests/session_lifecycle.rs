//! Session lifecycle tests
//!
//! Exercises real children through independent `Popen` sessions:
//! - read and write directions
//! - exit code propagation
//! - precondition failures
//! - slot reuse after success and failure
//! - EINTR transparency during the reap

use nix::errno::Errno;
use nix::sys::wait::WaitStatus;
use rstest::*;
use std::io::{BufRead, Read, Write};
use turbopopen::{
    Direction, FinishError, LaunchConfig, LaunchError, NoChildCause, Pid, Popen, SystemWaiter,
    Waiter,
};

/// Reports EINTR a fixed number of times before doing the real wait.
struct InterruptingWaiter {
    interrupts: usize,
    calls: usize,
}

impl Waiter for InterruptingWaiter {
    fn wait(&mut self, pid: Pid) -> nix::Result<WaitStatus> {
        self.calls += 1;
        if self.interrupts > 0 {
            self.interrupts -= 1;
            return Err(Errno::EINTR);
        }
        SystemWaiter.wait(pid)
    }
}

#[test]
fn test_read_round_trip() {
    let mut session = Popen::new();
    let mut stream = session.launch("echo hello", "r").unwrap();
    assert_eq!(stream.direction(), Direction::ReadFromChild);

    let mut output = Vec::new();
    stream.read_to_end(&mut output).unwrap();
    assert_eq!(output, b"hello\n");

    assert_eq!(session.finish(stream).unwrap(), 0);
    assert!(!session.is_busy());
}

#[rstest]
#[case("exit 0", 0)]
#[case("exit 7", 7)]
#[case("false", 1)]
#[case("exit 255", 255)]
fn test_exit_codes(#[case] command: &str, #[case] expected: i32) {
    let mut session = Popen::new();
    let stream = session.launch(command, "r").unwrap();
    assert_eq!(session.finish(stream).unwrap(), expected);
}

#[test]
fn test_write_direction_reaches_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    let mut session = Popen::new();
    let mut stream = session
        .launch(&format!("cat > '{}'", out.display()), "w")
        .unwrap();
    stream.write_all(b"first line\n").unwrap();
    stream.write_all(b"second line\n").unwrap();

    assert_eq!(session.finish(stream).unwrap(), 0);
    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "first line\nsecond line\n"
    );
}

#[test]
fn test_write_direction_filters_through_child() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("upper");

    let mut session = Popen::new();
    let mut stream = session
        .spawn(
            &format!("tr a-z A-Z > '{}'", out.display()),
            Direction::WriteToChild,
        )
        .unwrap();
    writeln!(stream, "quiet please").unwrap();

    assert_eq!(session.finish(stream).unwrap(), 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "QUIET PLEASE\n");
}

#[test]
fn test_large_output_is_streamed() {
    let mut session = Popen::new();
    let mut stream = session.launch("head -c 1048576 /dev/zero", "r").unwrap();

    let mut total = 0usize;
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        assert!(buf[..n].iter().all(|&b| b == 0));
        total += n;
    }

    assert_eq!(total, 1 << 20);
    assert_eq!(session.finish(stream).unwrap(), 0);
}

#[test]
fn test_lines_from_child() {
    let mut session = Popen::new();
    let mut stream = session.launch("printf 'a\\nb\\nc\\n'", "r").unwrap();
    let lines: Vec<String> = (&mut stream).lines().map(|l| l.unwrap()).collect();
    assert_eq!(lines, ["a", "b", "c"]);
    assert_eq!(session.finish(stream).unwrap(), 0);
}

#[test]
fn test_second_launch_is_already_in_use() {
    let mut session = Popen::new();
    let stream = session.launch("cat >/dev/null", "w").unwrap();

    assert_eq!(
        session.launch("echo again", "r").unwrap_err(),
        LaunchError::AlreadyInUse
    );
    assert_eq!(
        session.spawn("echo again", Direction::WriteToChild).unwrap_err(),
        LaunchError::AlreadyInUse
    );

    assert_eq!(session.finish(stream).unwrap(), 0);
}

#[rstest]
#[case("", "r")]
#[case("", "w")]
#[case("echo hi", "x")]
#[case("echo hi", "rw")]
#[case("echo hi", "")]
#[case("echo hi", "R")]
fn test_invalid_arguments(#[case] command: &str, #[case] mode: &str) {
    let mut session = Popen::new();
    let err = session.launch(command, mode).unwrap_err();
    assert!(matches!(err, LaunchError::InvalidArgument(_)));
    assert_eq!(err.raw_os_error(), libc::EINVAL);
    assert!(!session.is_busy());
}

#[test]
fn test_finish_without_launch_is_no_child() {
    let mut owner = Popen::new();
    let stream = owner.launch("true", "r").unwrap();

    let mut fresh = Popen::new();
    let err = fresh.finish(stream).unwrap_err();
    assert!(matches!(err, FinishError::NotLaunched { .. }));
    assert_eq!(err.raw_os_error(), libc::ECHILD);
    assert!(owner.is_busy());

    // The refused stream still finishes its own child.
    let stream = err.into_stream().unwrap();
    assert_eq!(owner.finish(stream).unwrap(), 0);
    assert!(!owner.is_busy());

    let stream = owner.launch("exit 2", "r").unwrap();
    assert_eq!(owner.finish(stream).unwrap(), 2);
}

#[test]
fn test_finish_foreign_stream_is_invalid() {
    let mut session = Popen::new();
    let mut foreign_session = Popen::new();

    let mut stream = session.launch("echo mine", "r").unwrap();
    let foreign = foreign_session.launch("echo theirs", "r").unwrap();

    let err = session.finish(foreign).unwrap_err();
    assert!(matches!(err, FinishError::InvalidArgument { .. }));
    assert_eq!(err.raw_os_error(), libc::EINVAL);

    // The outstanding stream is unaffected.
    assert!(session.is_busy());
    let mut line = String::new();
    stream.read_line(&mut line).unwrap();
    assert_eq!(line, "mine\n");
    assert_eq!(session.finish(stream).unwrap(), 0);

    // The foreign stream comes back open, with its data intact.
    let mut foreign = err.into_stream().unwrap();
    let mut line = String::new();
    foreign.read_line(&mut line).unwrap();
    assert_eq!(line, "theirs\n");
    assert_eq!(foreign_session.finish(foreign).unwrap(), 0);
    assert!(!foreign_session.is_busy());
}

#[test]
fn test_slot_reusable_after_success() {
    let mut session = Popen::new();
    for code in 0..3 {
        let stream = session.launch(&format!("exit {}", code), "r").unwrap();
        assert_eq!(session.finish(stream).unwrap(), code);
    }
}

#[test]
fn test_signal_death_is_no_child_and_slot_is_reusable() {
    let mut session = Popen::new();
    let stream = session.launch("kill -9 $$", "r").unwrap();

    match session.finish(stream).unwrap_err() {
        FinishError::NoChild(NoChildCause::AbnormalTermination(how)) => {
            assert!(how.contains("SIGKILL"), "unexpected cause: {}", how)
        }
        other => panic!("Expected NoChild(AbnormalTermination), got {:?}", other),
    }
    assert!(!session.is_busy());

    let stream = session.launch("exit 3", "r").unwrap();
    assert_eq!(session.finish(stream).unwrap(), 3);
}

#[test]
fn test_closing_early_breaks_the_pipe() {
    let mut session = Popen::new();
    let mut stream = session.launch("exec yes", "r").unwrap();

    let mut line = String::new();
    stream.read_line(&mut line).unwrap();
    assert_eq!(line, "y\n");

    // The child gets SIGPIPE on its next write once the read end is gone.
    match session.finish(stream).unwrap_err() {
        FinishError::NoChild(NoChildCause::AbnormalTermination(how)) => {
            assert!(how.contains("SIGPIPE"), "unexpected cause: {}", how)
        }
        other => panic!("Expected NoChild(AbnormalTermination), got {:?}", other),
    }
}

#[test]
fn test_interrupted_wait_is_invisible() {
    let mut session = Popen::new();
    let stream = session.launch("exit 5", "r").unwrap();

    let mut waiter = InterruptingWaiter {
        interrupts: 10,
        calls: 0,
    };
    assert_eq!(session.finish_with(stream, &mut waiter).unwrap(), 5);
    assert_eq!(waiter.calls, 11);
    assert!(!session.is_busy());
}

#[test]
fn test_missing_shell_reports_failure_code() {
    let config = LaunchConfig::new()
        .with_shell("/nonexistent/shell")
        .with_failure_exit_code(99);
    let mut session = Popen::with_config(config);

    let stream = session.launch("echo unreachable", "r").unwrap();
    assert_eq!(session.finish(stream).unwrap(), 99);
}

#[test]
fn test_child_inherits_environment() {
    let mut session = Popen::new();
    let mut stream = session.launch("echo \"$HOME\"", "r").unwrap();

    let mut line = String::new();
    stream.read_line(&mut line).unwrap();
    assert_eq!(session.finish(stream).unwrap(), 0);

    let expected = std::env::var("HOME").unwrap_or_default();
    assert_eq!(line.trim_end_matches('\n'), expected);
}

#[test]
fn test_independent_sessions_run_concurrently() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let mut session = Popen::new();
                let mut stream = session.launch(&format!("echo {}", i), "r").unwrap();
                let mut out = String::new();
                stream.read_to_string(&mut out).unwrap();
                (out, session.finish(stream).unwrap())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let (out, code) = handle.join().unwrap();
        assert_eq!(out, format!("{}\n", i));
        assert_eq!(code, 0);
    }
}
