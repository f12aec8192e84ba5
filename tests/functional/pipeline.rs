//! Tests for running a `Pipeline` with real processes.

use std::fs;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use pipes::{Child, Command, Fork, Os, Pipe, Pipeline, Stage, State, Unix};

use crate::util::{reap_timeout, temp_file, wait_timeout};

/// `sort -n -k 5 -o <output>`, writing its output to a file rather than our
/// standard out.
fn sort_into(output: &Path) -> Command {
    Command::new("sort").args(["-n", "-k", "5", "-o"]).arg(output)
}

#[test]
fn sorted_by_fifth_field() {
    let output = temp_file("sorted_by_fifth_field.out");
    let report = Pipeline::setup()
        .producer(Command::new("printf").arg("a b c d 30 x\na b c d 4 y\na b c d 100 z\n"))
        .consumer(sort_into(&output))
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert!(report.success(), "{report:?}");
    assert!(report.status(Stage::Producer).is_some());
    assert!(report.status(Stage::Consumer).is_some());
    let got = fs::read_to_string(&output).unwrap();
    assert_eq!(got, "a b c d 4 y\na b c d 30 x\na b c d 100 z\n");
}

#[test]
fn more_output_than_pipe_buffer() {
    const LINES: usize = 100_000;
    let output = temp_file("more_output_than_pipe_buffer.out");
    let report = Pipeline::setup()
        // Descending, so the consumer has to reverse it.
        .producer(Command::new("seq").args(["-f", "a b c d %.0f", "100000", "-1", "1"]))
        .consumer(sort_into(&output))
        .build()
        .unwrap()
        .run()
        .unwrap();
    assert!(report.success(), "{report:?}");

    let got = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = got.lines().collect();
    assert_eq!(lines.len(), LINES);
    assert_eq!(lines[0], "a b c d 1");
    assert_eq!(lines[LINES - 1], "a b c d 100000");
}

#[test]
fn returns_after_stages_exit() {
    const DELAY: Duration = Duration::from_millis(200);
    let output = temp_file("returns_after_stages_exit.out");
    let start = Instant::now();
    let report = Pipeline::setup()
        .producer(Command::new("sh").args(["-c", "sleep 0.2; echo a b c d 1 e"]))
        .consumer(sort_into(&output))
        .build()
        .unwrap()
        .run()
        .unwrap();
    let elapsed = start.elapsed();

    assert!(report.success(), "{report:?}");
    assert!(elapsed >= DELAY, "returned after {elapsed:?}");
    // `sort` only writes its output once all input is read, so this proves the
    // consumer was done as well.
    assert_eq!(fs::read_to_string(&output).unwrap(), "a b c d 1 e\n");
}

#[test]
fn stage_exec_failure() {
    let output = temp_file("stage_exec_failure.out");
    let report = Pipeline::setup()
        .producer(Command::new("/nonexistent/pipes-test-program"))
        .consumer(sort_into(&output))
        .build()
        .unwrap()
        .run()
        .unwrap();

    // The producer exits with 1, the consumer sees an empty input.
    assert_eq!(report.status(Stage::Producer).unwrap().code(), Some(1));
    assert!(report.status(Stage::Consumer).unwrap().success());
    assert!(!report.success());
    assert_eq!(fs::read_to_string(&output).unwrap(), "");
}

#[test]
fn spawn_then_wait() {
    let output = temp_file("spawn_then_wait.out");
    let mut running = Pipeline::setup()
        .producer(Command::new("printf").arg("a b c d 2\na b c d 1\n"))
        .consumer(sort_into(&output))
        .build()
        .unwrap()
        .spawn()
        .unwrap();
    assert_eq!(running.state(), State::ConsumerForked);
    assert_ne!(running.producer_mut().id(), running.consumer_mut().id());

    let status = wait_timeout(running.consumer_mut(), Duration::from_secs(10))
        .expect("consumer didn't exit");
    assert!(status.success());

    // Waiting returns the already collected status of the consumer.
    let report = running.wait().unwrap();
    assert_eq!(report.status(Stage::Consumer), Some(status));
    assert!(report.success());
    assert_eq!(fs::read_to_string(&output).unwrap(), "a b c d 1\na b c d 2\n");
}

#[test]
fn producer_killed_by_sigpipe() {
    let report = Pipeline::setup()
        .producer(Command::new("yes"))
        // Exits without reading any input.
        .consumer(Command::new("true"))
        .build()
        .unwrap()
        .run()
        .unwrap();

    let producer = report.status(Stage::Producer).unwrap();
    assert_eq!(producer.signal(), Some(libc::SIGPIPE), "{producer}");
    assert!(report.status(Stage::Consumer).unwrap().success());
}

/// Uses the OS for everything, except that forking the consumer fails.
#[derive(Debug, Default)]
struct FailConsumerFork {
    forks: usize,
    producer: Option<u32>,
}

impl Os for FailConsumerFork {
    fn pipe(&mut self) -> io::Result<Pipe> {
        Unix.pipe()
    }

    fn fork(&mut self) -> io::Result<Fork> {
        self.forks += 1;
        if self.forks == 2 {
            return Err(io::Error::from_raw_os_error(libc::EAGAIN));
        }
        let fork = Unix.fork()?;
        if let Fork::Parent(ref child) = fork {
            self.producer = Some(child.id());
        }
        Ok(fork)
    }

    fn wait(&mut self, child: &mut Child) -> io::Result<ExitStatus> {
        Unix.wait(child)
    }

    fn wait_any(&mut self) -> io::Result<(u32, ExitStatus)> {
        Unix.wait_any()
    }
}

#[test]
fn consumer_fork_failure_leaves_producer_running() {
    let errors = temp_file("consumer_fork_failure_leaves_producer_running.err");
    let mut os = FailConsumerFork::default();
    let err = Pipeline::setup()
        // Keeps writing until nothing can read its output anymore.
        .producer(Command::new("sh").args(["-c", "exec yes 2>\"$0\""]).arg(&errors))
        .build_with(&mut os)
        .unwrap()
        .spawn()
        .unwrap_err();

    assert!(err.is_fork());
    assert_eq!(err.stage(), Some(Stage::Consumer));
    assert_eq!(err.state(), State::ProducerForked);

    // The producer ends on its own, its output is dropped without errors.
    let pid = os.producer.expect("producer not forked");
    let status = reap_timeout(pid, Duration::from_secs(10)).expect("producer didn't exit");
    assert_eq!(status.signal(), Some(libc::SIGPIPE), "{status}");
    assert_eq!(fs::read_to_string(&errors).unwrap(), "");
}
