//! Tests running the `pipes` binary.

use std::fs;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;

use crate::util::{fifth_field, pipes_command, random_values, read_output, temp_dir, ChildCommand};

const FILES: usize = 16;

#[test]
fn listing_sorted_by_size() {
    let dir = temp_dir("listing_sorted_by_size");
    let sizes = random_values(FILES, 10_000);
    for (i, size) in sizes.iter().enumerate() {
        fs::write(dir.join(format!("file_{i}")), vec![b'a'; *size]).unwrap();
    }

    let output = read_output(ChildCommand::spawn(pipes_command(&dir)));
    assert!(
        output.status.success(),
        "unexpected exit status: {}, stderr: {}",
        output.status,
        output.stderr
    );

    let listing = Command::new("ls")
        .arg("-al")
        .current_dir(&dir)
        .env("LC_ALL", "C")
        .output()
        .unwrap();
    assert!(listing.status.success());
    let listing = String::from_utf8(listing.stdout).unwrap();

    // The modification time of the parent directory can change while other
    // tests run, so we ignore it.
    let mut got: Vec<&str> = output.stdout.lines().filter(|l| !l.ends_with(" ..")).collect();
    let mut want: Vec<&str> = listing.lines().filter(|l| !l.ends_with(" ..")).collect();
    assert_eq!(got.len(), FILES + 2); // Files, "total" and ".".

    let keys: Vec<u64> = got.iter().map(|line| fifth_field(line)).collect();
    assert!(
        keys.windows(2).all(|w| w[0] <= w[1]),
        "listing not sorted by size:\n{}",
        output.stdout
    );

    // Same lines as the listing itself, just in a different order.
    got.sort_unstable();
    want.sort_unstable();
    assert_eq!(got, want);
}

#[test]
fn empty_directory() {
    let dir = temp_dir("empty_directory");
    let output = read_output(ChildCommand::spawn(pipes_command(&dir)));
    assert!(output.status.success(), "stderr: {}", output.stderr);

    // Only "total", "." and "..".
    let lines: Vec<&str> = output.stdout.lines().collect();
    assert_eq!(lines.len(), 3, "output: {}", output.stdout);
    assert!(lines[0].starts_with("total "), "output: {}", output.stdout);
}

#[test]
fn pipe_creation_failure() {
    let dir = temp_dir("pipe_creation_failure");
    let mut cmd = pipes_command(&dir);
    // SAFETY: only async-signal-safe functions are called.
    unsafe {
        cmd.pre_exec(|| {
            // Don't let any inherited descriptor survive `exec`, leaving only
            // standard in, out and error open.
            for fd in 3..1024 {
                let flags = libc::fcntl(fd, libc::F_GETFD);
                if flags != -1 && flags & libc::FD_CLOEXEC == 0 {
                    _ = libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
                }
            }
            // Room for one more descriptor, but a pipe needs two.
            let limit = libc::rlimit {
                rlim_cur: 4,
                rlim_max: 4,
            };
            if libc::setrlimit(libc::RLIMIT_NOFILE, &limit) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let output = read_output(ChildCommand::spawn(cmd));
    assert_eq!(output.status.code(), Some(1), "stderr: {}", output.stderr);
    // Nothing was forked, so nothing was listed.
    assert_eq!(output.stdout, "");
    assert!(
        output.stderr.contains("failed to create pipe"),
        "stderr: {}",
        output.stderr
    );
}
