//! The two stages of the pipeline and the code run in their processes.
//!
//! After forking, the child process of a stage calls [`exec`], which never
//! returns. It:
//!  1. closes the end of the pipe the stage doesn't use,
//!  2. redirects standard out (producer) or standard in (consumer) to the end
//!     it does use, and
//!  3. replaces the process image with the stage's command.
//!
//! If any of these steps fail the error is written to standard error and the
//! process exits with status 1. Only async-signal-safe functions are used.

use std::convert::Infallible;
use std::{fmt, io};

use crate::command::Command;
use crate::error::StageError;
use crate::pipe::{Pipe, PipeEnd};

/// Stage of the pipeline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    /// First stage, writes its standard out into the pipe.
    Producer,
    /// Second stage, reads its standard in from the pipe.
    Consumer,
}

impl Stage {
    /// Returns the name of the stage.
    pub const fn name(self) -> &'static str {
        match self {
            Stage::Producer => "producer",
            Stage::Consumer => "consumer",
        }
    }

    /// Returns the end of the pipe used by the stage.
    pub const fn pipe_end(self) -> PipeEnd {
        match self {
            Stage::Producer => PipeEnd::Write,
            Stage::Consumer => PipeEnd::Read,
        }
    }

    /// Returns the standard I/O descriptor that is redirected to the pipe.
    pub const fn stdio_fd(self) -> libc::c_int {
        match self {
            Stage::Producer => libc::STDOUT_FILENO,
            Stage::Consumer => libc::STDIN_FILENO,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run `stage` in the current (child) process.
///
/// If `close_unused` is false the unused end of the pipe is not closed, but
/// instead is made inheritable so it stays open in `command`.
pub(crate) fn exec(stage: Stage, pipe: &Pipe, command: &Command, close_unused: bool) -> ! {
    let err = match setup_and_exec(stage, pipe, command, close_unused) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    report(stage, err);
    unsafe { libc::_exit(1) }
}

fn setup_and_exec(
    stage: Stage,
    pipe: &Pipe,
    command: &Command,
    close_unused: bool,
) -> Result<Infallible, StageError> {
    // The Rust runtime ignores `SIGPIPE` and ignored signals stay ignored
    // across `exec`. A producer without a reader must be killed by it.
    _ = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_DFL) };

    let unused = pipe.as_raw_fd(stage.pipe_end().other());
    let res = if close_unused {
        syscall!(close(unused))
    } else {
        syscall!(fcntl(unused, libc::F_SETFD, 0))
    };
    _ = res.map_err(|err| StageError::from_io(StageError::DescriptorClose, &err))?;

    let used = pipe.as_raw_fd(stage.pipe_end());
    let target = stage.stdio_fd();
    let res = if used == target {
        // `dup2` is a no-op here and leaves the close-on-exec flag set.
        syscall!(fcntl(used, libc::F_SETFD, 0))
    } else {
        syscall!(dup2(used, target))
    };
    _ = res.map_err(|err| StageError::from_io(StageError::Redirect, &err))?;

    // Only returns on error. On success the kernel closes the original pipe
    // descriptor (close-on-exec), there is nothing left to clean up.
    _ = unsafe { libc::execvp(command.program_ptr(), command.argv_ptr()) };
    Err(StageError::from_io(StageError::Exec, &io::Error::last_os_error()))
}

/// Write `err` to standard error, formatted as
/// `<stage>: <message> (os error <errno>)`.
fn report(stage: Stage, err: StageError) {
    let mut buf = [0; 128];
    let n = format_report(&mut buf, stage, err);
    _ = unsafe { libc::write(libc::STDERR_FILENO, buf.as_ptr().cast(), n) };
}

/// Format the report for `err` into `buf`, returning the number of bytes
/// written. Doesn't allocate.
fn format_report(buf: &mut [u8; 128], stage: Stage, err: StageError) -> usize {
    let mut n = 0;
    let mut push = |bytes: &[u8]| {
        let len = bytes.len().min(buf.len() - n);
        buf[n..n + len].copy_from_slice(&bytes[..len]);
        n += len;
    };
    push(stage.name().as_bytes());
    push(b": ");
    push(err.message().as_bytes());
    push(b" (os error ");
    let mut digits = [0; 11];
    push(format_int(&mut digits, err.raw_os_error()));
    push(b")\n");
    n
}

/// Format `value` in decimal into `buf`.
fn format_int(buf: &mut [u8; 11], value: i32) -> &[u8] {
    let mut i = buf.len();
    let mut v = value.unsigned_abs();
    loop {
        i -= 1;
        buf[i] = b'0' + (v % 10) as u8;
        v /= 10;
        if v == 0 {
            break;
        }
    }
    if value < 0 {
        i -= 1;
        buf[i] = b'-';
    }
    &buf[i..]
}
