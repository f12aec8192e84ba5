//! Module with OS process related types.
//!
//! Use [`fork`] to create a new process and the returned [`Child`] to wait on
//! it.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// Result of [`fork`].
#[derive(Debug)]
#[must_use = "the child branch must exec or exit"]
pub enum Fork {
    /// Returned in the parent process, holding a handle to the newly created
    /// child process.
    Parent(Child),
    /// Returned in the newly created child process.
    Child,
}

/// Create a new process by duplicating the calling process, see [`fork(2)`].
///
/// # Notes
///
/// In a multi-threaded program only the calling thread is duplicated. The
/// child must restrict itself to async-signal-safe functions until it calls
/// one of the `exec` functions or exits with [`libc::_exit`]. This means no
/// allocations, no locks and no unwinding.
///
/// [`fork(2)`]: https://pubs.opengroup.org/onlinepubs/9699919799/functions/fork.html
pub fn fork() -> io::Result<Fork> {
    match syscall!(fork())? {
        0 => Ok(Fork::Child),
        pid => Ok(Fork::Parent(Child::from_pid(pid))),
    }
}

/// Handle to a child process.
///
/// Similar to [`std::process::Child`] the process is **not** killed or waited
/// on when the handle is dropped.
#[derive(Debug)]
pub struct Child {
    pid: libc::pid_t,
    /// Set once the process is reaped.
    status: Option<ExitStatus>,
}

impl Child {
    pub(crate) const fn from_pid(pid: libc::pid_t) -> Child {
        Child { pid, status: None }
    }

    /// Returns the OS-assigned process identifier.
    pub fn id(&self) -> u32 {
        self.pid as u32
    }

    /// Returns the exit status if the process was already waited on.
    pub const fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Record that the process was reaped elsewhere, e.g. by a wait for any
    /// child.
    pub(crate) fn set_status(&mut self, status: ExitStatus) {
        self.status = Some(status);
    }

    /// Wait for the process to exit, blocking the current thread.
    ///
    /// Returns the stored status if the process was already reaped.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = waitpid(self.pid, 0)?.map_or(0, |(_, status)| status);
        let status = ExitStatus::from_raw(status);
        self.status = Some(status);
        Ok(status)
    }

    /// Check if the process has exited, without blocking.
    ///
    /// Returns `Ok(None)` if the process is still running.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }
        match waitpid(self.pid, libc::WNOHANG)? {
            Some((_, status)) => {
                let status = ExitStatus::from_raw(status);
                self.status = Some(status);
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    /// Forcefully kill the process by sending it `SIGKILL`.
    ///
    /// Does nothing if the process was already reaped, as its process id may
    /// have been reused.
    pub fn kill(&mut self) -> io::Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        syscall!(kill(self.pid, libc::SIGKILL)).map(|_| ())
    }
}

/// Wait for any child process of the calling process to exit.
///
/// Returns the process id of the reaped child and its exit status.
pub(crate) fn wait_any() -> io::Result<(libc::pid_t, ExitStatus)> {
    let (pid, status) = waitpid(-1, 0)?.unwrap_or((-1, 0));
    Ok((pid, ExitStatus::from_raw(status)))
}

/// Wrapper around [`waitpid(2)`] that retries if interrupted by a signal.
///
/// Returns `None` if `WNOHANG` is used and no child has exited yet.
///
/// [`waitpid(2)`]: https://pubs.opengroup.org/onlinepubs/9699919799/functions/waitpid.html
fn waitpid(pid: libc::pid_t, options: libc::c_int) -> io::Result<Option<(libc::pid_t, libc::c_int)>> {
    let mut status: libc::c_int = 0;
    loop {
        match syscall!(waitpid(pid, &mut status, options)) {
            Ok(0) => return Ok(None),
            Ok(pid) => return Ok(Some((pid, status))),
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}
