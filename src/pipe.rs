//! Unix pipes.
//!
//! To create a new pipe use [`Pipe::new`]. The returned [`Pipe`] owns both
//! ends, which are closed when it's dropped.
//!
//! # Examples
//!
//! ```
//! use std::fs::File;
//! use std::io::{Read, Write};
//!
//! use pipes::Pipe;
//!
//! # fn main() -> std::io::Result<()> {
//! let (receiver, sender) = Pipe::new()?.into_ends();
//! let (mut receiver, mut sender) = (File::from(receiver), File::from(sender));
//!
//! sender.write_all(b"Hello, world!")?;
//! drop(sender); // Close the sending side.
//!
//! let mut buf = String::new();
//! receiver.read_to_string(&mut buf)?;
//! assert_eq!(buf, "Hello, world!");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Unix pipe.
///
/// This is a wrapper around Unix's [`pipe(2)`] system call. Both descriptors
/// are created with the close-on-exec flag set, so a process replacing its
/// image never inherits them by accident. Descriptors that must survive
/// `exec` have to be duplicated (e.g. onto standard in or out, see
/// [`dup2(2)`]).
///
/// The pipe should be created before forking, after which each process uses
/// one of the ends and closes the other.
///
/// [`pipe(2)`]: https://pubs.opengroup.org/onlinepubs/9699919799/functions/pipe.html
/// [`dup2(2)`]: https://pubs.opengroup.org/onlinepubs/9699919799/functions/dup2.html
#[derive(Debug)]
pub struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    /// Create a new pipe.
    ///
    /// Fails if the process (or system) ran out of file descriptors.
    pub fn new() -> io::Result<Pipe> {
        let mut fds: [libc::c_int; 2] = [-1, -1];
        _ = syscall!(pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC))?;
        // SAFETY: `pipe2` succeeded, so both descriptors are valid and owned
        // by us.
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        Ok(Pipe { read, write })
    }

    /// Returns the raw file descriptor of `end`.
    ///
    /// The descriptor is still owned by the `Pipe`.
    pub fn as_raw_fd(&self, end: PipeEnd) -> RawFd {
        match end {
            PipeEnd::Read => self.read.as_raw_fd(),
            PipeEnd::Write => self.write.as_raw_fd(),
        }
    }

    /// Split the pipe into its `(read, write)` ends.
    pub fn into_ends(self) -> (OwnedFd, OwnedFd) {
        (self.read, self.write)
    }
}

/// One of the two ends of a [`Pipe`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PipeEnd {
    /// Receiving side, data written to the write end can be read from here.
    Read,
    /// Sending side.
    Write,
}

impl PipeEnd {
    /// Returns the other end of the pipe.
    pub const fn other(self) -> PipeEnd {
        match self {
            PipeEnd::Read => PipeEnd::Write,
            PipeEnd::Write => PipeEnd::Read,
        }
    }
}

impl fmt::Display for PipeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipeEnd::Read => "read end",
            PipeEnd::Write => "write end",
        })
    }
}
