//! Module with the [`Os`] trait.

use std::io;
use std::process::ExitStatus;

use crate::pipe::Pipe;
use crate::process::{self, Child, Fork};

/// Operating system primitives used by a [`Pipeline`].
///
/// [`Unix`] is the implementation that actually calls the OS, which is what
/// is used by default. Other implementations, such as the one found in the
/// `test` module (requires the `test` feature), can be used to script
/// failures.
///
/// [`Pipeline`]: crate::Pipeline
pub trait Os {
    /// Create a new pipe.
    fn pipe(&mut self) -> io::Result<Pipe>;

    /// Fork the current process.
    ///
    /// If this returns [`Fork::Child`] the caller **must** replace the process
    /// image or exit, see [`process::fork`].
    fn fork(&mut self) -> io::Result<Fork>;

    /// Wait for `child` to exit.
    fn wait(&mut self, child: &mut Child) -> io::Result<ExitStatus>;

    /// Wait for any child process to exit, returning its process id.
    fn wait_any(&mut self) -> io::Result<(u32, ExitStatus)>;
}

/// The [`Os`] implementation that calls into the operating system.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unix;

impl Os for Unix {
    fn pipe(&mut self) -> io::Result<Pipe> {
        Pipe::new()
    }

    fn fork(&mut self) -> io::Result<Fork> {
        process::fork()
    }

    fn wait(&mut self, child: &mut Child) -> io::Result<ExitStatus> {
        child.wait()
    }

    /// # Notes
    ///
    /// This reaps *any* child of the calling process, including ones not
    /// created by a pipeline.
    fn wait_any(&mut self) -> io::Result<(u32, ExitStatus)> {
        process::wait_any().map(|(pid, status)| (pid as u32, status))
    }
}

impl<O: Os + ?Sized> Os for &mut O {
    fn pipe(&mut self) -> io::Result<Pipe> {
        (**self).pipe()
    }

    fn fork(&mut self) -> io::Result<Fork> {
        (**self).fork()
    }

    fn wait(&mut self, child: &mut Child) -> io::Result<ExitStatus> {
        (**self).wait(child)
    }

    fn wait_any(&mut self) -> io::Result<(u32, ExitStatus)> {
        (**self).wait_any()
    }
}
