//! Module containing the error types.
//!
//! There are two kinds of errors: [`Error`] is returned to the parent process,
//! e.g. if a pipe can't be created or a process can't be forked.
//! [`StageError`] are errors that happen inside a forked child before it
//! executes its command. Those can't be returned, instead they are written to
//! standard error and the child exits with status 1.

use std::{fmt, io};

use crate::pipeline::State;
use crate::stage::Stage;

/// Error returned by running a [`Pipeline`].
///
/// [`Pipeline`]: crate::Pipeline
pub struct Error {
    inner: ErrorInner,
    /// Last state reached before the error occurred.
    state: State,
}

/// Inside of `Error` error.
enum ErrorInner {
    /// Command of the stage contains a NUL byte.
    InvalidCommand(Stage),
    /// Error creating the pipe.
    PipeCreation(io::Error),
    /// Error forking the process for the stage.
    Fork(Stage, io::Error),
    /// Error waiting on the process of the stage, or any child if `None`.
    Wait(Option<Stage>, io::Error),
}

impl Error {
    pub(crate) const fn invalid_command(stage: Stage) -> Error {
        Error {
            inner: ErrorInner::InvalidCommand(stage),
            state: State::Init,
        }
    }

    pub(crate) const fn pipe_creation(err: io::Error, state: State) -> Error {
        Error {
            inner: ErrorInner::PipeCreation(err),
            state,
        }
    }

    pub(crate) const fn fork(stage: Stage, err: io::Error, state: State) -> Error {
        Error {
            inner: ErrorInner::Fork(stage, err),
            state,
        }
    }

    pub(crate) const fn wait(stage: Option<Stage>, err: io::Error, state: State) -> Error {
        Error {
            inner: ErrorInner::Wait(stage, err),
            state,
        }
    }

    /// Returns the last state the pipeline reached before failing.
    ///
    /// For example a failure to create the pipe always returns
    /// [`State::Init`], as nothing was forked yet.
    pub const fn state(&self) -> State {
        self.state
    }

    /// Returns the stage the error relates to, if any.
    pub const fn stage(&self) -> Option<Stage> {
        match self.inner {
            ErrorInner::InvalidCommand(stage) | ErrorInner::Fork(stage, _) => Some(stage),
            ErrorInner::Wait(stage, _) => stage,
            ErrorInner::PipeCreation(_) => None,
        }
    }

    /// Returns `true` if the error was caused by failing to create the pipe.
    pub const fn is_pipe_creation(&self) -> bool {
        matches!(self.inner, ErrorInner::PipeCreation(_))
    }

    /// Returns `true` if the error was caused by failing to fork a process.
    pub const fn is_fork(&self) -> bool {
        matches!(self.inner, ErrorInner::Fork(..))
    }

    /// Returns `true` if the error was caused by failing to wait on a
    /// process.
    pub const fn is_wait(&self) -> bool {
        matches!(self.inner, ErrorInner::Wait(..))
    }
}

/// We implement [`Debug`] by using [`Display`] implementation because the
/// [`Termination`] trait uses `Debug` rather then `Display` when returning an
/// `Result`.
///
/// [`Termination`]: std::process::Termination
/// [`Debug`]: std::fmt::Debug
/// [`Display`]: std::fmt::Display
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DESC: &str = "error running pipeline";
        match self.inner {
            ErrorInner::InvalidCommand(stage) => {
                write!(f, "{DESC}: {stage} command contains a NUL byte")
            }
            ErrorInner::PipeCreation(ref err) => write!(f, "{DESC}: failed to create pipe: {err}"),
            ErrorInner::Fork(stage, ref err) => write!(f, "{DESC}: failed to fork {stage}: {err}"),
            ErrorInner::Wait(Some(stage), ref err) => {
                write!(f, "{DESC}: failed to wait on {stage}: {err}")
            }
            ErrorInner::Wait(None, ref err) => {
                write!(f, "{DESC}: failed to wait on child process: {err}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.inner {
            // All `io::Error`.
            ErrorInner::PipeCreation(ref err)
            | ErrorInner::Fork(_, ref err)
            | ErrorInner::Wait(_, ref err) => Some(err),
            ErrorInner::InvalidCommand(_) => None,
        }
    }
}

/// Error in a forked child, before it replaced its process image.
///
/// Each variant holds the `errno` of the failed system call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StageError {
    /// Failed to close the unused end of the pipe.
    DescriptorClose(i32),
    /// Failed to redirect standard in or out to the pipe.
    Redirect(i32),
    /// Failed to execute the command.
    Exec(i32),
}

impl StageError {
    /// Create a `StageError` from `err`, using `kind` to select the variant.
    pub(crate) fn from_io(kind: fn(i32) -> StageError, err: &io::Error) -> StageError {
        kind(err.raw_os_error().unwrap_or(0))
    }

    /// Fixed message describing the failed call.
    pub const fn message(self) -> &'static str {
        match self {
            StageError::DescriptorClose(_) => "close call failed",
            StageError::Redirect(_) => "dup2 call failed",
            StageError::Exec(_) => "exec call failed",
        }
    }

    /// Returns the `errno` of the failed call.
    pub const fn raw_os_error(self) -> i32 {
        match self {
            StageError::DescriptorClose(errno)
            | StageError::Redirect(errno)
            | StageError::Exec(errno) => errno,
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (os error {})", self.message(), self.raw_os_error())
    }
}

impl std::error::Error for StageError {}
