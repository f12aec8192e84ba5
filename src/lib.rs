//! Connect two commands with a Unix pipe.
//!
//! This crate does what a shell does for `ls -al | sort -n -k 5`: it creates
//! a [pipe], forks a *producer* child whose standard out is the write end of
//! the pipe, forks a *consumer* child whose standard in is the read end, and
//! waits for them to finish.
//!
//! [pipe]: https://pubs.opengroup.org/onlinepubs/9699919799/functions/pipe.html
//!
//! The root of the crate has two main types:
//!
//! - [`Setup`] is used to configure the pipeline, created via
//!   [`Pipeline::setup`].
//! - [`Pipeline`] runs the pipeline, either in one go using [`Pipeline::run`]
//!   or in two steps using [`Pipeline::spawn`] and [`Running::wait`].
//!
//! All interaction with the OS goes through the [`Os`] trait, [`Unix`] is the
//! implementation used by default.
//!
//! ## Examples
//!
//! Running the default pipeline, `ls -al | sort -n -k 5`, in the current
//! directory.
//!
//! ```no_run
//! use pipes::Pipeline;
//!
//! fn main() -> Result<(), pipes::Error> {
//!     let report = Pipeline::setup().build()?.run()?;
//!     assert!(report.success());
//!     Ok(())
//! }
//! ```
//!
//! Running different commands and waiting on them manually.
//!
//! ```no_run
//! use pipes::{Command, Pipeline};
//!
//! # fn main() -> Result<(), pipes::Error> {
//! let pipeline = Pipeline::setup()
//!     .producer(Command::new("printf").arg("b 2\\na 1\\n"))
//!     .consumer(Command::new("sort"))
//!     .build()?;
//!
//! let mut running = pipeline.spawn()?;
//! println!("consumer runs as process {}", running.consumer_mut().id());
//! let report = running.wait()?;
//! # _ = report;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! This crate has one optional feature: `test`. The `test` feature will enable
//! the `test` module which contains a scripted [`Os`] implementation.

#![warn(
    anonymous_parameters,
    bare_trait_objects,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    variant_size_differences
)]

#[cfg(not(target_os = "linux"))]
compile_error!("pipes currently only supports Linux.");

/// Helper macro to execute a system call that returns an `io::Result`.
macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)? ) ) => {{
        #[allow(unused_unsafe)]
        let res = unsafe { libc::$fn($( $arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

pub mod command;
pub mod error;
pub mod os;
pub mod pipe;
pub mod pipeline;
pub mod process;
pub mod stage;

#[doc(no_inline)]
pub use command::Command;
#[doc(no_inline)]
pub use error::{Error, StageError};
#[doc(no_inline)]
pub use os::{Os, Unix};
#[doc(no_inline)]
pub use pipe::{Pipe, PipeEnd};
#[doc(no_inline)]
pub use pipeline::{Pipeline, Report, Running, Setup, State, WaitPolicy};
#[doc(no_inline)]
pub use process::{Child, Fork};
#[doc(no_inline)]
pub use stage::Stage;
