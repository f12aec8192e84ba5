//! Module with [`Pipeline`], the type that runs the two stages.
//!
//! A pipeline goes through the following states (see [`State`]):
//!
//! ```text
//! Init → PipeCreated → ProducerForked → ConsumerForked → Waited → Done
//! ```
//!
//! Any failing system call in the parent stops the pipeline, returning an
//! [`Error`] that records the last state reached. Nothing is retried and
//! nothing already started is cleaned up: if forking the consumer fails the
//! producer is left running.

use std::process::ExitStatus;

use log::{debug, trace, warn};

use crate::command::Command;
use crate::error::Error;
use crate::os::{Os, Unix};
use crate::pipe::Pipe;
use crate::process::{Child, Fork};
use crate::stage::{self, Stage};


/// Setup a [`Pipeline`].
///
/// This type implements a builder pattern to build a `Pipeline`. It is
/// created via [`Pipeline::setup`]. By default it runs `ls -al | sort -n -k 5`
/// and waits for both stages.
#[derive(Debug)]
#[must_use = "`pipes::Setup` doesn't do anything until its `build`"]
pub struct Setup {
    producer: Command,
    consumer: Command,
    wait: WaitPolicy,
    close_unused_ends: bool,
}

impl Setup {
    /// See [`Pipeline::setup`].
    fn new() -> Setup {
        Setup {
            producer: Command::producer(),
            consumer: Command::consumer(),
            wait: WaitPolicy::All,
            close_unused_ends: true,
        }
    }

    /// Set the command of the first stage, defaults to [`Command::producer`].
    pub fn producer(mut self, command: Command) -> Setup {
        self.producer = command;
        self
    }

    /// Set the command of the second stage, defaults to
    /// [`Command::consumer`].
    pub fn consumer(mut self, command: Command) -> Setup {
        self.consumer = command;
        self
    }

    /// Set what to wait for, defaults to [`WaitPolicy::All`].
    pub const fn wait_for(mut self, policy: WaitPolicy) -> Setup {
        self.wait = policy;
        self
    }

    /// Don't close the unused end of the pipe in the stages.
    ///
    /// The unused end stays open in the executed commands, which means the
    /// consumer never sees the end of its input. Only useful to demonstrate
    /// why closing the unused end is required.
    #[doc(hidden)] // Not part of the stable API.
    pub const fn keep_unused_ends(mut self) -> Setup {
        self.close_unused_ends = false;
        self
    }

    /// Returns the command of the given `stage`.
    pub const fn command(&self, stage: Stage) -> &Command {
        match stage {
            Stage::Producer => &self.producer,
            Stage::Consumer => &self.consumer,
        }
    }

    /// Build the pipeline, using the [`Unix`] OS implementation.
    ///
    /// Returns an error if one of the commands contains a NUL byte.
    pub fn build(self) -> Result<Pipeline, Error> {
        self.build_with(Unix)
    }

    /// Build the pipeline using a custom [`Os`] implementation.
    pub fn build_with<O: Os>(self, os: O) -> Result<Pipeline<O>, Error> {
        for stage in [Stage::Producer, Stage::Consumer] {
            if self.command(stage).saw_nul() {
                return Err(Error::invalid_command(stage));
            }
        }
        Ok(Pipeline { os, setup: self })
    }
}

/// What the parent process waits for before returning.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum WaitPolicy {
    /// Wait for both stages to exit.
    #[default]
    All,
    /// Wait for any one child process to exit, whichever comes first. The
    /// other stage is left running.
    ///
    /// # Notes
    ///
    /// This uses a wait for *any* child of the calling process, which may
    /// reap processes not started by the pipeline.
    First,
}

/// State of the pipeline in the parent process.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum State {
    /// Nothing happened yet.
    Init,
    /// The pipe is created.
    PipeCreated,
    /// The producer process is forked.
    ProducerForked,
    /// The consumer process is forked.
    ConsumerForked,
    /// Waited on the stage(s).
    Waited,
    /// Done, all stages that are waited on have exited.
    Done,
}

/// Two commands connected by a pipe.
///
/// See the [crate documentation] for examples.
///
/// [crate documentation]: crate
#[derive(Debug)]
pub struct Pipeline<O = Unix> {
    os: O,
    setup: Setup,
}

impl Pipeline {
    /// Setup a new pipeline.
    ///
    /// See [`Setup`] for the available options.
    pub fn setup() -> Setup {
        Setup::new()
    }
}

impl<O: Os> Pipeline<O> {
    /// Spawn both stages, then wait for them according to the [`WaitPolicy`].
    pub fn run(self) -> Result<Report, Error> {
        self.spawn()?.wait()
    }

    /// Create the pipe and spawn both stages.
    ///
    /// The returned [`Running`] pipeline must be waited on to reap the stages.
    pub fn spawn(self) -> Result<Running<O>, Error> {
        let Pipeline { mut os, setup } = self;
        let mut state = State::Init;

        let pipe = os
            .pipe()
            .map_err(|err| Error::pipe_creation(err, state))?;
        state = transition(state, State::PipeCreated);

        let producer = fork_stage(&mut os, Stage::Producer, &pipe, &setup, state)?;
        state = transition(state, State::ProducerForked);

        let consumer = match fork_stage(&mut os, Stage::Consumer, &pipe, &setup, state) {
            Ok(consumer) => consumer,
            Err(err) => {
                warn!(pid = producer.id(); "failed to fork consumer, leaving producer running");
                return Err(err);
            }
        };
        state = transition(state, State::ConsumerForked);

        // Both stages have their own copies of the pipe. If we keep ours open
        // the consumer never sees the end of its input.
        drop(pipe);

        Ok(Running {
            os,
            producer,
            consumer,
            wait: setup.wait,
            state,
        })
    }
}

/// Fork the process for `stage`. In the child this never returns.
fn fork_stage<O: Os>(
    os: &mut O,
    stage: Stage,
    pipe: &Pipe,
    setup: &Setup,
    state: State,
) -> Result<Child, Error> {
    let command = setup.command(stage);
    match os.fork() {
        Ok(Fork::Parent(child)) => {
            debug!(pid = child.id(); "forked {stage} process to run '{command}'");
            Ok(child)
        }
        Ok(Fork::Child) => stage::exec(stage, pipe, command, setup.close_unused_ends),
        Err(err) => Err(Error::fork(stage, err, state)),
    }
}

fn transition(from: State, to: State) -> State {
    trace!("pipeline state {from:?} -> {to:?}");
    to
}

/// A spawned [`Pipeline`].
///
/// Created by [`Pipeline::spawn`]. Dropping this without calling
/// [`Running::wait`] leaves the stages running.
#[derive(Debug)]
#[must_use = "stages must be waited on"]
pub struct Running<O = Unix> {
    os: O,
    producer: Child,
    consumer: Child,
    wait: WaitPolicy,
    state: State,
}

impl<O: Os> Running<O> {
    /// Returns the current state of the pipeline, [`State::ConsumerForked`]
    /// until it's waited on. See [`Report::state`] for the final state.
    pub const fn state(&self) -> State {
        self.state
    }

    /// Returns the process of the producer.
    pub fn producer_mut(&mut self) -> &mut Child {
        &mut self.producer
    }

    /// Returns the process of the consumer.
    pub fn consumer_mut(&mut self) -> &mut Child {
        &mut self.consumer
    }

    /// Wait for the stage(s) to exit, according to the [`WaitPolicy`].
    ///
    /// A stage exiting unsuccessfully is **not** an error, check the returned
    /// [`Report`].
    pub fn wait(mut self) -> Result<Report, Error> {
        let state = self.state;
        let (producer, consumer) = match self.wait {
            WaitPolicy::All => {
                let producer = self
                    .os
                    .wait(&mut self.producer)
                    .map_err(|err| Error::wait(Some(Stage::Producer), err, state))?;
                debug!(pid = self.producer.id(); "producer exited: {producer}");
                let consumer = self
                    .os
                    .wait(&mut self.consumer)
                    .map_err(|err| Error::wait(Some(Stage::Consumer), err, state))?;
                debug!(pid = self.consumer.id(); "consumer exited: {consumer}");
                (Some(producer), Some(consumer))
            }
            WaitPolicy::First => self.wait_first()?,
        };
        let state = transition(state, State::Waited);
        Ok(Report {
            producer,
            consumer,
            state: transition(state, State::Done),
        })
    }

    fn wait_first(&mut self) -> Result<(Option<ExitStatus>, Option<ExitStatus>), Error> {
        loop {
            let (pid, status) = self
                .os
                .wait_any()
                .map_err(|err| Error::wait(None, err, self.state))?;
            if pid == self.producer.id() {
                debug!(pid = pid; "producer exited first: {status}");
                self.producer.set_status(status);
                return Ok((Some(status), None));
            } else if pid == self.consumer.id() {
                debug!(pid = pid; "consumer exited first: {status}");
                self.consumer.set_status(status);
                return Ok((None, Some(status)));
            }
            debug!(pid = pid; "reaped process not part of the pipeline: {status}");
        }
    }
}

/// Exit statuses of the stages of a [`Pipeline`].
///
/// A stage that wasn't waited on (see [`WaitPolicy::First`]) has no status.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Report {
    producer: Option<ExitStatus>,
    consumer: Option<ExitStatus>,
    state: State,
}

impl Report {
    /// Returns the state the pipeline ended in, always [`State::Done`].
    pub const fn state(&self) -> State {
        self.state
    }

    /// Returns the exit status of `stage`, if it was waited on.
    pub const fn status(&self, stage: Stage) -> Option<ExitStatus> {
        match stage {
            Stage::Producer => self.producer,
            Stage::Consumer => self.consumer,
        }
    }

    /// Returns `true` if all stages that were waited on exited successfully.
    pub fn success(&self) -> bool {
        self.iter().all(|(_, status)| status.success())
    }

    /// Iterate over all stages that were waited on and their exit status.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, ExitStatus)> + '_ {
        [Stage::Producer, Stage::Consumer]
            .into_iter()
            .filter_map(|stage| self.status(stage).map(|status| (stage, status)))
    }
}
