//! Command queue and dispatch worker.
//!
//! The control panel never talks to the remote backend itself. It drops
//! [`AlarmCommand`](crate::AlarmCommand)s into an unbounded queue, and a
//! background [`DispatchWorker`] drains them at a fixed cadence, combines
//! them with what the shared store says, and hands alarm submissions to an
//! [`AlarmSubmitter`].

mod queue;
mod worker;

pub use queue::{command_queue, CommandReceiver, CommandSender};
pub use worker::{DispatchWorker, Tick, WorkerHandle};

use crate::remote::SubmissionOutcome;
use crate::AlarmCommand;

/// Performs one alarm submission for a command.
///
/// Implementations must not panic and must not retry; the worker's next
/// tick is the retry.
pub trait AlarmSubmitter: Send {
    fn submit(&self, command: AlarmCommand) -> SubmissionOutcome;
}

impl<S: AlarmSubmitter + ?Sized> AlarmSubmitter for Box<S> {
    fn submit(&self, command: AlarmCommand) -> SubmissionOutcome {
        (**self).submit(command)
    }
}
