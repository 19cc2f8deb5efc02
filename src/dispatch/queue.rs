use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::AlarmCommand;

/// Creates the panel to worker command queue. Unbounded: enqueueing never blocks.
pub fn command_queue() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (CommandSender { tx }, CommandReceiver { rx })
}

#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: Sender<AlarmCommand>,
}

impl CommandSender {
    /// Fails only when the worker side has been dropped.
    pub fn send(&self, command: AlarmCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| anyhow!("dispatch worker is gone, dropped '{}' command", command))
    }
}

#[derive(Debug)]
pub struct CommandReceiver {
    rx: Receiver<AlarmCommand>,
}

impl CommandReceiver {
    /// Waits up to `wait` for the next command.
    ///
    /// Once every sender is gone this still waits the full duration, so
    /// callers keep their cadence instead of spinning.
    pub fn next(&self, wait: Duration) -> Option<AlarmCommand> {
        match self.rx.recv_timeout(wait) {
            Ok(command) => Some(command),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(wait);
                None
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn commands_arrive_in_order() {
        let (tx, rx) = command_queue();
        tx.send(AlarmCommand::Standard).expect("send");
        tx.send(AlarmCommand::Sos).expect("send");
        assert_eq!(rx.pending(), 2);
        assert_eq!(rx.next(Duration::ZERO), Some(AlarmCommand::Standard));
        assert_eq!(rx.next(Duration::ZERO), Some(AlarmCommand::Sos));
        assert_eq!(rx.next(Duration::from_millis(5)), None);
    }

    #[test]
    fn disconnected_queue_still_paces_the_caller() {
        let (tx, rx) = command_queue();
        drop(tx);
        let started = Instant::now();
        assert_eq!(rx.next(Duration::from_millis(30)), None);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn send_fails_once_receiver_dropped() {
        let (tx, rx) = command_queue();
        drop(rx);
        assert!(tx.send(AlarmCommand::None).is_err());
    }
}
