use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::queue::CommandReceiver;
use super::AlarmSubmitter;
use crate::remote::SubmissionOutcome;
use crate::store::{SharedStore, TriggerRecords};
use crate::{AlarmCommand, ArmState};

/// What one worker cycle did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tick {
    /// Command dequeued this cycle, if any.
    pub received: Option<AlarmCommand>,
    /// Submissions made this cycle, in order.
    pub submissions: Vec<(AlarmCommand, SubmissionOutcome)>,
}

/// Background loop turning queued commands and recorded detections into
/// alarm submissions.
pub struct DispatchWorker {
    commands: CommandReceiver,
    store: Arc<dyn SharedStore>,
    submitter: Box<dyn AlarmSubmitter>,
    cadence: Duration,
    standing: AlarmCommand,
    last_state: ArmState,
}

impl DispatchWorker {
    pub fn new(
        commands: CommandReceiver,
        store: Arc<dyn SharedStore>,
        submitter: Box<dyn AlarmSubmitter>,
        cadence: Duration,
    ) -> Self {
        Self {
            commands,
            store,
            submitter,
            cadence,
            standing: AlarmCommand::None,
            last_state: ArmState::Disarmed,
        }
    }

    /// Command currently in force.
    pub fn standing(&self) -> AlarmCommand {
        self.standing
    }

    /// Runs one cycle: waits up to the cadence for a command, applies it,
    /// then re-evaluates the standing command against the store.
    pub fn tick(&mut self) -> Tick {
        let mut tick = Tick::default();

        if let Some(command) = self.commands.next(self.cadence) {
            tick.received = Some(command);
            match command {
                AlarmCommand::Sos => {
                    // One shot: the standing command survives the interjection.
                    let previous = self.standing;
                    self.standing = AlarmCommand::Sos;
                    log::info!("SOS alarm requested");
                    let outcome = self.submitter.submit(AlarmCommand::Sos);
                    tick.submissions.push((AlarmCommand::Sos, outcome));
                    self.standing = previous;
                }
                other => {
                    log::debug!("standing command is now '{}'", other);
                    self.standing = other;
                }
            }
        }

        if let Some(submission) = self.evaluate() {
            tick.submissions.push(submission);
        }
        tick
    }

    fn evaluate(&mut self) -> Option<(AlarmCommand, SubmissionOutcome)> {
        if self.standing != AlarmCommand::Standard {
            return None;
        }

        match self.store.arm_state() {
            Ok(state) => self.last_state = state,
            Err(e) => log::warn!(
                "store unavailable, using last known state {:?}: {:#}",
                self.last_state,
                e
            ),
        }
        if !self.last_state.is_armed() {
            return None;
        }

        let device = match self.store.origin_device() {
            Ok(Some(device)) => device,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("could not read trigger device: {:#}", e);
                return None;
            }
        };

        log::info!(
            "alarm system is armed and a person was detected by {}",
            device
        );
        let outcome = self.submitter.submit(AlarmCommand::Standard);
        Some((AlarmCommand::Standard, outcome))
    }

    /// Runs until `stop` is raised. The flag is checked once per cycle, so
    /// an in-flight submission always completes.
    pub fn run(mut self, stop: &AtomicBool) {
        log::debug!("dispatch worker started (cadence {:?})", self.cadence);
        while !stop.load(Ordering::SeqCst) {
            self.tick();
        }
        log::debug!("dispatch worker stopped");
    }

    pub fn spawn(self) -> Result<WorkerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let join = std::thread::Builder::new()
            .name("dispatch-worker".to_string())
            .spawn(move || self.run(&stop_flag))
            .map_err(|e| anyhow!("failed to spawn dispatch worker: {}", e))?;
        Ok(WorkerHandle {
            stop,
            join: Some(join),
        })
    }
}

/// Owner side of a spawned [`DispatchWorker`].
pub struct WorkerHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Signals the worker and waits for its current cycle to finish.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("dispatch worker panicked"))?;
        }
        Ok(())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::command_queue;
    use crate::store::{FrameRecord, InMemoryStore};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<AlarmCommand>>>,
    }

    impl AlarmSubmitter for Recorder {
        fn submit(&self, command: AlarmCommand) -> SubmissionOutcome {
            self.calls.lock().expect("calls").push(command);
            SubmissionOutcome::Triggered { frame: None }
        }
    }

    fn worker(store: Arc<InMemoryStore>) -> (crate::CommandSender, DispatchWorker, Recorder) {
        let (tx, rx) = command_queue();
        let recorder = Recorder::default();
        let worker = DispatchWorker::new(
            rx,
            store,
            Box::new(recorder.clone()),
            Duration::from_millis(5),
        );
        (tx, worker, recorder)
    }

    #[test]
    fn idle_worker_submits_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let (_tx, mut worker, recorder) = worker(Arc::clone(&store));
        assert_eq!(worker.tick(), Tick::default());
        assert!(recorder.calls.lock().expect("calls").is_empty());
    }

    #[test]
    fn standing_alarm_fires_only_with_recorded_detection() {
        let store = Arc::new(InMemoryStore::new());
        store.set_arm_state(ArmState::Armed).expect("arm");
        let (tx, mut worker, recorder) = worker(Arc::clone(&store));
        tx.send(AlarmCommand::Standard).expect("send");

        let tick = worker.tick();
        assert_eq!(tick.received, Some(AlarmCommand::Standard));
        assert!(tick.submissions.is_empty());

        store
            .publish_trigger("porch", &FrameRecord::encode("ts", b"img"))
            .expect("publish");
        let tick = worker.tick();
        assert_eq!(tick.received, None);
        assert_eq!(tick.submissions.len(), 1);
        assert_eq!(*recorder.calls.lock().expect("calls"), vec![AlarmCommand::Standard]);
    }

    #[test]
    fn stale_detection_is_ignored_while_disarmed() {
        let store = Arc::new(InMemoryStore::new());
        store
            .publish_trigger("porch", &FrameRecord::encode("ts", b"img"))
            .expect("publish");
        let (tx, mut worker, recorder) = worker(Arc::clone(&store));
        tx.send(AlarmCommand::Standard).expect("send");
        worker.tick();
        assert!(recorder.calls.lock().expect("calls").is_empty());
    }

    #[test]
    fn sos_restores_previous_standing_command() {
        let store = Arc::new(InMemoryStore::new());
        let (tx, mut worker, recorder) = worker(Arc::clone(&store));
        tx.send(AlarmCommand::Standard).expect("send");
        worker.tick();
        tx.send(AlarmCommand::Sos).expect("send");
        let tick = worker.tick();
        assert_eq!(tick.submissions[0].0, AlarmCommand::Sos);
        assert_eq!(worker.standing(), AlarmCommand::Standard);
        assert_eq!(*recorder.calls.lock().expect("calls"), vec![AlarmCommand::Sos]);
    }

    #[test]
    fn store_outage_uses_last_known_state() {
        let store = Arc::new(InMemoryStore::new());
        store.set_arm_state(ArmState::Armed).expect("arm");
        let (tx, mut worker, recorder) = worker(Arc::clone(&store));
        tx.send(AlarmCommand::Standard).expect("send");
        worker.tick();
        store.set_offline(true);
        let tick = worker.tick();
        assert!(tick.submissions.is_empty());
        assert!(recorder.calls.lock().expect("calls").is_empty());
    }

    #[test]
    fn spawned_worker_stops_and_joins() {
        let store = Arc::new(InMemoryStore::new());
        let (tx, worker, recorder) = worker(Arc::clone(&store));
        let handle = worker.spawn().expect("spawn");
        tx.send(AlarmCommand::Sos).expect("send");
        std::thread::sleep(Duration::from_millis(50));
        handle.stop().expect("stop");
        assert_eq!(*recorder.calls.lock().expect("calls"), vec![AlarmCommand::Sos]);
    }
}
