//! Operator control panel.
//!
//! Digits build a [`PinEntry`]; confirming compares it against the three
//! configured secrets and runs the matching action on a short-lived thread,
//! so the input path never blocks on the arming countdown or on hashing.
//!
//! ```text
//! Disarmed --arm pin--> CooldownPending --T ticks--> Armed --arm pin--> Disarmed
//!                             |  arm pin again: abort requested
//!                             +--T ticks--> Disarmed
//! ```
//!
//! An abort request does not shorten the countdown; it is only looked at
//! once every tick has elapsed. Arm and disarm transitions are serialized:
//! the arm state flips under the state lock before the store is touched, and
//! the store writes of one transition finish before the next one starts.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::config::{TimingSettings, WatchpostConfig};
use crate::dispatch::CommandSender;
use crate::store::{SharedStore, TriggerRecords};
use crate::{AlarmCommand, ArmState};

mod indicator;
mod pin;
mod secrets;

pub use indicator::{Indicator, NullIndicator};
pub use pin::{DigitOutcome, PinEntry, MAX_PIN_DIGITS};
pub use secrets::{hash_secret, hash_secret_with, PinMatch, SecretSet};

/// Steps shown by the SOS confirmation animation.
const SOS_PROGRESS_STEPS: u32 = 9;
const SOS_PROGRESS_MIDPOINT: u32 = 5;

/// A keypad key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Delete,
    Confirm,
}

impl Key {
    /// `0`-`9` are digits, `*` deletes, `#` confirms.
    pub fn from_char(c: char) -> Option<Key> {
        match c {
            '0'..='9' => c.to_digit(10).map(|d| Key::Digit(d as u8)),
            '*' => Some(Key::Delete),
            '#' => Some(Key::Confirm),
            _ => None,
        }
    }

    /// Parses a line of keypad input such as `1234#`, `1 2 3 4 ok` or `del`.
    pub fn parse_line(line: &str) -> Result<Vec<Key>> {
        let mut keys = Vec::new();
        for token in line.split_whitespace() {
            match token.to_ascii_lowercase().as_str() {
                "ok" | "enter" => keys.push(Key::Confirm),
                "del" | "delete" => keys.push(Key::Delete),
                _ => {
                    for c in token.chars() {
                        let key = Key::from_char(c)
                            .ok_or_else(|| anyhow!("unknown key '{}'", c))?;
                        keys.push(key);
                    }
                }
            }
        }
        Ok(keys)
    }
}

/// Transient state of an arming countdown. At most one exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CooldownSession {
    pub elapsed_ticks: u32,
    pub abort_requested: bool,
}

/// How a confirm was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Countdown completed and the system is armed.
    Armed,
    /// Countdown completed after an abort request; still disarmed.
    CooldownAborted,
    Disarmed,
    /// Arm PIN re-entered during a countdown.
    AbortRequested,
    SosSent,
    ScreenToggled { fullscreen: bool },
    Rejected,
}

#[derive(Debug, Default)]
struct PanelState {
    arm_state: ArmState,
    cooldown: Option<CooldownSession>,
    /// Set on shutdown; a countdown still running can no longer arm.
    closed: bool,
}

enum ArmStep {
    Disarm,
    StartCooldown,
    Abort,
    Closed,
}

struct PanelCore {
    store: Arc<dyn SharedStore>,
    commands: CommandSender,
    secrets: SecretSet,
    indicator: Arc<dyn Indicator>,
    timing: TimingSettings,
    state: Mutex<PanelState>,
    /// Held across the store writes of an arm or disarm. Taken before `state`.
    transition: Mutex<()>,
    pin: Mutex<PinEntry>,
    fullscreen: AtomicBool,
}

/// The control state machine.
#[derive(Clone)]
pub struct ControlPanel {
    core: Arc<PanelCore>,
}

impl ControlPanel {
    pub fn new(
        config: &WatchpostConfig,
        secrets: SecretSet,
        store: Arc<dyn SharedStore>,
        commands: CommandSender,
        indicator: Arc<dyn Indicator>,
    ) -> Self {
        Self {
            core: Arc::new(PanelCore {
                store,
                commands,
                secrets,
                indicator,
                timing: config.timing.clone(),
                state: Mutex::new(PanelState::default()),
                transition: Mutex::new(()),
                pin: Mutex::new(PinEntry::new()),
                fullscreen: AtomicBool::new(false),
            }),
        }
    }

    /// Handles one key. Confirm returns the handle of the thread resolving it.
    pub fn press(&self, key: Key) -> Option<JoinHandle<ConfirmOutcome>> {
        match key {
            Key::Digit(digit) => {
                let outcome = self.core.pin().push(digit);
                match outcome {
                    DigitOutcome::Appended(len) => self.core.indicator.pin_length(len),
                    DigitOutcome::Overflowed => {
                        self.core.indicator.pin_overflow();
                        self.core.indicator.pin_length(1);
                    }
                }
                None
            }
            Key::Delete => {
                self.core.pin().clear();
                self.core.indicator.pin_length(0);
                None
            }
            Key::Confirm => {
                let core = Arc::clone(&self.core);
                let spawned = std::thread::Builder::new()
                    .name("panel-confirm".to_string())
                    .spawn(move || core.confirm());
                match spawned {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        log::error!("could not start confirm handling: {}", e);
                        self.core.pin().clear();
                        self.core.indicator.pin_length(0);
                        None
                    }
                }
            }
        }
    }

    pub fn arm_state(&self) -> ArmState {
        self.core.state().arm_state
    }

    pub fn cooldown(&self) -> Option<CooldownSession> {
        self.core.state().cooldown
    }

    pub fn pin_len(&self) -> usize {
        self.core.pin().len()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.core.fullscreen.load(Ordering::SeqCst)
    }

    /// Disarms unconditionally and cancels any running countdown. Used when
    /// the panel process exits; later arm requests are refused.
    pub fn shutdown(&self) {
        let _transition = self.core.transition();
        {
            let mut state = self.core.state();
            state.closed = true;
            if let Some(session) = state.cooldown.as_mut() {
                session.abort_requested = true;
            }
            state.arm_state = ArmState::Disarmed;
        }
        self.core.disarm();
    }
}

impl PanelCore {
    fn state(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self) -> MutexGuard<'_, ()> {
        self.transition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pin(&self) -> MutexGuard<'_, PinEntry> {
        self.pin.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn confirm(&self) -> ConfirmOutcome {
        let entered = self.pin().take();
        let outcome = match self.secrets.classify(&entered) {
            PinMatch::ArmToggle => self.toggle_arm(),
            PinMatch::Sos => self.send_sos(),
            PinMatch::Resize => self.toggle_fullscreen(),
            PinMatch::None => self.reject(),
        };
        self.pin().clear();
        self.indicator.pin_length(0);
        outcome
    }

    fn toggle_arm(&self) -> ConfirmOutcome {
        let transition = self.transition();
        let step = {
            let mut state = self.state();
            if state.closed {
                ArmStep::Closed
            } else if let Some(session) = state.cooldown.as_mut() {
                session.abort_requested = true;
                session.elapsed_ticks = 0;
                ArmStep::Abort
            } else if state.arm_state.is_armed() {
                state.arm_state = ArmState::Disarmed;
                ArmStep::Disarm
            } else {
                state.cooldown = Some(CooldownSession::default());
                ArmStep::StartCooldown
            }
        };
        match step {
            ArmStep::Closed => {
                log::debug!("panel is shutting down, arm request ignored");
                ConfirmOutcome::Rejected
            }
            ArmStep::Abort => {
                log::info!("arming abort requested");
                self.indicator.armed_changed(false);
                ConfirmOutcome::AbortRequested
            }
            ArmStep::Disarm => {
                self.disarm();
                ConfirmOutcome::Disarmed
            }
            ArmStep::StartCooldown => {
                drop(transition);
                self.run_cooldown()
            }
        }
    }

    fn run_cooldown(&self) -> ConfirmOutcome {
        let total = self.timing.cooldown_ticks;
        log::info!("arming in {} ticks", total);
        self.indicator.pin_accepted();
        for tick in 1..=total {
            self.indicator.progress(tick, total);
            std::thread::sleep(self.timing.cooldown_tick);
            if let Some(session) = self.state().cooldown.as_mut() {
                if !session.abort_requested {
                    session.elapsed_ticks = tick;
                }
            }
        }
        self.indicator.progress(0, total);

        let _transition = self.transition();
        let proceed = {
            let mut state = self.state();
            let requested = state
                .cooldown
                .take()
                .map_or(false, |session| !session.abort_requested);
            let proceed = requested && !state.closed;
            if proceed {
                state.arm_state = ArmState::Armed;
            }
            proceed
        };
        if !proceed {
            log::info!("arming was aborted");
            return ConfirmOutcome::CooldownAborted;
        }
        self.arm();
        ConfirmOutcome::Armed
    }

    /// Store side of arming. The caller holds `transition` and has already
    /// recorded the armed state.
    fn arm(&self) {
        if let Err(e) = self.store.flush_all() {
            log::warn!("could not clear store before arming: {:#}", e);
        } else {
            log::debug!("store cleared");
        }
        if let Err(e) = self.commands.send(AlarmCommand::Standard) {
            log::error!("{:#}", e);
        }
        if !self.fullscreen.swap(true, Ordering::SeqCst) {
            self.indicator.fullscreen_changed(true);
        }
        if let Err(e) = self.store.set_arm_state(ArmState::Armed) {
            log::warn!("could not write armed status: {:#}", e);
        }
        self.indicator.armed_changed(true);
        log::info!("alarm system armed");
    }

    /// Store side of disarming. The caller holds `transition` and has already
    /// recorded the disarmed state.
    fn disarm(&self) {
        if let Err(e) = self.commands.send(AlarmCommand::None) {
            log::error!("{:#}", e);
        }
        self.indicator.armed_changed(false);
        if let Err(e) = self.store.set_arm_state(ArmState::Disarmed) {
            log::warn!("could not write disarmed status: {:#}", e);
        }
        log::info!("alarm system disarmed");
    }

    fn send_sos(&self) -> ConfirmOutcome {
        if let Err(e) = self.commands.send(AlarmCommand::Sos) {
            log::error!("{:#}", e);
        }
        log::info!("SOS alarm queued");
        let flash = self.timing.sos_flash;
        self.indicator
            .progress(SOS_PROGRESS_MIDPOINT, SOS_PROGRESS_STEPS);
        std::thread::sleep(flash / 3);
        self.indicator.progress(SOS_PROGRESS_STEPS, SOS_PROGRESS_STEPS);
        std::thread::sleep(flash.saturating_sub(flash / 3));
        self.indicator.progress(0, SOS_PROGRESS_STEPS);
        ConfirmOutcome::SosSent
    }

    fn toggle_fullscreen(&self) -> ConfirmOutcome {
        let fullscreen = !self.fullscreen.fetch_xor(true, Ordering::SeqCst);
        log::debug!("fullscreen {}", if fullscreen { "on" } else { "off" });
        self.indicator.fullscreen_changed(fullscreen);
        ConfirmOutcome::ScreenToggled { fullscreen }
    }

    fn reject(&self) -> ConfirmOutcome {
        log::debug!("pin rejected");
        self.indicator.pin_rejected();
        std::thread::sleep(self.timing.reject_flash);
        ConfirmOutcome::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{command_queue, CommandReceiver};
    use crate::store::{InMemoryStore, KEY_STATUS};
    use argon2::Params;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    fn quick(pin: &str) -> String {
        hash_secret_with(pin, Params::new(64, 1, 1, None).expect("params")).expect("hash")
    }

    fn panel(ticks: u32) -> (ControlPanel, Arc<InMemoryStore>, CommandReceiver) {
        let store = Arc::new(InMemoryStore::new());
        let (panel, rx) = panel_on(ticks, Arc::clone(&store) as Arc<dyn SharedStore>);
        (panel, store, rx)
    }

    fn panel_on(ticks: u32, store: Arc<dyn SharedStore>) -> (ControlPanel, CommandReceiver) {
        let mut cfg = WatchpostConfig::default();
        cfg.timing.cooldown_ticks = ticks;
        cfg.timing.cooldown_tick = Duration::from_millis(100);
        cfg.timing.reject_flash = Duration::from_millis(1);
        cfg.timing.sos_flash = Duration::from_millis(3);
        let secrets = SecretSet::new(&quick("1234"), &quick("9110"), &quick("0000")).expect("set");
        let (tx, rx) = command_queue();
        let panel = ControlPanel::new(&cfg, secrets, store, tx, Arc::new(NullIndicator));
        (panel, rx)
    }

    fn wait_until(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// In-memory store whose flush takes a while, like a slow redis.
    struct SlowFlushStore {
        inner: InMemoryStore,
        delay: Duration,
        flushes: AtomicUsize,
    }

    impl SharedStore for SlowFlushStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value)
        }

        fn exists(&self, key: &str) -> Result<bool> {
            self.inner.exists(key)
        }

        fn flush_all(&self) -> Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.inner.flush_all()
        }
    }

    fn enter(panel: &ControlPanel, digits: &str) -> JoinHandle<ConfirmOutcome> {
        for key in Key::parse_line(digits).expect("keys") {
            if let Some(handle) = panel.press(key) {
                return handle;
            }
        }
        panel.press(Key::Confirm).expect("confirm")
    }

    #[test]
    fn parse_line_accepts_keypad_notation() {
        assert_eq!(
            Key::parse_line("12#").expect("parse"),
            vec![Key::Digit(1), Key::Digit(2), Key::Confirm]
        );
        assert_eq!(
            Key::parse_line("4 del ok").expect("parse"),
            vec![Key::Digit(4), Key::Delete, Key::Confirm]
        );
        assert!(Key::parse_line("12x").is_err());
    }

    #[test]
    fn arm_then_disarm() {
        let (panel, store, rx) = panel(2);
        let outcome = enter(&panel, "1234").join().expect("join");
        assert_eq!(outcome, ConfirmOutcome::Armed);
        assert_eq!(panel.arm_state(), ArmState::Armed);
        assert_eq!(store.get(KEY_STATUS).expect("get").as_deref(), Some("1"));
        assert_eq!(rx.next(Duration::ZERO), Some(AlarmCommand::Standard));
        assert!(panel.is_fullscreen());
        assert_eq!(panel.pin_len(), 0);

        let outcome = enter(&panel, "1234").join().expect("join");
        assert_eq!(outcome, ConfirmOutcome::Disarmed);
        assert_eq!(store.get(KEY_STATUS).expect("get").as_deref(), Some("0"));
        assert_eq!(rx.next(Duration::ZERO), Some(AlarmCommand::None));
    }

    #[test]
    fn arming_flushes_the_store_first() {
        let (panel, store, _rx) = panel(1);
        store.set("trigger_dev", "stale").expect("seed");
        enter(&panel, "1234").join().expect("join");
        assert!(!store.exists("trigger_dev").expect("exists"));
    }

    #[test]
    fn sos_leaves_arm_state_alone() {
        let (panel, store, rx) = panel(1);
        let outcome = enter(&panel, "9110").join().expect("join");
        assert_eq!(outcome, ConfirmOutcome::SosSent);
        assert_eq!(panel.arm_state(), ArmState::Disarmed);
        assert!(store.write_log().is_empty());
        assert_eq!(rx.next(Duration::ZERO), Some(AlarmCommand::Sos));
    }

    #[test]
    fn resize_secret_toggles_fullscreen() {
        let (panel, _store, _rx) = panel(1);
        let outcome = enter(&panel, "0000").join().expect("join");
        assert_eq!(outcome, ConfirmOutcome::ScreenToggled { fullscreen: true });
        let outcome = enter(&panel, "0000").join().expect("join");
        assert_eq!(outcome, ConfirmOutcome::ScreenToggled { fullscreen: false });
    }

    #[test]
    fn wrong_pin_is_rejected_and_cleared() {
        let (panel, store, rx) = panel(1);
        let outcome = enter(&panel, "5555").join().expect("join");
        assert_eq!(outcome, ConfirmOutcome::Rejected);
        assert_eq!(panel.pin_len(), 0);
        assert!(store.write_log().is_empty());
        assert_eq!(rx.next(Duration::ZERO), None);
    }

    #[test]
    fn second_arm_pin_during_cooldown_requests_abort() {
        let (panel, store, rx) = panel(5);
        let first = enter(&panel, "1234");
        wait_until("countdown", || panel.cooldown().is_some());
        let second = enter(&panel, "1234").join().expect("join");
        assert_eq!(second, ConfirmOutcome::AbortRequested);
        let session = panel.cooldown().expect("session still running");
        assert!(session.abort_requested);
        assert_eq!(session.elapsed_ticks, 0);

        assert_eq!(first.join().expect("join"), ConfirmOutcome::CooldownAborted);
        assert!(panel.cooldown().is_none());
        assert_eq!(panel.arm_state(), ArmState::Disarmed);
        assert!(store.write_log().is_empty());
        assert_eq!(rx.next(Duration::ZERO), None);
    }

    #[test]
    fn shutdown_cancels_running_countdown() {
        let (panel, store, rx) = panel(3);
        let arming = enter(&panel, "1234");
        wait_until("countdown", || panel.cooldown().is_some());
        panel.shutdown();

        assert_eq!(arming.join().expect("join"), ConfirmOutcome::CooldownAborted);
        assert_eq!(panel.arm_state(), ArmState::Disarmed);
        assert_eq!(store.get(KEY_STATUS).expect("get").as_deref(), Some("0"));
        assert_eq!(rx.next(Duration::ZERO), Some(AlarmCommand::None));
        assert_eq!(rx.next(Duration::ZERO), None);

        let after = enter(&panel, "1234").join().expect("join");
        assert_eq!(after, ConfirmOutcome::Rejected);
        assert!(panel.cooldown().is_none());
        assert_eq!(store.get(KEY_STATUS).expect("get").as_deref(), Some("0"));
    }

    #[test]
    fn arm_pin_during_slow_commit_disarms_after_it() {
        let store = Arc::new(SlowFlushStore {
            inner: InMemoryStore::new(),
            delay: Duration::from_millis(300),
            flushes: AtomicUsize::new(0),
        });
        let (panel, rx) = panel_on(1, Arc::clone(&store) as Arc<dyn SharedStore>);
        let first = enter(&panel, "1234");
        wait_until("first flush", || store.flushes.load(Ordering::SeqCst) == 1);
        assert!(panel.cooldown().is_none());
        assert_eq!(panel.arm_state(), ArmState::Armed);

        let second = enter(&panel, "1234");
        assert_eq!(first.join().expect("join"), ConfirmOutcome::Armed);
        assert_eq!(second.join().expect("join"), ConfirmOutcome::Disarmed);

        assert_eq!(store.flushes.load(Ordering::SeqCst), 1);
        assert_eq!(panel.arm_state(), ArmState::Disarmed);
        assert_eq!(store.get(KEY_STATUS).expect("get").as_deref(), Some("0"));
        assert_eq!(rx.next(Duration::ZERO), Some(AlarmCommand::Standard));
        assert_eq!(rx.next(Duration::ZERO), Some(AlarmCommand::None));
    }

    #[test]
    fn shutdown_disarms() {
        let (panel, store, rx) = panel(1);
        panel.shutdown();
        assert_eq!(store.get(KEY_STATUS).expect("get").as_deref(), Some("0"));
        assert_eq!(rx.next(Duration::ZERO), Some(AlarmCommand::None));
    }
}
