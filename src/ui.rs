//! Terminal output for the operator binaries.
//!
//! `Ui` reports startup stages; `TerminalIndicator` renders control panel
//! feedback (PIN stars, arming progress, armed status) on stderr.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use crate::panel::{Indicator, MAX_PIN_DIGITS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: &str) -> Self {
        match flag {
            "plain" => UiMode::Plain,
            "pretty" => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let pretty = is_tty && mode != UiMode::Plain;
        Self { pretty }
    }

    /// Mode from a `--ui` flag, checked against stderr being a terminal.
    pub fn from_flag(flag: &str) -> Self {
        Self::new(UiMode::parse(flag), std::io::stderr().is_terminal())
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.start.elapsed()));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Control panel feedback on the terminal.
///
/// In pretty mode a single status line shows the armed flag as prefix, a
/// progress bar for the arming countdown and the PIN stars as message.
/// Otherwise every change is printed as its own line.
pub struct TerminalIndicator {
    bar: Option<ProgressBar>,
}

impl TerminalIndicator {
    pub fn new(ui: &Ui) -> Self {
        if !ui.is_pretty() {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(0);
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template("{prefix:>9} [{bar:18}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_prefix("disarmed");
        bar.set_message(pin_stars(0));
        Self { bar: Some(bar) }
    }

    fn show(&self, message: String) {
        match &self.bar {
            Some(bar) => bar.set_message(message),
            None => eprintln!("panel: {}", message),
        }
    }
}

impl Indicator for TerminalIndicator {
    fn pin_length(&self, len: usize) {
        self.show(pin_stars(len));
    }

    fn pin_overflow(&self) {
        self.show("PIN too long, starting over".to_string());
    }

    fn pin_accepted(&self) {
        self.show("PIN accepted".to_string());
    }

    fn pin_rejected(&self) {
        self.show("wrong PIN".to_string());
    }

    fn progress(&self, step: u32, total: u32) {
        match &self.bar {
            Some(bar) => {
                bar.set_length(u64::from(total));
                bar.set_position(u64::from(step));
            }
            None if step > 0 => eprintln!("panel: {}/{}", step, total),
            None => {}
        }
    }

    fn armed_changed(&self, armed: bool) {
        let label = if armed { "ARMED" } else { "disarmed" };
        match &self.bar {
            Some(bar) => bar.set_prefix(label),
            None => eprintln!("panel: system {}", label),
        }
    }

    fn fullscreen_changed(&self, fullscreen: bool) {
        let state = if fullscreen { "fullscreen" } else { "windowed" };
        self.show(format!("display {}", state));
    }
}

fn pin_stars(len: usize) -> String {
    let filled = len.min(MAX_PIN_DIGITS);
    format!("{}{}", "*".repeat(filled), "_".repeat(MAX_PIN_DIGITS - filled))
}
