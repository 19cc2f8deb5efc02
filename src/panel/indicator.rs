/// Feedback surface of the control panel.
///
/// The panel reports what an operator should see; how it is shown (keypad
/// LEDs, a touch screen, a terminal) is up to the implementation. Every
/// method defaults to doing nothing.
pub trait Indicator: Send + Sync {
    /// Number of digits entered so far (0 clears the display).
    fn pin_length(&self, _len: usize) {}

    /// Entry overflowed and restarted.
    fn pin_overflow(&self) {}

    /// PIN accepted and arming countdown started.
    fn pin_accepted(&self) {}

    /// PIN matched no secret.
    fn pin_rejected(&self) {}

    /// Progress bar at `step` of `total`; zero clears it.
    fn progress(&self, _step: u32, _total: u32) {}

    fn armed_changed(&self, _armed: bool) {}

    fn fullscreen_changed(&self, _fullscreen: bool) {}
}

/// Indicator that shows nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullIndicator;

impl Indicator for NullIndicator {}
