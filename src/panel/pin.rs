use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Longest PIN the keypad accepts before starting over.
pub const MAX_PIN_DIGITS: usize = 4;

/// Result of typing a digit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigitOutcome {
    /// Digit appended; entry now has this many digits.
    Appended(usize),
    /// Entry was full, so it restarted with just the new digit.
    Overflowed,
}

/// Digits typed since the last confirm or delete. Wiped on drop.
#[derive(Default, Zeroize, ZeroizeOnDrop)]
pub struct PinEntry {
    digits: String,
}

impl PinEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a digit (0-9). A fifth digit resets the entry first.
    pub fn push(&mut self, digit: u8) -> DigitOutcome {
        let ch = char::from(b'0' + digit.min(9));
        if self.digits.len() >= MAX_PIN_DIGITS {
            self.digits.zeroize();
            self.digits.push(ch);
            return DigitOutcome::Overflowed;
        }
        self.digits.push(ch);
        DigitOutcome::Appended(self.digits.len())
    }

    pub fn clear(&mut self) {
        self.digits.zeroize();
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// Moves the digits out for comparison, leaving the entry empty.
    pub fn take(&mut self) -> Zeroizing<String> {
        Zeroizing::new(std::mem::take(&mut self.digits))
    }
}

impl std::fmt::Debug for PinEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinEntry").field("len", &self.len()).finish()
    }
}
