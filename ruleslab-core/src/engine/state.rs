//! Mutable state carried bar to bar through one simulation pass.

/// Open-position bookkeeping. Exists only while in a position, so stale
/// stops or extrema cannot leak into the next trade.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_price: f64,
    pub entry_index: usize,
    pub initial_stop: f64,
    /// NEG_INFINITY when trailing is disabled.
    pub trailing_stop: f64,
    pub highest_high: f64,
    pub peak_close: f64,
}

impl OpenPosition {
    pub fn new(entry_price: f64, entry_index: usize, high: f64, atr: f64, k_init: f64, k_trail: Option<f64>) -> Self {
        let trailing_stop = match k_trail {
            Some(k) => high - k * atr,
            None => f64::NEG_INFINITY,
        };
        Self {
            entry_price,
            entry_index,
            initial_stop: entry_price - k_init * atr,
            trailing_stop,
            highest_high: high,
            peak_close: entry_price,
        }
    }

    /// Ratchet extrema and the trailing stop with the current bar.
    ///
    /// The trailing stop never moves down; a NaN ATR or high leaves it where it is.
    pub fn update(&mut self, high: f64, close: f64, atr: f64, k_trail: Option<f64>) {
        self.highest_high = self.highest_high.max(high);
        self.peak_close = self.peak_close.max(close);
        if let Some(k) = k_trail {
            let candidate = self.highest_high - k * atr;
            // f64::max ignores a NaN operand
            self.trailing_stop = self.trailing_stop.max(candidate);
        }
    }

    pub fn stop_price(&self) -> f64 {
        self.initial_stop.max(self.trailing_stop)
    }

    /// True when the trailing level is strictly above the initial stop.
    pub fn trailing_binding(&self) -> bool {
        self.trailing_stop > self.initial_stop
    }

    pub fn bars_held(&self, index: usize) -> usize {
        index - self.entry_index
    }
}

/// The only state carried across iterations.
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    pub open: Option<OpenPosition>,
    pub last_exit_index: Option<usize>,
}

impl SimulationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_position(&self) -> bool {
        self.open.is_some()
    }

    /// Cooldown holds when no exit has happened yet or enough bars have passed.
    pub fn cooldown_ok(&self, index: usize, cooldown_bars: usize) -> bool {
        match self.last_exit_index {
            Some(last) => index - last >= cooldown_bars,
            None => true,
        }
    }

    pub fn open(&mut self, position: OpenPosition) {
        debug_assert!(self.open.is_none(), "opening while already in position");
        self.open = Some(position);
    }

    /// Close the position and start the cooldown clock.
    pub fn close(&mut self, index: usize) -> Option<OpenPosition> {
        self.last_exit_index = Some(index);
        self.open.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_levels() {
        let pos = OpenPosition::new(130.0, 10, 131.0, 5.0, 2.0, Some(2.5));
        assert_eq!(pos.initial_stop, 120.0);
        assert_eq!(pos.trailing_stop, 118.5);
        assert_eq!(pos.stop_price(), 120.0);
        assert!(!pos.trailing_binding());
    }

    #[test]
    fn trailing_ratchets_up_only() {
        let mut pos = OpenPosition::new(100.0, 0, 100.0, 2.0, 2.0, Some(1.0));
        pos.update(110.0, 109.0, 2.0, Some(1.0));
        assert_eq!(pos.trailing_stop, 108.0);
        assert!(pos.trailing_binding());
        // Wider ATR would lower the candidate; stop holds.
        pos.update(105.0, 104.0, 10.0, Some(1.0));
        assert_eq!(pos.trailing_stop, 108.0);
        assert_eq!(pos.peak_close, 109.0);
    }

    #[test]
    fn nan_atr_leaves_trailing_unchanged() {
        let mut pos = OpenPosition::new(100.0, 0, 101.0, 2.0, 2.0, Some(1.0));
        let before = pos.trailing_stop;
        pos.update(120.0, 119.0, f64::NAN, Some(1.0));
        assert_eq!(pos.trailing_stop, before);
        assert_eq!(pos.highest_high, 120.0);
    }

    #[test]
    fn no_trailing_component() {
        let mut pos = OpenPosition::new(100.0, 0, 101.0, 2.0, 2.0, None);
        pos.update(150.0, 149.0, 2.0, None);
        assert_eq!(pos.stop_price(), 96.0);
        assert!(!pos.trailing_binding());
    }

    #[test]
    fn cooldown() {
        let mut state = SimulationState::new();
        assert!(state.cooldown_ok(0, 24));
        state.open(OpenPosition::new(1.0, 0, 1.0, 0.1, 2.0, None));
        assert!(state.close(5).is_some());
        assert!(!state.in_position());
        assert!(!state.cooldown_ok(28, 24));
        assert!(state.cooldown_ok(29, 24));
    }
}
