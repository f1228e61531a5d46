// core/panel.rs

// Operator panel: the start/abort button and the four reel indicator LEDs.
// Both are polled; neither blocks.

// Dependencies
use log::debug;
use crate::config::PanelConfig;
use crate::core::clock::Timestamp;
use crate::grabber::Reel;
use crate::hardware::{ButtonCapability, IndicatorCapability};

// Number of indicator LEDs, one per reel type
pub const LED_COUNT: usize = 4;

// Latches a press and ignores the button for a while after it is consumed
pub struct ButtonDebouncer {
    button: Box<dyn ButtonCapability>,
    timeout_ms: u32,
    triggered: bool,
    consumed_at: Option<Timestamp>, // Start of the ignore window
}

impl ButtonDebouncer {
    pub fn new(button: Box<dyn ButtonCapability>, timeout_ms: u32) -> Self {
        ButtonDebouncer {
            button,
            timeout_ms,
            triggered: false,
            consumed_at: None,
        }
    }

    /// Sample the raw level; run from the debounce tick
    pub fn poll(&mut self, now: Timestamp) {
        if let Some(at) = self.consumed_at {
            if now.elapsed_since(at) < self.timeout_ms {
                return;
            }
        }
        if self.button.read_raw() {
            self.triggered = true;
        }
    }

    /// Take a latched press, starting the ignore window
    pub fn take_press(&mut self, now: Timestamp) -> bool {
        let pressed = self.triggered;
        if pressed {
            debug!("Button: press consumed");
            self.consumed_at = Some(now);
            self.triggered = false;
        }
        pressed
    }
}

// Pattern currently being shown
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pattern {
    Off,
    Strobe,
    Flash,
    Reel,
}

// Reel indicator LEDs with strobe and flash patterns
pub struct IndicatorPanel {
    leds: Box<dyn IndicatorCapability>,
    config: PanelConfig,
    pattern: Pattern,
    step: usize,             // Strobe position or flash phase
    last_step: Timestamp,
}

impl IndicatorPanel {
    pub fn new(config: &PanelConfig, leds: Box<dyn IndicatorCapability>) -> Self {
        IndicatorPanel {
            leds,
            config: config.clone(),
            pattern: Pattern::Off,
            step: 0,
            last_step: Timestamp::default(),
        }
    }

    /// Light only the LED for `reel`; an open circuit lights nothing
    pub fn show_reel(&mut self, reel: Reel) {
        self.leds.set_all(false);
        if let Some(index) = reel.index() {
            self.leds.set_one(index, true);
        }
        self.pattern = Pattern::Reel;
    }

    pub fn off(&mut self) {
        self.leds.set_all(false);
        self.pattern = Pattern::Off;
    }

    // True when a pattern step is due; restarts the pattern after a long pause
    fn step_due(&mut self, pattern: Pattern, interval_ms: u32, now: Timestamp) -> bool {
        let since = now.elapsed_since(self.last_step);
        if self.pattern == pattern && since < interval_ms {
            return false;
        }
        if self.pattern != pattern || since > self.config.pattern_reset_ms {
            self.leds.set_all(false);
            self.step = 0;
        }
        self.pattern = pattern;
        self.last_step = now;
        true
    }

    /// Advance the strobe: one LED at a time, in reel order
    pub fn strobe(&mut self, now: Timestamp) {
        if !self.step_due(Pattern::Strobe, self.config.strobe_interval_ms, now) {
            return;
        }
        self.leds.set_all(false);
        self.leds.set_one(self.step, true);
        self.step = (self.step + 1) % LED_COUNT;
    }

    /// Advance the flash: all LEDs toggling together
    pub fn flash(&mut self, now: Timestamp) {
        if !self.step_due(Pattern::Flash, self.config.flash_interval_ms, now) {
            return;
        }
        self.step = (self.step + 1) % 2;
        self.leds.set_all(self.step == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{Bench, MockButtonCapability};

    fn t(ms: u32) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn press_is_latched_until_taken() {
        let bench = Bench::new();
        let mut button = ButtonDebouncer::new(Box::new(bench.button()), 1_000);
        bench.press_button();
        button.poll(t(10));
        button.poll(t(15));
        assert!(button.take_press(t(20)));
        assert!(!button.take_press(t(25)));
    }

    #[test]
    fn presses_inside_timeout_are_ignored() {
        let mut raw = MockButtonCapability::new();
        raw.expect_read_raw().return_const(true);
        let mut button = ButtonDebouncer::new(Box::new(raw), 1_000);

        button.poll(t(0));
        assert!(button.take_press(t(0)));
        button.poll(t(500));
        assert!(!button.take_press(t(500)));
        button.poll(t(1_001));
        assert!(button.take_press(t(1_001)));
    }

    #[test]
    fn strobe_walks_the_leds() {
        let bench = Bench::new();
        let mut panel = IndicatorPanel::new(&PanelConfig::default(), Box::new(bench.indicator()));
        panel.strobe(t(1_000));
        assert_eq!(bench.leds(), [true, false, false, false]);
        panel.strobe(t(1_050));
        assert_eq!(bench.leds(), [true, false, false, false], "interval not elapsed");
        panel.strobe(t(1_150));
        assert_eq!(bench.leds(), [false, true, false, false]);
    }

    #[test]
    fn flash_toggles_and_reel_overrides() {
        let bench = Bench::new();
        let mut panel = IndicatorPanel::new(&PanelConfig::default(), Box::new(bench.indicator()));
        panel.flash(t(1_000));
        assert_eq!(bench.leds(), [true; 4]);
        panel.flash(t(1_250));
        assert_eq!(bench.leds(), [false; 4]);

        panel.show_reel(Reel::Reel2);
        assert_eq!(bench.leds(), [false, false, true, false]);
        panel.off();
        assert_eq!(bench.leds(), [false; 4]);
    }
}
