// src/navigation/line_sensor.rs
// Four-channel line sensor array with per-channel moving-average filtering and
// edge latches for junction detection.

use nalgebra::Vector4;

use crate::hardware::{LineChannel, LineSensorCapability};

/// Fixed-window moving average over the four channels.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: Vec<Vector4<f32>>,
    cursor: usize,
    count: usize,
    totals: Vector4<f32>,
}

impl MovingAverage {
    /// Creates a filter averaging the last `size` samples. A zero size is treated as one.
    pub fn new(size: usize) -> Self {
        MovingAverage {
            window: vec![Vector4::zeros(); size.max(1)],
            cursor: 0,
            count: 0,
            totals: Vector4::zeros(),
        }
    }

    /// Push one sample, evicting the oldest once the window is full.
    pub fn add(&mut self, values: Vector4<f32>) {
        self.totals -= self.window[self.cursor];
        self.window[self.cursor] = values;
        self.totals += values;
        self.cursor = (self.cursor + 1) % self.window.len();
        if self.count < self.window.len() {
            self.count += 1;
        }
    }

    /// Mean of the samples held, zero before the first sample.
    pub fn average(&self) -> Vector4<f32> {
        if self.count == 0 {
            return Vector4::zeros();
        }
        self.totals / self.count as f32
    }

    /// Channels whose mean is strictly above `threshold`.
    pub fn threshold(&self, threshold: f32) -> [bool; 4] {
        let average = self.average();
        [0, 1, 2, 3].map(|i| average[i] > threshold)
    }
}

/// Filtered reading of the array, ordered left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineFrame {
    pub outer_left: bool,
    pub inner_left: bool,
    pub inner_right: bool,
    pub outer_right: bool,
}

impl LineFrame {
    pub fn from_array([outer_left, inner_left, inner_right, outer_right]: [bool; 4]) -> Self {
        LineFrame {
            outer_left,
            inner_left,
            inner_right,
            outer_right,
        }
    }

    /// Either outer sensor on the line
    pub fn any_outer(&self) -> bool {
        self.outer_left || self.outer_right
    }

    /// Both inner sensors on the line
    pub fn both_inner(&self) -> bool {
        self.inner_left && self.inner_right
    }

    /// 1.0 for each active channel
    pub fn as_vector(&self) -> Vector4<f32> {
        let level = |on: bool| if on { 1.0 } else { 0.0 };
        Vector4::new(
            level(self.outer_left),
            level(self.inner_left),
            level(self.inner_right),
            level(self.outer_right),
        )
    }
}

/// Line sensor array with filtering and edge latches.
pub struct LineSensorArray {
    sensors: Box<dyn LineSensorCapability>,
    filter: MovingAverage,
    threshold: f32,
    current: LineFrame,
    outer_latched: bool,
    inner_latched: bool,
}

impl LineSensorArray {
    pub fn new(sensors: Box<dyn LineSensorCapability>, window: usize, threshold: f32) -> Self {
        LineSensorArray {
            sensors,
            filter: MovingAverage::new(window),
            threshold,
            current: LineFrame::default(),
            outer_latched: false,
            inner_latched: false,
        }
    }

    /// Scan all four channels, feed the filter and return the thresholded frame.
    pub fn read(&mut self) -> LineFrame {
        let raw = LineChannel::ALL.map(|channel| self.sensors.read_digital(channel));
        self.filter.add(LineFrame::from_array(raw).as_vector());
        self.current = LineFrame::from_array(self.filter.threshold(self.threshold));
        self.current
    }

    /// Last filtered frame
    pub fn current(&self) -> LineFrame {
        self.current
    }

    /// `(outer, inner)` latches from the previous tick: any outer sensor, both inner sensors.
    pub fn rising_edge(&self) -> (bool, bool) {
        (self.outer_latched, self.inner_latched)
    }

    /// Latch the current frame. Call once per tick after the edges have been consumed.
    pub fn update_rising_edge(&mut self) {
        self.outer_latched = self.current.any_outer();
        self.inner_latched = self.current.both_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockLineSensorCapability;
    use rstest::rstest;

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(5)]
    fn constant_input_settles_exactly(#[case] window: usize) {
        let mut filter = MovingAverage::new(window);
        filter.add(Vector4::new(1.0, 0.0, 1.0, 0.0));
        let constant = Vector4::new(0.0, 1.0, 0.25, 1.0);
        for _ in 0..window {
            filter.add(constant);
        }
        assert_eq!(filter.average(), constant);
    }

    #[test]
    fn average_stays_within_samples() {
        let mut filter = MovingAverage::new(4);
        let samples = [0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        for (i, &s) in samples.iter().enumerate() {
            filter.add(Vector4::repeat(s));
            let seen = &samples[..=i];
            let lo = seen.iter().cloned().fold(f32::MAX, f32::min);
            let hi = seen.iter().cloned().fold(f32::MIN, f32::max);
            let avg = filter.average()[0];
            assert!(avg >= lo && avg <= hi);
        }
    }

    #[test]
    fn threshold_is_strict() {
        let mut filter = MovingAverage::new(2);
        filter.add(Vector4::new(1.0, 1.0, 0.0, 0.0));
        filter.add(Vector4::new(0.0, 1.0, 0.0, 0.0));
        assert_eq!(filter.threshold(0.5), [false, true, false, false]);
    }

    #[test]
    fn array_latches_edges_after_update() {
        let mut mock = MockLineSensorCapability::new();
        mock.expect_read_digital()
            .returning(|channel| matches!(channel, LineChannel::OuterLeft | LineChannel::InnerLeft | LineChannel::InnerRight));
        let mut array = LineSensorArray::new(Box::new(mock), 1, 0.5);

        let frame = array.read();
        assert!(frame.any_outer());
        assert!(frame.both_inner());
        assert_eq!(array.rising_edge(), (false, false));

        array.update_rising_edge();
        assert_eq!(array.rising_edge(), (true, true));
    }
}
