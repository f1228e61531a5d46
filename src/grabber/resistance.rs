// src/grabber/resistance.rs
// Reel identification from the resistance measured across the jaw contacts.

use log::{info, warn};

use crate::config::ResistanceConfig;
use crate::hardware::ResistanceAdcCapability;

/// Reel type, identified by resistance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reel {
    Reel0,
    Reel1,
    Reel2,
    Reel3,
    /// Nothing measurable between the contacts
    OpenCircuit,
}

impl Reel {
    /// Zero-based reel number, `None` for an open circuit
    pub fn index(self) -> Option<usize> {
        match self {
            Reel::Reel0 => Some(0),
            Reel::Reel1 => Some(1),
            Reel::Reel2 => Some(2),
            Reel::Reel3 => Some(3),
            Reel::OpenCircuit => None,
        }
    }
}

/// Classifier states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResistanceState {
    /// Idle
    Rest,
    /// Collecting readings
    Open,
    /// Reel identified
    Detected,
}

/// Bucket a mean reading. Thresholds are checked from the highest level down.
pub fn classify(mean: f32, config: &ResistanceConfig) -> Reel {
    if mean > f32::from(config.reel1_threshold) {
        Reel::Reel1
    } else if mean > f32::from(config.reel3_threshold) {
        Reel::Reel3
    } else if mean > f32::from(config.reel0_threshold) {
        Reel::Reel0
    } else {
        Reel::Reel2
    }
}

/// Averages a handful of ADC readings into a reel type.
pub struct ResistanceClassifier {
    adc: Box<dyn ResistanceAdcCapability>,
    config: ResistanceConfig,
    state: ResistanceState,
    readings: Vec<u16>,
    open_circuit_count: u32,
    reel: Option<Reel>,
}

impl ResistanceClassifier {
    pub fn new(config: &ResistanceConfig, adc: Box<dyn ResistanceAdcCapability>) -> Self {
        ResistanceClassifier {
            adc,
            config: config.clone(),
            state: ResistanceState::Rest,
            readings: Vec::with_capacity(config.sample_count),
            open_circuit_count: 0,
            reel: None,
        }
    }

    pub fn state(&self) -> ResistanceState {
        self.state
    }

    /// Result of the last classification
    pub fn reel(&self) -> Option<Reel> {
        self.reel
    }

    /// Begin a fresh classification.
    pub fn start_sense(&mut self) {
        info!("Resistance: starting sense");
        self.readings.clear();
        self.open_circuit_count = 0;
        self.reel = None;
        self.state = ResistanceState::Open;
    }

    pub fn reset(&mut self) {
        self.readings.clear();
        self.open_circuit_count = 0;
        self.state = ResistanceState::Rest;
    }

    /// Take one reading while sensing.
    pub fn tick(&mut self) {
        if self.state != ResistanceState::Open {
            return;
        }

        let raw = self.adc.read_raw();
        if raw > self.config.open_circuit_value {
            self.open_circuit_count += 1;
            if self.open_circuit_count > self.config.fallback_count {
                warn!("Resistance: no usable reading, defaulting to reel 0");
                self.finish(Reel::Reel0);
            }
            return;
        }

        self.readings.push(raw);
        if self.readings.len() >= self.config.sample_count {
            let total: u32 = self.readings.iter().map(|&r| u32::from(r)).sum();
            let mean = total as f32 / self.readings.len() as f32;
            let reel = classify(mean, &self.config);
            info!("Resistance: {:?} from {:?}", reel, self.readings);
            self.finish(reel);
        }
    }

    fn finish(&mut self, reel: Reel) {
        self.reel = Some(reel);
        self.state = ResistanceState::Detected;
    }
}
