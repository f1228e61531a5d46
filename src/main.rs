// src/main.rs
// Entry point for the AGV: loads the configuration and runs the control loop on the
// host bench drivers until the mission finishes.

// Imports dependencies and AGV modules.
// - env_logger: logging, filtered with RUST_LOG.
// - agv_core: configuration, the Agv context and the bench drivers.
use agv_core::core::{Clock, SystemClock};
use agv_core::{Agv, AgvConfig, Bench, Hardware, MissionState};
use log::{error, info};
use std::error::Error;
use std::time::Duration;

// Safety stop for unattended bench runs
const MAX_PASSES: u64 = 200_000;

/// Runs the AGV. Optional first argument: path to a YAML config file.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    info!("Starting AGV core...");

    let config = match std::env::args().nth(1) {
        Some(path) => AgvConfig::from_yaml_file(path)?,
        None => AgvConfig::default(),
    };

    let clock = SystemClock::new();
    let bench = Bench::new();
    // Nobody stands at a bench button; start the run straight away.
    bench.press_button();

    let mut agv = Agv::new(&config, Hardware::bench(&bench), clock.now())?;
    let period = Duration::from_millis(config.control_period_ms());

    while !agv.is_finished() && agv.passes() < MAX_PASSES {
        agv.run_pass(clock.now());
        std::thread::sleep(period);
    }

    match agv.state() {
        MissionState::Fault(fault) => error!("Run ended with fault: {}", fault),
        state => info!("Run ended in {:?} after {} passes", state, agv.passes()),
    }
    Ok(())
}
