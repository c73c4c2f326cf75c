// NEO Impact Engine - Orbit propagation and impact-proximity simulation
// Library entry point plus the headless runner used by the binary

pub mod catalog;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod error;
pub mod physics_engine;
pub mod simulation;
pub mod state_manager;

use std::thread;
use std::time::Duration;
use tracing::{info, warn};

pub use catalog::{fallback_records, find_fallback, NeoRecord, ParsedElements};
pub use clock::{ManualClock, SystemClock, TimeSource};
pub use config::{EngineConfig, RunnerConfig};
pub use countdown::{CountdownLabel, ImpactEpoch};
pub use error::{ConfigError, EngineError, EpochParseError};
pub use physics_engine::{OrbitalElements, Vector3};
pub use simulation::{BodyControls, Direction, Engine, FrameReport, TickControls};
pub use state_manager::{EngineHandle, FrontendState};

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Safe to call more than once.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Headless runner: load a built-in scenario, drive the frame loop for a
/// while and print a JSON snapshot once per second.
pub fn run() -> Result<(), EngineError> {
    init_tracing();

    let config = EngineConfig::from_env()?;
    let runner = RunnerConfig::from_env()?;

    let handle = EngineHandle::with_system_clock(config);
    match find_fallback(&runner.scenario) {
        Some(record) => {
            let parsed = handle.load_record(&record);
            info!(
                id = %record.id,
                name = %record.name,
                defaulted = parsed.is_defaulted(),
                "scenario loaded"
            );
        }
        None => warn!(scenario = %runner.scenario, "unknown scenario, using showcase orbit"),
    }

    handle.start()?;
    for _ in 0..runner.run_seconds {
        thread::sleep(Duration::from_secs(1));
        let state = handle.snapshot();
        match serde_json::to_string(&state) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!(error = %e, "failed to serialize snapshot"),
        }
    }
    handle.stop();

    Ok(())
}
