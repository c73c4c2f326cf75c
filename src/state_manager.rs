// State Manager - Thread-safe engine handle
// Owns the background frame loop and exposes the command surface used by a
// renderer or host application.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::catalog::{NeoRecord, ParsedElements};
use crate::clock::{SystemClock, TimeSource};
use crate::config::EngineConfig;
use crate::countdown::{CountdownLabel, ImpactEpoch};
use crate::error::EngineError;
use crate::physics_engine::{OrbitPath, OrbitalElements};
use crate::simulation::{Engine, FrameReport, TickControls};

// =============================================================================
// ENGINE HANDLE
// =============================================================================

/// Shared engine plus the background thread that drives `frame()`.
pub struct EngineHandle {
    pub engine: Arc<RwLock<Engine>>,
    pub is_running: Arc<RwLock<bool>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    frame_interval: Duration,
}

impl EngineHandle {
    pub fn new(config: EngineConfig, clock: Arc<dyn TimeSource>) -> Self {
        let frame_interval = Duration::from_millis(config.frame_interval_ms.max(1));
        Self {
            engine: Arc::new(RwLock::new(Engine::new(config, clock))),
            is_running: Arc::new(RwLock::new(false)),
            worker: Mutex::new(None),
            frame_interval,
        }
    }

    pub fn with_system_clock(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    /// Start the frame loop. Calling it while already running is a no-op.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        // Time spent before the loop starts is not simulated
        self.engine.write().rebase_timer();
        *self.is_running.write() = true;

        let engine = self.engine.clone();
        let is_running = self.is_running.clone();
        let frame_interval = self.frame_interval;

        let spawned = thread::Builder::new()
            .name("neo-engine-frames".into())
            .spawn(move || run_frame_loop(engine, is_running, frame_interval));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                info!(frame_interval_ms = frame_interval.as_millis() as u64, "frame loop started");
                Ok(())
            }
            Err(e) => {
                *self.is_running.write() = false;
                Err(EngineError::Spawn(e))
            }
        }
    }

    /// Stop the frame loop and wait for the thread to exit. Idempotent.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        *self.is_running.write() = false;

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                warn!("frame loop thread panicked");
            }
            info!("frame loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    pub fn load_elements(&self, elements: OrbitalElements) -> bool {
        self.engine.write().load_elements(elements)
    }

    pub fn load_record(&self, record: &NeoRecord) -> ParsedElements {
        self.engine.write().load_record(record)
    }

    pub fn set_impact_epoch(&self, epoch: Option<ImpactEpoch>) -> bool {
        self.engine.write().set_impact_epoch(epoch)
    }

    pub fn set_tick_controls(&self, controls: TickControls) -> bool {
        self.engine.write().set_tick_controls(controls)
    }

    pub fn resume(&self) -> bool {
        self.engine.write().resume()
    }

    /// Run one frame on the calling thread. Used when no loop is running.
    pub fn step(&self) -> FrameReport {
        self.engine.write().frame().clone()
    }

    pub fn report(&self) -> FrameReport {
        self.engine.read().report().clone()
    }

    pub fn snapshot(&self) -> FrontendState {
        self.engine.read().to_frontend()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// FRAME LOOP (runs in background thread)
// =============================================================================

fn run_frame_loop(engine: Arc<RwLock<Engine>>, is_running: Arc<RwLock<bool>>, frame_interval: Duration) {
    let mut was_paused = false;

    loop {
        if !*is_running.read() {
            break;
        }
        let start = Instant::now();

        let is_paused = {
            let mut engine = engine.write();
            engine.frame().is_paused
        };
        if is_paused != was_paused {
            debug!(is_paused, "frame loop pause state changed");
            was_paused = is_paused;
        }

        // Sleep to maintain frame rate
        let elapsed = start.elapsed();
        if elapsed < frame_interval {
            thread::sleep(frame_interval - elapsed);
        }
    }
}

// =============================================================================
// SERIALIZABLE STATE FOR FRONTEND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendBody {
    pub id: String,
    pub name: String,
    pub body_type: String,
    pub position: [f64; 3], // scene units (AU), Y-up
    pub marker_radius: f64, // scene units (AU)
    pub diameter_m: Option<f64>,
    pub path: Vec<[f64; 3]>,
    pub is_hazardous: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendState {
    pub bodies: Vec<FrontendBody>,
    pub frame: u64,
    pub simulated_elapsed_secs: f64,
    pub is_paused: bool,
    pub has_detected_proximity: bool,
    pub time_scale: f64,
    pub countdown: CountdownLabel,
    pub distance_au: f64,
}

fn scene_path(path: &OrbitPath) -> Vec<[f64; 3]> {
    path.points.iter().map(|p| p.to_scene()).collect()
}

impl Engine {
    pub fn to_frontend(&self) -> FrontendState {
        let sim = self.simulation();
        let config = sim.config();
        let report = self.report();

        let (id, name, diameter_m, is_hazardous) = match self.selected() {
            Some(selected) => (
                selected.id.clone(),
                selected.name.clone(),
                selected.diameter_m,
                selected.is_hazardous,
            ),
            None => ("asteroid".to_string(), "Asteroid".to_string(), None, false),
        };

        let bodies = vec![
            FrontendBody {
                id: "earth".to_string(),
                name: "Earth".to_string(),
                body_type: "Planet".to_string(),
                position: report.earth_position.to_scene(),
                marker_radius: config.earth_marker_radius,
                diameter_m: None,
                path: scene_path(sim.earth_path()),
                is_hazardous: false,
            },
            FrontendBody {
                id,
                name,
                body_type: "Asteroid".to_string(),
                position: report.asteroid_position.to_scene(),
                marker_radius: config.asteroid_marker_radius,
                diameter_m,
                path: scene_path(sim.asteroid_path()),
                is_hazardous,
            },
        ];

        FrontendState {
            bodies,
            frame: report.frame,
            simulated_elapsed_secs: report.simulated_elapsed_secs,
            is_paused: report.is_paused,
            has_detected_proximity: report.has_detected_proximity,
            time_scale: sim.controls().effective_time_scale(),
            countdown: report.countdown.clone(),
            distance_au: sim.separation(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
