// Simulation - Stepper, Proximity Detector and Frame Orchestrator
// Advances two independent mean-anomaly accumulators (asteroid, Earth) once
// per frame and pauses on the first marker contact.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{NeoRecord, ParsedElements};
use crate::clock::{FrameTimer, TimeSource};
use crate::config::EngineConfig;
use crate::countdown::{CountdownLabel, CountdownReconciler, ImpactEpoch};
use crate::physics_engine::{
    position_on_orbit, solve_true_anomaly, OrbitPath, OrbitalElements, Vector3, EARTH_MEAN_MOTION,
};

// =============================================================================
// TICK CONTROLS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

/// Per-body rate controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyControls {
    /// Multiplier on the body's mean motion (≥ 0)
    pub speed_multiplier: f64,
    pub direction: Direction,
}

impl BodyControls {
    pub fn new(speed_multiplier: f64, direction: Direction) -> Self {
        Self {
            speed_multiplier,
            direction,
        }
    }

    /// Signed multiplier applied to the mean motion.
    pub fn rate(&self) -> f64 {
        self.direction.sign() * self.speed_multiplier
    }
}

impl Default for BodyControls {
    fn default() -> Self {
        Self::new(1.0, Direction::Forward)
    }
}

/// External knobs read on every tick. Not owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickControls {
    pub asteroid: BodyControls,
    pub earth: BodyControls,
    /// Simulated seconds per wall-clock second
    pub time_scale: f64,
    /// Forces a 1:1 mapping to wall-clock seconds, ignoring `time_scale`
    pub real_time: bool,
}

impl TickControls {
    pub fn with_time_scale(time_scale: f64) -> Self {
        Self {
            time_scale,
            ..Self::default()
        }
    }

    pub fn effective_time_scale(&self) -> f64 {
        if self.real_time {
            1.0
        } else {
            self.time_scale
        }
    }

    /// Clamp every knob into the range the config allows.
    pub fn normalized(&self, config: &EngineConfig) -> Self {
        Self {
            asteroid: BodyControls::new(
                config.clamp_speed(self.asteroid.speed_multiplier),
                self.asteroid.direction,
            ),
            earth: BodyControls::new(
                config.clamp_speed(self.earth.speed_multiplier),
                self.earth.direction,
            ),
            time_scale: config.clamp_time_scale(self.time_scale),
            real_time: self.real_time,
        }
    }
}

impl Default for TickControls {
    fn default() -> Self {
        Self {
            asteroid: BodyControls::default(),
            earth: BodyControls::default(),
            time_scale: EngineConfig::default().default_time_scale,
            real_time: false,
        }
    }
}

// =============================================================================
// SIMULATION STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Running,
    /// Entered only through the proximity detector; left only through `resume`
    Paused,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Unbounded accumulator; wrapped only when handed to the solver
    pub asteroid_mean_anomaly: f64,
    /// Unbounded accumulator; wrapped only when handed to the solver
    pub earth_mean_anomaly: f64,
    pub phase: RunPhase,
    /// Sticky until new elements or a new epoch are loaded
    pub has_detected_proximity: bool,
    /// Simulated seconds since the current elements were loaded
    pub simulated_elapsed_secs: f64,
}

impl SimulationState {
    pub fn is_paused(&self) -> bool {
        self.phase == RunPhase::Paused
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Bodies moved, no contact
    Advanced,
    /// Bodies moved and the markers touched for the first time
    ProximityDetected { distance: f64 },
    /// Nothing moved
    Paused,
}

// =============================================================================
// STEPPER + PROXIMITY DETECTOR
// =============================================================================

/// Two-body stepper over a fixed element set.
///
/// Earth rides the unit circle at the reference mean motion; the asteroid
/// rides its own ellipse at `mean_motion(a)`. The two are integrated
/// independently with their own speed and direction.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: EngineConfig,
    elements: OrbitalElements,
    earth_elements: OrbitalElements,
    asteroid_path: OrbitPath,
    earth_path: OrbitPath,
    controls: TickControls,
    state: SimulationState,
    asteroid_position: Vector3,
    earth_position: Vector3,
}

impl Simulation {
    pub fn new(config: EngineConfig, elements: OrbitalElements) -> Self {
        let elements = elements.sanitized().with_max_eccentricity(config.max_eccentricity);
        let earth_elements = OrbitalElements::earth();
        let controls = TickControls::with_time_scale(config.default_time_scale).normalized(&config);

        let mut sim = Self {
            asteroid_path: OrbitPath::sample(&elements, config.path_samples),
            earth_path: OrbitPath::sample(&earth_elements, config.path_samples),
            config,
            elements,
            earth_elements,
            controls,
            state: SimulationState::default(),
            asteroid_position: Vector3::zero(),
            earth_position: Vector3::zero(),
        };
        sim.update_positions();
        sim
    }

    /// Replace the element set. Returns false for an identical set, which
    /// leaves the running simulation untouched.
    pub fn load_elements(&mut self, elements: OrbitalElements) -> bool {
        let elements = elements.sanitized().with_max_eccentricity(self.config.max_eccentricity);
        if elements == self.elements {
            return false;
        }

        self.elements = elements;
        self.asteroid_path = OrbitPath::sample(&elements, self.config.path_samples);
        self.reset();
        info!(
            a = elements.semi_major_axis,
            e = elements.eccentricity,
            i = elements.inclination,
            "loaded orbital elements"
        );
        true
    }

    /// Hard reset: running, both anomalies and elapsed time zeroed, detector re-armed.
    pub fn reset(&mut self) {
        self.state = SimulationState::default();
        self.update_positions();
    }

    /// Returns false when the controls are unchanged.
    pub fn set_controls(&mut self, controls: TickControls) -> bool {
        let controls = controls.normalized(&self.config);
        if controls == self.controls {
            return false;
        }
        debug!(?controls, "tick controls updated");
        self.controls = controls;
        true
    }

    /// Leave the paused state. The detector stays disarmed.
    pub fn resume(&mut self) -> bool {
        if !self.state.is_paused() {
            return false;
        }
        self.state.phase = RunPhase::Running;
        info!(
            asteroid_mean_anomaly = self.state.asteroid_mean_anomaly,
            "simulation resumed"
        );
        true
    }

    /// Advance both bodies by `dt` wall-clock seconds.
    pub fn tick(&mut self, dt: f64) -> TickOutcome {
        if self.state.is_paused() {
            return TickOutcome::Paused;
        }

        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.config.max_frame_delta_secs)
        } else {
            0.0
        };
        let simulated_dt = dt * self.controls.effective_time_scale();

        self.state.earth_mean_anomaly += self.controls.earth.rate() * EARTH_MEAN_MOTION * simulated_dt;
        self.state.asteroid_mean_anomaly +=
            self.controls.asteroid.rate() * self.elements.mean_motion() * simulated_dt;
        self.state.simulated_elapsed_secs += simulated_dt;
        self.update_positions();

        self.detect_proximity()
    }

    fn update_positions(&mut self) {
        let earth_nu = solve_true_anomaly(self.state.earth_mean_anomaly, self.earth_elements.eccentricity);
        self.earth_position = position_on_orbit(earth_nu, &self.earth_elements);

        let asteroid_nu = solve_true_anomaly(self.state.asteroid_mean_anomaly, self.elements.eccentricity);
        self.asteroid_position = position_on_orbit(asteroid_nu, &self.elements);
    }

    /// One-shot: the first contact pauses, later contacts are ignored until reset.
    fn detect_proximity(&mut self) -> TickOutcome {
        if self.state.has_detected_proximity {
            return TickOutcome::Advanced;
        }

        let distance = self.separation();
        if distance <= self.config.proximity_threshold() {
            self.state.has_detected_proximity = true;
            self.state.phase = RunPhase::Paused;
            info!(
                distance,
                simulated_elapsed_secs = self.state.simulated_elapsed_secs,
                "asteroid reached Earth marker, pausing"
            );
            return TickOutcome::ProximityDetected { distance };
        }
        TickOutcome::Advanced
    }

    /// Distance between the two markers in scene units (AU).
    pub fn separation(&self) -> f64 {
        self.asteroid_position.distance_to(&self.earth_position)
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn elements(&self) -> &OrbitalElements {
        &self.elements
    }

    pub fn controls(&self) -> &TickControls {
        &self.controls
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn asteroid_position(&self) -> Vector3 {
        self.asteroid_position
    }

    pub fn earth_position(&self) -> Vector3 {
        self.earth_position
    }

    pub fn asteroid_path(&self) -> &OrbitPath {
        &self.asteroid_path
    }

    pub fn earth_path(&self) -> &OrbitPath {
        &self.earth_path
    }
}

// =============================================================================
// FRAME ORCHESTRATOR
// =============================================================================

/// Everything a renderer needs after one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: u64,
    pub asteroid_position: Vector3,
    pub earth_position: Vector3,
    pub is_paused: bool,
    pub has_detected_proximity: bool,
    /// Set only on the frame where contact was first detected
    pub proximity_detected_this_frame: bool,
    pub countdown: CountdownLabel,
    pub simulated_elapsed_secs: f64,
}

/// Identity of the object whose elements are loaded, when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedObject {
    pub id: String,
    pub name: String,
    pub diameter_m: Option<f64>,
    pub is_hazardous: bool,
}

/// Stepper, detector and countdown driven by one clock.
///
/// `frame()` is the single mutator of simulation state; commands in between
/// frames apply the reset rules and take effect on the next frame.
pub struct Engine {
    simulation: Simulation,
    countdown: CountdownReconciler,
    timer: FrameTimer,
    clock: Arc<dyn TimeSource>,
    selected: Option<SelectedObject>,
    frame: u64,
    last_report: FrameReport,
}

impl Engine {
    pub fn new(config: EngineConfig, clock: Arc<dyn TimeSource>) -> Self {
        let now = clock.now();
        let simulation = Simulation::new(config.clone(), OrbitalElements::showcase());
        let countdown = CountdownReconciler::new(Duration::milliseconds(
            config.countdown_refresh_interval_ms as i64,
        ));
        let timer = FrameTimer::new(now, config.max_frame_delta_secs);

        let mut engine = Self {
            simulation,
            countdown,
            timer,
            clock,
            selected: None,
            frame: 0,
            last_report: FrameReport {
                frame: 0,
                asteroid_position: Vector3::zero(),
                earth_position: Vector3::zero(),
                is_paused: false,
                has_detected_proximity: false,
                proximity_detected_this_frame: false,
                countdown: CountdownLabel::Unavailable,
                simulated_elapsed_secs: 0.0,
            },
        };
        engine.last_report = engine.build_report(false);
        engine
    }

    /// Load a new element set. Identical elements are a no-op.
    pub fn load_elements(&mut self, elements: OrbitalElements) -> bool {
        if !self.simulation.load_elements(elements) {
            return false;
        }
        self.selected = None;
        self.restart_timing();
        true
    }

    /// Load a catalog record: its elements (defaulting as needed) and its
    /// scenario impact date, if any.
    pub fn load_record(&mut self, record: &NeoRecord) -> ParsedElements {
        let parsed = record.orbital_elements(self.simulation.config().max_eccentricity);
        self.load_elements(parsed.elements);
        self.set_impact_epoch(record.impact_epoch());
        self.selected = Some(SelectedObject {
            id: record.id.clone(),
            name: record.name.clone(),
            diameter_m: record.estimated_diameter_m(),
            is_hazardous: record.is_hazardous(),
        });
        parsed
    }

    /// Set or clear the impact epoch. Setting the current value is a no-op;
    /// anything else resets the simulation.
    pub fn set_impact_epoch(&mut self, epoch: Option<ImpactEpoch>) -> bool {
        if self.countdown.epoch() == epoch {
            return false;
        }
        let now = self.clock.now();
        self.countdown.set_epoch(epoch, now);
        self.simulation.reset();
        self.timer.rebase(now);
        self.last_report = self.build_report(false);
        info!(epoch = ?epoch.map(|e| e.to_string()), "impact epoch set");
        true
    }

    pub fn set_tick_controls(&mut self, controls: TickControls) -> bool {
        self.simulation.set_controls(controls)
    }

    /// Resume after a proximity pause without catching up the paused time.
    pub fn resume(&mut self) -> bool {
        if !self.simulation.resume() {
            return false;
        }
        self.timer.rebase(self.clock.now());
        self.last_report = self.build_report(false);
        true
    }

    /// Drop any wall-clock time accumulated since the last frame.
    pub fn rebase_timer(&mut self) {
        self.timer.rebase(self.clock.now());
    }

    fn restart_timing(&mut self) {
        let now = self.clock.now();
        self.countdown.rebase(now);
        self.timer.rebase(now);
        self.last_report = self.build_report(false);
    }

    /// Run one frame: clock → dt → stepper → detector → countdown.
    pub fn frame(&mut self) -> &FrameReport {
        let now = self.clock.now();
        let dt = self.timer.delta(now);
        let outcome = self.simulation.tick(dt);
        self.countdown
            .refresh(now, self.simulation.state().simulated_elapsed_secs);

        self.frame += 1;
        self.last_report =
            self.build_report(matches!(outcome, TickOutcome::ProximityDetected { .. }));
        &self.last_report
    }

    fn build_report(&self, proximity_detected_this_frame: bool) -> FrameReport {
        let state = self.simulation.state();
        FrameReport {
            frame: self.frame,
            asteroid_position: self.simulation.asteroid_position(),
            earth_position: self.simulation.earth_position(),
            is_paused: state.is_paused(),
            has_detected_proximity: state.has_detected_proximity,
            proximity_detected_this_frame,
            countdown: self.countdown.label().clone(),
            simulated_elapsed_secs: state.simulated_elapsed_secs,
        }
    }

    pub fn report(&self) -> &FrameReport {
        &self.last_report
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn countdown(&self) -> &CountdownReconciler {
        &self.countdown
    }

    pub fn selected(&self) -> Option<&SelectedObject> {
        self.selected.as_ref()
    }
}

// =============================================================================
// TESTS
// =============================================================================
