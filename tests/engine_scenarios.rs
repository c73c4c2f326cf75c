// Engine Scenarios
// End-to-end runs through the public API, driven by a manual clock

use approx::assert_relative_eq;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::f64::consts::TAU;
use std::sync::Arc;

use neo_impact_engine::catalog::parse_orbital_value;
use neo_impact_engine::physics_engine::{wrap_angle, YEAR_SECONDS};
use neo_impact_engine::{
    CountdownLabel, Engine, EngineConfig, EngineHandle, ImpactEpoch, ManualClock, OrbitalElements,
    TickControls, TimeSource,
};

fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 10, 7, 12, 0, 0).unwrap(),
    ))
}

/// Runs `frames` frames of `dt` seconds each, resuming after any contact pause.
fn run_frames(clock: &ManualClock, engine: &mut Engine, frames: usize, dt: f64) {
    for _ in 0..frames {
        clock.advance_secs(dt);
        if engine.frame().is_paused {
            engine.resume();
        }
    }
}

#[test]
fn earth_parameters_complete_one_orbit_in_a_simulated_year() {
    let clock = manual_clock();
    let config = EngineConfig {
        max_time_scale: YEAR_SECONDS,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config, clock.clone());
    engine.load_elements(OrbitalElements::earth());
    engine.set_tick_controls(TickControls::with_time_scale(YEAR_SECONDS));
    let start = engine.report().asteroid_position;

    // Ten 0.1 s frames at one year per second
    run_frames(&clock, &mut engine, 10, 0.1);

    let state = engine.simulation().state();
    assert_relative_eq!(state.simulated_elapsed_secs, YEAR_SECONDS, max_relative = 1e-9);
    assert_relative_eq!(state.asteroid_mean_anomaly, TAU, max_relative = 1e-9);
    assert!(wrap_angle(state.asteroid_mean_anomaly) < 1e-6 || TAU - wrap_angle(state.asteroid_mean_anomaly) < 1e-6);
    assert_relative_eq!(engine.report().asteroid_position.distance_to(&start), 0.0, epsilon = 1e-8);
    // The markers overlap from the first frame, so contact fires exactly once
    assert!(state.has_detected_proximity);
    assert!(!state.is_paused());
}

#[test]
fn ten_day_countdown_expires_after_one_real_second() {
    let clock = manual_clock();
    let mut engine = Engine::new(EngineConfig::default(), clock.clone());
    engine.load_elements(OrbitalElements::new(3.0, 0.0, 0.0, 0.0, 0.0));
    engine.set_impact_epoch(Some(ImpactEpoch::new(clock.now() + Duration::days(10))));
    engine.set_tick_controls(TickControls::with_time_scale(10.0 * 86_400.0));
    assert_eq!(engine.report().countdown.to_string(), "10d 0h 0m 0s");

    run_frames(&clock, &mut engine, 10, 0.1);

    let report = engine.report();
    match &report.countdown {
        CountdownLabel::ImpactNow => {}
        CountdownLabel::Remaining(text) => assert_eq!(text, "0s"),
        CountdownLabel::Unavailable => panic!("epoch was set"),
    }
    // Countdown expiry and spatial contact are independent signals
    assert!(!report.has_detected_proximity);
    assert!(!report.is_paused);
}

#[test]
fn malformed_elements_still_render() {
    let parsed = parse_orbital_value(&json!({ "semi_major_axis": "not-a-number" }), 0.99);
    assert_eq!(parsed.elements.semi_major_axis, 1.0);

    let clock = manual_clock();
    let mut engine = Engine::new(EngineConfig::default(), clock.clone());
    engine.load_elements(parsed.elements);

    for _ in 0..500 {
        clock.advance_secs(0.016);
        let report = engine.frame().clone();
        assert!(report.asteroid_position.is_finite());
        assert!(report.earth_position.is_finite());
        if report.is_paused {
            engine.resume();
        }
    }
}

#[test]
fn contact_pause_holds_until_resume_without_catch_up() {
    let clock = manual_clock();
    let mut engine = Engine::new(EngineConfig::default(), clock.clone());
    engine.load_elements(OrbitalElements::earth());

    clock.advance_secs(0.016);
    assert!(engine.frame().proximity_detected_this_frame);
    let paused_anomaly = engine.simulation().state().asteroid_mean_anomaly;

    // Ten wall-clock minutes pass while paused
    for _ in 0..600 {
        clock.advance_secs(1.0);
        let report = engine.frame();
        assert!(report.is_paused);
        assert!(report.has_detected_proximity);
    }
    assert_eq!(engine.simulation().state().asteroid_mean_anomaly, paused_anomaly);

    assert!(engine.resume());
    clock.advance_secs(0.016);
    engine.frame();
    let jump = engine.simulation().state().asteroid_mean_anomaly - paused_anomaly;
    let one_frame = OrbitalElements::earth().mean_motion() * 0.016 * engine.simulation().controls().time_scale;
    assert_relative_eq!(jump, one_frame, max_relative = 1e-6);
}

#[test]
fn reloading_elements_rearms_detector() {
    let clock = manual_clock();
    let mut engine = Engine::new(EngineConfig::default(), clock.clone());
    engine.load_elements(OrbitalElements::earth());
    clock.advance_secs(0.016);
    engine.frame();
    assert!(engine.report().is_paused);

    engine.load_elements(OrbitalElements::new(1.0, 0.0, 0.0, 0.0, 1e-3));
    assert!(!engine.report().is_paused);
    assert!(!engine.report().has_detected_proximity);

    clock.advance_secs(0.016);
    assert!(engine.frame().proximity_detected_this_frame);
}

#[test]
fn fallback_scenario_runs_on_handle() {
    let clock = manual_clock();
    let handle = EngineHandle::new(EngineConfig::default(), clock.clone());
    let record = neo_impact_engine::find_fallback("impactor-2025").unwrap();
    handle.load_record(&record);

    let before = handle.report();
    assert!(matches!(before.countdown, CountdownLabel::ImpactNow | CountdownLabel::Remaining(_)));

    clock.advance_secs(0.05);
    let report = handle.step();
    assert_eq!(report.frame, 1);
    assert!(report.simulated_elapsed_secs > 0.0);

    let json = serde_json::to_value(handle.snapshot()).unwrap();
    assert_eq!(json["bodies"][1]["id"], "impactor-2025");
    assert_eq!(json["bodies"][0]["path"].as_array().map(Vec::len), Some(361));

    handle.stop();
    handle.stop();
}
