// Physics Engine - Keplerian Orbit Propagation
// Two-body orbital elements, Kepler equation solver, perifocal-to-inertial
// transform and mean motion. Lengths are in AU, angles in radians, time in s.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Julian year in seconds (365.25 days)
pub const YEAR_SECONDS: f64 = 365.25 * SECONDS_PER_DAY;

/// Earth's mean motion (rad/s), the reference for every other body
pub const EARTH_MEAN_MOTION: f64 = TAU / YEAR_SECONDS;

/// Newton-Raphson iterations applied to Kepler's equation.
/// Fixed so per-frame cost is constant; there is no early exit.
pub const KEPLER_ITERATIONS: usize = 8;

/// Above this eccentricity the solver starts from E = π instead of E = M
pub const HIGH_ECCENTRICITY: f64 = 0.8;

/// Substituted when the semi-major axis is missing or unusable (AU)
pub const DEFAULT_SEMI_MAJOR_AXIS: f64 = 1.0;

/// Substituted when the eccentricity is missing or unusable
pub const DEFAULT_ECCENTRICITY: f64 = 0.1;

/// Eccentricity ceiling for closed-orbit rendering
pub const MAX_ECCENTRICITY: f64 = 0.99;

// =============================================================================
// 3D VECTOR MATHEMATICS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    pub fn distance_to(&self, other: &Vector3) -> f64 {
        self.sub(other).magnitude()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Reorder into a Y-up scene frame: the ecliptic plane becomes X/Z.
    pub fn to_scene(&self) -> [f64; 3] {
        [self.x, self.z, self.y]
    }
}

// =============================================================================
// KEPLERIAN ORBITAL ELEMENTS
// =============================================================================

/// Classical element set for a closed heliocentric orbit.
///
/// Always holds a renderable orbit: `semi_major_axis > 0`,
/// `0 <= eccentricity <= MAX_ECCENTRICITY`, and all angles wrapped to
/// `[0, 2π)`. Constructors clamp or default instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElements {
    /// Semi-major axis (AU)
    pub semi_major_axis: f64,
    /// Eccentricity (0 ≤ e < 1)
    pub eccentricity: f64,
    /// Inclination (radians)
    pub inclination: f64,
    /// Longitude of ascending node (radians)
    pub longitude_ascending_node: f64,
    /// Argument of perihelion (radians)
    pub argument_perihelion: f64,
}

impl OrbitalElements {
    pub fn new(
        semi_major_axis: f64,
        eccentricity: f64,
        inclination: f64,
        longitude_ascending_node: f64,
        argument_perihelion: f64,
    ) -> Self {
        Self {
            semi_major_axis: sanitize_semi_major_axis(semi_major_axis),
            eccentricity: sanitize_eccentricity(eccentricity, MAX_ECCENTRICITY),
            inclination: wrap_angle(inclination),
            longitude_ascending_node: wrap_angle(longitude_ascending_node),
            argument_perihelion: wrap_angle(argument_perihelion),
        }
    }

    /// Build from catalog-style angles given in degrees.
    pub fn from_degrees(
        semi_major_axis: f64,
        eccentricity: f64,
        inclination_deg: f64,
        ascending_node_deg: f64,
        perihelion_arg_deg: f64,
    ) -> Self {
        Self::new(
            semi_major_axis,
            eccentricity,
            inclination_deg.to_radians(),
            ascending_node_deg.to_radians(),
            perihelion_arg_deg.to_radians(),
        )
    }

    /// Earth's orbit as drawn by the visualizer: the unit circle in the ecliptic.
    pub fn earth() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 0.0)
    }

    /// Orbit shown before any object has been selected.
    pub fn showcase() -> Self {
        Self::from_degrees(1.5, 0.3, 10.0, 40.0, 30.0)
    }

    /// Re-apply the constructor's invariants to a value built field by field
    /// (struct literal or deserialized). Idempotent.
    pub fn sanitized(self) -> Self {
        Self::new(
            self.semi_major_axis,
            self.eccentricity,
            self.inclination,
            self.longitude_ascending_node,
            self.argument_perihelion,
        )
    }

    /// Tighten the eccentricity ceiling (never loosens past `MAX_ECCENTRICITY`).
    pub fn with_max_eccentricity(mut self, max_eccentricity: f64) -> Self {
        let ceiling = if max_eccentricity.is_nan() {
            MAX_ECCENTRICITY
        } else {
            max_eccentricity.clamp(0.0, MAX_ECCENTRICITY)
        };
        self.eccentricity = sanitize_eccentricity(self.eccentricity, ceiling);
        self
    }

    /// Closest distance to the focus (AU)
    pub fn periapsis(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity)
    }

    /// Farthest distance from the focus (AU)
    pub fn apoapsis(&self) -> f64 {
        self.semi_major_axis * (1.0 + self.eccentricity)
    }

    pub fn mean_motion(&self) -> f64 {
        mean_motion(self.semi_major_axis)
    }

    /// Orbital period in seconds
    pub fn period(&self) -> f64 {
        TAU / self.mean_motion()
    }

    /// Inertial position at a given true anomaly.
    pub fn position_at(&self, true_anomaly: f64) -> Vector3 {
        position_on_orbit(true_anomaly, self)
    }

    /// Inertial position at a given (unbounded) mean anomaly.
    pub fn position_at_mean_anomaly(&self, mean_anomaly: f64) -> Vector3 {
        position_on_orbit(solve_true_anomaly(mean_anomaly, self.eccentricity), self)
    }
}

impl Default for OrbitalElements {
    fn default() -> Self {
        Self::new(
            DEFAULT_SEMI_MAJOR_AXIS,
            DEFAULT_ECCENTRICITY,
            0.0,
            0.0,
            0.0,
        )
    }
}

fn sanitize_semi_major_axis(a: f64) -> f64 {
    if a.is_finite() && a > 0.0 {
        a
    } else {
        DEFAULT_SEMI_MAJOR_AXIS
    }
}

fn sanitize_eccentricity(e: f64, ceiling: f64) -> f64 {
    if e.is_nan() {
        DEFAULT_ECCENTRICITY.min(ceiling)
    } else {
        e.clamp(0.0, ceiling)
    }
}

/// Wrap an angle into [0, 2π). Non-finite input maps to 0.
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

// =============================================================================
// ANOMALY SOLVER
// =============================================================================

/// Solve Kepler's equation M = E - e*sin(E) for E using Newton-Raphson.
///
/// The mean anomaly is wrapped into [0, 2π) first. Starts from E = M for
/// e < 0.8 and from E = π otherwise, then runs exactly `KEPLER_ITERATIONS`
/// steps.
pub fn solve_eccentric_anomaly(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let m = wrap_angle(mean_anomaly);
    let e = sanitize_eccentricity(eccentricity, MAX_ECCENTRICITY);

    let mut e_anom = if e < HIGH_ECCENTRICITY { m } else { PI };

    for _ in 0..KEPLER_ITERATIONS {
        let f = e_anom - e * e_anom.sin() - m;
        let f_prime = 1.0 - e * e_anom.cos();
        e_anom -= f / f_prime;
    }

    e_anom
}

/// Half-angle conversion from eccentric to true anomaly, wrapped to [0, 2π).
pub fn eccentric_to_true_anomaly(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    let e = eccentricity;
    let half = eccentric_anomaly / 2.0;
    let nu = 2.0 * ((1.0 + e).sqrt() * half.sin()).atan2((1.0 - e).sqrt() * half.cos());
    wrap_angle(nu)
}

/// Inverse of [`eccentric_to_true_anomaly`].
pub fn true_to_eccentric_anomaly(true_anomaly: f64, eccentricity: f64) -> f64 {
    let e = eccentricity;
    let half = true_anomaly / 2.0;
    wrap_angle(2.0 * ((1.0 - e).sqrt() * half.sin()).atan2((1.0 + e).sqrt() * half.cos()))
}

/// Mean anomaly reached at a given eccentric anomaly (Kepler's equation).
pub fn mean_from_eccentric_anomaly(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    eccentric_anomaly - eccentricity * eccentric_anomaly.sin()
}

/// Mean anomaly → true anomaly in [0, 2π). Finite for every e in [0, 1).
pub fn solve_true_anomaly(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let e = sanitize_eccentricity(eccentricity, MAX_ECCENTRICITY);
    let e_anom = solve_eccentric_anomaly(mean_anomaly, e);
    eccentric_to_true_anomaly(e_anom, e)
}

// =============================================================================
// FRAME TRANSFORM (perifocal → inertial)
// =============================================================================

/// Rotation from the perifocal plane into the inertial frame, R3(-Ω) R1(-i) R3(-ω).
/// Only the first two columns are kept since perifocal z is always zero.
#[derive(Debug, Clone, Copy)]
struct PerifocalRotation {
    r11: f64,
    r12: f64,
    r21: f64,
    r22: f64,
    r31: f64,
    r32: f64,
}

impl PerifocalRotation {
    fn from_elements(elements: &OrbitalElements) -> Self {
        let cos_omega = elements.longitude_ascending_node.cos();
        let sin_omega = elements.longitude_ascending_node.sin();
        let cos_w = elements.argument_perihelion.cos();
        let sin_w = elements.argument_perihelion.sin();
        let cos_i = elements.inclination.cos();
        let sin_i = elements.inclination.sin();

        Self {
            r11: cos_omega * cos_w - sin_omega * sin_w * cos_i,
            r12: -cos_omega * sin_w - sin_omega * cos_w * cos_i,
            r21: sin_omega * cos_w + cos_omega * sin_w * cos_i,
            r22: -sin_omega * sin_w + cos_omega * cos_w * cos_i,
            r31: sin_w * sin_i,
            r32: cos_w * sin_i,
        }
    }

    fn apply(&self, x_orb: f64, y_orb: f64) -> Vector3 {
        Vector3::new(
            self.r11 * x_orb + self.r12 * y_orb,
            self.r21 * x_orb + self.r22 * y_orb,
            self.r31 * x_orb + self.r32 * y_orb,
        )
    }
}

/// Radius on the conic at a given true anomaly: r = a(1-e²)/(1+e·cos ν)
pub fn orbital_radius(true_anomaly: f64, elements: &OrbitalElements) -> f64 {
    let a = elements.semi_major_axis;
    let e = elements.eccentricity;
    a * (1.0 - e * e) / (1.0 + e * true_anomaly.cos())
}

fn position_with(rotation: &PerifocalRotation, true_anomaly: f64, elements: &OrbitalElements) -> Vector3 {
    let r = orbital_radius(true_anomaly, elements);
    rotation.apply(r * true_anomaly.cos(), r * true_anomaly.sin())
}

/// Inertial (ecliptic, right-handed) position at a true anomaly.
pub fn position_on_orbit(true_anomaly: f64, elements: &OrbitalElements) -> Vector3 {
    let rotation = PerifocalRotation::from_elements(elements);
    position_with(&rotation, true_anomaly, elements)
}

// =============================================================================
// ORBIT PATH SAMPLING
// =============================================================================

/// Closed polyline through the orbit at evenly spaced true anomalies.
///
/// Built with the same transform as [`position_on_orbit`], so a live marker
/// always lies on it. The last sample repeats the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitPath {
    pub points: Vec<Vector3>,
    /// True-anomaly spacing between samples (radians)
    pub step: f64,
}

impl OrbitPath {
    pub fn sample(elements: &OrbitalElements, samples: usize) -> Self {
        let samples = samples.max(2);
        let step = TAU / (samples - 1) as f64;
        let rotation = PerifocalRotation::from_elements(elements);

        let points = (0..samples)
            .map(|k| position_with(&rotation, k as f64 * step, elements))
            .collect();

        Self { points, step }
    }

    /// Index of the sample whose true anomaly is closest to `true_anomaly`.
    pub fn nearest_index(&self, true_anomaly: f64) -> usize {
        let last = self.points.len().saturating_sub(1);
        let index = (wrap_angle(true_anomaly) / self.step).round() as usize;
        index.min(last)
    }

    pub fn point_near(&self, true_anomaly: f64) -> Option<Vector3> {
        self.points.get(self.nearest_index(true_anomaly)).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// =============================================================================
// MEAN MOTION
// =============================================================================

/// Kepler's third law normalised to Earth: n = 2π / (a^{3/2} years), in rad/s.
///
/// Unusable semi-major axes fall back to 1 AU so the rate stays finite and positive.
pub fn mean_motion(semi_major_axis: f64) -> f64 {
    let a = sanitize_semi_major_axis(semi_major_axis);
    EARTH_MEAN_MOTION / a.powf(1.5)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_kepler_equation_circular() {
        // For circular orbit e=0, E = M
        let e = solve_eccentric_anomaly(1.0, 0.0);
        assert!((e - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_kepler_equation_eccentric() {
        let e = solve_eccentric_anomaly(0.5, 0.5);
        // Verify: E - 0.5*sin(E) should equal 0.5
        let check = e - 0.5 * e.sin();
        assert!((check - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_mean_anomaly_is_wrapped_before_solving() {
        let a = solve_true_anomaly(1.0, 0.4);
        let b = solve_true_anomaly(1.0 + 3.0 * TAU, 0.4);
        let c = solve_true_anomaly(1.0 - 2.0 * TAU, 0.4);
        assert_relative_eq!(a, b, epsilon = 1e-9);
        assert_relative_eq!(a, c, epsilon = 1e-9);
    }

    #[test]
    fn test_true_anomaly_in_range_for_degenerate_input() {
        for m in [f64::NAN, f64::INFINITY, -1e9, 0.0, 1e12] {
            for e in [-0.5, 0.0, 0.5, 0.999, 1.0, 3.0, f64::NAN] {
                let nu = solve_true_anomaly(m, e);
                assert!(nu.is_finite(), "m={m} e={e} gave {nu}");
                assert!((0.0..TAU).contains(&nu), "m={m} e={e} gave {nu}");
            }
        }
    }

    #[test]
    fn test_periapsis_and_apoapsis_distance() {
        let elements = OrbitalElements::showcase();
        let peri = position_on_orbit(0.0, &elements).magnitude();
        let apo = position_on_orbit(PI, &elements).magnitude();
        assert_relative_eq!(peri, elements.periapsis(), epsilon = 1e-12);
        assert_relative_eq!(apo, elements.apoapsis(), epsilon = 1e-12);
        assert_relative_eq!(peri, 1.5 * 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_circular_orbit_has_constant_radius() {
        let elements = OrbitalElements::from_degrees(2.0, 0.0, 25.0, 70.0, 110.0);
        for k in 0..36 {
            let nu = k as f64 * TAU / 36.0;
            assert_relative_eq!(position_on_orbit(nu, &elements).magnitude(), 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_angles_keep_orbit_in_ecliptic() {
        let elements = OrbitalElements::new(1.0, 0.0, 0.0, 0.0, 0.0);
        let p = position_on_orbit(FRAC_PI_2, &elements);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inclined_orbit_rises_above_ecliptic() {
        // i = 90°, Ω = 0, ω = 0: quarter orbit past the node points straight up
        let elements = OrbitalElements::from_degrees(1.0, 0.0, 90.0, 0.0, 0.0);
        let p = position_on_orbit(FRAC_PI_2, &elements);
        assert_relative_eq!(p.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_path_matches_live_position() {
        let elements = OrbitalElements::showcase();
        let path = OrbitPath::sample(&elements, 361);
        assert_eq!(path.len(), 361);
        assert_relative_eq!(path.step, 1f64.to_radians(), epsilon = 1e-15);

        // The closed path ends where it starts
        assert_relative_eq!(path.points[0].distance_to(&path.points[360]), 0.0, epsilon = 1e-12);

        // Exactly on a sample angle the two are identical
        let nu = 42f64.to_radians();
        assert_eq!(path.point_near(nu), Some(position_on_orbit(path.step * 42.0, &elements)));

        // Between samples the gap is bounded by the half-step arc length
        let nu = 42.4f64.to_radians();
        let near = path.point_near(nu).unwrap();
        let live = position_on_orbit(nu, &elements);
        let max_gap = elements.apoapsis() * path.step / 2.0;
        assert!(near.distance_to(&live) <= max_gap);
    }

    #[test]
    fn test_mean_motion_reference_and_monotonic() {
        assert_relative_eq!(mean_motion(1.0), EARTH_MEAN_MOTION, max_relative = 1e-12);
        assert_relative_eq!(mean_motion(4.0), EARTH_MEAN_MOTION / 8.0, max_relative = 1e-12);
        assert!(mean_motion(0.5) > mean_motion(1.0));
        assert!(mean_motion(0.0) > 0.0 && mean_motion(0.0).is_finite());
        assert!(mean_motion(-3.0).is_finite());
    }

    #[test]
    fn test_period_of_one_au_is_one_year() {
        assert_relative_eq!(OrbitalElements::earth().period(), YEAR_SECONDS, max_relative = 1e-12);
    }

    #[test]
    fn test_elements_are_clamped() {
        let elements = OrbitalElements::new(-2.0, 1.4, 7.0 * PI, f64::NAN, -FRAC_PI_2);
        assert_eq!(elements.semi_major_axis, DEFAULT_SEMI_MAJOR_AXIS);
        assert_eq!(elements.eccentricity, MAX_ECCENTRICITY);
        assert_relative_eq!(elements.inclination, PI, epsilon = 1e-12);
        assert_eq!(elements.longitude_ascending_node, 0.0);
        assert_relative_eq!(elements.argument_perihelion, 3.0 * FRAC_PI_2, epsilon = 1e-12);

        let tighter = elements.with_max_eccentricity(0.9);
        assert_eq!(tighter.eccentricity, 0.9);
    }

    #[test]
    fn test_scene_frame_swaps_y_and_z() {
        assert_eq!(Vector3::new(1.0, 2.0, 3.0).to_scene(), [1.0, 3.0, 2.0]);
    }

    mod properties {
        use super::super::*;
        use proptest::prelude::*;

        fn circular_gap(a: f64, b: f64) -> f64 {
            let d = (a - b).rem_euclid(TAU);
            d.min(TAU - d)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            /// Mean anomaly survives mean → true → eccentric → mean.
            #[test]
            fn prop_true_anomaly_round_trip(
                mean_anomaly in 0.0f64..TAU,
                eccentricity in 0.0f64..=0.95,
            ) {
                let nu = solve_true_anomaly(mean_anomaly, eccentricity);
                prop_assert!((0.0..TAU).contains(&nu));

                let e_anom = true_to_eccentric_anomaly(nu, eccentricity);
                let m_back = mean_from_eccentric_anomaly(e_anom, eccentricity);
                let gap = circular_gap(m_back, mean_anomaly);
                prop_assert!(gap < 1e-6, "M={} e={} back={} gap={}", mean_anomaly, eccentricity, m_back, gap);
            }

            #[test]
            fn prop_mean_motion_decreases_with_size(
                a in 0.05f64..60.0,
                grow in 1.0001f64..10.0,
            ) {
                prop_assert!(mean_motion(a * grow) < mean_motion(a));
            }

            #[test]
            fn prop_position_is_finite(
                a in -5.0f64..50.0,
                e in -1.0f64..2.0,
                i in -10.0f64..10.0,
                node in -10.0f64..10.0,
                peri in -10.0f64..10.0,
                m in -1e6f64..1e6,
            ) {
                let elements = OrbitalElements::new(a, e, i, node, peri);
                prop_assert!(elements.position_at_mean_anomaly(m).is_finite());
            }
        }
    }
}
