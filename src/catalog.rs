// NEO Catalog Records
// Permissive parsing of external near-Earth-object records into orbital elements

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::countdown::ImpactEpoch;
use crate::physics_engine::{
    OrbitalElements, DEFAULT_ECCENTRICITY, DEFAULT_SEMI_MAJOR_AXIS, MAX_ECCENTRICITY,
};

// =============================================================================
// RECORD TYPES
// =============================================================================

/// A near-Earth object as delivered by the catalog (NeoWs browse/lookup shape).
///
/// Only the fields the engine consumes are kept; everything else is ignored.
/// A field of the wrong type reads as absent instead of failing the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NeoRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_potentially_hazardous_asteroid: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub estimated_diameter: Option<EstimatedDiameter>,
    #[serde(deserialize_with = "lenient_orbital_data")]
    pub orbital_data: Option<RawOrbitalData>,
    #[serde(deserialize_with = "lenient")]
    pub impact_scenario: Option<ImpactScenarioData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatedDiameter {
    #[serde(deserialize_with = "lenient")]
    pub meters: Option<DiameterRange>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiameterRange {
    #[serde(deserialize_with = "lenient_number")]
    pub estimated_diameter_min: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub estimated_diameter_max: Option<f64>,
}

/// Orbital fields exactly as the catalog sends them: numbers, numeric
/// strings, or anything else. Angles are in degrees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawOrbitalData {
    pub semi_major_axis: Option<Value>,
    pub eccentricity: Option<Value>,
    pub inclination: Option<Value>,
    pub ascending_node_longitude: Option<Value>,
    pub perihelion_argument: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactScenarioData {
    /// Only string dates are read; anything else counts as no date
    #[serde(deserialize_with = "lenient")]
    pub impact_date: Option<String>,
}

// =============================================================================
// LENIENT FIELD READERS
// =============================================================================

/// Read `T`, falling back to its default when the value has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => Some(b),
        Value::String(s) => s.trim().to_ascii_lowercase().parse().ok(),
        _ => None,
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(numeric(Some(&value)))
}

/// Null means "no orbital block"; any other non-object reads as an empty block.
fn lenient_orbital_data<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<RawOrbitalData>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        value => Some(RawOrbitalData::deserialize(value).unwrap_or_default()),
    })
}

// =============================================================================
// ELEMENT PARSING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementField {
    SemiMajorAxis,
    Eccentricity,
    Inclination,
    AscendingNodeLongitude,
    PerihelionArgument,
}

impl ElementField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementField::SemiMajorAxis => "semi_major_axis",
            ElementField::Eccentricity => "eccentricity",
            ElementField::Inclination => "inclination",
            ElementField::AscendingNodeLongitude => "ascending_node_longitude",
            ElementField::PerihelionArgument => "perihelion_argument",
        }
    }
}

impl fmt::Display for ElementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Elements plus the fields that had to be defaulted or clamped to get them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedElements {
    pub elements: OrbitalElements,
    pub substituted: Vec<ElementField>,
}

impl ParsedElements {
    pub fn is_defaulted(&self) -> bool {
        !self.substituted.is_empty()
    }
}

/// Read a catalog value as a finite number. Numeric strings are accepted.
fn numeric(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

impl RawOrbitalData {
    /// Convert to elements, never failing.
    ///
    /// Missing or non-numeric angles become 0, a missing semi-major axis
    /// becomes 1 AU and a missing eccentricity 0.1. A non-positive axis is
    /// replaced by the default; eccentricity is clamped into
    /// `[0, max_eccentricity]`. Degrees are converted to radians here.
    pub fn parse(&self, max_eccentricity: f64) -> ParsedElements {
        let mut substituted = Vec::new();
        let max_e = if max_eccentricity.is_nan() {
            MAX_ECCENTRICITY
        } else {
            max_eccentricity.clamp(0.0, MAX_ECCENTRICITY)
        };

        let semi_major_axis = match numeric(self.semi_major_axis.as_ref()) {
            Some(a) if a > 0.0 => a,
            _ => {
                substituted.push(ElementField::SemiMajorAxis);
                DEFAULT_SEMI_MAJOR_AXIS
            }
        };

        let eccentricity = match numeric(self.eccentricity.as_ref()) {
            Some(e) if (0.0..=max_e).contains(&e) => e,
            Some(e) => {
                substituted.push(ElementField::Eccentricity);
                e.clamp(0.0, max_e)
            }
            None => {
                substituted.push(ElementField::Eccentricity);
                DEFAULT_ECCENTRICITY.min(max_e)
            }
        };

        let mut angle = |value: &Option<Value>, field: ElementField| {
            numeric(value.as_ref()).unwrap_or_else(|| {
                substituted.push(field);
                0.0
            })
        };
        let inclination = angle(&self.inclination, ElementField::Inclination);
        let ascending_node = angle(
            &self.ascending_node_longitude,
            ElementField::AscendingNodeLongitude,
        );
        let perihelion_arg = angle(&self.perihelion_argument, ElementField::PerihelionArgument);

        let elements = OrbitalElements::from_degrees(
            semi_major_axis,
            eccentricity,
            inclination,
            ascending_node,
            perihelion_arg,
        )
        .with_max_eccentricity(max_e);

        ParsedElements {
            elements,
            substituted,
        }
    }
}

/// Parse untrusted JSON of any shape into elements.
///
/// Anything that is not an object with the expected keys yields the
/// all-default element set.
pub fn parse_orbital_value(raw: &Value, max_eccentricity: f64) -> ParsedElements {
    let data: RawOrbitalData = serde_json::from_value(raw.clone()).unwrap_or_default();
    data.parse(max_eccentricity)
}

// =============================================================================
// RECORD HELPERS
// =============================================================================

impl NeoRecord {
    /// Elements for this record; a record with no orbital block at all gets
    /// the showcase orbit.
    pub fn orbital_elements(&self, max_eccentricity: f64) -> ParsedElements {
        let parsed = match &self.orbital_data {
            Some(data) => data.parse(max_eccentricity),
            None => {
                debug!(id = %self.id, "record has no orbital data, using showcase orbit");
                return ParsedElements {
                    elements: OrbitalElements::showcase().with_max_eccentricity(max_eccentricity),
                    substituted: Vec::new(),
                };
            }
        };

        if parsed.is_defaulted() {
            let fields: Vec<&str> = parsed.substituted.iter().map(ElementField::as_str).collect();
            warn!(id = %self.id, name = %self.name, ?fields, "orbital data incomplete, substituted defaults");
        }
        parsed
    }

    /// Declared impact time for scenario records; unparseable dates count as absent.
    pub fn impact_epoch(&self) -> Option<ImpactEpoch> {
        self.impact_scenario
            .as_ref()
            .and_then(|s| s.impact_date.as_deref())
            .and_then(ImpactEpoch::parse_lenient)
    }

    /// Mean of the catalog's min/max diameter estimate in meters.
    pub fn estimated_diameter_m(&self) -> Option<f64> {
        self.estimated_diameter
            .as_ref()
            .and_then(|d| d.meters.as_ref())
            .and_then(|m| match (m.estimated_diameter_min, m.estimated_diameter_max) {
                (Some(min), Some(max)) => Some((min + max) / 2.0),
                (Some(only), None) | (None, Some(only)) => Some(only),
                (None, None) => None,
            })
    }

    pub fn is_hazardous(&self) -> bool {
        self.is_potentially_hazardous_asteroid.unwrap_or(false)
    }
}

// =============================================================================
// BUILT-IN SCENARIO RECORDS
// =============================================================================

fn scenario_record(
    id: &str,
    name: &str,
    diameter_m: (f64, f64),
    elements: [&str; 5],
    impact_date: Option<&str>,
) -> NeoRecord {
    let text = |s: &str| Some(Value::String(s.to_string()));
    NeoRecord {
        id: id.to_string(),
        name: name.to_string(),
        is_potentially_hazardous_asteroid: Some(true),
        estimated_diameter: Some(EstimatedDiameter {
            meters: Some(DiameterRange {
                estimated_diameter_min: Some(diameter_m.0),
                estimated_diameter_max: Some(diameter_m.1),
            }),
        }),
        orbital_data: Some(RawOrbitalData {
            semi_major_axis: text(elements[0]),
            eccentricity: text(elements[1]),
            inclination: text(elements[2]),
            ascending_node_longitude: text(elements[3]),
            perihelion_argument: text(elements[4]),
        }),
        impact_scenario: impact_date.map(|date| ImpactScenarioData {
            impact_date: Some(date.to_string()),
        }),
    }
}

/// Records available without a catalog connection.
pub fn fallback_records() -> Vec<NeoRecord> {
    vec![
        scenario_record(
            "impactor-2025",
            "Impactor-2025 (scenario)",
            (330.0, 350.0),
            ["1.021", "0.18", "4.2", "85.3", "132.5"],
            Some("2025-10-17T14:22:00Z"),
        ),
        scenario_record(
            "99942",
            "99942 Apophis",
            (340.0, 370.0),
            ["0.922419", "0.191207", "3.331", "204.45", "126.4"],
            None,
        ),
        scenario_record(
            "101955",
            "101955 Bennu (1999 RQ36)",
            (480.0, 511.0),
            ["1.1264", "0.2037", "6.034", "2.0608", "66.2231"],
            None,
        ),
    ]
}

pub fn find_fallback(id: &str) -> Option<NeoRecord> {
    fallback_records().into_iter().find(|r| r.id == id)
}
