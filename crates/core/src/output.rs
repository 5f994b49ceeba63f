//! Prediction response assembly
//!
//! Maps an aggregated ensemble plus the nominal trajectory into the public
//! response shape. This is pure transcription: no new statistics are computed
//! here. It is also the only place where numbers are rounded — coordinates to
//! 6 decimals, altitudes to whole meters, distances and durations to 2
//! decimals — so internal computation keeps full precision everywhere else.
//! Timestamps are emitted as timezone-aware RFC 3339 strings.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ensemble::{Attribution, EnsembleSummary};
use crate::inputs::UserInputs;
use crate::trajectory::{SimulationDraw, TrajectoryPoint};

/// Canonical coordinate system name carried in trajectory metadata
pub const COORDINATE_SYSTEM: &str = "WGS84";

/// A rounded WGS84 position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: i64,
}

/// Confidence circle as presented to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceIntervalResponse {
    pub radius_km: f64,
    pub probability: f64,
}

/// The headline landing estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingPrediction {
    pub coordinates: Coordinates,
    pub confidence_interval: ConfidenceIntervalResponse,
    /// RFC 3339 instant of the mean landing time
    pub estimated_landing_time: String,
    pub flight_duration_hours: f64,
    pub total_distance_km: f64,
}

/// One emitted trajectory sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPointResponse {
    /// RFC 3339 instant
    pub time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_direction_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_hpa: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryMetadata {
    pub point_count: usize,
    pub time_step_seconds: u32,
    pub coordinate_system: String,
}

/// The nominal flight path, optionally decimated for transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryResponse {
    pub points: Vec<TrajectoryPointResponse>,
    pub metadata: TrajectoryMetadata,
}

/// Landing dispersion and its per-factor decomposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingZone {
    pub radius_km: f64,
    pub confidence_level: f64,
    /// Named factor → variance fraction; `None` when the ensemble carried no
    /// stratification signal (attribution unavailable, never fabricated)
    pub factors: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyResponse {
    pub landing_zone: LandingZone,
    pub time_uncertainty_hours: f64,
    pub altitude_uncertainty_m: i64,
    /// Set when the summary came from a salvaged, smaller-than-requested
    /// ensemble
    pub reduced_sample: bool,
}

/// The externally-visible prediction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub landing_prediction: LandingPrediction,
    pub trajectory: TrajectoryResponse,
    pub uncertainty: UncertaintyResponse,
}

/// Assemble the public response from aggregation results
///
/// `simplify_every` keeps every n-th trajectory point (the first and last
/// points always survive); `None` emits the full path.
pub fn assemble(
    inputs: &UserInputs,
    nominal: &SimulationDraw,
    summary: &EnsembleSummary,
    simplify_every: Option<usize>,
) -> PredictionResponse {
    let points: Vec<TrajectoryPointResponse> = simplified(&nominal.points, simplify_every)
        .into_iter()
        .map(point_response)
        .collect();

    let metadata = TrajectoryMetadata {
        point_count: points.len(),
        time_step_seconds: inputs.prediction_parameters.time_step_seconds,
        coordinate_system: COORDINATE_SYSTEM.to_string(),
    };

    let factors = match &summary.attribution {
        Attribution::Fractions(map) => Some(
            map.iter()
                .map(|(source, fraction)| (source.name().to_string(), round_dp(*fraction, 4)))
                .collect::<BTreeMap<String, f64>>(),
        ),
        Attribution::Unavailable => None,
    };

    PredictionResponse {
        landing_prediction: LandingPrediction {
            coordinates: Coordinates {
                latitude: round_dp(summary.centroid_latitude, 6),
                longitude: round_dp(summary.centroid_longitude, 6),
                altitude_m: summary.mean_landing_altitude_m.round() as i64,
            },
            confidence_interval: ConfidenceIntervalResponse {
                radius_km: round_dp(summary.confidence.radius_km, 2),
                probability: summary.confidence.probability,
            },
            estimated_landing_time: summary
                .mean_landing_time
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            flight_duration_hours: round_dp(summary.mean_flight_duration_s / 3600.0, 2),
            total_distance_km: round_dp(nominal.ground_track_km(), 2),
        },
        trajectory: TrajectoryResponse { points, metadata },
        uncertainty: UncertaintyResponse {
            landing_zone: LandingZone {
                radius_km: round_dp(summary.confidence.radius_km, 2),
                confidence_level: summary.confidence.probability,
                factors,
            },
            time_uncertainty_hours: round_dp(summary.time_uncertainty_s / 3600.0, 2),
            altitude_uncertainty_m: summary.altitude_uncertainty_m.round() as i64,
            reduced_sample: summary.reduced_sample,
        },
    }
}

/// Keep every n-th point plus the first and last
fn simplified(points: &[TrajectoryPoint], every: Option<usize>) -> Vec<&TrajectoryPoint> {
    match every {
        None | Some(0) | Some(1) => points.iter().collect(),
        Some(n) => points
            .iter()
            .enumerate()
            .filter(|(i, _)| *i == 0 || *i == points.len() - 1 || i % n == 0)
            .map(|(_, p)| p)
            .collect(),
    }
}

fn point_response(point: &TrajectoryPoint) -> TrajectoryPointResponse {
    TrajectoryPointResponse {
        time: point.time.to_rfc3339_opts(SecondsFormat::Secs, true),
        latitude: round_dp(point.latitude, 6),
        longitude: round_dp(point.longitude, 6),
        altitude_m: point.altitude_m.round() as i64,
        wind_speed_ms: point.wind_speed_ms.map(|v| round_dp(v, 1)),
        wind_direction_deg: point.wind_direction_deg.map(|v| round_dp(v, 1)),
        temperature_c: point.temperature_c.map(|v| round_dp(v, 1)),
        pressure_hpa: point.pressure_hpa.map(|v| round_dp(v, 1)),
    }
}

/// Round to `dp` decimal places; only ever used at the response boundary
fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}
