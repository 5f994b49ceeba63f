//! Mission parameter model for balloon flight prediction
//!
//! Pure value containers describing one prediction request: where the balloon
//! launches, what it is made of, which weather products drive the simulation,
//! and how the Monte Carlo run is shaped. Construction never fails; whether a
//! set of parameters is physically meaningful is decided by the
//! [`crate::validation`] module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Documented defaults used to pre-populate a [`UserInputs`] before user edits.
///
/// The defaults describe a typical latex sounding launch from New York City
/// and must themselves pass validation (enforced by a test invariant).
pub mod defaults {
    /// Launch latitude in degrees (New York City)
    pub const LAUNCH_LATITUDE: f64 = 40.7128;
    /// Launch longitude in degrees (New York City)
    pub const LAUNCH_LONGITUDE: f64 = -74.0060;
    /// Launch altitude in meters above sea level
    pub const LAUNCH_ALTITUDE_M: i32 = 0;
    /// Initial envelope volume in m³
    pub const INITIAL_VOLUME_M3: f64 = 1.0;
    /// Burst altitude in meters
    pub const BURST_ALTITUDE_M: i32 = 30000;
    /// Ascent rate in m/s
    pub const ASCENT_RATE_MS: f64 = 5.0;
    /// Payload weight in kg
    pub const PAYLOAD_WEIGHT_KG: f64 = 1.0;
    /// Drag coefficient (sphere approximation)
    pub const DRAG_COEFFICIENT: f64 = 0.47;
    /// Temperature offset applied to the weather product in °C
    pub const TEMPERATURE_OFFSET_C: f64 = 0.0;
    /// Humidity factor in %
    pub const HUMIDITY_FACTOR_PCT: u8 = 50;
    /// Maximum simulated flight duration in hours
    pub const MAX_FLIGHT_DURATION_HOURS: u32 = 24;
    /// Integration time step in seconds
    pub const TIME_STEP_SECONDS: u32 = 10;
    /// Wind perturbation magnitude in percent
    pub const WIND_UNCERTAINTY_PERCENT: u32 = 10;
    /// Monte Carlo ensemble size
    pub const MONTE_CARLO_RUNS: u32 = 100;
}

/// Balloon envelope material
///
/// A closed set: unknown materials are a compile error, not a runtime
/// string-match risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalloonType {
    /// Latex sounding balloon - bursts at altitude, shorter flights
    Latex,
    /// HDPE zero-pressure or superpressure film - long duration floats
    Hdpe,
    /// User-specified envelope with custom characteristics
    Custom,
}

/// Weather data provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherSource {
    /// Open-Meteo forecast API
    OpenMeteo,
    /// NOAA Global Forecast System
    NoaaGfs,
    /// Let the retrieval layer pick the best available source
    Auto,
}

/// Wind model driving the trajectory integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindModel {
    /// Global Forecast System (global coverage, ~13 km)
    Gfs,
    /// High-Resolution Rapid Refresh (CONUS only, ~3 km)
    Hrrr,
    /// Let the retrieval layer pick based on the launch region
    Auto,
}

/// Where and when the balloon leaves the ground
///
/// Coordinates are WGS84 degrees carried at 6-decimal precision, altitude is
/// meters above sea level. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchLocation {
    pub latitude: f64,  // degrees, [-90, 90]
    pub longitude: f64, // degrees, [-180, 180]
    pub altitude_m: i32, // meters ASL, [-500, 6000]
    /// Launch instant; must be strictly after the evaluation time
    pub launch_time: DateTime<Utc>,
}

/// Physical description of the balloon and payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalloonSpecification {
    pub balloon_type: BalloonType,
    pub initial_volume_m3: f64,  // m³, [0.1, 1000]
    pub burst_altitude_m: i32,   // meters, [1000, 60000]
    pub ascent_rate_ms: f64,     // m/s, [1, 10]
    pub payload_weight_kg: f64,  // kg, [0.1, 50]
    pub drag_coefficient: f64,   // dimensionless, [0.1, 2.0]
}

/// Weather product selection and environment adjustments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalParameters {
    pub weather_source: WeatherSource,
    pub wind_model: WindModel,
    pub temperature_offset_c: f64, // °C, [-10, 10]
    pub humidity_factor_pct: u8,   // %, [0, 100]
}

/// How the Monte Carlo prediction run is shaped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionParameters {
    pub max_flight_duration_hours: u32, // [1, 168]
    pub time_step_seconds: u32,         // [1, 60]
    pub wind_uncertainty_percent: u32,  // [0, 50]
    pub monte_carlo_runs: u32,          // [1, 1000]
}

/// Complete set of mission parameters for one prediction request
///
/// This is the unit the validation engine accepts and validates atomically,
/// and the read-only input shared by every Monte Carlo draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInputs {
    pub launch_location: LaunchLocation,
    pub balloon_specification: BalloonSpecification,
    pub environmental_parameters: EnvironmentalParameters,
    pub prediction_parameters: PredictionParameters,
}

impl UserInputs {
    /// Build the default parameter set for the given launch instant
    ///
    /// The launch instant is caller-supplied because "one hour from now" is a
    /// UI concern; everything else comes from the [`defaults`] table.
    pub fn defaults(launch_time: DateTime<Utc>) -> Self {
        UserInputs {
            launch_location: LaunchLocation {
                latitude: defaults::LAUNCH_LATITUDE,
                longitude: defaults::LAUNCH_LONGITUDE,
                altitude_m: defaults::LAUNCH_ALTITUDE_M,
                launch_time,
            },
            balloon_specification: BalloonSpecification {
                balloon_type: BalloonType::Latex,
                initial_volume_m3: defaults::INITIAL_VOLUME_M3,
                burst_altitude_m: defaults::BURST_ALTITUDE_M,
                ascent_rate_ms: defaults::ASCENT_RATE_MS,
                payload_weight_kg: defaults::PAYLOAD_WEIGHT_KG,
                drag_coefficient: defaults::DRAG_COEFFICIENT,
            },
            environmental_parameters: EnvironmentalParameters {
                weather_source: WeatherSource::Auto,
                wind_model: WindModel::Auto,
                temperature_offset_c: defaults::TEMPERATURE_OFFSET_C,
                humidity_factor_pct: defaults::HUMIDITY_FACTOR_PCT,
            },
            prediction_parameters: PredictionParameters {
                max_flight_duration_hours: defaults::MAX_FLIGHT_DURATION_HOURS,
                time_step_seconds: defaults::TIME_STEP_SECONDS,
                wind_uncertainty_percent: defaults::WIND_UNCERTAINTY_PERCENT,
                monte_carlo_runs: defaults::MONTE_CARLO_RUNS,
            },
        }
    }
}
