//! Trajectory data produced by the external flight integrator
//!
//! The physical integrator itself lives outside this crate; here we define the
//! shapes it must produce and the seam ([`TrajectoryIntegrator`]) the Monte
//! Carlo runner drives. A draw is owned by the run that created it and never
//! mutated after the integrator returns it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geo;
use crate::inputs::UserInputs;

/// One sample along a simulated flight path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub time: DateTime<Utc>,
    pub latitude: f64,  // degrees
    pub longitude: f64, // degrees
    pub altitude_m: f64,
    pub wind_speed_ms: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub pressure_hpa: Option<f64>,
}

/// Where and when a simulated flight touched down
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandingPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
    pub time: DateTime<Utc>,
}

/// Which uncertainty source was perturbed for a draw
///
/// Attribution needs draws tagged with provenance at creation time; the
/// runner assigns sources round-robin so each stratum carries an isolated
/// perturbation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerturbationSource {
    /// Wind field perturbed within the configured uncertainty
    Wind,
    /// Integrator/model parameters perturbed (drag, burst, ascent rate)
    Model,
    /// Input and weather-data precision perturbed
    DataQuality,
}

impl PerturbationSource {
    /// All sources, in the fixed order used for round-robin assignment and
    /// deterministic reporting
    pub const ALL: [PerturbationSource; 3] = [
        PerturbationSource::Wind,
        PerturbationSource::Model,
        PerturbationSource::DataQuality,
    ];

    /// Source for the i-th draw of a stratified ensemble
    pub fn for_draw(index: u64) -> Self {
        Self::ALL[(index % 3) as usize]
    }

    /// Stable name used in reports
    pub fn name(self) -> &'static str {
        match self {
            PerturbationSource::Wind => "wind",
            PerturbationSource::Model => "model",
            PerturbationSource::DataQuality => "data_quality",
        }
    }
}

/// Why an individual draw produced no usable landing
///
/// Draw failures are data, not faults: the integrator reports them on the
/// draw and the aggregator decides whether the ensemble as a whole survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawFailure {
    /// The integration did not converge
    NonConvergence,
    /// The simulated flight exceeded its duration or wall-clock budget
    ExceededDuration,
}

impl fmt::Display for DrawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawFailure::NonConvergence => write!(f, "integration did not converge"),
            DrawFailure::ExceededDuration => write!(f, "draw exceeded its duration budget"),
        }
    }
}

/// One Monte Carlo realization of a simulated flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationDraw {
    /// Perturbation seed this draw was generated from
    pub seed: u64,
    /// Which uncertainty source was varied
    pub source: PerturbationSource,
    /// Ordered flight path samples
    pub points: Vec<TrajectoryPoint>,
    pub landing: LandingPoint,
    pub flight_duration_s: f64,
    /// Set when the draw produced no usable landing
    pub failure: Option<DrawFailure>,
}

impl SimulationDraw {
    /// Whether this draw contributes a usable landing point
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Peak altitude reached along the path, in meters
    ///
    /// Falls back to the landing altitude for an empty path.
    pub fn peak_altitude_m(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.altitude_m)
            .fold(self.landing.altitude_m, f64::max)
    }

    /// Length of the ground track in km (sum of great-circle legs)
    pub fn ground_track_km(&self) -> f64 {
        self.points
            .windows(2)
            .map(|leg| {
                geo::haversine_km(
                    leg[0].latitude,
                    leg[0].longitude,
                    leg[1].latitude,
                    leg[1].longitude,
                )
            })
            .sum()
    }
}

/// The external trajectory integrator seam
///
/// Implementations must be deterministic for identical `(inputs, seed)` so
/// test fixtures reproduce, and must never panic for inputs that passed
/// validation; integration failures are reported via
/// [`SimulationDraw::failure`]. `Sync` because draws run across a rayon pool
/// sharing one integrator.
pub trait TrajectoryIntegrator: Sync {
    /// Simulate one flight under the given perturbation draw
    fn simulate(
        &self,
        inputs: &UserInputs,
        seed: u64,
        source: PerturbationSource,
    ) -> SimulationDraw;

    /// Simulate the unperturbed nominal flight
    ///
    /// Implementations should disable perturbations entirely for this pass;
    /// the default delegates to seed 0 under the model stratum.
    fn simulate_nominal(&self, inputs: &UserInputs) -> SimulationDraw {
        self.simulate(inputs, 0, PerturbationSource::Model)
    }
}
