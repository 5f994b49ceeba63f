//! Monte Carlo ensemble aggregation
//!
//! Turns a completed ensemble of [`SimulationDraw`]s into the landing
//! centroid, empirical confidence radius, distance percentiles, and
//! per-factor uncertainty attribution. The math is deliberately
//! distribution-free: the confidence radius is the smallest circle about the
//! centroid containing the target fraction of landings (an order statistic),
//! never a parametric Gaussian fit.
//!
//! Attribution uses the stratified-sampling design described in DESIGN.md:
//! each draw perturbs exactly one named source, so the per-stratum dispersion
//! about the shared centroid isolates that source's contribution. An ensemble
//! without at least two strata carries no attribution signal and reports
//! [`Attribution::Unavailable`] rather than a fabricated split.

use chrono::{DateTime, Utc};
use nalgebra::Vector2;
use rustc_hash::FxHashMap;
use std::fmt;
use tracing::debug;

use crate::geo;
use crate::trajectory::{PerturbationSource, SimulationDraw};

/// Fraction of draws that must succeed for aggregation to proceed
pub const DEFAULT_MIN_SUCCESS_FRACTION: f64 = 0.9;

/// Kilometers of northing per degree of latitude (WGS84 mean)
const KM_PER_DEG_LAT: f64 = 110.574;
/// Kilometers of easting per degree of longitude at the equator
const KM_PER_DEG_LON_EQUATOR: f64 = 111.320;

/// Confidence circle about the landing centroid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub radius_km: f64,
    /// Fraction of draws contained, e.g. 0.95
    pub probability: f64,
}

/// Landing-distance order statistics, km from the centroid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistancePercentiles {
    pub p10_km: f64,
    pub p50_km: f64,
    pub p90_km: f64,
}

/// Decomposition of landing dispersion into named uncertainty sources
#[derive(Debug, Clone, PartialEq)]
pub enum Attribution {
    /// Per-source variance shares, normalized to sum to 1.0
    Fractions(FxHashMap<PerturbationSource, f64>),
    /// The ensemble carried no usable stratification signal
    Unavailable,
}

impl Attribution {
    /// Fraction attributed to one source, if attribution is available
    pub fn fraction(&self, source: PerturbationSource) -> Option<f64> {
        match self {
            Attribution::Fractions(map) => map.get(&source).copied(),
            Attribution::Unavailable => None,
        }
    }
}

/// Everything the output assembler needs about one aggregated ensemble
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleSummary {
    pub centroid_latitude: f64,
    pub centroid_longitude: f64,
    pub mean_landing_altitude_m: f64,
    pub mean_landing_time: DateTime<Utc>,
    pub confidence: ConfidenceInterval,
    pub percentiles: DistancePercentiles,
    pub attribution: Attribution,
    pub mean_flight_duration_s: f64,
    /// Sample standard deviation of flight duration, seconds
    pub time_uncertainty_s: f64,
    /// Sample standard deviation of peak altitude, meters
    pub altitude_uncertainty_m: f64,
    pub attempted: usize,
    pub succeeded: usize,
    /// Set when the ensemble was salvaged from a cancelled run
    pub reduced_sample: bool,
}

impl EnsembleSummary {
    /// Mark this summary as computed from a salvaged, smaller-than-requested
    /// ensemble (e.g. after cancellation)
    pub fn with_reduced_sample(mut self) -> Self {
        self.reduced_sample = true;
        self
    }
}

/// Why an ensemble could not be aggregated
///
/// These are caller-side configuration or availability failures, surfaced as
/// explicit variants instead of degenerate zero results that would mask them.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// The ensemble was empty; validation guarantees at least one run, so an
    /// empty ensemble means a caller bypassed validation
    EmptyEnsemble,
    /// The requested confidence level is not in (0, 1]
    InvalidConfidenceLevel { level: f64 },
    /// Too few draws succeeded to trust the statistics
    PartialEnsemble {
        succeeded: usize,
        attempted: usize,
        /// Minimum successful draws the tolerance policy required
        required: usize,
    },
}

impl fmt::Display for AggregationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationError::EmptyEnsemble => {
                write!(f, "cannot aggregate an empty ensemble")
            }
            AggregationError::InvalidConfidenceLevel { level } => {
                write!(f, "confidence level {level} is not in (0, 1]")
            }
            AggregationError::PartialEnsemble {
                succeeded,
                attempted,
                required,
            } => write!(
                f,
                "only {succeeded} of {attempted} draws succeeded ({required} required)"
            ),
        }
    }
}

impl std::error::Error for AggregationError {}

/// Aggregate a completed ensemble under the default failed-draw tolerance
///
/// See [`aggregate_with_tolerance`] for the full contract.
pub fn aggregate(
    draws: &[SimulationDraw],
    confidence_level: f64,
) -> Result<EnsembleSummary, AggregationError> {
    aggregate_with_tolerance(draws, confidence_level, DEFAULT_MIN_SUCCESS_FRACTION)
}

/// Aggregate a completed ensemble into landing and uncertainty statistics
///
/// `confidence_level` is the contained fraction for the confidence circle,
/// in (0, 1]. `min_success_fraction` is the failed-draw tolerance: if fewer
/// than that fraction of draws succeeded the whole ensemble is rejected with
/// [`AggregationError::PartialEnsemble`].
///
/// A single-draw ensemble is an explicit degenerate branch: radius 0,
/// probability 1.0, percentiles collapsed onto the point, and attribution
/// wholly assigned to the model (there is no perturbation signal to split).
pub fn aggregate_with_tolerance(
    draws: &[SimulationDraw],
    confidence_level: f64,
    min_success_fraction: f64,
) -> Result<EnsembleSummary, AggregationError> {
    if draws.is_empty() {
        return Err(AggregationError::EmptyEnsemble);
    }
    if !(confidence_level > 0.0 && confidence_level <= 1.0) {
        return Err(AggregationError::InvalidConfidenceLevel {
            level: confidence_level,
        });
    }

    let attempted = draws.len();
    let successes: Vec<&SimulationDraw> = draws.iter().filter(|d| d.is_success()).collect();
    let succeeded = successes.len();

    let required = (min_success_fraction * attempted as f64).ceil() as usize;
    if succeeded < required.max(1) {
        return Err(AggregationError::PartialEnsemble {
            succeeded,
            attempted,
            required: required.max(1),
        });
    }

    debug!(attempted, succeeded, confidence_level, "aggregating ensemble");

    let n = succeeded as f64;
    let centroid_latitude = successes.iter().map(|d| d.landing.latitude).sum::<f64>() / n;
    let centroid_longitude = successes.iter().map(|d| d.landing.longitude).sum::<f64>() / n;
    let mean_landing_altitude_m =
        successes.iter().map(|d| d.landing.altitude_m).sum::<f64>() / n;

    let mean_landing_millis = (successes
        .iter()
        .map(|d| d.landing.time.timestamp_millis())
        .sum::<i64>() as f64
        / n) as i64;
    let mean_landing_time = DateTime::from_timestamp_millis(mean_landing_millis)
        .unwrap_or(successes[0].landing.time);

    let durations: Vec<f64> = successes.iter().map(|d| d.flight_duration_s).collect();
    let mean_flight_duration_s = durations.iter().sum::<f64>() / n;
    let time_uncertainty_s = sample_std_dev(&durations);

    let peaks: Vec<f64> = successes.iter().map(|d| d.peak_altitude_m()).collect();
    let altitude_uncertainty_m = sample_std_dev(&peaks);

    // Degenerate single-draw ensemble: no dispersion, no perturbation signal
    if succeeded == 1 {
        let mut factors = FxHashMap::default();
        factors.insert(PerturbationSource::Wind, 0.0);
        factors.insert(PerturbationSource::Model, 1.0);
        factors.insert(PerturbationSource::DataQuality, 0.0);

        return Ok(EnsembleSummary {
            centroid_latitude,
            centroid_longitude,
            mean_landing_altitude_m,
            mean_landing_time,
            confidence: ConfidenceInterval {
                radius_km: 0.0,
                probability: 1.0,
            },
            percentiles: DistancePercentiles {
                p10_km: 0.0,
                p50_km: 0.0,
                p90_km: 0.0,
            },
            attribution: Attribution::Fractions(factors),
            mean_flight_duration_s,
            time_uncertainty_s,
            altitude_uncertainty_m,
            attempted,
            succeeded,
            reduced_sample: false,
        });
    }

    let mut distances_km: Vec<f64> = successes
        .iter()
        .map(|d| {
            geo::haversine_km(
                centroid_latitude,
                centroid_longitude,
                d.landing.latitude,
                d.landing.longitude,
            )
        })
        .collect();
    distances_km.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let confidence = ConfidenceInterval {
        radius_km: empirical_radius(&distances_km, confidence_level),
        probability: confidence_level,
    };

    let percentiles = DistancePercentiles {
        p10_km: percentile(&distances_km, 0.10),
        p50_km: percentile(&distances_km, 0.50),
        p90_km: percentile(&distances_km, 0.90),
    };

    let attribution = attribute_variance(&successes, centroid_latitude, centroid_longitude);

    Ok(EnsembleSummary {
        centroid_latitude,
        centroid_longitude,
        mean_landing_altitude_m,
        mean_landing_time,
        confidence,
        percentiles,
        attribution,
        mean_flight_duration_s,
        time_uncertainty_s,
        altitude_uncertainty_m,
        attempted,
        succeeded,
        reduced_sample: false,
    })
}

/// Radius of the smallest circle containing at least `level` of the draws
///
/// Empirical quantile over the sorted distances; all points sitting exactly
/// at the boundary distance are inside the returned radius by construction.
fn empirical_radius(sorted_distances_km: &[f64], level: f64) -> f64 {
    let n = sorted_distances_km.len();
    let k = ((level * n as f64).ceil() as usize).clamp(1, n);
    sorted_distances_km[k - 1]
}

/// Order-statistic percentile with linear interpolation
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    let n = sorted_values.len();
    if n == 1 {
        return sorted_values[0];
    }

    let index = p * (n - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = index - lower as f64;
        sorted_values[lower] * (1.0 - weight) + sorted_values[upper] * weight
    }
}

/// Sample standard deviation (n-1 denominator); 0 for fewer than two samples
fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Partition landing dispersion into per-source variance shares
///
/// Each stratum's mean squared tangent-plane offset from the shared centroid
/// estimates that source's dispersion; normalizing the per-stratum values
/// yields fractions that sum to 1.0 exactly. Requires at least two distinct
/// strata and nonzero total dispersion, else the attribution is unavailable.
fn attribute_variance(
    successes: &[&SimulationDraw],
    centroid_latitude: f64,
    centroid_longitude: f64,
) -> Attribution {
    let lat_scale = KM_PER_DEG_LAT;
    let lon_scale = KM_PER_DEG_LON_EQUATOR * centroid_latitude.to_radians().cos();

    let mut sums: FxHashMap<PerturbationSource, (f64, usize)> = FxHashMap::default();
    for draw in successes {
        let offset = Vector2::new(
            (draw.landing.longitude - centroid_longitude) * lon_scale,
            (draw.landing.latitude - centroid_latitude) * lat_scale,
        );
        let entry = sums.entry(draw.source).or_insert((0.0, 0));
        entry.0 += offset.norm_squared();
        entry.1 += 1;
    }

    if sums.len() < 2 {
        return Attribution::Unavailable;
    }

    let per_source: FxHashMap<PerturbationSource, f64> = sums
        .into_iter()
        .map(|(source, (sum, count))| (source, sum / count as f64))
        .collect();
    let total: f64 = per_source.values().sum();
    if total <= f64::EPSILON {
        return Attribution::Unavailable;
    }

    Attribution::Fractions(
        per_source
            .into_iter()
            .map(|(source, value)| (source, value / total))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::LandingPoint;
    use chrono::TimeZone;

    fn landing_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 14, 30, 0).unwrap()
    }

    fn draw_at(lat: f64, lon: f64, source: PerturbationSource, seed: u64) -> SimulationDraw {
        SimulationDraw {
            seed,
            source,
            points: Vec::new(),
            landing: LandingPoint {
                latitude: lat,
                longitude: lon,
                altitude_m: 50.0,
                time: landing_time(),
            },
            flight_duration_s: 9000.0,
            failure: None,
        }
    }

    fn failed_draw(seed: u64) -> SimulationDraw {
        let mut d = draw_at(40.0, -74.0, PerturbationSource::Model, seed);
        d.failure = Some(crate::trajectory::DrawFailure::NonConvergence);
        d
    }

    #[test]
    fn test_empty_ensemble_fails_fast() {
        assert_eq!(
            aggregate(&[], 0.95).unwrap_err(),
            AggregationError::EmptyEnsemble
        );
    }

    #[test]
    fn test_invalid_confidence_level() {
        let draws = vec![draw_at(40.0, -74.0, PerturbationSource::Wind, 0)];
        assert!(matches!(
            aggregate(&draws, 0.0).unwrap_err(),
            AggregationError::InvalidConfidenceLevel { .. }
        ));
        assert!(matches!(
            aggregate(&draws, 1.5).unwrap_err(),
            AggregationError::InvalidConfidenceLevel { .. }
        ));
    }

    #[test]
    fn test_single_draw_degenerate_branch() {
        let draws = vec![draw_at(40.0, -74.0, PerturbationSource::Wind, 0)];
        let summary = aggregate(&draws, 0.95).unwrap();

        assert_eq!(summary.confidence.radius_km, 0.0);
        assert_eq!(summary.confidence.probability, 1.0);
        assert_eq!(summary.percentiles.p90_km, 0.0);
        assert_eq!(
            summary.attribution.fraction(PerturbationSource::Model),
            Some(1.0)
        );
        assert_eq!(
            summary.attribution.fraction(PerturbationSource::Wind),
            Some(0.0)
        );
    }

    #[test]
    fn test_partial_ensemble_rejected_below_tolerance() {
        // 2 of 4 succeeded, default tolerance requires ceil(0.9 * 4) = 4
        let draws = vec![
            draw_at(40.0, -74.0, PerturbationSource::Wind, 0),
            draw_at(40.1, -74.0, PerturbationSource::Model, 1),
            failed_draw(2),
            failed_draw(3),
        ];
        let err = aggregate(&draws, 0.95).unwrap_err();
        assert_eq!(
            err,
            AggregationError::PartialEnsemble {
                succeeded: 2,
                attempted: 4,
                required: 4,
            }
        );
    }

    #[test]
    fn test_failed_draws_tolerated_within_policy() {
        let mut draws: Vec<SimulationDraw> = (0..19)
            .map(|i: u32| {
                draw_at(
                    40.0 + f64::from(i) * 0.001,
                    -74.0,
                    PerturbationSource::for_draw(u64::from(i)),
                    u64::from(i),
                )
            })
            .collect();
        draws.push(failed_draw(19));

        // 19/20 = 95% success is above the 90% tolerance
        let summary = aggregate(&draws, 0.95).unwrap();
        assert_eq!(summary.attempted, 20);
        assert_eq!(summary.succeeded, 19);
    }

    #[test]
    fn test_centroid_is_arithmetic_mean() {
        let draws = vec![
            draw_at(40.0, -74.2, PerturbationSource::Wind, 0),
            draw_at(40.2, -74.0, PerturbationSource::Model, 1),
            draw_at(40.1, -73.9, PerturbationSource::DataQuality, 2),
        ];
        let summary = aggregate(&draws, 0.95).unwrap();
        assert!((summary.centroid_latitude - 40.1).abs() < 1e-9);
        assert!((summary.centroid_longitude - (-74.0333333)).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_radius_includes_boundary_ties() {
        // Distances from centroid-ish cluster: two draws share the boundary
        // distance; the empirical radius includes both.
        let sorted = vec![0.0, 1.0, 2.0, 2.0, 3.0, 10.0];
        let radius = empirical_radius(&sorted, 0.5);
        // k = ceil(0.5 * 6) = 3 -> third smallest = 2.0, tied point included
        assert_eq!(radius, 2.0);
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 0.5), 3.0);
        assert_eq!(percentile(&values, 1.0), 5.0);
        assert_eq!(percentile(&values, 0.25), 2.0);
        // Interpolated between order statistics
        assert!((percentile(&values, 0.1) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_attribution_fractions_sum_to_one() {
        let draws: Vec<SimulationDraw> = (0..30)
            .map(|i: u32| {
                let spread = match PerturbationSource::for_draw(u64::from(i)) {
                    PerturbationSource::Wind => 0.05,
                    PerturbationSource::Model => 0.02,
                    PerturbationSource::DataQuality => 0.01,
                };
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                draw_at(
                    40.0 + sign * spread * f64::from(i % 3 + 1),
                    -74.0 + sign * spread,
                    PerturbationSource::for_draw(u64::from(i)),
                    u64::from(i),
                )
            })
            .collect();

        let summary = aggregate(&draws, 0.95).unwrap();
        match &summary.attribution {
            Attribution::Fractions(map) => {
                let total: f64 = map.values().sum();
                assert!((total - 1.0).abs() < 1e-6, "fractions sum to {total}");
                // Wind was perturbed hardest, so it should dominate
                let wind = map[&PerturbationSource::Wind];
                let data = map[&PerturbationSource::DataQuality];
                assert!(wind > data);
            }
            Attribution::Unavailable => panic!("attribution should be available"),
        }
    }

    #[test]
    fn test_attribution_unavailable_without_stratification() {
        // All draws perturbed the same source: no signal to decompose
        let draws: Vec<SimulationDraw> = (0..10)
            .map(|i: u32| {
                draw_at(
                    40.0 + f64::from(i) * 0.01,
                    -74.0,
                    PerturbationSource::Wind,
                    u64::from(i),
                )
            })
            .collect();

        let summary = aggregate(&draws, 0.95).unwrap();
        assert_eq!(summary.attribution, Attribution::Unavailable);
    }

    #[test]
    fn test_time_and_altitude_uncertainty() {
        let mut a = draw_at(40.0, -74.0, PerturbationSource::Wind, 0);
        a.flight_duration_s = 8000.0;
        let mut b = draw_at(40.1, -74.0, PerturbationSource::Model, 1);
        b.flight_duration_s = 10000.0;

        let summary = aggregate(&[a, b], 0.95).unwrap();
        assert!((summary.mean_flight_duration_s - 9000.0).abs() < 1e-9);
        // Sample std dev of {8000, 10000}
        assert!((summary.time_uncertainty_s - 1414.213562).abs() < 1e-3);
    }

    #[test]
    fn test_reduced_sample_marker() {
        let draws = vec![
            draw_at(40.0, -74.0, PerturbationSource::Wind, 0),
            draw_at(40.1, -74.0, PerturbationSource::Model, 1),
        ];
        let summary = aggregate(&draws, 0.95).unwrap().with_reduced_sample();
        assert!(summary.reduced_sample);
    }
}
