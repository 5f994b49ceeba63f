//! Input validation engine
//!
//! A stateless rule evaluator over [`UserInputs`]: per-field range checks in
//! field-declaration order, then cross-field consistency checks. Rules live in
//! one ordered table of pure predicate + message entries, so the produced
//! error sequence is deterministic and diffable across runs, and adding a rule
//! is a pure addition to the table.
//!
//! Malformed-but-well-typed input never panics here; it yields
//! [`ValidationError`] values. Within a single field only the first failing
//! rule fires, but cross-field rules still run for fields that already failed
//! their own range checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo;
use crate::inputs::{BalloonType, UserInputs, WindModel};

/// Documented validity ranges for every user-editable field.
///
/// These bounds are structural ("a latitude exists") or operational ("we do
/// not simulate more than a week of flight"), not tunable physics.
pub mod limits {
    use std::ops::RangeInclusive;

    /// Launch latitude, degrees
    pub const LATITUDE: RangeInclusive<f64> = -90.0..=90.0;
    /// Launch longitude, degrees
    pub const LONGITUDE: RangeInclusive<f64> = -180.0..=180.0;
    /// Launch altitude, meters ASL (Dead Sea shore to high mountain sites)
    pub const LAUNCH_ALTITUDE_M: RangeInclusive<i32> = -500..=6000;
    /// Initial envelope volume, m³
    pub const INITIAL_VOLUME_M3: RangeInclusive<f64> = 0.1..=1000.0;
    /// Burst altitude, meters
    pub const BURST_ALTITUDE_M: RangeInclusive<i32> = 1000..=60000;
    /// Ascent rate, m/s
    pub const ASCENT_RATE_MS: RangeInclusive<f64> = 1.0..=10.0;
    /// Payload weight, kg
    pub const PAYLOAD_WEIGHT_KG: RangeInclusive<f64> = 0.1..=50.0;
    /// Drag coefficient, dimensionless
    pub const DRAG_COEFFICIENT: RangeInclusive<f64> = 0.1..=2.0;
    /// Temperature offset, °C
    pub const TEMPERATURE_OFFSET_C: RangeInclusive<f64> = -10.0..=10.0;
    /// Humidity factor, %
    pub const HUMIDITY_FACTOR_PCT: RangeInclusive<u8> = 0..=100;
    /// Maximum flight duration, hours
    pub const MAX_FLIGHT_DURATION_HOURS: RangeInclusive<u32> = 1..=168;
    /// Integration time step, seconds
    pub const TIME_STEP_SECONDS: RangeInclusive<u32> = 1..=60;
    /// Wind uncertainty, percent
    pub const WIND_UNCERTAINTY_PERCENT: RangeInclusive<u32> = 0..=50;
    /// Monte Carlo ensemble size
    pub const MONTE_CARLO_RUNS: RangeInclusive<u32> = 1..=1000;
}

/// How serious a validation finding is
///
/// Every shipped rule is `Error`; `Warning` is reserved for advisory rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// The prediction must not run with this input
    Error,
    /// The prediction may run but the result is suspect
    Warning,
}

/// One violated validation rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `launch_location.latitude`
    pub field: &'static str,
    /// Stable rule identifier, e.g. `burst_above_launch_altitude`
    pub rule: &'static str,
    /// Human-readable description of the violation
    pub message: String,
    pub severity: Severity,
}

/// Tunable validation policy
///
/// Holds the knobs that are operational policy rather than physics. A latex
/// envelope cannot float for days the way an HDPE one can, so its flight
/// duration ceiling sits well below the generic 168 h bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Flight duration ceiling for latex balloons, hours
    pub latex_max_flight_hours: u32,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy {
            latex_max_flight_hours: 24,
        }
    }
}

/// Evaluation-time context shared by every rule
struct EvalContext {
    now: DateTime<Utc>,
    latex_max_flight_hours: u32,
}

type Check = fn(&UserInputs, &EvalContext) -> Option<String>;

/// One entry of the rule table
struct Rule {
    field: &'static str,
    id: &'static str,
    /// Cross-field rules run even when their field already failed a range check
    cross_field: bool,
    severity: Severity,
    check: Check,
}

/// Per-field helper: the first failing rule for a field suppresses the rest
fn out_of_range_f64(value: f64, range: &std::ops::RangeInclusive<f64>) -> bool {
    !range.contains(&value)
}

/// The fixed rule-evaluation order: per-field checks per section in
/// declaration order, then cross-field checks. Output order follows this
/// table, never discovery order.
const RULES: &[Rule] = &[
    // --- LaunchLocation ---
    Rule {
        field: "launch_location.latitude",
        id: "latitude_finite",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.launch_location.latitude;
            (!v.is_finite()).then(|| "latitude must be a finite number".to_string())
        },
    },
    Rule {
        field: "launch_location.latitude",
        id: "latitude_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.launch_location.latitude;
            out_of_range_f64(v, &limits::LATITUDE)
                .then(|| format!("latitude {v}° is outside [-90°, 90°]"))
        },
    },
    Rule {
        field: "launch_location.longitude",
        id: "longitude_finite",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.launch_location.longitude;
            (!v.is_finite()).then(|| "longitude must be a finite number".to_string())
        },
    },
    Rule {
        field: "launch_location.longitude",
        id: "longitude_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.launch_location.longitude;
            out_of_range_f64(v, &limits::LONGITUDE)
                .then(|| format!("longitude {v}° is outside [-180°, 180°]"))
        },
    },
    Rule {
        field: "launch_location.altitude_m",
        id: "launch_altitude_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.launch_location.altitude_m;
            (!limits::LAUNCH_ALTITUDE_M.contains(&v))
                .then(|| format!("launch altitude {v} m is outside [-500 m, 6000 m]"))
        },
    },
    // --- BalloonSpecification ---
    Rule {
        field: "balloon_specification.initial_volume_m3",
        id: "initial_volume_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.balloon_specification.initial_volume_m3;
            (!v.is_finite() || out_of_range_f64(v, &limits::INITIAL_VOLUME_M3))
                .then(|| format!("initial volume {v} m³ is outside [0.1 m³, 1000 m³]"))
        },
    },
    Rule {
        field: "balloon_specification.burst_altitude_m",
        id: "burst_altitude_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.balloon_specification.burst_altitude_m;
            (!limits::BURST_ALTITUDE_M.contains(&v))
                .then(|| format!("burst altitude {v} m is outside [1000 m, 60000 m]"))
        },
    },
    Rule {
        field: "balloon_specification.ascent_rate_ms",
        id: "ascent_rate_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.balloon_specification.ascent_rate_ms;
            (!v.is_finite() || out_of_range_f64(v, &limits::ASCENT_RATE_MS))
                .then(|| format!("ascent rate {v} m/s is outside [1 m/s, 10 m/s]"))
        },
    },
    Rule {
        field: "balloon_specification.payload_weight_kg",
        id: "payload_weight_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.balloon_specification.payload_weight_kg;
            (!v.is_finite() || out_of_range_f64(v, &limits::PAYLOAD_WEIGHT_KG))
                .then(|| format!("payload weight {v} kg is outside [0.1 kg, 50 kg]"))
        },
    },
    Rule {
        field: "balloon_specification.drag_coefficient",
        id: "drag_coefficient_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.balloon_specification.drag_coefficient;
            (!v.is_finite() || out_of_range_f64(v, &limits::DRAG_COEFFICIENT))
                .then(|| format!("drag coefficient {v} is outside [0.1, 2.0]"))
        },
    },
    // --- EnvironmentalParameters ---
    Rule {
        field: "environmental_parameters.temperature_offset_c",
        id: "temperature_offset_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.environmental_parameters.temperature_offset_c;
            (!v.is_finite() || out_of_range_f64(v, &limits::TEMPERATURE_OFFSET_C))
                .then(|| format!("temperature offset {v} °C is outside [-10 °C, 10 °C]"))
        },
    },
    Rule {
        field: "environmental_parameters.humidity_factor_pct",
        id: "humidity_factor_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.environmental_parameters.humidity_factor_pct;
            (!limits::HUMIDITY_FACTOR_PCT.contains(&v))
                .then(|| format!("humidity factor {v} % is outside [0 %, 100 %]"))
        },
    },
    // --- PredictionParameters ---
    Rule {
        field: "prediction_parameters.max_flight_duration_hours",
        id: "max_flight_duration_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.prediction_parameters.max_flight_duration_hours;
            (!limits::MAX_FLIGHT_DURATION_HOURS.contains(&v))
                .then(|| format!("max flight duration {v} h is outside [1 h, 168 h]"))
        },
    },
    Rule {
        field: "prediction_parameters.time_step_seconds",
        id: "time_step_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.prediction_parameters.time_step_seconds;
            (!limits::TIME_STEP_SECONDS.contains(&v))
                .then(|| format!("time step {v} s is outside [1 s, 60 s]"))
        },
    },
    Rule {
        field: "prediction_parameters.wind_uncertainty_percent",
        id: "wind_uncertainty_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.prediction_parameters.wind_uncertainty_percent;
            (!limits::WIND_UNCERTAINTY_PERCENT.contains(&v))
                .then(|| format!("wind uncertainty {v} % is outside [0 %, 50 %]"))
        },
    },
    Rule {
        field: "prediction_parameters.monte_carlo_runs",
        id: "monte_carlo_runs_range",
        cross_field: false,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let v = inputs.prediction_parameters.monte_carlo_runs;
            (!limits::MONTE_CARLO_RUNS.contains(&v))
                .then(|| format!("Monte Carlo run count {v} is outside [1, 1000]"))
        },
    },
    // --- Cross-field rules ---
    Rule {
        field: "balloon_specification.burst_altitude_m",
        id: "burst_above_launch_altitude",
        cross_field: true,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let burst = inputs.balloon_specification.burst_altitude_m;
            let launch = inputs.launch_location.altitude_m;
            (burst <= launch).then(|| {
                format!("burst altitude {burst} m must exceed launch altitude {launch} m")
            })
        },
    },
    Rule {
        field: "launch_location.launch_time",
        id: "launch_time_in_future",
        cross_field: true,
        severity: Severity::Error,
        check: |inputs, ctx| {
            let launch = inputs.launch_location.launch_time;
            (launch <= ctx.now).then(|| {
                format!(
                    "launch time {} is not after the evaluation time {}",
                    launch.to_rfc3339(),
                    ctx.now.to_rfc3339()
                )
            })
        },
    },
    Rule {
        field: "prediction_parameters.max_flight_duration_hours",
        id: "latex_flight_duration_ceiling",
        cross_field: true,
        severity: Severity::Error,
        check: |inputs, ctx| {
            let hours = inputs.prediction_parameters.max_flight_duration_hours;
            let is_latex = inputs.balloon_specification.balloon_type == BalloonType::Latex;
            (is_latex && hours > ctx.latex_max_flight_hours).then(|| {
                format!(
                    "latex balloons are limited to {} h of flight, requested {hours} h",
                    ctx.latex_max_flight_hours
                )
            })
        },
    },
    Rule {
        field: "environmental_parameters.wind_model",
        id: "hrrr_requires_conus",
        cross_field: true,
        severity: Severity::Error,
        check: |inputs, _ctx| {
            let lat = inputs.launch_location.latitude;
            let lon = inputs.launch_location.longitude;
            let hrrr = inputs.environmental_parameters.wind_model == WindModel::Hrrr;
            (hrrr && !geo::within_conus(lat, lon)).then(|| {
                format!(
                    "HRRR wind model only covers the continental US; launch at ({lat}, {lon}) is outside its domain"
                )
            })
        },
    },
];

/// Validate a parameter set against the default policy
///
/// Returns the ordered sequence of violated rules; an empty vector means the
/// inputs are accepted. The result depends only on `inputs` and `now`.
pub fn validate(inputs: &UserInputs, now: DateTime<Utc>) -> Vec<ValidationError> {
    validate_with_policy(inputs, now, &ValidationPolicy::default())
}

/// Validate a parameter set against an explicit policy
pub fn validate_with_policy(
    inputs: &UserInputs,
    now: DateTime<Utc>,
    policy: &ValidationPolicy,
) -> Vec<ValidationError> {
    let ctx = EvalContext {
        now,
        latex_max_flight_hours: policy.latex_max_flight_hours,
    };

    let mut errors = Vec::new();
    let mut failed_fields: Vec<&'static str> = Vec::new();

    for rule in RULES {
        // A field that already produced an error is skipped for further
        // per-field checks, but cross-field rules referencing it still run.
        if !rule.cross_field && failed_fields.contains(&rule.field) {
            continue;
        }
        if let Some(message) = (rule.check)(inputs, &ctx) {
            if !rule.cross_field {
                failed_fields.push(rule.field);
            }
            errors.push(ValidationError {
                field: rule.field,
                rule: rule.id,
                message,
                severity: rule.severity,
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn eval_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn valid_inputs() -> UserInputs {
        UserInputs::defaults(eval_time() + chrono::Duration::hours(1))
    }

    #[test]
    fn test_defaults_validate_clean() {
        let errors = validate(&valid_inputs(), eval_time());
        assert!(errors.is_empty(), "defaults must pass validation: {errors:?}");
    }

    #[test]
    fn test_latitude_out_of_range() {
        let mut inputs = valid_inputs();
        inputs.launch_location.latitude = 91.0;

        let errors = validate(&inputs, eval_time());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "latitude_range");
        assert_eq!(errors[0].field, "launch_location.latitude");
    }

    #[test]
    fn test_nan_latitude_fires_only_finite_rule() {
        let mut inputs = valid_inputs();
        inputs.launch_location.latitude = f64::NAN;

        let errors = validate(&inputs, eval_time());
        let latitude_errors: Vec<_> = errors
            .iter()
            .filter(|e| e.field == "launch_location.latitude")
            .collect();
        // Only the first matching rule fires for a single field
        assert_eq!(latitude_errors.len(), 1);
        assert_eq!(latitude_errors[0].rule, "latitude_finite");
    }

    #[test]
    fn test_burst_below_launch_is_exactly_one_cross_field_error() {
        let mut inputs = valid_inputs();
        inputs.launch_location.altitude_m = 3000;
        inputs.balloon_specification.burst_altitude_m = 2500;

        let errors = validate(&inputs, eval_time());
        let burst: Vec<_> = errors
            .iter()
            .filter(|e| e.rule == "burst_above_launch_altitude")
            .collect();
        assert_eq!(burst.len(), 1);
    }

    #[test]
    fn test_cross_field_runs_even_when_field_failed_range_check() {
        let mut inputs = valid_inputs();
        // 500 m fails the range check AND sits below the 3000 m launch site
        inputs.launch_location.altitude_m = 3000;
        inputs.balloon_specification.burst_altitude_m = 500;

        let errors = validate(&inputs, eval_time());
        let rules: Vec<&str> = errors.iter().map(|e| e.rule).collect();
        assert!(rules.contains(&"burst_altitude_range"));
        assert!(rules.contains(&"burst_above_launch_altitude"));
    }

    #[test]
    fn test_launch_time_must_be_future() {
        let mut inputs = valid_inputs();
        inputs.launch_location.launch_time = eval_time() - chrono::Duration::minutes(5);

        let errors = validate(&inputs, eval_time());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "launch_time_in_future");
    }

    #[test]
    fn test_launch_time_equal_to_now_is_rejected() {
        let mut inputs = valid_inputs();
        inputs.launch_location.launch_time = eval_time();

        let errors = validate(&inputs, eval_time());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "launch_time_in_future");
    }

    #[test]
    fn test_latex_duration_ceiling() {
        let mut inputs = valid_inputs();
        inputs.prediction_parameters.max_flight_duration_hours = 168;

        let errors = validate(&inputs, eval_time());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "latex_flight_duration_ceiling");
        assert!(errors[0].message.contains("latex"));
    }

    #[test]
    fn test_hdpe_allows_generic_ceiling() {
        let mut inputs = valid_inputs();
        inputs.balloon_specification.balloon_type = crate::inputs::BalloonType::Hdpe;
        inputs.prediction_parameters.max_flight_duration_hours = 168;

        let errors = validate(&inputs, eval_time());
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_latex_ceiling_is_policy_not_physics() {
        let mut inputs = valid_inputs();
        inputs.prediction_parameters.max_flight_duration_hours = 48;

        let policy = ValidationPolicy {
            latex_max_flight_hours: 72,
        };
        assert!(validate_with_policy(&inputs, eval_time(), &policy).is_empty());
        assert_eq!(validate(&inputs, eval_time()).len(), 1);
    }

    #[test]
    fn test_hrrr_outside_conus() {
        let mut inputs = valid_inputs();
        // Reykjavik launch with a CONUS-only wind model
        inputs.launch_location.latitude = 64.1466;
        inputs.launch_location.longitude = -21.9426;
        inputs.environmental_parameters.wind_model = crate::inputs::WindModel::Hrrr;

        let errors = validate(&inputs, eval_time());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "hrrr_requires_conus");
    }

    #[test]
    fn test_hrrr_inside_conus_is_accepted() {
        let mut inputs = valid_inputs();
        inputs.environmental_parameters.wind_model = crate::inputs::WindModel::Hrrr;

        assert!(validate(&inputs, eval_time()).is_empty());
    }

    #[test]
    fn test_error_order_is_deterministic_and_idempotent() {
        let mut inputs = valid_inputs();
        inputs.launch_location.latitude = 100.0;
        inputs.balloon_specification.ascent_rate_ms = 0.0;
        inputs.prediction_parameters.monte_carlo_runs = 0;
        inputs.launch_location.launch_time = eval_time() - chrono::Duration::hours(1);

        let first = validate(&inputs, eval_time());
        let second = validate(&inputs, eval_time());
        assert_eq!(first, second);

        // Table order: location, balloon, prediction, then cross-field
        let rules: Vec<&str> = first.iter().map(|e| e.rule).collect();
        assert_eq!(
            rules,
            vec![
                "latitude_range",
                "ascent_rate_range",
                "monte_carlo_runs_range",
                "launch_time_in_future",
            ]
        );
    }
}
