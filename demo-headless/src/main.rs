use balloon_sim_core::runner::{CancellationToken, EnsembleRunner, RunError, RunnerConfig};
use balloon_sim_core::trajectory::{
    DrawFailure, LandingPoint, PerturbationSource, SimulationDraw, TrajectoryIntegrator,
    TrajectoryPoint,
};
use balloon_sim_core::{assemble, geo, validate, BalloonType, UserInputs, WindModel};
use chrono::Utc;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::process::ExitCode;
use std::time::Duration;

/// Balloon landing prediction demo with configurable parameters
#[derive(Parser, Debug)]
#[command(name = "balloon-sim-demo")]
#[command(about = "High-altitude balloon landing prediction demo", long_about = None)]
struct Args {
    /// Launch latitude in degrees
    #[arg(long, default_value_t = 40.7128)]
    latitude: f64,

    /// Launch longitude in degrees
    #[arg(long, default_value_t = -74.0060)]
    longitude: f64,

    /// Launch altitude in meters ASL
    #[arg(long, default_value_t = 0)]
    altitude: i32,

    /// Minutes from now until launch
    #[arg(long, default_value_t = 60)]
    lead_minutes: i64,

    /// Balloon type (latex, hdpe, custom)
    #[arg(short, long, default_value = "latex")]
    balloon: String,

    /// Burst altitude in meters
    #[arg(long, default_value_t = 30000)]
    burst_altitude: i32,

    /// Ascent rate in m/s
    #[arg(long, default_value_t = 5.0)]
    ascent_rate: f64,

    /// Wind model (gfs, hrrr, auto)
    #[arg(short, long, default_value = "auto")]
    wind_model: String,

    /// Wind uncertainty in percent
    #[arg(long, default_value_t = 10)]
    wind_uncertainty: u32,

    /// Monte Carlo ensemble size
    #[arg(short, long, default_value_t = 100)]
    runs: u32,

    /// Confidence level for the landing circle
    #[arg(short, long, default_value_t = 0.95)]
    confidence: f64,

    /// Base perturbation seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Keep every n-th trajectory point in the output (0 = all)
    #[arg(long, default_value_t = 30)]
    simplify: usize,
}

/// Built-in synthetic integrator standing in for the physics engine
///
/// Straight ascent to burst, fixed-rate parachute descent, steady eastward
/// synoptic wind. Perturbation magnitude is keyed to the draw's stratum so
/// the demo exercises the full attribution path.
struct SyntheticIntegrator;

impl SyntheticIntegrator {
    #[allow(unused_assignments)]
    fn integrate(inputs: &UserInputs, wind_factor: f64, ascent_factor: f64) -> SimulationDraw {
        const M_PER_DEG_LAT: f64 = 110574.0;
        const M_PER_DEG_LON_EQUATOR: f64 = 111320.0;

        let spec = &inputs.balloon_specification;
        let location = &inputs.launch_location;

        let dt = f64::from(inputs.prediction_parameters.time_step_seconds);
        let max_steps = (f64::from(inputs.prediction_parameters.max_flight_duration_hours)
            * 3600.0
            / dt) as usize;

        let ground_m = f64::from(location.altitude_m);
        let burst_m = f64::from(spec.burst_altitude_m);
        let ascent_ms = spec.ascent_rate_ms * ascent_factor;
        let descent_ms = 8.0;
        let (wind_u, wind_v) = (8.0 * wind_factor, 2.0 * wind_factor);

        let mut lat = location.latitude;
        let mut lon = location.longitude;
        let mut alt = ground_m;
        let mut time = location.launch_time;
        let mut ascending = true;
        let mut points = Vec::new();
        let mut overran = true;

        for _ in 0..max_steps {
            points.push(TrajectoryPoint {
                time,
                latitude: lat,
                longitude: lon,
                altitude_m: alt,
                wind_speed_ms: Some((wind_u * wind_u + wind_v * wind_v).sqrt()),
                wind_direction_deg: None,
                temperature_c: None,
                pressure_hpa: None,
            });

            lat += wind_v * dt / M_PER_DEG_LAT;
            lon += wind_u * dt / (M_PER_DEG_LON_EQUATOR * lat.to_radians().cos());
            time += chrono::Duration::seconds(dt as i64);
            if ascending {
                alt += ascent_ms * dt;
                if alt >= burst_m {
                    ascending = false;
                }
            } else {
                alt -= descent_ms * dt;
                if alt <= ground_m {
                    alt = ground_m;
                    overran = false;
                    break;
                }
            }
        }

        let flight_duration_s = (time - location.launch_time).num_seconds() as f64;
        SimulationDraw {
            seed: 0,
            source: PerturbationSource::Model,
            points,
            landing: LandingPoint {
                latitude: lat,
                longitude: lon,
                altitude_m: ground_m,
                time,
            },
            flight_duration_s,
            failure: overran.then_some(DrawFailure::ExceededDuration),
        }
    }
}

impl TrajectoryIntegrator for SyntheticIntegrator {
    fn simulate(
        &self,
        inputs: &UserInputs,
        seed: u64,
        source: PerturbationSource,
    ) -> SimulationDraw {
        let mut rng = StdRng::seed_from_u64(seed);
        let z: f64 = rng.random_range(-1.0..1.0);
        let wind_pct = f64::from(inputs.prediction_parameters.wind_uncertainty_percent) / 100.0;

        let (wind_factor, ascent_factor) = match source {
            PerturbationSource::Wind => (1.0 + wind_pct * z, 1.0),
            PerturbationSource::Model => (1.0, 1.0 + 0.05 * z),
            PerturbationSource::DataQuality => (1.0 + 0.01 * z, 1.0),
        };

        let mut draw = Self::integrate(inputs, wind_factor, ascent_factor);
        draw.seed = seed;
        draw.source = source;
        draw
    }

    fn simulate_nominal(&self, inputs: &UserInputs) -> SimulationDraw {
        Self::integrate(inputs, 1.0, 1.0)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    println!("=== Balloon Landing Prediction Demo ===\n");

    let now = Utc::now();
    let mut inputs = UserInputs::defaults(now + chrono::Duration::minutes(args.lead_minutes));
    inputs.launch_location.latitude = args.latitude;
    inputs.launch_location.longitude = args.longitude;
    inputs.launch_location.altitude_m = args.altitude;
    inputs.balloon_specification.burst_altitude_m = args.burst_altitude;
    inputs.balloon_specification.ascent_rate_ms = args.ascent_rate;
    inputs.balloon_specification.balloon_type = match args.balloon.to_lowercase().as_str() {
        "hdpe" => BalloonType::Hdpe,
        "custom" => BalloonType::Custom,
        _ => BalloonType::Latex,
    };
    inputs.environmental_parameters.wind_model = match args.wind_model.to_lowercase().as_str() {
        "gfs" => WindModel::Gfs,
        "hrrr" => WindModel::Hrrr,
        _ => WindModel::Auto,
    };
    inputs.prediction_parameters.wind_uncertainty_percent = args.wind_uncertainty;
    inputs.prediction_parameters.monte_carlo_runs = args.runs;

    let errors = validate(&inputs, now);
    if !errors.is_empty() {
        eprintln!("Mission parameters rejected:");
        for error in &errors {
            eprintln!("  {}: {} [{}]", error.field, error.message, error.rule);
        }
        return ExitCode::FAILURE;
    }

    println!(
        "Launch: ({:.4}, {:.4}) at {} m, {} runs, burst {} m",
        inputs.launch_location.latitude,
        inputs.launch_location.longitude,
        inputs.launch_location.altitude_m,
        args.runs,
        args.burst_altitude
    );

    let runner = EnsembleRunner::new(RunnerConfig {
        draw_timeout: Duration::from_secs(30),
        ensemble_timeout: Duration::from_secs(300),
        base_seed: args.seed,
    });

    let (nominal, summary) = match runner.predict(
        &SyntheticIntegrator,
        &inputs,
        args.confidence,
        &CancellationToken::new(),
    ) {
        Ok(result) => result,
        Err(RunError::Timeout {
            completed, budget, ..
        }) => {
            eprintln!(
                "Ensemble timed out after {budget:?} with {} draws completed",
                completed.len()
            );
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("Prediction failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    let simplify = (args.simplify > 0).then_some(args.simplify);
    let response = assemble(&inputs, &nominal, &summary, simplify);

    println!(
        "{}",
        serde_json::to_string_pretty(&response).expect("response serializes")
    );

    let landing = &response.landing_prediction.coordinates;
    if let Some(utm) = geo::to_utm(landing.latitude, landing.longitude) {
        println!("\nLanding (UTM):  {utm}");
    }
    if let Some(mgrs) = geo::to_mgrs(landing.latitude, landing.longitude) {
        println!("Landing (MGRS): {mgrs}");
    }

    ExitCode::SUCCESS
}
