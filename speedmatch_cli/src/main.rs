mod error_fmt;

use clap::Parser;
use eyre::WrapErr;
use speedmatch_config::Config;
use speedmatch_core::{RawSampleSet, RunCfg, runner};
use speedmatch_hardware::sim::{SimulatedLoop, SpeedModel};
use speedmatch_traits::SegmentId;
use speedmatch_traits::clock::ManualClock;
use std::path::PathBuf;
use std::sync::Arc;

/// Calibrate a vehicle's speed table against a simulated track loop.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Skip live acquisition and synthesize from a persisted samples CSV
    #[arg(long)]
    load_samples: Option<PathBuf>,

    /// Write the acquired raw samples to a CSV for later reuse
    #[arg(long)]
    save_samples: Option<PathBuf>,

    /// Emit the final curve (or error) as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Log level override ("info", "debug", ...)
    #[arg(long)]
    log_level: Option<String>,

    /// Travel-time jitter for the simulated loop, 0.0..=0.9
    #[arg(long, default_value_t = 0.02)]
    sim_jitter: f64,
}

fn init_logging(
    cfg: &speedmatch_config::Logging,
    override_level: Option<&str>,
) -> eyre::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = override_level
        .map(str::to_owned)
        .or_else(|| cfg.level.clone())
        .unwrap_or_else(|| "info".to_owned());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);

    if let Some(file) = &cfg.file {
        let path = std::path::Path::new(file);
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("speedmatch.log"));
        let appender = match cfg.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer = tracing_subscriber::fmt::layer().json().with_writer(writer);
        registry.with(file_layer).init();
        Ok(Some(guard))
    } else {
        registry.init();
        Ok(None)
    }
}

/// Assemble the simulated loop: measured segments keep their configured
/// lengths; monitored-but-unmeasured detectors get a filler length. With no
/// monitored list, pad the loop so measured segments have working neighbors.
fn build_loop_segments(cfg: &Config) -> Vec<(SegmentId, f64)> {
    const FILLER_LENGTH_IN: f64 = 24.0;

    let measured_len = |id: &str| {
        cfg.segments
            .measured
            .iter()
            .find(|seg| seg.id == id)
            .map(|seg| seg.length_in)
    };

    if cfg.detectors.monitored.is_empty() {
        let mut segments: Vec<(SegmentId, f64)> = cfg
            .segments
            .measured
            .iter()
            .map(|seg| (SegmentId::new(seg.id.clone()), seg.length_in))
            .collect();
        for i in 1..=3 {
            segments.push((SegmentId::new(format!("SIM{i}")), FILLER_LENGTH_IN));
        }
        segments
    } else {
        cfg.detectors
            .monitored
            .iter()
            .filter(|id| !cfg.detectors.ignored.contains(id))
            .map(|id| {
                (
                    SegmentId::new(id.clone()),
                    measured_len(id).unwrap_or(FILLER_LENGTH_IN),
                )
            })
            .collect()
    }
}

fn run_cli(args: &Args) -> eyre::Result<speedmatch_core::CalibrationOutcome> {
    let text = std::fs::read_to_string(&args.config)
        .wrap_err_with(|| format!("read config {:?}", args.config))?;
    let cfg = speedmatch_config::load_toml(&text).wrap_err("parse config TOML")?;
    cfg.validate().map_err(|e| {
        eyre::Report::new(speedmatch_core::CalibrationError::InvalidConfiguration(
            e.to_string(),
        ))
    })?;

    let run_cfg = RunCfg::from_config(&cfg);
    let segments = runner::measured_segments(&cfg);

    let outcome = if let Some(path) = &args.load_samples {
        let rows = speedmatch_config::load_samples_csv(path)?;
        tracing::info!(rows = rows.len(), ?path, "synthesizing from persisted samples");
        let samples = RawSampleSet::from_rows(&rows)?;
        runner::synthesize_from_samples(samples, &segments, &run_cfg)?
    } else {
        let clock = ManualClock::new();
        let layout = SimulatedLoop::new(
            build_loop_segments(&cfg),
            SpeedModel::default(),
            clock.clone(),
        )?
        .with_jitter(args.sim_jitter, 0x5eed);
        runner::run(
            layout.throttle(),
            layout.detectors(),
            Arc::new(clock),
            &segments,
            &run_cfg,
        )?
    };

    if let Some(path) = &args.save_samples {
        speedmatch_config::save_samples_csv(path, &outcome.samples.to_rows())?;
        tracing::info!(?path, "raw samples written");
    }

    Ok(outcome)
}

fn main() {
    let args = Args::parse();
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporting: {e}");
    }

    // Parse logging config up front so init failures are visible.
    let logging = std::fs::read_to_string(&args.config)
        .ok()
        .and_then(|text| speedmatch_config::load_toml(&text).ok())
        .map(|cfg| cfg.logging)
        .unwrap_or_default();
    let _guard = match init_logging(&logging, args.log_level.as_deref()) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            None
        }
    };

    if let Err(e) = ctrlc::set_handler(|| {
        tracing::warn!("interrupted; aborting calibration run");
        std::process::exit(130);
    }) {
        tracing::warn!(error = %e, "could not install ctrl-c handler");
    }

    match run_cli(&args) {
        Ok(outcome) => {
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({ "steps": outcome.curve.steps() })
                );
            } else {
                println!("Computed speed table ({} steps):", outcome.curve.len());
                for (i, value) in outcome.curve.steps().iter().enumerate() {
                    println!("  step {:>2}: {value:>3}", i + 1);
                }
            }
        }
        Err(e) => {
            if args.json {
                println!("{}", error_fmt::format_error_json(&e));
            } else {
                eprintln!("{}", error_fmt::humanize(&e));
            }
            std::process::exit(error_fmt::exit_code_for_error(&e));
        }
    }
}
