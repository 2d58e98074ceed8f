//! Live tick source: one timer-driven task owning the [`Session`] and the record log.
//!
//! ```text
//! interval tick -> wall clock -> dt_ms -> Session::tick -> RecordLog::append -> console line
//! ```
//!
//! The first tick of a run is reported as on-cadence. Wall-clock steps backwards are
//! rejected by the session and the tick is skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use clockke_config::ClockkeConfig;
use clockke_core::{Session, TickInput, verify};
use clockke_store::{RecordLog, StoreError, read_records};
use clockke_types::{Manifest, Payload, Stamp, UtcTimestamp};

use crate::console::{JitterGrade, Sparkline, tick_line};

/// Flags for `clockke run`.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Tick cadence in milliseconds (default: manifest tick_ms; 1 ms to 24 h)
    #[arg(long)]
    pub tick_ms: Option<f64>,
    /// Stop after N ticks; 0 runs until Ctrl+C (default: [run] max_ticks)
    #[arg(long)]
    pub ticks: Option<u64>,
    /// Record file; .jsonl/.ndjson writes JSON lines, anything else CSV
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Constant stress added to every tick
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub stress: f64,
    /// Uniform noise amplitude added to stress (default: [run] noise_ampl)
    #[arg(long)]
    pub noise: Option<f64>,
    /// Continue the chain already stored in --out after verifying it
    #[arg(long)]
    pub resume: bool,
}

/// Tick source settings after flags and config are merged.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub manifest: Arc<Manifest>,
    pub period: Duration,
    pub out: PathBuf,
    pub max_ticks: u64,
    pub stress: f64,
    pub noise_ampl: f64,
    pub resume: bool,
}

#[derive(Debug)]
pub struct RunSummary {
    pub ticks: u64,
    pub path: PathBuf,
    pub head: Stamp,
}

impl RunPlan {
    /// Merge CLI overrides over the loaded config.
    pub fn new(config: &ClockkeConfig, args: &RunArgs) -> Result<Self> {
        let manifest = match args.tick_ms {
            Some(tick_ms) => {
                let mut raw = config.manifest.to_raw();
                raw.tick_ms = tick_ms;
                Manifest::new(raw).context("invalid --tick-ms")?
            }
            None => config.manifest.clone(),
        };
        let period = cadence(manifest.tick_ms())?;
        if !args.stress.is_finite() {
            bail!("--stress must be a finite number");
        }
        let noise_ampl = args.noise.unwrap_or(config.run.noise_ampl);
        if !noise_ampl.is_finite() || noise_ampl < 0.0 {
            bail!("--noise must be finite and >= 0 (got {noise_ampl})");
        }

        Ok(Self {
            manifest: Arc::new(manifest),
            period,
            out: args.out.clone().unwrap_or_else(default_out_path),
            max_ticks: args.ticks.unwrap_or(config.run.max_ticks),
            stress: args.stress,
            noise_ampl,
            resume: args.resume,
        })
    }
}

// Live cadence bounds, applied whichever source set tick_ms
const MIN_TICK_MS: f64 = 1.0;
const MAX_TICK_MS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

fn cadence(tick_ms: f64) -> Result<Duration> {
    if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&tick_ms) {
        bail!("tick_ms must lie in [{MIN_TICK_MS}, {MAX_TICK_MS}] for a live run (got {tick_ms})");
    }
    Duration::try_from_secs_f64(tick_ms / 1000.0)
        .with_context(|| format!("tick_ms {tick_ms} is not a usable timer period"))
}

/// `stamps_clockke_<YYYYmmdd_HHMMSSZ>.csv` in the working directory.
#[must_use]
pub fn default_out_path() -> PathBuf {
    PathBuf::from(format!(
        "stamps_clockke_{}.csv",
        UtcTimestamp::now().file_suffix()
    ))
}

/// Open the record log and the session that feeds it.
pub fn open_session(plan: &RunPlan) -> Result<(Session, RecordLog)> {
    if !plan.resume {
        let log = RecordLog::create(&plan.out).map_err(|err| match err {
            StoreError::NotEmpty { .. } => anyhow::Error::new(err).context(
                "refusing to start a new chain in a non-empty file; pass --resume to continue it",
            ),
            other => anyhow::Error::new(other),
        })?;
        return Ok((Session::new(Arc::clone(&plan.manifest)), log));
    }

    let session = resume_session(&plan.out, &plan.manifest)?;
    let log = RecordLog::append_to(&plan.out)?;
    Ok((session, log))
}

fn resume_session(path: &Path, manifest: &Arc<Manifest>) -> Result<Session> {
    if !path.exists() {
        info!(path = %path.display(), "nothing to resume; starting a new chain");
        return Ok(Session::new(Arc::clone(manifest)));
    }
    let rows = read_records(path)?;
    let report = verify(&rows, manifest);
    if !report.is_ok() {
        warn!(path = %path.display(), "refusing to resume an invalid chain");
        bail!(
            "cannot resume {}: stored chain does not verify\n{}",
            path.display(),
            report.render()
        );
    }
    Ok(match report.tail {
        Some(tail) => {
            info!(path = %path.display(), rows = report.rows, head = %tail.head.short(), "resuming chain");
            Session::resume(Arc::clone(manifest), &tail)
        }
        None => Session::new(Arc::clone(manifest)),
    })
}

fn noisy_stress(stress: f64, noise_ampl: f64) -> f64 {
    if noise_ampl == 0.0 {
        return stress;
    }
    stress + noise_ampl * (2.0 * rand::random::<f64>() - 1.0)
}

/// Run the tick loop until `max_ticks` (if non-zero) or Ctrl+C.
pub async fn run(plan: RunPlan) -> Result<RunSummary> {
    let (mut session, mut log) = open_session(&plan)?;
    let tick_ms = plan.manifest.tick_ms();

    info!(
        path = %log.path().display(),
        tick_ms,
        max_ticks = plan.max_ticks,
        "tick source started; Ctrl+C to stop"
    );

    let mut timer = tokio::time::interval(plan.period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut sparkline = Sparkline::default();
    let mut last: Option<UtcTimestamp> = None;
    let mut emitted = 0u64;

    while plan.max_ticks == 0 || emitted < plan.max_ticks {
        tokio::select! {
            _ = timer.tick() => {}
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }

        let now = UtcTimestamp::now();
        let dt_ms = match last {
            Some(previous) => (now.instant() - previous.instant()).num_milliseconds(),
            None => tick_ms.round() as i64,
        };
        let input = TickInput {
            dt_ms,
            time_utc: now,
            stress: noisy_stress(plan.stress, plan.noise_ampl),
            payload: Payload::Derived,
        };

        let record = match session.tick(input) {
            Ok(record) => record,
            Err(err) => {
                warn!("skipping tick: {err}");
                continue;
            }
        };
        log.append(&record)
            .with_context(|| format!("failed to append to {}", log.path().display()))?;

        last = Some(now);
        emitted += 1;
        sparkline.push(record.a_out);
        println!(
            "{}",
            tick_line(
                &record,
                JitterGrade::classify(record.dt_ms, tick_ms),
                &sparkline
            )
        );
    }

    let summary = RunSummary {
        ticks: emitted,
        path: log.path().to_path_buf(),
        head: session.head().clone(),
    };
    info!(
        ticks = summary.ticks,
        total = session.ticks(),
        path = %summary.path.display(),
        head = %summary.head.short(),
        "tick source stopped"
    );
    Ok(summary)
}
