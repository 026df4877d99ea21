//! simclick command-line frontend.

use clap::{Parser, Subcommand};
use simclick_core::{
    load_config, load_config_from, play_macro, reports_dir, save_config, save_macro, AppConfig,
    CancelToken, IntervalRange, MacroRecorder, MouseButton, Point, PositionMode, RemoteController,
    RemoteServer, Scheduler, SchedulerError, SchedulerState, StorageError,
};
use simclick_platform::{
    watch_clicks, watch_emergency_key, EnigoCursor, EnigoInjector, ScreenSensors,
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// How long Escape must be held to force-stop everything.
const EMERGENCY_HOLD: Duration = Duration::from_secs(3);

/// Poll interval while waiting for a run to finish.
const RUN_POLL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[clap(name = "simclick", version, about = "Pointer action scheduler")]
struct Cli {
    /// Settings file to use instead of the per-user default.
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduling loop until it stops or is interrupted.
    Run {
        /// Mouse button to act with.
        #[clap(short, long)]
        button: Option<MouseButton>,

        /// Fixed inter-action interval in milliseconds.
        #[clap(short, long)]
        interval_ms: Option<u64>,

        /// Random interval range as "min,max" milliseconds.
        #[clap(long)]
        random_interval: Option<String>,

        /// Stop after this many actions.
        #[clap(short, long)]
        limit: Option<u64>,

        /// Act at this fixed screen position instead of the live cursor.
        #[clap(long, num_args = 2, value_names = ["X", "Y"])]
        at: Option<Vec<i32>>,

        /// Jitter radius in pixels around each target.
        #[clap(long)]
        jitter: Option<i32>,

        /// Run a finite test loop of this many iterations.
        #[clap(long)]
        test_loop: Option<u32>,

        /// Write a completion report when the test loop finishes.
        #[clap(long)]
        report: bool,
    },
    /// Perform one immediate click at the given coordinates.
    Click {
        #[clap(short, long, default_value = "left")]
        button: MouseButton,
        x: i32,
        y: i32,
    },
    /// Record pointer movement and clicks until Enter is pressed.
    Record {
        /// File the recorded macro is written to.
        output: PathBuf,
    },
    /// Replay a recorded macro.
    Play {
        /// Macro file to replay.
        input: PathBuf,

        /// Repeat the whole macro this many times.
        #[clap(short, long, default_value_t = 1)]
        loops: u32,
    },
    /// Serve the remote control protocol and run on command.
    Serve {
        /// Override the configured listen port.
        #[clap(short, long)]
        port: Option<u16>,
    },
    /// Write a default settings file and print its path.
    Init,
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simclick=info".into()),
        )
        .try_init();
}

fn load_app_config(path: &Option<PathBuf>) -> AppConfig {
    let result = match path {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    match result {
        Ok(config) => config,
        Err(StorageError::NotFound(path)) => {
            info!(%path, "no settings file, using defaults");
            AppConfig::default()
        }
        Err(e) => {
            warn!(error = %e, "failed to load settings, using defaults");
            AppConfig::default()
        }
    }
}

fn build_scheduler() -> Result<Arc<Scheduler>, Box<dyn Error>> {
    let executor = Arc::new(EnigoInjector::new()?);
    let cursor = Arc::new(EnigoCursor::new()?);
    let sensors = Arc::new(ScreenSensors::new());
    Ok(Arc::new(
        Scheduler::new(executor, cursor, sensors).with_report_dir(reports_dir()),
    ))
}

/// Drives the scheduler on behalf of remote clients, always from the
/// last-loaded settings snapshot.
struct CliController {
    scheduler: Arc<Scheduler>,
    config: AppConfig,
}

impl RemoteController for CliController {
    fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler
            .start(self.config.session.clone(), self.config.triggers.clone())
    }

    fn stop(&self) {
        self.scheduler.stop();
    }

    fn click(&self, button: MouseButton, x: i32, y: i32) -> Result<(), SchedulerError> {
        self.scheduler.click_once(button, x, y)
    }
}

fn parse_interval_range(s: &str) -> Result<IntervalRange, Box<dyn Error>> {
    let (min, max) = s
        .split_once(',')
        .ok_or("random interval must be \"min,max\"")?;
    let min_ms: u64 = min.trim().parse()?;
    let max_ms: u64 = max.trim().parse()?;
    if min_ms > max_ms {
        return Err("random interval min exceeds max".into());
    }
    Ok(IntervalRange { min_ms, max_ms })
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    mut config: AppConfig,
    button: Option<MouseButton>,
    interval_ms: Option<u64>,
    random_interval: Option<String>,
    limit: Option<u64>,
    at: Option<Vec<i32>>,
    jitter: Option<i32>,
    test_loop: Option<u32>,
    report: bool,
) -> Result<(), Box<dyn Error>> {
    if let Some(button) = button {
        config.session.button = button;
    }
    if let Some(ms) = interval_ms {
        config.session.interval_ms = ms;
    }
    if let Some(range) = random_interval {
        config.session.random_interval = Some(parse_interval_range(&range)?);
    }
    if let Some(limit) = limit {
        config.session.click_limit = Some(limit);
    }
    if let Some(at) = at {
        config.session.position_mode = PositionMode::Fixed;
        config.session.fixed = Point::new(at[0], at[1]);
    }
    if let Some(radius) = jitter {
        config.session.jitter_radius = Some(radius);
    }
    if let Some(count) = test_loop {
        config.session.test_loop = Some(count);
    }
    if report {
        config.session.generate_report = true;
    }

    let scheduler = build_scheduler()?;
    let stopper = scheduler.clone();
    let _guard = watch_emergency_key(EMERGENCY_HOLD, move || stopper.emergency_stop());

    scheduler.start(config.session, config.triggers)?;
    while scheduler.state() != SchedulerState::Idle {
        thread::sleep(RUN_POLL);
    }
    scheduler.stop();

    if scheduler.emergency_stopped() {
        warn!(clicks = scheduler.click_count(), "run was emergency-stopped");
    } else {
        info!(clicks = scheduler.click_count(), "run finished");
    }
    Ok(())
}

fn cmd_click(button: MouseButton, x: i32, y: i32) -> Result<(), Box<dyn Error>> {
    let scheduler = build_scheduler()?;
    scheduler.click_once(button, x, y)?;
    Ok(())
}

fn cmd_record(output: PathBuf) -> Result<(), Box<dyn Error>> {
    let cursor = Arc::new(EnigoCursor::new()?);
    let recorder = Arc::new(Mutex::new(MacroRecorder::start(cursor)));

    let sink = recorder.clone();
    let hook = watch_clicks(move |button| sink.lock().unwrap().push_click(button));

    println!("Recording. Press Enter to stop.");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    hook.stop();
    let actions = recorder.lock().unwrap().stop();
    if actions.is_empty() {
        return Err("nothing was recorded".into());
    }
    save_macro(&output, &actions)?;
    println!("Saved {} actions to {}", actions.len(), output.display());
    Ok(())
}

fn cmd_play(input: PathBuf, loops: u32) -> Result<(), Box<dyn Error>> {
    let actions = simclick_core::load_macro(&input)?;
    let executor = EnigoInjector::new()?;
    let token = Arc::new(CancelToken::new());
    token.arm();

    let stopper = token.clone();
    let _guard = watch_emergency_key(EMERGENCY_HOLD, move || stopper.trip_emergency());

    for pass in 1..=loops {
        if token.is_cancelled() {
            break;
        }
        let played = play_macro(&actions, &executor, &token);
        info!(pass, played, total = actions.len(), "macro pass complete");
    }
    Ok(())
}

fn cmd_serve(config: AppConfig, port: Option<u16>) -> Result<(), Box<dyn Error>> {
    let mut remote = config.remote.clone();
    if let Some(port) = port {
        remote.port = port;
        remote.enabled = true;
    }
    if !remote.enabled {
        return Err("remote control is disabled in the settings file".into());
    }
    if remote.password.is_empty() {
        return Err("remote control requires a non-empty password".into());
    }

    let scheduler = build_scheduler()?;
    let stopper = scheduler.clone();
    let _guard = watch_emergency_key(EMERGENCY_HOLD, move || stopper.emergency_stop());

    let controller = Arc::new(CliController {
        scheduler,
        config,
    });
    let handle = RemoteServer::listen(&remote, controller)?;
    println!("Listening on port {}. Press Enter to shut down.", handle.port());

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    handle.shutdown();
    Ok(())
}

fn cmd_init() -> Result<(), Box<dyn Error>> {
    let path = save_config(&AppConfig::default())?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();
    let config = load_app_config(&cli.config);

    match cli.command {
        Command::Run {
            button,
            interval_ms,
            random_interval,
            limit,
            at,
            jitter,
            test_loop,
            report,
        } => cmd_run(
            config,
            button,
            interval_ms,
            random_interval,
            limit,
            at,
            jitter,
            test_loop,
            report,
        ),
        Command::Click { button, x, y } => cmd_click(button, x, y),
        Command::Record { output } => cmd_record(output),
        Command::Play { input, loops } => cmd_play(input, loops),
        Command::Serve { port } => cmd_serve(config, port),
        Command::Init => cmd_init(),
    }
}
