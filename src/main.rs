use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use bow_trigger::{
    actuator::{DryRunActuator, InputActuator},
    config::AppConfig,
    logging::{self, Logger},
    port_detect,
    render::{GaugeLayout, NullSink, RenderSink, TerminalGauge},
    replay,
    runtime::{RunLoop, Shutdown},
    serial::SerialSampleSource,
    source::{LineSource, SampleSource},
    store::SampleLog,
    trigger::{TriggerConfig, TriggerEngine},
};

#[derive(Debug, Parser)]
#[command(name = "bow-trigger")]
#[command(about = "Fires a synthetic mouse button from a bow draw-force sensor")]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Read the sensor and drive the button until interrupted.
    Run(RunArgs),
    /// List candidate serial ports.
    Ports,
    /// Feed a recorded `ms,v0,v1,v2` trace through the trigger engine.
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
struct TriggerArgs {
    #[arg(long)]
    threshold: Option<f64>,
    #[arg(long = "debounce-ms")]
    debounce_ms: Option<u64>,
    #[arg(long = "pulled-back-ratio")]
    pulled_back_ratio: Option<f64>,
    /// Disable the pulled-back display state.
    #[arg(long = "no-pulled-back")]
    no_pulled_back: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud: Option<u32>,
    /// Read samples from stdin instead of a serial port.
    #[arg(long, conflicts_with_all = ["port", "baud"])]
    stdin: bool,
    #[command(flatten)]
    trigger: TriggerArgs,
    #[arg(long = "frame-rate")]
    frame_rate: Option<u32>,
    /// Log decisions instead of injecting mouse input.
    #[arg(long = "dry-run")]
    dry_run: bool,
    #[arg(long = "no-csv")]
    no_csv: bool,
    #[arg(long = "no-gauge")]
    no_gauge: bool,
}

#[derive(Debug, Args)]
struct ReplayArgs {
    trace: PathBuf,
    /// Fail unless the action sequence matches this file.
    #[arg(long)]
    expect: Option<PathBuf>,
    #[command(flatten)]
    trigger: TriggerArgs,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_env().context("invalid environment override")?;
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }

    match cli.command {
        Commands::Run(args) => {
            apply_run_args(&mut config, &args);
            config.validate().context("invalid configuration")?;
            init_logging(&config, config.display.enabled)?;
            run_pipeline(&config, &args)
        }
        Commands::Ports => {
            init_logging(&config, false)?;
            list_ports(&config);
            Ok(())
        }
        Commands::Replay(args) => {
            apply_trigger_args(&mut config, &args.trigger);
            config.validate().context("invalid configuration")?;
            init_logging(&config, false)?;
            run_replay(config.trigger_config()?, &args)
        }
    }
}

fn apply_trigger_args(config: &mut AppConfig, args: &TriggerArgs) {
    if let Some(threshold) = args.threshold {
        config.trigger.threshold = threshold;
    }
    if let Some(debounce_ms) = args.debounce_ms {
        config.trigger.debounce_ms = debounce_ms;
    }
    if let Some(ratio) = args.pulled_back_ratio {
        config.trigger.pulled_back = true;
        config.trigger.pulled_back_ratio = ratio;
    }
    if args.no_pulled_back {
        config.trigger.pulled_back = false;
    }
}

fn apply_run_args(config: &mut AppConfig, args: &RunArgs) {
    apply_trigger_args(config, &args.trigger);
    if let Some(port) = &args.port {
        config.serial.port = Some(port.clone());
    }
    if let Some(baud) = args.baud {
        config.serial.baud = baud;
    }
    if let Some(frame_rate) = args.frame_rate {
        config.display.frame_rate = frame_rate;
    }
    if args.no_csv {
        config.log.samples_csv = None;
    }
    if args.no_gauge {
        config.display.enabled = false;
    }
}

fn init_logging(config: &AppConfig, gauge_active: bool) -> Result<()> {
    let level = logging::parse_level(&config.log.level).map_err(|msg| anyhow!(msg))?;
    let json_path = config.log.json_path.as_deref();
    let logger = Logger::new(level, json_path).with_context(|| {
        format!("failed to open JSON log {:?}", json_path.unwrap_or(Path::new("")))
    })?;
    logger
        .with_gauge_spacing(gauge_active)
        .install().context("logger already installed")?;
    Ok(())
}

fn require_port(config: &AppConfig) -> Result<String> {
    if let Some(port) = config.serial.port.as_deref().map(str::trim) {
        if !port.is_empty() {
            return Ok(port.to_string());
        }
    }

    let candidates = port_detect::list_candidates();
    for line in port_detect::describe_candidates(&candidates) {
        log::info!("serial: {line}");
    }
    if let Some(port) = port_detect::detect_port(config.serial.port_hint.as_deref()) {
        log::info!("serial: autodetected {port}");
        return Ok(port);
    }

    let mut message = String::from(
        "no serial port configured and autodetection was not conclusive. \
         Pass --port or set BOW_TRIGGER_PORT.",
    );
    if !candidates.is_empty() {
        message.push_str(" Candidates:\n");
        for candidate in candidates {
            message.push_str("  - ");
            message.push_str(&candidate);
            message.push('\n');
        }
    }
    Err(anyhow!(message))
}

fn open_source(config: &AppConfig, args: &RunArgs) -> Result<Box<dyn SampleSource>> {
    if args.stdin {
        log::info!("source: reading samples from stdin");
        return Ok(Box::new(LineSource::new(io::stdin().lock())));
    }
    let port = require_port(config)?;
    let source = SerialSampleSource::open(&config.serial_settings(port))
        .context("failed to attach to the sensor")?;
    Ok(Box::new(source))
}

fn open_actuator(dry_run: bool) -> Result<Box<dyn InputActuator>> {
    if dry_run {
        return Ok(Box::new(DryRunActuator));
    }

    #[cfg(feature = "mouse")]
    {
        let mouse = bow_trigger::actuator::MouseActuator::new()
            .context("failed to open the mouse input backend")?;
        Ok(Box::new(mouse))
    }

    #[cfg(not(feature = "mouse"))]
    {
        bail!("built without the `mouse` feature; pass --dry-run or rebuild with --features mouse")
    }
}

fn open_sink(config: &AppConfig, trigger: &TriggerConfig) -> Box<dyn RenderSink> {
    if !config.display.enabled {
        return Box::new(NullSink);
    }
    let layout = GaugeLayout {
        width: config.display.gauge_width,
        threshold: trigger.threshold(),
        pulled_back_level: trigger.pulled_back_level(),
    };
    Box::new(TerminalGauge::new(io::stdout(), layout))
}

fn open_sample_log(path: &Path) -> Result<SampleLog> {
    SampleLog::create(path)
        .with_context(|| format!("failed to create sample log {}", path.display()))
}

fn run_pipeline(config: &AppConfig, args: &RunArgs) -> Result<()> {
    let trigger = config.trigger_config()?;
    log::info!(
        "trigger: threshold={} pulled_back={:?} debounce={}ms",
        trigger.threshold(),
        trigger.pulled_back_level(),
        trigger.debounce_ms()
    );

    let actuator = open_actuator(args.dry_run)?;
    let source = open_source(config, args)?;
    let sink = open_sink(config, &trigger);

    let shutdown = Shutdown::new();
    shutdown
        .install_signal_handler()
        .context("failed to install Ctrl-C handler")?;

    let mut run_loop = RunLoop::new(TriggerEngine::new(trigger), source, actuator, sink)
        .with_frame_period(config.frame_period())
        .with_shutdown(shutdown);
    if let Some(path) = &config.log.samples_csv {
        run_loop = run_loop.with_sample_log(open_sample_log(path)?);
    }

    let report = run_loop.run();
    log::info!(
        "run: reason={} samples={} short={} malformed={} transport_errors={} frames={}",
        report.reason,
        report.samples,
        report.short_samples,
        report.malformed,
        report.transport_errors,
        report.frames
    );
    if report.reason.is_failure() {
        bail!("stopped: {}", report.reason);
    }
    Ok(())
}

fn list_ports(config: &AppConfig) {
    let candidates = port_detect::list_candidates();
    if candidates.is_empty() {
        println!("no serial ports found");
        return;
    }
    for line in port_detect::describe_candidates(&candidates) {
        println!("{line}");
    }
    if let Some(port) = port_detect::detect_port(config.serial.port_hint.as_deref()) {
        println!("selected: {port}");
    }
}

fn run_replay(trigger: TriggerConfig, args: &ReplayArgs) -> Result<()> {
    let trace = replay::load_trace(&args.trace)
        .with_context(|| format!("invalid trace {}", args.trace.display()))?;
    let events = replay::replay(trigger, &trace);

    println!("{}", replay::EVENT_HEADER);
    for event in &events {
        println!("{}", replay::format_event(event));
    }

    if let Some(expect_path) = &args.expect {
        let raw = std::fs::read_to_string(expect_path)
            .with_context(|| format!("failed to read {}", expect_path.display()))?;
        let expected = replay::parse_expected_actions(&raw);
        let actual: Vec<&str> = events.iter().map(|e| e.action.label()).collect();
        if actual != expected {
            eprintln!("expected actions: {}", expected.join(","));
            eprintln!("actual actions:   {}", actual.join(","));
            bail!("action sequence mismatch");
        }
    }
    Ok(())
}
