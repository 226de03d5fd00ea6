use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
#[cfg(feature = "ble")]
use drum_light_core::BleActuator;
use drum_light_core::{
    Actuator, AppConfig, DrumMapping, DryRunActuator, MidiTrigger, Percent, Pipeline,
};
use tracing_subscriber::EnvFilter;

fn main() -> drum_light_core::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Run(args) => runtime.block_on(run_sync(args)),
        Commands::Listen { midi_port } => runtime.block_on(run_listen(midi_port.as_deref())),
        Commands::Ports => list_ports(),
        Commands::Lights { dry_run } => runtime.block_on(list_lights(dry_run)),
    }
}

async fn run_sync(args: RunArgs) -> drum_light_core::Result<()> {
    let config = args.resolve_config()?;
    tracing::info!(
        flash_ms = config.timing.flash_duration().as_millis() as u64,
        max_event_age_ms = config.timing.max_event_age().as_millis() as u64,
        velocity_to_brightness = config.brightness.velocity_to_brightness,
        "starting drum light sync"
    );

    let mut trigger = MidiTrigger::connect(args.midi_port.as_deref())?;
    let pipeline = Pipeline::new(config, light(args.dry_run)?)?;
    pipeline.connect_actuator(args.led_address.as_deref()).await?;

    trigger.start_listening(pipeline.producer())?;
    tracing::info!(port = trigger.port_name(), "sync active, press Ctrl+C to stop");

    pipeline.run_until(shutdown_signal()).await;
    trigger.stop_listening();
    Ok(())
}

async fn run_listen(midi_port: Option<&str>) -> drum_light_core::Result<()> {
    let mut trigger = MidiTrigger::connect(midi_port)?;
    let mapping = DrumMapping::default();

    trigger.start_listening(move |note, velocity| {
        tracing::info!(note, velocity, drum = %mapping.classify(note), "hit");
    })?;
    tracing::info!(port = trigger.port_name(), "listening, press Ctrl+C to stop");

    shutdown_signal().await;
    trigger.stop_listening();
    Ok(())
}

fn list_ports() -> drum_light_core::Result<()> {
    for (index, (name, kind)) in MidiTrigger::list_ports()?.iter().enumerate() {
        println!("{:>3}. {name} ({kind})", index + 1);
    }
    Ok(())
}

async fn list_lights(dry_run: bool) -> drum_light_core::Result<()> {
    for device in light(dry_run)?.scan().await? {
        println!("{}  {}", device.address, device.name);
    }
    Ok(())
}

#[cfg(feature = "ble")]
fn light(dry_run: bool) -> drum_light_core::Result<Arc<dyn Actuator>> {
    if dry_run {
        return Ok(Arc::new(DryRunActuator::new()));
    }
    Ok(Arc::new(BleActuator::bluetooth(
        drum_light_core::actuator::ble::DEFAULT_SCAN_DURATION,
    )))
}

#[cfg(not(feature = "ble"))]
fn light(dry_run: bool) -> drum_light_core::Result<Arc<dyn Actuator>> {
    if dry_run {
        return Ok(Arc::new(DryRunActuator::new()));
    }
    Err(drum_light_core::DrumLightError::msg(
        "built without Bluetooth support; rebuild with `--features ble` or pass --dry-run",
    ))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("stopping"),
        Err(err) => tracing::error!(%err, "failed to listen for Ctrl+C, stopping"),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Flash a light in time with live drum hits", long_about = None)]
struct Cli {
    /// Log every hit, eviction and stale discard.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the light from a MIDI drum input.
    Run(RunArgs),
    /// Print classified hits from a MIDI input without touching the light.
    Listen {
        /// MIDI input port name. Auto-selected when omitted.
        #[arg(long)]
        midi_port: Option<String>,
    },
    /// List MIDI input ports.
    Ports,
    /// Scan for LEDDMX lights.
    Lights {
        /// Report the logging stand-in instead of scanning the radio.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON configuration file. Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// MIDI input port name. Auto-selected when omitted.
    #[arg(long)]
    midi_port: Option<String>,
    /// Light address. The first device found is used when omitted.
    #[arg(long)]
    led_address: Option<String>,
    /// Log LEDDMX frames instead of writing them over Bluetooth.
    #[arg(long)]
    dry_run: bool,
    /// Seconds the flash holds before fading back.
    #[arg(long)]
    flash_duration: Option<f64>,
    /// Hits older than this many seconds are dropped.
    #[arg(long)]
    max_event_age: Option<f64>,
    /// Always flash at full brightness, ignoring velocity.
    #[arg(long)]
    no_velocity: bool,
    /// Resting brightness in percent.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    baseline_brightness: Option<u8>,
}

impl RunArgs {
    fn resolve_config(&self) -> drum_light_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(seconds) = self.flash_duration {
            config.timing.flash_duration_seconds = seconds;
        }
        if let Some(seconds) = self.max_event_age {
            config.timing.max_event_age_seconds = seconds;
        }
        if self.no_velocity {
            config.brightness.velocity_to_brightness = false;
        }
        if let Some(brightness) = self.baseline_brightness {
            config.baseline.brightness = Percent::saturating(brightness);
        }
        config.validate()?;
        Ok(config)
    }
}
