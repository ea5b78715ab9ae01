// src/main.rs
mod engine;
mod gui;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use eframe::egui;
use neurostream::stream::{DataSource, Pipeline, RenderTarget, SimulatedSource, SimulationConfig};
use neurostream::{CsvRecorder, DeviceProfile, PipelineConfig};
#[derive(Parser, Debug)]
#[command(name = "neurostream", version, about = "Live EEG stream viewer and recorder")]
struct Cli {
    /// JSON pipeline configuration; overrides --profile
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Headset generation to assume when no config file is given
    #[arg(long, value_enum, global = true, default_value_t = Profile::Classic)]
    profile: Profile,
    /// More log output (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Command>,
}
#[derive(Subcommand, Debug)]
enum Command {
    /// Open the live plot window (default)
    View,
    /// Stream from the simulated headset without a window
    Headless {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        /// Record raw samples under this label
        #[arg(long)]
        record: Option<String>,
    },
}
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Profile {
    Classic,
    LowEnergy,
}
impl From<Profile> for DeviceProfile {
    fn from(value: Profile) -> Self {
        match value {
            Profile::Classic => DeviceProfile::Classic,
            Profile::LowEnergy => DeviceProfile::LowEnergy,
        }
    }
}
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::for_profile(cli.profile.into()),
    };
    config.validate().context("validating config")?;
    Ok(config)
}
fn simulated_source(config: &PipelineConfig) -> Result<Arc<SimulatedSource>> {
    let source = SimulatedSource::spawn(SimulationConfig::new(config.channels, config.sample_rate_hz))
        .context("starting simulated headset")?;
    Ok(Arc::new(source))
}
fn run_viewer(config: PipelineConfig) -> Result<()> {
    let source = simulated_source(&config)?;
    let target = Arc::new(gui::EguiRenderTarget::default());
    let repaint: Arc<dyn RenderTarget> = target.clone();
    let recorder = CsvRecorder::new(config.recording_dir.clone(), config.channels);
    let source: Arc<dyn DataSource> = source;
    let mut pipeline = Pipeline::new(
        config,
        source,
        Box::new(recorder),
        Arc::downgrade(&repaint),
    )
    .context("building pipeline")?;
    pipeline.on_visible().context("starting pipeline")?;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 600.0])
            .with_title("neurostream"),
        ..Default::default()
    };
    eframe::run_native(
        "neurostream",
        options,
        Box::new(move |cc| {
            target.attach(&cc.egui_ctx);
            Box::new(gui::ViewerApp::new(pipeline, target))
        }),
    )
    .map_err(|err| anyhow!("viewer failed: {err}"))
}
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(&cli)?;
    log::info!(
        "{} channels at {} Hz, ring {} rows, plot {} points",
        config.channels,
        config.sample_rate_hz,
        config.buffer_capacity,
        config.plot_length
    );
    match cli.command.unwrap_or(Command::View) {
        Command::View => run_viewer(config),
        Command::Headless { seconds, record } => {
            let source = simulated_source(&config)?;
            let stats = engine::run_headless(config, source, seconds, record.as_deref())?;
            println!(
                "{} rows written, {} overwritten unread, {} rejected, {} drain cycles, {} frames",
                stats.total_writes,
                stats.overflow,
                stats.rejected_packets,
                stats.drain_cycles,
                stats.render_ticks
            );
            Ok(())
        }
    }
}
