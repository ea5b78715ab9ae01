// src/engine.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use neurostream::stream::{DataSource, Pipeline, PlotSeries, RenderTarget};
use neurostream::{CsvRecorder, PipelineConfig, PipelineStats};
/// Stand-in view for headless runs: counts frames and logs what a viewer
/// would show about once per second.
struct ConsoleView {
    series: Mutex<Option<Arc<PlotSeries>>>,
    frames: AtomicU64,
    frames_per_report: u64,
}
impl RenderTarget for ConsoleView {
    fn redraw(&self) {
        let frame = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if frame % self.frames_per_report != 0 {
            return;
        }
        let Some(series) = self.series.lock().clone() else {
            return;
        };
        let points = series.snapshot();
        if points.is_empty() {
            log::info!("frame {frame}: plot empty");
            return;
        }
        let (min, max) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let mean = points.iter().sum::<f64>() / points.len() as f64;
        log::info!(
            "frame {frame}: ch{} {} points, min {min:.2} mean {mean:.2} max {max:.2}",
            series.channel() + 1,
            points.len()
        );
    }
}
/// Runs the pipeline for a fixed time without a window, optionally recording
/// to CSV, and returns the final counters.
pub fn run_headless(
    config: PipelineConfig,
    source: Arc<dyn DataSource>,
    seconds: u64,
    record: Option<&str>,
) -> Result<PipelineStats> {
    let recorder = CsvRecorder::new(config.recording_dir.clone(), config.channels);
    let frames_per_report = (1000 / config.render_period_ms.max(1)).max(1);
    let view = Arc::new(ConsoleView {
        series: Mutex::new(None),
        frames: AtomicU64::new(0),
        frames_per_report,
    });
    let target: Arc<dyn RenderTarget> = view.clone();
    let mut pipeline = Pipeline::new(config, source, Box::new(recorder), Arc::downgrade(&target))
        .context("building pipeline")?;
    *view.series.lock() = Some(pipeline.plot_series());
    pipeline.start().context("starting pipeline")?;
    if let Some(label) = record {
        pipeline
            .start_recording(label)
            .with_context(|| format!("starting recording `{label}`"))?;
    }
    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline {
        thread::sleep(Duration::from_millis(100));
    }
    if record.is_some() {
        pipeline.stop_recording().context("finalizing recording")?;
    }
    pipeline.stop().context("stopping pipeline")?;
    Ok(pipeline.stats())
}
