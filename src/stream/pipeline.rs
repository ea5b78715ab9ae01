use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use parking_lot::Mutex;
use crate::config::PipelineConfig;
use crate::recorder::{Recorder, RecordingSession};
use crate::stream::buffer::SampleBuffer;
use crate::stream::feed::{FeedHandle, PlotFeed};
use crate::stream::filter::StreamFilter;
use crate::stream::plot::PlotSeries;
use crate::stream::render::{RenderLoop, RenderTarget};
use crate::stream::source::{DataSource, EegListener, PacketListener};
use crate::stream::worker::LoopHandle;
use crate::stream::PipelineError;
use crate::types::{PacketKind, PipelineState, PipelineStats};
/// Owns one viewing session: the listener on the data source, the sample
/// buffer it fills, and the drain and render loops.
///
/// Starting and stopping follow the view: `on_visible` starts both loops and
/// registers the listener, `on_hidden` unregisters it and joins both loops.
/// Dropping the pipeline stops it and finalizes any recording.
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn DataSource>,
    target: Weak<dyn RenderTarget>,
    buffer: Arc<SampleBuffer>,
    series: Arc<PlotSeries>,
    recording: Arc<Mutex<RecordingSession>>,
    rejected: Arc<AtomicU64>,
    cycles: Arc<AtomicU64>,
    ticks: Arc<AtomicU64>,
    state: PipelineState,
    listener: Option<Arc<dyn PacketListener>>,
    feed: Option<FeedHandle>,
    render: Option<LoopHandle<()>>,
}
impl Pipeline {
    /// Validates the configuration and builds the filter chain once so a bad
    /// filter setup fails here rather than on the drain thread.
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn DataSource>,
        recorder: Box<dyn Recorder>,
        target: Weak<dyn RenderTarget>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        StreamFilter::from_config(config.channels, config.sample_rate_hz, &config.filters)?;
        let buffer = Arc::new(SampleBuffer::new(config.buffer_capacity, config.channels)?);
        let series = Arc::new(PlotSeries::new(
            config.plot_length,
            config.channels,
            config.channel_of_interest,
        )?);
        Ok(Self {
            config,
            source,
            target,
            buffer,
            series,
            recording: Arc::new(Mutex::new(RecordingSession::new(recorder))),
            rejected: Arc::new(AtomicU64::new(0)),
            cycles: Arc::new(AtomicU64::new(0)),
            ticks: Arc::new(AtomicU64::new(0)),
            state: PipelineState::Stopped,
            listener: None,
            feed: None,
            render: None,
        })
    }
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
    pub fn state(&self) -> PipelineState {
        self.state
    }
    pub fn buffer(&self) -> Arc<SampleBuffer> {
        Arc::clone(&self.buffer)
    }
    pub fn plot_series(&self) -> Arc<PlotSeries> {
        Arc::clone(&self.series)
    }
    /// Starts both loops and subscribes to EEG packets. A no-op when running.
    ///
    /// Each start gets a fresh filter state; rows left unread from before the
    /// last stop are discarded.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.state == PipelineState::Running {
            log::debug!("pipeline already running");
            return Ok(());
        }
        let filter = StreamFilter::from_config(
            self.config.channels,
            self.config.sample_rate_hz,
            &self.config.filters,
        )?;
        self.buffer.reset_points_since_read();
        let feed = PlotFeed::new(
            Arc::clone(&self.buffer),
            filter,
            Arc::clone(&self.series),
            Arc::clone(&self.recording),
            self.config.drain_threshold,
        )
        .with_cycle_counter(Arc::clone(&self.cycles))
        .spawn(self.config.poll_interval())?;
        let render = RenderLoop::new(self.target.clone(), self.config.render_period())
            .with_tick_counter(Arc::clone(&self.ticks))
            .spawn();
        let render = match render {
            Ok(render) => render,
            Err(err) => {
                if let Err(feed_err) = feed.stop().and_then(|finished| finished) {
                    log::error!("plot feed shut down badly after render spawn failure: {feed_err}");
                }
                return Err(err);
            }
        };
        let listener: Arc<dyn PacketListener> = Arc::new(EegListener::new(
            Arc::clone(&self.buffer),
            Arc::clone(&self.rejected),
        ));
        self.source
            .register_listener(Arc::clone(&listener), PacketKind::Eeg);
        self.listener = Some(listener);
        self.feed = Some(feed);
        self.render = Some(render);
        self.state = PipelineState::Running;
        log::info!(
            "pipeline running: {} channels at {} Hz, plotting channel {}",
            self.config.channels,
            self.config.sample_rate_hz,
            self.series.channel()
        );
        Ok(())
    }
    /// Unsubscribes, then stops and joins both loops. A no-op when stopped.
    ///
    /// Returns the first failure among: finalizing an open recording, or a
    /// loop thread that panicked.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        if self.state == PipelineState::Stopped {
            return Ok(());
        }
        if let Some(listener) = self.listener.take() {
            self.source.unregister_listener(&listener, PacketKind::Eeg);
        }
        let mut outcome = Ok(());
        if let Some(feed) = self.feed.take() {
            outcome = feed.stop().and_then(|finished| finished);
        }
        if let Some(render) = self.render.take() {
            let rendered = render.stop();
            if outcome.is_ok() {
                outcome = rendered;
            }
        }
        self.state = PipelineState::Stopped;
        log::info!(
            "pipeline stopped after {} drain cycles",
            self.cycles.load(Ordering::Relaxed)
        );
        outcome
    }
    pub fn on_visible(&mut self) -> Result<(), PipelineError> {
        self.start()
    }
    pub fn on_hidden(&mut self) -> Result<(), PipelineError> {
        self.stop()
    }
    pub fn channel_of_interest(&self) -> usize {
        self.series.channel()
    }
    /// Switches the plotted channel; the series is cleared in the same step.
    pub fn set_channel_of_interest(&self, channel: usize) -> Result<(), PipelineError> {
        self.series.set_channel(channel)?;
        log::info!("plotting channel {channel}");
        Ok(())
    }
    pub fn start_recording(&self, label: &str) -> Result<(), PipelineError> {
        self.recording.lock().start(label)
    }
    /// Finalizes the current recording. Stopping when nothing is being
    /// recorded is not an error.
    ///
    /// While the drain loop runs, it is asked to finish the session so that
    /// rows already buffered but below the drain threshold are recorded
    /// first. This call waits for that hand-off.
    pub fn stop_recording(&self) -> Result<(), PipelineError> {
        if !self.feed_alive() {
            if !self.recording.lock().finish()? {
                log::debug!("stop_recording with no active recording");
            }
            return Ok(());
        }
        if !self.recording.lock().request_stop() {
            log::debug!("stop_recording with no active recording");
            return Ok(());
        }
        let pause = self.config.poll_interval().max(Duration::from_millis(1));
        loop {
            {
                let mut recording = self.recording.lock();
                if let Some(outcome) = recording.take_stop_outcome() {
                    return outcome.map(|_| ());
                }
                if !self.feed_alive() {
                    log::warn!("plot feed exited before finishing the recording");
                    return recording.finish().map(|_| ());
                }
            }
            thread::sleep(pause);
        }
    }
    fn feed_alive(&self) -> bool {
        self.feed.as_ref().map_or(false, |feed| !feed.is_finished())
    }
    pub fn is_recording(&self) -> bool {
        self.recording.lock().is_active()
    }
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            state: self.state,
            total_writes: self.buffer.total_writes(),
            overflow: self.buffer.overflow_count(),
            rejected_packets: self.rejected.load(Ordering::Relaxed),
            drain_cycles: self.cycles.load(Ordering::Relaxed),
            render_ticks: self.ticks.load(Ordering::Relaxed),
            plot_len: self.series.len(),
            recording: self.is_recording(),
        }
    }
}
impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("pipeline teardown: {err}");
        }
        if let Err(err) = self.recording.lock().finish() {
            log::error!("finalizing recording on teardown: {err}");
        }
    }
}
