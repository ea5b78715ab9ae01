use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use parking_lot::Mutex;
use crate::recorder::RecordingSession;
use crate::stream::buffer::SampleBuffer;
use crate::stream::filter::StreamFilter;
use crate::stream::plot::PlotSeries;
use crate::stream::worker::LoopHandle;
use crate::stream::PipelineError;
pub type FeedHandle = LoopHandle<Result<(), PipelineError>>;
/// Drains the sample buffer into the filter, the plot series and the
/// recorder.
///
/// Each cycle takes every unread row. All rows go through the filter so its
/// state sees the full-rate stream and all raw rows go to an active
/// recording, but only the newest filtered row reaches the plot. That is the
/// whole downsampling step: one plotted point per cycle.
pub struct PlotFeed {
    buffer: Arc<SampleBuffer>,
    filter: StreamFilter,
    series: Arc<PlotSeries>,
    recording: Arc<Mutex<RecordingSession>>,
    threshold: usize,
    cycles: Arc<AtomicU64>,
}
impl PlotFeed {
    pub fn new(
        buffer: Arc<SampleBuffer>,
        filter: StreamFilter,
        series: Arc<PlotSeries>,
        recording: Arc<Mutex<RecordingSession>>,
        threshold: usize,
    ) -> Self {
        Self {
            buffer,
            filter,
            series,
            recording,
            threshold: threshold.max(1),
            cycles: Arc::new(AtomicU64::new(0)),
        }
    }
    /// Shares an existing cycle counter so it survives feed restarts.
    pub fn with_cycle_counter(mut self, cycles: Arc<AtomicU64>) -> Self {
        self.cycles = cycles;
        self
    }
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
    /// Runs one drain cycle if enough rows are waiting. Returns whether it ran.
    pub fn run_cycle(&mut self) -> bool {
        self.drain(self.threshold)
    }
    /// Drains every unread row regardless of the threshold, so nothing is
    /// left behind when a recording ends or the feed stops.
    pub fn flush(&mut self) -> bool {
        self.drain(1)
    }
    /// Hands a pending stop request from the control side its outcome, after
    /// the rows that were already buffered have been recorded.
    fn serve_stop_request(&mut self) -> bool {
        if !self.recording.lock().stop_requested() {
            return false;
        }
        self.flush();
        self.recording.lock().complete_stop();
        true
    }
    fn drain(&mut self, min_rows: usize) -> bool {
        if self.buffer.points_since_read() < min_rows {
            return false;
        }
        let rows = self.buffer.take_unread();
        if rows.nrows() == 0 {
            return false;
        }
        let mut newest: Option<Vec<f64>> = None;
        let mut recording = self.recording.lock();
        for row in rows.outer_iter() {
            let raw = row.to_vec();
            match self.filter.process(&raw) {
                Ok(filtered) => newest = Some(filtered.to_vec()),
                Err(err) => log::warn!("skipping row the filter cannot take: {err}"),
            }
            recording.append(&raw);
        }
        drop(recording);
        if let Some(row) = newest {
            self.series.push_row(&row);
        }
        self.cycles.fetch_add(1, Ordering::Relaxed);
        true
    }
    /// Moves the feed onto its own thread. When stopped, the thread drains
    /// the remaining rows, finalizes any recording still open and hands back
    /// the outcome.
    pub fn spawn(mut self, poll_interval: Duration) -> Result<FeedHandle, PipelineError> {
        LoopHandle::spawn("plot-feed", move |stop| {
            log::debug!("plot feed started (threshold {})", self.threshold);
            while !stop.load(Ordering::Acquire) {
                if self.serve_stop_request() {
                    continue;
                }
                if !self.run_cycle() {
                    thread::sleep(poll_interval);
                }
            }
            self.flush();
            let finished = {
                let mut recording = self.recording.lock();
                if recording.stop_requested() {
                    recording.complete_stop();
                    Ok(false)
                } else {
                    recording.finish()
                }
            };
            match &finished {
                Ok(true) => log::info!("recording finalized on teardown"),
                Ok(false) => {}
                Err(err) => log::error!("recording finalized with error on teardown: {err}"),
            }
            log::debug!("plot feed stopped after {} cycles", self.cycles());
            finished.map(|_| ())
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::MemoryRecorder;
    fn fixture(threshold: usize) -> (PlotFeed, Arc<SampleBuffer>, Arc<PlotSeries>) {
        let buffer = Arc::new(SampleBuffer::new(16, 2).unwrap());
        let series = Arc::new(PlotSeries::new(8, 2, 1).unwrap());
        let (recorder, _log) = MemoryRecorder::new();
        let recording = Arc::new(Mutex::new(RecordingSession::new(Box::new(recorder))));
        let feed = PlotFeed::new(
            Arc::clone(&buffer),
            StreamFilter::passthrough(2),
            Arc::clone(&series),
            recording,
            threshold,
        );
        (feed, buffer, series)
    }
    #[test]
    fn waits_for_threshold_then_plots_newest_row() {
        let (mut feed, buffer, series) = fixture(3);
        buffer.update(&[1.0, 10.0]).unwrap();
        buffer.update(&[2.0, 20.0]).unwrap();
        assert!(!feed.run_cycle());
        buffer.update(&[3.0, 30.0]).unwrap();
        buffer.update(&[4.0, 40.0]).unwrap();
        assert!(feed.run_cycle());
        assert_eq!(buffer.points_since_read(), 0);
        assert_eq!(series.snapshot(), vec![40.0]);
        assert!(!feed.run_cycle());
        assert_eq!(feed.cycles(), 1);
    }
    #[test]
    fn records_every_raw_row_while_active() {
        let buffer = Arc::new(SampleBuffer::new(16, 2).unwrap());
        let series = Arc::new(PlotSeries::new(8, 2, 0).unwrap());
        let (recorder, log) = MemoryRecorder::new();
        let recording = Arc::new(Mutex::new(RecordingSession::new(Box::new(recorder))));
        let mut feed = PlotFeed::new(
            Arc::clone(&buffer),
            StreamFilter::passthrough(2),
            series,
            Arc::clone(&recording),
            1,
        );
        buffer.update(&[0.0, 0.0]).unwrap();
        feed.run_cycle();
        recording.lock().start("t").unwrap();
        for i in 1..=5 {
            buffer.update(&[i as f64, -(i as f64)]).unwrap();
        }
        feed.run_cycle();
        assert_eq!(recording.lock().appended(), 5);
        assert!(recording.lock().finish().unwrap());
        let log = log.lock();
        assert_eq!(log.rows.first(), Some(&vec![1.0, -1.0]));
        assert_eq!(log.rows.last(), Some(&vec![5.0, -5.0]));
    }
    #[test]
    fn flush_takes_rows_below_the_threshold() {
        let (mut feed, buffer, series) = fixture(3);
        buffer.update(&[1.0, 10.0]).unwrap();
        assert!(!feed.run_cycle());
        assert!(feed.flush());
        assert_eq!(series.snapshot(), vec![10.0]);
        assert!(!feed.flush());
        assert_eq!(feed.cycles(), 1);
    }
    #[test]
    fn stop_records_rows_left_below_the_threshold() {
        let buffer = Arc::new(SampleBuffer::new(16, 2).unwrap());
        let series = Arc::new(PlotSeries::new(8, 2, 0).unwrap());
        let (recorder, log) = MemoryRecorder::new();
        let recording = Arc::new(Mutex::new(RecordingSession::new(Box::new(recorder))));
        recording.lock().start("tail").unwrap();
        let feed = PlotFeed::new(
            Arc::clone(&buffer),
            StreamFilter::passthrough(2),
            series,
            Arc::clone(&recording),
            3,
        );
        let handle = feed.spawn(Duration::from_millis(1)).unwrap();
        for i in 0..5 {
            buffer.update(&[i as f64, 0.0]).unwrap();
        }
        handle.stop().unwrap().unwrap();
        let log = log.lock();
        assert_eq!(log.rows.len(), 5);
        assert_eq!(log.rows.last(), Some(&vec![4.0, 0.0]));
        assert_eq!(log.finalized, vec!["tail"]);
    }
    #[test]
    fn spawned_feed_finalizes_open_recording_on_stop() {
        let buffer = Arc::new(SampleBuffer::new(16, 2).unwrap());
        let series = Arc::new(PlotSeries::new(8, 2, 0).unwrap());
        let (recorder, log) = MemoryRecorder::new();
        let recording = Arc::new(Mutex::new(RecordingSession::new(Box::new(recorder))));
        recording.lock().start("teardown").unwrap();
        let feed = PlotFeed::new(
            Arc::clone(&buffer),
            StreamFilter::passthrough(2),
            series,
            Arc::clone(&recording),
            1,
        );
        let handle = feed.spawn(Duration::from_millis(1)).unwrap();
        handle.stop().unwrap().unwrap();
        assert!(!recording.lock().is_active());
        assert_eq!(log.lock().finalized, vec!["teardown"]);
    }
}
