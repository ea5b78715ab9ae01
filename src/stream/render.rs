use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use crate::stream::worker::LoopHandle;
use crate::stream::PipelineError;
/// A view that can be asked to repaint from any thread.
pub trait RenderTarget: Send + Sync {
    fn redraw(&self);
}
/// Periodic redraw requests. Holds its target weakly and exits on its own
/// once the target is gone.
pub struct RenderLoop {
    target: Weak<dyn RenderTarget>,
    period: Duration,
    ticks: Arc<AtomicU64>,
}
impl RenderLoop {
    pub fn new(target: Weak<dyn RenderTarget>, period: Duration) -> Self {
        Self {
            target,
            period,
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }
    pub fn with_tick_counter(mut self, ticks: Arc<AtomicU64>) -> Self {
        self.ticks = ticks;
        self
    }
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
    /// Requests one redraw. Returns false when the target no longer exists.
    pub fn tick(&self) -> bool {
        match self.target.upgrade() {
            Some(target) => {
                target.redraw();
                self.ticks.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
    pub fn spawn(self) -> Result<LoopHandle<()>, PipelineError> {
        LoopHandle::spawn("render-loop", move |stop| loop {
            thread::sleep(self.period);
            if stop.load(Ordering::Acquire) {
                break;
            }
            if !self.tick() {
                log::info!("render target dropped, render loop exiting");
                break;
            }
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[derive(Default)]
    struct CountingView {
        redraws: AtomicU64,
    }
    impl RenderTarget for CountingView {
        fn redraw(&self) {
            self.redraws.fetch_add(1, Ordering::Relaxed);
        }
    }
    #[test]
    fn redraws_periodically_until_stopped() {
        let view = Arc::new(CountingView::default());
        let target: Arc<dyn RenderTarget> = view.clone();
        let handle = RenderLoop::new(Arc::downgrade(&target), Duration::from_millis(2))
            .spawn()
            .unwrap();
        thread::sleep(Duration::from_millis(60));
        handle.stop().unwrap();
        let seen = view.redraws.load(Ordering::Relaxed);
        assert!(seen >= 3, "only {seen} redraws");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(view.redraws.load(Ordering::Relaxed), seen);
    }
    #[test]
    fn exits_when_target_is_dropped() {
        let target: Arc<dyn RenderTarget> = Arc::new(CountingView::default());
        let ticks = Arc::new(AtomicU64::new(0));
        let handle = RenderLoop::new(Arc::downgrade(&target), Duration::from_millis(2))
            .with_tick_counter(Arc::clone(&ticks))
            .spawn()
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        drop(target);
        let mut waited = 0;
        while !handle.is_finished() && waited < 200 {
            thread::sleep(Duration::from_millis(5));
            waited += 1;
        }
        assert!(handle.is_finished());
        let after = ticks.load(Ordering::Relaxed);
        handle.stop().unwrap();
        assert_eq!(ticks.load(Ordering::Relaxed), after);
        assert!(after > 0);
    }
}
