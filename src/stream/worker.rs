use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use crate::stream::PipelineError;
/// A named long-lived thread with a cooperative stop flag.
///
/// The loop body receives the flag and must check it once per iteration.
pub struct LoopHandle<T> {
    name: &'static str,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<T>,
}
impl<T: Send + 'static> LoopHandle<T> {
    pub fn spawn<F>(name: &'static str, body: F) -> Result<Self, PipelineError>
    where
        F: FnOnce(Arc<AtomicBool>) -> T + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || body(flag))?;
        Ok(Self { name, stop, thread })
    }
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
    /// Requests a stop and waits for the loop to notice it.
    pub fn stop(self) -> Result<T, PipelineError> {
        self.request_stop();
        let name = self.name;
        self.thread
            .join()
            .map_err(|_| PipelineError::WorkerPanicked(name))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    #[test]
    fn stop_is_observed_by_the_loop() {
        let handle = LoopHandle::spawn("counter", |stop| {
            let mut n = 0u32;
            while !stop.load(Ordering::Acquire) {
                n += 1;
                thread::sleep(Duration::from_millis(1));
            }
            n
        })
        .unwrap();
        thread::sleep(Duration::from_millis(10));
        assert!(!handle.is_finished());
        assert!(handle.stop().unwrap() > 0);
    }
    #[test]
    fn panics_are_reported_not_propagated() {
        let handle = LoopHandle::spawn("doomed", |_stop| -> () { panic!("boom") }).unwrap();
        assert!(matches!(
            handle.stop(),
            Err(PipelineError::WorkerPanicked("doomed"))
        ));
    }
}
