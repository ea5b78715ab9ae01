use ndarray::{Array2, ArrayView1};
use parking_lot::Mutex;
use crate::stream::PipelineError;
/// Fixed-capacity ring holding the most recent multi-channel sample rows.
///
/// Exactly one producer calls [`SampleBuffer::update`] and exactly one consumer
/// reads. Whole rows are written and copied out under one lock, so a reader
/// never observes a half-written row. The lock is held only for a row copy on
/// the producer side and never allocates there.
///
/// Data-loss policy: when the producer laps the consumer, unread rows are
/// overwritten and silently dropped. The buffer always reflects the latest
/// `capacity` rows, favouring recency over completeness. Every dropped row is
/// counted by [`SampleBuffer::overflow_count`].
pub struct SampleBuffer {
    channels: usize,
    capacity: usize,
    ring: Mutex<Ring>,
}
struct Ring {
    store: Array2<f64>, // capacity x channels
    cursor: usize,
    filled: usize,
    points_since_read: usize,
    total_writes: u64,
    overflow: u64,
}
impl Ring {
    /// Up to `n` newest rows, oldest first.
    fn latest(&self, n: usize) -> Array2<f64> {
        let capacity = self.store.nrows();
        let take = n.min(self.filled);
        let start = (self.cursor + capacity - take) % capacity;
        Array2::from_shape_fn((take, self.store.ncols()), |(i, ch)| {
            self.store[[(start + i) % capacity, ch]]
        })
    }
}
impl SampleBuffer {
    pub fn new(capacity: usize, channels: usize) -> Result<Self, PipelineError> {
        if capacity == 0 || channels == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "sample buffer needs a non-zero size, got {capacity} rows x {channels} channels"
            )));
        }
        Ok(Self {
            channels,
            capacity,
            ring: Mutex::new(Ring {
                store: Array2::zeros((capacity, channels)),
                cursor: 0,
                filled: 0,
                points_since_read: 0,
                total_writes: 0,
                overflow: 0,
            }),
        })
    }
    pub fn channels(&self) -> usize {
        self.channels
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Producer side: overwrite the oldest row with `samples`.
    pub fn update(&self, samples: &[f64]) -> Result<(), PipelineError> {
        if samples.len() != self.channels {
            return Err(PipelineError::ChannelMismatch {
                expected: self.channels,
                actual: samples.len(),
            });
        }
        let mut ring = self.ring.lock();
        let cursor = ring.cursor;
        ring.store.row_mut(cursor).assign(&ArrayView1::from(samples));
        ring.cursor = (cursor + 1) % self.capacity;
        ring.filled = (ring.filled + 1).min(self.capacity);
        if ring.points_since_read >= self.capacity {
            // the row just overwritten had never been read
            ring.overflow += 1;
        }
        ring.points_since_read += 1;
        ring.total_writes += 1;
        Ok(())
    }
    /// Snapshot of up to `n` most recent rows (`rows x channels`), oldest first.
    /// Never includes slots that were not written yet.
    pub fn extract(&self, n: usize) -> Array2<f64> {
        self.ring.lock().latest(n)
    }
    /// Extracts every row written since the last read (at most `capacity`) and
    /// resets the counter in the same critical section.
    pub fn take_unread(&self) -> Array2<f64> {
        let mut ring = self.ring.lock();
        let rows = ring.latest(ring.points_since_read.min(self.capacity));
        ring.points_since_read = 0;
        rows
    }
    pub fn points_since_read(&self) -> usize {
        self.ring.lock().points_since_read
    }
    pub fn reset_points_since_read(&self) {
        self.ring.lock().points_since_read = 0;
    }
    pub fn total_writes(&self) -> u64 {
        self.ring.lock().total_writes
    }
    /// Rows overwritten before the consumer read them.
    pub fn overflow_count(&self) -> u64 {
        self.ring.lock().overflow
    }
}
