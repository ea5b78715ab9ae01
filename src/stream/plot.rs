use std::collections::VecDeque;
use parking_lot::Mutex;
use crate::stream::PipelineError;
/// Bounded, time-ordered series of display points for one channel.
///
/// Written by the drain loop, read by whatever renders it. The selected
/// channel lives under the same lock as the points so a channel switch and
/// the clear that goes with it are never interleaved with an append.
pub struct PlotSeries {
    capacity: usize,
    channels: usize,
    inner: Mutex<SeriesInner>,
}
struct SeriesInner {
    points: VecDeque<f64>,
    channel: usize,
}
impl PlotSeries {
    pub fn new(capacity: usize, channels: usize, channel: usize) -> Result<Self, PipelineError> {
        if capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "plot series needs room for at least one point".into(),
            ));
        }
        if channel >= channels {
            return Err(PipelineError::InvalidChannel {
                index: channel,
                channels,
            });
        }
        Ok(Self {
            capacity,
            channels,
            inner: Mutex::new(SeriesInner {
                points: VecDeque::with_capacity(capacity),
                channel,
            }),
        })
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.inner.lock().points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.lock().points.is_empty()
    }
    pub fn channel(&self) -> usize {
        self.inner.lock().channel
    }
    /// Appends a point, returning the oldest one if it had to make room.
    pub fn push(&self, value: f64) -> Option<f64> {
        let mut inner = self.inner.lock();
        Self::push_locked(&mut inner.points, self.capacity, value)
    }
    /// Appends the selected channel of a full sample row.
    pub fn push_row(&self, row: &[f64]) -> Option<f64> {
        let mut inner = self.inner.lock();
        let value = *row.get(inner.channel)?;
        Self::push_locked(&mut inner.points, self.capacity, value)
    }
    fn push_locked(points: &mut VecDeque<f64>, capacity: usize, value: f64) -> Option<f64> {
        let dropped = if points.len() >= capacity {
            points.pop_front()
        } else {
            None
        };
        points.push_back(value);
        dropped
    }
    /// Switches the displayed channel and empties the series.
    pub fn set_channel(&self, channel: usize) -> Result<(), PipelineError> {
        if channel >= self.channels {
            return Err(PipelineError::InvalidChannel {
                index: channel,
                channels: self.channels,
            });
        }
        let mut inner = self.inner.lock();
        inner.channel = channel;
        inner.points.clear();
        Ok(())
    }
    pub fn clear(&self) {
        self.inner.lock().points.clear();
    }
    /// Copy of the points, oldest first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.inner.lock().points.iter().copied().collect()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn never_exceeds_capacity_and_drops_one_per_append_when_full() {
        let series = PlotSeries::new(5, 4, 0).unwrap();
        for i in 0..5 {
            assert_eq!(series.push(i as f64), None);
        }
        for i in 5..40 {
            assert_eq!(series.push(i as f64), Some((i - 5) as f64));
            assert_eq!(series.len(), 5);
        }
        assert_eq!(series.snapshot(), vec![35.0, 36.0, 37.0, 38.0, 39.0]);
    }
    #[test]
    fn channel_change_clears_immediately() {
        let series = PlotSeries::new(10, 4, 0).unwrap();
        series.push_row(&[1.0, 2.0, 3.0, 4.0]);
        series.push_row(&[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(series.snapshot(), vec![1.0, 5.0]);
        series.set_channel(2).unwrap();
        assert_eq!(series.len(), 0);
        series.push_row(&[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(series.snapshot(), vec![7.0]);
    }
    #[test]
    fn rejects_channels_out_of_range() {
        let series = PlotSeries::new(10, 4, 1).unwrap();
        series.push(1.0);
        assert!(matches!(
            series.set_channel(4),
            Err(PipelineError::InvalidChannel { index: 4, channels: 4 })
        ));
        assert_eq!(series.channel(), 1);
        assert_eq!(series.len(), 1);
        assert!(PlotSeries::new(10, 4, 7).is_err());
        assert!(PlotSeries::new(0, 4, 0).is_err());
    }
}
