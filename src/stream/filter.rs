use std::f64::consts::PI;
use ndarray::Array2;
use crate::config::FilterConfig;
use crate::stream::PipelineError;
const MAX_ORDER: usize = 8;
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterKind {
    /// Identity: no sections, output equals input.
    None,
    /// Butterworth highpass; removes drift and centres the trace.
    Highpass { cutoff_hz: f64 },
    /// Notch cascade centred on the band; removes mains hum.
    Bandstop { low_hz: f64, high_hz: f64 },
}
impl FilterKind {
    /// Builds a kind from its textual name. `highpass` uses `low_hz` as the cutoff.
    pub fn from_name(name: &str, low_hz: f64, high_hz: f64) -> Result<Self, PipelineError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(FilterKind::None),
            "highpass" => Ok(FilterKind::Highpass { cutoff_hz: low_hz }),
            "bandstop" => Ok(FilterKind::Bandstop { low_hz, high_hz }),
            other => Err(PipelineError::UnsupportedFilter(other.to_string())),
        }
    }
}
#[derive(Clone, Copy, Debug)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}
/// Designed filter: immutable coefficients for a cascade of second-order
/// sections. Runtime state lives in a separate [`FilterState`].
#[derive(Clone, Debug)]
pub struct Filter {
    kind: FilterKind,
    sample_rate_hz: f64,
    order: usize,
    sections: Vec<BiquadCoeffs>,
}
/// Per-channel filter state: `channels x (2 * sections + 1)`.
///
/// Each section owns two delay taps; the last column holds the most recent
/// output so it can be projected without recomputation.
#[derive(Clone, Debug)]
pub struct FilterState {
    taps: Array2<f64>,
}
impl FilterState {
    pub fn channels(&self) -> usize {
        self.taps.nrows()
    }
    /// Length of each channel's state vector. Fixed by the filter order.
    pub fn len(&self) -> usize {
        self.taps.ncols()
    }
    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }
}
impl Filter {
    pub fn new(sample_rate_hz: f64, kind: FilterKind, order: usize) -> Result<Self, PipelineError> {
        if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
            return Err(PipelineError::InvalidSampleRate);
        }
        let nyquist = sample_rate_hz * 0.5;
        let sections = match kind {
            FilterKind::None => Vec::new(),
            FilterKind::Highpass { cutoff_hz } => {
                check_order(order)?;
                if !in_band(cutoff_hz, nyquist) {
                    return Err(PipelineError::InvalidFilter(format!(
                        "highpass cutoff {cutoff_hz} Hz must lie inside (0, {nyquist}) Hz"
                    )));
                }
                butterworth_highpass(order, cutoff_hz, sample_rate_hz)
            }
            FilterKind::Bandstop { low_hz, high_hz } => {
                check_order(order)?;
                if !(in_band(low_hz, nyquist) && in_band(high_hz, nyquist) && low_hz < high_hz) {
                    return Err(PipelineError::InvalidFilter(format!(
                        "bandstop edges {low_hz}-{high_hz} Hz must be ordered and inside (0, {nyquist}) Hz"
                    )));
                }
                let center = (low_hz * high_hz).sqrt();
                let q = center / (high_hz - low_hz);
                // one notch per pair of poles, rounded up
                vec![notch(center, sample_rate_hz, q); (order + 1) / 2]
            }
        };
        Ok(Self {
            kind,
            sample_rate_hz,
            order,
            sections,
        })
    }
    pub fn kind(&self) -> FilterKind {
        self.kind
    }
    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }
    pub fn order(&self) -> usize {
        self.order
    }
    pub fn state_len(&self) -> usize {
        self.sections.len() * 2 + 1
    }
    pub fn new_state(&self, channels: usize) -> FilterState {
        FilterState {
            taps: Array2::zeros((channels, self.state_len())),
        }
    }
    /// Advances `state` by one sample per channel (transposed direct form II).
    /// A sample of the wrong width leaves `state` untouched.
    pub fn transform(&self, sample: &[f64], state: &mut FilterState) -> Result<(), PipelineError> {
        if sample.len() != state.channels() {
            return Err(PipelineError::ChannelMismatch {
                expected: state.channels(),
                actual: sample.len(),
            });
        }
        let out = self.state_len() - 1;
        for (mut taps, &input) in state.taps.rows_mut().into_iter().zip(sample) {
            let mut value = input;
            for (idx, c) in self.sections.iter().enumerate() {
                let (z1, z2) = (2 * idx, 2 * idx + 1);
                let y = c.b0 * value + taps[z1];
                taps[z1] = c.b1 * value - c.a1 * y + taps[z2];
                taps[z2] = c.b2 * value - c.a2 * y;
                value = y;
            }
            taps[out] = value;
        }
        Ok(())
    }
    /// Latest filtered value of every channel. Does not touch the state.
    pub fn extract_filtered_samples(&self, state: &FilterState) -> Vec<f64> {
        state.taps.column(self.state_len() - 1).to_vec()
    }
    fn copy_output(&self, state: &FilterState, out: &mut [f64]) {
        for (dst, src) in out.iter_mut().zip(state.taps.column(self.state_len() - 1)) {
            *dst = *src;
        }
    }
}
/// Bandstop followed by highpass, each with its own per-channel state.
///
/// With no stages this is a passthrough; callers use it the same way either
/// way.
pub struct StreamFilter {
    channels: usize,
    stages: Vec<(Filter, FilterState)>,
    output: Vec<f64>,
}
impl StreamFilter {
    pub fn passthrough(channels: usize) -> Self {
        Self::new(channels, None, None)
    }
    pub fn new(channels: usize, bandstop: Option<Filter>, highpass: Option<Filter>) -> Self {
        let stages = bandstop
            .into_iter()
            .chain(highpass)
            .map(|filter| {
                let state = filter.new_state(channels);
                (filter, state)
            })
            .collect();
        Self {
            channels,
            stages,
            output: vec![0.0; channels],
        }
    }
    pub fn from_config(
        channels: usize,
        sample_rate_hz: f64,
        config: &FilterConfig,
    ) -> Result<Self, PipelineError> {
        let bandstop = config
            .bandstop
            .as_ref()
            .map(|b| {
                Filter::new(
                    sample_rate_hz,
                    FilterKind::Bandstop {
                        low_hz: b.low_hz,
                        high_hz: b.high_hz,
                    },
                    b.order,
                )
            })
            .transpose()?;
        let highpass = config
            .highpass
            .as_ref()
            .map(|h| {
                Filter::new(
                    sample_rate_hz,
                    FilterKind::Highpass {
                        cutoff_hz: h.cutoff_hz,
                    },
                    h.order,
                )
            })
            .transpose()?;
        Ok(Self::new(channels, bandstop, highpass))
    }
    pub fn is_passthrough(&self) -> bool {
        self.stages.is_empty()
    }
    /// Filters one multi-channel sample and returns the filtered row.
    pub fn process(&mut self, sample: &[f64]) -> Result<&[f64], PipelineError> {
        if sample.len() != self.channels {
            return Err(PipelineError::ChannelMismatch {
                expected: self.channels,
                actual: sample.len(),
            });
        }
        self.output.copy_from_slice(sample);
        for (filter, state) in &mut self.stages {
            filter.transform(&self.output, state)?;
            filter.copy_output(state, &mut self.output);
        }
        Ok(self.output.as_slice())
    }
}
fn check_order(order: usize) -> Result<(), PipelineError> {
    if (1..=MAX_ORDER).contains(&order) {
        Ok(())
    } else {
        Err(PipelineError::InvalidFilter(format!(
            "order {order} outside 1..={MAX_ORDER}"
        )))
    }
}
fn in_band(freq_hz: f64, nyquist: f64) -> bool {
    freq_hz.is_finite() && freq_hz > 0.0 && freq_hz < nyquist
}
fn butterworth_highpass(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> Vec<BiquadCoeffs> {
    let mut sections: Vec<BiquadCoeffs> = (0..order / 2)
        .map(|k| {
            let theta = (2 * k + 1) as f64 * PI / (2 * order) as f64;
            highpass(cutoff_hz, sample_rate_hz, 1.0 / (2.0 * theta.sin()))
        })
        .collect();
    if order % 2 == 1 {
        sections.push(first_order_highpass(cutoff_hz, sample_rate_hz));
    }
    sections
}
fn highpass(freq_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
    let alpha = w0.sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = (1.0 + cos_w0) * 0.5;
    let b1 = -(1.0 + cos_w0);
    let b2 = b0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}
fn first_order_highpass(freq_hz: f64, sample_rate_hz: f64) -> BiquadCoeffs {
    let k = (PI * freq_hz / sample_rate_hz).tan();
    let b0 = 1.0 / (1.0 + k);
    BiquadCoeffs {
        b0,
        b1: -b0,
        b2: 0.0,
        a1: (k - 1.0) / (k + 1.0),
        a2: 0.0,
    }
}
fn notch(center_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * center_hz / sample_rate_hz;
    let alpha = w0.sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = 1.0;
    let b1 = -2.0 * cos_w0;
    let b2 = 1.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}
fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> BiquadCoeffs {
    let a0_inv = 1.0 / a0;
    BiquadCoeffs {
        b0: b0 * a0_inv,
        b1: b1 * a0_inv,
        b2: b2 * a0_inv,
        a1: a1 * a0_inv,
        a2: a2 * a0_inv,
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BandstopConfig, HighpassConfig};
    fn sine(freq_hz: f64, sample_rate_hz: f64, amp: f64, n: usize) -> f64 {
        amp * (2.0 * PI * freq_hz * n as f64 / sample_rate_hz).sin()
    }
    #[test]
    fn none_kind_is_identity() {
        let filter = Filter::new(256.0, FilterKind::None, 0).unwrap();
        let mut state = filter.new_state(4);
        for i in 0..50 {
            let x = [i as f64, -3.5 * i as f64, 1e6, f64::MIN_POSITIVE];
            filter.transform(&x, &mut state).unwrap();
            assert_eq!(filter.extract_filtered_samples(&state), x.to_vec());
        }
        let mut passthrough = StreamFilter::passthrough(4);
        assert!(passthrough.is_passthrough());
        assert_eq!(passthrough.process(&[1.0, 2.0, 3.0, 4.0]).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    }
    #[test]
    fn state_size_is_fixed_and_output_bounded_over_long_runs() {
        let config = FilterConfig {
            bandstop: Some(BandstopConfig {
                order: 5,
                low_hz: 55.0,
                high_hz: 65.0,
            }),
            highpass: Some(HighpassConfig {
                order: 2,
                cutoff_hz: 0.1,
            }),
        };
        let mut chain = StreamFilter::from_config(4, 256.0, &config).unwrap();
        let lens: Vec<usize> = chain.stages.iter().map(|(_, s)| s.len()).collect();
        for n in 0..10_000 {
            let v = 800.0 + sine(10.0, 256.0, 100.0, n) + sine(60.0, 256.0, 50.0, n);
            let out = chain.process(&[v, v, -v, 0.0]).unwrap();
            assert!(out.iter().all(|y| y.is_finite() && y.abs() < 2_000.0));
        }
        let after: Vec<usize> = chain.stages.iter().map(|(_, s)| s.len()).collect();
        assert_eq!(lens, after);
        assert_eq!(after, vec![7, 3]);
    }
    #[test]
    fn bandstop_removes_mains_hum() {
        let filter = Filter::new(
            256.0,
            FilterKind::Bandstop {
                low_hz: 55.0,
                high_hz: 65.0,
            },
            5,
        )
        .unwrap();
        let mut state = filter.new_state(1);
        let mut peak: f64 = 0.0;
        for n in 0..3_000 {
            filter.transform(&[sine(60.0, 256.0, 100.0, n)], &mut state).unwrap();
            if n >= 2_000 {
                peak = peak.max(filter.extract_filtered_samples(&state)[0].abs());
            }
        }
        assert!(peak < 1.0, "60 Hz leaked through with peak {peak}");
    }
    #[test]
    fn highpass_centres_a_constant_offset_and_keeps_alpha() {
        let filter = Filter::new(256.0, FilterKind::Highpass { cutoff_hz: 0.1 }, 2).unwrap();
        let mut state = filter.new_state(2);
        let mut peak: f64 = 0.0;
        for n in 0..10_000 {
            filter.transform(&[800.0, sine(10.0, 256.0, 100.0, n)], &mut state).unwrap();
            if n >= 9_000 {
                peak = peak.max(filter.extract_filtered_samples(&state)[1].abs());
            }
        }
        let out = filter.extract_filtered_samples(&state);
        assert!(out[0].abs() < 1.0, "offset not removed: {}", out[0]);
        assert!((95.0..105.0).contains(&peak), "10 Hz amplitude changed: {peak}");
    }
    #[test]
    fn odd_order_highpass_adds_a_first_order_section() {
        let filter = Filter::new(220.0, FilterKind::Highpass { cutoff_hz: 1.0 }, 3).unwrap();
        assert_eq!(filter.state_len(), 5);
        let mut state = filter.new_state(1);
        for _ in 0..5_000 {
            filter.transform(&[10.0], &mut state).unwrap();
        }
        assert!(filter.extract_filtered_samples(&state)[0].abs() < 1e-3);
    }
    #[test]
    fn misconfiguration_fails_at_construction() {
        assert!(matches!(
            Filter::new(0.0, FilterKind::Highpass { cutoff_hz: 1.0 }, 2),
            Err(PipelineError::InvalidSampleRate)
        ));
        assert!(matches!(
            Filter::new(220.0, FilterKind::Highpass { cutoff_hz: 150.0 }, 2),
            Err(PipelineError::InvalidFilter(_))
        ));
        assert!(matches!(
            Filter::new(220.0, FilterKind::Bandstop { low_hz: 65.0, high_hz: 55.0 }, 4),
            Err(PipelineError::InvalidFilter(_))
        ));
        assert!(matches!(
            Filter::new(220.0, FilterKind::Highpass { cutoff_hz: 1.0 }, 0),
            Err(PipelineError::InvalidFilter(_))
        ));
        assert!(matches!(
            FilterKind::from_name("lowshelf", 1.0, 2.0),
            Err(PipelineError::UnsupportedFilter(name)) if name == "lowshelf"
        ));
        assert_eq!(
            FilterKind::from_name("Bandstop", 55.0, 65.0).unwrap(),
            FilterKind::Bandstop { low_hz: 55.0, high_hz: 65.0 }
        );
    }
    #[test]
    fn stream_filter_rejects_wrong_width() {
        let mut chain = StreamFilter::passthrough(4);
        assert!(matches!(
            chain.process(&[1.0]),
            Err(PipelineError::ChannelMismatch { expected: 4, actual: 1 })
        ));
    }
    #[test]
    fn transform_rejects_rows_of_the_wrong_width() {
        let filter = Filter::new(256.0, FilterKind::Highpass { cutoff_hz: 1.0 }, 2).unwrap();
        let mut state = filter.new_state(2);
        filter.transform(&[5.0, -5.0], &mut state).unwrap();
        let before = filter.extract_filtered_samples(&state);
        assert!(matches!(
            filter.transform(&[1.0, 2.0, 3.0], &mut state),
            Err(PipelineError::ChannelMismatch { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            filter.transform(&[1.0], &mut state),
            Err(PipelineError::ChannelMismatch { expected: 2, actual: 1 })
        ));
        assert_eq!(filter.extract_filtered_samples(&state), before);
    }
}
