use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::stream::PipelineError;
/// Headset generation; decides the stream rate and whether mains hum needs
/// removing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceProfile {
    /// Original headset, 220 Hz.
    #[default]
    Classic,
    /// 2016 low-energy headset, 256 Hz, picks up 60 Hz hum.
    LowEnergy,
}
impl DeviceProfile {
    pub fn sample_rate_hz(self) -> f64 {
        match self {
            DeviceProfile::Classic => 220.0,
            DeviceProfile::LowEnergy => 256.0,
        }
    }
    pub fn default_filters(self) -> FilterConfig {
        match self {
            DeviceProfile::Classic => FilterConfig::default(),
            DeviceProfile::LowEnergy => FilterConfig {
                bandstop: Some(BandstopConfig {
                    order: 5,
                    low_hz: 55.0,
                    high_hz: 65.0,
                }),
                highpass: None,
            },
        }
    }
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandstopConfig {
    pub order: usize,
    pub low_hz: f64,
    pub high_hz: f64,
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HighpassConfig {
    pub order: usize,
    pub cutoff_hz: f64,
}
impl Default for HighpassConfig {
    fn default() -> Self {
        Self {
            order: 2,
            cutoff_hz: 0.1,
        }
    }
}
/// Filters applied before display. Bandstop runs first when both are set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub bandstop: Option<BandstopConfig>,
    pub highpass: Option<HighpassConfig>,
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub channels: usize,
    /// Ring size in rows (K).
    pub buffer_capacity: usize,
    /// Plot width in points (L).
    pub plot_length: usize,
    /// Minimum unread rows before the drain loop runs a cycle.
    pub drain_threshold: usize,
    pub poll_interval_ms: u64,
    pub render_period_ms: u64,
    /// Zero-based channel shown on the plot.
    pub channel_of_interest: usize,
    pub sample_rate_hz: f64,
    pub filters: FilterConfig,
    pub recording_dir: PathBuf,
}
impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            buffer_capacity: 220,
            plot_length: 366,
            drain_threshold: 3,
            poll_interval_ms: 1,
            render_period_ms: 33,
            channel_of_interest: 0,
            sample_rate_hz: DeviceProfile::Classic.sample_rate_hz(),
            filters: FilterConfig::default(),
            recording_dir: PathBuf::from("recordings"),
        }
    }
}
impl PipelineConfig {
    pub fn for_profile(profile: DeviceProfile) -> Self {
        Self {
            sample_rate_hz: profile.sample_rate_hz(),
            filters: profile.default_filters(),
            ..Self::default()
        }
    }
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));
        if self.channels == 0 {
            return invalid("channels must be at least 1".into());
        }
        if self.buffer_capacity == 0 || self.plot_length == 0 {
            return invalid("buffer_capacity and plot_length must be at least 1".into());
        }
        if self.drain_threshold == 0 || self.drain_threshold > self.buffer_capacity {
            return invalid(format!(
                "drain_threshold {} must lie in 1..={}",
                self.drain_threshold, self.buffer_capacity
            ));
        }
        if self.render_period_ms == 0 {
            return invalid("render_period_ms must be at least 1".into());
        }
        if !self.sample_rate_hz.is_finite() || self.sample_rate_hz <= 0.0 {
            return Err(PipelineError::InvalidSampleRate);
        }
        if self.channel_of_interest >= self.channels {
            return Err(PipelineError::InvalidChannel {
                index: self.channel_of_interest,
                channels: self.channels,
            });
        }
        Ok(())
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn render_period(&self) -> Duration {
        Duration::from_millis(self.render_period_ms)
    }
}
