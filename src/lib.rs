//! Real-time EEG stream plumbing: a bounded sample ring fed by a headset
//! listener, streaming IIR filters, a drain loop that downsamples into a
//! plot series and optionally records raw rows, and a periodic redraw loop.
pub mod config;
pub mod recorder;
pub mod stream;
pub mod types;
pub use config::{DeviceProfile, FilterConfig, PipelineConfig};
pub use recorder::{CsvRecorder, MemoryRecorder, Recorder, RecordingSession};
pub use stream::{Pipeline, PipelineError};
pub use types::{DataPacket, PacketKind, PipelineState, PipelineStats};
