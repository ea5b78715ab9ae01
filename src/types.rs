// src/types.rs
/// Packet families a data source can deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Eeg,
    Artifact,
}
/// One sample-time from the headset: one value per electrode.
///
/// Missing electrode readings arrive as NaN.
#[derive(Clone, Debug, PartialEq)]
pub struct DataPacket {
    pub kind: PacketKind,
    pub values: Vec<f64>,
}
impl DataPacket {
    pub fn eeg(values: Vec<f64>) -> Self {
        Self {
            kind: PacketKind::Eeg,
            values,
        }
    }
    pub fn artifact() -> Self {
        Self {
            kind: PacketKind::Artifact,
            values: Vec::new(),
        }
    }
}
/// Shared lifecycle of the drain and render loops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    Stopped,
    Running,
}
/// Point-in-time counters for diagnostics and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub state: PipelineState,
    pub total_writes: u64,
    pub overflow: u64,
    pub rejected_packets: u64,
    pub drain_cycles: u64,
    pub render_ticks: u64,
    pub plot_len: usize,
    pub recording: bool,
}
