// src/stream/mod.rs
pub mod buffer;
pub mod error;
pub mod feed;
pub mod filter;
pub mod pipeline;
pub mod plot;
pub mod render;
pub mod source;
pub mod worker;
pub use buffer::SampleBuffer;
pub use error::PipelineError;
pub use feed::{FeedHandle, PlotFeed};
pub use filter::{Filter, FilterKind, FilterState, StreamFilter};
pub use pipeline::Pipeline;
pub use plot::PlotSeries;
pub use render::{RenderLoop, RenderTarget};
pub use source::{
    DataSource, EegListener, ListenerRegistry, ManualSource, PacketListener, SimulatedSource,
    SimulationConfig,
};
pub use worker::LoopHandle;
