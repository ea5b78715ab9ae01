use std::f64::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::stream::buffer::SampleBuffer;
use crate::stream::worker::LoopHandle;
use crate::stream::PipelineError;
use crate::types::{DataPacket, PacketKind};
/// Receives packets on whatever thread the source delivers them from.
pub trait PacketListener: Send + Sync {
    fn receive_packet(&self, packet: &DataPacket);
}
/// Something that pushes packets to registered listeners, e.g. a headset
/// connection.
pub trait DataSource: Send + Sync {
    fn register_listener(&self, listener: Arc<dyn PacketListener>, kind: PacketKind);
    fn unregister_listener(&self, listener: &Arc<dyn PacketListener>, kind: PacketKind);
}
fn same_listener(a: &Arc<dyn PacketListener>, b: &Arc<dyn PacketListener>) -> bool {
    // Compare data addresses only; vtable pointers are not unique.
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
/// Listener table shared by the source implementations in this module.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Mutex<Vec<(PacketKind, Arc<dyn PacketListener>)>>,
}
impl ListenerRegistry {
    pub fn register(&self, listener: Arc<dyn PacketListener>, kind: PacketKind) {
        let mut entries = self.entries.lock();
        if entries
            .iter()
            .any(|(k, l)| *k == kind && same_listener(l, &listener))
        {
            log::debug!("listener already registered for {kind:?}");
            return;
        }
        entries.push((kind, listener));
    }
    pub fn unregister(&self, listener: &Arc<dyn PacketListener>, kind: PacketKind) {
        self.entries
            .lock()
            .retain(|(k, l)| !(*k == kind && same_listener(l, listener)));
    }
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
    /// Delivers to every listener of the packet's kind. The table lock is
    /// released before any listener runs.
    pub fn dispatch(&self, packet: &DataPacket) {
        let targets: Vec<Arc<dyn PacketListener>> = self
            .entries
            .lock()
            .iter()
            .filter(|(k, _)| *k == packet.kind)
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in targets {
            listener.receive_packet(packet);
        }
    }
}
/// Writes EEG packets into a [`SampleBuffer`]. Anything that is not a
/// complete, finite row of the right width is counted and dropped.
pub struct EegListener {
    buffer: Arc<SampleBuffer>,
    rejected: Arc<AtomicU64>,
}
impl EegListener {
    pub fn new(buffer: Arc<SampleBuffer>, rejected: Arc<AtomicU64>) -> Self {
        Self { buffer, rejected }
    }
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
impl PacketListener for EegListener {
    fn receive_packet(&self, packet: &DataPacket) {
        if packet.kind != PacketKind::Eeg {
            return;
        }
        if packet.values.iter().any(|v| !v.is_finite()) {
            log::debug!("dropping EEG packet with missing electrode values");
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if let Err(err) = self.buffer.update(&packet.values) {
            log::debug!("dropping EEG packet: {err}");
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }
}
/// Source driven by the caller: `emit` delivers synchronously on the calling
/// thread. Useful for tests and deterministic playback.
#[derive(Default)]
pub struct ManualSource {
    listeners: ListenerRegistry,
}
impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn emit(&self, packet: DataPacket) {
        self.listeners.dispatch(&packet);
    }
    pub fn emit_rows<I>(&self, rows: I)
    where
        I: IntoIterator<Item = Vec<f64>>,
    {
        for row in rows {
            self.emit(DataPacket::eeg(row));
        }
    }
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
impl DataSource for ManualSource {
    fn register_listener(&self, listener: Arc<dyn PacketListener>, kind: PacketKind) {
        self.listeners.register(listener, kind);
    }
    fn unregister_listener(&self, listener: &Arc<dyn PacketListener>, kind: PacketKind) {
        self.listeners.unregister(listener, kind);
    }
}
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub channels: usize,
    pub sample_rate_hz: f64,
    /// Amplitude of the 60 Hz mains component.
    pub mains_amplitude: f64,
    /// One artifact packet (and one row with a missing electrode) this often.
    pub artifact_every: Option<Duration>,
    pub seed: u64,
}
impl SimulationConfig {
    pub fn new(channels: usize, sample_rate_hz: f64) -> Self {
        Self {
            channels,
            sample_rate_hz,
            mains_amplitude: 40.0,
            artifact_every: Some(Duration::from_secs(4)),
            seed: 0x5eed,
        }
    }
}
/// Synthetic headset: alpha-band sinusoids on an ~800 uV baseline with slow
/// drift, mains hum and noise, paced at the configured sample rate on its
/// own thread.
pub struct SimulatedSource {
    listeners: Arc<ListenerRegistry>,
    worker: Mutex<Option<LoopHandle<u64>>>,
}
impl SimulatedSource {
    pub fn spawn(config: SimulationConfig) -> Result<Self, PipelineError> {
        if !(config.sample_rate_hz.is_finite() && config.sample_rate_hz > 0.0) {
            return Err(PipelineError::InvalidSampleRate);
        }
        let listeners = Arc::new(ListenerRegistry::default());
        let registry = Arc::clone(&listeners);
        let worker = LoopHandle::spawn("simulated-source", move |stop| {
            let mut signal = SyntheticSignal::new(&config);
            let started = Instant::now();
            let mut emitted = 0u64;
            let mut next_artifact = config.artifact_every.map(|every| started + every);
            while !stop.load(Ordering::Acquire) {
                let due = (started.elapsed().as_secs_f64() * config.sample_rate_hz) as u64;
                while emitted < due {
                    let mut row = signal.next_row();
                    if let Some(at) = next_artifact {
                        if Instant::now() >= at {
                            registry.dispatch(&DataPacket::artifact());
                            row[0] = f64::NAN;
                            next_artifact = config.artifact_every.map(|every| at + every);
                        }
                    }
                    // Listeners come and go with the viewer; samples with
                    // nobody listening are simply not delivered.
                    registry.dispatch(&DataPacket::eeg(row));
                    emitted += 1;
                }
                thread::sleep(Duration::from_millis(2));
            }
            emitted
        })?;
        log::info!("simulated headset started");
        Ok(Self {
            listeners,
            worker: Mutex::new(Some(worker)),
        })
    }
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
    /// Stops the generator thread. Idempotent.
    pub fn shutdown(&self) -> Result<(), PipelineError> {
        if let Some(worker) = self.worker.lock().take() {
            let emitted = worker.stop()?;
            log::info!("simulated headset stopped after {emitted} samples");
        }
        Ok(())
    }
}
impl DataSource for SimulatedSource {
    fn register_listener(&self, listener: Arc<dyn PacketListener>, kind: PacketKind) {
        self.listeners.register(listener, kind);
    }
    fn unregister_listener(&self, listener: &Arc<dyn PacketListener>, kind: PacketKind) {
        self.listeners.unregister(listener, kind);
    }
}
impl Drop for SimulatedSource {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("simulated headset shutdown failed: {err}");
        }
    }
}
struct SyntheticSignal {
    dt: f64,
    t: f64,
    channels: usize,
    mains: f64,
    rng: StdRng,
}
impl SyntheticSignal {
    fn new(config: &SimulationConfig) -> Self {
        Self {
            dt: 1.0 / config.sample_rate_hz,
            t: 0.0,
            channels: config.channels,
            mains: config.mains_amplitude,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }
    fn next_row(&mut self) -> Vec<f64> {
        let t = self.t;
        self.t += self.dt;
        let drift = 25.0 * (TAU * 0.05 * t).sin();
        let hum = self.mains * (TAU * 60.0 * t).sin();
        (0..self.channels)
            .map(|ch| {
                let alpha = 30.0 * (TAU * (9.0 + ch as f64) * t).sin();
                let noise: f64 = self.rng.gen_range(-4.0..4.0);
                800.0 + drift + hum + alpha + noise
            })
            .collect()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[derive(Default)]
    struct Counting {
        packets: AtomicU64,
    }
    impl PacketListener for Counting {
        fn receive_packet(&self, _packet: &DataPacket) {
            self.packets.fetch_add(1, Ordering::Relaxed);
        }
    }
    #[test]
    fn eeg_listener_filters_bad_packets() {
        let buffer = Arc::new(SampleBuffer::new(8, 4).unwrap());
        let listener = EegListener::new(Arc::clone(&buffer), Arc::new(AtomicU64::new(0)));
        listener.receive_packet(&DataPacket::eeg(vec![1.0, 2.0, 3.0, 4.0]));
        listener.receive_packet(&DataPacket::eeg(vec![1.0, f64::NAN, 3.0, 4.0]));
        listener.receive_packet(&DataPacket::eeg(vec![1.0, 2.0]));
        listener.receive_packet(&DataPacket::artifact());
        assert_eq!(buffer.total_writes(), 1);
        assert_eq!(listener.rejected(), 2);
    }
    #[test]
    fn registry_delivers_by_kind_and_unregisters_by_identity() {
        let source = ManualSource::new();
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let a_dyn: Arc<dyn PacketListener> = a.clone();
        let b_dyn: Arc<dyn PacketListener> = b.clone();
        source.register_listener(Arc::clone(&a_dyn), PacketKind::Eeg);
        source.register_listener(Arc::clone(&a_dyn), PacketKind::Eeg);
        source.register_listener(Arc::clone(&b_dyn), PacketKind::Artifact);
        assert_eq!(source.listener_count(), 2);
        source.emit(DataPacket::eeg(vec![0.0]));
        source.emit(DataPacket::artifact());
        assert_eq!(a.packets.load(Ordering::Relaxed), 1);
        assert_eq!(b.packets.load(Ordering::Relaxed), 1);
        source.unregister_listener(&a_dyn, PacketKind::Eeg);
        source.emit(DataPacket::eeg(vec![0.0]));
        assert_eq!(a.packets.load(Ordering::Relaxed), 1);
        assert_eq!(source.listener_count(), 1);
    }
    #[test]
    fn simulated_source_paces_rows_into_a_buffer() {
        let mut config = SimulationConfig::new(4, 500.0);
        config.artifact_every = None;
        let source = SimulatedSource::spawn(config).unwrap();
        let buffer = Arc::new(SampleBuffer::new(1024, 4).unwrap());
        let listener: Arc<dyn PacketListener> = Arc::new(EegListener::new(
            Arc::clone(&buffer),
            Arc::new(AtomicU64::new(0)),
        ));
        source.register_listener(Arc::clone(&listener), PacketKind::Eeg);
        thread::sleep(Duration::from_millis(200));
        source.unregister_listener(&listener, PacketKind::Eeg);
        source.shutdown().unwrap();
        let writes = buffer.total_writes();
        assert!(writes > 20, "only {writes} rows in 200 ms");
        assert!(writes < 400, "{writes} rows in 200 ms at 500 Hz");
        let rows = buffer.take_unread();
        assert!(rows.iter().all(|v| (600.0..1000.0).contains(v)));
    }
}
