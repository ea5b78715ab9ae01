use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use parking_lot::Mutex;
use crate::stream::PipelineError;
/// Append-only sink for raw sample rows.
///
/// The pipeline only calls `append` between a successful `init_session` and
/// the matching `finalize`, and calls `finalize` once per session.
pub trait Recorder: Send {
    fn init_session(&mut self, label: &str) -> Result<(), PipelineError>;
    fn append(&mut self, row: &[f64]) -> Result<(), PipelineError>;
    fn finalize(&mut self, label: &str) -> Result<(), PipelineError>;
}
const MAX_NAME_ATTEMPTS: usize = 1000;
/// Writes one CSV file per session: `<dir>/<label>_<unix-seconds>.csv`.
/// Sessions never overwrite an earlier file.
pub struct CsvRecorder {
    dir: PathBuf,
    channels: usize,
    session: Option<CsvSession>,
    last_file: Option<PathBuf>,
}
struct CsvSession {
    label: String,
    path: PathBuf,
    writer: BufWriter<File>,
    started: Instant,
    rows: u64,
}
impl CsvRecorder {
    pub fn new(dir: impl Into<PathBuf>, channels: usize) -> Self {
        Self {
            dir: dir.into(),
            channels,
            session: None,
            last_file: None,
        }
    }
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }
    /// Path of the most recently finalized file.
    pub fn last_file(&self) -> Option<&Path> {
        self.last_file.as_deref()
    }
    /// Creates a fresh file for `label`, never reusing an existing path:
    /// `<label>_<secs>.csv`, then `<label>_<secs>_1.csv`, `_2`, ...
    fn create_file(&self, label: &str) -> Result<(PathBuf, File), PipelineError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = match attempt {
                0 => format!("{safe}_{timestamp}.csv"),
                n => format!("{safe}_{timestamp}_{n}.csv"),
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(PipelineError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for recording `{label}`"),
        )))
    }
}
impl Recorder for CsvRecorder {
    fn init_session(&mut self, label: &str) -> Result<(), PipelineError> {
        if let Some(open) = &self.session {
            return Err(PipelineError::AlreadyRecording(open.label.clone()));
        }
        fs::create_dir_all(&self.dir)?;
        let (path, file) = self.create_file(label)?;
        let mut writer = BufWriter::new(file);
        write!(writer, "timestamp")?;
        for ch in 0..self.channels {
            write!(writer, ",ch{ch}")?;
        }
        writeln!(writer)?;
        log::info!("recording `{label}` to {}", path.display());
        self.session = Some(CsvSession {
            label: label.to_owned(),
            path,
            writer,
            started: Instant::now(),
            rows: 0,
        });
        Ok(())
    }
    fn append(&mut self, row: &[f64]) -> Result<(), PipelineError> {
        let session = self.session.as_mut().ok_or(PipelineError::NoSession)?;
        let t = session.started.elapsed().as_secs_f64();
        write!(session.writer, "{t:.4}")?;
        for value in row {
            write!(session.writer, ",{value:.3}")?;
        }
        writeln!(session.writer)?;
        session.rows += 1;
        Ok(())
    }
    fn finalize(&mut self, label: &str) -> Result<(), PipelineError> {
        let open = self.session.as_ref().ok_or(PipelineError::NoSession)?;
        if open.label != label {
            return Err(PipelineError::SessionMismatch {
                open: open.label.clone(),
                requested: label.to_owned(),
            });
        }
        if let Some(mut session) = self.session.take() {
            let flushed = session.writer.flush();
            log::info!(
                "recording `{}` saved: {} rows in {}",
                session.label,
                session.rows,
                session.path.display()
            );
            self.last_file = Some(session.path);
            flushed?;
        }
        Ok(())
    }
}
impl Drop for CsvRecorder {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            log::warn!("recording `{}` dropped without finalize", session.label);
            session.writer.flush().ok();
        }
    }
}
/// What a [`MemoryRecorder`] has seen so far.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryLog {
    pub opened: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub finalized: Vec<String>,
}
/// Keeps rows in memory behind a shared handle. Used for headless dry runs
/// and anywhere the rows need inspecting afterwards.
pub struct MemoryRecorder {
    log: Arc<Mutex<MemoryLog>>,
    open: Option<String>,
    append_limit: Option<usize>,
}
impl MemoryRecorder {
    pub fn new() -> (Self, Arc<Mutex<MemoryLog>>) {
        let log = Arc::new(Mutex::new(MemoryLog::default()));
        let recorder = Self {
            log: Arc::clone(&log),
            open: None,
            append_limit: None,
        };
        (recorder, log)
    }
    /// Makes every append after the first `limit` rows fail like a full disk.
    pub fn with_append_limit(mut self, limit: usize) -> Self {
        self.append_limit = Some(limit);
        self
    }
}
impl Recorder for MemoryRecorder {
    fn init_session(&mut self, label: &str) -> Result<(), PipelineError> {
        if let Some(open) = &self.open {
            return Err(PipelineError::AlreadyRecording(open.clone()));
        }
        self.log.lock().opened.push(label.to_owned());
        self.open = Some(label.to_owned());
        Ok(())
    }
    fn append(&mut self, row: &[f64]) -> Result<(), PipelineError> {
        if self.open.is_none() {
            return Err(PipelineError::NoSession);
        }
        let mut log = self.log.lock();
        if self.append_limit.map_or(false, |limit| log.rows.len() >= limit) {
            return Err(PipelineError::Io(io::Error::new(
                io::ErrorKind::Other,
                "no space left for recording",
            )));
        }
        log.rows.push(row.to_vec());
        Ok(())
    }
    fn finalize(&mut self, label: &str) -> Result<(), PipelineError> {
        match self.open.take() {
            Some(open) if open == label => {
                self.log.lock().finalized.push(open);
                Ok(())
            }
            Some(open) => {
                let err = PipelineError::SessionMismatch {
                    open: open.clone(),
                    requested: label.to_owned(),
                };
                self.open = Some(open);
                Err(err)
            }
            None => Err(PipelineError::NoSession),
        }
    }
}
/// One recorder plus the bookkeeping that guarantees each started session is
/// finalized exactly once, by whichever of stop-recording or teardown comes
/// first.
///
/// A failed append is latched: later rows are skipped and the error is
/// handed back when the session is finished.
///
/// While a drain loop owns the session, a control thread does not finish it
/// directly. It calls [`RecordingSession::request_stop`], the drain loop
/// appends whatever is still unread and calls
/// [`RecordingSession::complete_stop`], and the requester collects the result
/// with [`RecordingSession::take_stop_outcome`].
pub struct RecordingSession {
    recorder: Box<dyn Recorder>,
    active: Option<String>,
    failure: Option<PipelineError>,
    appended: u64,
    stop_requested: bool,
    stop_outcome: Option<Result<bool, PipelineError>>,
}
impl RecordingSession {
    pub fn new(recorder: Box<dyn Recorder>) -> Self {
        Self {
            recorder,
            active: None,
            failure: None,
            appended: 0,
            stop_requested: false,
            stop_outcome: None,
        }
    }
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
    pub fn label(&self) -> Option<&str> {
        self.active.as_deref()
    }
    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }
    /// Rows handed to the recorder in the current or last session.
    pub fn appended(&self) -> u64 {
        self.appended
    }
    pub fn start(&mut self, label: &str) -> Result<(), PipelineError> {
        if let Some(open) = &self.active {
            return Err(PipelineError::AlreadyRecording(open.clone()));
        }
        self.recorder.init_session(label)?;
        self.active = Some(label.to_owned());
        self.failure = None;
        self.appended = 0;
        self.stop_requested = false;
        self.stop_outcome = None;
        Ok(())
    }
    pub fn append(&mut self, row: &[f64]) {
        if self.active.is_none() || self.failure.is_some() {
            return;
        }
        match self.recorder.append(row) {
            Ok(()) => self.appended += 1,
            Err(err) => {
                log::warn!(
                    "recording append failed after {} rows, continuing without recording: {err}",
                    self.appended
                );
                self.failure = Some(err);
            }
        }
    }
    /// Finalizes the open session. `Ok(false)` means there was none.
    pub fn finish(&mut self) -> Result<bool, PipelineError> {
        self.stop_requested = false;
        let Some(label) = self.active.take() else {
            return Ok(false);
        };
        let finalized = self.recorder.finalize(&label);
        match self.failure.take() {
            Some(err) => {
                if let Err(also) = finalized {
                    log::warn!("finalize after failed append also failed: {also}");
                }
                Err(err)
            }
            None => finalized.map(|()| true),
        }
    }
    /// Marks the session for finishing by the drain loop. Returns false when
    /// nothing is being recorded.
    pub fn request_stop(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        self.stop_requested = true;
        self.stop_outcome = None;
        true
    }
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
    /// Finishes on behalf of a pending request and keeps the outcome for the
    /// requester.
    pub fn complete_stop(&mut self) {
        let outcome = self.finish();
        self.stop_outcome = Some(outcome);
    }
    pub fn take_stop_outcome(&mut self) -> Option<Result<bool, PipelineError>> {
        self.stop_outcome.take()
    }
}
