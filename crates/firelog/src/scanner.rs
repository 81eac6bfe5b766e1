//! Scan sessions over barcode reader devices.
//!
//! Most handheld readers are keyboard wedges or serial devices that emit one
//! decoded code per line, so both sources here are line readers:
//!
//! - [`LineSource`] over any buffered reader, usually stdin.
//! - [`DeviceSource`] over a device node or file path.
//!
//! A [`ScanSession`] opens a source and reads it on a background task,
//! forwarding normalized codes over a channel. The opened device is owned by
//! a guard inside that task, so it is released exactly once however the
//! session ends: end of stream, a read error, [`ScanSession::close`], or the
//! session being dropped.

use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::barcode;
use crate::error::{Error, Result};

/// Codes buffered between the reader task and the consumer.
const CHANNEL_CAPACITY: usize = 32;

/// A device that yields decoded barcodes.
#[async_trait::async_trait]
pub trait ScanSource: Send + 'static {
    /// Human-readable device name for logs and errors.
    fn name(&self) -> String;

    /// Acquire the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScannerUnavailable`] if there is no device or access
    /// is denied.
    async fn open(&mut self) -> Result<()>;

    /// The next raw code, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the device fails.
    async fn next_code(&mut self) -> Result<Option<String>>;

    /// Free the device. Called once for every successful [`open`](Self::open).
    fn release(&mut self);
}

/// Line-per-code source over a blocking reader.
///
/// Lines are read on a dedicated thread, not the runtime's blocking pool. A
/// read on a terminal or device node only returns when input arrives, and a
/// pending one must not keep the runtime from shutting down. Releasing the
/// source disconnects the thread, which exits at its next line or with the
/// process.
pub struct LineSource {
    label: String,
    reader: Option<Box<dyn BufRead + Send>>,
    lines: Option<mpsc::Receiver<io::Result<String>>>,
}

impl LineSource {
    /// Read codes from `reader`, naming it `label` in logs.
    pub fn new(reader: impl BufRead + Send + 'static, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            reader: Some(Box::new(reader)),
            lines: None,
        }
    }

    /// Read codes typed by a keyboard-wedge reader on stdin.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()), "stdin")
    }
}

impl fmt::Debug for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineSource")
            .field("label", &self.label)
            .field("reading", &self.lines.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ScanSource for LineSource {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn open(&mut self) -> Result<()> {
        let Some(reader) = self.reader.take() else {
            return Err(Error::scanner_unavailable(&self.label, "already released"));
        };
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        thread::Builder::new()
            .name(format!("scan-{}", self.label))
            .spawn(move || read_lines(reader, &tx))
            .map_err(|e| Error::scanner_unavailable(&self.label, e.to_string()))?;
        self.lines = Some(rx);
        Ok(())
    }

    async fn next_code(&mut self) -> Result<Option<String>> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };
        match lines.recv().await {
            Some(line) => Ok(Some(line?)),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.reader = None;
        self.lines = None;
    }
}

fn read_lines(mut reader: Box<dyn BufRead + Send>, tx: &mpsc::Sender<io::Result<String>>) {
    let mut line = String::new();
    loop {
        line.clear();
        let next = match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => Ok(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => Err(e),
        };
        let failed = next.is_err();
        // A closed channel means the source was released.
        if tx.blocking_send(next).is_err() || failed {
            return;
        }
    }
}

/// Source reading a device node such as `/dev/hidraw0` or a serial port.
#[derive(Debug)]
pub struct DeviceSource {
    path: PathBuf,
    inner: Option<LineSource>,
}

impl DeviceSource {
    /// A source for the device at `path`. Nothing is opened yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            inner: None,
        }
    }

    /// The device path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl ScanSource for DeviceSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn open(&mut self) -> Result<()> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| Error::scanner_unavailable(self.name(), e.to_string()))?
            .into_std()
            .await;
        let mut lines = LineSource::new(BufReader::new(file), self.name());
        lines.open().await?;
        self.inner = Some(lines);
        Ok(())
    }

    async fn next_code(&mut self) -> Result<Option<String>> {
        match self.inner.as_mut() {
            Some(lines) => lines.next_code().await,
            None => Err(Error::internal("scan device read before open")),
        }
    }

    fn release(&mut self) {
        // Dropping the reader closes the file descriptor.
        if let Some(mut lines) = self.inner.take() {
            lines.release();
        }
    }
}

/// An opened source; releases it when dropped.
struct Opened<S: ScanSource> {
    source: S,
}

impl<S: ScanSource> Drop for Opened<S> {
    fn drop(&mut self) {
        self.source.release();
        info!("Released scan device {}", self.source.name());
    }
}

/// A running scan session.
#[derive(Debug)]
pub struct ScanSession {
    device: String,
    codes: mpsc::Receiver<String>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<()>>>,
}

impl ScanSession {
    /// Open `source` and start reading it in the background.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScannerUnavailable`] if the device cannot be opened.
    /// Nothing is left to release in that case.
    pub async fn start<S: ScanSource>(mut source: S) -> Result<Self> {
        let device = source.name();
        source.open().await?;
        info!("Scan session started on {}", device);

        let opened = Opened { source };
        let (tx, codes) = mpsc::channel(CHANNEL_CAPACITY);
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(read_codes(opened, tx, stop_rx));

        Ok(Self {
            device,
            codes,
            stop: Some(stop),
            task: Some(task),
        })
    }

    /// The device this session reads.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Wait for the next normalized code. `None` once the session has ended.
    pub async fn next(&mut self) -> Option<String> {
        self.codes.recv().await
    }

    /// Stop reading, release the device and wait for the reader to finish.
    ///
    /// # Errors
    ///
    /// Returns the read error that ended the session early, if any.
    pub async fn close(mut self) -> Result<()> {
        self.codes.close();
        if let Some(stop) = self.stop.take() {
            // The reader may already have finished.
            let _ = stop.send(());
        }
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        let outcome = task
            .await
            .map_err(|e| Error::internal(format!("scan task failed: {e}")))?;
        info!("Scan session on {} closed", self.device);
        outcome
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Scan session on {} dropped; aborting reader", self.device);
            task.abort();
        }
    }
}

async fn read_codes<S: ScanSource>(
    mut opened: Opened<S>,
    tx: mpsc::Sender<String>,
    mut stop: oneshot::Receiver<()>,
) -> Result<()> {
    loop {
        let raw = tokio::select! {
            biased;
            _ = &mut stop => return Ok(()),
            next = opened.source.next_code() => match next {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    debug!("Scan device {} reached end of stream", opened.source.name());
                    return Ok(());
                }
                Err(e) => {
                    warn!("Reading {} failed: {}", opened.source.name(), e);
                    return Err(e);
                }
            },
        };

        // Readers emit blank lines on misreads.
        let Ok(code) = barcode::normalize(&raw) else {
            continue;
        };
        debug!("Scanned {}", code);
        if tx.send(code).await.is_err() {
            return Ok(());
        }
    }
}
