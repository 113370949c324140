//! Parallel batch inversion of a fractional signal raster.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mbsp::FractionalSignalRaster;
use plume_common::{PlumeError, PlumeResult, Raster, RasterShape, ValueRange};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::InversionConfig;
use crate::error::InversionError;
use crate::model::RadiativeTransferModel;
use crate::partition::partition;

/// One pixel of inversion work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelTask {
    /// Flat row-major index into the raster.
    pub index: usize,
    pub row: usize,
    pub col: usize,
    /// Fractional signal; `NaN` for masked cells.
    pub value: f32,
}

/// Column enhancement raster in mol/m².
#[derive(Debug, Clone, PartialEq)]
pub struct ConcentrationRaster {
    pub raster: Raster,
    /// Range over valid cells; `None` if no cell was inverted.
    pub range: Option<ValueRange>,
}

/// Dispatcher behaviour that is independent of the physics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchOptions {
    /// Global deadline for the whole batch. `None` waits for every worker.
    #[serde(default, with = "optional_millis")]
    pub timeout: Option<Duration>,
    /// Attempts per pixel before it is recorded as failed (>= 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_attempts: default_max_attempts(),
        }
    }
}

impl DispatchOptions {
    pub fn validate(&self) -> PlumeResult<()> {
        if self.max_attempts == 0 {
            return Err(PlumeError::invalid_input("max_attempts", "must be >= 1"));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(PlumeError::invalid_input("timeout", "must be > 0"));
        }
        Ok(())
    }
}

/// Outcome of a batch inversion.
///
/// Callers always get a raster of the input's shape. When `incomplete` is
/// set, some cells were never processed and hold `NaN`.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub concentration: ConcentrationRaster,
    /// Cells inverted successfully.
    pub inverted: usize,
    /// Cells masked in the input, passed through without inversion.
    pub masked: usize,
    /// Cells whose inversion failed after every attempt.
    pub failed: usize,
    /// Cells no worker reported before the deadline.
    pub unprocessed: usize,
    /// Pixels that needed more than one attempt.
    pub retried: usize,
    /// (row, col) of every failed cell, row-major order.
    pub failed_cells: Vec<(usize, usize)>,
    /// Set when the global timeout fired.
    pub timed_out: bool,
    /// Set when any cell was left unprocessed.
    pub incomplete: bool,
    /// Workers actually used, at most one per cell.
    pub workers: usize,
    pub elapsed: Duration,
}

enum PixelOutcome {
    Inverted { column: f64, attempts: u32 },
    Masked,
    Failed { error: InversionError, attempts: u32 },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CellState {
    Pending,
    Done,
}

/// Runs a radiative-transfer model over every pixel of a signal raster.
pub struct Dispatcher {
    model: Arc<dyn RadiativeTransferModel>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(model: Arc<dyn RadiativeTransferModel>, options: DispatchOptions) -> Self {
        Self { model, options }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Invert `signal` with `worker_count` parallel workers.
    ///
    /// No more workers are spawned than there are cells; the effective count
    /// is reported in [`DispatchReport::workers`].
    ///
    /// Configuration errors fail before any work starts. Per-pixel failures
    /// and the global timeout are reported in the returned [`DispatchReport`].
    pub async fn dispatch(
        &self,
        signal: &FractionalSignalRaster,
        config: InversionConfig,
        worker_count: usize,
    ) -> PlumeResult<DispatchReport> {
        if worker_count == 0 {
            return Err(PlumeError::invalid_input("worker_count", "must be >= 1"));
        }
        config.validate()?;
        self.options.validate()?;

        let started = Instant::now();
        let shape = signal.raster.shape;
        let tasks: Arc<[PixelTask]> = build_tasks(&signal.raster).into();
        let worker_count = worker_count.min(tasks.len().max(1));
        let partitions = partition(tasks.len(), worker_count);

        info!(
            shape = %shape,
            tasks = tasks.len(),
            workers = worker_count,
            instrument = %config.instrument,
            method = %config.method,
            timeout_ms = self.options.timeout.map(|t| t.as_millis() as u64),
            "Dispatching inversion batch"
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, PixelOutcome)>();
        let mut handles = Vec::with_capacity(partitions.len());

        for (worker_id, range) in partitions.into_iter().enumerate() {
            if range.is_empty() {
                continue;
            }
            let worker = Worker {
                id: worker_id,
                tasks: Arc::clone(&tasks),
                range,
                model: Arc::clone(&self.model),
                config,
                max_attempts: self.options.max_attempts,
                cancel: Arc::clone(&cancel),
                tx: tx.clone(),
            };
            handles.push(tokio::task::spawn_blocking(move || worker.run()));
        }
        // Workers hold the only senders; the channel closes once they all exit.
        drop(tx);

        let mut assembly = Assembly::new(shape);
        let deadline = self.options.timeout.map(|t| started + t);
        let mut timed_out = false;

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(msg) => msg,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                },
                None => rx.recv().await,
            };

            match next {
                Some((index, outcome)) => assembly.record(index, outcome),
                None => break,
            }
        }

        if timed_out {
            cancel.store(true, Ordering::Release);
            // Keep whatever was finished before the deadline.
            while let Ok((index, outcome)) = rx.try_recv() {
                assembly.record(index, outcome);
            }
            metrics::counter!("dispatch_timeouts_total").increment(1);
            warn!(
                pending = assembly.pending(),
                "Inversion batch timed out; returning partial raster"
            );
        } else {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "Inversion worker aborted");
                }
            }
        }

        let report = assembly.finish(
            signal.raster.resolution_m,
            worker_count,
            timed_out,
            started.elapsed(),
        );

        metrics::counter!("inversion_pixels_total").increment(report.inverted as u64);
        metrics::counter!("inversion_failures_total").increment(report.failed as u64);
        metrics::histogram!("dispatch_duration_ms").record(report.elapsed.as_secs_f64() * 1000.0);

        info!(
            inverted = report.inverted,
            masked = report.masked,
            failed = report.failed,
            unprocessed = report.unprocessed,
            incomplete = report.incomplete,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Inversion batch finished"
        );

        Ok(report)
    }
}

/// Row-major task arena for every cell of the raster.
fn build_tasks(raster: &Raster) -> Vec<PixelTask> {
    let cols = raster.shape.cols;
    raster
        .data
        .iter()
        .enumerate()
        .map(|(index, &value)| PixelTask {
            index,
            row: index / cols,
            col: index % cols,
            value,
        })
        .collect()
}

struct Worker {
    id: usize,
    tasks: Arc<[PixelTask]>,
    range: Range<usize>,
    model: Arc<dyn RadiativeTransferModel>,
    config: InversionConfig,
    max_attempts: u32,
    cancel: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<(usize, PixelOutcome)>,
}

impl Worker {
    fn run(self) {
        debug!(
            worker = self.id,
            start = self.range.start,
            end = self.range.end,
            "Worker started"
        );

        let mut processed = 0usize;
        for task in &self.tasks[self.range.clone()] {
            if self.cancel.load(Ordering::Acquire) {
                debug!(worker = self.id, processed, "Worker cancelled");
                return;
            }

            let outcome = self.invert(task);
            if self.tx.send((task.index, outcome)).is_err() {
                // Receiver gone: the dispatcher has already returned.
                return;
            }
            processed += 1;
        }

        debug!(worker = self.id, processed, "Worker finished");
    }

    fn invert(&self, task: &PixelTask) -> PixelOutcome {
        if !task.value.is_finite() {
            return PixelOutcome::Masked;
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.model.retrieve(task.value as f64, &self.config) {
                Ok(column) => return PixelOutcome::Inverted { column, attempts },
                Err(error) if attempts >= self.max_attempts => {
                    return PixelOutcome::Failed { error, attempts };
                }
                Err(error) => {
                    debug!(
                        worker = self.id,
                        row = task.row,
                        col = task.col,
                        attempt = attempts,
                        error = %error,
                        "Retrying pixel inversion"
                    );
                }
            }
        }
    }
}

/// Output buffer written by flat index, so the result never depends on the
/// order workers report in.
struct Assembly {
    shape: RasterShape,
    data: Vec<f32>,
    state: Vec<CellState>,
    inverted: usize,
    masked: usize,
    retried: usize,
    failed_cells: Vec<(usize, usize)>,
}

impl Assembly {
    fn new(shape: RasterShape) -> Self {
        Self {
            shape,
            data: vec![f32::NAN; shape.len()],
            state: vec![CellState::Pending; shape.len()],
            inverted: 0,
            masked: 0,
            retried: 0,
            failed_cells: Vec::new(),
        }
    }

    fn record(&mut self, index: usize, outcome: PixelOutcome) {
        debug_assert!(self.state[index] == CellState::Pending, "cell {} written twice", index);
        self.state[index] = CellState::Done;

        match outcome {
            PixelOutcome::Inverted { column, attempts } => {
                self.data[index] = column as f32;
                self.inverted += 1;
                if attempts > 1 {
                    self.retried += 1;
                }
            }
            PixelOutcome::Masked => self.masked += 1,
            PixelOutcome::Failed { error, attempts } => {
                let (row, col) = (index / self.shape.cols, index % self.shape.cols);
                if attempts > 1 {
                    self.retried += 1;
                }
                debug!(row, col, attempts, error = %error, "Pixel inversion failed");
                self.failed_cells.push((row, col));
            }
        }
    }

    fn pending(&self) -> usize {
        self.state.iter().filter(|s| **s == CellState::Pending).count()
    }

    fn finish(
        mut self,
        resolution_m: f64,
        workers: usize,
        timed_out: bool,
        elapsed: Duration,
    ) -> DispatchReport {
        let unprocessed = self.pending();
        self.failed_cells.sort_unstable();

        let raster = Raster {
            shape: self.shape,
            resolution_m,
            data: self.data,
        };
        let range = raster.value_range();

        DispatchReport {
            concentration: ConcentrationRaster { raster, range },
            inverted: self.inverted,
            masked: self.masked,
            failed: self.failed_cells.len(),
            unprocessed,
            retried: self.retried,
            failed_cells: self.failed_cells,
            timed_out,
            incomplete: timed_out || unprocessed > 0,
            workers,
            elapsed,
        }
    }
}

mod optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
