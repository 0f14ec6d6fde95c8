use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::catalog::CatalogRecord;
use crate::error::WorkerError;
use crate::pipeline::{ItemProcessor, Stage};
use crate::worker::job::{process_guarded, ProcessingResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed set of named worker threads fed through bounded channels.
pub struct WorkerPool {
    job_sender: Sender<CatalogRecord>,
    result_receiver: Receiver<ProcessingResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(processor: Arc<dyn ItemProcessor>, worker_count: usize) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }
        let (job_sender, job_receiver) = bounded::<CatalogRecord>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<ProcessingResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_processor = Arc::clone(&processor);

            let handle = thread::Builder::new()
                .name(format!("lrenrich-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, job_rx, result_tx, shutdown_flag, worker_processor);
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Processes every record and returns exactly one result per record, in
    /// completion order.
    ///
    /// Submission and collection are interleaved so the bounded channels
    /// never deadlock. Records whose result cannot arrive any more (workers
    /// gone) are reported as failed.
    pub fn run_batch(&self, records: &[CatalogRecord]) -> Vec<ProcessingResult> {
        let mut pending: VecDeque<&CatalogRecord> = records.iter().collect();
        let mut in_flight: HashMap<i64, Vec<&CatalogRecord>> = HashMap::new();
        let mut results = Vec::with_capacity(records.len());

        while results.len() < records.len() {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            let mut closed = false;
            while let Some(&record) = pending.front() {
                match self.job_sender.try_send(record.clone()) {
                    Ok(()) => {
                        in_flight.entry(record.record_id).or_default().push(record);
                        pending.pop_front();
                    }
                    Err(TrySendError::Full(_)) => break,
                    Err(TrySendError::Disconnected(_)) => {
                        closed = true;
                        break;
                    }
                }
            }
            if closed {
                break;
            }

            match self.result_receiver.recv_timeout(POLL_INTERVAL) {
                Ok(result) => {
                    if let Some(waiting) = in_flight.get_mut(&result.record_id) {
                        waiting.pop();
                        if waiting.is_empty() {
                            in_flight.remove(&result.record_id);
                        }
                    }
                    results.push(result);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.workers.iter().all(JoinHandle::is_finished) {
                        warn!("All workers stopped with results outstanding");
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let missing: Vec<&CatalogRecord> = in_flight
            .into_values()
            .flatten()
            .chain(pending)
            .collect();
        for record in missing {
            results.push(ProcessingResult::failure(
                record,
                Stage::Exception,
                WorkerError::ChannelClosed.to_string(),
            ));
        }
        results
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<CatalogRecord>,
    result_sender: Sender<ProcessingResult>,
    shutdown: Arc<AtomicBool>,
    processor: Arc<dyn ItemProcessor>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(POLL_INTERVAL) {
            Ok(record) => {
                debug!("Worker {} processing record {}", worker_id, record.record_id);
                let result = process_guarded(processor.as_ref(), &record);

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
