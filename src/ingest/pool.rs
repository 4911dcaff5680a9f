use std::thread::JoinHandle;

use crossbeam_channel::{select, unbounded, Receiver, Sender, TryRecvError};

use crate::error::Result;
use crate::series::Sample;

use super::decode::decode_records;

/// Output of one decode job, tagged with its dispatch sequence number.
#[derive(Debug)]
pub struct DecodedBatch {
    pub seq: u64,
    pub samples: Vec<Sample>,
}

struct Job {
    seq: u64,
    blob: Vec<u8>,
}

/// Round-robin pool of stateless decode workers.
///
/// Blobs are moved into a worker's queue and batches come back over one
/// shared channel, so nothing is shared between threads but the channels.
/// Batches arrive in completion order, which can differ from dispatch order
/// across workers. Queues are unbounded.
pub struct DecoderPool {
    senders: Vec<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    results: Receiver<DecodedBatch>,
    /// Never sent on. Dropping it disconnects every worker's shutdown arm.
    shutdown: Option<Sender<()>>,
    next_worker: usize,
    next_seq: u64,
    /// Dispatched but not yet collected.
    in_flight: usize,
}

impl DecoderPool {
    pub fn new(workers: usize) -> Result<Self> {
        let (result_tx, results) = unbounded();
        let (shutdown_tx, shutdown_rx) = unbounded::<()>();
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let (job_tx, job_rx) = unbounded::<Job>();
            let result_tx = result_tx.clone();
            let shutdown_rx = shutdown_rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("decode-{id}"))
                .spawn(move || worker_loop(job_rx, result_tx, shutdown_rx))?;
            senders.push(job_tx);
            handles.push(handle);
        }

        Ok(Self {
            senders,
            handles,
            results,
            shutdown: Some(shutdown_tx),
            next_worker: 0,
            next_seq: 0,
            in_flight: 0,
        })
    }

    /// Hand a blob to the next worker and return its sequence number.
    ///
    /// A sequence number is only consumed when the worker accepted the job,
    /// so strict reordering never waits on a blob that was dropped here.
    pub fn dispatch(&mut self, blob: Vec<u8>) -> Option<u64> {
        let seq = self.next_seq;
        let worker = self.next_worker;
        self.next_worker = (self.next_worker + 1) % self.senders.len();

        if self.senders[worker].send(Job { seq, blob }).is_err() {
            log::warn!("Decode worker {worker} is gone, dropping blob");
            return None;
        }
        self.next_seq += 1;
        self.in_flight += 1;
        Some(seq)
    }

    /// Take a sequence number for samples that bypass the workers, so they
    /// can be ordered against decoded blobs.
    pub fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Collect every batch that has finished, without blocking.
    pub fn drain_ready(&mut self, out: &mut Vec<DecodedBatch>) {
        for batch in self.results.try_iter() {
            self.in_flight = self.in_flight.saturating_sub(1);
            out.push(batch);
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// Signal every worker and join them. Jobs still queued are discarded.
    fn stop_workers(&mut self) {
        drop(self.shutdown.take());
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }

    /// Block until everything dispatched has been collected.
    #[cfg(test)]
    pub fn wait_all(&mut self, out: &mut Vec<DecodedBatch>) {
        let timeout = std::time::Duration::from_secs(5);
        while self.in_flight > 0 {
            match self.results.recv_timeout(timeout) {
                Ok(batch) => {
                    self.in_flight -= 1;
                    out.push(batch);
                }
                Err(e) => panic!("decode worker stalled: {e}"),
            }
        }
    }
}

fn worker_loop(jobs: Receiver<Job>, results: Sender<DecodedBatch>, shutdown: Receiver<()>) {
    loop {
        // Queued jobs are discarded once shutdown starts.
        if let Err(TryRecvError::Disconnected) = shutdown.try_recv() {
            break;
        }
        let job = select! {
            recv(shutdown) -> _ => break,
            recv(jobs) -> job => match job {
                Ok(job) => job,
                Err(_) => break,
            },
        };
        let samples = decode_records(&job.blob);
        if results.send(DecodedBatch { seq: job.seq, samples }).is_err() {
            break;
        }
    }
}

impl Drop for DecoderPool {
    fn drop(&mut self) {
        self.stop_workers();
        self.senders.clear();
        if self.in_flight > 0 {
            log::debug!("Decoder pool shut down with {} blobs pending", self.in_flight);
        }
    }
}
