// Asynchronous spawn loads.
// Requests go to a worker thread that runs the asset loader; finished loads
// come back on a second channel and are collected between ticks, so a slow
// load never stalls the frame.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::assets::{AssetLoader, LoadedModel, ModelEntry};
use super::error::LoadError;

/// Identifies one queued load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub u64);

struct LoadRequest {
    ticket: Ticket,
    entry: ModelEntry,
}

#[derive(Debug)]
pub struct LoadResult {
    pub ticket: Ticket,
    pub key: String,
    pub result: Result<LoadedModel, LoadError>,
}

pub struct LoaderQueue {
    requests: Option<Sender<LoadRequest>>,
    results: Receiver<LoadResult>,
    worker: Option<JoinHandle<()>>,
    next_ticket: u64,
    in_flight: usize,
}

impl LoaderQueue {
    pub fn spawn(loader: Arc<dyn AssetLoader>) -> std::io::Result<Self> {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();
        let (result_tx, result_rx) = unbounded::<LoadResult>();

        let worker = std::thread::Builder::new().name("asset-loader".into()).spawn(move || {
            for LoadRequest { ticket, entry } in request_rx {
                let result = loader.load(&entry);
                if result_tx.send(LoadResult { ticket, key: entry.key, result }).is_err() {
                    break;
                }
            }
        })?;

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            worker: Some(worker),
            next_ticket: 0,
            in_flight: 0,
        })
    }

    /// Queue a load. The result shows up in a later `drain`.
    pub fn request(&mut self, entry: ModelEntry) -> Option<Ticket> {
        let ticket = Ticket(self.next_ticket);
        let key = entry.key.clone();
        let sent = self
            .requests
            .as_ref()
            .is_some_and(|tx| tx.send(LoadRequest { ticket, entry }).is_ok());
        if !sent {
            log::warn!("asset loader has stopped; spawn of {key} dropped");
            return None;
        }
        self.next_ticket += 1;
        self.in_flight += 1;
        log::debug!("queued load {} for {key}", ticket.0);
        Some(ticket)
    }

    /// Everything finished since the last call, without waiting.
    pub fn drain(&mut self) -> Vec<LoadResult> {
        let done: Vec<LoadResult> = self.results.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    /// Wait up to `timeout` for every in-flight load to finish.
    pub fn drain_blocking(&mut self, timeout: Duration) -> Vec<LoadResult> {
        let deadline = Instant::now() + timeout;
        let mut done = Vec::new();
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(result) => {
                    self.in_flight -= 1;
                    done.push(result);
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!("{} loads still pending after {timeout:?}", self.in_flight);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("asset loader exited with {} loads pending", self.in_flight);
                    self.in_flight = 0;
                    break;
                }
            }
        }
        done
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

impl Drop for LoaderQueue {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("asset loader thread panicked");
            }
        }
    }
}
