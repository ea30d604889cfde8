//! Native sort worker on a background thread, fed over `std::sync::mpsc`.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use super::{DepthSorter, SortRequest, SortResponse, SortWorker, WorkerSpawner};
use crate::error::WorkerError;

#[derive(Default)]
pub struct ThreadSpawner {
    spawned: usize,
}

impl ThreadSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawned(&self) -> usize {
        self.spawned
    }
}

impl WorkerSpawner for ThreadSpawner {
    type Worker = ThreadWorker;

    fn spawn(&mut self) -> Result<ThreadWorker, WorkerError> {
        let worker = ThreadWorker::spawn(&format!("wsplat-sort-{}", self.spawned))?;
        self.spawned += 1;
        Ok(worker)
    }
}

pub struct ThreadWorker {
    requests: Option<Sender<SortRequest>>,
    responses: Option<Receiver<SortResponse>>,
}

impl ThreadWorker {
    pub fn spawn(name: &str) -> Result<Self, WorkerError> {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(request_rx, response_tx))
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        log::debug!("spawned sort thread {name}");
        Ok(Self {
            requests: Some(request_tx),
            responses: Some(response_rx),
        })
    }

    /// Blocks up to `timeout` for the next reply.
    pub fn wait(&mut self, timeout: Duration) -> Option<SortResponse> {
        match self.responses.as_ref()?.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.responses = None;
                None
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.requests.is_none()
    }
}

impl SortWorker for ThreadWorker {
    fn post(&mut self, request: SortRequest) -> Result<(), WorkerError> {
        let sender = self.requests.as_ref().ok_or(WorkerError::Terminated)?;
        sender.send(request).map_err(|_| WorkerError::Terminated)
    }

    fn try_recv(&mut self) -> Option<SortResponse> {
        match self.responses.as_ref()?.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.responses = None;
                None
            }
        }
    }

    fn terminate(&mut self) {
        // Dropping both ends stops the thread after its current sort.
        if self.requests.take().is_some() {
            log::debug!("terminating sort thread");
        }
        self.responses = None;
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn run(requests: Receiver<SortRequest>, responses: Sender<SortResponse>) {
    let mut sorter = DepthSorter::new();

    while let Ok(first) = requests.recv() {
        // Coalesce: apply queued scene loads, keep only the newest view.
        let mut view_proj = None;
        for request in std::iter::once(first).chain(requests.try_iter()) {
            match request {
                SortRequest::LoadScene(scene) => sorter.load(scene),
                SortRequest::UpdateViewProj(m) => view_proj = Some(m),
            }
        }

        let Some(view_proj) = view_proj else { continue };
        if let Some(order) = sorter.sort(&view_proj) {
            if responses.send(SortResponse::SortedIndices(order)).is_err() {
                break;
            }
        }
    }
    log::trace!("sort thread exiting");
}
