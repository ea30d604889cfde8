//! Browser sort worker. Requests go out through `serde-wasm-bindgen`; the
//! `depthIndex` reply is read as a typed array so large orders are not walked
//! element by element through serde.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use js_sys::{Reflect, Uint32Array};
use serde_wasm_bindgen::to_value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{MessageEvent, Worker, WorkerOptions, WorkerType};

use super::{SortRequest, SortResponse, SortWorker, WorkerSpawner};
use crate::error::WorkerError;

pub struct WebWorkerSpawner {
    script_url: String,
}

impl WebWorkerSpawner {
    pub fn new(script_url: impl Into<String>) -> Self {
        Self { script_url: script_url.into() }
    }
}

impl WorkerSpawner for WebWorkerSpawner {
    type Worker = WebWorker;

    fn spawn(&mut self) -> Result<WebWorker, WorkerError> {
        WebWorker::new(&self.script_url)
    }
}

pub struct WebWorker {
    worker: Option<Worker>,
    inbox: Rc<RefCell<VecDeque<SortResponse>>>,
    on_message_handler: Option<Closure<dyn FnMut(MessageEvent)>>,
}

fn parse_response(data: &JsValue) -> Option<SortResponse> {
    let indices = Reflect::get(data, &JsValue::from_str("depthIndex")).ok()?;
    if indices.is_undefined() || indices.is_null() {
        return None;
    }
    Some(SortResponse::SortedIndices(Uint32Array::new(&indices).to_vec()))
}

impl WebWorker {
    pub fn new(script_url: &str) -> Result<Self, WorkerError> {
        // The sort script imports the wasm package, so it must be a module worker.
        let options = WorkerOptions::new();
        options.set_type(WorkerType::Module);
        let worker =
            Worker::new_with_options(script_url, &options).map_err(|e| WorkerError::Spawn(format!("{e:?}")))?;
        let inbox = Rc::new(RefCell::new(VecDeque::new()));

        let queue = inbox.clone();
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            match parse_response(&event.data()) {
                Some(response) => queue.borrow_mut().push_back(response),
                None => log::warn!("ignoring unexpected sort worker message"),
            }
        });
        worker.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        log::debug!("spawned sort worker from {script_url}");
        Ok(Self {
            worker: Some(worker),
            inbox,
            on_message_handler: Some(on_message),
        })
    }
}

impl SortWorker for WebWorker {
    fn post(&mut self, request: SortRequest) -> Result<(), WorkerError> {
        let worker = self.worker.as_ref().ok_or(WorkerError::Terminated)?;
        let message = to_value(&request).map_err(|e| WorkerError::Post(e.to_string()))?;
        worker
            .post_message(&message)
            .map_err(|e| WorkerError::Post(format!("{e:?}")))
    }

    fn try_recv(&mut self) -> Option<SortResponse> {
        self.worker.as_ref()?;
        self.inbox.borrow_mut().pop_front()
    }

    fn terminate(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.set_onmessage(None);
            worker.terminate();
            log::debug!("terminated sort worker");
        }
        self.inbox.borrow_mut().clear();
        self.on_message_handler = None;
    }
}

impl Drop for WebWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}
