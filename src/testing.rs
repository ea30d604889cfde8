//! Scripted sort workers for renderer tests. Replies are delivered by hand so
//! tests decide exactly when a depth order arrives.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crate::error::WorkerError;
use crate::scene::Splat;
use crate::sort::{SortRequest, SortResponse, SortWorker, WorkerSpawner};

#[derive(Default)]
pub(crate) struct WorkerProbe {
    pub spawned: usize,
    pub posted: Vec<(usize, SortRequest)>,
    pub terminated: Vec<usize>,
    pub inboxes: Vec<VecDeque<SortResponse>>,
    pub fail_spawn: bool,
}

impl WorkerProbe {
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn deliver(&mut self, worker: usize, response: SortResponse) {
        self.inboxes[worker].push_back(response);
    }

    pub fn posted_by(&self, worker: usize) -> Vec<&SortRequest> {
        self.posted.iter().filter(|(id, _)| *id == worker).map(|(_, r)| r).collect()
    }
}

pub(crate) struct ScriptedSpawner {
    pub probe: Rc<RefCell<WorkerProbe>>,
}

impl ScriptedSpawner {
    pub fn new(probe: &Rc<RefCell<WorkerProbe>>) -> Self {
        Self { probe: probe.clone() }
    }
}

impl WorkerSpawner for ScriptedSpawner {
    type Worker = ScriptedWorker;

    fn spawn(&mut self) -> Result<ScriptedWorker, WorkerError> {
        let mut probe = self.probe.borrow_mut();
        if probe.fail_spawn {
            return Err(WorkerError::Spawn("scripted failure".to_string()));
        }
        let id = probe.spawned;
        probe.spawned += 1;
        probe.inboxes.push(VecDeque::new());
        Ok(ScriptedWorker {
            id,
            probe: self.probe.clone(),
            terminated: false,
        })
    }
}

pub(crate) struct ScriptedWorker {
    id: usize,
    probe: Rc<RefCell<WorkerProbe>>,
    terminated: bool,
}

impl SortWorker for ScriptedWorker {
    fn post(&mut self, request: SortRequest) -> Result<(), WorkerError> {
        if self.terminated {
            return Err(WorkerError::Terminated);
        }
        self.probe.borrow_mut().posted.push((self.id, request));
        Ok(())
    }

    fn try_recv(&mut self) -> Option<SortResponse> {
        if self.terminated {
            return None;
        }
        self.probe.borrow_mut().inboxes[self.id].pop_front()
    }

    fn terminate(&mut self) {
        if !self.terminated {
            self.terminated = true;
            self.probe.borrow_mut().terminated.push(self.id);
        }
    }
}

impl Drop for ScriptedWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// `count` unit splats spread along +X in front of the default camera.
pub(crate) fn row_of_splats(count: usize) -> Vec<Splat> {
    (0..count)
        .map(|i| Splat {
            position: Vec3::new(i as f32, 0.0, 0.0),
            scale: Vec3::splat(0.1),
            rotation: Quat::IDENTITY,
            color: [255, 128, 0, 255],
        })
        .collect()
}
