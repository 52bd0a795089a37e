//! Background task runner - one worker thread per request, polled from the game loop
//!
//! The worker owns everything it needs and hands back exactly one value through
//! a bounded channel. The main thread never blocks while polling.

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::io;
use std::thread::{self, JoinHandle};

/// Answer to a request to start background work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Started,
    /// Another task of the same kind is in flight; nothing was started
    AlreadyRunning,
}

/// State of a task (or task slot) as seen from the main thread
#[derive(Debug)]
pub enum TaskPoll<T> {
    /// No task in the slot
    Idle,
    Pending,
    Finished(T),
    /// The worker exited without delivering a result (it panicked)
    Lost,
}

/// A single piece of work running on its own thread
pub struct BackgroundTask<T> {
    name: String,
    receiver: Receiver<T>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Spawn `job` on a named worker thread
    pub fn spawn<F>(name: &str, job: F) -> io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = bounded(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let result = job();
                // Receiver gone means the owner was dropped; nobody wants the result
                let _ = sender.send(result);
            })?;

        log::debug!("Spawned background task '{}'", name);

        Ok(Self {
            name: name.to_string(),
            receiver,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking check for completion
    pub fn poll(&mut self) -> TaskPoll<T> {
        match self.receiver.try_recv() {
            Ok(result) => {
                self.join();
                TaskPoll::Finished(result)
            }
            Err(TryRecvError::Empty) => TaskPoll::Pending,
            Err(TryRecvError::Disconnected) => {
                self.join();
                TaskPoll::Lost
            }
        }
    }

    /// Block until the worker delivers; `None` if it died first
    pub fn wait(mut self) -> Option<T> {
        let result = self.receiver.recv().ok();
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Background task '{}' panicked", self.name);
            }
        }
    }
}

/// Holds at most one in-flight task of a kind
pub struct TaskSlot<T> {
    task: Option<BackgroundTask<T>>,
}

impl<T> Default for TaskSlot<T> {
    fn default() -> Self {
        Self { task: None }
    }
}

impl<T: Send + 'static> TaskSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Start `job` unless a task already occupies the slot
    pub fn try_start<F>(&mut self, name: &str, job: F) -> io::Result<RequestStatus>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        if let Some(running) = &self.task {
            log::debug!(
                "Background task '{}' still running, not starting '{}'",
                running.name(),
                name
            );
            return Ok(RequestStatus::AlreadyRunning);
        }

        self.task = Some(BackgroundTask::spawn(name, job)?);
        Ok(RequestStatus::Started)
    }

    /// Poll the running task; the slot empties once it finishes or is lost
    pub fn poll(&mut self) -> TaskPoll<T> {
        let Some(task) = self.task.as_mut() else {
            return TaskPoll::Idle;
        };

        match task.poll() {
            TaskPoll::Pending => TaskPoll::Pending,
            done => {
                self.task = None;
                done
            }
        }
    }

    /// Block until the running task completes
    pub fn wait(&mut self) -> TaskPoll<T> {
        match self.task.take() {
            None => TaskPoll::Idle,
            Some(task) => match task.wait() {
                Some(result) => TaskPoll::Finished(result),
                None => TaskPoll::Lost,
            },
        }
    }
}
