//! A small fixed-size pool of named OS threads fed from a crossbeam
//! channel. Dropping the pool closes the channel, drains what was already
//! queued and joins every thread.

use crossbeam::channel::{unbounded, Sender};
use std::thread::{Builder, JoinHandle};
use tracing::error;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(name: &str, thread_count: usize) -> Self {
        let (sender, receiver) = unbounded::<Job>();
        let mut threads = Vec::with_capacity(thread_count);
        for index in 0..thread_count {
            let receiver = receiver.clone();
            let spawned = Builder::new()
                .name(format!("{name} {index}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                })
                .inspect_err(|err| error!(error = %err, "Couldn't spawn worker thread"));
            if let Ok(handle) = spawned {
                threads.push(handle);
            }
        }
        assert!(!threads.is_empty(), "no worker threads could be spawned");
        Self {
            sender: Some(sender),
            threads,
        }
    }

    /// Queues a job. Jobs already queued when the pool is dropped still run.
    pub fn execute<F: FnOnce() + Send + 'static>(&self, job: F) {
        if let Some(sender) = &self.sender {
            // Receivers outlive the sender; send only fails after drop
            let _ = sender.send(Box::new(job));
        }
    }

    pub fn queued_jobs(&self) -> usize {
        self.sender.as_ref().map(Sender::len).unwrap_or(0)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}
