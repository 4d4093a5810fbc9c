//! UI-thread task queue.
//!
//! [`UiTaskQueue`] is created on the UI thread and stays there. It hands
//! out a [`UiTaskRunner`] that any thread may use to post closures; the
//! UI thread drains them in arrival order with
//! [`run_pending`](UiTaskQueue::run_pending) from its event loop.

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::trace;

/// A unit of work posted to another thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that executes tasks on one particular thread.
pub trait TaskRunner: Send + Sync {
    /// Whether the calling thread is the one tasks run on.
    fn belongs_to_current_thread(&self) -> bool;

    /// Queue `task`. Never blocks; tasks run in the order they arrive.
    fn post_task(&self, task: Task);
}

// ── UiTaskRunner ─────────────────────────────────────────────────

/// Posting handle for a [`UiTaskQueue`].
#[derive(Debug)]
pub struct UiTaskRunner {
    thread: ThreadId,
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskRunner for UiTaskRunner {
    fn belongs_to_current_thread(&self) -> bool {
        thread::current().id() == self.thread
    }

    fn post_task(&self, task: Task) {
        if self.tx.send(task).is_err() {
            // The UI loop is gone; dropping the task is all that is left.
            trace!("UI task queue closed, task dropped");
        }
    }
}

// ── UiTaskQueue ──────────────────────────────────────────────────

/// Receiving end, confined to the thread that created it.
pub struct UiTaskQueue {
    runner: Arc<UiTaskRunner>,
    rx: mpsc::UnboundedReceiver<Task>,
    _not_send: PhantomData<*const ()>,
}

impl Default for UiTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UiTaskQueue {
    /// Bind a new queue to the calling thread.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            runner: Arc::new(UiTaskRunner {
                thread: thread::current().id(),
                tx,
            }),
            rx,
            _not_send: PhantomData,
        }
    }

    /// A cloneable handle for posting from any thread.
    pub fn runner(&self) -> Arc<UiTaskRunner> {
        Arc::clone(&self.runner)
    }

    /// Run every task that is queued right now. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait for one task and run it.
    ///
    /// Must not be called from inside an async runtime.
    pub fn run_one_blocking(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Keep draining until `deadline` or until `done` returns true,
    /// yielding briefly between rounds.
    pub fn run_until(&mut self, deadline: Instant, mut done: impl FnMut() -> bool) -> usize {
        let mut ran = 0;
        loop {
            ran += self.run_pending();
            if done() || Instant::now() >= deadline {
                return ran;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn belongs_only_to_creating_thread() {
        let queue = UiTaskQueue::new();
        let runner = queue.runner();
        assert!(runner.belongs_to_current_thread());

        let elsewhere = thread::spawn(move || runner.belongs_to_current_thread())
            .join()
            .unwrap();
        assert!(!elsewhere);
    }

    #[test]
    fn tasks_run_in_post_order() {
        let mut queue = UiTaskQueue::new();
        let runner = queue.runner();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let log = Arc::clone(&log);
            runner.post_task(Box::new(move || log.lock().unwrap().push(i)));
        }
        assert!(log.lock().unwrap().is_empty());

        assert_eq!(queue.run_pending(), 5);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.run_pending(), 0);
    }

    #[test]
    fn blocking_run_waits_for_other_thread() {
        let mut queue = UiTaskQueue::new();
        let runner = queue.runner();
        let hit = Arc::new(Mutex::new(None));

        let hit_in_task = Arc::clone(&hit);
        thread::spawn(move || {
            runner.post_task(Box::new(move || {
                *hit_in_task.lock().unwrap() = Some(thread::current().id());
            }));
        });

        assert!(queue.run_one_blocking());
        assert_eq!(*hit.lock().unwrap(), Some(thread::current().id()));
    }

    #[test]
    fn posting_after_queue_drop_is_harmless() {
        let queue = UiTaskQueue::new();
        let runner = queue.runner();
        drop(queue);
        runner.post_task(Box::new(|| panic!("must never run")));
    }
}
