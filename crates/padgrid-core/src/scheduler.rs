//! Delayed task scheduler for padgrid.
//!
//! Provides one-shot tasks that execute on a dedicated worker thread after
//! a delay. padgrid uses this for timed visual effects (LED flashes and
//! indicate blinks) that must re-enter the view API after their delay
//! without blocking the caller.
//!
//! Tasks are fire-and-forget from the caller's perspective, but every task
//! has a [`ScheduledTaskId`] and can be cancelled until it runs.
//!
//! # Example
//!
//! ```
//! use padgrid_core::Scheduler;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new();
//! let id = scheduler.schedule_once(Duration::from_millis(5), || {
//!     println!("fired");
//! });
//! assert!(scheduler.is_active(id));
//! std::thread::sleep(Duration::from_millis(20));
//! assert!(!scheduler.is_active(id));
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::error::{Result, SchedulerError};

new_key_type! {
    /// A unique identifier for a scheduled task.
    pub struct ScheduledTaskId;
}

/// A boxed task closure.
type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

/// Internal scheduled task data.
struct TaskData {
    /// When this task should execute.
    run_at: Instant,
    /// The task closure to execute.
    task: BoxedTask,
}

/// An entry in the scheduler queue (min-heap by execution time).
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    id: ScheduledTaskId,
    run_at: Instant,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.run_at == other.run_at
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default).
        other.run_at.cmp(&self.run_at)
    }
}

/// The pending-task queue shared with the worker thread.
struct Queue {
    tasks: SlotMap<ScheduledTaskId, TaskData>,
    heap: BinaryHeap<QueueEntry>,
}

impl Queue {
    fn new() -> Self {
        Self {
            tasks: SlotMap::with_key(),
            heap: BinaryHeap::new(),
        }
    }

    /// Drop heap entries whose task was cancelled or already executed.
    fn prune_stale(&mut self) {
        while let Some(entry) = self.heap.peek() {
            if self.tasks.contains_key(entry.id) {
                break;
            }
            self.heap.pop();
        }
    }

    /// Duration until the next pending task, or `None` when idle.
    fn time_until_next(&mut self, now: Instant) -> Option<Duration> {
        self.prune_stale();
        self.heap
            .peek()
            .map(|entry| entry.run_at.saturating_duration_since(now))
    }

    /// Remove and return the next task that is due at `now`, if any.
    fn pop_due(&mut self, now: Instant) -> Option<(ScheduledTaskId, BoxedTask)> {
        self.prune_stale();
        let entry = *self.heap.peek()?;
        if entry.run_at > now {
            return None;
        }
        self.heap.pop();
        self.tasks.remove(entry.id).map(|data| (entry.id, data.task))
    }
}

/// A delayed task scheduler backed by a single worker thread.
///
/// The worker sleeps until the earliest deadline, wakes when a new task is
/// scheduled, and invokes due task closures outside the queue lock so a
/// task may schedule further tasks.
///
/// Dropping the scheduler shuts the worker down; tasks still pending at
/// that point are dropped without running.
pub struct Scheduler {
    queue: Arc<Mutex<Queue>>,
    wake_tx: Option<Sender<()>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl Scheduler {
    /// Create a new scheduler and spawn its worker thread.
    ///
    /// # Panics
    ///
    /// Panics if the worker thread cannot be spawned.
    pub fn new() -> Self {
        let queue = Arc::new(Mutex::new(Queue::new()));
        let (wake_tx, wake_rx) = crossbeam_channel::unbounded();

        let worker_queue = queue.clone();
        let worker = std::thread::Builder::new()
            .name("padgrid-scheduler".into())
            .spawn(move || worker_loop(worker_queue, wake_rx))
            .expect("failed to spawn scheduler worker thread");

        Self {
            queue,
            wake_tx: Some(wake_tx),
            worker: Some(worker),
        }
    }

    /// Schedule a one-shot task to execute after the specified delay.
    ///
    /// Returns the task ID that can be used to cancel the task before it
    /// runs.
    pub fn schedule_once<F>(&self, delay: Duration, task: F) -> ScheduledTaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let run_at = Instant::now() + delay;
        let id = {
            let mut queue = self.queue.lock();
            let id = queue.tasks.insert(TaskData {
                run_at,
                task: Box::new(task),
            });
            queue.heap.push(QueueEntry { id, run_at });
            id
        };
        tracing::trace!(target: "padgrid_core::scheduler", ?id, ?delay, "scheduled task");

        if let Some(tx) = &self.wake_tx {
            let _ = tx.send(());
        }
        id
    }

    /// Cancel a pending task.
    ///
    /// Returns an error if the task is unknown, was already cancelled, or
    /// has already executed.
    pub fn cancel(&self, id: ScheduledTaskId) -> Result<()> {
        let mut queue = self.queue.lock();
        if queue.tasks.remove(id).is_some() {
            tracing::trace!(target: "padgrid_core::scheduler", ?id, "cancelled task");
            Ok(())
        } else {
            Err(SchedulerError::InvalidTaskId.into())
        }
    }

    /// Check if a task is still pending.
    pub fn is_active(&self, id: ScheduledTaskId) -> bool {
        self.queue.lock().tasks.contains_key(id)
    }

    /// Get the number of pending tasks.
    pub fn active_count(&self) -> usize {
        self.queue.lock().tasks.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Disconnecting the wake channel tells the worker to exit.
        drop(self.wake_tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(queue: Arc<Mutex<Queue>>, wake_rx: Receiver<()>) {
    loop {
        let wait = {
            let mut queue = queue.lock();
            queue.time_until_next(Instant::now())
        };

        match wait {
            // Idle: park until a task is scheduled or the scheduler drops.
            None => {
                if wake_rx.recv().is_err() {
                    break;
                }
            }
            // Sleep until the earliest deadline, but wake early for newly
            // scheduled tasks that may be due sooner.
            Some(wait) if !wait.is_zero() => match wake_rx.recv_timeout(wait) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            },
            // A task is due: run it outside the lock.
            Some(_) => {
                let due = {
                    let mut queue = queue.lock();
                    queue.pop_due(Instant::now())
                };
                if let Some((id, task)) = due {
                    tracing::trace!(target: "padgrid_core::scheduler", ?id, "executing task");
                    task();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_schedule_once() {
        let scheduler = Scheduler::new();
        let executed = Arc::new(AtomicUsize::new(0));
        let executed_clone = executed.clone();

        let id = scheduler.schedule_once(Duration::from_millis(10), move || {
            executed_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(scheduler.is_active(id));
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(executed.load(Ordering::SeqCst), 0);

        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(executed.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_active(id));
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_cancel_task() {
        let scheduler = Scheduler::new();
        let executed = Arc::new(AtomicUsize::new(0));
        let executed_clone = executed.clone();

        let id = scheduler.schedule_once(Duration::from_millis(20), move || {
            executed_clone.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.cancel(id).unwrap();
        assert!(!scheduler.is_active(id));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(executed.load(Ordering::SeqCst), 0);

        // Cancelling again fails.
        assert!(scheduler.cancel(id).is_err());
    }

    #[test]
    fn test_tasks_execute_in_deadline_order() {
        let scheduler = Scheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order1 = order.clone();
        scheduler.schedule_once(Duration::from_millis(30), move || {
            order1.lock().push(3);
        });
        let order2 = order.clone();
        scheduler.schedule_once(Duration::from_millis(10), move || {
            order2.lock().push(1);
        });
        let order3 = order.clone();
        scheduler.schedule_once(Duration::from_millis(20), move || {
            order3.lock().push(2);
        });

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_task_may_schedule_followup() {
        let scheduler = Arc::new(Scheduler::new());
        let executed = Arc::new(AtomicUsize::new(0));

        let scheduler_clone = scheduler.clone();
        let executed_clone = executed.clone();
        scheduler.schedule_once(Duration::from_millis(5), move || {
            let executed_inner = executed_clone.clone();
            scheduler_clone.schedule_once(Duration::from_millis(5), move || {
                executed_inner.fetch_add(1, Ordering::SeqCst);
            });
        });

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(executed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_discards_pending_tasks() {
        let executed = Arc::new(AtomicUsize::new(0));
        {
            let scheduler = Scheduler::new();
            let executed_clone = executed.clone();
            scheduler.schedule_once(Duration::from_millis(50), move || {
                executed_clone.fetch_add(1, Ordering::SeqCst);
            });
            // Scheduler dropped here with the task still pending.
        }
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }
}
