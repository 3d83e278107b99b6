//! Vane Queues - Batched Notification Scheduler
//!
//! Cooperative, single-threaded batching. A batch opens a window during
//! which notify-phase tasks are coalesced; when the outermost batch
//! closes, the notify phase is drained fully, then the mutation phase.
//! The sync engine relies on exactly this ordering: a semaphore raised
//! before a write stays raised for every listener the write triggers,
//! and is lowered only in the mutation phase.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// The scheduler seam the binding engine consumes. Context-passed, never
/// ambient.
pub trait BatchScheduler {
    /// Run `f` inside a batch window. Nested calls extend the outermost
    /// window; phases flush when it closes.
    fn run_batched(&self, f: Box<dyn FnOnce() + '_>);

    /// Defer `f` until the current batch's mutation phase, after every
    /// notify-phase task of the batch has run. Runs immediately when no
    /// batch is open.
    fn defer_until_mutation_phase(&self, f: Box<dyn FnOnce()>);

    /// Enqueue `f` into the notify phase of the current batch, or run it
    /// immediately when no batch is open.
    fn enqueue_notify(&self, f: Box<dyn FnOnce()>);
}

/// The default cooperative queue pair.
#[derive(Default)]
pub struct CooperativeQueues {
    depth: Cell<usize>,
    notify: RefCell<VecDeque<Task>>,
    mutate: RefCell<VecDeque<Task>>,
    flushing: Cell<bool>,
}

impl CooperativeQueues {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn batch_start(&self) {
        self.depth.set(self.depth.get() + 1);
    }

    pub fn batch_stop(&self) {
        let depth = self.depth.get();
        debug_assert!(depth > 0, "batch_stop without matching batch_start");
        self.depth.set(depth - 1);
        if depth == 1 {
            self.flush();
        }
    }

    pub fn batch_depth(&self) -> usize {
        self.depth.get()
    }

    /// Drain notify tasks first, then mutate tasks. Tasks enqueued while
    /// flushing are drained in the same flush, notify still first.
    fn flush(&self) {
        if self.flushing.get() {
            return;
        }
        self.flushing.set(true);
        loop {
            let task = {
                let mut notify = self.notify.borrow_mut();
                match notify.pop_front() {
                    Some(task) => Some(task),
                    None => self.mutate.borrow_mut().pop_front(),
                }
            };
            match task {
                Some(task) => task(),
                None => break,
            }
        }
        self.flushing.set(false);
        tracing::trace!("queues flushed");
    }
}

impl BatchScheduler for CooperativeQueues {
    fn run_batched(&self, f: Box<dyn FnOnce() + '_>) {
        self.batch_start();
        f();
        self.batch_stop();
    }

    fn defer_until_mutation_phase(&self, f: Box<dyn FnOnce()>) {
        if self.depth.get() == 0 && !self.flushing.get() {
            f();
        } else {
            self.mutate.borrow_mut().push_back(f);
        }
    }

    fn enqueue_notify(&self, f: Box<dyn FnOnce()>) {
        if self.depth.get() == 0 && !self.flushing.get() {
            f();
        } else {
            self.notify.borrow_mut().push_back(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_immediately_outside_batch() {
        let queues = CooperativeQueues::new();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        queues.defer_until_mutation_phase(Box::new(move || r.set(true)));
        assert!(ran.get());
    }

    #[test]
    fn test_mutation_phase_runs_after_notify_phase() {
        let queues = CooperativeQueues::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o1 = order.clone();
        let o2 = order.clone();
        let o3 = order.clone();
        let q = queues.clone();
        queues.run_batched(Box::new(move || {
            q.defer_until_mutation_phase(Box::new(move || o1.borrow_mut().push("mutate")));
            q.enqueue_notify(Box::new(move || o2.borrow_mut().push("notify-a")));
            q.enqueue_notify(Box::new(move || o3.borrow_mut().push("notify-b")));
        }));

        assert_eq!(*order.borrow(), vec!["notify-a", "notify-b", "mutate"]);
    }

    #[test]
    fn test_notify_enqueued_mid_flush_precedes_mutate() {
        let queues = CooperativeQueues::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o_mutate = order.clone();
        let o_outer = order.clone();
        let inner_q = queues.clone();
        let q = queues.clone();
        queues.run_batched(Box::new(move || {
            q.defer_until_mutation_phase(Box::new(move || o_mutate.borrow_mut().push("mutate")));
            let o_inner = o_outer.clone();
            q.enqueue_notify(Box::new(move || {
                o_outer.borrow_mut().push("notify");
                inner_q.enqueue_notify(Box::new(move || o_inner.borrow_mut().push("late-notify")));
            }));
        }));

        assert_eq!(*order.borrow(), vec!["notify", "late-notify", "mutate"]);
    }

    #[test]
    fn test_nested_batches_flush_once() {
        let queues = CooperativeQueues::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();

        queues.batch_start();
        queues.batch_start();
        queues.defer_until_mutation_phase(Box::new(move || c.set(c.get() + 1)));
        queues.batch_stop();
        assert_eq!(count.get(), 0, "inner stop must not flush");
        queues.batch_stop();
        assert_eq!(count.get(), 1);
    }
}
