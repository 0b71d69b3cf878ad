//! Cooperative, single-threaded discrete-event scheduler.
//!
//! Tasks are plain `async` blocks; the only suspension point they expose is
//! [`Kernel::timeout`]. The executor keeps a FIFO queue of tasks ready to run
//! at the current instant and a min-heap of tasks asleep until some future
//! instant; running it forward never requires real waker plumbing because
//! the heap already records exactly when each task becomes runnable again.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

type BoxedTask = Pin<Box<dyn Future<Output = ()>>>;

struct SleepEntry {
    wake_at: f64,
    seq: u64,
    task: u64,
}

impl PartialEq for SleepEntry {
    fn eq(&self, other: &Self) -> bool {
        self.wake_at == other.wake_at && self.seq == other.seq
    }
}
impl Eq for SleepEntry {}

impl Ord for SleepEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both fields so `peek` returns the
        // earliest wake time, and ties break in insertion (FIFO) order.
        other
            .wake_at
            .partial_cmp(&self.wake_at)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for SleepEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A future returned by [`Kernel::timeout`]; suspends the owning task until
/// the kernel's clock reaches `wake_at`.
pub struct Timeout {
    kernel: Rc<Kernel>,
    wake_at: f64,
}

impl Future for Timeout {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.kernel.now() >= self.wake_at {
            Poll::Ready(())
        } else {
            self.kernel.pending_wake.set(Some(self.wake_at));
            Poll::Pending
        }
    }
}

/// The simulated-time scheduler. One instance is shared (via `Rc`) by every
/// task; it never needs a real `Waker` since it is the only thing that polls.
pub struct Kernel {
    now: Cell<f64>,
    seq: Cell<u64>,
    next_task_id: Cell<u64>,
    tasks: RefCell<HashMap<u64, BoxedTask>>,
    ready: RefCell<VecDeque<u64>>,
    sleeping: RefCell<BinaryHeap<SleepEntry>>,
    pending_wake: Cell<Option<f64>>,
}

impl Kernel {
    pub fn new() -> Rc<Kernel> {
        Rc::new(Kernel {
            now: Cell::new(0.0),
            seq: Cell::new(0),
            next_task_id: Cell::new(0),
            tasks: RefCell::new(HashMap::new()),
            ready: RefCell::new(VecDeque::new()),
            sleeping: RefCell::new(BinaryHeap::new()),
            pending_wake: Cell::new(None),
        })
    }

    pub fn now(&self) -> f64 {
        self.now.get()
    }

    fn next_seq(&self) -> u64 {
        let s = self.seq.get();
        self.seq.set(s + 1);
        s
    }

    /// Schedule `fut` to run, appended to the FIFO ready queue for the
    /// current instant.
    pub fn spawn(&self, fut: impl Future<Output = ()> + 'static) {
        let id = self.next_task_id.get();
        self.next_task_id.set(id + 1);
        self.tasks.borrow_mut().insert(id, Box::pin(fut));
        self.ready.borrow_mut().push_back(id);
    }

    /// Suspend the calling task for `duration` simulated time units.
    pub fn timeout(self: &Rc<Self>, duration: f64) -> Timeout {
        assert!(duration >= 0.0, "timeout duration must be non-negative");
        Timeout {
            kernel: Rc::clone(self),
            wake_at: self.now.get() + duration,
        }
    }

    /// Run ready and sleeping tasks until no task can become ready at or
    /// before `deadline`, then advance the clock to `deadline`.
    pub fn run_until(&self, deadline: f64) {
        self.run_until_checked(deadline, &Cell::new(false));
    }

    /// As [`Kernel::run_until`], but polling stops immediately once
    /// `aborted` is set (used to implement fatal invariant aborts, which
    /// must not let any further task run).
    pub fn run_until_checked(&self, deadline: f64, aborted: &Cell<bool>) {
        loop {
            if aborted.get() {
                return;
            }
            let next = self.ready.borrow_mut().pop_front();
            if let Some(task_id) = next {
                if self.poll_task(task_id) {
                    self.tasks.borrow_mut().remove(&task_id);
                } else {
                    let wake_at = self
                        .pending_wake
                        .take()
                        .expect("task suspended without an armed timeout");
                    let seq = self.next_seq();
                    self.sleeping.borrow_mut().push(SleepEntry {
                        wake_at,
                        seq,
                        task: task_id,
                    });
                }
                continue;
            }

            let min_wake = self.sleeping.borrow().peek().map(|e| e.wake_at);
            match min_wake {
                Some(t) if t <= deadline => {
                    self.now.set(t);
                    let mut sleeping = self.sleeping.borrow_mut();
                    while matches!(sleeping.peek(), Some(entry) if entry.wake_at <= t) {
                        let entry = sleeping.pop().unwrap();
                        self.ready.borrow_mut().push_back(entry.task);
                    }
                }
                _ => break,
            }
        }
        if self.now.get() < deadline {
            self.now.set(deadline);
        }
    }

    /// Remove the task, poll it with a no-op waker, and reinsert it if it is
    /// still pending. Removing before polling means a task that spawns
    /// another task from within its own poll never re-enters `tasks`
    /// reentrantly.
    fn poll_task(&self, id: u64) -> bool {
        let mut task = match self.tasks.borrow_mut().remove(&id) {
            Some(task) => task,
            None => return true,
        };
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);
        match task.as_mut().poll(&mut cx) {
            Poll::Ready(()) => true,
            Poll::Pending => {
                self.tasks.borrow_mut().insert(id, task);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn timeout_advances_clock_and_resumes_fifo() {
        let kernel = Kernel::new();
        let log = Rc::new(StdRefCell::new(Vec::<(f64, &'static str)>::new()));

        {
            let kernel = Rc::clone(&kernel);
            let log = Rc::clone(&log);
            kernel.clone().spawn(async move {
                kernel.timeout(5.0).await;
                log.borrow_mut().push((kernel.now(), "a"));
            });
        }
        {
            let kernel = Rc::clone(&kernel);
            let log = Rc::clone(&log);
            kernel.clone().spawn(async move {
                kernel.timeout(5.0).await;
                log.borrow_mut().push((kernel.now(), "b"));
            });
        }

        kernel.run_until(10.0);
        assert_eq!(kernel.now(), 10.0);
        assert_eq!(*log.borrow(), vec![(5.0, "a"), (5.0, "b")]);
    }

    #[test]
    fn spawn_from_within_a_poll_does_not_panic() {
        let kernel = Kernel::new();
        let ran = Rc::new(Cell::new(false));
        {
            let kernel_outer = Rc::clone(&kernel);
            let ran = Rc::clone(&ran);
            kernel.clone().spawn(async move {
                let kernel_inner = Rc::clone(&kernel_outer);
                let ran = Rc::clone(&ran);
                kernel_outer.spawn(async move {
                    ran.set(true);
                    kernel_inner.timeout(0.0).await;
                });
            });
        }
        kernel.run_until(1.0);
        assert!(ran.get());
    }
}
