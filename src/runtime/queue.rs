use std::cell::RefCell;
use std::collections::VecDeque;

type Job = Box<dyn FnOnce()>;

/// Pending value deliveries shared by every store on this thread.
#[derive(Default)]
struct NotifyQueue {
    pending: VecDeque<Job>,
    flushing: bool,
}

// One queue per thread: a `set` on any store while another store is flushing
// lands behind the in-flight deliveries instead of interleaving with them.
thread_local! {
    static QUEUE: RefCell<NotifyQueue> = RefCell::new(NotifyQueue::default());
}

/// Ownership of the queue drain for the outermost `set`.
///
/// Dropping the guard releases the queue even if a subscriber panicked midway,
/// discarding whatever was left so the next `set` starts from a clean state.
pub(crate) struct Flush {
    _private: (),
}

impl Flush {
    /// Deliver every queued job, including jobs queued while draining.
    pub(crate) fn run(self) {
        loop {
            let job = QUEUE.with(|queue| queue.borrow_mut().pending.pop_front());
            match job {
                Some(job) => job(),
                None => break,
            }
        }
    }
}

impl Drop for Flush {
    fn drop(&mut self) {
        QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            queue.pending.clear();
            queue.flushing = false;
        });
    }
}

/// Claim the drain if nobody else holds it.
///
/// Returns `None` when a flush is already in progress (or jobs are waiting for
/// one); the caller must then only enqueue.
pub(crate) fn claim() -> Option<Flush> {
    QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.flushing || !queue.pending.is_empty() {
            None
        } else {
            queue.flushing = true;
            Some(Flush { _private: () })
        }
    })
}

/// Append a delivery to the back of the queue.
pub(crate) fn enqueue(job: impl FnOnce() + 'static) {
    QUEUE.with(|queue| queue.borrow_mut().pending.push_back(Box::new(job)));
}

/// Whether a flush is currently draining the queue.
pub fn is_flushing() -> bool {
    QUEUE.with(|queue| queue.borrow().flushing)
}
