use {
    crate::{
        error::Error,
        sink::{LogSink, Severity},
        timer::Timer,
    },
    log::trace,
    parking_lot::{Condvar, Mutex},
    std::{
        any::Any,
        collections::VecDeque,
        panic::{self, AssertUnwindSafe},
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        thread::{self, JoinHandle},
        time::Duration,
    },
};

/// Completion handle for a task submitted to a [`ThreadPool`].
///
/// Waiting consumes the handle and yields the task's result. A task that
/// panicked resolves to [`Error::TaskPanicked`]; a submission the pool
/// refused resolves to [`Error::PoolClosed`].
pub struct Completion<T> {
    shared: Arc<Slot<T>>,
}

struct Slot<T> {
    ready: Condvar,
    value: Mutex<Option<Result<T, Error>>>,
}

impl<T> Slot<T> {
    fn fulfill(&self, value: Result<T, Error>) {
        *self.value.lock() = Some(value);
        self.ready.notify_all();
    }
}

impl<T> Completion<T> {
    fn pending() -> (Self, Arc<Slot<T>>) {
        let shared = Arc::new(Slot {
            ready: Condvar::new(),
            value: Mutex::new(None),
        });

        (
            Self {
                shared: Arc::clone(&shared),
            },
            shared,
        )
    }

    fn fulfilled(value: Result<T, Error>) -> Self {
        let (res, slot) = Self::pending();
        slot.fulfill(value);

        res
    }

    /// `true` once the task has finished and a result is waiting.
    pub fn is_ready(&self) -> bool {
        self.shared.value.lock().is_some()
    }

    /// Takes the result if the task has already finished.
    pub fn try_take(&self) -> Option<Result<T, Error>> {
        self.shared.value.lock().take()
    }

    /// Blocks until the task finishes and returns its result.
    pub fn wait(self) -> Result<T, Error> {
        let mut value = self.shared.value.lock();
        loop {
            if let Some(res) = value.take() {
                return res;
            }

            self.shared.ready.wait(&mut value);
        }
    }
}

struct QueuedTask {
    arrival: Timer,
    number: u64,
    payload: Box<dyn FnOnce() + Send>,
}

struct State {
    idle_threads: usize,
    queue: VecDeque<QueuedTask>,
    shutdown: bool,
    workers: Vec<JoinHandle<()>>,
}

struct Inner {
    max_threads: usize,
    pre_spawn: usize,
    next_task: AtomicU64,
    sink: Arc<dyn LogSink>,
    state: Mutex<State>,
    work: Condvar,
}

/// A bounded FIFO worker pool with lazy thread spawn.
///
/// Half of the thread budget is spawned up front; the rest appear one at a
/// time when a task arrives and no worker is idle. When either the requested
/// thread count or the detected hardware concurrency is zero, the pool
/// degrades to inline execution on the calling thread.
pub struct ThreadPool {
    inner: Option<Arc<Inner>>,
    sink: Arc<dyn LogSink>,
}

impl ThreadPool {
    pub fn new(max_threads: usize, sink: Arc<dyn LogSink>) -> Self {
        let hw = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(0);

        if max_threads == 0 || hw == 0 {
            trace!("thread pool degraded to inline execution");

            return Self { inner: None, sink };
        }

        let max_threads = max_threads.min(hw);
        let pre_spawn = max_threads.min(1.max(max_threads / 2));
        let inner = Arc::new(Inner {
            max_threads,
            pre_spawn,
            next_task: AtomicU64::new(0),
            sink: Arc::clone(&sink),
            state: Mutex::new(State {
                idle_threads: 0,
                queue: VecDeque::new(),
                shutdown: false,
                workers: Vec::with_capacity(max_threads),
            }),
            work: Condvar::new(),
        });

        {
            let mut state = inner.state.lock();
            for _ in 0..pre_spawn {
                Inner::spawn_worker(&inner, &mut state);
            }
        }

        Self {
            inner: Some(inner),
            sink,
        }
    }

    /// `true` when tasks run on the caller instead of pool workers.
    pub fn is_inline(&self) -> bool {
        self.inner.is_none()
    }

    /// The thread budget after clamping to hardware concurrency; 0 inline.
    pub fn max_threads(&self) -> usize {
        self.inner.as_ref().map(|inner| inner.max_threads).unwrap_or(0)
    }

    /// How many workers were started at construction; 0 inline.
    pub fn pre_spawn(&self) -> usize {
        self.inner.as_ref().map(|inner| inner.pre_spawn).unwrap_or(0)
    }

    /// How many worker threads currently exist.
    pub fn worker_count(&self) -> usize {
        self.inner
            .as_ref()
            .map(|inner| inner.state.lock().workers.len())
            .unwrap_or(0)
    }

    /// Submits a task, returning a handle that resolves to its result.
    ///
    /// Inline pools run the task immediately and return an already-fulfilled
    /// handle. After [`shutdown`](Self::shutdown) the task is rejected with a
    /// warning and the handle resolves to [`Error::PoolClosed`].
    pub fn enqueue<T, F>(&self, task: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, Error> + Send + 'static,
    {
        let Some(inner) = &self.inner else {
            return Completion::fulfilled(run_guarded(task));
        };

        let number = inner.next_task.fetch_add(1, Ordering::Relaxed) + 1;
        let (handle, slot) = Completion::pending();
        let payload = Box::new(move || slot.fulfill(run_guarded(task)));

        {
            let mut state = inner.state.lock();
            if state.shutdown {
                drop(state);
                self.sink.log(
                    Severity::Warning,
                    &format!("task {number} rejected: pool is shut down"),
                );

                return Completion::fulfilled(Err(Error::PoolClosed));
            }

            state.queue.push_back(QueuedTask {
                arrival: Timer::start(),
                number,
                payload,
            });

            if state.idle_threads == 0 && state.workers.len() < inner.max_threads {
                Inner::spawn_worker(inner, &mut state);
            }
        }

        inner.work.notify_one();

        handle
    }

    /// Stops accepting tasks, drains the queue, and joins every worker.
    ///
    /// Tasks already queued run to completion; only tasks that never started
    /// are affected by the closed state.
    pub fn shutdown(&self) {
        let Some(inner) = &self.inner else {
            return;
        };

        let workers = {
            let mut state = inner.state.lock();
            state.shutdown = true;

            std::mem::take(&mut state.workers)
        };

        inner.work.notify_all();

        for worker in workers {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn spawn_worker(inner: &Arc<Self>, state: &mut State) {
        let ordinal = state.workers.len() + 1;
        let pool = Arc::clone(inner);
        state
            .workers
            .push(thread::spawn(move || pool.worker(ordinal)));
    }

    fn worker(&self, ordinal: usize) {
        trace!("worker {ordinal} started");

        loop {
            let task = {
                let mut state = self.state.lock();
                state.idle_threads += 1;
                while !state.shutdown && state.queue.is_empty() {
                    self.work.wait(&mut state);
                }

                state.idle_threads -= 1;
                match state.queue.pop_front() {
                    Some(task) => task,
                    // Shutdown with an empty queue
                    None => break,
                }
            };

            let waited = task.arrival.elapsed();
            self.observe(task.number, ordinal, waited);
            (task.payload)();
        }

        trace!("worker {ordinal} exited");
    }

    fn observe(&self, number: u64, ordinal: usize, waited: Duration) {
        let message = if number <= self.pre_spawn as u64 {
            format!("task {number} assigned to already-running thread {ordinal}")
        } else if number <= self.max_threads as u64 {
            format!("task {number} waited {waited:.2?} before starting on new thread {ordinal}")
        } else {
            format!("task {number} waited {waited:.2?} in queue before starting on thread {ordinal}")
        };

        self.sink.log(Severity::Debug, &message);
    }
}

fn run_guarded<T>(task: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(res) => res,
        Err(payload) => Err(Error::TaskPanicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}
