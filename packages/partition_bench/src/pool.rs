use std::io;
use std::num::NonZero;
use std::panic;
use std::sync::{Barrier, Condvar, Mutex, PoisonError};
use std::thread::{self, ScopedJoinHandle};

use many_cpus::{ProcessorId, ProcessorSet};

use crate::affinity::CorePins;
use crate::buffers::SharedOutput;
use crate::kernel::Operands;
use crate::{Affinity, Error, Kernel, LoopOrder, PartitionPlan, Result, WorkerId};

/// A fixed set of worker threads that execute one kernel over a partitioned output, in
/// barrier-separated passes.
///
/// Threads are created for each [`run()`][Self::run] and joined before it returns, so no
/// thread outlives the buffers it writes to.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    workers: NonZero<usize>,
    pins: CorePins,
}

/// The work a pool performs in one run.
#[derive(Debug)]
pub(crate) struct PoolTask<'a> {
    pub(crate) plan: &'a PartitionPlan,
    pub(crate) kernel: Kernel,
    pub(crate) order: LoopOrder,
    pub(crate) operands: Operands<'a>,
    pub(crate) output: SharedOutput<'a>,

    /// How many passes each worker makes over its cells.
    pub(crate) repeats: NonZero<usize>,

    /// Whether each worker restores its own cells to the baseline at the start of every pass.
    pub(crate) reset_each_pass: bool,
}

/// What one worker did during a pool run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WorkerReport {
    worker: WorkerId,
    cells_written: usize,
    pinned_to: Option<ProcessorId>,
}

impl WorkerReport {
    /// The worker that produced the report.
    #[must_use]
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// How many cell writes the worker made, summed over all passes.
    #[must_use]
    pub fn cells_written(&self) -> usize {
        self.cells_written
    }

    /// The processor the worker was pinned to, if any.
    #[must_use]
    pub fn pinned_to(&self) -> Option<ProcessorId> {
        self.pinned_to
    }
}

/// Everything a worker thread needs to know about its role, created at launch and discarded
/// at join.
#[derive(Debug)]
struct WorkerDescriptor<'a> {
    worker: WorkerId,
    repeats: NonZero<usize>,
    pin: Option<(ProcessorId, &'a ProcessorSet)>,
}

impl WorkerPool {
    pub(crate) fn new(workers: NonZero<usize>, affinity: Affinity) -> Self {
        Self {
            workers,
            pins: CorePins::resolve(affinity),
        }
    }

    /// Runs `task` on every worker and returns the report of each worker, in worker order.
    ///
    /// All threads are created before any of them starts work. If any thread cannot be
    /// created, the threads created so far exit without touching the output and the call
    /// fails.
    ///
    /// # Panics
    ///
    /// Re-raises the panic of any worker that panics.
    pub(crate) fn run(&self, task: &PoolTask<'_>) -> Result<Box<[WorkerReport]>> {
        self.run_with(task, |_| Ok(()))
    }

    /// [`run()`][Self::run] with a hook that is called before each worker's thread is
    /// spawned. An error from the hook is treated as a failure to spawn that worker.
    fn run_with(
        &self,
        task: &PoolTask<'_>,
        mut before_spawn: impl FnMut(WorkerId) -> io::Result<()>,
    ) -> Result<Box<[WorkerReport]>> {
        debug_assert_eq!(task.plan.workers(), self.workers);
        debug_assert_eq!(task.output.len(), task.plan.grid().cells());

        tracing::debug!(
            workers = self.workers.get(),
            repeats = task.repeats.get(),
            pinned = self.pins.is_pinning(),
            "launching worker threads"
        );

        let gate = LaunchGate::new();
        let barrier = Barrier::new(self.workers.get());

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.workers.get());

            for worker in WorkerId::all(self.workers) {
                let descriptor = WorkerDescriptor {
                    worker,
                    repeats: task.repeats,
                    pin: self.pins.for_worker(worker),
                };

                let spawned = before_spawn(worker).and_then(|()| {
                    thread::Builder::new()
                        .name(format!("partition-worker-{}", worker.index()))
                        .spawn_scoped(scope, {
                            let gate = &gate;
                            let barrier = &barrier;

                            move || worker_entrypoint(&descriptor, gate, barrier, task)
                        })
                });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        gate.abort();
                        join_all(handles);

                        return Err(Error::ThreadCreation {
                            worker: worker.index(),
                            source,
                        });
                    }
                }
            }

            gate.open();

            Ok(join_all(handles)
                .into_iter()
                .map(|report| report.expect("guarded by launch gate being open"))
                .collect())
        })
    }
}

/// Joins every worker, re-raising the first panic encountered.
fn join_all<T>(handles: Vec<ScopedJoinHandle<'_, T>>) -> Vec<T> {
    handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload))
        })
        .collect()
}

/// Returns `None` if the launch was aborted before the worker was allowed to start.
fn worker_entrypoint(
    descriptor: &WorkerDescriptor<'_>,
    gate: &LaunchGate,
    barrier: &Barrier,
    task: &PoolTask<'_>,
) -> Option<WorkerReport> {
    let worker = descriptor.worker;

    if !gate.wait() {
        tracing::trace!(worker = worker.index(), "launch aborted, exiting");
        return None;
    }

    if let Some((_, processors)) = descriptor.pin {
        processors.pin_current_thread_to();
    }

    tracing::trace!(worker = worker.index(), "worker started");

    // Synchronized start: nobody touches the output until every worker is ready.
    barrier.wait();

    let mut cells_written: usize = 0;

    for _ in 0..descriptor.repeats.get() {
        for span in task.plan.spans(worker) {
            // SAFETY: The spans come from a verified plan over the output grid, so no other
            // worker accesses these cells during this pass. Passes are separated by the barrier.
            unsafe {
                task.kernel.apply(
                    task.order,
                    &task.operands,
                    &task.output,
                    span,
                    task.reset_each_pass,
                );
            }

            cells_written = cells_written.saturating_add(span.len());
        }

        barrier.wait();
    }

    tracing::trace!(worker = worker.index(), cells_written, "worker finished");

    Some(WorkerReport {
        worker,
        cells_written,
        pinned_to: descriptor.pin.map(|(id, _)| id),
    })
}

/// Holds every worker back until all of them exist, then releases or dismisses all of them.
#[derive(Debug)]
struct LaunchGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum GateState {
    Pending,
    Open,
    Aborted,
}

impl LaunchGate {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Pending),
            changed: Condvar::new(),
        }
    }

    fn open(&self) {
        self.set(GateState::Open);
    }

    fn abort(&self) {
        self.set(GateState::Aborted);
    }

    fn set(&self, state: GateState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        self.changed.notify_all();
    }

    /// Blocks until the gate leaves the pending state. Returns whether it opened.
    fn wait(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let state = self
            .changed
            .wait_while(state, |state| *state == GateState::Pending)
            .unwrap_or_else(PoisonError::into_inner);

        *state == GateState::Open
    }
}
