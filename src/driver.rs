//! The iterating step driver.
//!
//! One shared atomic state cell, four public entry points, no outer lock.
//! The driver turns what would be a recursive chain of synchronous step
//! completions into a flat loop: when a completion arrives while the step
//! loop still owns the state, the completion only marks the state `Called`
//! and the loop keeps iterating on its own thread. When a completion arrives
//! after the loop has parked in `Pending`, the reporting thread claims
//! ownership and resumes the loop itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_utils::Backoff;

use crate::error::JobError;
use crate::outcome::StepOutcome;
use crate::state::{AtomicState, State};
use crate::task::IteratingTask;

struct Inner<T> {
    state: AtomicState,
    /// Set by a drive that arrived while a step was already executing.
    /// Written only while the state cell is held at `Locked`; the lock CAS
    /// provides the ordering, so relaxed accesses suffice.
    iterate: AtomicBool,
    task: T,
}

/// Drives an [`IteratingTask`] to completion, one step at a time.
///
/// A `StepDriver` is a cheap cloneable handle; clones share the same state
/// cell and task. Every entry point may be called from any thread at any
/// time, including re-entrantly from inside the task's own step function.
///
/// At most one thread ever owns the step loop, so the task's step function
/// is never invoked concurrently with itself; ownership moves between
/// threads atomically through the `Pending`/`Called` completion race.
pub struct StepDriver<T: IteratingTask> {
    inner: Arc<Inner<T>>,
}

impl<T: IteratingTask> Clone for StepDriver<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: IteratingTask> StepDriver<T> {
    /// Creates a driver that is immediately ready to [`drive`](Self::drive).
    pub fn new(task: T) -> Self {
        Self::with_state(task, State::Idle)
    }

    /// Creates a driver that starts out as if a previous job had already
    /// succeeded; [`reset`](Self::reset) must be called before the first
    /// [`drive`](Self::drive).
    pub fn new_reset_required(task: T) -> Self {
        Self::with_state(task, State::Succeeded)
    }

    fn with_state(task: T, state: State) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicState::new(state),
                iterate: AtomicBool::new(false),
                task,
            }),
        }
    }

    /// The task this driver owns.
    #[inline(always)]
    pub fn task(&self) -> &T {
        &self.inner.task
    }

    /// Requests that iteration starts or continues.
    ///
    /// After this returns, the task's step function will be invoked during
    /// this call or soon after, by this thread or by another. If a step is
    /// already in flight, only the iterate-requested flag is recorded; the
    /// owning loop (or its eventual completion) takes it from there. The
    /// only wait is a brief spin while another thread transiently holds the
    /// lock state.
    ///
    /// # Panics
    ///
    /// Panics if the driver is in a terminal or closed state: a finished
    /// machine must be [`reset`](Self::reset) before it can be driven again,
    /// and a closed one never can.
    pub fn drive(&self) {
        let backoff = Backoff::new();
        loop {
            let state = self.inner.state.load();
            match state {
                // A step is in flight or its completion already arrived;
                // the loop will re-drive itself.
                State::Pending | State::Called => return,

                State::Idle => {
                    if self
                        .inner
                        .state
                        .compare_exchange(State::Idle, State::Processing)
                        .is_ok()
                    {
                        self.run_loop();
                        return;
                    }
                }

                State::Processing => {
                    if self
                        .inner
                        .state
                        .compare_exchange(State::Processing, State::Locked)
                        .is_ok()
                    {
                        // Tell the owning thread to iterate once more
                        // instead of parking idle.
                        self.inner.iterate.store(true, Ordering::Relaxed);
                        self.inner.state.store(State::Processing);
                        return;
                    }
                }

                State::Locked => backoff.snooze(),

                state => panic!("drive() called in state {state:?}"),
            }
        }
    }

    /// Reports that the asynchronous step currently in flight completed
    /// successfully. Must be called at most once per started step.
    ///
    /// If the step loop still owns the state, this only marks the
    /// completion and returns; the loop picks it up and keeps iterating.
    /// If the loop has already parked, this thread claims ownership and
    /// resumes iteration here. After [`cancel`](Self::cancel) this is a
    /// silent no-op.
    ///
    /// # Panics
    ///
    /// Panics if no step is in flight, or if the completion for this step
    /// was already reported.
    pub fn report_success(&self) {
        let backoff = Backoff::new();
        loop {
            let state = self.inner.state.load();
            match state {
                State::Processing => {
                    // The loop is still resolving the step that just
                    // completed; mark the completion and let it iterate.
                    if self
                        .inner
                        .state
                        .compare_exchange(State::Processing, State::Called)
                        .is_ok()
                    {
                        return;
                    }
                }

                State::Pending => {
                    // The loop parked waiting for us; resume it here.
                    if self
                        .inner
                        .state
                        .compare_exchange(State::Pending, State::Processing)
                        .is_ok()
                    {
                        self.run_loop();
                        return;
                    }
                }

                // Too late, the driver was cancelled.
                State::Closed => return,

                State::Locked => backoff.snooze(),

                state => panic!("report_success() called in state {state:?}"),
            }
        }
    }

    /// Reports that the job failed, either from the asynchronous completion
    /// path of a step or because the job as a whole must be abandoned.
    ///
    /// The failure hook fires exactly once with `error`. If the job already
    /// concluded, never started, or was cancelled, this is a silent no-op
    /// and `error` is dropped.
    pub fn report_failure(&self, error: JobError) {
        let backoff = Backoff::new();
        loop {
            let state = self.inner.state.load();
            match state {
                // Already concluded or never started.
                State::Idle | State::Succeeded | State::Failed | State::Closed => return,

                // Wait for the lock owner to restore Processing; stealing
                // the cell here would let its release store erase Failed.
                State::Locked => backoff.snooze(),

                _ => {
                    if self.inner.state.compare_exchange(state, State::Failed).is_ok() {
                        break;
                    }
                }
            }
        }
        self.inner.task.on_job_failed(error);
    }

    /// Permanently shuts the driver down. Idempotent.
    ///
    /// If a job was still in flight, the failure hook fires once with
    /// [`JobError::Closed`], notifying the task that its pending step will
    /// never be awaited. A closed driver accepts no further transitions:
    /// [`drive`](Self::drive) panics, [`reset`](Self::reset) returns
    /// `false`, and late completions are silently discarded.
    pub fn cancel(&self) {
        let backoff = Backoff::new();
        let in_flight = loop {
            let state = self.inner.state.load();
            match state {
                // Nothing in flight, no notification owed.
                State::Idle | State::Succeeded | State::Failed => {
                    if self.inner.state.compare_exchange(state, State::Closed).is_ok() {
                        break false;
                    }
                }

                State::Closed => return,

                State::Locked => backoff.snooze(),

                // Processing, Pending or Called: a step is in flight.
                _ => {
                    if self.inner.state.compare_exchange(state, State::Closed).is_ok() {
                        break true;
                    }
                }
            }
        };
        if in_flight {
            self.inner.task.on_job_failed(JobError::Closed);
        }
    }

    /// Returns a finished driver to its initial state so it can run another
    /// job.
    ///
    /// Succeeds from `Idle` (no-op) and from the succeeded or failed
    /// terminal states. Returns `false` without any state change while a
    /// job is in flight or once the driver is closed.
    pub fn reset(&self) -> bool {
        loop {
            match self.inner.state.load() {
                State::Idle => return true,

                State::Succeeded => {
                    if self
                        .inner
                        .state
                        .compare_exchange(State::Succeeded, State::Idle)
                        .is_ok()
                    {
                        return true;
                    }
                }

                State::Failed => {
                    if self
                        .inner
                        .state
                        .compare_exchange(State::Failed, State::Idle)
                        .is_ok()
                    {
                        return true;
                    }
                }

                _ => return false,
            }
        }
    }

    /// Whether the driver is parked waiting for a drive.
    #[inline(always)]
    pub fn is_idle(&self) -> bool {
        self.inner.state.load() == State::Idle
    }

    /// Whether the driver has been permanently closed.
    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.inner.state.load() == State::Closed
    }

    /// Whether the current job has failed.
    #[inline(always)]
    pub fn is_failed(&self) -> bool {
        self.inner.state.load() == State::Failed
    }

    /// Whether the current job has succeeded.
    #[inline(always)]
    pub fn is_succeeded(&self) -> bool {
        self.inner.state.load() == State::Succeeded
    }

    /// The step loop. Entered only by the thread that won a CAS into
    /// `Processing`; a concurrent failure or cancel can still change the
    /// state under us, so every outcome is resolved against a fresh read.
    fn run_loop(&self) {
        'stepping: loop {
            let outcome = match self.inner.task.step(self) {
                Ok(outcome) => outcome,
                Err(error) => {
                    self.report_failure(error);
                    break 'stepping;
                }
            };

            let backoff = Backoff::new();
            'resolving: loop {
                let state = self.inner.state.load();
                match outcome {
                    StepOutcome::StillWorking => match state {
                        State::Processing => {
                            if self
                                .inner
                                .state
                                .compare_exchange(State::Processing, State::Locked)
                                .is_err()
                            {
                                continue 'resolving;
                            }
                            // Did a drive arrive while we were stepping?
                            if self.inner.iterate.swap(false, Ordering::Relaxed) {
                                self.inner.state.store(State::Processing);
                                continue 'stepping;
                            }
                            self.inner.state.store(State::Idle);
                            break 'stepping;
                        }

                        // Terminated while we were stepping; the hook
                        // already fired on that transition.
                        State::Failed | State::Closed => break 'stepping,

                        State::Locked => backoff.snooze(),

                        state => panic!("step loop resolving StillWorking in state {state:?}"),
                    },

                    StepOutcome::StepStarted => match state {
                        State::Processing => {
                            // Race against the step's completion callback.
                            // If we win, the completion resumes the loop;
                            // if we lose, the state is already Called and
                            // we keep iterating right here.
                            if self
                                .inner
                                .state
                                .compare_exchange(State::Processing, State::Pending)
                                .is_ok()
                            {
                                break 'stepping;
                            }
                        }

                        State::Called => {
                            if self
                                .inner
                                .state
                                .compare_exchange(State::Called, State::Processing)
                                .is_ok()
                            {
                                continue 'stepping;
                            }
                        }

                        State::Failed | State::Closed => break 'stepping,

                        State::Locked => backoff.snooze(),

                        state => panic!("step loop resolving StepStarted in state {state:?}"),
                    },

                    StepOutcome::JobDone => match state {
                        State::Processing => {
                            if self
                                .inner
                                .state
                                .compare_exchange(State::Processing, State::Succeeded)
                                .is_ok()
                            {
                                self.inner.task.on_job_succeeded();
                                break 'stepping;
                            }
                        }

                        // A concurrent failure or cancel got there first.
                        State::Succeeded | State::Failed | State::Closed => break 'stepping,

                        State::Locked => backoff.snooze(),

                        state => panic!("step loop resolving JobDone in state {state:?}"),
                    },
                }
            }
        }
    }
}

impl<T: IteratingTask> std::fmt::Debug for StepDriver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StepDriver[{:?}]", self.inner.state)
    }
}
